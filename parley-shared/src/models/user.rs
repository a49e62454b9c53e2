/// User model
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id BIGSERIAL PRIMARY KEY,
///     name VARCHAR(255) NOT NULL UNIQUE,
///     session_id VARCHAR(255) NOT NULL,
///     password VARCHAR(255) NOT NULL,
///     created_at TIMESTAMPTZ NOT NULL,
///     updated_at TIMESTAMPTZ NOT NULL
/// );
/// ```
///
/// Rows are read and written through
/// [`UserRepository`](crate::repository::UserRepository).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Storage-assigned user identifier
pub type UserId = i64;

/// Longest accepted user name, matching the column width
pub const NAME_MAX_LEN: usize = 255;

/// A user account
///
/// `session_id` points at the user's active [`Session`](super::session::Session).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    /// Assigned by storage on insert; 0 until then
    pub id: UserId,

    /// Unique across all users
    pub name: String,

    /// Identifier of the active session
    pub session_id: String,

    /// Opaque credential produced by a
    /// [`CredentialHasher`](crate::auth::password::CredentialHasher)
    #[serde(skip_serializing)]
    pub password: String,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Builds a not-yet-persisted user
    ///
    /// The id and session id are filled in during provisioning.
    pub fn new(name: impl Into<String>, password_hash: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            name: name.into(),
            session_id: String::new(),
            password: password_hash.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Input for provisioning a new account
#[derive(Debug, Clone, Deserialize)]
pub struct SignUpCandidate {
    pub name: String,

    /// Raw password, hashed before it is stored
    pub password: String,
}

impl SignUpCandidate {
    pub fn new(name: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            password: password.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_user_is_unpersisted() {
        let user = User::new("alice", "hash");

        assert_eq!(user.id, 0);
        assert_eq!(user.name, "alice");
        assert!(user.session_id.is_empty());
        assert_eq!(user.created_at, user.updated_at);
    }

    #[test]
    fn test_password_is_never_serialized() {
        let user = User::new("alice", "$argon2id$secret");
        let json = serde_json::to_value(&user).expect("serialize user");

        assert!(json.get("password").is_none());
        assert_eq!(json["name"], "alice");
    }
}
