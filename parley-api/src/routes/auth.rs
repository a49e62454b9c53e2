/// Authentication endpoints
///
/// # Endpoints
///
/// - `POST /v1/auth/signup` - Create an account and its first session

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use parley_shared::models::{SignUpCandidate, User, UserId};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{app::AppState, error::ApiResult};

/// Sign-up request
#[derive(Debug, Deserialize, Validate)]
pub struct SignUpRequest {
    /// Unique account name
    #[validate(length(min = 1, max = 255, message = "Name must be between 1 and 255 characters"))]
    pub name: String,

    #[validate(length(min = 1, message = "Password must not be empty"))]
    pub password: String,
}

/// Sign-up response
#[derive(Debug, Serialize, Deserialize)]
pub struct SignUpResponse {
    pub id: UserId,

    pub name: String,

    /// Session the new account is signed in with
    pub session_id: String,

    pub created_at: DateTime<Utc>,
}

impl From<User> for SignUpResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            session_id: user.session_id,
            created_at: user.created_at,
        }
    }
}

/// Create a new account
///
/// # Endpoint
///
/// ```text
/// POST /v1/auth/signup
/// Content-Type: application/json
///
/// {
///   "name": "alice",
///   "password": "secret1"
/// }
/// ```
///
/// # Response
///
/// ```json
/// {
///   "id": 1,
///   "name": "alice",
///   "session_id": "2f1c...",
///   "created_at": "2024-06-01T12:00:00Z"
/// }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: Body is not valid JSON
/// - `409 Conflict`: Name already taken
/// - `422 Unprocessable Entity`: Validation failed
/// - `500 Internal Server Error`: Storage failure
/// - `503 Service Unavailable`: Server is shutting down
pub async fn signup(
    State(state): State<AppState>,
    payload: Result<Json<SignUpRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<SignUpResponse>)> {
    let Json(req) = payload?;
    req.validate()?;

    let ctx = state.shutdown.child_token();
    let user = state
        .auth
        .sign_up(&ctx, SignUpCandidate::new(req.name, req.password))
        .await?;

    tracing::info!(user_id = user.id, "Account created");

    Ok((StatusCode::CREATED, Json(SignUpResponse::from(user))))
}
