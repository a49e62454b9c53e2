/// Domain models
///
/// - `user`: user accounts and the sign-up candidate
/// - `session`: login sessions owned by a user
///
/// A successfully provisioned pair always satisfies
/// `user.session_id == session.id` and `session.user_id == user.id`.

pub mod session;
pub mod user;

pub use session::Session;
pub use user::{SignUpCandidate, User, UserId};
