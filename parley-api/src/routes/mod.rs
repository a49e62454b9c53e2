/// API route handlers
///
/// - `health`: Health check endpoint
/// - `auth`: Account sign-up

pub mod auth;
pub mod health;
