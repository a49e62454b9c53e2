/// Domain services
///
/// - `user`: user construction and the name-uniqueness probe
/// - `session`: session construction, the id-uniqueness probe and
///   [`SessionIdAllocator`](session::SessionIdAllocator)
///
/// Probes turn `NoSuchDataError` into `Ok(false)`; every other repository
/// error is propagated.

pub mod session;
pub mod user;

pub use session::{DefaultSessionService, SessionIdAllocator, SessionService};
pub use user::{DefaultUserService, UserService};
