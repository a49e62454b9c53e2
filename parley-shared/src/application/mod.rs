/// Application services composed from domain services and repositories

pub mod authentication;

pub use authentication::{AuthenticationService, SignUpDependencies, SignUpService};
