//! # Parley Shared Library
//!
//! Account provisioning core used by the Parley API server: the domain model,
//! error taxonomy, persistence adapters and the sign-up unit of work.
//!
//! ## Module Organization
//!
//! - `application`: Sign-up orchestration (`AuthenticationService`)
//! - `auth`: Credential hashing
//! - `db`: Connection pool, migrations, transactions and adapter helpers
//! - `error`: `DomainError` and its kinds
//! - `models`: User and session records
//! - `repository`: Persistence capabilities and their PostgreSQL implementations
//! - `service`: Uniqueness probes and session id allocation
//! - `testing`: In-memory doubles (`testing` feature)

pub mod application;
pub mod auth;
pub mod db;
pub mod error;
pub mod models;
pub mod repository;
pub mod service;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

/// Current version of the Parley shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
