/// Configuration management for the API server
///
/// This module loads configuration from environment variables and provides
/// a type-safe configuration struct.
///
/// # Environment Variables
///
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `DATABASE_MAX_CONNECTIONS`: Pool size (default: 10)
/// - `DATABASE_MIN_CONNECTIONS`: Idle connections kept open (default: 2)
/// - `API_HOST`: Host to bind to (default: 0.0.0.0)
/// - `API_PORT`: Port to bind to (default: 8080)
/// - `SESSION_ID_MAX_ATTEMPTS`: Session id draws per sign-up (default: 16, 0 = unbounded)
/// - `RUN_MIGRATIONS`: Apply embedded migrations at startup (default: true)
/// - `RUST_LOG`: Log filter (default: parley_api=debug,parley_shared=debug,tower_http=debug)
///
/// # Example
///
/// ```no_run
/// use parley_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use std::collections::HashMap;
use std::env;
use std::num::NonZeroU32;
use std::str::FromStr;

use anyhow::Context;
use parley_shared::db::pool::DatabaseConfig;
use parley_shared::service::session::DEFAULT_MAX_ATTEMPTS;
use parley_shared::service::SessionIdAllocator;

/// Complete application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// API server configuration
    pub api: ApiConfig,

    /// Connection pool configuration
    pub database: DatabaseConfig,

    /// Sign-up tuning
    pub signup: SignUpConfig,
}

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,

    /// Port to bind to
    pub port: u16,

    /// Apply pending migrations before serving
    pub run_migrations: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignUpConfig {
    /// None retries session id draws until one is free
    pub session_id_max_attempts: Option<NonZeroU32>,
}

impl Default for SignUpConfig {
    fn default() -> Self {
        Self {
            session_id_max_attempts: NonZeroU32::new(DEFAULT_MAX_ATTEMPTS),
        }
    }
}

impl SignUpConfig {
    pub fn allocator(&self) -> SessionIdAllocator {
        SessionIdAllocator::new(self.session_id_max_attempts)
    }
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `DATABASE_URL` is missing
    /// - A variable is set to a value that doesn't parse
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        Self::from_vars(env::vars().collect())
    }

    /// Builds the configuration from an explicit variable map
    pub fn from_vars(vars: HashMap<String, String>) -> anyhow::Result<Self> {
        let database_url = vars
            .get("DATABASE_URL")
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

        let defaults = DatabaseConfig::default();
        let database = DatabaseConfig {
            url: database_url,
            max_connections: parse_or(&vars, "DATABASE_MAX_CONNECTIONS", defaults.max_connections)?,
            min_connections: parse_or(&vars, "DATABASE_MIN_CONNECTIONS", defaults.min_connections)?,
            ..defaults
        };
        if database.min_connections > database.max_connections {
            anyhow::bail!("DATABASE_MIN_CONNECTIONS must not exceed DATABASE_MAX_CONNECTIONS");
        }

        let api = ApiConfig {
            host: vars
                .get("API_HOST")
                .cloned()
                .unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(&vars, "API_PORT", 8080)?,
            run_migrations: parse_or(&vars, "RUN_MIGRATIONS", true)?,
        };

        let max_attempts: u32 = parse_or(&vars, "SESSION_ID_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS)?;
        let signup = SignUpConfig {
            session_id_max_attempts: NonZeroU32::new(max_attempts),
        };

        Ok(Self {
            api,
            database,
            signup,
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }
}

fn parse_or<T>(vars: &HashMap<String, String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match vars.get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {}: {:?}", key, raw)),
        None => Ok(default),
    }
}
