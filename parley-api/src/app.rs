/// Application state and router builder
///
/// This module defines the shared application state and provides
/// a function to build the Axum router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use parley_api::{app::AppState, config::Config};
/// use parley_shared::db::pool::create_pool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = create_pool(config.database.clone()).await?;
/// let state = AppState::postgres(pool, config);
/// let app = parley_api::app::build_router(state);
/// # Ok(())
/// # }
/// ```

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use parley_shared::application::{AuthenticationService, SignUpDependencies, SignUpService};
use parley_shared::auth::password::Argon2Hasher;
use parley_shared::db::manager::PgDbManager;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::config::Config;

/// Shared application state
///
/// This is cloned for each request handler via Axum's `State` extractor.
/// Uses Arc internally for cheap cloning.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: PgPool,

    /// Account provisioning
    pub auth: Arc<dyn AuthenticationService>,

    /// Application configuration
    pub config: Arc<Config>,

    /// Cancelled when the server starts shutting down
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(db: PgPool, auth: Arc<dyn AuthenticationService>, config: Config) -> Self {
        Self {
            db,
            auth,
            config: Arc::new(config),
            shutdown: CancellationToken::new(),
        }
    }

    /// State backed by PostgreSQL repositories and Argon2id hashing
    pub fn postgres(db: PgPool, config: Config) -> Self {
        let auth = SignUpService::new(
            Arc::new(PgDbManager::new(db.clone())),
            SignUpDependencies::postgres(Arc::new(Argon2Hasher)),
        )
        .with_allocator(config.signup.allocator());

        Self::new(db, Arc::new(auth), config)
    }

    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// ```text
/// /
/// ├── GET  /health              # Health check
/// └── /v1/
///     └── /auth/
///         └── POST /signup      # Create account and first session
/// ```
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    let auth_routes = Router::new().route("/signup", post(routes::auth::signup));

    let v1_routes = Router::new().nest("/auth", auth_routes);

    Router::new()
        .merge(health_routes)
        .nest("/v1", v1_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}
