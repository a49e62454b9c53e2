//! # Parley API Server
//!
//! HTTP entry point for account provisioning.
//!
//! ## Startup
//!
//! 1. Tracing (`RUST_LOG`, defaults to debug for Parley crates)
//! 2. Configuration from the environment
//! 3. Connection pool and, unless disabled, migrations
//! 4. Router with PostgreSQL-backed sign-up
//! 5. Serve until Ctrl-C / SIGTERM, cancel in-flight sign-ups, close the pool
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p parley-api
//! ```

use parley_api::app::{build_router, AppState};
use parley_api::config::Config;
use parley_shared::db::migrations::run_migrations;
use parley_shared::db::pool::{close_pool, create_pool};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "parley_api=debug,parley_shared=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        "Parley API Server v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let config = Config::from_env()?;
    let bind_address = config.bind_address();

    let pool = create_pool(config.database.clone()).await?;

    if config.api.run_migrations {
        run_migrations(&pool).await?;
    }

    let shutdown = CancellationToken::new();
    let state = AppState::postgres(pool.clone(), config).with_shutdown(shutdown.clone());
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!("Server listening on http://{}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    close_pool(pool).await;
    tracing::info!("Server stopped");

    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM and cancels `shutdown`
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, cancelling in-flight requests...");
    shutdown.cancel();
}
