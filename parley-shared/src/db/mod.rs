/// Database layer
///
/// - `pool`: PostgreSQL pool lifecycle and health checks
/// - `migrations`: embedded schema migrations
/// - `manager`: unit of work (`DbManager`, `Transaction`)
/// - `adapter`: affected-row validation and driver error classification
///
/// # Example
///
/// ```no_run
/// use parley_shared::db::manager::{DbManager, PgDbManager, Transaction};
/// use parley_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig {
///     url: std::env::var("DATABASE_URL")?,
///     ..Default::default()
/// })
/// .await?;
///
/// let manager = PgDbManager::new(pool);
/// let tx = manager.begin().await?;
/// Transaction::commit(tx).await?;
/// # Ok(())
/// # }
/// ```

pub mod adapter;
pub mod manager;
pub mod migrations;
pub mod pool;
