/// Unit of work
///
/// [`DbManager`] opens transactions; a [`Transaction`] hands out the
/// connection that repositories execute against and is finished with exactly
/// one of `commit` or `rollback`. A transaction dropped without either is
/// rolled back by the driver, which is how cancellation ends up atomic.
///
/// Repositories and services are generic over the connection type
/// (`Transaction::Conn`), so the same orchestrator runs against PostgreSQL
/// ([`PgDbManager`]) or the in-memory doubles in `crate::testing`.

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool, Postgres};
use tracing::debug;

use crate::error::{DomainResult, SqlError};

/// Opens transactions on the shared pool
#[async_trait]
pub trait DbManager: Send + Sync {
    type Tx: Transaction;

    async fn begin(&self) -> DomainResult<Self::Tx>;
}

/// An open transaction
#[async_trait]
pub trait Transaction: Send + Sized {
    /// Connection type repositories execute against
    type Conn: Send + 'static;

    fn connection(&mut self) -> &mut Self::Conn;

    async fn commit(self) -> DomainResult<()>;

    async fn rollback(self) -> DomainResult<()>;
}

/// Connection type reachable through a manager's transactions
pub type ConnOf<M> = <<M as DbManager>::Tx as Transaction>::Conn;

/// PostgreSQL-backed [`DbManager`]
#[derive(Debug, Clone)]
pub struct PgDbManager {
    pool: PgPool,
}

impl PgDbManager {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl DbManager for PgDbManager {
    type Tx = sqlx::Transaction<'static, Postgres>;

    async fn begin(&self) -> DomainResult<Self::Tx> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| SqlError::new(e, "failed to begin transaction"))?;
        debug!("Transaction started");
        Ok(tx)
    }
}

#[async_trait]
impl Transaction for sqlx::Transaction<'static, Postgres> {
    type Conn = PgConnection;

    fn connection(&mut self) -> &mut PgConnection {
        &mut **self
    }

    async fn commit(self) -> DomainResult<()> {
        sqlx::Transaction::commit(self)
            .await
            .map_err(|e| SqlError::new(e, "failed to commit transaction"))?;
        debug!("Transaction committed");
        Ok(())
    }

    async fn rollback(self) -> DomainResult<()> {
        sqlx::Transaction::rollback(self)
            .await
            .map_err(|e| SqlError::new(e, "failed to roll back transaction"))?;
        debug!("Transaction rolled back");
        Ok(())
    }
}

/// Finishes a transaction according to the outcome of the work done in it
///
/// `Ok` commits, `Err` rolls back. A failed commit is returned wrapped; a
/// failed rollback is returned as `RollbackFailed`, keeping the original
/// error as the classifiable source.
pub async fn close_transaction<T, R>(tx: T, outcome: DomainResult<R>) -> DomainResult<R>
where
    T: Transaction,
    R: Send,
{
    match outcome {
        Ok(value) => {
            tx.commit()
                .await
                .map_err(|e| e.context("failed to close transaction"))?;
            Ok(value)
        }
        Err(err) => match tx.rollback().await {
            Ok(()) => Err(err),
            Err(rollback) => Err(crate::error::DomainError::RollbackFailed {
                source: Box::new(err),
                rollback: Box::new(rollback.context("failed to close transaction")),
            }),
        },
    }
}
