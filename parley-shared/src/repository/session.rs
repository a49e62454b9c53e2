/// PostgreSQL session repository

use async_trait::async_trait;
use sqlx::PgConnection;
use tracing::{debug, instrument};

use super::SessionRepository;
use crate::db::adapter::{expect_single_row, read_error, write_error};
use crate::error::{DomainError, DomainModel, DomainResult, Property, RepositoryMethod};
use crate::models::Session;

#[derive(Debug, Clone, Copy, Default)]
pub struct PgSessionRepository;

impl PgSessionRepository {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SessionRepository<PgConnection> for PgSessionRepository {
    #[instrument(skip_all, fields(user_id = session.user_id))]
    async fn insert_session(&self, conn: &mut PgConnection, session: &Session) -> DomainResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO sessions (id, user_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&session.id)
        .bind(session.user_id)
        .bind(session.created_at)
        .bind(session.updated_at)
        .execute(&mut *conn)
        .await
        .map_err(insert_error)?;

        expect_single_row(result.rows_affected(), RepositoryMethod::Insert, DomainModel::Session)?;
        debug!("Inserted session");
        Ok(())
    }

    async fn get_session_by_id(&self, conn: &mut PgConnection, id: &str) -> DomainResult<Session> {
        sqlx::query_as::<_, Session>(
            "SELECT id, user_id, created_at, updated_at FROM sessions WHERE id = $1",
        )
        .bind(id)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| read_error(e, Property::Id, id, DomainModel::Session))
    }
}

/// Session ids are server-drawn, so a `sessions_pkey` collision is an
/// internal failure and its value never reaches the caller
fn insert_error(err: sqlx::Error) -> DomainError {
    write_error(err, RepositoryMethod::Insert, DomainModel::Session, None)
}
