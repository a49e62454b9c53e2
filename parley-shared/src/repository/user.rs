/// PostgreSQL user repository

use async_trait::async_trait;
use sqlx::postgres::PgQueryResult;
use sqlx::PgConnection;
use tracing::{debug, instrument};

use super::UserRepository;
use crate::db::adapter::{expect_single_row, read_error, write_error, UniqueKey};
use crate::error::{DomainModel, DomainResult, Property, RepositoryMethod};
use crate::models::{User, UserId};

const SELECT_USER: &str =
    "SELECT id, name, session_id, password, created_at, updated_at FROM users";

#[derive(Debug, Clone, Copy, Default)]
pub struct PgUserRepository;

impl PgUserRepository {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl UserRepository<PgConnection> for PgUserRepository {
    #[instrument(skip_all, fields(name = %user.name))]
    async fn insert_user(&self, conn: &mut PgConnection, user: &User) -> DomainResult<UserId> {
        // RETURNING rows stand in for the affected-row count
        let ids: Vec<UserId> = sqlx::query_scalar(
            r#"
            INSERT INTO users (name, session_id, password, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(&user.name)
        .bind(&user.session_id)
        .bind(&user.password)
        .bind(user.created_at)
        .bind(user.updated_at)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| {
            write_error(
                e,
                RepositoryMethod::Insert,
                DomainModel::User,
                Some(UniqueKey::new(Property::Name, &user.name)),
            )
        })?;

        expect_single_row(ids.len() as u64, RepositoryMethod::Insert, DomainModel::User)?;

        let id = ids[0];
        debug!(user_id = id, "Inserted user");
        Ok(id)
    }

    async fn get_user_by_id(&self, conn: &mut PgConnection, id: UserId) -> DomainResult<User> {
        sqlx::query_as::<_, User>(&format!("{} WHERE id = $1", SELECT_USER))
            .bind(id)
            .fetch_one(&mut *conn)
            .await
            .map_err(|e| read_error(e, Property::Id, id, DomainModel::User))
    }

    async fn get_user_by_name(&self, conn: &mut PgConnection, name: &str) -> DomainResult<User> {
        sqlx::query_as::<_, User>(&format!("{} WHERE name = $1", SELECT_USER))
            .bind(name)
            .fetch_one(&mut *conn)
            .await
            .map_err(|e| read_error(e, Property::Name, name, DomainModel::User))
    }

    #[instrument(skip(self, conn, user))]
    async fn update_user(
        &self,
        conn: &mut PgConnection,
        id: UserId,
        user: &User,
    ) -> DomainResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET session_id = $1, password = $2, updated_at = $3
            WHERE id = $4
            "#,
        )
        .bind(&user.session_id)
        .bind(&user.password)
        .bind(user.updated_at)
        .bind(id)
        .execute(&mut *conn)
        .await
        .map_err(|e| write_error(e, RepositoryMethod::Update, DomainModel::User, None))?;

        single_user_row(&result, RepositoryMethod::Update)
    }

    #[instrument(skip(self, conn))]
    async fn delete_user(&self, conn: &mut PgConnection, id: UserId) -> DomainResult<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *conn)
            .await
            .map_err(|e| write_error(e, RepositoryMethod::Delete, DomainModel::User, None))?;

        single_user_row(&result, RepositoryMethod::Delete)
    }
}

/// A `WHERE id = $n` statement that matched nothing is a `RepositoryError`,
/// not `NoSuchData`
fn single_user_row(result: &PgQueryResult, method: RepositoryMethod) -> DomainResult<()> {
    expect_single_row(result.rows_affected(), method, DomainModel::User)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_matching_no_row_is_repository_error() {
        let err = single_user_row(&PgQueryResult::default(), RepositoryMethod::Update).unwrap_err();

        let repo = err.as_repository().expect("repository error");
        assert_eq!(repo.method, RepositoryMethod::Update);
        assert_eq!(repo.model, DomainModel::User);
        assert!(err.as_no_such_data().is_none());
        assert_eq!(
            err.message_for_user(),
            "Failed to update the account. Please try again later."
        );
    }

    #[test]
    fn test_delete_matching_no_row_is_repository_error() {
        let err = single_user_row(&PgQueryResult::default(), RepositoryMethod::Delete).unwrap_err();

        assert_eq!(err.as_repository().unwrap().method, RepositoryMethod::Delete);
    }
}
