/// Repository capabilities
///
/// Repositories are generic over the connection `C` they execute against so
/// they can take part in a caller's transaction. `PgConnection` is the
/// production connection; pool connections deref to it, so the same
/// repositories also serve one-off reads outside a transaction:
///
/// ```no_run
/// use parley_shared::repository::{PgUserRepository, UserRepository};
///
/// # async fn example(pool: sqlx::PgPool) -> Result<(), Box<dyn std::error::Error>> {
/// let repo = PgUserRepository::new();
/// let mut conn = pool.acquire().await?;
/// let user = repo.get_user_by_name(&mut *conn, "alice").await?;
/// # Ok(())
/// # }
/// ```
///
/// Every write returns `RepositoryError` unless exactly one row was affected;
/// every single-row read returns `NoSuchDataError` when nothing matched.

use async_trait::async_trait;

use crate::error::DomainResult;
use crate::models::{Session, User, UserId};

pub mod session;
pub mod user;

pub use session::PgSessionRepository;
pub use user::PgUserRepository;

#[async_trait]
pub trait UserRepository<C: Send + 'static>: Send + Sync {
    /// Inserts the user and returns the storage-assigned id
    async fn insert_user(&self, conn: &mut C, user: &User) -> DomainResult<UserId>;

    async fn get_user_by_id(&self, conn: &mut C, id: UserId) -> DomainResult<User>;

    async fn get_user_by_name(&self, conn: &mut C, name: &str) -> DomainResult<User>;

    /// Updates session id, password and `updated_at` of user `id`
    async fn update_user(&self, conn: &mut C, id: UserId, user: &User) -> DomainResult<()>;

    async fn delete_user(&self, conn: &mut C, id: UserId) -> DomainResult<()>;
}

#[async_trait]
pub trait SessionRepository<C: Send + 'static>: Send + Sync {
    async fn insert_session(&self, conn: &mut C, session: &Session) -> DomainResult<()>;

    async fn get_session_by_id(&self, conn: &mut C, id: &str) -> DomainResult<Session>;
}
