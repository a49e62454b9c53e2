/// Account provisioning
///
/// [`SignUpService`] creates a user and its first session as one unit of
/// work:
///
/// 1. build the user (validation and hashing, no I/O)
/// 2. begin a transaction
/// 3. reject a taken name before any write
/// 4. allocate a session id
/// 5. insert the user, then the session
/// 6. commit, or roll back on any failure or cancellation
///
/// The name pre-check only saves a write in the common case. The unique
/// constraint on `users.name` decides concurrent sign-ups for the same name;
/// the loser gets the same `AlreadyExistError` either way.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use parley_shared::application::{AuthenticationService, SignUpDependencies, SignUpService};
/// use parley_shared::auth::password::Argon2Hasher;
/// use parley_shared::db::manager::PgDbManager;
/// use parley_shared::models::SignUpCandidate;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example(pool: sqlx::PgPool) -> Result<(), Box<dyn std::error::Error>> {
/// let service = SignUpService::new(
///     Arc::new(PgDbManager::new(pool)),
///     SignUpDependencies::postgres(Arc::new(Argon2Hasher)),
/// );
///
/// let user = service
///     .sign_up(&CancellationToken::new(), SignUpCandidate::new("alice", "secret1"))
///     .await?;
/// println!("{} signed in with session {}", user.name, user.session_id);
/// # Ok(())
/// # }
/// ```

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgConnection;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use crate::auth::password::CredentialHasher;
use crate::db::manager::{close_transaction, ConnOf, DbManager, Transaction};
use crate::error::{AlreadyExistError, DomainError, DomainModel, DomainResult, Property, ResultExt};
use crate::models::{SignUpCandidate, User};
use crate::repository::{
    PgSessionRepository, PgUserRepository, SessionRepository, UserRepository,
};
use crate::service::{
    DefaultSessionService, DefaultUserService, SessionIdAllocator, SessionService, UserService,
};

#[async_trait]
pub trait AuthenticationService: Send + Sync {
    /// Provisions a new account with its first session
    ///
    /// # Errors
    ///
    /// - `InvalidDataError` / `Credential` when the candidate cannot be turned
    ///   into a user; nothing is opened
    /// - `AlreadyExistError{name}` when the name is taken
    /// - `RepositoryError` / `SqlError` on storage failure
    /// - `Cancelled` when `ctx` fires before commit, including while a
    ///   connection is still being acquired
    ///
    /// Every error after the transaction opened leaves no rows behind.
    async fn sign_up(
        &self,
        ctx: &CancellationToken,
        candidate: SignUpCandidate,
    ) -> DomainResult<User>;
}

/// Collaborators of [`SignUpService`], all executing on connection `C`
pub struct SignUpDependencies<C: Send + 'static> {
    pub users: Arc<dyn UserService<C>>,
    pub sessions: Arc<dyn SessionService<C>>,
    pub user_repository: Arc<dyn UserRepository<C>>,
    pub session_repository: Arc<dyn SessionRepository<C>>,
}

impl<C: Send + 'static> Clone for SignUpDependencies<C> {
    fn clone(&self) -> Self {
        Self {
            users: Arc::clone(&self.users),
            sessions: Arc::clone(&self.sessions),
            user_repository: Arc::clone(&self.user_repository),
            session_repository: Arc::clone(&self.session_repository),
        }
    }
}

impl SignUpDependencies<PgConnection> {
    /// PostgreSQL repositories with the default services on top
    pub fn postgres(hasher: Arc<dyn CredentialHasher>) -> Self {
        let user_repository = Arc::new(PgUserRepository::new());
        let session_repository = Arc::new(PgSessionRepository::new());

        Self {
            users: Arc::new(DefaultUserService::<PgConnection, _>::new(
                user_repository.clone(),
                hasher,
            )),
            sessions: Arc::new(DefaultSessionService::<PgConnection, _>::new(
                session_repository.clone(),
            )),
            user_repository,
            session_repository,
        }
    }
}

/// [`AuthenticationService`] running each sign-up in one transaction of `M`
pub struct SignUpService<M: DbManager> {
    manager: Arc<M>,
    deps: SignUpDependencies<ConnOf<M>>,
    allocator: SessionIdAllocator,
}

impl<M: DbManager> SignUpService<M> {
    pub fn new(manager: Arc<M>, deps: SignUpDependencies<ConnOf<M>>) -> Self {
        Self {
            manager,
            deps,
            allocator: SessionIdAllocator::default(),
        }
    }

    pub fn with_allocator(mut self, allocator: SessionIdAllocator) -> Self {
        self.allocator = allocator;
        self
    }

    async fn provision(&self, conn: &mut ConnOf<M>, mut user: User) -> DomainResult<User> {
        let taken = self
            .deps
            .users
            .is_already_exist_name(conn, &user.name)
            .await
            .context("failed to check whether name already exists")?;
        if taken {
            return Err(AlreadyExistError::new(Property::Name, &user.name, DomainModel::User).into());
        }

        let session_id = self
            .allocator
            .allocate(self.deps.sessions.as_ref(), conn)
            .await
            .context("failed to allocate session id")?;
        user.session_id = session_id;

        user.id = self
            .deps
            .user_repository
            .insert_user(conn, &user)
            .await
            .context("failed to insert user")?;

        let session = self.deps.sessions.new_session(&user.session_id, user.id);
        self.deps
            .session_repository
            .insert_session(conn, &session)
            .await
            .context("failed to insert session")?;

        Ok(user)
    }
}

#[async_trait]
impl<M> AuthenticationService for SignUpService<M>
where
    M: DbManager + 'static,
{
    #[instrument(skip_all, fields(name = %candidate.name))]
    async fn sign_up(
        &self,
        ctx: &CancellationToken,
        candidate: SignUpCandidate,
    ) -> DomainResult<User> {
        let user = self
            .deps
            .users
            .new_user(&candidate.name, &candidate.password)?;

        let mut tx = tokio::select! {
            biased;
            _ = ctx.cancelled() => return Err(DomainError::Cancelled { during: "begin" }),
            tx = self.manager.begin() => tx?,
        };

        let outcome = tokio::select! {
            biased;
            _ = ctx.cancelled() => Err(DomainError::Cancelled { during: "sign up" }),
            result = self.provision(tx.connection(), user) => result,
        };

        let user = close_transaction(tx, outcome).await?;
        info!(user_id = user.id, "User signed up");
        Ok(user)
    }
}
