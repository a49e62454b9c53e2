/// Session domain service and session identifier allocation
///
/// [`SessionIdAllocator`] draws identifiers from
/// [`SessionService::session_id`] and probes each one with
/// [`SessionService::is_already_exist_id`] until a free one is found. It runs
/// inside the provisioning transaction, so the transaction stays open for the
/// whole loop.

use std::marker::PhantomData;
use std::num::NonZeroU32;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{DomainModel, DomainResult, RepositoryError, RepositoryMethod};
use crate::models::{Session, UserId};
use crate::repository::SessionRepository;

/// Suggested bound on identifier draws per allocation; the server's
/// configuration default
pub const DEFAULT_MAX_ATTEMPTS: u32 = 16;

#[async_trait]
pub trait SessionService<C: Send + 'static>: Send + Sync {
    /// Draws a fresh, not yet probed session identifier
    fn session_id(&self) -> String;

    fn new_session(&self, id: &str, user_id: UserId) -> Session;

    /// `Ok(true)` when a session with `id` exists
    async fn is_already_exist_id(&self, conn: &mut C, id: &str) -> DomainResult<bool>;
}

type IdGenerator = Arc<dyn Fn() -> String + Send + Sync>;

/// [`SessionService`] backed by a [`SessionRepository`], drawing UUID v4
/// identifiers unless another generator is supplied
pub struct DefaultSessionService<C, R: ?Sized> {
    repository: Arc<R>,
    generator: IdGenerator,
    _conn: PhantomData<fn(&mut C)>,
}

impl<C, R> DefaultSessionService<C, R>
where
    C: Send + 'static,
    R: SessionRepository<C> + ?Sized,
{
    pub fn new(repository: Arc<R>) -> Self {
        Self::with_generator(repository, || Uuid::new_v4().to_string())
    }

    pub fn with_generator<F>(repository: Arc<R>, generator: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        Self {
            repository,
            generator: Arc::new(generator),
            _conn: PhantomData,
        }
    }
}

#[async_trait]
impl<C, R> SessionService<C> for DefaultSessionService<C, R>
where
    C: Send + 'static,
    R: SessionRepository<C> + ?Sized + 'static,
{
    fn session_id(&self) -> String {
        (self.generator)()
    }

    fn new_session(&self, id: &str, user_id: UserId) -> Session {
        Session::new(id, user_id)
    }

    async fn is_already_exist_id(&self, conn: &mut C, id: &str) -> DomainResult<bool> {
        match self.repository.get_session_by_id(conn, id).await {
            Ok(_) => Ok(true),
            Err(err) if err.is_no_such_data() => Ok(false),
            Err(err) => Err(err.context("failed to get session by id")),
        }
    }
}

/// Retry-until-unique session identifier allocation
///
/// The default never gives up; a bound is opt-in through [`Self::new`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionIdAllocator {
    max_attempts: Option<NonZeroU32>,
}

impl SessionIdAllocator {
    /// `None` never gives up; only sensible while the generator has UUID-class
    /// entropy
    pub fn new(max_attempts: Option<NonZeroU32>) -> Self {
        Self { max_attempts }
    }

    pub fn unbounded() -> Self {
        Self { max_attempts: None }
    }

    pub fn max_attempts(&self) -> Option<NonZeroU32> {
        self.max_attempts
    }

    /// Returns the first drawn identifier that no session currently uses
    ///
    /// # Errors
    ///
    /// - the probe's infrastructure error, unchanged
    /// - `RepositoryError{INSERT, Session}` once `max_attempts` identifiers
    ///   were all taken
    pub async fn allocate<C, S>(&self, service: &S, conn: &mut C) -> DomainResult<String>
    where
        C: Send + 'static,
        S: SessionService<C> + ?Sized,
    {
        let mut attempts: u32 = 0;
        loop {
            if let Some(max) = self.max_attempts {
                if attempts >= max.get() {
                    warn!(attempts, "Session id allocation exhausted");
                    return Err(RepositoryError::new(
                        RepositoryMethod::Insert,
                        DomainModel::Session,
                        format!("no free session id after {} attempts", attempts),
                    )
                    .into());
                }
            }
            attempts += 1;

            let id = service.session_id();
            if !service.is_already_exist_id(conn, &id).await? {
                debug!(attempts, "Allocated session id");
                return Ok(id);
            }
            debug!(attempts, "Session id collision, drawing again");
        }
    }
}
