/// In-memory doubles for the persistence and credential seams
///
/// Enabled for this crate's own tests and, through the `testing` feature, for
/// downstream crates' tests.
///
/// [`MemoryDb`] is a shared store with a unique index on user names and
/// session ids, a foreign key from sessions to users and an undo log per
/// transaction. Writes are visible to other connections immediately (read
/// uncommitted), which is what lets the race tests make two sign-ups collide
/// at insert time.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::Barrier;

use crate::application::SignUpDependencies;
use crate::auth::password::{CredentialHasher, PasswordError};
use crate::db::adapter::{expect_single_row, read_error, write_error, UniqueKey};
use crate::db::manager::{DbManager, Transaction};
use crate::error::{DomainModel, DomainResult, Property, RepositoryMethod, SqlError};
use crate::models::{Session, User, UserId};
use crate::repository::{SessionRepository, UserRepository};
use crate::service::{DefaultSessionService, DefaultUserService};

/// Failure points that can be switched on in a [`MemoryDb`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fault {
    /// Every read fails with a driver error
    ReadDriverError,
    /// `insert_user` reports zero affected rows without writing
    InsertUserNoRows,
    InsertUserDriverError,
    /// `insert_session` reports zero affected rows without writing
    InsertSessionNoRows,
    InsertSessionDriverError,
    /// `insert_session` never completes
    InsertSessionStall,
    /// `begin` never acquires a connection, like a saturated pool
    BeginStall,
    Begin,
    /// Commit fails; the transaction's writes are discarded
    Commit,
    /// Rollback reports failure; the writes are still discarded
    Rollback,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    pub begins: usize,
    pub commits: usize,
    pub rollbacks: usize,
    pub name_probes: usize,
    pub session_probes: usize,
}

#[derive(Debug)]
struct State {
    users: BTreeMap<UserId, User>,
    sessions: BTreeMap<String, Session>,
    next_id: UserId,
    faults: HashSet<Fault>,
    counters: Counters,
    name_probe_barrier: Option<Arc<Barrier>>,
}

impl Default for State {
    fn default() -> Self {
        Self {
            users: BTreeMap::new(),
            sessions: BTreeMap::new(),
            next_id: 1,
            faults: HashSet::new(),
            counters: Counters::default(),
            name_probe_barrier: None,
        }
    }
}

#[derive(Debug)]
enum Undo {
    RemoveUser(UserId),
    RestoreUser(User),
    RemoveSession(String),
    RestoreSession(Session),
}

/// Shared in-memory store
#[derive(Debug, Clone, Default)]
pub struct MemoryDb {
    state: Arc<Mutex<State>>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Autocommit connection; its writes are never undone
    pub fn connect(&self) -> MemoryConn {
        MemoryConn {
            db: self.clone(),
            undo: Vec::new(),
        }
    }

    /// Stores a committed user and its session, returning the user's id
    pub fn seed_user(&self, name: &str, session_id: &str) -> UserId {
        let mut state = self.lock();
        let id = state.next_id;
        state.next_id += 1;

        let mut user = User::new(name, PlainHasher::hashed("seeded"));
        user.id = id;
        user.session_id = session_id.to_string();
        state.users.insert(id, user);
        state
            .sessions
            .insert(session_id.to_string(), Session::new(session_id, id));
        id
    }

    pub fn inject(&self, fault: Fault) {
        self.lock().faults.insert(fault);
    }

    pub fn clear(&self, fault: Fault) {
        self.lock().faults.remove(&fault);
    }

    pub fn fail_reads_with_driver_error(&self) {
        self.inject(Fault::ReadDriverError);
    }

    /// Every name probe waits on `barrier` after reading
    pub fn hold_after_name_probe(&self, barrier: Arc<Barrier>) {
        self.lock().name_probe_barrier = Some(barrier);
    }

    pub fn users(&self) -> Vec<User> {
        self.lock().users.values().cloned().collect()
    }

    pub fn sessions(&self) -> Vec<Session> {
        self.lock().sessions.values().cloned().collect()
    }

    pub fn user_by_name(&self, name: &str) -> Option<User> {
        self.lock().users.values().find(|u| u.name == name).cloned()
    }

    pub fn user_count(&self) -> usize {
        self.lock().users.len()
    }

    pub fn session_count(&self) -> usize {
        self.lock().sessions.len()
    }

    pub fn counters(&self) -> Counters {
        self.lock().counters
    }

    pub fn session_probe_count(&self) -> usize {
        self.lock().counters.session_probes
    }

    fn has_fault(&self, fault: Fault) -> bool {
        self.lock().faults.contains(&fault)
    }

    fn apply_undo(&self, undo: Vec<Undo>) {
        let mut state = self.lock();
        for step in undo.into_iter().rev() {
            match step {
                Undo::RemoveUser(id) => {
                    state.users.remove(&id);
                }
                Undo::RestoreUser(user) => {
                    state.users.insert(user.id, user);
                }
                Undo::RemoveSession(id) => {
                    state.sessions.remove(&id);
                }
                Undo::RestoreSession(session) => {
                    state.sessions.insert(session.id.clone(), session);
                }
            }
        }
    }
}

fn driver_error(what: &str) -> sqlx::Error {
    sqlx::Error::Protocol(format!("injected {} failure", what))
}

/// PostgreSQL `23505` as the driver reports it
#[derive(Debug)]
pub struct UniqueViolation {
    constraint: &'static str,
    message: String,
}

impl fmt::Display for UniqueViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for UniqueViolation {}

impl sqlx::error::DatabaseError for UniqueViolation {
    fn message(&self) -> &str {
        &self.message
    }

    fn code(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed("23505"))
    }

    fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        self
    }

    fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
        self
    }

    fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
        self
    }

    fn constraint(&self) -> Option<&str> {
        Some(self.constraint)
    }

    fn kind(&self) -> sqlx::error::ErrorKind {
        sqlx::error::ErrorKind::UniqueViolation
    }
}

/// A unique violation on `constraint`, e.g. `users_name_key`
pub fn unique_violation(constraint: &'static str) -> sqlx::Error {
    sqlx::Error::Database(Box::new(UniqueViolation {
        constraint,
        message: format!(
            "duplicate key value violates unique constraint \"{}\"",
            constraint
        ),
    }))
}

/// Connection to a [`MemoryDb`]
#[derive(Debug)]
pub struct MemoryConn {
    db: MemoryDb,
    undo: Vec<Undo>,
}

/// Transaction on a [`MemoryDb`]; rolled back on drop unless finished
#[derive(Debug)]
pub struct MemoryTx {
    conn: MemoryConn,
    finished: bool,
}

impl MemoryTx {
    fn discard(&mut self) {
        self.finished = true;
        let undo = std::mem::take(&mut self.conn.undo);
        self.conn.db.apply_undo(undo);
    }
}

impl Drop for MemoryTx {
    fn drop(&mut self) {
        if !self.finished {
            self.discard();
        }
    }
}

#[async_trait]
impl DbManager for MemoryDb {
    type Tx = MemoryTx;

    async fn begin(&self) -> DomainResult<MemoryTx> {
        if self.has_fault(Fault::BeginStall) {
            std::future::pending::<()>().await;
        }

        let mut state = self.lock();
        if state.faults.contains(&Fault::Begin) {
            return Err(SqlError::new(driver_error("begin"), "failed to begin transaction").into());
        }
        state.counters.begins += 1;
        drop(state);

        Ok(MemoryTx {
            conn: self.connect(),
            finished: false,
        })
    }
}

#[async_trait]
impl Transaction for MemoryTx {
    type Conn = MemoryConn;

    fn connection(&mut self) -> &mut MemoryConn {
        &mut self.conn
    }

    async fn commit(mut self) -> DomainResult<()> {
        if self.conn.db.has_fault(Fault::Commit) {
            self.discard();
            return Err(SqlError::new(driver_error("commit"), "failed to commit transaction").into());
        }
        self.finished = true;
        self.conn.undo.clear();
        self.conn.db.lock().counters.commits += 1;
        Ok(())
    }

    async fn rollback(mut self) -> DomainResult<()> {
        self.discard();
        if self.conn.db.has_fault(Fault::Rollback) {
            return Err(
                SqlError::new(driver_error("rollback"), "failed to roll back transaction").into(),
            );
        }
        self.conn.db.lock().counters.rollbacks += 1;
        Ok(())
    }
}

/// [`UserRepository`] over [`MemoryConn`]
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryUserRepository;

#[async_trait]
impl UserRepository<MemoryConn> for MemoryUserRepository {
    async fn insert_user(&self, conn: &mut MemoryConn, user: &User) -> DomainResult<UserId> {
        let mut state = conn.db.lock();
        if state.faults.contains(&Fault::InsertUserDriverError) {
            return Err(write_error(
                driver_error("insert user"),
                RepositoryMethod::Insert,
                DomainModel::User,
                None,
            ));
        }
        if state.faults.contains(&Fault::InsertUserNoRows) {
            drop(state);
            expect_single_row(0, RepositoryMethod::Insert, DomainModel::User)?;
            return Ok(0);
        }
        if state.users.values().any(|u| u.name == user.name) {
            return Err(write_error(
                unique_violation("users_name_key"),
                RepositoryMethod::Insert,
                DomainModel::User,
                Some(UniqueKey::new(Property::Name, &user.name)),
            ));
        }

        let id = state.next_id;
        state.next_id += 1;
        let mut stored = user.clone();
        stored.id = id;
        state.users.insert(id, stored);
        drop(state);

        conn.undo.push(Undo::RemoveUser(id));
        Ok(id)
    }

    async fn get_user_by_id(&self, conn: &mut MemoryConn, id: UserId) -> DomainResult<User> {
        let state = conn.db.lock();
        if state.faults.contains(&Fault::ReadDriverError) {
            return Err(read_error(driver_error("read"), Property::Id, id, DomainModel::User));
        }
        state
            .users
            .get(&id)
            .cloned()
            .ok_or_else(|| read_error(sqlx::Error::RowNotFound, Property::Id, id, DomainModel::User))
    }

    async fn get_user_by_name(&self, conn: &mut MemoryConn, name: &str) -> DomainResult<User> {
        let (found, barrier) = {
            let mut state = conn.db.lock();
            state.counters.name_probes += 1;
            if state.faults.contains(&Fault::ReadDriverError) {
                return Err(read_error(
                    driver_error("read"),
                    Property::Name,
                    name,
                    DomainModel::User,
                ));
            }
            let found = state.users.values().find(|u| u.name == name).cloned();
            (found, state.name_probe_barrier.clone())
        };

        if let Some(barrier) = barrier {
            barrier.wait().await;
        }

        found.ok_or_else(|| {
            read_error(sqlx::Error::RowNotFound, Property::Name, name, DomainModel::User)
        })
    }

    async fn update_user(&self, conn: &mut MemoryConn, id: UserId, user: &User) -> DomainResult<()> {
        let mut state = conn.db.lock();
        let previous = state.users.get_mut(&id).map(|stored| {
            let previous = stored.clone();
            stored.session_id = user.session_id.clone();
            stored.password = user.password.clone();
            stored.updated_at = user.updated_at;
            previous
        });
        drop(state);

        let affected = match previous {
            Some(previous) => {
                conn.undo.push(Undo::RestoreUser(previous));
                1
            }
            None => 0,
        };
        expect_single_row(affected, RepositoryMethod::Update, DomainModel::User)
    }

    async fn delete_user(&self, conn: &mut MemoryConn, id: UserId) -> DomainResult<()> {
        let mut state = conn.db.lock();
        let Some(user) = state.users.remove(&id) else {
            drop(state);
            return expect_single_row(0, RepositoryMethod::Delete, DomainModel::User);
        };

        let owned: Vec<String> = state
            .sessions
            .values()
            .filter(|s| s.user_id == id)
            .map(|s| s.id.clone())
            .collect();
        let cascaded: Vec<Session> = owned
            .iter()
            .filter_map(|sid| state.sessions.remove(sid))
            .collect();
        drop(state);

        conn.undo.push(Undo::RestoreUser(user));
        conn.undo
            .extend(cascaded.into_iter().map(Undo::RestoreSession));
        Ok(())
    }
}

/// [`SessionRepository`] over [`MemoryConn`]
#[derive(Debug, Clone, Copy, Default)]
pub struct MemorySessionRepository;

#[async_trait]
impl SessionRepository<MemoryConn> for MemorySessionRepository {
    async fn insert_session(&self, conn: &mut MemoryConn, session: &Session) -> DomainResult<()> {
        if conn.db.has_fault(Fault::InsertSessionStall) {
            std::future::pending::<()>().await;
        }

        let mut state = conn.db.lock();
        if state.faults.contains(&Fault::InsertSessionDriverError) {
            return Err(write_error(
                driver_error("insert session"),
                RepositoryMethod::Insert,
                DomainModel::Session,
                None,
            ));
        }
        if state.faults.contains(&Fault::InsertSessionNoRows) {
            drop(state);
            return expect_single_row(0, RepositoryMethod::Insert, DomainModel::Session);
        }
        if state.sessions.contains_key(&session.id) {
            return Err(write_error(
                unique_violation("sessions_pkey"),
                RepositoryMethod::Insert,
                DomainModel::Session,
                None,
            ));
        }
        if !state.users.contains_key(&session.user_id) {
            return Err(write_error(
                sqlx::Error::Protocol("violates foreign key constraint on user_id".into()),
                RepositoryMethod::Insert,
                DomainModel::Session,
                None,
            ));
        }

        state.sessions.insert(session.id.clone(), session.clone());
        drop(state);

        conn.undo.push(Undo::RemoveSession(session.id.clone()));
        Ok(())
    }

    async fn get_session_by_id(&self, conn: &mut MemoryConn, id: &str) -> DomainResult<Session> {
        let mut state = conn.db.lock();
        state.counters.session_probes += 1;
        if state.faults.contains(&Fault::ReadDriverError) {
            return Err(read_error(driver_error("read"), Property::Id, id, DomainModel::Session));
        }
        state.sessions.get(id).cloned().ok_or_else(|| {
            read_error(sqlx::Error::RowNotFound, Property::Id, id, DomainModel::Session)
        })
    }
}

/// Memory repositories with the default services on top
pub fn memory_dependencies(hasher: Arc<dyn CredentialHasher>) -> SignUpDependencies<MemoryConn> {
    let user_repository = Arc::new(MemoryUserRepository);
    let session_repository = Arc::new(MemorySessionRepository);

    SignUpDependencies {
        users: Arc::new(DefaultUserService::<MemoryConn, _>::new(
            user_repository.clone(),
            hasher,
        )),
        sessions: Arc::new(DefaultSessionService::<MemoryConn, _>::new(
            session_repository.clone(),
        )),
        user_repository,
        session_repository,
    }
}

/// Reversible stand-in for a real hasher
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainHasher;

impl PlainHasher {
    pub fn hashed(raw_password: &str) -> String {
        format!("plain${}", raw_password)
    }
}

impl CredentialHasher for PlainHasher {
    fn hash(&self, raw_password: &str) -> Result<String, PasswordError> {
        Ok(Self::hashed(raw_password))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FailingHasher;

impl CredentialHasher for FailingHasher {
    fn hash(&self, _raw_password: &str) -> Result<String, PasswordError> {
        Err(PasswordError::HashError("hasher unavailable".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::manager::close_transaction;
    use crate::error::{DomainError, ErrorKind};

    async fn insert_alice(tx: &mut MemoryTx) -> UserId {
        MemoryUserRepository
            .insert_user(tx.connection(), &User::new("alice", "h"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_close_transaction_commits_on_success() {
        let db = MemoryDb::new();
        let mut tx = db.begin().await.unwrap();
        let id = insert_alice(&mut tx).await;

        let value = close_transaction(tx, Ok(id)).await.unwrap();

        assert_eq!(value, id);
        assert_eq!(db.user_count(), 1);
        assert_eq!(db.counters().commits, 1);
        assert_eq!(db.counters().rollbacks, 0);
    }

    #[tokio::test]
    async fn test_close_transaction_rolls_back_on_failure() {
        let db = MemoryDb::new();
        let mut tx = db.begin().await.unwrap();
        insert_alice(&mut tx).await;

        let outcome: DomainResult<()> = Err(DomainError::Cancelled { during: "test" });
        let err = close_transaction(tx, outcome).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert_eq!(db.user_count(), 0);
        assert_eq!(db.counters().rollbacks, 1);
    }

    #[tokio::test]
    async fn test_close_transaction_reports_failed_rollback() {
        let db = MemoryDb::new();
        db.inject(Fault::Rollback);
        let tx = db.begin().await.unwrap();

        let outcome: DomainResult<()> = Err(DomainError::Cancelled { during: "test" });
        let err = close_transaction(tx, outcome).await.unwrap_err();

        assert!(matches!(err, DomainError::RollbackFailed { .. }));
        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert!(err.to_string().contains("rollback also failed"));
    }

    #[tokio::test]
    async fn test_close_transaction_surfaces_commit_failure() {
        let db = MemoryDb::new();
        db.inject(Fault::Commit);
        let mut tx = db.begin().await.unwrap();
        insert_alice(&mut tx).await;

        let err = close_transaction(tx, Ok(())).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Sql);
        assert_eq!(db.user_count(), 0);
    }

    #[tokio::test]
    async fn test_dropped_transaction_is_rolled_back() {
        let db = MemoryDb::new();
        {
            let mut tx = db.begin().await.unwrap();
            insert_alice(&mut tx).await;
            assert_eq!(db.user_count(), 1);
        }
        assert_eq!(db.user_count(), 0);
    }

    #[tokio::test]
    async fn test_delete_user_cascades_and_rolls_back() {
        let db = MemoryDb::new();
        let id = db.seed_user("alice", "sess-alice");

        let mut tx = db.begin().await.unwrap();
        MemoryUserRepository
            .delete_user(tx.connection(), id)
            .await
            .unwrap();
        assert_eq!(db.session_count(), 0);
        tx.rollback().await.unwrap();

        assert_eq!(db.user_count(), 1);
        assert_eq!(db.session_count(), 1);
    }

    #[tokio::test]
    async fn test_update_missing_user_is_repository_error() {
        let db = MemoryDb::new();
        let mut conn = db.connect();

        let err = MemoryUserRepository
            .update_user(&mut conn, 42, &User::new("ghost", "h"))
            .await
            .unwrap_err();

        assert_eq!(err.as_repository().unwrap().method, RepositoryMethod::Update);
    }

    #[tokio::test]
    async fn test_session_insert_requires_owner() {
        let db = MemoryDb::new();
        let mut conn = db.connect();

        let err = MemorySessionRepository
            .insert_session(&mut conn, &Session::new("orphan", 99))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Repository);
        assert_eq!(db.session_count(), 0);
    }

    #[tokio::test]
    async fn test_session_id_collision_is_not_reported_to_caller() {
        let db = MemoryDb::new();
        let owner = db.seed_user("alice", "sess-alice");
        let mut conn = db.connect();

        let err = MemorySessionRepository
            .insert_session(&mut conn, &Session::new("sess-alice", owner))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Repository);
        assert!(err.as_already_exist().is_none());
        assert!(!err.message_for_user().contains("sess-alice"));
        assert_eq!(db.session_count(), 1);
    }
}
