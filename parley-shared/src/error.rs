/// Domain error taxonomy
///
/// Every failure that crosses a layer boundary in this crate is a
/// [`DomainError`]. Each kind carries two independent renderings:
///
/// - `Display` (and therefore `to_string()`): the developer-facing message,
///   including SQL reasons and driver text. Meant for logs.
/// - [`DomainError::message_for_user`]: the user-facing message. Never
///   contains driver output or statement text.
///
/// Callers add step descriptions with [`ResultExt::context`]. Wrapping never
/// hides the original kind: [`DomainError::root`] strips every wrapping layer
/// and [`DomainError::kind`] classifies by that root.
///
/// # Example
///
/// ```
/// use parley_shared::error::{
///     AlreadyExistError, DomainError, DomainModel, ErrorKind, Property, ResultExt,
/// };
///
/// let result: Result<(), DomainError> = Err(AlreadyExistError::new(
///     Property::Name,
///     "alice",
///     DomainModel::User,
/// )
/// .into());
///
/// let err = result.context("failed to create user").unwrap_err();
/// assert_eq!(err.kind(), ErrorKind::AlreadyExist);
/// assert_eq!(err.as_already_exist().unwrap().value, "alice");
/// ```

use std::borrow::Cow;
use std::fmt;

use crate::auth::password::PasswordError;

/// Result alias used throughout the domain layer
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain models that can be named in an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DomainModel {
    User,
    Session,
}

impl DomainModel {
    /// Model name for developers (matches the table's entity name)
    pub fn for_developer(self) -> &'static str {
        match self {
            DomainModel::User => "User",
            DomainModel::Session => "Session",
        }
    }

    /// Model name shown to end users
    pub fn for_user(self) -> &'static str {
        match self {
            DomainModel::User => "account",
            DomainModel::Session => "login session",
        }
    }
}

impl fmt::Display for DomainModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.for_developer())
    }
}

/// Model properties that can be named in an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Property {
    Id,
    Name,
    SessionId,
    Password,
}

impl Property {
    /// Property name for developers (matches the column name)
    pub fn for_developer(self) -> &'static str {
        match self {
            Property::Id => "id",
            Property::Name => "name",
            Property::SessionId => "session_id",
            Property::Password => "password",
        }
    }

    /// Property name shown to end users
    pub fn for_user(self) -> &'static str {
        match self {
            Property::Id => "ID",
            Property::Name => "name",
            Property::SessionId => "session",
            Property::Password => "password",
        }
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.for_developer())
    }
}

/// Write method a repository was performing when it failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepositoryMethod {
    Insert,
    Update,
    Delete,
}

impl RepositoryMethod {
    /// SQL verb, used in developer messages
    pub fn as_sql(self) -> &'static str {
        match self {
            RepositoryMethod::Insert => "INSERT",
            RepositoryMethod::Update => "UPDATE",
            RepositoryMethod::Delete => "DELETE",
        }
    }

    /// Verb used in user-facing messages
    pub fn for_user(self) -> &'static str {
        match self {
            RepositoryMethod::Insert => "create",
            RepositoryMethod::Update => "update",
            RepositoryMethod::Delete => "delete",
        }
    }
}

impl fmt::Display for RepositoryMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// A lookup found no matching row
///
/// Expected and recoverable: existence probes turn it into `false`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("no such data: {model} with {property}={value}")]
pub struct NoSuchDataError {
    pub property: Property,
    pub value: String,
    pub model: DomainModel,
}

impl NoSuchDataError {
    pub fn new(property: Property, value: impl fmt::Display, model: DomainModel) -> Self {
        Self {
            property,
            value: value.to_string(),
            model,
        }
    }

    pub fn message_for_user(&self) -> String {
        format!(
            "No {} with {} \"{}\" exists.",
            self.model.for_user(),
            self.property.for_user(),
            self.value
        )
    }
}

/// A value that must be unique is already taken
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("already exists: {model} with {property}={value}")]
pub struct AlreadyExistError {
    pub property: Property,
    pub value: String,
    pub model: DomainModel,
}

impl AlreadyExistError {
    pub fn new(property: Property, value: impl fmt::Display, model: DomainModel) -> Self {
        Self {
            property,
            value: value.to_string(),
            model,
        }
    }

    pub fn message_for_user(&self) -> String {
        format!(
            "The {} \"{}\" is already in use by another {}.",
            self.property.for_user(),
            self.value,
            self.model.for_user()
        )
    }
}

/// A repository operation failed
///
/// Raised for driver failures during writes (with a [`SqlError`] source) and
/// for affected-row counts other than exactly one (no source).
#[derive(Debug, thiserror::Error)]
#[error("repository error: {method} {model} failed: {reason}{}", source_suffix(.source))]
pub struct RepositoryError {
    pub method: RepositoryMethod,
    pub model: DomainModel,
    pub reason: String,
    #[source]
    pub source: Option<Box<DomainError>>,
}

fn source_suffix(source: &Option<Box<DomainError>>) -> String {
    match source {
        Some(source) => format!(" ({})", source),
        None => String::new(),
    }
}

impl RepositoryError {
    pub fn new(method: RepositoryMethod, model: DomainModel, reason: impl Into<String>) -> Self {
        Self {
            method,
            model,
            reason: reason.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<DomainError>) -> Self {
        self.source = Some(Box::new(source.into()));
        self
    }

    pub fn message_for_user(&self) -> String {
        format!(
            "Failed to {} the {}. Please try again later.",
            self.method.for_user(),
            self.model.for_user()
        )
    }
}

/// Raw driver-level failure
#[derive(Debug, thiserror::Error)]
#[error("SQL error: {reason}: {source}")]
pub struct SqlError {
    pub reason: String,
    #[source]
    pub source: sqlx::Error,
}

impl SqlError {
    pub fn new(source: sqlx::Error, reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            source,
        }
    }

    pub fn message_for_user(&self) -> String {
        "A database error occurred. Please try again later.".to_string()
    }
}

/// Malformed input rejected at the boundary
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid data: {field}={value:?}: {reason}")]
pub struct InvalidDataError {
    pub field: String,
    pub value: String,
    pub reason: String,
}

impl InvalidDataError {
    pub fn new(
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    pub fn message_for_user(&self) -> String {
        format!("The {} you entered is not valid.", self.field)
    }
}

/// Classification of a [`DomainError`] by its root cause
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NoSuchData,
    AlreadyExist,
    Repository,
    Sql,
    InvalidData,
    Credential,
    Cancelled,
}

/// Every failure surfaced by the domain layer
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error(transparent)]
    NoSuchData(#[from] NoSuchDataError),

    #[error(transparent)]
    AlreadyExist(#[from] AlreadyExistError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Sql(#[from] SqlError),

    #[error(transparent)]
    InvalidData(#[from] InvalidDataError),

    #[error("credential error: {0}")]
    Credential(#[from] PasswordError),

    #[error("operation cancelled during {during}")]
    Cancelled { during: &'static str },

    /// A failure with a description of the step that produced it
    #[error("{context}: {source}")]
    Context {
        context: Cow<'static, str>,
        #[source]
        source: Box<DomainError>,
    },

    /// A failure whose rollback also failed
    ///
    /// `source` is the failure that triggered the rollback and drives
    /// classification; `rollback` is the cleanup failure.
    #[error("{source} (rollback also failed: {rollback})")]
    RollbackFailed {
        #[source]
        source: Box<DomainError>,
        rollback: Box<DomainError>,
    },
}

impl DomainError {
    /// Wraps this error with a description of the failing step
    pub fn context(self, context: impl Into<Cow<'static, str>>) -> Self {
        DomainError::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The original error under all wrapping layers
    pub fn root(&self) -> &DomainError {
        match self {
            DomainError::Context { source, .. } | DomainError::RollbackFailed { source, .. } => {
                source.root()
            }
            other => other,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self.root() {
            DomainError::NoSuchData(_) => ErrorKind::NoSuchData,
            DomainError::AlreadyExist(_) => ErrorKind::AlreadyExist,
            DomainError::Repository(_) => ErrorKind::Repository,
            DomainError::Sql(_) => ErrorKind::Sql,
            DomainError::InvalidData(_) => ErrorKind::InvalidData,
            DomainError::Credential(_) => ErrorKind::Credential,
            DomainError::Cancelled { .. } => ErrorKind::Cancelled,
            DomainError::Context { .. } | DomainError::RollbackFailed { .. } => {
                unreachable!("root() never returns a wrapping layer")
            }
        }
    }

    pub fn as_no_such_data(&self) -> Option<&NoSuchDataError> {
        match self.root() {
            DomainError::NoSuchData(err) => Some(err),
            _ => None,
        }
    }

    pub fn as_already_exist(&self) -> Option<&AlreadyExistError> {
        match self.root() {
            DomainError::AlreadyExist(err) => Some(err),
            _ => None,
        }
    }

    pub fn as_repository(&self) -> Option<&RepositoryError> {
        match self.root() {
            DomainError::Repository(err) => Some(err),
            _ => None,
        }
    }

    pub fn is_no_such_data(&self) -> bool {
        self.as_no_such_data().is_some()
    }

    /// Message safe to show to the end user
    pub fn message_for_user(&self) -> String {
        match self.root() {
            DomainError::NoSuchData(err) => err.message_for_user(),
            DomainError::AlreadyExist(err) => err.message_for_user(),
            DomainError::Repository(err) => err.message_for_user(),
            DomainError::Sql(err) => err.message_for_user(),
            DomainError::InvalidData(err) => err.message_for_user(),
            DomainError::Credential(_) => {
                "Your password could not be processed. Please try again later.".to_string()
            }
            DomainError::Cancelled { .. } => "The request was cancelled.".to_string(),
            DomainError::Context { .. } | DomainError::RollbackFailed { .. } => {
                unreachable!("root() never returns a wrapping layer")
            }
        }
    }
}

/// Adds step descriptions to fallible domain operations
pub trait ResultExt<T> {
    fn context(self, context: impl Into<Cow<'static, str>>) -> DomainResult<T>;

    fn with_context<C, F>(self, f: F) -> DomainResult<T>
    where
        C: Into<Cow<'static, str>>,
        F: FnOnce() -> C;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
    E: Into<DomainError>,
{
    fn context(self, context: impl Into<Cow<'static, str>>) -> DomainResult<T> {
        self.map_err(|err| err.into().context(context))
    }

    fn with_context<C, F>(self, f: F) -> DomainResult<T>
    where
        C: Into<Cow<'static, str>>,
        F: FnOnce() -> C,
    {
        self.map_err(|err| err.into().context(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn driver_error() -> sqlx::Error {
        sqlx::Error::Protocol("connection reset by peer".into())
    }

    #[test]
    fn test_context_preserves_kind_through_many_layers() {
        let err: DomainError = NoSuchDataError::new(Property::Name, "bob", DomainModel::User).into();
        let err = err
            .context("failed to get user by name")
            .context("failed to check name")
            .context("failed to sign up");

        assert_eq!(err.kind(), ErrorKind::NoSuchData);
        assert!(err.is_no_such_data());
        assert_eq!(err.as_no_such_data().unwrap().value, "bob");
        assert!(err.to_string().starts_with("failed to sign up: failed to check name"));
    }

    #[test]
    fn test_std_source_chain_reaches_original() {
        let err: DomainError = AlreadyExistError::new(Property::Name, "alice", DomainModel::User).into();
        let err = err.context("outer");

        let source = std::error::Error::source(&err).expect("context has a source");
        assert_eq!(source.to_string(), "already exists: User with name=alice");
    }

    #[test]
    fn test_repository_error_messages() {
        let err = RepositoryError::new(
            RepositoryMethod::Insert,
            DomainModel::Session,
            "expected 1 affected row, got 0",
        );
        assert_eq!(
            err.to_string(),
            "repository error: INSERT Session failed: expected 1 affected row, got 0"
        );
        assert_eq!(
            err.message_for_user(),
            "Failed to create the login session. Please try again later."
        );
    }

    #[test]
    fn test_sql_detail_stays_out_of_user_message() {
        let sql = SqlError::new(driver_error(), "failed to execute query");
        let err: DomainError = RepositoryError::new(
            RepositoryMethod::Update,
            DomainModel::User,
            "failed to execute statement",
        )
        .with_source(sql)
        .into();

        assert!(err.to_string().contains("failed to execute statement"));
        assert!(!err.message_for_user().contains("connection reset"));
        assert!(!err.message_for_user().contains("SQL"));

        let repo = err.as_repository().unwrap();
        assert!(matches!(repo.source.as_deref(), Some(DomainError::Sql(_))));
    }

    #[test]
    fn test_rollback_failure_classifies_by_original() {
        let original: DomainError =
            RepositoryError::new(RepositoryMethod::Insert, DomainModel::Session, "boom").into();
        let rollback: DomainError = SqlError::new(driver_error(), "failed to roll back").into();
        let err = DomainError::RollbackFailed {
            source: Box::new(original.context("failed to insert session")),
            rollback: Box::new(rollback),
        };

        assert_eq!(err.kind(), ErrorKind::Repository);
        assert!(err.to_string().contains("rollback also failed"));
        assert_eq!(
            err.message_for_user(),
            "Failed to create the login session. Please try again later."
        );
    }

    #[test]
    fn test_result_ext_context() {
        let result: Result<(), InvalidDataError> =
            Err(InvalidDataError::new("name", "", "name must not be empty"));
        let err = result.context("failed to new user").unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidData);
        assert_eq!(err.message_for_user(), "The name you entered is not valid.");
    }

    #[test]
    fn test_labels() {
        assert_eq!(DomainModel::User.for_developer(), "User");
        assert_eq!(Property::SessionId.for_developer(), "session_id");
        assert_eq!(RepositoryMethod::Delete.as_sql(), "DELETE");
        assert_eq!(
            NoSuchDataError::new(Property::Id, 7, DomainModel::User).message_for_user(),
            "No account with ID \"7\" exists."
        );
    }
}
