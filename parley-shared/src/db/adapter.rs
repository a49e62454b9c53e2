/// Persistence adapter helpers
///
/// Every repository funnels its statement results through these functions so
/// that classification is identical across entities:
///
/// | situation                         | result                                 |
/// |-----------------------------------|----------------------------------------|
/// | write affected exactly 1 row      | `Ok(())`                               |
/// | write affected 0 or 2+ rows       | `RepositoryError{method, model}`       |
/// | write hit a declared unique key   | `AlreadyExistError{property, value}`   |
/// | write failed in the driver        | `RepositoryError` with `SqlError` source |
/// | read found no row                 | `NoSuchDataError{property, value}`     |
/// | read failed in the driver         | `SqlError`                             |

use std::fmt;

use tracing::warn;

use crate::error::{
    AlreadyExistError, DomainError, DomainModel, NoSuchDataError, Property, RepositoryError,
    RepositoryMethod, SqlError,
};

/// Accepts an affected-row count of exactly one
pub fn expect_single_row(
    rows_affected: u64,
    method: RepositoryMethod,
    model: DomainModel,
) -> Result<(), DomainError> {
    if rows_affected == 1 {
        return Ok(());
    }

    warn!(
        method = method.as_sql(),
        model = model.for_developer(),
        rows_affected,
        "Unexpected affected row count"
    );
    Err(RepositoryError::new(
        method,
        model,
        format!("expected 1 affected row, got {}", rows_affected),
    )
    .into())
}

/// A unique key a write may collide with, and the value it carried
#[derive(Debug, Clone)]
pub struct UniqueKey {
    pub property: Property,
    pub value: String,
}

impl UniqueKey {
    pub fn new(property: Property, value: impl fmt::Display) -> Self {
        Self {
            property,
            value: value.to_string(),
        }
    }
}

/// Classifies a driver failure raised by a write
///
/// A unique violation is reported as `AlreadyExistError` only when the caller
/// declared which key it may collide with; otherwise it is an
/// infrastructure failure like any other.
pub fn write_error(
    err: sqlx::Error,
    method: RepositoryMethod,
    model: DomainModel,
    unique_key: Option<UniqueKey>,
) -> DomainError {
    if let (Some(key), true) = (unique_key, is_unique_violation(&err)) {
        return AlreadyExistError::new(key.property, key.value, model).into();
    }

    RepositoryError::new(method, model, "failed to execute statement")
        .with_source(SqlError::new(err, format!("{} {} failed", method.as_sql(), model)))
        .into()
}

/// Classifies a driver failure raised by a single-row read
pub fn read_error(
    err: sqlx::Error,
    property: Property,
    value: impl fmt::Display,
    model: DomainModel,
) -> DomainError {
    match err {
        sqlx::Error::RowNotFound => NoSuchDataError::new(property, value, model).into(),
        other => SqlError::new(other, "failed to execute query").into(),
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::testing::unique_violation;

    #[test]
    fn test_expect_single_row_accepts_one() {
        assert!(expect_single_row(1, RepositoryMethod::Insert, DomainModel::User).is_ok());
    }

    #[test]
    fn test_expect_single_row_rejects_zero_and_many() {
        for (count, method) in [
            (0, RepositoryMethod::Insert),
            (2, RepositoryMethod::Update),
            (0, RepositoryMethod::Delete),
            (17, RepositoryMethod::Delete),
        ] {
            let err = expect_single_row(count, method, DomainModel::Session).unwrap_err();
            let repo = err.as_repository().expect("repository error");

            assert_eq!(repo.method, method);
            assert_eq!(repo.model, DomainModel::Session);
            assert!(repo.source.is_none());
            assert!(repo.reason.contains(&format!("got {}", count)));
        }
    }

    #[test]
    fn test_write_error_without_unique_violation_is_repository_error() {
        let err = write_error(
            sqlx::Error::Protocol("broken pipe".into()),
            RepositoryMethod::Insert,
            DomainModel::User,
            Some(UniqueKey::new(Property::Name, "alice")),
        );

        let repo = err.as_repository().expect("repository error");
        assert_eq!(repo.method, RepositoryMethod::Insert);
        assert_eq!(repo.model, DomainModel::User);
        assert!(matches!(repo.source.as_deref(), Some(DomainError::Sql(_))));
        assert!(err.to_string().contains("broken pipe"));
    }

    #[test]
    fn test_write_error_declared_unique_key_is_already_exist() {
        let err = write_error(
            unique_violation("users_name_key"),
            RepositoryMethod::Insert,
            DomainModel::User,
            Some(UniqueKey::new(Property::Name, "alice")),
        );

        let taken = err.as_already_exist().expect("already exist");
        assert_eq!(taken.property, Property::Name);
        assert_eq!(taken.value, "alice");
    }

    #[test]
    fn test_write_error_undeclared_unique_violation_is_repository_error() {
        let err = write_error(
            unique_violation("sessions_pkey"),
            RepositoryMethod::Insert,
            DomainModel::Session,
            None,
        );

        assert_eq!(err.kind(), ErrorKind::Repository);
        assert!(err.to_string().contains("sessions_pkey"));
    }

    #[test]
    fn test_read_error_row_not_found_is_no_such_data() {
        let err = read_error(sqlx::Error::RowNotFound, Property::Name, "bob", DomainModel::User);

        let miss = err.as_no_such_data().expect("no such data");
        assert_eq!(miss.property, Property::Name);
        assert_eq!(miss.value, "bob");
        assert_eq!(miss.model, DomainModel::User);
    }

    #[test]
    fn test_read_error_other_failure_is_sql_error() {
        let err = read_error(
            sqlx::Error::PoolTimedOut,
            Property::Id,
            "3",
            DomainModel::Session,
        );

        assert_eq!(err.kind(), ErrorKind::Sql);
    }
}
