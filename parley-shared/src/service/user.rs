/// User domain service: construction and name uniqueness

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::auth::password::CredentialHasher;
use crate::error::{DomainResult, InvalidDataError, ResultExt};
use crate::models::user::NAME_MAX_LEN;
use crate::models::User;
use crate::repository::UserRepository;

#[async_trait]
pub trait UserService<C: Send + 'static>: Send + Sync {
    /// Validates the candidate fields and builds an unpersisted user with a
    /// hashed credential
    fn new_user(&self, name: &str, raw_password: &str) -> DomainResult<User>;

    /// `Ok(true)` when a user named `name` exists
    async fn is_already_exist_name(&self, conn: &mut C, name: &str) -> DomainResult<bool>;
}

/// [`UserService`] backed by a [`UserRepository`]
pub struct DefaultUserService<C, R: ?Sized> {
    repository: Arc<R>,
    hasher: Arc<dyn CredentialHasher>,
    _conn: PhantomData<fn(&mut C)>,
}

impl<C, R> DefaultUserService<C, R>
where
    C: Send + 'static,
    R: UserRepository<C> + ?Sized,
{
    pub fn new(repository: Arc<R>, hasher: Arc<dyn CredentialHasher>) -> Self {
        Self {
            repository,
            hasher,
            _conn: PhantomData,
        }
    }
}

#[async_trait]
impl<C, R> UserService<C> for DefaultUserService<C, R>
where
    C: Send + 'static,
    R: UserRepository<C> + ?Sized + 'static,
{
    fn new_user(&self, name: &str, raw_password: &str) -> DomainResult<User> {
        validate_name(name)?;
        if raw_password.is_empty() {
            return Err(InvalidDataError::new("password", "", "password must not be empty").into());
        }

        let password = self
            .hasher
            .hash(raw_password)
            .context("failed to hash password")?;

        Ok(User::new(name, password))
    }

    async fn is_already_exist_name(&self, conn: &mut C, name: &str) -> DomainResult<bool> {
        match self.repository.get_user_by_name(conn, name).await {
            Ok(_) => Ok(true),
            Err(err) if err.is_no_such_data() => {
                debug!(name, "Name is available");
                Ok(false)
            }
            Err(err) => Err(err.context("failed to get user by name")),
        }
    }
}

fn validate_name(name: &str) -> Result<(), InvalidDataError> {
    if name.trim().is_empty() {
        return Err(InvalidDataError::new("name", name, "name must not be blank"));
    }
    if name.chars().count() > NAME_MAX_LEN {
        return Err(InvalidDataError::new(
            "name",
            name,
            format!("name must be at most {} characters", NAME_MAX_LEN),
        ));
    }
    Ok(())
}
