use async_trait::async_trait;
use sqlx::SqliteConnection;

use crate::repository::{Repository, RepositoryError};
use crate::services::RepositoryService;
use crate::types::Filter;

use super::repository::UserRepository;
use super::schemas::{UserCreate, UserUnprotectedView, UserUpdate, UserView};
use super::UserEmailExistsError;

#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    #[error(transparent)]
    EmailExists(#[from] UserEmailExistsError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),
    #[error("password hashing task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[derive(Clone)]
pub struct UserService {
    repository: UserRepository,
    bcrypt_cost: u32,
}

impl UserService {
    pub fn new(repository: UserRepository, bcrypt_cost: u32) -> Self {
        Self { repository, bcrypt_cost }
    }

    /// Returns the user when `password` matches the stored hash.
    pub async fn authenticate_user(
        &self,
        conn: &mut SqliteConnection,
        email: &str,
        password: &str,
    ) -> Result<Option<UserUnprotectedView>, UserServiceError> {
        let Some(user) = self.repository.get_by_email(conn, email).await? else {
            return Ok(None);
        };
        let plain = password.to_string();
        let hashed = user.password.clone();
        let matches = tokio::task::spawn_blocking(move || bcrypt::verify(plain, &hashed)).await??;
        Ok(matches.then_some(user))
    }

    pub async fn hash_password(&self, plain: &str) -> Result<String, UserServiceError> {
        let plain = plain.to_string();
        let cost = self.bcrypt_cost;
        Ok(tokio::task::spawn_blocking(move || bcrypt::hash(plain, cost)).await??)
    }
}

/// A UNIQUE violation on insert means another request registered the email first.
fn unique_violation(err: &RepositoryError) -> bool {
    match err {
        RepositoryError::Storage(sqlx::Error::Database(db_err)) => db_err.is_unique_violation(),
        _ => false,
    }
}

#[async_trait]
impl RepositoryService for UserService {
    type Repo = UserRepository;
    type Error = UserServiceError;

    fn repository(&self) -> &UserRepository {
        &self.repository
    }

    async fn repository_create_object(
        &self,
        conn: &mut SqliteConnection,
        input: &UserCreate,
    ) -> Result<UserView, UserServiceError> {
        if self.repository.get_by_email(&mut *conn, &input.email).await?.is_some() {
            return Err(UserEmailExistsError::new(&input.email).into());
        }
        let hashed = UserCreate { password: self.hash_password(&input.password).await?, ..input.clone() };
        match self.repository.create(conn, &hashed).await {
            Ok(view) => Ok(view),
            Err(err) if unique_violation(&err) => Err(UserEmailExistsError::new(&input.email).into()),
            Err(err) => Err(err.into()),
        }
    }

    async fn repository_update_object(
        &self,
        conn: &mut SqliteConnection,
        filter: &Filter,
        input: &UserUpdate,
    ) -> Result<Option<UserView>, UserServiceError> {
        let hashed = match &input.password {
            Some(plain) => UserUpdate { password: Some(self.hash_password(plain).await?), ..input.clone() },
            None => input.clone(),
        };
        Ok(self.repository.update(conn, &hashed, filter).await?)
    }
}
