use std::sync::Arc;

use async_trait::async_trait;
use sqlx::SqliteConnection;

use crate::entity::Registry;
use crate::repository::{Repository, RepositoryResult, Resource, SqlRepository};
use crate::types::{Filter, ListFilter, Page};

use super::models::USER;
use super::schemas::{UserCreate, UserUnprotectedView, UserUpdate, UserView};

pub struct UserResource;

impl Resource for UserResource {
    const ENTITY: &'static str = USER;
    const LOAD: &'static [&'static str] = &["addresses"];

    type View = UserView;
    type Create = UserCreate;
    type Update = UserUpdate;
}

#[derive(Clone)]
pub struct UserRepository {
    inner: SqlRepository<UserResource>,
}

impl UserRepository {
    pub fn new(registry: Arc<Registry>) -> RepositoryResult<Self> {
        Ok(Self { inner: SqlRepository::new(registry)? })
    }

    /// The user with this email, including the stored password hash.
    pub async fn get_by_email(
        &self,
        conn: &mut SqliteConnection,
        email: &str,
    ) -> RepositoryResult<Option<UserUnprotectedView>> {
        self.inner.find(conn, &Filter::default().eq("email", email)).await
    }
}

#[async_trait]
impl Repository for UserRepository {
    type View = UserView;
    type Create = UserCreate;
    type Update = UserUpdate;

    async fn get(&self, conn: &mut SqliteConnection, filter: &Filter) -> RepositoryResult<Option<UserView>> {
        self.inner.get(conn, filter).await
    }

    async fn get_list(
        &self,
        conn: &mut SqliteConnection,
        filter: &ListFilter,
    ) -> RepositoryResult<Page<UserView>> {
        self.inner.get_list(conn, filter).await
    }

    async fn get_all(
        &self,
        conn: &mut SqliteConnection,
        filter: &ListFilter,
    ) -> RepositoryResult<Vec<UserView>> {
        self.inner.get_all(conn, filter).await
    }

    async fn create(&self, conn: &mut SqliteConnection, input: &UserCreate) -> RepositoryResult<UserView> {
        self.inner.create(conn, input).await
    }

    async fn update(
        &self,
        conn: &mut SqliteConnection,
        input: &UserUpdate,
        filter: &Filter,
    ) -> RepositoryResult<Option<UserView>> {
        self.inner.update(conn, input, filter).await
    }

    async fn delete(&self, conn: &mut SqliteConnection, filter: &Filter) -> RepositoryResult<bool> {
        self.inner.delete(conn, filter).await
    }
}
