//! Service layer shared by every resource.
//!
//! A service owns a repository and forwards the five standard operations to it.
//! Concrete services override the operations that need domain rules (hashing a
//! password, rejecting duplicates) and inherit the rest.

use async_trait::async_trait;
use sqlx::SqliteConnection;

use crate::repository::{Repository, RepositoryError};
use crate::types::{Filter, ListFilter, Page};

#[async_trait]
pub trait RepositoryService: Send + Sync {
    type Repo: Repository;
    type Error: From<RepositoryError> + Send;

    fn repository(&self) -> &Self::Repo;

    async fn repository_object(
        &self,
        conn: &mut SqliteConnection,
        filter: &Filter,
    ) -> Result<Option<<Self::Repo as Repository>::View>, Self::Error> {
        Ok(self.repository().get(conn, filter).await?)
    }

    async fn repository_objects(
        &self,
        conn: &mut SqliteConnection,
        filter: &ListFilter,
    ) -> Result<Page<<Self::Repo as Repository>::View>, Self::Error> {
        Ok(self.repository().get_list(conn, filter).await?)
    }

    async fn repository_create_object(
        &self,
        conn: &mut SqliteConnection,
        input: &<Self::Repo as Repository>::Create,
    ) -> Result<<Self::Repo as Repository>::View, Self::Error> {
        Ok(self.repository().create(conn, input).await?)
    }

    async fn repository_update_object(
        &self,
        conn: &mut SqliteConnection,
        filter: &Filter,
        input: &<Self::Repo as Repository>::Update,
    ) -> Result<Option<<Self::Repo as Repository>::View>, Self::Error> {
        Ok(self.repository().update(conn, input, filter).await?)
    }

    async fn repository_delete_object(
        &self,
        conn: &mut SqliteConnection,
        filter: &Filter,
    ) -> Result<bool, Self::Error> {
        Ok(self.repository().delete(conn, filter).await?)
    }
}
