//! Generic repository over registered entities.
//!
//! [`SqlRepository`] implements the [`Repository`] contract for any
//! [`Resource`]: it builds queries with the [`FilterBuilder`], executes them on
//! the connection handed in by the caller and maps rows to transfer schemas
//! with the [`mapper`]. Transactions belong to the caller; the repository never
//! begins or commits one.

pub mod filter_builder;
pub mod mapper;
pub mod persist;
pub mod query;

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::{Row, SqliteConnection};

use crate::entity::{EntityInstance, EntityMeta, Registry};
use crate::types::{Filter, ListFilter, Page};

pub use filter_builder::FilterBuilder;
use query::{Predicate, SelectQuery};

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
    #[error("stored row does not match {schema}: {source}")]
    Validation {
        schema: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("cannot serialize input: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("cannot map input: {0}")]
    Mapping(String),
    #[error("unknown entity '{0}'")]
    UnknownEntity(String),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Binds a registered entity to its transfer schemas.
pub trait Resource: Send + Sync + 'static {
    /// Registry name of the entity.
    const ENTITY: &'static str;
    /// Relations loaded together with every fetched row.
    const LOAD: &'static [&'static str] = &[];
    /// Accepted `sort` strings; `"*"` accepts any resolvable path.
    const SORTABLE: &'static [&'static str] = &["*"];

    type View: DeserializeOwned + Send;
    type Create: Serialize + Sync;
    type Update: Serialize + Sync;
}

#[async_trait]
pub trait Repository: Send + Sync {
    type View: Send;
    type Create: Sync;
    type Update: Sync;

    /// First row matching every set field of `filter`.
    async fn get(
        &self,
        conn: &mut SqliteConnection,
        filter: &Filter,
    ) -> RepositoryResult<Option<Self::View>>;

    /// One page of rows plus the number of rows matching the same predicate.
    async fn get_list(
        &self,
        conn: &mut SqliteConnection,
        filter: &ListFilter,
    ) -> RepositoryResult<Page<Self::View>>;

    /// Every matching row, ignoring pagination.
    async fn get_all(
        &self,
        conn: &mut SqliteConnection,
        filter: &ListFilter,
    ) -> RepositoryResult<Vec<Self::View>>;

    async fn create(
        &self,
        conn: &mut SqliteConnection,
        input: &Self::Create,
    ) -> RepositoryResult<Self::View>;

    /// `None` when nothing matches `filter`.
    async fn update(
        &self,
        conn: &mut SqliteConnection,
        input: &Self::Update,
        filter: &Filter,
    ) -> RepositoryResult<Option<Self::View>>;

    /// Deletes by `filter.id`; `false` when no row was affected.
    async fn delete(&self, conn: &mut SqliteConnection, filter: &Filter) -> RepositoryResult<bool>;
}

pub struct SqlRepository<R: Resource> {
    filter_builder: FilterBuilder,
    _resource: PhantomData<fn() -> R>,
}

impl<R: Resource> Clone for SqlRepository<R> {
    fn clone(&self) -> Self {
        Self { filter_builder: self.filter_builder.clone(), _resource: PhantomData }
    }
}

impl<R: Resource> SqlRepository<R> {
    pub fn new(registry: Arc<Registry>) -> RepositoryResult<Self> {
        let filter_builder = FilterBuilder::new(registry, R::ENTITY)?.with_sortable(R::SORTABLE);
        Ok(Self::with_filter_builder(filter_builder))
    }

    pub fn with_filter_builder(filter_builder: FilterBuilder) -> Self {
        Self { filter_builder, _resource: PhantomData }
    }

    pub fn meta(&self) -> &EntityMeta {
        self.filter_builder.entity()
    }

    fn registry(&self) -> &Registry {
        self.filter_builder.registry()
    }

    /// Equality on every set field of `filter` that names a column. `id` always
    /// refers to the primary key.
    fn point_query(&self, filter: &Filter) -> SelectQuery<'_> {
        let meta = self.meta();
        filter
            .predicates()
            .into_iter()
            .filter_map(|(field, value)| {
                let name = if field == "id" { meta.primary_key } else { meta.column(field)?.name };
                Some(Predicate::Eq { column: name, value })
            })
            .fold(self.filter_builder.select(), SelectQuery::filter)
    }

    fn list_query(&self, filter: &ListFilter) -> SelectQuery<'_> {
        self.filter_builder.build(filter, self.filter_builder.select())
    }

    async fn fetch(
        &self,
        conn: &mut SqliteConnection,
        query: &SelectQuery<'_>,
    ) -> RepositoryResult<Vec<EntityInstance>> {
        let meta = self.meta();
        let mut qb = query.to_select();
        tracing::debug!(entity = meta.name, sql = qb.sql(), "Selecting rows");
        let rows = qb.build().fetch_all(&mut *conn).await?;
        let mut instances = rows
            .iter()
            .map(|row| -> RepositoryResult<EntityInstance> {
                Ok(EntityInstance::loaded(meta, query::decode_row(meta, row)?))
            })
            .collect::<RepositoryResult<Vec<_>>>()?;
        persist::load_relations(&mut *conn, self.registry(), meta, &mut instances, R::LOAD).await?;
        Ok(instances)
    }

    async fn find_instance(
        &self,
        conn: &mut SqliteConnection,
        filter: &Filter,
    ) -> RepositoryResult<Option<EntityInstance>> {
        let query = self.point_query(filter).limit(1);
        Ok(self.fetch(conn, &query).await?.into_iter().next())
    }

    /// First row matching `filter`, mapped to any schema `S`.
    pub async fn find<S: DeserializeOwned>(
        &self,
        conn: &mut SqliteConnection,
        filter: &Filter,
    ) -> RepositoryResult<Option<S>> {
        self.find_instance(conn, filter)
            .await?
            .map(|instance| mapper::to_schema(&instance))
            .transpose()
    }

    fn to_views(instances: &[EntityInstance]) -> RepositoryResult<Vec<R::View>> {
        instances.iter().map(mapper::to_schema).collect()
    }
}

#[async_trait]
impl<R: Resource> Repository for SqlRepository<R> {
    type View = R::View;
    type Create = R::Create;
    type Update = R::Update;

    async fn get(
        &self,
        conn: &mut SqliteConnection,
        filter: &Filter,
    ) -> RepositoryResult<Option<R::View>> {
        self.find(conn, filter).await
    }

    async fn get_list(
        &self,
        conn: &mut SqliteConnection,
        filter: &ListFilter,
    ) -> RepositoryResult<Page<R::View>> {
        let query = self.list_query(filter);
        let instances = self.fetch(&mut *conn, &query).await?;

        let mut count = query.to_count();
        let total: i64 = count.build().fetch_one(&mut *conn).await?.try_get("cnt")?;

        Ok(Page { rows: Self::to_views(&instances)?, total })
    }

    async fn get_all(
        &self,
        conn: &mut SqliteConnection,
        filter: &ListFilter,
    ) -> RepositoryResult<Vec<R::View>> {
        let query = self.list_query(filter).unpaginated();
        let instances = self.fetch(conn, &query).await?;
        Self::to_views(&instances)
    }

    async fn create(
        &self,
        conn: &mut SqliteConnection,
        input: &R::Create,
    ) -> RepositoryResult<R::View> {
        let mut instance = mapper::schema_to_entity(self.registry(), self.meta(), input)?;
        persist::flush(conn, self.registry(), &mut instance).await?;
        mapper::to_schema(&instance)
    }

    async fn update(
        &self,
        conn: &mut SqliteConnection,
        input: &R::Update,
        filter: &Filter,
    ) -> RepositoryResult<Option<R::View>> {
        let input = mapper::to_input(input)?;
        let Some(mut instance) = self.find_instance(&mut *conn, filter).await? else {
            return Ok(None);
        };
        persist::load_for_input(&mut *conn, self.registry(), &mut instance, &input).await?;
        mapper::merge_into(self.registry(), self.meta(), &mut instance, &input)?;
        persist::flush(conn, self.registry(), &mut instance).await?;
        mapper::to_schema(&instance).map(Some)
    }

    async fn delete(&self, conn: &mut SqliteConnection, filter: &Filter) -> RepositoryResult<bool> {
        let Some(id) = filter.id else {
            return Ok(false);
        };
        let meta = self.meta();
        let sql = format!(
            "DELETE FROM {} WHERE {} = ?",
            query::quote(meta.table),
            query::quote(meta.primary_key)
        );
        let result = sqlx::query(&sql).bind(id).execute(&mut *conn).await?;
        Ok(result.rows_affected() > 0)
    }
}
