//! Translates a [`ListFilter`] into a [`SelectQuery`].
//!
//! Pagination is always applied. Sorting walks the sort path through the
//! registry; a path that does not resolve to a scalar column is dropped
//! without an error, since sort strings come straight from the client.
//! Search ORs a case-insensitive substring match over the root entity's
//! searchable text columns. Columns declared with [`EntityMeta::secret`]
//! (password hashes) are text but never searched.

use std::sync::Arc;

use crate::entity::{EntityMeta, Registry, RelationMeta};
use crate::types::ListFilter;

use super::query::{OrderBy, Predicate, SelectQuery};
use super::RepositoryError;

/// One relationship step of a field path.
#[derive(Debug, Clone, PartialEq)]
pub struct Hop<'r> {
    pub from: &'r EntityMeta,
    pub relation: RelationMeta,
    pub to: &'r EntityMeta,
}

/// A field path resolved against the registry: zero or more relationship hops
/// followed by a scalar column of the last entity reached.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPath<'r> {
    pub hops: Vec<Hop<'r>>,
    pub column: &'static str,
}

/// Walks `path` from `root`. Every segment but the last must name a
/// relationship; the last must name a scalar column.
pub fn resolve_path<'r, S: AsRef<str>>(
    registry: &'r Registry,
    root: &'r EntityMeta,
    path: &[S],
) -> Option<ResolvedPath<'r>> {
    let (last, hops_path) = path.split_last()?;
    let mut current = root;
    let mut hops = Vec::with_capacity(hops_path.len());
    for segment in hops_path {
        let relation = *current.field(segment.as_ref())?.relation()?;
        let target = registry.get(relation.target)?;
        hops.push(Hop { from: current, relation, to: target });
        current = target;
    }
    let column = current.column(last.as_ref())?.name;
    Some(ResolvedPath { hops, column })
}

#[derive(Debug, Clone)]
pub struct FilterBuilder {
    registry: Arc<Registry>,
    entity: Arc<EntityMeta>,
    sortable: &'static [&'static str],
}

impl FilterBuilder {
    pub fn new(registry: Arc<Registry>, entity: &str) -> Result<Self, RepositoryError> {
        let meta = registry
            .entity(entity)
            .ok_or_else(|| RepositoryError::UnknownEntity(entity.to_string()))?;
        Ok(Self { registry, entity: meta, sortable: &["*"] })
    }

    /// Restricts sorting to the listed sort strings (`"*"` accepts any path).
    pub fn with_sortable(mut self, sortable: &'static [&'static str]) -> Self {
        self.sortable = sortable;
        self
    }

    pub fn entity(&self) -> &EntityMeta {
        &self.entity
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Fresh query over every row of the entity.
    pub fn select(&self) -> SelectQuery<'_> {
        SelectQuery::new(&self.entity)
    }

    pub fn build<'a>(&'a self, filter: &ListFilter, query: SelectQuery<'a>) -> SelectQuery<'a> {
        let mut query = query.limit(filter.limit).offset(filter.offset);
        if let Some(predicate) = self.search(filter) {
            query = query.filter(predicate);
        }
        if let Some(order) = self.sort(filter) {
            query = query.order_by(order);
        }
        query
    }

    /// Resolves a field path starting at this builder's entity.
    pub fn resolve_path<S: AsRef<str>>(&self, path: &[S]) -> Option<ResolvedPath<'_>> {
        resolve_path(&self.registry, &self.entity, path)
    }

    fn sort(&self, filter: &ListFilter) -> Option<OrderBy<'_>> {
        let spec = filter.sort_spec(self.sortable)?;
        match self.resolve_path(spec.path.as_slice()) {
            Some(path) => Some(OrderBy { path, descending: spec.descending }),
            None => {
                tracing::debug!(
                    entity = self.entity.name,
                    sort = filter.sort.as_deref().unwrap_or_default(),
                    "Ignoring unresolvable sort path"
                );
                None
            }
        }
    }

    fn search(&self, filter: &ListFilter) -> Option<Predicate> {
        let needle = filter.search_term()?;
        let columns: Vec<&'static str> = self.entity.searchable_columns().collect();
        if columns.is_empty() {
            return None;
        }
        Some(Predicate::Contains { columns, needle: needle.to_string() })
    }
}
