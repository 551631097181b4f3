//! Entity metadata registry.
//!
//! Every persisted record type is described once by an [`EntityMeta`]: its table,
//! primary key, scalar columns and relationships to other entities. The
//! [`Registry`] is assembled at startup and is the only source the repository
//! layer consults when it needs to know what an entity looks like, so column and
//! table names in generated SQL never come from client input.

pub mod instance;

use std::collections::HashMap;
use std::sync::Arc;

pub use instance::{EntityInstance, Related};

/// Storage type of a scalar column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    Integer,
    Real,
    Text,
    Bool,
    /// RFC 3339 timestamp stored as TEXT.
    Timestamp,
}

/// Cardinality and foreign-key placement of a relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    /// The owner carries `local_key` pointing at the target's primary key.
    BelongsTo { local_key: &'static str },
    /// The target carries `remote_key` pointing at the owner's primary key (at most one row).
    HasOne { remote_key: &'static str },
    /// The target carries `remote_key` pointing at the owner's primary key.
    HasMany { remote_key: &'static str },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelationMeta {
    pub target: &'static str,
    pub kind: RelationKind,
}

impl RelationMeta {
    pub fn is_many(&self) -> bool {
        matches!(self.kind, RelationKind::HasMany { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Scalar(ScalarType),
    Relation(RelationMeta),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMeta {
    pub name: &'static str,
    pub kind: FieldKind,
    /// Included in free-text search (text columns only).
    pub searchable: bool,
    /// Set to the current timestamp whenever the row is updated.
    pub touch_on_update: bool,
}

impl FieldMeta {
    pub fn scalar_type(&self) -> Option<ScalarType> {
        match self.kind {
            FieldKind::Scalar(t) => Some(t),
            FieldKind::Relation(_) => None,
        }
    }

    pub fn relation(&self) -> Option<&RelationMeta> {
        match &self.kind {
            FieldKind::Relation(r) => Some(r),
            FieldKind::Scalar(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityMeta {
    pub name: &'static str,
    pub table: &'static str,
    pub primary_key: &'static str,
    pub fields: Vec<FieldMeta>,
}

impl EntityMeta {
    /// Starts a definition with an INTEGER primary key column.
    pub fn new(name: &'static str, table: &'static str, primary_key: &'static str) -> Self {
        Self {
            name,
            table,
            primary_key,
            fields: vec![FieldMeta {
                name: primary_key,
                kind: FieldKind::Scalar(ScalarType::Integer),
                searchable: false,
                touch_on_update: false,
            }],
        }
    }

    pub fn scalar(mut self, name: &'static str, ty: ScalarType) -> Self {
        self.fields.push(FieldMeta {
            name,
            kind: FieldKind::Scalar(ty),
            searchable: ty == ScalarType::Text,
            touch_on_update: false,
        });
        self
    }

    /// Text column excluded from free-text search.
    pub fn secret(mut self, name: &'static str) -> Self {
        self.fields.push(FieldMeta {
            name,
            kind: FieldKind::Scalar(ScalarType::Text),
            searchable: false,
            touch_on_update: false,
        });
        self
    }

    /// Timestamp column refreshed on every update.
    pub fn touched(mut self, name: &'static str) -> Self {
        self.fields.push(FieldMeta {
            name,
            kind: FieldKind::Scalar(ScalarType::Timestamp),
            searchable: false,
            touch_on_update: true,
        });
        self
    }

    pub fn belongs_to(self, name: &'static str, target: &'static str, local_key: &'static str) -> Self {
        self.relation(name, target, RelationKind::BelongsTo { local_key })
    }

    pub fn has_one(self, name: &'static str, target: &'static str, remote_key: &'static str) -> Self {
        self.relation(name, target, RelationKind::HasOne { remote_key })
    }

    pub fn has_many(self, name: &'static str, target: &'static str, remote_key: &'static str) -> Self {
        self.relation(name, target, RelationKind::HasMany { remote_key })
    }

    fn relation(mut self, name: &'static str, target: &'static str, kind: RelationKind) -> Self {
        self.fields.push(FieldMeta {
            name,
            kind: FieldKind::Relation(RelationMeta { target, kind }),
            searchable: false,
            touch_on_update: false,
        });
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldMeta> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Scalar column with that name, if any.
    pub fn column(&self, name: &str) -> Option<&FieldMeta> {
        self.field(name).filter(|f| f.scalar_type().is_some())
    }

    pub fn columns(&self) -> impl Iterator<Item = &FieldMeta> {
        self.fields.iter().filter(|f| f.scalar_type().is_some())
    }

    pub fn relations(&self) -> impl Iterator<Item = (&'static str, &RelationMeta)> {
        self.fields.iter().filter_map(|f| f.relation().map(|r| (f.name, r)))
    }

    pub fn searchable_columns(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.columns().filter(|f| f.searchable).map(|f| f.name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("entity '{0}' is registered twice")]
    Duplicate(&'static str),
    #[error("relation {entity}.{relation} targets unknown entity '{target}'")]
    UnknownTarget { entity: &'static str, relation: &'static str, target: &'static str },
    #[error("relation {entity}.{relation} uses key '{key}' which is not a column of '{owner}'")]
    MissingKey { entity: &'static str, relation: &'static str, key: &'static str, owner: &'static str },
}

/// All entity definitions known to the application, keyed by entity name.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    entities: HashMap<&'static str, Arc<EntityMeta>>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    pub fn get(&self, name: &str) -> Option<&EntityMeta> {
        self.entities.get(name).map(Arc::as_ref)
    }

    /// Shared handle to an entity definition, for holders that outlive a borrow of the registry.
    pub fn entity(&self, name: &str) -> Option<Arc<EntityMeta>> {
        self.entities.get(name).cloned()
    }

    /// Every registered entity, in no particular order.
    pub fn entities(&self) -> impl Iterator<Item = &EntityMeta> {
        self.entities.values().map(Arc::as_ref)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct RegistryBuilder {
    entities: Vec<EntityMeta>,
}

impl RegistryBuilder {
    pub fn entity(mut self, meta: EntityMeta) -> Self {
        self.entities.push(meta);
        self
    }

    /// Checks that every relation points at a registered entity and that the
    /// foreign key columns it names exist on the side that owns them.
    pub fn build(self) -> Result<Registry, RegistryError> {
        let mut entities = HashMap::with_capacity(self.entities.len());
        for meta in self.entities {
            let name = meta.name;
            if entities.insert(name, Arc::new(meta)).is_some() {
                return Err(RegistryError::Duplicate(name));
            }
        }

        for meta in entities.values() {
            for (relation, rel) in meta.relations() {
                let target = entities.get(rel.target).ok_or(RegistryError::UnknownTarget {
                    entity: meta.name,
                    relation,
                    target: rel.target,
                })?;
                let (owner, key) = match rel.kind {
                    RelationKind::BelongsTo { local_key } => (meta, local_key),
                    RelationKind::HasOne { remote_key } | RelationKind::HasMany { remote_key } => {
                        (target, remote_key)
                    }
                };
                if owner.column(key).is_none() {
                    return Err(RegistryError::MissingKey {
                        entity: meta.name,
                        relation,
                        key,
                        owner: owner.name,
                    });
                }
            }
        }

        Ok(Registry { entities })
    }
}
