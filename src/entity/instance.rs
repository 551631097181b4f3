use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

use super::EntityMeta;

/// Loaded side of a relationship.
#[derive(Debug, Clone, PartialEq)]
pub enum Related {
    One(Option<Box<EntityInstance>>),
    Many(Vec<EntityInstance>),
}

/// In-memory persistence entity.
///
/// Scalar values are kept as JSON values keyed by column name. Relationships only
/// appear once they have been loaded or assigned; an absent key means "not
/// loaded", which is different from an empty to-many collection.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityInstance {
    entity: &'static str,
    values: BTreeMap<&'static str, Value>,
    relations: BTreeMap<&'static str, Related>,
    dirty: BTreeSet<&'static str>,
    persisted: bool,
}

impl EntityInstance {
    /// A fresh, unsaved instance.
    pub fn new(meta: &EntityMeta) -> Self {
        Self {
            entity: meta.name,
            values: BTreeMap::new(),
            relations: BTreeMap::new(),
            dirty: BTreeSet::new(),
            persisted: false,
        }
    }

    /// An instance read back from storage.
    pub fn loaded(meta: &EntityMeta, values: BTreeMap<&'static str, Value>) -> Self {
        Self { values, persisted: true, ..Self::new(meta) }
    }

    pub fn entity(&self) -> &'static str {
        self.entity
    }

    pub fn is_persisted(&self) -> bool {
        self.persisted
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    pub fn values(&self) -> &BTreeMap<&'static str, Value> {
        &self.values
    }

    /// Assigns a column. Unsaved instances track every assignment; persisted ones
    /// only track changes.
    pub fn set(&mut self, column: &'static str, value: Value) {
        let changed = self.values.get(column) != Some(&value);
        if changed || !self.persisted {
            self.dirty.insert(column);
        }
        self.values.insert(column, value);
    }

    pub fn dirty(&self) -> &BTreeSet<&'static str> {
        &self.dirty
    }

    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Replaces the column values with what storage returned and clears the dirty set.
    pub fn mark_saved(&mut self, values: BTreeMap<&'static str, Value>) {
        self.values = values;
        self.dirty.clear();
        self.persisted = true;
    }

    pub fn primary_key(&self, meta: &EntityMeta) -> Option<&Value> {
        self.values.get(meta.primary_key).filter(|v| !v.is_null())
    }

    pub fn related(&self, name: &str) -> Option<&Related> {
        self.relations.get(name)
    }

    pub fn related_mut(&mut self, name: &str) -> Option<&mut Related> {
        self.relations.get_mut(name)
    }

    pub fn set_related(&mut self, name: &'static str, related: Related) {
        self.relations.insert(name, related);
    }

    pub fn relations(&self) -> impl Iterator<Item = (&'static str, &Related)> {
        self.relations.iter().map(|(k, v)| (*k, v))
    }
}
