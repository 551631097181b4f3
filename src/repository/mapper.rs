//! Conversion between transfer schemas and [`EntityInstance`]s.
//!
//! Inputs go through `serde_json::Value`: a schema is serialized (fields that
//! are `None` are skipped by the schema's serde attributes, which gives the
//! partial-update behaviour) and the resulting object is merged onto an
//! instance using the registry metadata. The way back expands an instance and
//! its loaded relations into a JSON object and deserializes the target schema
//! from it.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::entity::{EntityInstance, EntityMeta, Registry, RelationKind, Related};

use super::RepositoryError;

/// Maps a schema onto a fresh, unsaved instance of `meta`.
pub fn schema_to_entity<S: Serialize>(
    registry: &Registry,
    meta: &EntityMeta,
    input: &S,
) -> Result<EntityInstance, RepositoryError> {
    to_entity(registry, meta, &to_input(input)?)
}

/// Serializes a schema into the object form consumed by [`merge_into`].
pub fn to_input<S: Serialize>(input: &S) -> Result<Value, RepositoryError> {
    serde_json::to_value(input).map_err(RepositoryError::Serialize)
}

pub fn to_entity(
    registry: &Registry,
    meta: &EntityMeta,
    input: &Value,
) -> Result<EntityInstance, RepositoryError> {
    let mut instance = EntityInstance::new(meta);
    merge_into(registry, meta, &mut instance, input)?;
    Ok(instance)
}

/// Applies the keys present in `input` to `instance`.
///
/// Relationship keys are mapped recursively. To-many inputs are aligned by
/// position with the loaded collection: existing entries are updated, extra
/// inputs are appended, and entries past the end of the input are kept. A
/// single object given for a to-many relationship counts as a one-element list.
/// Scalar keys unknown to the entity are dropped.
pub fn merge_into(
    registry: &Registry,
    meta: &EntityMeta,
    instance: &mut EntityInstance,
    input: &Value,
) -> Result<(), RepositoryError> {
    let Value::Object(map) = input else {
        return Err(RepositoryError::Mapping(format!(
            "expected an object for '{}', got {}",
            meta.name,
            kind_of(input)
        )));
    };

    for (name, relation) in meta.relations() {
        let Some(value) = map.get(name) else {
            continue;
        };
        let target = registry
            .get(relation.target)
            .ok_or_else(|| RepositoryError::UnknownEntity(relation.target.to_string()))?;

        if relation.is_many() {
            let items: Vec<&Value> = match value {
                Value::Array(items) => items.iter().collect(),
                Value::Null => Vec::new(),
                single => vec![single],
            };
            if !matches!(instance.related(name), Some(Related::Many(_))) {
                instance.set_related(name, Related::Many(Vec::new()));
            }
            if let Some(Related::Many(existing)) = instance.related_mut(name) {
                for (idx, item) in items.into_iter().enumerate() {
                    match existing.get_mut(idx) {
                        Some(current) => merge_into(registry, target, current, item)?,
                        None => existing.push(to_entity(registry, target, item)?),
                    }
                }
            }
        } else if value.is_null() {
            instance.set_related(name, Related::One(None));
            if let RelationKind::BelongsTo { local_key } = relation.kind {
                instance.set(local_key, Value::Null);
            }
        } else {
            match instance.related_mut(name) {
                Some(Related::One(Some(current))) => merge_into(registry, target, current, value)?,
                _ => {
                    let fresh = to_entity(registry, target, value)?;
                    instance.set_related(name, Related::One(Some(Box::new(fresh))));
                }
            }
        }
    }

    for (key, value) in map {
        match meta.column(key) {
            Some(column) => instance.set(column.name, value.clone()),
            None if meta.field(key).is_some() => {}
            None => tracing::trace!(entity = meta.name, key = %key, "Dropping unknown input key"),
        }
    }

    Ok(())
}

/// Expands an instance and its loaded relations into a JSON object.
pub fn to_mapping(instance: &EntityInstance) -> Map<String, Value> {
    let mut out: Map<String, Value> =
        instance.values().iter().map(|(k, v)| (k.to_string(), v.clone())).collect();
    for (name, related) in instance.relations() {
        let value = match related {
            Related::One(Some(inner)) => Value::Object(to_mapping(inner)),
            Related::One(None) => Value::Null,
            Related::Many(items) => {
                Value::Array(items.iter().map(|i| Value::Object(to_mapping(i))).collect())
            }
        };
        out.insert(name.to_string(), value);
    }
    out
}

/// Builds schema `S` from an instance.
pub fn to_schema<S: DeserializeOwned>(instance: &EntityInstance) -> Result<S, RepositoryError> {
    serde_json::from_value(Value::Object(to_mapping(instance))).map_err(|source| {
        RepositoryError::Validation { schema: std::any::type_name::<S>(), source }
    })
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
