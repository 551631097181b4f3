//! Writing instance graphs to storage and eager-loading relations.

use std::collections::HashMap;

use futures::future::BoxFuture;
use serde_json::Value;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use crate::db::NOW_SQL;
use crate::entity::{EntityInstance, EntityMeta, Registry, RelationKind, Related};

use super::query::{column_list, decode_row, push_value, quote, ROOT};
use super::RepositoryError;

/// Writes `instance` and every loaded relation reachable from it.
///
/// `BelongsTo` targets are saved first so the owner can carry their key;
/// `HasOne`/`HasMany` children are saved afterwards with the owner's key.
/// Unsaved instances are inserted, persisted ones only when dirty. Values
/// generated by the database are read back into the instances.
pub fn flush<'a>(
    conn: &'a mut SqliteConnection,
    registry: &'a Registry,
    instance: &'a mut EntityInstance,
) -> BoxFuture<'a, Result<(), RepositoryError>> {
    Box::pin(async move {
        let meta = registry
            .get(instance.entity())
            .ok_or_else(|| RepositoryError::UnknownEntity(instance.entity().to_string()))?;

        for (name, relation) in meta.relations() {
            let RelationKind::BelongsTo { local_key } = relation.kind else {
                continue;
            };
            if let Some(Related::One(Some(owner))) = instance.related_mut(name) {
                flush(&mut *conn, registry, owner).await?;
                let target = registry
                    .get(relation.target)
                    .ok_or_else(|| RepositoryError::UnknownEntity(relation.target.to_string()))?;
                let key = owner.primary_key(target).cloned().unwrap_or(Value::Null);
                instance.set(local_key, key);
            }
        }

        if !instance.is_persisted() {
            insert(&mut *conn, meta, instance).await?;
        } else if instance.is_dirty() {
            update(&mut *conn, meta, instance).await?;
        }

        let Some(key) = instance.primary_key(meta).cloned() else {
            return Ok(());
        };
        for (name, relation) in meta.relations() {
            let remote_key = match relation.kind {
                RelationKind::HasOne { remote_key } | RelationKind::HasMany { remote_key } => remote_key,
                RelationKind::BelongsTo { .. } => continue,
            };
            match instance.related_mut(name) {
                Some(Related::Many(children)) => {
                    for child in children.iter_mut() {
                        child.set(remote_key, key.clone());
                        flush(&mut *conn, registry, child).await?;
                    }
                }
                Some(Related::One(Some(child))) => {
                    child.set(remote_key, key.clone());
                    flush(&mut *conn, registry, child).await?;
                }
                _ => {}
            }
        }
        Ok(())
    })
}

async fn insert(
    conn: &mut SqliteConnection,
    meta: &EntityMeta,
    instance: &mut EntityInstance,
) -> Result<(), RepositoryError> {
    let columns: Vec<&'static str> = meta
        .columns()
        .map(|f| f.name)
        .filter(|c| match instance.get(c) {
            Some(v) => !(v.is_null() && *c == meta.primary_key),
            None => false,
        })
        .collect();

    let mut qb: QueryBuilder<'static, Sqlite> =
        QueryBuilder::new(format!("INSERT INTO {}", quote(meta.table)));
    if columns.is_empty() {
        qb.push(" DEFAULT VALUES");
    } else {
        qb.push(" (");
        qb.push(columns.iter().map(|c| quote(c)).collect::<Vec<_>>().join(", "));
        qb.push(") VALUES (");
        for (i, column) in columns.iter().enumerate() {
            if i > 0 {
                qb.push(", ");
            }
            push_value(&mut qb, instance.get(column).unwrap_or(&Value::Null));
        }
        qb.push(")");
    }
    qb.push(" RETURNING ").push(column_list(meta, None));

    tracing::debug!(entity = meta.name, sql = qb.sql(), "Inserting row");
    let row = qb.build().fetch_one(&mut *conn).await?;
    instance.mark_saved(decode_row(meta, &row)?);
    Ok(())
}

async fn update(
    conn: &mut SqliteConnection,
    meta: &EntityMeta,
    instance: &mut EntityInstance,
) -> Result<(), RepositoryError> {
    let key = instance.primary_key(meta).cloned().ok_or_else(|| {
        RepositoryError::Mapping(format!("cannot update '{}' without a primary key", meta.name))
    })?;
    let dirty: Vec<&'static str> = instance
        .dirty()
        .iter()
        .copied()
        .filter(|c| *c != meta.primary_key && meta.column(c).is_some())
        .collect();
    if dirty.is_empty() {
        return Ok(());
    }

    let mut qb: QueryBuilder<'static, Sqlite> =
        QueryBuilder::new(format!("UPDATE {} SET ", quote(meta.table)));
    for (i, column) in dirty.iter().enumerate() {
        if i > 0 {
            qb.push(", ");
        }
        qb.push(format!("{} = ", quote(column)));
        push_value(&mut qb, instance.get(column).unwrap_or(&Value::Null));
    }
    for touched in meta.columns().filter(|f| f.touch_on_update && !dirty.contains(&f.name)) {
        qb.push(format!(", {} = {}", quote(touched.name), NOW_SQL));
    }
    qb.push(format!(" WHERE {} = ", quote(meta.primary_key)));
    push_value(&mut qb, &key);
    qb.push(" RETURNING ").push(column_list(meta, None));

    tracing::debug!(entity = meta.name, sql = qb.sql(), "Updating row");
    let row = qb.build().fetch_one(&mut *conn).await?;
    instance.mark_saved(decode_row(meta, &row)?);
    Ok(())
}

/// Loads the named relations of `instances` with one `IN (...)` query per relation.
///
/// Names that are not relationships of `meta` are skipped.
pub async fn load_relations(
    conn: &mut SqliteConnection,
    registry: &Registry,
    meta: &EntityMeta,
    instances: &mut [EntityInstance],
    names: &[&str],
) -> Result<(), RepositoryError> {
    if instances.is_empty() {
        return Ok(());
    }
    for name in names {
        let Some((field, relation)) = meta.field(name).and_then(|f| f.relation().map(|r| (f.name, *r)))
        else {
            tracing::warn!(entity = meta.name, relation = %name, "Skipping unknown relation");
            continue;
        };
        let target = registry
            .get(relation.target)
            .ok_or_else(|| RepositoryError::UnknownEntity(relation.target.to_string()))?;

        match relation.kind {
            RelationKind::HasOne { remote_key } | RelationKind::HasMany { remote_key } => {
                let keys: Vec<Value> =
                    instances.iter().filter_map(|i| i.primary_key(meta).cloned()).collect();
                let mut grouped = fetch_grouped(&mut *conn, target, remote_key, &keys).await?;
                for instance in instances.iter_mut() {
                    let children = instance
                        .primary_key(meta)
                        .and_then(|k| grouped.remove(&k.to_string()))
                        .unwrap_or_default();
                    let related = if relation.is_many() {
                        Related::Many(children)
                    } else {
                        Related::One(children.into_iter().next().map(Box::new))
                    };
                    instance.set_related(field, related);
                }
            }
            RelationKind::BelongsTo { local_key } => {
                let keys: Vec<Value> = instances
                    .iter()
                    .filter_map(|i| i.get(local_key).filter(|v| !v.is_null()).cloned())
                    .collect();
                let grouped = fetch_grouped(&mut *conn, target, target.primary_key, &keys).await?;
                for instance in instances.iter_mut() {
                    let owner = instance
                        .get(local_key)
                        .and_then(|k| grouped.get(&k.to_string()))
                        .and_then(|rows| rows.first().cloned())
                        .map(Box::new);
                    instance.set_related(field, Related::One(owner));
                }
            }
        }
    }
    Ok(())
}

/// Loads every relation named in `input` that `instance` has not loaded yet,
/// then descends into the loaded instances with the matching nested input.
///
/// Merging relies on this: a to-many input aligns with the stored collection
/// and a to-one input lands on the stored target only once they are in memory.
/// To-many items pair with stored entries by position.
pub fn load_for_input<'a>(
    conn: &'a mut SqliteConnection,
    registry: &'a Registry,
    instance: &'a mut EntityInstance,
    input: &'a Value,
) -> BoxFuture<'a, Result<(), RepositoryError>> {
    Box::pin(async move {
        let Value::Object(map) = input else {
            return Ok(());
        };
        let meta = registry
            .get(instance.entity())
            .ok_or_else(|| RepositoryError::UnknownEntity(instance.entity().to_string()))?;

        let named: Vec<&'static str> =
            meta.relations().map(|(name, _)| name).filter(|name| map.contains_key(*name)).collect();
        let missing: Vec<&'static str> =
            named.iter().copied().filter(|name| instance.related(name).is_none()).collect();
        if !missing.is_empty() {
            load_relations(&mut *conn, registry, meta, std::slice::from_mut(&mut *instance), &missing).await?;
        }

        for name in named {
            let Some(nested) = map.get(name) else {
                continue;
            };
            match instance.related_mut(name) {
                Some(Related::Many(children)) => {
                    let items: Vec<&Value> = match nested {
                        Value::Array(items) => items.iter().collect(),
                        Value::Null => Vec::new(),
                        single => vec![single],
                    };
                    for (child, item) in children.iter_mut().zip(items) {
                        load_for_input(&mut *conn, registry, child, item).await?;
                    }
                }
                Some(Related::One(Some(child))) => {
                    load_for_input(&mut *conn, registry, child, nested).await?;
                }
                _ => {}
            }
        }
        Ok(())
    })
}

/// Rows of `meta` whose `column` is one of `keys`, grouped by that column.
async fn fetch_grouped(
    conn: &mut SqliteConnection,
    meta: &EntityMeta,
    column: &'static str,
    keys: &[Value],
) -> Result<HashMap<String, Vec<EntityInstance>>, RepositoryError> {
    let mut grouped: HashMap<String, Vec<EntityInstance>> = HashMap::new();
    if keys.is_empty() {
        return Ok(grouped);
    }

    let mut qb: QueryBuilder<'static, Sqlite> = QueryBuilder::new(format!(
        "SELECT {} FROM {} AS {} WHERE {}.{} IN (",
        column_list(meta, Some(ROOT)),
        quote(meta.table),
        ROOT,
        ROOT,
        quote(column)
    ));
    for (i, key) in keys.iter().enumerate() {
        if i > 0 {
            qb.push(", ");
        }
        push_value(&mut qb, key);
    }
    qb.push(format!(") ORDER BY {}.{}", ROOT, quote(meta.primary_key)));

    let rows = qb.build().fetch_all(&mut *conn).await?;
    for row in rows {
        let values = decode_row(meta, &row)?;
        let group = values.get(column).map(Value::to_string).unwrap_or_default();
        grouped.entry(group).or_default().push(EntityInstance::loaded(meta, values));
    }
    Ok(grouped)
}
