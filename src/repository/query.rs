//! SQL rendering for repository queries.
//!
//! A [`SelectQuery`] is a declarative description of one lookup against one root
//! entity. It is rendered into a `sqlx::QueryBuilder` only when executed, which
//! lets the list operation derive the COUNT query from the very same predicate.

use std::collections::BTreeMap;

use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite};

use crate::entity::{EntityMeta, RelationKind, ScalarType};

use super::filter_builder::ResolvedPath;

/// Alias of the root table in every generated SELECT.
pub const ROOT: &str = "root";

/// Escape character used in LIKE patterns.
const LIKE_ESCAPE: char = '!';

pub fn quote(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

pub fn escape_like_pattern(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '%' | '_' | LIKE_ESCAPE) {
            out.push(LIKE_ESCAPE);
        }
        out.push(ch);
    }
    out
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// `root.column = value`
    Eq { column: &'static str, value: Value },
    /// Case-insensitive substring match on at least one of the columns.
    Contains { columns: Vec<&'static str>, needle: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy<'r> {
    pub path: ResolvedPath<'r>,
    pub descending: bool,
}

#[derive(Debug, Clone)]
pub struct SelectQuery<'r> {
    entity: &'r EntityMeta,
    pub predicates: Vec<Predicate>,
    pub order: Option<OrderBy<'r>>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl<'r> SelectQuery<'r> {
    pub fn new(entity: &'r EntityMeta) -> Self {
        Self { entity, predicates: Vec::new(), order: None, limit: None, offset: None }
    }

    pub fn entity(&self) -> &'r EntityMeta {
        self.entity
    }

    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn order_by(mut self, order: OrderBy<'r>) -> Self {
        self.order = Some(order);
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Same predicate and order, no LIMIT/OFFSET.
    pub fn unpaginated(&self) -> Self {
        Self { limit: None, offset: None, ..self.clone() }
    }

    pub fn to_select(&self) -> QueryBuilder<'static, Sqlite> {
        let mut qb = QueryBuilder::new(format!(
            "SELECT {} FROM {} AS {}",
            column_list(self.entity, Some(ROOT)),
            quote(self.entity.table),
            ROOT
        ));
        self.push_where(&mut qb);

        if let Some(order) = &self.order {
            qb.push(" ORDER BY ");
            qb.push(order_expr(&order.path));
            qb.push(if order.descending { " DESC" } else { " ASC" });
            qb.push(format!(", {}.{} ASC", ROOT, quote(self.entity.primary_key)));
        }

        match (self.limit, self.offset) {
            (Some(limit), offset) => {
                qb.push(" LIMIT ").push_bind(limit);
                if let Some(offset) = offset {
                    qb.push(" OFFSET ").push_bind(offset);
                }
            }
            (None, Some(offset)) => {
                qb.push(" LIMIT -1 OFFSET ").push_bind(offset);
            }
            (None, None) => {}
        }
        qb
    }

    /// COUNT over the same predicate, ignoring order and pagination.
    pub fn to_count(&self) -> QueryBuilder<'static, Sqlite> {
        let mut qb = QueryBuilder::new(format!(
            "SELECT COUNT(*) AS cnt FROM {} AS {}",
            quote(self.entity.table),
            ROOT
        ));
        self.push_where(&mut qb);
        qb
    }

    fn push_where(&self, qb: &mut QueryBuilder<'static, Sqlite>) {
        for (i, predicate) in self.predicates.iter().enumerate() {
            qb.push(if i == 0 { " WHERE " } else { " AND " });
            match predicate {
                Predicate::Eq { column, value } => {
                    qb.push(format!("{}.{} = ", ROOT, quote(column)));
                    push_value(qb, value);
                }
                Predicate::Contains { columns, needle } => {
                    // SQLite's LOWER() only folds ASCII; the needle is folded the
                    // same way so non-ASCII letters compare exactly on both sides.
                    let pattern = format!("%{}%", escape_like_pattern(&needle.to_ascii_lowercase()));
                    qb.push("(");
                    for (j, column) in columns.iter().enumerate() {
                        if j > 0 {
                            qb.push(" OR ");
                        }
                        qb.push(format!("LOWER({}.{}) LIKE ", ROOT, quote(column)))
                            .push_bind(pattern.clone())
                            .push(format!(" ESCAPE '{}'", LIKE_ESCAPE));
                    }
                    qb.push(")");
                }
            }
        }
    }
}

/// `a."x", a."y", ...` for every scalar column of the entity.
pub fn column_list(entity: &EntityMeta, alias: Option<&str>) -> String {
    entity
        .columns()
        .map(|f| match alias {
            Some(alias) => format!("{}.{}", alias, quote(f.name)),
            None => quote(f.name),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Ordering expression for a resolved path.
///
/// A path without hops is the root column. Each relationship hop becomes a
/// correlated `MIN` subquery, so to-many hops never multiply root rows.
fn order_expr(path: &ResolvedPath<'_>) -> String {
    let depth = path.hops.len();
    let alias = |i: usize| if i == 0 { ROOT.to_string() } else { format!("s{}", i) };

    let mut expr = format!("{}.{}", alias(depth), quote(path.column));
    for (i, hop) in path.hops.iter().enumerate().rev() {
        let outer = alias(i);
        let inner = alias(i + 1);
        let condition = match hop.relation.kind {
            RelationKind::BelongsTo { local_key } => format!(
                "{}.{} = {}.{}",
                inner,
                quote(hop.to.primary_key),
                outer,
                quote(local_key)
            ),
            RelationKind::HasOne { remote_key } | RelationKind::HasMany { remote_key } => format!(
                "{}.{} = {}.{}",
                inner,
                quote(remote_key),
                outer,
                quote(hop.from.primary_key)
            ),
        };
        expr = format!(
            "(SELECT MIN({}) FROM {} AS {} WHERE {})",
            expr,
            quote(hop.to.table),
            inner,
            condition
        );
    }
    expr
}

pub fn push_value(qb: &mut QueryBuilder<'static, Sqlite>, value: &Value) {
    match value {
        Value::Null => qb.push_bind(Option::<String>::None),
        Value::Bool(b) => qb.push_bind(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => qb.push_bind(i),
            None => qb.push_bind(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => qb.push_bind(s.clone()),
        other => qb.push_bind(other.to_string()),
    };
}

/// Reads every scalar column of the entity from a row.
pub fn decode_row(
    entity: &EntityMeta,
    row: &SqliteRow,
) -> Result<BTreeMap<&'static str, Value>, sqlx::Error> {
    let mut values = BTreeMap::new();
    for field in entity.columns() {
        let value = match field.scalar_type() {
            Some(ScalarType::Integer) => row.try_get::<Option<i64>, _>(field.name)?.map(Value::from),
            Some(ScalarType::Real) => row
                .try_get::<Option<f64>, _>(field.name)?
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number),
            Some(ScalarType::Bool) => row.try_get::<Option<bool>, _>(field.name)?.map(Value::Bool),
            Some(ScalarType::Text) | Some(ScalarType::Timestamp) => {
                row.try_get::<Option<String>, _>(field.name)?.map(Value::String)
            }
            None => continue,
        };
        values.insert(field.name, value.unwrap_or(Value::Null));
    }
    Ok(values)
}
