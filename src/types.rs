use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AppError, AppResult};

/// Point lookup: equality on the primary key and on any extra columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, Value>,
}

impl Filter {
    pub fn by_id(id: i64) -> Self {
        Self { id: Some(id), ..Self::default() }
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    /// Set, non-null `(field, value)` pairs, primary key first.
    pub fn predicates(&self) -> Vec<(&str, Value)> {
        let mut out = Vec::with_capacity(self.fields.len() + 1);
        if let Some(id) = self.id {
            out.push(("id", Value::from(id)));
        }
        out.extend(
            self.fields
                .iter()
                .filter(|(k, v)| !v.is_null() && k.as_str() != "id")
                .map(|(k, v)| (k.as_str(), v.clone())),
        );
        out
    }
}

fn default_limit() -> i64 {
    100
}

/// Collection lookup: pagination, sort and free-text search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListFilter {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
    #[serde(default)]
    pub sort: Option<String>,
    #[serde(default)]
    pub search: Option<String>,
}

impl Default for ListFilter {
    fn default() -> Self {
        Self { limit: default_limit(), offset: 0, sort: None, search: None }
    }
}

/// Parsed `sort` parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub path: Vec<String>,
    pub descending: bool,
}

impl ListFilter {
    pub fn validate(&self) -> AppResult<()> {
        if self.limit <= 0 {
            return Err(AppError::ValidationError {
                field: "limit".to_string(),
                message: format!("Value must be positive, got {}", self.limit),
            });
        }
        if self.offset < 0 {
            return Err(AppError::ValidationError {
                field: "offset".to_string(),
                message: format!("Value must not be negative, got {}", self.offset),
            });
        }
        Ok(())
    }

    /// Parses `sort` into a field path and direction.
    ///
    /// Leading/trailing `+`, `-` and spaces are stripped; a leading `-` means
    /// descending. Paths use `.` or `__` between hops. `allowed` is either `["*"]`
    /// or the list of accepted sort strings; anything else yields `None`.
    pub fn sort_spec(&self, allowed: &[&str]) -> Option<SortSpec> {
        let raw = self.sort.as_deref()?;
        let field = raw.trim_matches(|c| c == '+' || c == '-' || c == ' ');
        if field.is_empty() {
            return None;
        }
        if !allowed.contains(&"*") && !allowed.contains(&field) {
            return None;
        }
        let path = field
            .split("__")
            .flat_map(|part| part.split('.'))
            .map(str::to_string)
            .collect();
        Some(SortSpec { path, descending: raw.trim().starts_with('-') })
    }

    /// Search term, if any. An empty string means no search.
    pub fn search_term(&self) -> Option<&str> {
        self.search.as_deref().filter(|s| !s.is_empty())
    }
}

/// Rows of one list query together with the unpaginated match count.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub rows: Vec<T>,
    pub total: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListMeta {
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseList<T> {
    pub data: Vec<T>,
    pub meta: ListMeta,
}

impl<T> ResponseList<T> {
    pub fn new(page: Page<T>, filter: &ListFilter) -> Self {
        Self {
            meta: ListMeta { total: page.total, limit: filter.limit, offset: filter.offset },
            data: page.rows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sorted(sort: &str) -> ListFilter {
        ListFilter { sort: Some(sort.to_string()), ..ListFilter::default() }
    }

    #[test]
    fn parses_descending_sort() {
        let spec = sorted("-created_at").sort_spec(&["*"]).unwrap();
        assert_eq!(spec.path, vec!["created_at"]);
        assert!(spec.descending);
    }

    #[test]
    fn parses_nested_sort_paths() {
        let spec = sorted("+addresses__city").sort_spec(&["*"]).unwrap();
        assert_eq!(spec.path, vec!["addresses", "city"]);
        assert!(!spec.descending);

        let spec = sorted("addresses.city").sort_spec(&["*"]).unwrap();
        assert_eq!(spec.path, vec!["addresses", "city"]);
    }

    #[test]
    fn sort_respects_allowlist() {
        assert!(sorted("email").sort_spec(&["created_at"]).is_none());
        assert!(sorted("-created_at").sort_spec(&["created_at"]).is_some());
        assert!(sorted(" - ").sort_spec(&["*"]).is_none());
    }

    #[test]
    fn empty_search_is_no_search() {
        let filter = ListFilter { search: Some(String::new()), ..ListFilter::default() };
        assert!(filter.search_term().is_none());
    }

    #[test]
    fn rejects_invalid_window() {
        assert!(ListFilter { limit: 0, ..ListFilter::default() }.validate().is_err());
        assert!(ListFilter { offset: -1, ..ListFilter::default() }.validate().is_err());
        assert!(ListFilter::default().validate().is_ok());
    }

    #[test]
    fn filter_predicates_skip_nulls() {
        let filter = Filter::by_id(3).eq("email", "a@b.c").eq("last_name", Value::Null);
        let preds = filter.predicates();
        assert_eq!(preds.len(), 2);
        assert_eq!(preds[0], ("id", Value::from(3)));
        assert_eq!(preds[1], ("email", Value::from("a@b.c")));
    }
}
