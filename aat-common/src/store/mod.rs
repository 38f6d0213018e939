//! Content store adapters
//!
//! The pipeline reads typed collections through the [`ContentStore`]
//! contract only. Two adapters ship with the crate: a SQLite-backed store
//! holding records as JSON documents, and an in-memory store.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::model::{id_string, Record};
use crate::Result;

pub mod memory;
pub mod sqlite;

pub use memory::MemoryContentStore;
pub use sqlite::SqliteContentStore;

/// Single field predicate
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Field equals the value
    Eq(Value),
    /// Field is absent or differs from the value
    Ne(Value),
    /// Field equals one of the values
    In(Vec<Value>),
}

impl Condition {
    /// Evaluate against a field value (`None` when the field is absent)
    pub fn matches(&self, field: Option<&Value>) -> bool {
        match self {
            Condition::Eq(expected) => field == Some(expected),
            Condition::Ne(expected) => field != Some(expected),
            Condition::In(values) => field.map(|v| values.contains(v)).unwrap_or(false),
        }
    }
}

/// Conjunction of field conditions
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    pub conditions: Vec<(String, Condition)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// `{field: value}`
    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Self::new().and(field, Condition::Eq(value.into()))
    }

    pub fn and(mut self, field: &str, condition: Condition) -> Self {
        self.conditions.push((field.to_string(), condition));
        self
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.conditions
            .iter()
            .all(|(field, condition)| condition.matches(record.get(field)))
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// Retrieval options
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetrieveOptions {
    /// Sort on one field; records without it sort first
    pub sort: Option<(String, SortOrder)>,
}

impl RetrieveOptions {
    pub fn sorted_by(field: &str, order: SortOrder) -> Self {
        Self {
            sort: Some((field.to_string(), order)),
        }
    }
}

/// Read access to typed collections keyed by tenant
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Records of `collection` matching `filter`
    async fn retrieve(
        &self,
        tenant_id: &str,
        collection: &str,
        filter: &Filter,
        options: &RetrieveOptions,
    ) -> Result<Vec<Record>>;

    /// Distinct values of `field` among matching records, first-seen order
    async fn retrieve_distinct(
        &self,
        tenant_id: &str,
        collection: &str,
        filter: &Filter,
        field: &str,
    ) -> Result<Vec<Value>> {
        let records = self
            .retrieve(tenant_id, collection, filter, &RetrieveOptions::default())
            .await?;
        let mut values: Vec<Value> = Vec::new();
        for value in records.iter().filter_map(|r| r.get(field)) {
            if !values.contains(value) {
                values.push(value.clone());
            }
        }
        Ok(values)
    }

    /// Adapter-specific normalization applied before the pipeline consumes records
    fn export_results(&self, records: Vec<Record>) -> Vec<Record> {
        records.into_iter().map(stringify_ids).collect()
    }
}

/// Reference fields rendered as strings by [`ContentStore::export_results`]
pub const ID_FIELDS: [&str; 4] = ["_id", "_courseId", "_parentId", "_assetId"];

/// Render id-like fields as strings
pub fn stringify_ids(mut record: Record) -> Record {
    for field in ID_FIELDS {
        if let Some(value) = record.get_mut(field) {
            if let Some(id) = id_string(value) {
                *value = Value::String(id);
            }
        }
    }
    record
}

/// Content plugin indirection used for config access
#[async_trait]
pub trait ContentPlugin: Send + Sync {
    async fn retrieve(
        &self,
        tenant_id: &str,
        filter: &Filter,
        options: &RetrieveOptions,
    ) -> Result<Vec<Record>>;
}

/// Config content plugin reading the `config` collection from a store
pub struct StoreConfigPlugin {
    store: Arc<dyn ContentStore>,
}

impl StoreConfigPlugin {
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ContentPlugin for StoreConfigPlugin {
    async fn retrieve(
        &self,
        tenant_id: &str,
        filter: &Filter,
        options: &RetrieveOptions,
    ) -> Result<Vec<Record>> {
        let records = self
            .store
            .retrieve(tenant_id, crate::Collection::Config.name(), filter, options)
            .await?;
        Ok(self.store.export_results(records))
    }
}

/// Order records on a field the way both adapters do
pub(crate) fn sort_records(records: &mut [Record], field: &str, order: SortOrder) {
    records.sort_by(|a, b| {
        let ordering = compare_values(a.get(field), b.get(field));
        match order {
            SortOrder::Ascending => ordering,
            SortOrder::Descending => ordering.reverse(),
        }
    });
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_filter_conditions() {
        let r = record(json!({"_courseId": "c1", "_contentType": "theme"}));

        assert!(Filter::eq("_courseId", "c1").matches(&r));
        assert!(!Filter::eq("_courseId", "c2").matches(&r));

        let not_theme = Filter::eq("_courseId", "c1")
            .and("_contentType", Condition::Ne(json!("theme")));
        assert!(!not_theme.matches(&r));

        // $ne matches records lacking the field
        let bare = record(json!({"_courseId": "c1"}));
        assert!(not_theme.matches(&bare));

        let within = Filter::new().and("_courseId", Condition::In(vec![json!("c0"), json!("c1")]));
        assert!(within.matches(&r));
    }

    #[test]
    fn test_sort_records() {
        let mut records = vec![
            record(json!({"_sortOrder": 3})),
            record(json!({"_sortOrder": 1})),
            record(json!({"_sortOrder": 2})),
        ];
        sort_records(&mut records, "_sortOrder", SortOrder::Ascending);
        let order: Vec<_> = records.iter().map(|r| r["_sortOrder"].clone()).collect();
        assert_eq!(order, vec![json!(1), json!(2), json!(3)]);
    }

    #[test]
    fn test_stringify_ids() {
        let r = stringify_ids(record(json!({"_id": 7, "_parentId": "p", "title": 1})));
        assert_eq!(r["_id"], json!("7"));
        assert_eq!(r["_parentId"], json!("p"));
        assert_eq!(r["title"], json!(1));
    }
}
