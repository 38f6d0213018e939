//! In-memory content store

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use super::{sort_records, ContentStore, Filter, RetrieveOptions};
use crate::model::Record;
use crate::{Error, Result};

/// Content store holding records in process memory, keyed by tenant and collection
#[derive(Default)]
pub struct MemoryContentStore {
    records: RwLock<HashMap<(String, String), Vec<Record>>>,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record to a collection
    pub fn insert(&self, tenant_id: &str, collection: &str, record: Record) -> Result<()> {
        let mut records = self
            .records
            .write()
            .map_err(|_| Error::Retrieval("memory store lock poisoned".to_string()))?;
        records
            .entry((tenant_id.to_string(), collection.to_string()))
            .or_default()
            .push(record);
        Ok(())
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn retrieve(
        &self,
        tenant_id: &str,
        collection: &str,
        filter: &Filter,
        options: &RetrieveOptions,
    ) -> Result<Vec<Record>> {
        let records = self
            .records
            .read()
            .map_err(|_| Error::Retrieval("memory store lock poisoned".to_string()))?;

        let mut matched: Vec<Record> = records
            .get(&(tenant_id.to_string(), collection.to_string()))
            .map(|all| all.iter().filter(|r| filter.matches(r)).cloned().collect())
            .unwrap_or_default();

        if let Some((field, order)) = &options.sort {
            sort_records(&mut matched, field, *order);
        }
        Ok(matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SortOrder;
    use serde_json::json;

    fn record(value: serde_json::Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_retrieve_by_tenant_and_filter() {
        let store = MemoryContentStore::new();
        store.insert("t1", "block", record(json!({"_courseId": "c1", "_sortOrder": 2}))).unwrap();
        store.insert("t1", "block", record(json!({"_courseId": "c1", "_sortOrder": 1}))).unwrap();
        store.insert("t1", "block", record(json!({"_courseId": "c2", "_sortOrder": 1}))).unwrap();
        store.insert("t2", "block", record(json!({"_courseId": "c1", "_sortOrder": 1}))).unwrap();

        let blocks = store
            .retrieve(
                "t1",
                "block",
                &Filter::eq("_courseId", "c1"),
                &RetrieveOptions::sorted_by("_sortOrder", SortOrder::Ascending),
            )
            .await
            .unwrap();

        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0]["_sortOrder"], json!(1));
        assert_eq!(blocks[1]["_sortOrder"], json!(2));
    }

    #[tokio::test]
    async fn test_missing_collection_is_empty() {
        let store = MemoryContentStore::new();
        let found = store
            .retrieve("t1", "article", &Filter::new(), &RetrieveOptions::default())
            .await
            .unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn test_retrieve_distinct() {
        let store = MemoryContentStore::new();
        for asset in ["a1", "a2", "a1"] {
            store
                .insert("t1", "courseasset", record(json!({"_courseId": "c1", "_assetId": asset})))
                .unwrap();
        }
        let ids = store
            .retrieve_distinct("t1", "courseasset", &Filter::eq("_courseId", "c1"), "_assetId")
            .await
            .unwrap();
        assert_eq!(ids, vec![json!("a1"), json!("a2")]);
    }
}
