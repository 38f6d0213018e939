//! Shared fixtures for aat-output integration tests

#![allow(dead_code)]

use aat_common::config::OutputPaths;
use aat_common::storage::{AssetStorage, ReadStream, Storage};
use aat_common::store::MemoryContentStore;
use aat_common::{Error, Record, Result};
use aat_output::output::{OutputContext, OutputManager};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

pub const TENANT: &str = "t1";
pub const MASTER: &str = "master";
pub const COURSE: &str = "c1";

pub fn record(value: Value) -> Record {
    value.as_object().cloned().expect("fixture must be an object")
}

/// Storage serving fixed bytes per path and counting opened streams
#[derive(Default)]
pub struct CountingStorage {
    files: HashMap<String, Vec<u8>>,
    opened: AtomicUsize,
}

impl CountingStorage {
    pub fn with_file(mut self, path: &str, bytes: &[u8]) -> Self {
        self.files.insert(path.to_string(), bytes.to_vec());
        self
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Storage for CountingStorage {
    async fn create_read_stream(&self, path: &str) -> Result<ReadStream> {
        let bytes = self
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| Error::Asset(format!("no such asset {}", path)))?;
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(std::io::Cursor::new(bytes)))
    }
}

/// Every repository resolves to the same counting storage
pub struct SingleRepository(pub Arc<CountingStorage>);

#[async_trait]
impl AssetStorage for SingleRepository {
    async fn get_storage(&self, _repository: &str) -> Result<Arc<dyn Storage>> {
        Ok(self.0.clone())
    }
}

/// A minimal course: one page, one article, two blocks stored out of order,
/// and a text component with nested properties
pub fn seed_course(store: &MemoryContentStore) {
    seed_course_with(store, json!({}));
}

/// As [`seed_course`], merging `course_fields` into the course record
pub fn seed_course_with(store: &MemoryContentStore, course_fields: Value) {
    let mut course = record(json!({"_id": COURSE, "_type": "course", "title": "Safety Basics"}));
    course.extend(record(course_fields));

    let inserts = [
        ("course", Value::Object(course)),
        (
            "config",
            json!({
                "_id": "cfg1",
                "_courseId": COURSE,
                "_defaultLanguage": "en",
                "_theme": "adapt-contrib-vanilla",
                "_enabledComponents": [{"name": "adapt-contrib-text"}],
                "_extensions": {"_trickle": {"_isEnabled": true}}
            }),
        ),
        (
            "contentobject",
            json!({"_id": "co1", "_courseId": COURSE, "_parentId": COURSE, "_sortOrder": 1}),
        ),
        (
            "article",
            json!({"_id": "a1", "_courseId": COURSE, "_parentId": "co1", "_sortOrder": 1}),
        ),
        (
            "block",
            json!({"_id": "b2", "_courseId": COURSE, "_parentId": "a1", "_sortOrder": 2}),
        ),
        (
            "block",
            json!({"_id": "b1", "_courseId": COURSE, "_parentId": "a1", "_sortOrder": 1}),
        ),
        (
            "component",
            json!({
                "_id": "cm1",
                "_courseId": COURSE,
                "_parentId": "b1",
                "_sortOrder": 1,
                "_component": "text",
                "properties": {"instruction": "Read this"}
            }),
        ),
    ];
    for (collection, value) in inserts {
        store
            .insert(TENANT, collection, record(value))
            .expect("seed insert");
    }
}

/// Scratch folder, store and storage wired into an output manager
pub struct Fixture {
    pub temp: TempDir,
    pub store: Arc<MemoryContentStore>,
    pub storage: Arc<CountingStorage>,
    pub paths: OutputPaths,
}

impl Fixture {
    pub fn new(storage: CountingStorage) -> Self {
        Self::with_course(storage, json!({}))
    }

    pub fn with_course(storage: CountingStorage, course_fields: Value) -> Self {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = OutputPaths::new(temp.path(), MASTER);
        let store = Arc::new(MemoryContentStore::new());
        seed_course_with(&store, course_fields);
        Self {
            temp,
            store,
            storage: Arc::new(storage),
            paths,
        }
    }

    pub fn context(&self) -> OutputContext {
        OutputContext::new(
            self.store.clone(),
            Arc::new(SingleRepository(self.storage.clone())),
            self.paths.clone(),
        )
    }

    pub fn manager(&self) -> OutputManager {
        OutputManager::with_defaults(self.context())
    }

    pub fn insert(&self, tenant: &str, collection: &str, value: Value) {
        self.store
            .insert(tenant, collection, record(value))
            .expect("insert");
    }
}

pub fn read_json(path: &std::path::Path) -> Value {
    let text = std::fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("read {}: {}", path.display(), e));
    serde_json::from_str(&text).expect("valid JSON")
}
