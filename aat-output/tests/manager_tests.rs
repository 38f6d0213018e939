//! Output manager registry and pipeline stage integration tests

mod helpers;

use aat_common::store::{ContentStore, Filter, RetrieveOptions, StoreConfigPlugin};
use aat_common::{Collection, CourseDocument, Error, Record, Result};
use aat_output::output::{OutputContext, OutputManager, OutputPlugin, OutputRequest};
use aat_output::pipeline::{generate_includes_for_course, CourseJsonAssembler, CourseJsonWriter};
use async_trait::async_trait;
use helpers::*;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Store whose every read fails
struct FailingStore;

#[async_trait]
impl ContentStore for FailingStore {
    async fn retrieve(
        &self,
        _tenant_id: &str,
        _collection: &str,
        _filter: &Filter,
        _options: &RetrieveOptions,
    ) -> Result<Vec<Record>> {
        Err(Error::Retrieval("store offline".to_string()))
    }
}

/// Strategy tracking how many builds overlap
#[derive(Default)]
struct OverlapTracker {
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl OverlapTracker {
    async fn enter(&self) -> Result<Value> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(Value::Null)
    }
}

#[async_trait]
impl OutputPlugin for OverlapTracker {
    async fn preview(&self, _request: &OutputRequest) -> Result<Value> {
        self.enter().await
    }
    async fn publish(&self, _request: &OutputRequest) -> Result<Value> {
        self.enter().await
    }
    async fn export(&self, _request: &OutputRequest) -> Result<Value> {
        self.enter().await
    }
}

#[tokio::test]
async fn test_unknown_output_type() {
    let fixture = Fixture::new(CountingStorage::default());
    let manager = fixture.manager();

    let err = manager
        .preview("scorm", &OutputRequest::new(TENANT, COURSE))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::PluginNotFound(_)));
    assert_eq!(err.to_string(), "output type plugin scorm was not found");
}

#[tokio::test]
async fn test_plugins_are_memoized() {
    let fixture = Fixture::new(CountingStorage::default());
    let created = Arc::new(AtomicUsize::new(0));

    let mut manager = OutputManager::new(fixture.context());
    let counter = created.clone();
    manager.register(
        "tracker",
        Box::new(move |_context: &OutputContext| {
            counter.fetch_add(1, Ordering::SeqCst);
            Arc::new(OverlapTracker::default()) as Arc<dyn OutputPlugin>
        }),
    );

    let first = manager.get_output_plugin("tracker").await.unwrap();
    let second = manager.get_output_plugin("tracker").await.unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(created.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_builds_of_one_course_are_serialised() {
    let fixture = Fixture::new(CountingStorage::default());
    let tracker = Arc::new(OverlapTracker::default());

    let mut manager = OutputManager::new(fixture.context());
    let shared = tracker.clone();
    manager.register(
        "tracker",
        Box::new(move |_context: &OutputContext| shared.clone() as Arc<dyn OutputPlugin>),
    );

    let request = OutputRequest::new(TENANT, COURSE);
    let (a, b) = tokio::join!(
        manager.preview("tracker", &request),
        manager.publish("tracker", &request)
    );
    a.unwrap();
    b.unwrap();
    assert_eq!(tracker.max_active.load(Ordering::SeqCst), 1);
    assert_eq!(manager.active_build_locks().await, 0);
}

#[tokio::test]
async fn test_build_locks_released_after_each_course() {
    let fixture = Fixture::new(CountingStorage::default());
    let mut manager = OutputManager::with_defaults(fixture.context());
    manager.register(
        "tracker",
        Box::new(|_context: &OutputContext| Arc::new(OverlapTracker::default()) as Arc<dyn OutputPlugin>),
    );

    for course in ["c1", "c2", "c3"] {
        manager
            .export("tracker", &OutputRequest::new(TENANT, course))
            .await
            .unwrap();
    }
    assert_eq!(manager.active_build_locks().await, 0);

    // Failed builds release their lock too
    let err = manager
        .preview("adapt", &OutputRequest::new(TENANT, "missing"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Retrieval(_)));
    assert_eq!(manager.active_build_locks().await, 0);
}

#[tokio::test]
async fn test_failing_store_aborts_assembly() {
    let store: Arc<dyn ContentStore> = Arc::new(FailingStore);
    let assembler = CourseJsonAssembler::new(store.clone(), Arc::new(StoreConfigPlugin::new(store)));

    let err = assembler.assemble(TENANT, COURSE).await.unwrap_err();
    assert!(matches!(err, Error::Retrieval(_)));
}

#[tokio::test]
async fn test_missing_config_is_retrieval_error() {
    let fixture = Fixture::new(CountingStorage::default());
    let store: Arc<dyn ContentStore> = fixture.store.clone();
    let assembler = CourseJsonAssembler::new(store.clone(), Arc::new(StoreConfigPlugin::new(store)));

    let err = assembler.assemble(TENANT, "no-such-course").await.unwrap_err();
    assert!(matches!(err, Error::Retrieval(_)));
}

#[tokio::test]
async fn test_includes_for_course_via_config_plugin() {
    let fixture = Fixture::new(CountingStorage::default());
    let plugin = StoreConfigPlugin::new(fixture.store.clone());

    let includes = generate_includes_for_course(&plugin, TENANT, COURSE).await.unwrap();
    assert_eq!(
        includes.as_slice(),
        ["adapt-contrib-vanilla", "adapt-contrib-boxMenu", "adapt-contrib-text"]
    );

    let err = generate_includes_for_course(&plugin, TENANT, "missing").await.unwrap_err();
    assert!(matches!(err, Error::Retrieval(_)));
}

#[tokio::test]
async fn test_written_collections_read_back_without_omitted_props() {
    let fixture = Fixture::with_course(CountingStorage::default(), json!({"customStyle": "a{}"}));
    let store: Arc<dyn ContentStore> = fixture.store.clone();
    let assembler = CourseJsonAssembler::new(store.clone(), Arc::new(StoreConfigPlugin::new(store)));
    let document: CourseDocument = assembler.assemble(TENANT, COURSE).await.unwrap();

    let out = fixture.temp.path().join("out");
    CourseJsonWriter::new()
        .write_course_json(&document, &out)
        .await
        .unwrap();

    for collection in Collection::ALL {
        let path = if collection == Collection::Config {
            out.join(collection.filename())
        } else {
            out.join("en").join(collection.filename())
        };
        let mut expected = document.collection_value(collection);
        aat_output::pipeline::writer::omit_properties(collection, &mut expected);
        assert_eq!(read_json(&path), expected, "{} should round-trip", collection);
    }

    let course = read_json(&out.join("en/course.json"));
    assert!(course.get("customStyle").is_none());
}
