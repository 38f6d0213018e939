//! Course JSON writer

use aat_common::{Collection, CourseDocument, Error, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

/// Shallow removal of a collection's omitted properties
pub fn omit_properties(collection: Collection, value: &mut Value) {
    let omit = collection.omit_props();
    if omit.is_empty() {
        return;
    }
    let strip = |record: &mut serde_json::Map<String, Value>| {
        for prop in omit {
            record.shift_remove(*prop);
        }
    };
    match value {
        Value::Object(record) => strip(record),
        Value::Array(items) => items
            .iter_mut()
            .filter_map(Value::as_object_mut)
            .for_each(strip),
        _ => {}
    }
}

/// File a collection is written to below `destination`
pub fn collection_path(destination: &Path, language: &str, collection: Collection) -> PathBuf {
    if collection == Collection::Config {
        destination.join(collection.filename())
    } else {
        destination.join(language).join(collection.filename())
    }
}

/// Writes one indented JSON file per collection
#[derive(Debug, Default, Clone)]
pub struct CourseJsonWriter;

impl CourseJsonWriter {
    pub fn new() -> Self {
        Self
    }

    /// Write every collection of `document` under `destination`
    ///
    /// Every write is attempted; the first failure is returned once all
    /// have run. Files already written are left in place. Without a
    /// default language only `config.json` can be written.
    pub async fn write_course_json(&self, document: &CourseDocument, destination: &Path) -> Result<()> {
        let language = document.default_language().map(str::to_string);

        let mut first_error: Option<Error> = None;
        for collection in Collection::ALL {
            let result = match (&language, collection) {
                (_, Collection::Config) => {
                    self.write_collection(document, collection, destination, "")
                        .await
                }
                (Ok(language), _) => {
                    self.write_collection(document, collection, destination, language)
                        .await
                }
                (Err(e), _) => Err(Error::Write(format!("Unable to place {}: {}", collection, e))),
            };
            if let Err(e) = result {
                error!("Failed to write {}: {}", collection, e);
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => {
                info!("✓ Course JSON written to {}", destination.display());
                Ok(())
            }
        }
    }

    async fn write_collection(
        &self,
        document: &CourseDocument,
        collection: Collection,
        destination: &Path,
        language: &str,
    ) -> Result<()> {
        let mut value = document.collection_value(collection);
        omit_properties(collection, &mut value);

        let path = collection_path(destination, language, collection);
        let body = serde_json::to_string_pretty(&value)
            .map_err(|e| Error::Write(format!("Unable to serialize {}: {}", collection, e)))?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::Write(format!("Unable to create {}: {}", parent.display(), e)))?;
        }
        tokio::fs::write(&path, body)
            .await
            .map_err(|e| Error::Write(format!("Unable to write {}: {}", path.display(), e)))?;

        debug!("Wrote {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_omit_is_shallow() {
        let mut value = json!({
            "_theme": "vanilla",
            "_menu": "boxMenu",
            "nested": {"_theme": "kept"},
            "_defaultLanguage": "en"
        });
        omit_properties(Collection::Config, &mut value);
        assert_eq!(value, json!({"nested": {"_theme": "kept"}, "_defaultLanguage": "en"}));
    }

    #[test]
    fn test_collection_paths() {
        let root = Path::new("/out");
        assert_eq!(collection_path(root, "en", Collection::Config), PathBuf::from("/out/config.json"));
        assert_eq!(
            collection_path(root, "en", Collection::Block),
            PathBuf::from("/out/en/blocks.json")
        );
    }

    #[tokio::test]
    async fn test_config_written_without_default_language() {
        let dir = tempfile::tempdir().unwrap();
        let mut doc = CourseDocument::new("c1");
        doc.config = json!({"_courseId": "c1", "_menu": "m"})
            .as_object()
            .cloned()
            .unwrap();

        let err = CourseJsonWriter::new()
            .write_course_json(&doc, dir.path())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Write(_)));
        let config = std::fs::read_to_string(dir.path().join("config.json")).unwrap();
        assert_eq!(config, "{\n  \"_courseId\": \"c1\"\n}");
    }

    #[tokio::test]
    async fn test_write_is_indented_and_ordered() {
        let dir = tempfile::tempdir().unwrap();
        let mut doc = CourseDocument::new("c1");
        doc.course = json!({"title": "T", "customStyle": ".x{}", "_id": "course"})
            .as_object()
            .cloned()
            .unwrap();
        doc.config = json!({"_defaultLanguage": "en", "_theme": "t"})
            .as_object()
            .cloned()
            .unwrap();

        CourseJsonWriter::new()
            .write_course_json(&doc, dir.path())
            .await
            .unwrap();

        let course = std::fs::read_to_string(dir.path().join("en/course.json")).unwrap();
        assert_eq!(course, "{\n  \"title\": \"T\",\n  \"_id\": \"course\"\n}");
        let articles = std::fs::read_to_string(dir.path().join("en/articles.json")).unwrap();
        assert_eq!(articles, "[]");
    }
}
