//! Course document model
//!
//! A course is held in memory as one record per singular collection
//! (`course`, `config`) and an ordered sequence of records for every
//! other collection, in the store's sort order.

use serde_json::{Map, Value};

use crate::constants::Collection;
use crate::{Error, Result};

/// A content record: field name to JSON value, in insertion order
pub type Record = Map<String, Value>;

/// Hoist the keys of `record[key]` onto `record`, then drop `record[key]`
///
/// Existing keys on the parent are never overwritten. A missing or
/// non-object nested value leaves the record untouched, so flattening an
/// already-flat record is a no-op.
pub fn flatten_object(record: &mut Record, key: &str) {
    let nested = match record.get(key) {
        Some(Value::Object(_)) => record.shift_remove(key),
        _ => return,
    };
    if let Some(Value::Object(nested)) = nested {
        for (nested_key, value) in nested {
            if !record.contains_key(&nested_key) {
                record.insert(nested_key, value);
            }
        }
    }
}

/// Render an identifier value as a string
///
/// Stores hand ids back either as strings or as numbers; both compare
/// equal to their string form.
pub fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// In-memory course document exclusively owned by one pipeline run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CourseDocument {
    /// Store id of the course this document was assembled for
    pub course_id: String,
    pub course: Record,
    pub config: Record,
    pub content_objects: Vec<Record>,
    pub articles: Vec<Record>,
    pub blocks: Vec<Record>,
    pub components: Vec<Record>,
}

impl CourseDocument {
    pub fn new(course_id: impl Into<String>) -> Self {
        Self {
            course_id: course_id.into(),
            ..Default::default()
        }
    }

    /// Records of an ordered collection (empty slice for singular ones)
    pub fn records(&self, collection: Collection) -> &[Record] {
        match collection {
            Collection::ContentObject => &self.content_objects,
            Collection::Article => &self.articles,
            Collection::Block => &self.blocks,
            Collection::Component => &self.components,
            Collection::Course | Collection::Config => &[],
        }
    }

    /// Mutable records of an ordered collection
    pub fn records_mut(&mut self, collection: Collection) -> Option<&mut Vec<Record>> {
        match collection {
            Collection::ContentObject => Some(&mut self.content_objects),
            Collection::Article => Some(&mut self.articles),
            Collection::Block => Some(&mut self.blocks),
            Collection::Component => Some(&mut self.components),
            Collection::Course | Collection::Config => None,
        }
    }

    /// Place fetched records into the matching slot
    ///
    /// Singular collections must receive exactly one record.
    pub fn set_collection(&mut self, collection: Collection, mut records: Vec<Record>) -> Result<()> {
        match collection {
            Collection::Course | Collection::Config => {
                if records.len() != 1 {
                    return Err(Error::Retrieval(format!(
                        "Expected exactly one {} record for course {}, found {}",
                        collection,
                        self.course_id,
                        records.len()
                    )));
                }
                let record = records.remove(0);
                if collection == Collection::Course {
                    self.course = record;
                } else {
                    self.config = record;
                }
            }
            _ => {
                if let Some(slot) = self.records_mut(collection) {
                    *slot = records;
                }
            }
        }
        Ok(())
    }

    /// JSON value of a collection as it is written to disk
    pub fn collection_value(&self, collection: Collection) -> Value {
        match collection {
            Collection::Course => Value::Object(self.course.clone()),
            Collection::Config => Value::Object(self.config.clone()),
            other => Value::Array(
                self.records(other)
                    .iter()
                    .cloned()
                    .map(Value::Object)
                    .collect(),
            ),
        }
    }

    /// Replace a collection from its JSON value
    pub fn set_collection_value(&mut self, collection: Collection, value: Value) -> Result<()> {
        match (collection, value) {
            (Collection::Course, Value::Object(record)) => self.course = record,
            (Collection::Config, Value::Object(record)) => self.config = record,
            (other, Value::Array(items)) if !other.is_singular() => {
                let records = items
                    .into_iter()
                    .map(|item| match item {
                        Value::Object(record) => Ok(record),
                        _ => Err(Error::Reshape(format!(
                            "{} contains a non-object record",
                            other
                        ))),
                    })
                    .collect::<Result<Vec<_>>>()?;
                if let Some(slot) = self.records_mut(other) {
                    *slot = records;
                }
            }
            (other, _) => {
                return Err(Error::Reshape(format!(
                    "Unexpected JSON shape for collection {}",
                    other
                )))
            }
        }
        Ok(())
    }

    /// Apply a whole-text rewrite to the serialized form of every collection
    pub fn rewrite_text<F>(&mut self, rewrite: F) -> Result<()>
    where
        F: Fn(&str) -> String,
    {
        for collection in Collection::ALL {
            let text = serde_json::to_string(&self.collection_value(collection))?;
            let rewritten = rewrite(&text);
            if rewritten != text {
                let value: Value = serde_json::from_str(&rewritten)?;
                self.set_collection_value(collection, value)?;
            }
        }
        Ok(())
    }

    /// Course language all per-language output lives under
    pub fn default_language(&self) -> Result<&str> {
        self.config
            .get("_defaultLanguage")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                Error::Reshape(format!(
                    "config for course {} has no _defaultLanguage",
                    self.course_id
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_flatten_hoists_nested_keys() {
        let mut r = record(json!({"title": "t", "menuSettings": {"_columns": 3}}));
        flatten_object(&mut r, "menuSettings");
        assert_eq!(r.get("_columns"), Some(&json!(3)));
        assert!(!r.contains_key("menuSettings"));
    }

    #[test]
    fn test_flatten_never_overwrites() {
        let mut r = record(json!({"_columns": 1, "menuSettings": {"_columns": 3, "_rows": 2}}));
        flatten_object(&mut r, "menuSettings");
        assert_eq!(r.get("_columns"), Some(&json!(1)));
        assert_eq!(r.get("_rows"), Some(&json!(2)));
    }

    #[test]
    fn test_flatten_is_idempotent() {
        let mut r = record(json!({"a": 1, "_extensions": {"b": 2}}));
        flatten_object(&mut r, "_extensions");
        let once = r.clone();
        flatten_object(&mut r, "_extensions");
        assert_eq!(r, once);
    }

    #[test]
    fn test_set_collection_requires_single_config() {
        let mut doc = CourseDocument::new("c1");
        let err = doc.set_collection(Collection::Config, vec![]).unwrap_err();
        assert!(matches!(err, Error::Retrieval(_)));

        let two = vec![Record::new(), Record::new()];
        assert!(doc.set_collection(Collection::Config, two).is_err());
    }

    #[test]
    fn test_rewrite_text_touches_every_collection() {
        let mut doc = CourseDocument::new("c1");
        doc.course = record(json!({"body": "see course/assets/a.png"}));
        doc.config = record(json!({"_defaultLanguage": "en"}));
        doc.components = vec![record(json!({"src": "course/assets/a.png"}))];

        doc.rewrite_text(|text| text.replace("course/assets/a.png", "course/en/assets/a.png"))
            .unwrap();

        assert_eq!(doc.course["body"], json!("see course/en/assets/a.png"));
        assert_eq!(doc.components[0]["src"], json!("course/en/assets/a.png"));
    }

    #[test]
    fn test_id_string() {
        assert_eq!(id_string(&json!("abc")), Some("abc".to_string()));
        assert_eq!(id_string(&json!(12)), Some("12".to_string()));
        assert_eq!(id_string(&json!(null)), None);
    }
}
