//! Course JSON sanitization
//!
//! Reshapes an assembled document into the structure the renderer
//! expects. The document is taken by value: on failure nothing is handed
//! back, so a half-reshaped document can never reach a later stage.

use aat_common::constants::COURSE_SENTINEL;
use aat_common::model::id_string;
use aat_common::{BuildMode, CourseDocument, Error, Result};
use serde_json::{json, Value};
use tracing::{debug, error};

use super::includes::generate_includes_for_config;

/// Reshape `document` for `mode`
pub fn sanitize_course_json(mode: BuildMode, document: CourseDocument) -> Result<CourseDocument> {
    let course_id = document.course_id.clone();
    reshape(mode, document).map_err(|e| {
        error!("Failed to sanitize course {}: {}", course_id, e);
        match e {
            Error::Reshape(_) => e,
            other => Error::Reshape(other.to_string()),
        }
    })
}

fn reshape(mode: BuildMode, mut document: CourseDocument) -> Result<CourseDocument> {
    let original_id = document
        .course
        .get("_id")
        .and_then(id_string)
        .ok_or_else(|| Error::Reshape("course record has no _id".to_string()))?;

    // The renderer expects the course's type and id to both read "course"
    let course = &mut document.course;
    course.insert("_type".to_string(), json!(COURSE_SENTINEL));
    course.insert("_id".to_string(), json!(COURSE_SENTINEL));
    course.insert("_latestTrackingId".to_string(), json!(document.blocks.len()));

    for content_object in document.content_objects.iter_mut() {
        let parent = content_object.get("_parentId").and_then(id_string);
        if parent.as_deref() == Some(original_id.as_str()) {
            content_object.insert("_parentId".to_string(), json!(COURSE_SENTINEL));
        }
    }

    for (index, block) in document.blocks.iter_mut().enumerate() {
        block.insert("_trackingId".to_string(), json!(index + 1));
    }

    // Hoist component `properties` without shadowing fields already on the component
    for component in document.components.iter_mut() {
        match component.shift_remove("properties") {
            None | Some(Value::Null) => {}
            Some(Value::Object(properties)) => {
                for (key, value) in properties {
                    if !component.contains_key(&key) {
                        component.insert(key, value);
                    }
                }
            }
            Some(other) => {
                return Err(Error::Reshape(format!(
                    "component {} has non-object properties: {}",
                    component
                        .get("_id")
                        .and_then(id_string)
                        .unwrap_or_else(|| "<unknown>".to_string()),
                    other
                )));
            }
        }
    }

    if mode != BuildMode::Export {
        let includes = generate_includes_for_config(&document.config);
        debug!("Includes for course {}: {:?}", original_id, includes.as_slice());
        document
            .config
            .insert("build".to_string(), json!({ "includes": includes.to_value() }));
    }

    Ok(document)
}
