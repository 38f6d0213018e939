//! Course asset resolution
//!
//! Finds every asset a course references, rewrites the embedded
//! `course/assets/<file>` paths to their per-language location and streams
//! each asset into the output tree exactly once.

use aat_common::constants::collections;
use aat_common::encoding::encode_uri_component;
use aat_common::model::id_string;
use aat_common::storage::AssetStorage;
use aat_common::store::{Condition, ContentStore, Filter, RetrieveOptions};
use aat_common::{CourseDocument, Error, Record, Result};
use regex::{NoExpand, RegexBuilder};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info};

/// Content category whose assets belong to the theme rather than the course
pub const THEME_CONTENT_TYPE: &str = "theme";

/// Asset metadata needed to locate and name its bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRecord {
    pub id: String,
    pub filename: String,
    pub path: String,
    pub repository: String,
}

impl AssetRecord {
    pub fn from_record(record: &Record) -> Result<Self> {
        let field = |name: &str| -> Result<String> {
            record
                .get(name)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| Error::Asset(format!("asset record is missing {}", name)))
        };
        Ok(Self {
            id: record
                .get("_id")
                .and_then(id_string)
                .ok_or_else(|| Error::Asset("asset record is missing _id".to_string()))?,
            filename: field("filename")?,
            path: field("path")?,
            repository: field("repository")?,
        })
    }
}

/// File names already copied during one stage of one build
///
/// Owned by the stage invocation; never shared between builds.
#[derive(Debug, Default)]
pub struct CopyLedger {
    copied: HashSet<String>,
}

impl CopyLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `filename`; false when it was already copied
    pub fn first_copy(&mut self, filename: &str) -> bool {
        self.copied.insert(filename.to_string())
    }

    pub fn len(&self) -> usize {
        self.copied.len()
    }

    pub fn is_empty(&self) -> bool {
        self.copied.is_empty()
    }
}

/// Look up asset records by id
pub async fn retrieve_assets(
    store: &dyn ContentStore,
    tenant_id: &str,
    asset_ids: Vec<Value>,
) -> Result<Vec<AssetRecord>> {
    if asset_ids.is_empty() {
        return Ok(Vec::new());
    }
    let filter = Filter::new().and("_id", Condition::In(asset_ids));
    let records = store
        .retrieve(tenant_id, collections::ASSET, &filter, &RetrieveOptions::default())
        .await?;
    store
        .export_results(records)
        .iter()
        .map(AssetRecord::from_record)
        .collect()
}

/// Stream an asset's bytes into `destination`
///
/// The source stream and destination file are scoped to this call and
/// released on every return path.
pub async fn stream_asset(
    storage: &dyn AssetStorage,
    asset: &AssetRecord,
    destination: &Path,
) -> Result<()> {
    let backend = storage.get_storage(&asset.repository).await.map_err(|e| {
        error!("{}", e);
        e
    })?;

    let mut reader = backend
        .create_read_stream(&asset.path)
        .await
        .map_err(|e| Error::asset_copy(&asset.path, destination, e))?;
    let mut file = tokio::fs::File::create(destination)
        .await
        .map_err(|e| Error::asset_copy(&asset.path, destination, e))?;

    tokio::io::copy(&mut reader, &mut file)
        .await
        .map_err(|e| Error::asset_copy(&asset.path, destination, e))?;
    file.flush()
        .await
        .map_err(|e| Error::asset_copy(&asset.path, destination, e))?;

    debug!("Copied {} to {}", asset.path, destination.display());
    Ok(())
}

/// Root-relative path an asset is served from in the build output
pub fn course_asset_path(language: &str, filename: &str) -> String {
    format!("course/{}/assets/{}", language, encode_uri_component(filename))
}

/// Replace every `course/assets/<filename>` occurrence across the whole document
///
/// Matching is case-insensitive and textual: references inside free-text
/// body fields are rewritten too.
pub fn rewrite_asset_references(
    document: &mut CourseDocument,
    filename: &str,
    new_path: &str,
) -> Result<()> {
    let pattern = format!("course/assets/{}", regex::escape(filename));
    let regex = RegexBuilder::new(&pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| Error::Asset(format!("Invalid asset pattern {}: {}", pattern, e)))?;

    document.rewrite_text(|text| regex.replace_all(text, NoExpand(new_path)).into_owned())
}

/// Remove `folder` if present and recreate it empty
pub async fn reset_folder(folder: &Path) -> std::io::Result<()> {
    match tokio::fs::remove_dir_all(folder).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    tokio::fs::create_dir_all(folder).await
}

/// Rewrites course asset references and copies the referenced files
#[derive(Clone)]
pub struct AssetResolver {
    store: Arc<dyn ContentStore>,
    storage: Arc<dyn AssetStorage>,
}

impl AssetResolver {
    pub fn new(store: Arc<dyn ContentStore>, storage: Arc<dyn AssetStorage>) -> Self {
        Self { store, storage }
    }

    /// Resolve every non-theme asset of `course_id` into `destination`
    ///
    /// On error the document is dropped; callers must discard the build.
    pub async fn write_course_assets(
        &self,
        tenant_id: &str,
        course_id: &str,
        destination: &Path,
        mut document: CourseDocument,
    ) -> Result<CourseDocument> {
        reset_folder(destination).await.map_err(|e| {
            Error::Asset(format!(
                "Unable to reset assets folder {}: {}",
                destination.display(),
                e
            ))
        })?;

        let filter = Filter::eq("_courseId", course_id)
            .and("_contentType", Condition::Ne(json!(THEME_CONTENT_TYPE)));
        let asset_ids = self
            .store
            .retrieve_distinct(tenant_id, collections::COURSE_ASSET, &filter, "_assetId")
            .await
            .map_err(|e| {
                error!("Unable to list assets for course {}: {}", course_id, e);
                e
            })?;

        if asset_ids.is_empty() {
            info!("No assets referenced by course {}", course_id);
            return Ok(document);
        }

        let assets = retrieve_assets(self.store.as_ref(), tenant_id, asset_ids).await?;
        let language = document.default_language()?.to_string();
        let mut ledger = CopyLedger::new();

        // One asset fully streamed before the next begins
        for asset in &assets {
            let new_path = course_asset_path(&language, &asset.filename);
            rewrite_asset_references(&mut document, &asset.filename, &new_path)?;

            if !ledger.first_copy(&asset.filename) {
                debug!("Asset {} already copied, skipping", asset.filename);
                continue;
            }
            let output = destination.join(&asset.filename);
            stream_asset(self.storage.as_ref(), asset, &output)
                .await
                .map_err(|e| {
                    error!("Error processing course assets: {}", e);
                    e
                })?;
        }

        info!("All {} assets processed for course {}", ledger.len(), course_id);
        Ok(document)
    }
}
