//! Theme application
//!
//! Copies the course's theme template into a per-course folder and
//! rewrites variable declarations in its LESS sources with the course's
//! theme settings. Theme-scoped assets are streamed into the copy's
//! `assets` folder.

use aat_common::config::OutputPaths;
use aat_common::constants::{collections, filenames, folders};
use aat_common::encoding::encode_uri_component;
use aat_common::storage::AssetStorage;
use aat_common::store::{Condition, ContentStore, Filter, RetrieveOptions};
use aat_common::{CourseDocument, Error, Record, Result};
use regex::{Captures, Regex};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use super::assets::{retrieve_assets, stream_asset, CopyLedger, THEME_CONTENT_TYPE};
use super::includes::theme_name;

/// Joins a property group key and a child key
pub const PROPERTY_SEPARATOR: &str = "-";

/// Extension of the style sources receiving substitutions
pub const STYLE_EXTENSION: &str = "less";

/// Appended to every rewritten declaration
pub const BUILD_TIME_MARKER: &str = "// REPLACED AT BUILD-TIME";

/// Input type of image-valued theme properties
pub const IMAGE_INPUT_TYPE: &str = "Asset:image";

/// One customisable theme variable
#[derive(Debug, Clone, PartialEq)]
pub struct ThemeProperty {
    pub default: Option<Value>,
    pub input_type: Option<String>,
}

impl ThemeProperty {
    fn from_value(value: &Value) -> Self {
        Self {
            default: value.get("default").filter(|v| !v.is_null()).cloned(),
            input_type: value
                .get("inputType")
                .and_then(Value::as_str)
                .map(str::to_string),
        }
    }
}

/// Flatten a theme's property schema one level deep
///
/// A property carrying a nested `properties` group contributes one entry
/// per child, named `<group>-<child>`.
pub fn flatten_theme_schema(properties: &Record) -> Vec<(String, ThemeProperty)> {
    let mut flat = Vec::new();
    for (key, definition) in properties {
        match definition.get("properties").and_then(Value::as_object) {
            Some(children) => {
                for (child_key, child) in children {
                    flat.push((
                        format!("{}{}{}", key, PROPERTY_SEPARATOR, child_key),
                        ThemeProperty::from_value(child),
                    ));
                }
            }
            None => flat.push((key.clone(), ThemeProperty::from_value(definition))),
        }
    }
    flat
}

/// Flatten a course's theme settings the same way as the schema
pub fn flatten_theme_settings(settings: &Record) -> HashMap<String, Value> {
    let mut flat = HashMap::new();
    for (key, value) in settings {
        if key == "_type" {
            continue;
        }
        match value {
            Value::Object(children) => {
                for (child_key, child) in children {
                    flat.insert(
                        format!("{}{}{}", key, PROPERTY_SEPARATOR, child_key),
                        child.clone(),
                    );
                }
            }
            other => {
                flat.insert(key.clone(), other.clone());
            }
        }
    }
    flat
}

/// Text written into the stylesheet for a course value
///
/// Image paths keep their folders, get their file name percent-encoded and
/// lose the `course/` prefix so they resolve from the build root.
pub fn substitution_value(property: &ThemeProperty, value: &Value) -> String {
    let text = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };

    if property.input_type.as_deref() != Some(IMAGE_INPUT_TYPE) {
        return text;
    }

    let mut segments: Vec<String> = text.split('/').map(str::to_string).collect();
    if let Some(last) = segments.last_mut() {
        *last = encode_uri_component(last);
    }
    segments.join("/").replacen("course/", "", 1)
}

/// `(property, value)` pairs that differ from the schema defaults
pub fn theme_substitutions(
    schema: &[(String, ThemeProperty)],
    settings: &HashMap<String, Value>,
) -> Vec<(String, String)> {
    schema
        .iter()
        .filter_map(|(name, property)| {
            let value = settings.get(name)?;
            let default = property.default.as_ref()?;
            if default == value {
                return None;
            }
            Some((name.clone(), substitution_value(property, value)))
        })
        .collect()
}

/// Rewrite the first `<property>: ...;` declaration of each substitution
///
/// The property must start a name: `font-color` never matches inside
/// `@link-font-color`.
pub fn apply_substitutions(source: &str, substitutions: &[(String, String)]) -> Result<String> {
    let mut output = source.to_string();
    for (property, value) in substitutions {
        let regex = Regex::new(&format!(r"(^|[^\w-]){}\s*:[^;]+;", regex::escape(property)))
            .map_err(|e| Error::Theme(format!("Invalid theme property {}: {}", property, e)))?;
        let declaration = format!("{}: {}; {}", property, value, BUILD_TIME_MARKER);
        output = regex
            .replace(&output, |caps: &Captures| format!("{}{}", &caps[1], declaration))
            .into_owned();
    }
    Ok(output)
}

/// Recursively copy `source` into `destination`, returning the file count
pub fn copy_dir_all(source: &Path, destination: &Path) -> std::io::Result<u64> {
    let mut copied = 0;
    for entry in WalkDir::new(source) {
        let entry = entry.map_err(std::io::Error::from)?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        let target = destination.join(relative);

        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::copy(entry.path(), &target)?;
            copied += 1;
        }
    }
    Ok(copied)
}

fn folder_name(destination: &Path) -> String {
    destination
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Applies per-course theme customisations
#[derive(Clone)]
pub struct ThemeApplier {
    store: Arc<dyn ContentStore>,
    storage: Arc<dyn AssetStorage>,
    paths: OutputPaths,
}

impl ThemeApplier {
    pub fn new(store: Arc<dyn ContentStore>, storage: Arc<dyn AssetStorage>, paths: OutputPaths) -> Self {
        Self {
            store,
            storage,
            paths,
        }
    }

    /// Apply the course's theme customisations into `destination`
    ///
    /// Returns the theme folder the framework should compile: the theme's
    /// own name when nothing is customised, otherwise the name of
    /// `destination`.
    pub async fn apply_theme(
        &self,
        tenant_id: &str,
        course_id: &str,
        document: &CourseDocument,
        destination: &Path,
    ) -> Result<String> {
        let theme = theme_name(&document.config).to_string();
        let theme_settings = document
            .course
            .get("themeSettings")
            .and_then(Value::as_object);

        if theme_settings.is_none() && custom_style(document).is_none() {
            info!("No theme customisations for course {}", course_id);
            return Ok(theme);
        }

        let theme_type = self.retrieve_theme_type(&theme).await?;
        let template_name = theme_type
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or(&theme);
        let template = self.paths.theme_root().join(template_name);

        self.copy_template(&template, destination).await?;

        let Some(theme_settings) = theme_settings else {
            info!("No theme customisations, but custom CSS/LESS for course {}", course_id);
            return Ok(folder_name(destination));
        };

        match theme_type.get("properties").and_then(Value::as_object) {
            Some(properties) => {
                let schema = flatten_theme_schema(properties);
                let settings = flatten_theme_settings(theme_settings);
                let substitutions = theme_substitutions(&schema, &settings);
                self.rewrite_style_sources(destination, &substitutions).await?;
            }
            None => info!("Theme {} declares no properties", theme),
        }

        let copied = self
            .copy_theme_assets(tenant_id, course_id, destination)
            .await
            .map_err(|e| {
                error!("Unable to process theme assets: {}", e);
                e
            })?;
        info!("All theme assets processed ({} copied)", copied);

        Ok(folder_name(destination))
    }

    /// Write the course's custom LESS into the theme copy
    ///
    /// Returns false when the course has no custom style.
    pub async fn write_custom_style(&self, document: &CourseDocument, destination: &Path) -> Result<bool> {
        let Some(style) = custom_style(document) else {
            debug!("No custom LESS file required");
            return Ok(false);
        };

        let less_folder = destination.join(folders::LESS);
        let filename = less_folder.join(filenames::CUSTOM_STYLE);
        tokio::fs::create_dir_all(&less_folder)
            .await
            .map_err(|e| Error::theme_io("creating", &less_folder, e))?;
        tokio::fs::write(&filename, style)
            .await
            .map_err(|e| Error::theme_io("writing", &filename, e))?;

        info!("Custom LESS file written to {}", filename.display());
        Ok(true)
    }

    async fn retrieve_theme_type(&self, theme: &str) -> Result<Record> {
        let mut results = self
            .store
            .retrieve(
                &self.paths.master_tenant_id,
                collections::THEME_TYPE,
                &Filter::eq("name", theme),
                &RetrieveOptions::default(),
            )
            .await?;

        if results.len() != 1 {
            return Err(Error::Theme(format!(
                "Unable to retrieve themetype with name {} ({} records)",
                theme,
                results.len()
            )));
        }
        Ok(results.remove(0))
    }

    async fn copy_template(&self, template: &Path, destination: &Path) -> Result<()> {
        match tokio::fs::remove_dir_all(destination).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(Error::theme_io("removing", destination, e)),
        }

        let source = template.to_path_buf();
        let target = destination.to_path_buf();
        let copied = tokio::task::spawn_blocking(move || copy_dir_all(&source, &target))
            .await
            .map_err(|e| Error::Theme(format!("Theme copy task failed: {}", e)))?
            .map_err(|e| {
                error!("Error copying {} to {}: {}", template.display(), destination.display(), e);
                Error::Theme(format!(
                    "Error copying {} to {}: {}",
                    template.display(),
                    destination.display(),
                    e
                ))
            })?;

        debug!("Copied {} theme files to {}", copied, destination.display());
        Ok(())
    }

    async fn rewrite_style_sources(
        &self,
        destination: &Path,
        substitutions: &[(String, String)],
    ) -> Result<()> {
        if substitutions.is_empty() {
            debug!("Theme settings match the defaults, nothing to substitute");
            return Ok(());
        }

        let less_folder = destination.join(folders::LESS);
        let mut entries = tokio::fs::read_dir(&less_folder)
            .await
            .map_err(|e| Error::theme_io("reading", &less_folder, e))?;

        let mut sources: Vec<PathBuf> = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Error::theme_io("reading", &less_folder, e))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some(STYLE_EXTENSION) {
                sources.push(path);
            }
        }
        sources.sort();

        for source in sources {
            let text = tokio::fs::read_to_string(&source)
                .await
                .map_err(|e| Error::theme_io("reading", &source, e))?;
            let rewritten = apply_substitutions(&text, substitutions)?;
            if rewritten != text {
                tokio::fs::write(&source, rewritten)
                    .await
                    .map_err(|e| Error::theme_io("writing", &source, e))?;
                debug!("Applied theme settings to {}", source.display());
            }
        }
        Ok(())
    }

    async fn copy_theme_assets(&self, tenant_id: &str, course_id: &str, destination: &Path) -> Result<usize> {
        let filter = Filter::eq("_courseId", course_id).and(
            "_contentType",
            Condition::Eq(Value::String(THEME_CONTENT_TYPE.to_string())),
        );
        let course_assets = self
            .store
            .retrieve(tenant_id, collections::COURSE_ASSET, &filter, &RetrieveOptions::default())
            .await?;

        if course_assets.is_empty() {
            return Ok(0);
        }

        let assets_folder = destination.join(folders::ASSETS);
        tokio::fs::create_dir_all(&assets_folder)
            .await
            .map_err(|e| Error::theme_io("creating", &assets_folder, e))?;

        let mut ledger = CopyLedger::new();
        for course_asset in &course_assets {
            let Some(asset_id) = course_asset.get("_assetId").cloned() else {
                warn!("Theme course asset without _assetId, skipping");
                continue;
            };
            let asset = retrieve_assets(self.store.as_ref(), tenant_id, vec![asset_id.clone()])
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| Error::Asset(format!("Asset {} not found", asset_id)))?;

            if !ledger.first_copy(&asset.filename) {
                continue;
            }
            let output = assets_folder.join(&asset.filename);
            stream_asset(self.storage.as_ref(), &asset, &output).await?;
        }
        Ok(ledger.len())
    }
}

/// Course-level custom LESS, if any
fn custom_style(document: &CourseDocument) -> Option<&str> {
    document
        .course
        .get("customStyle")
        .and_then(Value::as_str)
        .filter(|style| !style.trim().is_empty())
}
