//! Output strategies
//!
//! An output strategy turns a stored course into a build tree. Strategies
//! are registered by name with the [`OutputManager`] and reuse the shared
//! stages exposed by [`OutputPipeline`].

pub mod adapt;
pub mod manager;

pub use adapt::AdaptOutput;
pub use manager::OutputManager;

use aat_common::config::OutputPaths;
use aat_common::storage::AssetStorage;
use aat_common::store::{ContentPlugin, ContentStore, StoreConfigPlugin};
use aat_common::{BuildMode, CourseDocument, Error, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

use crate::pipeline::assets::reset_folder;
use crate::pipeline::includes::menu_name;
use crate::pipeline::{
    build_flag, generate_includes_for_course, sanitize_course_json, AssetResolver,
    CourseJsonAssembler, CourseJsonWriter, IncludeList, ThemeApplier,
};

/// Identifies the course a request builds
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OutputRequest {
    pub tenant_id: String,
    pub course_id: String,
}

impl OutputRequest {
    pub fn new(tenant_id: impl Into<String>, course_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            course_id: course_id.into(),
        }
    }
}

/// A named output strategy
#[async_trait]
pub trait OutputPlugin: Send + Sync {
    async fn preview(&self, request: &OutputRequest) -> Result<Value>;
    async fn publish(&self, request: &OutputRequest) -> Result<Value>;
    async fn export(&self, request: &OutputRequest) -> Result<Value>;
}

/// Collaborators handed to every strategy
#[derive(Clone)]
pub struct OutputContext {
    pub store: Arc<dyn ContentStore>,
    pub storage: Arc<dyn AssetStorage>,
    pub config_plugin: Arc<dyn ContentPlugin>,
    pub paths: OutputPaths,
}

impl OutputContext {
    /// Context reading config through the store's `config` collection
    pub fn new(store: Arc<dyn ContentStore>, storage: Arc<dyn AssetStorage>, paths: OutputPaths) -> Self {
        let config_plugin: Arc<dyn ContentPlugin> = Arc::new(StoreConfigPlugin::new(store.clone()));
        Self {
            store,
            storage,
            config_plugin,
            paths,
        }
    }
}

/// Shared pipeline stages for output strategies
#[derive(Clone)]
pub struct OutputPipeline {
    assembler: CourseJsonAssembler,
    theme: ThemeApplier,
    assets: AssetResolver,
    writer: CourseJsonWriter,
    config_plugin: Arc<dyn ContentPlugin>,
    paths: OutputPaths,
}

impl OutputPipeline {
    pub fn new(context: &OutputContext) -> Self {
        Self {
            assembler: CourseJsonAssembler::new(context.store.clone(), context.config_plugin.clone()),
            theme: ThemeApplier::new(
                context.store.clone(),
                context.storage.clone(),
                context.paths.clone(),
            ),
            assets: AssetResolver::new(context.store.clone(), context.storage.clone()),
            writer: CourseJsonWriter::new(),
            config_plugin: context.config_plugin.clone(),
            paths: context.paths.clone(),
        }
    }

    pub fn paths(&self) -> &OutputPaths {
        &self.paths
    }

    pub async fn get_course_json(&self, request: &OutputRequest) -> Result<CourseDocument> {
        self.assembler
            .assemble(&request.tenant_id, &request.course_id)
            .await
    }

    pub fn sanitize_course_json(&self, mode: BuildMode, document: CourseDocument) -> Result<CourseDocument> {
        sanitize_course_json(mode, document)
    }

    pub async fn generate_includes_for_course(&self, request: &OutputRequest) -> Result<IncludeList> {
        generate_includes_for_course(
            self.config_plugin.as_ref(),
            &request.tenant_id,
            &request.course_id,
        )
        .await
    }

    /// Apply theme settings into the course's theme folder
    pub async fn apply_theme(&self, request: &OutputRequest, document: &CourseDocument) -> Result<String> {
        let destination = self
            .paths
            .theme_destination(&request.tenant_id, &request.course_id);
        self.theme
            .apply_theme(&request.tenant_id, &request.course_id, document, &destination)
            .await
    }

    pub async fn write_custom_style(&self, request: &OutputRequest, document: &CourseDocument) -> Result<bool> {
        let destination = self
            .paths
            .theme_destination(&request.tenant_id, &request.course_id);
        self.theme.write_custom_style(document, &destination).await
    }

    /// Menu folder the framework compiles; menus are never customised
    pub fn apply_menu(&self, document: &CourseDocument) -> String {
        menu_name(&document.config).to_string()
    }

    /// Resolve course assets into `<destination>/<language>/assets`
    pub async fn write_course_assets(
        &self,
        request: &OutputRequest,
        destination: &Path,
        document: CourseDocument,
    ) -> Result<CourseDocument> {
        let language = document.default_language()?.to_string();
        let assets_folder = destination
            .join(language)
            .join(aat_common::constants::folders::ASSETS);
        self.assets
            .write_course_assets(&request.tenant_id, &request.course_id, &assets_folder, document)
            .await
    }

    pub async fn write_course_json(&self, document: &CourseDocument, destination: &Path) -> Result<()> {
        self.writer.write_course_json(document, destination).await
    }

    /// Empty `destination` ahead of a fresh write
    pub async fn clear_destination(&self, destination: &Path) -> Result<()> {
        reset_folder(destination).await.map_err(|e| {
            Error::Write(format!("Unable to reset {}: {}", destination.display(), e))
        })
    }

    pub async fn build_flag_exists(&self, request: &OutputRequest) -> bool {
        build_flag::build_flag_exists(&self.paths.rebuild_flag(&request.tenant_id, &request.course_id))
            .await
    }

    pub async fn clear_build_flag(&self, request: &OutputRequest) {
        build_flag::clear_build_flag(&self.paths.rebuild_flag(&request.tenant_id, &request.course_id))
            .await
    }

    pub async fn mark_for_rebuild(&self, request: &OutputRequest) -> Result<()> {
        let flag = self.paths.rebuild_flag(&request.tenant_id, &request.course_id);
        build_flag::mark_for_rebuild(&flag).await.map_err(Error::from)
    }
}

static UNSLUGGABLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9_\s-]").expect("slug character class is valid"));
static SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[-\s]+").expect("slug separator class is valid"));

/// URL-friendly form of a title
///
/// Drops everything but ASCII word characters, whitespace and hyphens,
/// lowercases, and collapses runs of hyphens and whitespace to one hyphen.
pub fn slugify(text: &str) -> String {
    let kept = UNSLUGGABLE.replace_all(text, "");
    let lowered = kept.trim().to_lowercase();
    SEPARATORS.replace_all(&lowered, "-").into_owned()
}
