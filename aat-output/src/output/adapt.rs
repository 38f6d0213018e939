//! Default `adapt` output strategy
//!
//! Preview and publish reuse the previous build unless the course was
//! flagged for rebuild or has never been built. Framework compilation and
//! packaging happen outside this service.

use aat_common::{BuildMode, Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use super::{slugify, OutputContext, OutputPipeline, OutputPlugin, OutputRequest};
use crate::pipeline::generate_includes_for_config;
use crate::pipeline::IncludeList;

/// Registered name of this strategy
pub const ADAPT_OUTPUT_TYPE: &str = "adapt";

/// What the last build produced, kept beside the build folder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildMetadata {
    pub theme: String,
    pub menu: String,
    pub includes: IncludeList,
    #[serde(default)]
    pub title: Option<String>,
}

/// Result of a preview or publish
#[derive(Debug, Clone, Serialize)]
pub struct BuildOutcome {
    pub theme: String,
    pub menu: String,
    pub includes: IncludeList,
    pub rebuilt: bool,
}

impl BuildOutcome {
    fn new(metadata: &BuildMetadata, rebuilt: bool) -> Self {
        Self {
            theme: metadata.theme.clone(),
            menu: metadata.menu.clone(),
            includes: metadata.includes.clone(),
            rebuilt,
        }
    }
}

pub struct AdaptOutput {
    pipeline: OutputPipeline,
}

impl AdaptOutput {
    pub fn new(context: &OutputContext) -> Self {
        Self {
            pipeline: OutputPipeline::new(context),
        }
    }

    async fn needs_rebuild(&self, request: &OutputRequest) -> bool {
        let metadata = self
            .pipeline
            .paths()
            .build_metadata(&request.tenant_id, &request.course_id);
        self.pipeline.build_flag_exists(request).await
            || !tokio::fs::try_exists(&metadata).await.unwrap_or(false)
    }

    async fn read_metadata(&self, request: &OutputRequest) -> Result<BuildMetadata> {
        let path = self
            .pipeline
            .paths()
            .build_metadata(&request.tenant_id, &request.course_id);
        let text = tokio::fs::read_to_string(&path).await?;
        Ok(serde_json::from_str(&text)?)
    }

    async fn write_metadata(&self, request: &OutputRequest, metadata: &BuildMetadata) -> Result<()> {
        let path = self
            .pipeline
            .paths()
            .build_metadata(&request.tenant_id, &request.course_id);
        let body = serde_json::to_string_pretty(metadata)?;
        tokio::fs::write(&path, body)
            .await
            .map_err(|e| Error::Write(format!("Unable to write {}: {}", path.display(), e)))
    }

    /// Build into the course's build folder when stale
    async fn build(&self, request: &OutputRequest, mode: BuildMode) -> Result<(BuildMetadata, bool)> {
        if !self.needs_rebuild(request).await {
            match self.read_metadata(request).await {
                Ok(metadata) => {
                    info!("Course {} is up to date, skipping {}", request.course_id, mode);
                    return Ok((metadata, false));
                }
                Err(e) => warn!("Unreadable build metadata, rebuilding: {}", e),
            }
        }

        info!("Building course {} for {}", request.course_id, mode);
        let document = self.pipeline.get_course_json(request).await?;
        let document = self.pipeline.sanitize_course_json(mode, document)?;
        let includes = generate_includes_for_config(&document.config);

        let theme = self.pipeline.apply_theme(request, &document).await?;
        self.pipeline.write_custom_style(request, &document).await?;
        let menu = self.pipeline.apply_menu(&document);

        let destination = self
            .pipeline
            .paths()
            .course_output(&request.tenant_id, &request.course_id);
        self.pipeline.clear_destination(&destination).await?;
        let document = self
            .pipeline
            .write_course_assets(request, &destination, document)
            .await?;
        self.pipeline.write_course_json(&document, &destination).await?;

        let metadata = BuildMetadata {
            theme,
            menu,
            includes,
            title: document
                .course
                .get("title")
                .and_then(Value::as_str)
                .map(str::to_string),
        };
        self.write_metadata(request, &metadata).await?;
        self.pipeline.clear_build_flag(request).await;

        info!("✓ Course {} built for {}", request.course_id, mode);
        Ok((metadata, true))
    }
}

#[async_trait]
impl OutputPlugin for AdaptOutput {
    async fn preview(&self, request: &OutputRequest) -> Result<Value> {
        let (metadata, rebuilt) = self.build(request, BuildMode::Preview).await?;
        Ok(serde_json::to_value(BuildOutcome::new(&metadata, rebuilt))?)
    }

    async fn publish(&self, request: &OutputRequest) -> Result<Value> {
        let (metadata, rebuilt) = self.build(request, BuildMode::Publish).await?;
        let title = metadata.title.as_deref().unwrap_or(&request.course_id);
        let mut payload = serde_json::to_value(BuildOutcome::new(&metadata, rebuilt))?;
        if let Value::Object(fields) = &mut payload {
            fields.insert("slug".to_string(), json!(slugify(title)));
        }
        Ok(payload)
    }

    async fn export(&self, request: &OutputRequest) -> Result<Value> {
        info!("Exporting course {}", request.course_id);
        let document = self.pipeline.get_course_json(request).await?;
        let document = self
            .pipeline
            .sanitize_course_json(BuildMode::Export, document)?;

        let destination = self
            .pipeline
            .paths()
            .export_destination(&request.tenant_id, &request.course_id);
        self.pipeline.clear_destination(&destination).await?;
        let document = self
            .pipeline
            .write_course_assets(request, &destination, document)
            .await?;
        self.pipeline.write_course_json(&document, &destination).await?;

        info!("✓ Course {} exported to {}", request.course_id, destination.display());
        Ok(Value::Null)
    }
}
