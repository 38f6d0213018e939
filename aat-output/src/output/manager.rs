//! Output type registry and dispatch
//!
//! Strategies are registered as factories and instantiated on first use;
//! the instance is then reused for the lifetime of the manager. Builds of
//! the same course are serialised so two requests never write the same
//! destination tree at once.

use aat_common::{Error, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::adapt::{AdaptOutput, ADAPT_OUTPUT_TYPE};
use super::{OutputContext, OutputPlugin, OutputRequest};

/// Builds a strategy from the shared context
pub type PluginFactory = Box<dyn Fn(&OutputContext) -> Arc<dyn OutputPlugin> + Send + Sync>;

/// Operation requested of a strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputAction {
    Preview,
    Publish,
    Export,
}

impl std::fmt::Display for OutputAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            OutputAction::Preview => "preview",
            OutputAction::Publish => "publish",
            OutputAction::Export => "export",
        })
    }
}

pub struct OutputManager {
    context: OutputContext,
    factories: HashMap<String, PluginFactory>,
    plugins: Mutex<HashMap<String, Arc<dyn OutputPlugin>>>,
    build_locks: Mutex<HashMap<OutputRequest, Arc<Mutex<()>>>>,
}

impl OutputManager {
    /// Manager with no registered strategies
    pub fn new(context: OutputContext) -> Self {
        Self {
            context,
            factories: HashMap::new(),
            plugins: Mutex::new(HashMap::new()),
            build_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Manager with the default `adapt` strategy registered
    pub fn with_defaults(context: OutputContext) -> Self {
        let mut manager = Self::new(context);
        manager.register(
            ADAPT_OUTPUT_TYPE,
            Box::new(|context| Arc::new(AdaptOutput::new(context))),
        );
        manager
    }

    pub fn register(&mut self, output_type: &str, factory: PluginFactory) {
        self.factories.insert(output_type.to_string(), factory);
    }

    /// Registered output type names, sorted
    pub fn output_types(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    /// Memoized strategy instance for `output_type`
    pub async fn get_output_plugin(&self, output_type: &str) -> Result<Arc<dyn OutputPlugin>> {
        let mut plugins = self.plugins.lock().await;
        if let Some(plugin) = plugins.get(output_type) {
            return Ok(plugin.clone());
        }

        let factory = self
            .factories
            .get(output_type)
            .ok_or_else(|| Error::PluginNotFound(output_type.to_string()))?;
        let plugin = factory(&self.context);
        plugins.insert(output_type.to_string(), plugin.clone());
        info!("Loaded output plugin {}", output_type);
        Ok(plugin)
    }

    pub async fn preview(&self, output_type: &str, request: &OutputRequest) -> Result<Value> {
        self.dispatch(output_type, OutputAction::Preview, request).await
    }

    pub async fn publish(&self, output_type: &str, request: &OutputRequest) -> Result<Value> {
        self.dispatch(output_type, OutputAction::Publish, request).await
    }

    pub async fn export(&self, output_type: &str, request: &OutputRequest) -> Result<Value> {
        self.dispatch(output_type, OutputAction::Export, request).await
    }

    async fn dispatch(
        &self,
        output_type: &str,
        action: OutputAction,
        request: &OutputRequest,
    ) -> Result<Value> {
        let plugin = self.get_output_plugin(output_type).await?;

        let lock = self.build_lock(request).await;
        let guard = lock.lock().await;
        debug!(
            "{} {} for course {} (tenant {})",
            output_type, action, request.course_id, request.tenant_id
        );

        let result = match action {
            OutputAction::Preview => plugin.preview(request).await,
            OutputAction::Publish => plugin.publish(request).await,
            OutputAction::Export => plugin.export(request).await,
        };

        drop(guard);
        self.release_build_lock(request, lock).await;
        result
    }

    async fn build_lock(&self, request: &OutputRequest) -> Arc<Mutex<()>> {
        self.build_locks
            .lock()
            .await
            .entry(request.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Forget the course's lock once no other request holds or awaits it
    async fn release_build_lock(&self, request: &OutputRequest, lock: Arc<Mutex<()>>) {
        let mut locks = self.build_locks.lock().await;
        // One reference in the map plus ours
        if Arc::strong_count(&lock) <= 2 {
            locks.remove(request);
        }
    }

    /// Number of courses with a build in flight or waiting
    pub async fn active_build_locks(&self) -> usize {
        self.build_locks.lock().await.len()
    }
}
