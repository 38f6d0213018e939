//! Plugin include list resolution
//!
//! The include list names every plugin the framework must compile for a
//! course: theme first, menu second, then enabled extensions and
//! components in config order. A fixed requirements table then adds
//! plugins that others depend on at runtime without declaring it.

use aat_common::constants::{DEFAULT_MENU, DEFAULT_THEME};
use aat_common::store::{ContentPlugin, Filter, RetrieveOptions};
use aat_common::{Error, Record, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Undeclared runtime dependencies: `(plugin, plugin it requires)`
///
/// Applied after the list is assembled. New pairs are added here.
pub const PLUGIN_REQUIREMENTS: &[(&str, &str)] = &[
    ("adapt-contrib-hotgraphic", "adapt-contrib-narrative"),
    ("adapt-contrib-gmcq", "adapt-contrib-mcq"),
];

/// Ordered, duplicate-free list of plugin identifiers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IncludeList(Vec<String>);

impl IncludeList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append unless already present; returns whether it was added
    pub fn push(&mut self, plugin: impl Into<String>) -> bool {
        let plugin = plugin.into();
        if self.contains(&plugin) {
            return false;
        }
        self.0.push(plugin);
        true
    }

    pub fn contains(&self, plugin: &str) -> bool {
        self.0.iter().any(|p| p == plugin)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn to_value(&self) -> Value {
        Value::Array(self.0.iter().cloned().map(Value::String).collect())
    }
}

/// Effective theme: config `_theme` or the default theme
pub fn theme_name(config: &Record) -> &str {
    config
        .get("_theme")
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_THEME)
}

/// Effective menu: config `_menu` or the default menu
pub fn menu_name(config: &Record) -> &str {
    config
        .get("_menu")
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_MENU)
}

/// Plugin names of an enabled list, which may be stored as an array or a keyed object
fn enabled_plugin_names(config: &Record, key: &str) -> Vec<String> {
    let entries: Vec<&Value> = match config.get(key) {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(Value::Object(map)) => map.values().collect(),
        _ => Vec::new(),
    };
    entries
        .into_iter()
        .filter_map(|entry| entry.get("name").and_then(Value::as_str))
        .map(str::to_string)
        .collect()
}

/// Include list for a config record
pub fn generate_includes_for_config(config: &Record) -> IncludeList {
    let mut includes = IncludeList::new();
    includes.push(theme_name(config));
    includes.push(menu_name(config));

    for name in enabled_plugin_names(config, "_enabledExtensions") {
        includes.push(name);
    }
    for name in enabled_plugin_names(config, "_enabledComponents") {
        includes.push(name);
    }

    for (plugin, required) in PLUGIN_REQUIREMENTS {
        if includes.contains(plugin) {
            includes.push(*required);
        }
    }

    includes
}

/// Include list for a course, read through the config content plugin
pub async fn generate_includes_for_course(
    config_plugin: &dyn ContentPlugin,
    tenant_id: &str,
    course_id: &str,
) -> Result<IncludeList> {
    let configs = config_plugin
        .retrieve(
            tenant_id,
            &Filter::eq("_courseId", course_id),
            &RetrieveOptions::default(),
        )
        .await?;

    let config = configs.first().ok_or_else(|| {
        Error::Retrieval(format!("No plugins included for course {}", course_id))
    })?;
    Ok(generate_includes_for_config(config))
}
