//! Configuration loading and root folder resolution
//!
//! Bootstrap settings come from a small TOML file. A missing file is not
//! fatal: the service logs a warning and runs on compiled defaults.
//!
//! Root folder priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`AAT_ROOT_FOLDER`)
//! 3. TOML config file
//! 4. OS-dependent compiled default (fallback)

use crate::constants::{filenames, folders};
use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "AAT_ROOT_FOLDER";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    /// Root folder holding the database, temp tree and local assets
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Tenant owning the framework source and theme types
    #[serde(default = "default_master_tenant")]
    pub master_tenant_id: String,

    /// Build scratch space (default `<root>/temp`)
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,

    /// Content database (default `<root>/aat.db`)
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Root of the `localfs` asset repository (default `<root>/assets`)
    #[serde(default)]
    pub assets_folder: Option<PathBuf>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            root_folder: None,
            port: default_port(),
            master_tenant_id: default_master_tenant(),
            temp_dir: None,
            database_path: None,
            assets_folder: None,
            logging: LoggingConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_port() -> u16 {
    5780
}

fn default_master_tenant() -> String {
    "master".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl TomlConfig {
    /// Load the TOML file, falling back to defaults when it does not exist
    pub fn load(path: &Path) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Config file {} not found, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(Error::Config(format!(
                    "Failed to read config file {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        let config: TomlConfig = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse TOML: {}", e)))?;
        info!("Loaded TOML configuration from {}", path.display());
        Ok(config)
    }
}

/// Resolve the root folder following the documented priority order
pub fn resolve_root_folder(cli_arg: Option<&Path>, toml_root: Option<&Path>) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = toml_root {
        return path.to_path_buf();
    }

    get_default_root_folder()
}

/// Get OS-dependent default root folder path
pub fn get_default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("aat"))
        .unwrap_or_else(|| PathBuf::from("./aat_data"))
}

/// Fully resolved service configuration
#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub root_folder: PathBuf,
    pub port: u16,
    pub log_level: String,
    pub database_path: PathBuf,
    pub assets_folder: PathBuf,
    pub paths: OutputPaths,
}

impl OutputConfig {
    /// Combine TOML settings with CLI overrides
    pub fn resolve(toml: TomlConfig, cli_root: Option<&Path>, cli_port: Option<u16>) -> Self {
        let root_folder = resolve_root_folder(cli_root, toml.root_folder.as_deref());
        let temp_dir = toml
            .temp_dir
            .unwrap_or_else(|| root_folder.join(folders::TEMP));
        let database_path = toml
            .database_path
            .unwrap_or_else(|| root_folder.join("aat.db"));
        let assets_folder = toml
            .assets_folder
            .unwrap_or_else(|| root_folder.join(folders::ASSETS));

        Self {
            port: cli_port.unwrap_or(toml.port),
            log_level: toml.logging.level,
            database_path,
            assets_folder,
            paths: OutputPaths::new(temp_dir, toml.master_tenant_id),
            root_folder,
        }
    }
}

/// Folder layout of framework sources, builds and exports
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub temp_dir: PathBuf,
    pub master_tenant_id: String,
}

impl OutputPaths {
    pub fn new(temp_dir: impl Into<PathBuf>, master_tenant_id: impl Into<String>) -> Self {
        Self {
            temp_dir: temp_dir.into(),
            master_tenant_id: master_tenant_id.into(),
        }
    }

    /// `<temp>/<tenant>/adapt_framework`
    pub fn framework_root(&self, tenant_id: &str) -> PathBuf {
        self.temp_dir.join(tenant_id).join(folders::FRAMEWORK)
    }

    /// Theme templates shipped with the master tenant's framework copy
    pub fn theme_root(&self) -> PathBuf {
        self.framework_root(&self.master_tenant_id)
            .join(folders::SOURCE)
            .join(folders::THEME)
    }

    pub fn course_root(&self, tenant_id: &str, course_id: &str) -> PathBuf {
        self.framework_root(tenant_id)
            .join(folders::ALL_COURSES)
            .join(course_id)
    }

    pub fn build_folder(&self, tenant_id: &str, course_id: &str) -> PathBuf {
        self.course_root(tenant_id, course_id).join(folders::BUILD)
    }

    /// Where course JSON and per-language assets are written
    pub fn course_output(&self, tenant_id: &str, course_id: &str) -> PathBuf {
        self.build_folder(tenant_id, course_id).join(folders::COURSE)
    }

    pub fn rebuild_flag(&self, tenant_id: &str, course_id: &str) -> PathBuf {
        self.build_folder(tenant_id, course_id).join(filenames::REBUILD)
    }

    pub fn build_metadata(&self, tenant_id: &str, course_id: &str) -> PathBuf {
        self.course_root(tenant_id, course_id).join(filenames::METADATA)
    }

    /// Per-course copy of the theme template receiving customisations
    pub fn theme_destination(&self, tenant_id: &str, course_id: &str) -> PathBuf {
        self.course_root(tenant_id, course_id)
            .join(folders::THEME)
            .join(course_id)
    }

    pub fn export_destination(&self, tenant_id: &str, course_id: &str) -> PathBuf {
        self.temp_dir
            .join(tenant_id)
            .join(folders::EXPORTS)
            .join(course_id)
            .join(folders::COURSE)
    }
}
