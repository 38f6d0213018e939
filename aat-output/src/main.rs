//! aat-output - course build and publish service
//!
//! Serves preview and publish requests for stored courses, writing each
//! build tree below the configured temp folder.

use aat_common::config::{OutputConfig, TomlConfig};
use aat_common::storage::{LocalStorage, StorageRegistry};
use aat_common::store::SqliteContentStore;
use aat_output::output::{OutputContext, OutputManager};
use aat_output::{build_router, AppState};
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Repository name under which local asset files are served
const LOCAL_REPOSITORY: &str = "localfs";

/// Course build and publish service
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, default_value = "aat-output.toml")]
    config: PathBuf,

    /// Root folder holding the database, temp tree and assets
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let toml_config = TomlConfig::load(&args.config);

    let level = toml_config
        .as_ref()
        .map(|c| c.logging.level.clone())
        .unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{},tower_http=debug", level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting AAT Output (aat-output) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let toml_config = toml_config.map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;
    let config = OutputConfig::resolve(toml_config, args.root_folder.as_deref(), args.port);
    info!("Root folder: {}", config.root_folder.display());
    info!("Temp folder: {}", config.paths.temp_dir.display());

    std::fs::create_dir_all(&config.root_folder)?;

    let store = match SqliteContentStore::open(&config.database_path).await {
        Ok(store) => {
            info!("✓ Connected to content database");
            Arc::new(store)
        }
        Err(e) => {
            error!("Failed to open content database: {}", e);
            return Err(e.into());
        }
    };

    let storage = StorageRegistry::new().register(
        LOCAL_REPOSITORY,
        Arc::new(LocalStorage::new(&config.assets_folder)),
    );
    info!("Asset repository {}: {}", LOCAL_REPOSITORY, config.assets_folder.display());

    let context = OutputContext::new(store, Arc::new(storage), config.paths.clone());
    let manager = Arc::new(OutputManager::with_defaults(context));
    let state = AppState::new(manager, config.paths.master_tenant_id.clone());
    let app = build_router(state);

    let addr = format!("127.0.0.1:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("aat-output listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
