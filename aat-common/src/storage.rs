//! Asset storage adapters
//!
//! Binary assets are read through a named repository. The output pipeline
//! only ever opens read streams; writing assets into storage belongs to the
//! asset manager and is not part of this crate.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncRead;

use crate::{Error, Result};

/// Boxed byte stream handed out by a [`Storage`]
pub type ReadStream = Box<dyn AsyncRead + Send + Unpin>;

/// One storage backend
#[async_trait]
pub trait Storage: Send + Sync {
    /// Open a byte stream for the asset stored at `path`
    async fn create_read_stream(&self, path: &str) -> Result<ReadStream>;
}

/// Repository lookup
#[async_trait]
pub trait AssetStorage: Send + Sync {
    async fn get_storage(&self, repository: &str) -> Result<Arc<dyn Storage>>;
}

/// Storage backed by files under a root folder
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve a stored path below the root, refusing to escape it
    pub fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        let escapes = relative
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)));
        if escapes {
            return Err(Error::Asset(format!("Asset path escapes storage root: {}", path)));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn create_read_stream(&self, path: &str) -> Result<ReadStream> {
        let full_path = self.resolve(path)?;
        let file = tokio::fs::File::open(&full_path).await.map_err(|e| {
            Error::Asset(format!("Unable to open {}: {}", full_path.display(), e))
        })?;
        Ok(Box::new(file))
    }
}

/// Repository name to storage backend
#[derive(Default, Clone)]
pub struct StorageRegistry {
    repositories: HashMap<String, Arc<dyn Storage>>,
}

impl StorageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, repository: &str, storage: Arc<dyn Storage>) -> Self {
        self.repositories.insert(repository.to_string(), storage);
        self
    }
}

#[async_trait]
impl AssetStorage for StorageRegistry {
    async fn get_storage(&self, repository: &str) -> Result<Arc<dyn Storage>> {
        self.repositories
            .get(repository)
            .cloned()
            .ok_or_else(|| Error::Asset(format!("Unknown storage repository: {}", repository)))
    }
}
