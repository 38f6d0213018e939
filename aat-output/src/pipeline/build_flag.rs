//! Rebuild sentinel helpers
//!
//! A `.rebuild` file in a course's build folder marks the previous build
//! as stale. Missing flags and failed removals are never fatal.

use std::path::Path;
use tracing::{debug, error};

/// True when the flag file exists
pub async fn build_flag_exists(flag: &Path) -> bool {
    match tokio::fs::metadata(flag).await {
        Ok(_) => true,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
        Err(e) => {
            error!("Unable to check build flag {}: {}", flag.display(), e);
            false
        }
    }
}

/// Remove the flag file; a missing flag is a no-op
pub async fn clear_build_flag(flag: &Path) {
    match tokio::fs::remove_file(flag).await {
        Ok(()) => debug!("Cleared build flag {}", flag.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => error!("Unable to clear build flag {}: {}", flag.display(), e),
    }
}

/// Create the flag file so the next preview or publish rebuilds
pub async fn mark_for_rebuild(flag: &Path) -> std::io::Result<()> {
    if let Some(parent) = flag.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(flag, b"").await
}
