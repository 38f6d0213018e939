//! Common error types for the course output pipeline

use thiserror::Error;

/// Common result type for AAT operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error kinds surfaced by the output pipeline stages
///
/// Every stage aborts on the first error and hands it to its caller
/// unchanged. The HTTP surface turns any of these into a 500 response
/// carrying the `Display` text.
#[derive(Error, Debug)]
pub enum Error {
    /// Store/adapter failure or unexpected record count
    #[error("Retrieval error: {0}")]
    Retrieval(String),

    /// Sanitization invariant violation
    #[error("Reshape error: {0}")]
    Reshape(String),

    /// Missing theme type, theme copy/read/write failure
    #[error("Theme error: {0}")]
    Theme(String),

    /// Storage lookup or stream failure
    #[error("Asset error: {0}")]
    Asset(String),

    /// Serialization or filesystem failure while writing course JSON
    #[error("Write error: {0}")]
    Write(String),

    /// Unknown output type
    #[error("output type plugin {0} was not found")]
    PluginNotFound(String),

    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding/decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Theme error for a failed filesystem operation on `path`
    pub fn theme_io(action: &str, path: &std::path::Path, err: impl std::fmt::Display) -> Self {
        Error::Theme(format!("Error {} {}: {}", action, path.display(), err))
    }

    /// Asset error for a failed copy from `source` to `destination`
    pub fn asset_copy(source: &str, destination: &std::path::Path, err: impl std::fmt::Display) -> Self {
        Error::Asset(format!(
            "Error copying {} to {}: {}",
            source,
            destination.display(),
            err
        ))
    }
}
