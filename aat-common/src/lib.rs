//! # AAT Common Library
//!
//! Shared code for the authoring tool's course output services including:
//! - Course document model (collections, records, flattening)
//! - Error types shared by every pipeline stage
//! - Configuration loading and root folder resolution
//! - Content store adapters (SQLite, in-memory)
//! - Asset storage adapters
//! - Output constants (folders, filenames, defaults, build modes)

pub mod config;
pub mod constants;
pub mod encoding;
pub mod error;
pub mod model;
pub mod storage;
pub mod store;

pub use constants::{BuildMode, Collection};
pub use error::{Error, Result};
pub use model::{CourseDocument, Record};
