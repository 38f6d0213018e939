//! HTTP API handlers for aat-output

pub mod health;
pub mod output;

pub use health::health_routes;
pub use output::{output_routes, preview_course, publish_course};
