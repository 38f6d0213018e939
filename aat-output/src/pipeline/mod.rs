//! Course build pipeline stages
//!
//! Assembler → Sanitizer → ThemeApplier → AssetResolver → Writer. Each
//! stage consumes the previous stage's result; none starts before its
//! predecessor has finished.

pub mod assembler;
pub mod assets;
pub mod build_flag;
pub mod includes;
pub mod sanitizer;
pub mod theme;
pub mod writer;

pub use assembler::CourseJsonAssembler;
pub use assets::{AssetRecord, AssetResolver, CopyLedger};
pub use build_flag::{build_flag_exists, clear_build_flag, mark_for_rebuild};
pub use includes::{generate_includes_for_config, generate_includes_for_course, IncludeList};
pub use sanitizer::sanitize_course_json;
pub use theme::ThemeApplier;
pub use writer::CourseJsonWriter;
