//! Output constants: collections, defaults, folder and file names

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Theme used when a course config does not name one
pub const DEFAULT_THEME: &str = "adapt-contrib-vanilla";

/// Menu used when a course config does not name one
pub const DEFAULT_MENU: &str = "adapt-contrib-boxMenu";

/// Sentinel type/id the renderer expects on the course record
pub const COURSE_SENTINEL: &str = "course";

/// Field every ordered collection is sorted on
pub const SORT_ORDER_FIELD: &str = "_sortOrder";

/// Folder names inside the framework and build trees
pub mod folders {
    pub const SOURCE: &str = "src";
    pub const BUILD: &str = "build";
    pub const ASSETS: &str = "assets";
    pub const EXPORTS: &str = "exports";
    pub const COURSE: &str = "course";
    pub const ALL_COURSES: &str = "courses";
    pub const THEME: &str = "theme";
    pub const TEMP: &str = "temp";
    pub const LESS: &str = "less";
    pub const FRAMEWORK: &str = "adapt_framework";
}

/// Well-known file names
pub mod filenames {
    pub const REBUILD: &str = ".rebuild";
    pub const CUSTOM_STYLE: &str = "zzzzz.less";
    pub const METADATA: &str = "metadata.json";
}

/// Non-course collections the pipeline reads
pub mod collections {
    pub const COURSE_ASSET: &str = "courseasset";
    pub const ASSET: &str = "asset";
    pub const THEME_TYPE: &str = "themetype";
}

/// The six fixed content collections making up a course
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Course,
    Config,
    ContentObject,
    Article,
    Block,
    Component,
}

impl Collection {
    /// All collections in assembly order
    pub const ALL: [Collection; 6] = [
        Collection::Course,
        Collection::Config,
        Collection::ContentObject,
        Collection::Article,
        Collection::Block,
        Collection::Component,
    ];

    /// Store collection name
    pub fn name(self) -> &'static str {
        match self {
            Collection::Course => "course",
            Collection::Config => "config",
            Collection::ContentObject => "contentobject",
            Collection::Article => "article",
            Collection::Block => "block",
            Collection::Component => "component",
        }
    }

    /// Output file name for this collection
    pub fn filename(self) -> &'static str {
        match self {
            Collection::Course => "course.json",
            Collection::Config => "config.json",
            Collection::ContentObject => "contentObjects.json",
            Collection::Article => "articles.json",
            Collection::Block => "blocks.json",
            Collection::Component => "components.json",
        }
    }

    /// Top-level properties removed immediately before serialization
    pub fn omit_props(self) -> &'static [&'static str] {
        match self {
            Collection::Course => &["customStyle"],
            Collection::Config => &[
                "_theme",
                "_menu",
                "_enabledExtensions",
                "_enabledComponents",
            ],
            _ => &[],
        }
    }

    /// `course` and `config` hold a single record, the rest are sequences
    pub fn is_singular(self) -> bool {
        matches!(self, Collection::Course | Collection::Config)
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Output mode a build runs in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
    Preview,
    Publish,
    Export,
}

impl BuildMode {
    pub fn as_str(self) -> &'static str {
        match self {
            BuildMode::Preview => "preview",
            BuildMode::Publish => "publish",
            BuildMode::Export => "export",
        }
    }
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BuildMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "preview" => Ok(BuildMode::Preview),
            "publish" => Ok(BuildMode::Publish),
            "export" => Ok(BuildMode::Export),
            other => Err(Error::Config(format!("Unknown build mode: {}", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_files() {
        assert_eq!(Collection::ContentObject.filename(), "contentObjects.json");
        assert_eq!(Collection::Config.filename(), "config.json");
        assert!(Collection::Course.is_singular());
        assert!(!Collection::Block.is_singular());
    }

    #[test]
    fn test_omit_props() {
        assert_eq!(Collection::Course.omit_props(), &["customStyle"]);
        assert!(Collection::Config.omit_props().contains(&"_enabledComponents"));
        assert!(Collection::Component.omit_props().is_empty());
    }

    #[test]
    fn test_build_mode_parse() {
        assert_eq!("PREVIEW".parse::<BuildMode>().unwrap(), BuildMode::Preview);
        assert_eq!("export".parse::<BuildMode>().unwrap(), BuildMode::Export);
        assert!("zip".parse::<BuildMode>().is_err());
    }
}
