//! Identity of the `fromType` marker function.
//!
//! The marker is recognized by where it is declared, never by its lexical
//! name, so any local alias (`import { fromType as schemaOf }`) still
//! qualifies. The declaration texts shipped with the marker package are
//! embedded here so tests and in-memory projects can mount them.

use std::path::{Component, Path, PathBuf};

use serde::Deserialize;

use crate::fs::normalize_path;
use crate::program::ModuleRef;

/// Package name of the marker module.
pub const DEFAULT_PACKAGE_NAME: &str = "ts-transform-json-schema";

/// `package.json` of the marker package.
pub const PACKAGE_JSON: &str = include_str!("../marker/package.json");

/// Declaration-only form of the marker (`from-type.d.ts`).
pub const DECLARATION_SOURCE: &str = include_str!("../marker/from-type.d.ts");

/// Implementation form of the marker (`from-type.ts`). Its body always throws.
pub const IMPLEMENTATION_SOURCE: &str = include_str!("../marker/from-type.ts");

/// Describes which declarations count as the marker function.
///
/// A declaration site matches when any of these holds:
///
/// - it lives inside `declare module "<package_name>" { ... }`
/// - its file name is one of `file_names` and the file belongs to the
///   package, either by its nearest `package.json` or by an exact
///   `node_modules/<package_name>` path segment
/// - its normalized path equals one of `declaration_paths`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MarkerIdentity {
    pub package_name: String,
    pub file_names: Vec<String>,
    pub declaration_paths: Vec<PathBuf>,
}

impl Default for MarkerIdentity {
    fn default() -> Self {
        Self {
            package_name: DEFAULT_PACKAGE_NAME.to_string(),
            file_names: vec!["from-type.ts".to_string(), "from-type.d.ts".to_string()],
            declaration_paths: Vec::new(),
        }
    }
}

impl MarkerIdentity {
    /// Marker identity for a differently named package using the standard file names.
    pub fn for_package(name: impl Into<String>) -> Self {
        Self {
            package_name: name.into(),
            ..Self::default()
        }
    }

    /// Also accept a declaration at an exact path.
    pub fn with_declaration_path(mut self, path: impl AsRef<Path>) -> Self {
        self.declaration_paths.push(normalize_path(path.as_ref()));
        self
    }

    /// Whether `specifier` literally names the marker package.
    pub fn is_package_specifier(&self, specifier: &str) -> bool {
        specifier == self.package_name
    }

    /// Whether the module (or declaration site) `site` is the marker module.
    ///
    /// `package_name_of` returns the `name` of the nearest `package.json`
    /// above a file, if any.
    pub fn matches(
        &self,
        site: &ModuleRef,
        package_name_of: impl Fn(&Path) -> Option<String>,
    ) -> bool {
        if site.ambient.as_deref() == Some(self.package_name.as_str()) {
            return true;
        }

        let file = normalize_path(&site.file);
        if self.declaration_paths.iter().any(|p| normalize_path(p) == file) {
            return true;
        }

        let Some(basename) = file.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        if !self.file_names.iter().any(|n| n == basename) {
            return false;
        }

        self.is_inside_package_dir(&file)
            || package_name_of(&file).as_deref() == Some(self.package_name.as_str())
    }

    /// Whether `path` has the exact segments `node_modules/<package_name>`.
    fn is_inside_package_dir(&self, path: &Path) -> bool {
        let package_segments: Vec<&str> = self.package_name.split('/').collect();
        let segments: Vec<&str> = path
            .components()
            .filter_map(|c| match c {
                Component::Normal(s) => s.to_str(),
                _ => None,
            })
            .collect();

        segments.windows(package_segments.len() + 1).any(|window| {
            window[0] == "node_modules" && window[1..] == package_segments[..]
        })
    }
}
