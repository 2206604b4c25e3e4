//! Transform configuration.
//!
//! Configuration comes from code ([`TransformConfig`] is a plain struct) or
//! from the `compilerOptions.plugins` entry of a `tsconfig.json`:
//!
//! ```jsonc
//! {
//!   "compilerOptions": {
//!     "strictNullChecks": true,
//!     "plugins": [
//!       {
//!         "transform": "ts-transform-json-schema",
//!         "options": { "required": true },
//!         "onUnresolvedSymbol": "error"
//!       }
//!     ]
//!   }
//! }
//! ```

use std::path::Path;

use serde::Deserialize;
use serde_json::{Map, Value};
use swc_core::common::sync::Lrc;
use swc_core::common::{FileName, SourceMap};
use swc_core::ecma::parser::{Parser, StringInput, Syntax};

use crate::error::ConfigError;
use crate::fs::FileSystem;
use crate::marker::{DEFAULT_PACKAGE_NAME, MarkerIdentity};
use crate::options::static_value;

/// What to do when a marker call's type argument has no resolvable symbol.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UnresolvedSymbolPolicy {
    /// Abort the transform of the file.
    #[default]
    Error,
    /// Leave the call in place and keep the marker import.
    PassThrough,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TransformConfig {
    /// Generator options every call site starts from.
    pub defaults: Map<String, Value>,
    pub on_unresolved_symbol: UnresolvedSymbolPolicy,
    pub marker: MarkerIdentity,
}

/// The parts of a `tsconfig.json` the transform cares about.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectConfig {
    pub transform: TransformConfig,
    /// `compilerOptions.strictNullChecks`, falling back to `compilerOptions.strict`.
    pub strict_null_checks: Option<bool>,
}

impl ProjectConfig {
    /// The transform configuration with the project's `strictNullChecks`
    /// added to the defaults unless the plugin options already set it.
    pub fn into_transform_config(self) -> TransformConfig {
        let mut config = self.transform;
        if let Some(strict) = self.strict_null_checks {
            config
                .defaults
                .entry("strictNullChecks")
                .or_insert(Value::Bool(strict));
        }
        config
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct PluginEntry {
    transform: Option<String>,
    options: Map<String, Value>,
    on_unresolved_symbol: UnresolvedSymbolPolicy,
    marker: Option<MarkerIdentity>,
}

impl TransformConfig {
    /// Read the configuration from a `tsconfig.json`.
    ///
    /// The plugin entry is the one whose `transform` names the marker
    /// package (or a path inside it), either the default package or the one
    /// the entry's own `marker.packageName` sets. Without such an entry the
    /// default configuration is returned.
    pub fn from_tsconfig(fs: &dyn FileSystem, path: &Path) -> Result<ProjectConfig, ConfigError> {
        let text = fs.read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let document = parse_relaxed_json(&text, path)?;
        let compiler_options = document.get("compilerOptions");

        let strict_null_checks = compiler_options.and_then(|options| {
            options
                .get("strictNullChecks")
                .or_else(|| options.get("strict"))
                .and_then(Value::as_bool)
        });

        let entry = compiler_options
            .and_then(|options| options.get("plugins"))
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .find(|plugin| {
                let Some(transform) = plugin.get("transform").and_then(Value::as_str) else {
                    return false;
                };
                let own = plugin
                    .get("marker")
                    .and_then(|marker| marker.get("packageName"))
                    .and_then(Value::as_str);
                [Some(DEFAULT_PACKAGE_NAME), own]
                    .into_iter()
                    .flatten()
                    .any(|package| names_package(transform, package))
            });

        let transform = match entry {
            Some(entry) => {
                let entry: PluginEntry = serde_json::from_value(entry.clone())?;
                tracing::debug!(
                    transform = entry.transform.as_deref().unwrap_or_default(),
                    path = %path.display(),
                    "plugin configuration found"
                );
                TransformConfig {
                    defaults: entry.options,
                    on_unresolved_symbol: entry.on_unresolved_symbol,
                    marker: entry.marker.unwrap_or_default(),
                }
            }
            None => TransformConfig::default(),
        };

        Ok(ProjectConfig {
            transform,
            strict_null_checks,
        })
    }
}

/// Whether `transform` is `package` or a path inside it.
fn names_package(transform: &str, package: &str) -> bool {
    transform
        .strip_prefix(package)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

/// Parse a JSON document that may contain comments and trailing commas.
fn parse_relaxed_json(text: &str, path: &Path) -> Result<Value, ConfigError> {
    let cm: Lrc<SourceMap> = Default::default();
    // The newline keeps a trailing line comment from swallowing the paren.
    let fm = cm.new_source_file(
        FileName::Real(path.to_path_buf()).into(),
        format!("({text}\n)"),
    );
    let mut parser = Parser::new(Syntax::default(), StringInput::from(&*fm), None);
    let not_static = || ConfigError::NotStatic {
        path: path.to_path_buf(),
    };

    let expr = parser.parse_expr().map_err(|_| not_static())?;
    if !parser.take_errors().is_empty() {
        return Err(not_static());
    }
    static_value(&expr).ok_or_else(not_static)
}
