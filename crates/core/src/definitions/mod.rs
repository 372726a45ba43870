//! Task and app definition documents.
//!
//! Definition files are recognized by suffix: `*.task.yaml`, `*.task.yml` and
//! `*.task.json` for tasks, `*.app.yaml`, `*.app.yml` and `*.app.json` for apps. The
//! suffix also selects the serialization format.

mod app;
mod build_config;
mod convert;
mod legacy;
mod params;
mod task;
mod validate;

pub use app::AppDefinition;
pub use build_config::BuildConfigOverrides;
pub use legacy::{Definition0_2, Image0_2, Node0_2, Rest0_2, Script0_2, Sql0_2};
pub use params::{OptionDefinition, ParamType, ParameterDefinition};
pub use task::{
    Definition, ImageDefinition, KindDefinition, NodeDefinition, PythonDefinition,
    RestDefinition, ShellDefinition, SqlDefinition, TaskRuntime,
};

use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Suffixes of task definition files.
pub const TASK_DEF_SUFFIXES: [&str; 3] = [".task.yaml", ".task.yml", ".task.json"];

/// Suffixes of app definition files.
pub const APP_DEF_SUFFIXES: [&str; 3] = [".app.yaml", ".app.yml", ".app.json"];

/// Serialization format of a definition file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefFormat {
    /// YAML document.
    Yaml,
    /// JSON document.
    Json,
}

impl DefFormat {
    /// Picks the format from a file name: `.json` is JSON, everything else YAML.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::Json,
            _ => Self::Yaml,
        }
    }
}

impl fmt::Display for DefFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Yaml => f.write_str("yaml"),
            Self::Json => f.write_str("json"),
        }
    }
}

/// Schema version of a task definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DefinitionVersion {
    /// Legacy schema with API-shaped parameters.
    V0_2,
    /// Current schema.
    V0_3,
}

impl FromStr for DefinitionVersion {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "0.2" => Ok(Self::V0_2),
            "0.3" => Ok(Self::V0_3),
            other => Err(crate::Error::invalid(vec![format!(
                "unsupported definition version '{other}', expected 0.2 or 0.3"
            )])),
        }
    }
}

/// Top-level `version` key of a definition document.
#[derive(Deserialize)]
struct VersionHeader {
    #[serde(default)]
    version: Option<serde_json::Value>,
}

impl DefinitionVersion {
    /// Reads the schema version a document declares with its `version` key.
    ///
    /// Documents without one, or that cannot be read at all, are 0.3; the full
    /// parse reports what is wrong with them.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDefinition`](crate::Error::InvalidDefinition) if the
    /// declared version is not supported.
    pub fn detect(format: DefFormat, bytes: &[u8]) -> crate::Result<Self> {
        let header = match format {
            DefFormat::Yaml => serde_yaml::from_slice::<VersionHeader>(bytes).ok(),
            DefFormat::Json => serde_json::from_slice::<VersionHeader>(bytes).ok(),
        };
        match header.and_then(|h| h.version) {
            None => Ok(Self::V0_3),
            Some(serde_json::Value::String(version)) => version.parse(),
            Some(other) => other.to_string().parse(),
        }
    }
}

/// Whether the file name marks a task definition.
#[must_use]
pub fn is_task_def(path: &Path) -> bool {
    has_suffix(path, &TASK_DEF_SUFFIXES)
}

/// Whether the file name marks an app definition.
#[must_use]
pub fn is_app_def(path: &Path) -> bool {
    has_suffix(path, &APP_DEF_SUFFIXES)
}

fn has_suffix(path: &Path, suffixes: &[&str]) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| suffixes.iter().any(|suffix| name.ends_with(suffix)))
}
