//! Task and app discovery for hangar.
//!
//! Discovery walks a set of paths, offers every file to a list of discoverers and
//! resolves what they recognize into [`TaskConfig`]s and [`AppConfig`]s: the
//! task's remote identity, its build root, its entrypoint and a [`Definition`]
//! whose build configuration is normalized against that root.
//!
//! Four discoverers are provided:
//!
//! - [`ScriptDiscoverer`]: scripts linked to a remote task by a comment line.
//! - [`DefnDiscoverer`]: `*.task.{yaml,yml,json}` definition files, and scripts
//!   that sit next to one.
//! - [`CodeTaskDiscoverer`]: tasks declared in code, extracted by an external
//!   [`TaskParser`].
//! - [`AppDefnDiscoverer`]: `*.app.{yaml,yml,json}` definition files.
//!
//! The [`Discoverer`] runs them over a directory tree and keeps one config per
//! slug: the one from the earliest registered discoverer, and within a
//! discoverer the first found. Results are sorted by slug.
//!
//! [`Definition`]: hangar_core::Definition

pub mod app;
pub mod code;
pub mod config;
pub mod defn;
pub mod discoverer;
pub mod error;
pub mod parser;
mod resolve;
pub mod script;

pub use app::{AppDefnDiscoverer, MissingAppHandler};
pub use code::CodeTaskDiscoverer;
pub use config::{DiscoverConfig, ParserConfig};
pub use defn::{CreateMissingTask, DefnDiscoverer, MissingTaskHandler};
pub use discoverer::{Discovered, Discoverer};
pub use error::{Error, Result};
pub use parser::{NodeParser, ParsedParam, ParsedTask, TaskParser};
pub use script::ScriptDiscoverer;

use async_trait::async_trait;
use hangar_core::Definition;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Which discoverer produced a config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    /// A script with a linked comment.
    Script,
    /// A definition file.
    Defn,
    /// A task declared in code.
    Code,
}

impl ConfigSource {
    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Script => "script",
            Self::Defn => "defn",
            Self::Code => "code",
        }
    }
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A discovered task, resolved against its remote counterpart.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskConfig {
    /// ID of the remote task.
    pub task_id: String,
    /// Absolute build root.
    pub task_root: PathBuf,
    /// Absolute entrypoint, for kinds that have one. Always inside `task_root`.
    pub task_entrypoint: Option<PathBuf>,
    /// The resolved definition.
    pub def: Definition,
    /// The discoverer that produced this config.
    pub source: ConfigSource,
    /// Interpolation mode of the remote task, when known.
    pub interpolation_mode: Option<String>,
}

impl TaskConfig {
    /// The task slug.
    #[must_use]
    pub fn slug(&self) -> &str {
        &self.def.slug
    }
}

/// A discovered app, resolved against its remote counterpart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// ID of the remote app.
    pub id: String,
    /// The app slug.
    pub slug: String,
    /// Absolute build root.
    pub root: PathBuf,
    /// Absolute entrypoint.
    pub entrypoint: PathBuf,
    /// The discoverer that produced this config.
    pub source: ConfigSource,
}

/// Recognizes task files and resolves them.
#[async_trait]
pub trait TaskDiscoverer: Send + Sync {
    /// Resolves the tasks declared by `file`.
    ///
    /// An empty list means the file is not a task for this discoverer, or the
    /// task was skipped (missing or archived remotely).
    ///
    /// # Errors
    ///
    /// Returns an error when the file is a task but cannot be resolved.
    async fn task_configs(&self, file: &Path) -> Result<Vec<TaskConfig>>;

    /// Tag put on every config this discoverer produces.
    fn config_source(&self) -> ConfigSource;
}

/// Recognizes app files and resolves them.
#[async_trait]
pub trait AppDiscoverer: Send + Sync {
    /// Resolves the app declared by `file`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error when the file is an app but cannot be resolved.
    async fn app_config(&self, file: &Path) -> Result<Option<AppConfig>>;

    /// Tag put on every config this discoverer produces.
    fn config_source(&self) -> ConfigSource;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_source_names() {
        assert_eq!(ConfigSource::Script.to_string(), "script");
        assert_eq!(ConfigSource::Defn.to_string(), "defn");
        assert_eq!(serde_json::to_string(&ConfigSource::Code).unwrap(), "\"code\"");
    }
}
