//! Discovery configuration.
//!
//! Usually read from a TOML file:
//!
//! ```toml
//! envSlug = "staging"
//! ignoredDirectories = ["dist", ".venv"]
//! codeTaskSuffixes = [".task.ts", ".task.js"]
//! maxParallel = 8
//!
//! [parser]
//! program = "npx"
//! timeoutSeconds = 120
//! ```
//!
//! Every key is optional; defaults reproduce the built-in behavior.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Directories that are never entered.
pub const ALWAYS_IGNORED: [&str; 3] = ["node_modules", "__pycache__", ".git"];

/// Settings shared by the orchestrator and the discoverers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct DiscoverConfig {
    /// Environment remote tasks and apps are looked up in.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env_slug: Option<String>,
    /// Directory names skipped in addition to [`ALWAYS_IGNORED`].
    pub ignored_directories: Vec<String>,
    /// File suffixes handled by the code-embedded task discoverer.
    pub code_task_suffixes: Vec<String>,
    /// Files processed at once; `0` uses the available parallelism.
    pub max_parallel: usize,
    /// External task parser.
    pub parser: ParserConfig,
}

impl Default for DiscoverConfig {
    fn default() -> Self {
        Self {
            env_slug: None,
            ignored_directories: Vec::new(),
            code_task_suffixes: vec![
                ".task.ts".to_string(),
                ".task.js".to_string(),
                ".tasks.ts".to_string(),
            ],
            max_parallel: 0,
            parser: ParserConfig::default(),
        }
    }
}

/// Command used to extract task declarations from code files.
///
/// The parser script path and the code file are appended to `args`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct ParserConfig {
    /// Executable to run.
    pub program: String,
    /// Leading arguments.
    pub args: Vec<String>,
    /// Kill the parser after this many seconds.
    pub timeout_seconds: u64,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            program: "npx".to_string(),
            args: [
                "-p",
                "typescript",
                "-p",
                "@types/node",
                "-p",
                "ts-node",
                "ts-node",
            ]
            .map(String::from)
            .to_vec(),
            timeout_seconds: 60,
        }
    }
}

impl DiscoverConfig {
    /// Parses a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] on syntax errors, unknown keys or wrong types.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|source| Error::Config { source, path: None })
    }

    /// Reads a TOML configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is invalid.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::io(e, path, "read discovery configuration"))?;
        toml::from_str(&content).map_err(|source| Error::Config {
            source,
            path: Some(path.to_path_buf()),
        })
    }

    /// Number of files processed at once.
    #[must_use]
    pub fn effective_parallelism(&self) -> usize {
        if self.max_parallel == 0 {
            std::thread::available_parallelism()
                .map(std::num::NonZero::get)
                .unwrap_or(1)
        } else {
            self.max_parallel
        }
    }

    /// Whether a directory with this name is skipped.
    #[must_use]
    pub fn is_ignored(&self, name: &str) -> bool {
        ALWAYS_IGNORED.contains(&name) || self.ignored_directories.iter().any(|d| d == name)
    }

    /// Whether the file name ends with a code task suffix.
    #[must_use]
    pub fn is_code_task(&self, path: &Path) -> bool {
        has_suffix(path, &self.code_task_suffixes)
    }
}

/// Whether the file name of `path` ends with one of `suffixes`.
pub(crate) fn has_suffix(path: &Path, suffixes: &[String]) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| suffixes.iter().any(|s| name.ends_with(s.as_str())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_is_default() {
        assert_eq!(DiscoverConfig::from_toml_str("").unwrap(), DiscoverConfig::default());
    }

    #[test]
    fn test_partial_document() {
        let config = DiscoverConfig::from_toml_str(
            "envSlug = \"staging\"\nignoredDirectories = [\"dist\"]\n\n[parser]\ntimeoutSeconds = 5\n",
        )
        .unwrap();
        assert_eq!(config.env_slug.as_deref(), Some("staging"));
        assert!(config.is_ignored("dist"));
        assert!(config.is_ignored("node_modules"));
        assert!(!config.is_ignored("src"));
        assert_eq!(config.parser.timeout_seconds, 5);
        assert_eq!(config.parser.program, "npx");
        assert_eq!(config.code_task_suffixes.len(), 3);
        assert!(config.effective_parallelism() >= 1);
    }

    #[test]
    fn test_max_parallel() {
        let config = DiscoverConfig::from_toml_str("maxParallel = 4\n").unwrap();
        assert_eq!(config.effective_parallelism(), 4);
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let err = DiscoverConfig::from_toml_str("envslug = \"x\"\n").unwrap_err();
        assert!(matches!(err, Error::Config { path: None, .. }));
    }

    #[test]
    fn test_load_from_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("hangar.toml");
        std::fs::write(&path, "codeTaskSuffixes = [\".hangar.ts\"]\n").unwrap();
        let config = DiscoverConfig::load(&path).unwrap();
        assert!(config.is_code_task(Path::new("/repo/hello.hangar.ts")));
        assert!(!config.is_code_task(Path::new("/repo/hello.task.ts")));

        let err = DiscoverConfig::load(&tmp.path().join("missing.toml")).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }

    #[test]
    fn test_default_code_suffixes() {
        let config = DiscoverConfig::default();
        assert!(config.is_code_task(Path::new("a.task.ts")));
        assert!(config.is_code_task(Path::new("a.task.js")));
        assert!(config.is_code_task(Path::new("a.tasks.ts")));
        assert!(!config.is_code_task(Path::new("a.task.yaml")));
    }
}
