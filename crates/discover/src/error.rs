//! Error types for discovery.

use hangar_core::ApiError;
use miette::Diagnostic;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for discovery operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort discovery.
///
/// Files that are not tasks, tasks missing remotely and archived tasks are not
/// errors: discoverers skip them and log a warning where useful.
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// A definition could not be read, validated or converted.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Definition(#[from] hangar_core::Error),

    /// A runtime failed to resolve a root or workdir.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Runtime(#[from] hangar_runtime::Error),

    /// No runtime can deploy a linked script as its remote task kind.
    #[error("Cannot determine how to deploy {}", path.display())]
    #[diagnostic(
        code(hangar::discover::no_runtime),
        help("Check that the script's extension matches the kind of the task it is linked to")
    )]
    NoRuntime {
        /// The script.
        path: PathBuf,
        /// Why the lookup failed.
        #[source]
        source: hangar_runtime::Error,
    },

    /// A definition's entrypoint does not exist.
    #[error("Unable to find entrypoint {} referenced by {}", entrypoint.display(), defn_path.display())]
    #[diagnostic(
        code(hangar::discover::entrypoint_not_found),
        help("The entrypoint is resolved relative to the directory of the definition file")
    )]
    EntrypointNotFound {
        /// The definition file.
        defn_path: PathBuf,
        /// The resolved entrypoint.
        entrypoint: PathBuf,
    },

    /// A remote lookup failed for a reason other than the entity being missing.
    #[error("Unable to get {entity} '{slug}': {source}")]
    #[diagnostic(
        code(hangar::discover::api),
        help("Check your network connection and API credentials")
    )]
    Api {
        /// `task` or `app`.
        entity: &'static str,
        /// Slug that was looked up.
        slug: String,
        /// The API error.
        #[source]
        source: ApiError,
    },

    /// The external task parser failed or produced unusable output.
    #[error("Failed to parse tasks in {}: {message}", path.display())]
    #[diagnostic(
        code(hangar::discover::parser),
        help("Run the parser command manually to inspect its output; it needs npx on your PATH")
    )]
    Parser {
        /// The code file being parsed.
        path: PathBuf,
        /// What went wrong.
        message: String,
    },

    /// The external task parser did not finish in time.
    #[error("Parsing tasks in {} timed out after {seconds}s", path.display())]
    #[diagnostic(
        code(hangar::discover::parser_timeout),
        help("Increase parser.timeoutSeconds in the discovery configuration")
    )]
    ParserTimeout {
        /// The code file being parsed.
        path: PathBuf,
        /// The configured timeout.
        seconds: u64,
    },

    /// The discovery configuration file is invalid.
    #[error("Invalid discovery configuration{}: {source}", path.as_ref().map(|p| format!(" at {}", p.display())).unwrap_or_default())]
    #[diagnostic(
        code(hangar::discover::config),
        help("Check the configuration file for unknown keys or wrong value types")
    )]
    Config {
        /// The TOML error.
        #[source]
        source: toml::de::Error,
        /// Path of the file, when read from disk.
        path: Option<PathBuf>,
    },

    /// Discovery was cancelled.
    #[error("Discovery was cancelled")]
    #[diagnostic(code(hangar::discover::cancelled))]
    Cancelled,

    /// I/O error occurred.
    #[error("I/O error during {operation} at {}: {source}", path.display())]
    #[diagnostic(
        code(hangar::discover::io_error),
        help("Check file permissions and ensure the path exists")
    )]
    Io {
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
        /// The path involved.
        path: PathBuf,
        /// The operation that failed.
        operation: String,
    },
}

impl Error {
    /// Creates an I/O error with context.
    #[must_use]
    pub fn io(source: std::io::Error, path: impl Into<PathBuf>, operation: impl Into<String>) -> Self {
        Self::Io {
            source,
            path: path.into(),
            operation: operation.into(),
        }
    }

    /// Creates a parser error.
    #[must_use]
    pub fn parser(path: &Path, message: impl Into<String>) -> Self {
        Self::Parser {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }

    pub(crate) fn api(entity: &'static str, slug: &str, source: ApiError) -> Self {
        Self::Api {
            entity,
            slug: slug.to_string(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entrypoint_not_found_names_defn() {
        let err = Error::EntrypointNotFound {
            defn_path: PathBuf::from("/repo/defn.task.yaml"),
            entrypoint: PathBuf::from("/repo/missing.js"),
        };
        assert_eq!(
            err.to_string(),
            "Unable to find entrypoint /repo/missing.js referenced by /repo/defn.task.yaml"
        );
    }

    #[test]
    fn test_config_error_with_and_without_path() {
        let source = toml::from_str::<toml::Value>("envSlug = [").unwrap_err();
        let err = Error::Config {
            source,
            path: Some(PathBuf::from("/repo/hangar.toml")),
        };
        assert!(err.to_string().starts_with("Invalid discovery configuration at /repo/hangar.toml"));

        let source = toml::from_str::<toml::Value>("envSlug = [").unwrap_err();
        let err = Error::Config { source, path: None };
        assert!(err.to_string().starts_with("Invalid discovery configuration: "));
    }

    #[test]
    fn test_definition_errors_pass_through() {
        let err: Error = hangar_core::Error::invalid(vec!["slug: expected a task slug".to_string()]).into();
        assert!(err.to_string().contains("slug: expected a task slug"));
    }
}
