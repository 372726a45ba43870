//! Error types for runtime resolution.

use hangar_core::TaskKind;
use miette::Diagnostic;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for runtime operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while resolving a runtime or its directories.
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// No registered runtime handles the file.
    #[error("{}", unsupported_message(path, *kind))]
    #[diagnostic(
        code(hangar::runtime::unsupported),
        help("Supported extensions: .js, .jsx, .mjs, .cjs, .ts, .tsx (node), .py (python), .sh (shell), .sql (sql)")
    )]
    UnsupportedRuntime {
        /// The file that was looked up.
        path: PathBuf,
        /// The task kind the file was expected to run as, if known.
        kind: Option<TaskKind>,
    },

    /// A `package.json` could not be parsed.
    #[error("Invalid package.json at {}: {message}", path.display())]
    #[diagnostic(
        code(hangar::runtime::invalid_package_json),
        help("Check the package.json for syntax errors")
    )]
    InvalidPackageJson {
        /// Path of the manifest.
        path: PathBuf,
        /// Parser message.
        message: String,
    },

    /// I/O error occurred.
    #[error("I/O error during {operation} at {}: {source}", path.display())]
    #[diagnostic(
        code(hangar::runtime::io_error),
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
    /// Creates an unsupported-runtime error.
    #[must_use]
    pub fn unsupported(path: &Path, kind: Option<TaskKind>) -> Self {
        Self::UnsupportedRuntime {
            path: path.to_path_buf(),
            kind,
        }
    }

    /// Creates an I/O error with context.
    #[must_use]
    pub fn io(source: std::io::Error, path: impl Into<PathBuf>, operation: impl Into<String>) -> Self {
        Self::Io {
            source,
            path: path.into(),
            operation: operation.into(),
        }
    }
}

fn unsupported_message(path: &Path, kind: Option<TaskKind>) -> String {
    match kind {
        Some(kind) => format!("Unsupported {kind} runtime for {}", path.display()),
        None => format!("No runtime supports {}", path.display()),
    }
}
