//! Error types for definition handling.

use crate::api::ApiError;
use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for definition operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while reading, converting or serializing definitions.
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// A definition document failed to parse or validate.
    #[error("Invalid definition:{}", render_messages(messages))]
    #[diagnostic(
        code(hangar::definition::invalid),
        help("Fix every listed field; all validation problems are reported at once")
    )]
    InvalidDefinition {
        /// Every field-level problem found.
        messages: Vec<String>,
    },

    /// A definition file failed to parse or validate.
    #[error("Error reading {}:{}", path.display(), render_messages(messages))]
    #[diagnostic(
        code(hangar::definition::read_failed),
        help("Fix every listed field in the definition file")
    )]
    ReadDefinition {
        /// Path of the definition file.
        path: PathBuf,
        /// Every field-level problem found.
        messages: Vec<String>,
    },

    /// The task kind has no entrypoint file.
    #[error("Task kind '{kind}' does not have an entrypoint")]
    #[diagnostic(code(hangar::definition::no_entrypoint))]
    NoEntrypoint {
        /// The kind that was asked for an entrypoint.
        kind: crate::TaskKind,
    },

    /// The absolute entrypoint was requested before it was resolved.
    #[error("Absolute entrypoint has not been set for task '{slug}'")]
    #[diagnostic(
        code(hangar::definition::no_absolute_entrypoint),
        help("Definitions must be resolved by a discoverer before their entrypoint can be used")
    )]
    NoAbsoluteEntrypoint {
        /// Slug of the task.
        slug: String,
    },

    /// A kind name was not recognized.
    #[error("Unknown task kind: {kind}")]
    #[diagnostic(
        code(hangar::definition::unknown_kind),
        help("Supported kinds: image, node, python, shell, sql, rest")
    )]
    UnknownKind {
        /// The unrecognized kind.
        kind: String,
    },

    /// A resource referenced by name or ID does not exist.
    #[error("Unknown resource: {reference}")]
    #[diagnostic(
        code(hangar::definition::unknown_resource),
        help("Check the resource name against the resources configured for your team")
    )]
    UnknownResource {
        /// The resource name or ID that could not be resolved.
        reference: String,
    },

    /// A shell-style command string could not be split into arguments.
    #[error("Invalid command for task '{slug}': {command}")]
    #[diagnostic(
        code(hangar::definition::invalid_command),
        help("Check for unbalanced quotes in the image entrypoint or command")
    )]
    InvalidCommand {
        /// Slug of the task.
        slug: String,
        /// The offending command string.
        command: String,
    },

    /// A legacy definition cannot be expressed in the current schema.
    #[error("Cannot upgrade definition for task '{slug}': {message}")]
    #[diagnostic(code(hangar::definition::upgrade_failed))]
    Upgrade {
        /// Slug of the task.
        slug: String,
        /// Why the upgrade failed.
        message: String,
    },

    /// Serializing a definition failed.
    #[error("Failed to serialize definition: {message}")]
    #[diagnostic(code(hangar::definition::serialize_failed))]
    Serialize {
        /// Underlying serializer message.
        message: String,
    },

    /// The remote API returned an error.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Api(#[from] ApiError),

    /// I/O error occurred.
    #[error("I/O error during {operation} at {}: {source}", path.display())]
    #[diagnostic(
        code(hangar::definition::io_error),
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
    /// Creates an invalid-definition error from a list of messages.
    #[must_use]
    pub fn invalid(messages: Vec<String>) -> Self {
        Self::InvalidDefinition { messages }
    }

    /// Creates a serialization error.
    pub fn serialize(err: impl std::fmt::Display) -> Self {
        Self::Serialize {
            message: err.to_string(),
        }
    }

    /// Creates an I/O error with path context.
    pub fn io(source: std::io::Error, path: impl Into<PathBuf>, operation: impl Into<String>) -> Self {
        Self::Io {
            source,
            path: path.into(),
            operation: operation.into(),
        }
    }

    /// Attaches a file path to an invalid-definition error.
    ///
    /// Other errors are returned unchanged.
    #[must_use]
    pub fn with_path(self, path: impl Into<PathBuf>) -> Self {
        match self {
            Self::InvalidDefinition { messages } => Self::ReadDefinition {
                path: path.into(),
                messages,
            },
            other => other,
        }
    }
}

fn render_messages(messages: &[String]) -> String {
    messages.iter().map(|m| format!("\n  - {m}")).collect()
}
