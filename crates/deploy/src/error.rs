//! Error types for deployment.

use hangar_core::ApiError;
use miette::Diagnostic;
use thiserror::Error;

/// Result type for deploy operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while deploying tasks.
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// A definition could not be turned into an update request.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Core(#[from] hangar_core::Error),

    /// Building a task's image failed.
    #[error("Failed to build task '{slug}': {message}")]
    #[diagnostic(
        code(hangar::deploy::build_failed),
        help("Check the build logs for the task")
    )]
    Build {
        /// Slug of the task.
        slug: String,
        /// What went wrong.
        message: String,
    },

    /// Updating the remote task failed.
    #[error("Failed to update task '{slug}': {source}")]
    #[diagnostic(code(hangar::deploy::update_failed))]
    Update {
        /// Slug of the task.
        slug: String,
        /// The API error.
        #[source]
        source: ApiError,
    },

    /// At least one task failed to deploy.
    #[error("Failed to deploy {} task(s): {}", failed.len(), failed.join(", "))]
    #[diagnostic(
        code(hangar::deploy::failed),
        help("Each failure is logged with its cause; the other tasks were deployed")
    )]
    DeployFailed {
        /// Slugs of the failed tasks, sorted.
        failed: Vec<String>,
        /// Slugs of the tasks that were deployed, sorted.
        deployed: Vec<String>,
    },
}

impl Error {
    /// Creates a build error.
    pub fn build(slug: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Build {
            slug: slug.into(),
            message: message.into(),
        }
    }
}
