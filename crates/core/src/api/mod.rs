//! Contract for the remote task-management API.
//!
//! Discovery and deployment never talk HTTP themselves; they go through an
//! [`ApiClient`]. The only requirement on implementations beyond the method set is
//! that "this task/app does not exist" is reported as [`ApiError::TaskMissing`] or
//! [`ApiError::AppMissing`], so callers can treat it as a soft miss instead of a
//! transport failure.

mod types;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use types::*;

use async_trait::async_trait;
use miette::Diagnostic;
use thiserror::Error;

/// Errors returned by an [`ApiClient`].
#[derive(Error, Debug, Clone, Diagnostic)]
pub enum ApiError {
    /// No task with this slug exists in the requested environment.
    #[error("task with slug {slug:?} does not exist")]
    #[diagnostic(
        code(hangar::api::task_missing),
        help("Follow the URL below to create the task:\n{app_url}/tasks/new")
    )]
    TaskMissing {
        /// Base URL of the web app.
        app_url: String,
        /// The missing slug.
        slug: String,
    },

    /// No app with this slug exists in the requested environment.
    #[error("app with slug {slug:?} does not exist")]
    #[diagnostic(
        code(hangar::api::app_missing),
        help("Follow the URL below to create the app:\n{app_url}/apps/new")
    )]
    AppMissing {
        /// Base URL of the web app.
        app_url: String,
        /// The missing slug.
        slug: String,
    },

    /// The API answered with an unexpected status.
    #[error("API request failed with status {status}: {message}")]
    #[diagnostic(code(hangar::api::status))]
    Status {
        /// HTTP status code.
        status: u16,
        /// Error message from the response body.
        message: String,
    },

    /// The request never got an answer.
    #[error("API request failed: {message}")]
    #[diagnostic(
        code(hangar::api::transport),
        help("Check your network connection and API host configuration")
    )]
    Transport {
        /// Description of the failure.
        message: String,
    },
}

impl ApiError {
    /// Whether the error means the requested entity does not exist.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::TaskMissing { .. } | Self::AppMissing { .. })
    }
}

/// Operations of the remote API consumed by discovery and deployment.
#[async_trait]
pub trait ApiClient: Send + Sync {
    /// Fetches a task by slug, optionally scoped to an environment.
    async fn get_task(&self, slug: &str, env_slug: Option<&str>) -> Result<Task, ApiError>;

    /// Fetches an app by slug, optionally scoped to an environment.
    async fn get_app(&self, slug: &str, env_slug: Option<&str>) -> Result<App, ApiError>;

    /// Lists every resource visible to the caller.
    async fn list_resources(&self) -> Result<Vec<Resource>, ApiError>;

    /// Updates an existing task.
    async fn update_task(&self, request: &UpdateTaskRequest) -> Result<Task, ApiError>;

    /// Creates a new task.
    async fn create_task(&self, request: &CreateTaskRequest) -> Result<Task, ApiError>;

    /// Web URL of a task, used in linked comments and log output.
    fn task_url(&self, slug: &str) -> String;
}
