//! The build contract.

use crate::error::Result;
use async_trait::async_trait;
use hangar_core::Definition;
use hangar_core::api::TaskEnv;
use std::path::PathBuf;

/// What to build for one task.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildRequest {
    /// Build root; everything under it is sent to the builder.
    pub root: PathBuf,
    /// ID of the remote task.
    pub task_id: String,
    /// The resolved definition, including its build config.
    pub def: Definition,
    /// Environment variables of the task.
    pub env: TaskEnv,
    /// Whether to wrap the entrypoint with the runtime shim.
    pub shim: bool,
}

/// A finished build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutput {
    /// Identifier of the build.
    pub build_id: String,
    /// Image the task runs from.
    pub image: String,
}

/// Builds task images, locally or remotely.
#[async_trait]
pub trait BuildCreator: Send + Sync {
    /// Builds the task described by `request`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Build`](crate::Error::Build) if the build fails.
    async fn create_build(&self, request: BuildRequest) -> Result<BuildOutput>;
}
