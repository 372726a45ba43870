//! Steps shared by the task discoverers: remote identity and path normalization.

use crate::defn::MissingTaskHandler;
use crate::error::{Error, Result};
use hangar_core::api::Task;
use hangar_core::{ApiClient, Definition, TaskKind, paths};
use hangar_runtime::RuntimeRegistry;
use std::path::{Path, PathBuf};

/// Where a task's entrypoint sits relative to its build root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PathMetadata {
    pub abs_file: PathBuf,
    pub root: PathBuf,
    pub workdir: PathBuf,
    /// `abs_file` relative to `root`, `/`-separated.
    pub entrypoint: String,
}

impl PathMetadata {
    /// Resolves root and workdir through the runtime that runs `file` as `kind`.
    pub fn resolve(registry: &RuntimeRegistry, file: &Path, kind: TaskKind) -> Result<Self> {
        let runtime = registry.lookup(file, kind).map_err(|source| Error::NoRuntime {
            path: file.to_path_buf(),
            source,
        })?;
        let root = runtime.root(file)?;
        let workdir = runtime.workdir(file)?;
        let entrypoint = paths::to_slash(file.strip_prefix(&root).unwrap_or(file));
        Ok(Self {
            abs_file: file.to_path_buf(),
            root,
            workdir,
            entrypoint,
        })
    }

    /// Records the root-relative entrypoint, the workdir and the absolute entrypoint.
    pub fn apply(&self, def: &mut Definition) -> Result<()> {
        def.set_build_config("entrypoint", self.entrypoint.clone());
        def.set_workdir(&self.root, &self.workdir);
        def.set_absolute_entrypoint(&self.abs_file)?;
        Ok(())
    }
}

/// Whether `path` exists. Errors other than "not found" are returned.
pub(crate) async fn exists(path: &Path) -> Result<bool> {
    tokio::fs::try_exists(path)
        .await
        .map_err(|e| Error::io(e, path, "check existence"))
}

/// Fetches a task, mapping "does not exist" to `None`.
pub(crate) async fn find_task(
    client: &dyn ApiClient,
    env_slug: Option<&str>,
    slug: &str,
) -> Result<Option<Task>> {
    match client.get_task(slug, env_slug).await {
        Ok(task) => Ok(Some(task)),
        Err(err) if err.is_not_found() => Ok(None),
        Err(source) => Err(Error::api("task", slug, source)),
    }
}

/// The remote task a definition deploys to, or `None` if it should be skipped.
///
/// Missing tasks go through `handler`, when there is one; archived tasks are skipped.
pub(crate) async fn task_for_definition(
    client: &dyn ApiClient,
    env_slug: Option<&str>,
    def: &Definition,
    handler: Option<&dyn MissingTaskHandler>,
) -> Result<Option<Task>> {
    let task = match find_task(client, env_slug, &def.slug).await? {
        Some(task) => task,
        None => {
            let created = match handler {
                Some(handler) => handler.handle_missing(client, env_slug, def).await?,
                None => None,
            };
            let Some(task) = created else {
                tracing::warn!(slug = %def.slug, "Task does not exist, skipping deployment");
                return Ok(None);
            };
            task
        }
    };
    Ok(unless_archived(task))
}

/// Drops archived tasks with a warning.
pub(crate) fn unless_archived(task: Task) -> Option<Task> {
    if task.is_archived {
        tracing::warn!(slug = %task.slug, "Task is archived, skipping deployment");
        None
    } else {
        Some(task)
    }
}

pub(crate) fn interpolation_mode(task: &Task) -> Option<String> {
    Some(task.interpolation_mode.clone()).filter(|mode| !mode.is_empty())
}
