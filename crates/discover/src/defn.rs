//! Tasks described by definition files.

use crate::error::{Error, Result};
use crate::resolve::{self, PathMetadata};
use crate::{ConfigSource, TaskConfig, TaskDiscoverer};
use async_trait::async_trait;
use hangar_core::api::Task;
use hangar_core::definitions::{TASK_DEF_SUFFIXES, is_task_def};
use hangar_core::{ApiClient, Definition, paths};
use hangar_runtime::RuntimeRegistry;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Decides what happens when a definition's task does not exist remotely.
#[async_trait]
pub trait MissingTaskHandler: Send + Sync {
    /// Returns the task to deploy to, or `None` to skip the definition.
    ///
    /// # Errors
    ///
    /// Errors abort discovery.
    async fn handle_missing(
        &self,
        client: &dyn ApiClient,
        env_slug: Option<&str>,
        def: &Definition,
    ) -> Result<Option<Task>>;
}

/// Creates the missing task from its definition.
///
/// Creations are serialized, and the task is looked up again before creating
/// it, so two definitions with the same slug create it once.
#[derive(Debug, Default)]
pub struct CreateMissingTask {
    creating: Mutex<()>,
}

impl CreateMissingTask {
    /// Creates the handler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MissingTaskHandler for CreateMissingTask {
    async fn handle_missing(
        &self,
        client: &dyn ApiClient,
        env_slug: Option<&str>,
        def: &Definition,
    ) -> Result<Option<Task>> {
        let _guard = self.creating.lock().await;
        if let Some(task) = resolve::find_task(client, env_slug, &def.slug).await? {
            tracing::debug!(slug = %def.slug, "Task was created concurrently");
            return Ok(Some(task));
        }

        tracing::info!(slug = %def.slug, "Creating task");
        let request = def.create_task_request(client).await?;
        client
            .create_task(&request)
            .await
            .map_err(|source| Error::api("task", &def.slug, source))?;
        resolve::find_task(client, env_slug, &def.slug).await
    }
}

/// Discovers tasks from `*.task.{yaml,yml,json}` files.
///
/// A script is also recognized when a definition named after it sits in the same
/// directory (`main.py` and `main.task.yaml`) and points at it.
pub struct DefnDiscoverer {
    client: Arc<dyn ApiClient>,
    registry: Arc<RuntimeRegistry>,
    env_slug: Option<String>,
    missing_task_handler: Option<Arc<dyn MissingTaskHandler>>,
}

impl DefnDiscoverer {
    /// Creates a discoverer that skips tasks missing remotely.
    #[must_use]
    pub fn new(client: Arc<dyn ApiClient>, registry: Arc<RuntimeRegistry>) -> Self {
        Self {
            client,
            registry,
            env_slug: None,
            missing_task_handler: None,
        }
    }

    /// Looks tasks up in the given environment.
    #[must_use]
    pub fn with_env_slug(mut self, env_slug: Option<String>) -> Self {
        self.env_slug = env_slug;
        self
    }

    /// Handles tasks missing remotely instead of skipping them.
    #[must_use]
    pub fn with_missing_task_handler(mut self, handler: Arc<dyn MissingTaskHandler>) -> Self {
        self.missing_task_handler = Some(handler);
        self
    }

    /// The definition file for `file`, which may be the file itself.
    async fn definition_file(&self, file: &Path) -> Result<Option<PathBuf>> {
        if is_task_def(file) {
            return Ok(Some(file.to_path_buf()));
        }
        if self.registry.for_file(file).is_none() {
            return Ok(None);
        }
        let (Some(stem), Some(dir)) = (file.file_stem().and_then(|s| s.to_str()), file.parent()) else {
            return Ok(None);
        };
        for suffix in TASK_DEF_SUFFIXES {
            let candidate = dir.join(format!("{stem}{suffix}"));
            if resolve::exists(&candidate).await? {
                return Ok(Some(candidate));
            }
        }
        Ok(None)
    }

    async fn read_definition(path: &Path) -> Result<Definition> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| Error::io(e, path, "read task definition"))?;
        Ok(Definition::parse_file(path, &bytes)?)
    }
}

#[async_trait]
impl TaskDiscoverer for DefnDiscoverer {
    async fn task_configs(&self, file: &Path) -> Result<Vec<TaskConfig>> {
        let file = paths::absolute(file)?;
        let Some(defn_path) = self.definition_file(&file).await? else {
            return Ok(Vec::new());
        };
        let mut def = Self::read_definition(&defn_path).await?;

        let entrypoint = def.entrypoint_path();
        if defn_path != file && entrypoint.as_deref() != Some(file.as_path()) {
            tracing::debug!(
                path = %file.display(),
                defn = %defn_path.display(),
                "Sibling definition points elsewhere"
            );
            return Ok(Vec::new());
        }

        let (task_root, task_entrypoint) = match entrypoint {
            Some(entrypoint) => {
                if !resolve::exists(&entrypoint).await? {
                    return Err(Error::EntrypointNotFound { defn_path, entrypoint });
                }
                let meta = PathMetadata::resolve(&self.registry, &entrypoint, def.task_kind())?;
                meta.apply(&mut def)?;
                (meta.root, Some(entrypoint))
            }
            None => (
                defn_path
                    .parent()
                    .map_or_else(|| defn_path.clone(), Path::to_path_buf),
                None,
            ),
        };

        // Only the definition file itself may create a missing task.
        let handler = if defn_path == file {
            self.missing_task_handler.as_deref()
        } else {
            None
        };
        let Some(task) = resolve::task_for_definition(
            self.client.as_ref(),
            self.env_slug.as_deref(),
            &def,
            handler,
        )
        .await?
        else {
            return Ok(Vec::new());
        };

        tracing::debug!(slug = %def.slug, defn = %defn_path.display(), "Discovered task definition");
        Ok(vec![TaskConfig {
            task_id: task.id.clone(),
            task_root,
            task_entrypoint,
            interpolation_mode: resolve::interpolation_mode(&task),
            def,
            source: ConfigSource::Defn,
        }])
    }

    fn config_source(&self) -> ConfigSource {
        ConfigSource::Defn
    }
}
