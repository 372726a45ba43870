use crate::build::{BuildCreator, BuildRequest};
use crate::error::{Error, Result};
use futures::future::join_all;
use hangar_core::{ApiClient, paths};
use hangar_discover::TaskConfig;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Outcome of a deploy, slugs sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeploySummary {
    /// Tasks that were updated.
    pub deployed: Vec<String>,
    /// Tasks that failed to build or update.
    pub failed: Vec<String>,
}

/// Builds and updates discovered tasks.
pub struct Deployer {
    client: Arc<dyn ApiClient>,
    builder: Arc<dyn BuildCreator>,
    changed_files: Vec<PathBuf>,
}

impl Deployer {
    /// Creates a deployer that deploys every task it is given.
    #[must_use]
    pub fn new(client: Arc<dyn ApiClient>, builder: Arc<dyn BuildCreator>) -> Self {
        Self {
            client,
            builder,
            changed_files: Vec::new(),
        }
    }

    /// Only deploys tasks whose root contains one of `files`.
    #[must_use]
    pub fn with_changed_files(mut self, files: Vec<PathBuf>) -> Self {
        self.changed_files = files;
        self
    }

    /// Deploys every task concurrently.
    ///
    /// Kinds that need an image are built first; then the remote task is
    /// updated from its definition. A failing task does not stop the others.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeployFailed`] if any task failed, or an error if a
    /// changed-file path cannot be made absolute.
    pub async fn deploy_tasks(&self, configs: &[TaskConfig]) -> Result<DeploySummary> {
        let configs = self.affected(configs)?;
        if configs.is_empty() {
            tracing::info!("No tasks to deploy");
            return Ok(DeploySummary::default());
        }

        for config in &configs {
            tracing::info!(
                slug = %config.slug(),
                kind = %config.def.task_kind(),
                root = %config.task_root.display(),
                url = %self.client.task_url(config.slug()),
                "Deploying task"
            );
        }

        let results = join_all(configs.iter().map(|config| self.deploy_task(config))).await;

        let mut summary = DeploySummary::default();
        for (config, result) in configs.iter().zip(results) {
            let slug = config.slug().to_string();
            match result {
                Ok(()) => {
                    tracing::info!(slug = %slug, url = %self.client.task_url(&slug), "Deployed task");
                    summary.deployed.push(slug);
                }
                Err(err) => {
                    tracing::error!(slug = %slug, error = %err, "Failed to deploy task");
                    summary.failed.push(slug);
                }
            }
        }
        summary.deployed.sort();
        summary.failed.sort();

        if summary.failed.is_empty() {
            Ok(summary)
        } else {
            Err(Error::DeployFailed {
                failed: summary.failed,
                deployed: summary.deployed,
            })
        }
    }

    fn affected<'a>(&self, configs: &'a [TaskConfig]) -> Result<Vec<&'a TaskConfig>> {
        if self.changed_files.is_empty() {
            return Ok(configs.iter().collect());
        }
        let changed_dirs = self
            .changed_files
            .iter()
            .map(|file| {
                let file = paths::absolute(file)?;
                Ok(file.parent().map_or_else(|| file.clone(), Path::to_path_buf))
            })
            .collect::<Result<Vec<_>>>()?;
        let affected: Vec<&TaskConfig> = configs
            .iter()
            .filter(|config| contains_any(&config.task_root, &changed_dirs))
            .collect();
        if affected.len() != configs.len() {
            tracing::info!(
                total = configs.len(),
                affected = affected.len(),
                "Filtered tasks by changed files"
            );
        }
        Ok(affected)
    }

    async fn deploy_task(&self, config: &TaskConfig) -> Result<()> {
        let def = &config.def;
        let mut build_id = None;
        let mut image = None;
        if def.task_kind().needs_building() {
            let output = self
                .builder
                .create_build(BuildRequest {
                    root: config.task_root.clone(),
                    task_id: config.task_id.clone(),
                    def: def.clone(),
                    env: def.env(),
                    shim: true,
                })
                .await?;
            tracing::debug!(slug = %def.slug, build_id = %output.build_id, "Built task");
            build_id = Some(output.build_id);
            image = Some(output.image);
        }

        let mut request = def.update_task_request(self.client.as_ref(), image.as_deref()).await?;
        request.build_id = build_id;
        request.interpolation_mode.clone_from(&config.interpolation_mode);
        self.client
            .update_task(&request)
            .await
            .map_err(|source| Error::Update {
                slug: def.slug.clone(),
                source,
            })?;
        Ok(())
    }
}

/// Whether `root` contains any of `dirs`.
fn contains_any(root: &Path, dirs: &[PathBuf]) -> bool {
    dirs.iter().any(|dir| dir.starts_with(root))
}
