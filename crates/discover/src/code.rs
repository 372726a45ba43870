//! Tasks declared in code.

use crate::config::{self, DiscoverConfig};
use crate::defn::MissingTaskHandler;
use crate::error::Result;
use crate::parser::TaskParser;
use crate::resolve::{self, PathMetadata};
use crate::{ConfigSource, TaskConfig, TaskDiscoverer};
use async_trait::async_trait;
use hangar_core::{ApiClient, TaskKind, paths};
use hangar_runtime::RuntimeRegistry;
use std::path::Path;
use std::sync::Arc;

/// Discovers tasks declared in `*.task.ts`-style files.
///
/// A single file may declare several tasks; each becomes a Node task whose
/// build config names the exported function to run (`entrypointFunc`).
pub struct CodeTaskDiscoverer {
    client: Arc<dyn ApiClient>,
    registry: Arc<RuntimeRegistry>,
    parser: Arc<dyn TaskParser>,
    suffixes: Vec<String>,
    env_slug: Option<String>,
    missing_task_handler: Option<Arc<dyn MissingTaskHandler>>,
}

impl CodeTaskDiscoverer {
    /// Creates a discoverer using the default file suffixes.
    #[must_use]
    pub fn new(
        client: Arc<dyn ApiClient>,
        registry: Arc<RuntimeRegistry>,
        parser: Arc<dyn TaskParser>,
    ) -> Self {
        Self {
            client,
            registry,
            parser,
            suffixes: DiscoverConfig::default().code_task_suffixes,
            env_slug: None,
            missing_task_handler: None,
        }
    }

    /// Only parses files ending with one of `suffixes`.
    #[must_use]
    pub fn with_suffixes(mut self, suffixes: Vec<String>) -> Self {
        self.suffixes = suffixes;
        self
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
}

#[async_trait]
impl TaskDiscoverer for CodeTaskDiscoverer {
    async fn task_configs(&self, file: &Path) -> Result<Vec<TaskConfig>> {
        if !config::has_suffix(file, &self.suffixes) {
            return Ok(Vec::new());
        }
        let file = paths::absolute(file)?;
        let parsed = self.parser.parse(&file).await?;
        if parsed.is_empty() {
            return Ok(Vec::new());
        }
        let meta = PathMetadata::resolve(&self.registry, &file, TaskKind::Node)?;

        let mut configs = Vec::with_capacity(parsed.len());
        for declared in &parsed {
            let mut def = declared.to_definition(&file, &meta.entrypoint)?;
            meta.apply(&mut def)?;
            def.set_build_config("entrypointFunc", declared.entrypoint_func.clone());

            let Some(task) = resolve::task_for_definition(
                self.client.as_ref(),
                self.env_slug.as_deref(),
                &def,
                self.missing_task_handler.as_deref(),
            )
            .await?
            else {
                continue;
            };

            tracing::debug!(
                slug = %def.slug,
                path = %file.display(),
                function = %declared.entrypoint_func,
                "Discovered task declared in code"
            );
            configs.push(TaskConfig {
                task_id: task.id.clone(),
                task_root: meta.root.clone(),
                task_entrypoint: Some(meta.abs_file.clone()),
                interpolation_mode: resolve::interpolation_mode(&task),
                def,
                source: ConfigSource::Code,
            });
        }
        Ok(configs)
    }

    fn config_source(&self) -> ConfigSource {
        ConfigSource::Code
    }
}
