//! Scripts linked to a remote task by a comment line.

use crate::error::{Error, Result};
use crate::resolve::{self, PathMetadata};
use crate::{ConfigSource, TaskConfig, TaskDiscoverer};
use async_trait::async_trait;
use hangar_core::{ApiClient, Definition, paths};
use hangar_runtime::RuntimeRegistry;
use std::path::Path;
use std::sync::Arc;

/// Discovers scripts carrying a `Linked to <url>/t/<slug>` comment.
///
/// The remote task is the source of truth: its definition is rebuilt from the
/// API record and only the paths come from the local file.
pub struct ScriptDiscoverer {
    client: Arc<dyn ApiClient>,
    registry: Arc<RuntimeRegistry>,
    env_slug: Option<String>,
}

impl ScriptDiscoverer {
    /// Creates a discoverer resolving tasks through `client`.
    #[must_use]
    pub fn new(client: Arc<dyn ApiClient>, registry: Arc<RuntimeRegistry>) -> Self {
        Self {
            client,
            registry,
            env_slug: None,
        }
    }

    /// Looks tasks up in the given environment.
    #[must_use]
    pub fn with_env_slug(mut self, env_slug: Option<String>) -> Self {
        self.env_slug = env_slug;
        self
    }
}

#[async_trait]
impl TaskDiscoverer for ScriptDiscoverer {
    async fn task_configs(&self, file: &Path) -> Result<Vec<TaskConfig>> {
        let Some(runtime) = self.registry.for_file(file) else {
            return Ok(Vec::new());
        };
        let bytes = tokio::fs::read(file)
            .await
            .map_err(|e| Error::io(e, file, "read script"))?;
        let Some(slug) = runtime.slug(&String::from_utf8_lossy(&bytes)) else {
            return Ok(Vec::new());
        };

        let client = self.client.as_ref();
        let Some(task) = resolve::find_task(client, self.env_slug.as_deref(), &slug).await? else {
            tracing::warn!(
                slug = %slug,
                path = %file.display(),
                "Task linked by script does not exist, skipping deployment"
            );
            return Ok(Vec::new());
        };
        let Some(task) = resolve::unless_archived(task) else {
            return Ok(Vec::new());
        };

        let file = paths::absolute(file)?;
        let meta = PathMetadata::resolve(&self.registry, &file, task.kind)?;
        let mut def = Definition::from_task(client, &task).await?;
        meta.apply(&mut def)?;

        tracing::debug!(slug = %slug, path = %file.display(), "Discovered linked script");
        Ok(vec![TaskConfig {
            task_id: task.id.clone(),
            task_root: meta.root,
            task_entrypoint: Some(meta.abs_file),
            interpolation_mode: resolve::interpolation_mode(&task),
            def,
            source: ConfigSource::Script,
        }])
    }

    fn config_source(&self) -> ConfigSource {
        ConfigSource::Script
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hangar_core::TaskKind;
    use hangar_core::api::Task;
    use hangar_core::api::mock::MockClient;
    use std::fs;

    const LINKED_JS: &str =
        "// Linked to https://app.hangar.dev/t/my_task [do not edit this line]\n\nexport default async function () {}\n";

    fn node_task(slug: &str) -> Task {
        let mut kind_options = hangar_core::KindOptions::new();
        kind_options.insert("entrypoint".to_string(), "ignored.js".into());
        kind_options.insert("nodeVersion".to_string(), "14".into());
        Task {
            id: format!("tsk_{slug}"),
            name: "My task".to_string(),
            slug: slug.to_string(),
            kind: TaskKind::Node,
            kind_options,
            interpolation_mode: "handlebars".to_string(),
            ..Task::default()
        }
    }

    fn discoverer(client: MockClient) -> ScriptDiscoverer {
        ScriptDiscoverer::new(Arc::new(client), Arc::new(RuntimeRegistry::default()))
    }

    #[tokio::test]
    async fn test_linked_node_script() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("package.json"), "{}").unwrap();
        let file = tmp.path().join("single_task.js");
        fs::write(&file, LINKED_JS).unwrap();

        let configs = discoverer(MockClient::new().with_task(node_task("my_task")))
            .task_configs(&file)
            .await
            .unwrap();
        assert_eq!(configs.len(), 1);
        let config = &configs[0];
        assert_eq!(config.task_id, "tsk_my_task");
        assert_eq!(config.source, ConfigSource::Script);
        assert_eq!(config.task_root, tmp.path());
        assert_eq!(config.task_entrypoint.as_deref(), Some(file.as_path()));
        assert_eq!(config.interpolation_mode.as_deref(), Some("handlebars"));
        let build = config.def.build_config();
        assert_eq!(build["entrypoint"], "single_task.js");
        assert_eq!(build["workdir"], "");
        assert_eq!(build["nodeVersion"], "14");
    }

    #[tokio::test]
    async fn test_unlinked_and_unknown_files_decline() {
        let tmp = tempfile::tempdir().unwrap();
        let plain = tmp.path().join("plain.js");
        fs::write(&plain, "console.log(1)\n").unwrap();
        let notes = tmp.path().join("notes.txt");
        fs::write(&notes, LINKED_JS).unwrap();

        let d = discoverer(MockClient::new().with_task(node_task("my_task")));
        assert!(d.task_configs(&plain).await.unwrap().is_empty());
        assert!(d.task_configs(&notes).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_and_archived_tasks_are_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("single_task.js");
        fs::write(&file, LINKED_JS).unwrap();

        assert!(discoverer(MockClient::new()).task_configs(&file).await.unwrap().is_empty());

        let archived = Task {
            is_archived: true,
            ..node_task("my_task")
        };
        assert!(
            discoverer(MockClient::new().with_task(archived))
                .task_configs(&file)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_kind_mismatch_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("run.sh");
        fs::write(&file, "# Linked to https://app.hangar.dev/t/runner [do not edit this line]\necho hi\n").unwrap();
        let task = Task {
            id: "tsk_runner".to_string(),
            slug: "runner".to_string(),
            kind: TaskKind::Python,
            ..Task::default()
        };

        let err = discoverer(MockClient::new().with_task(task)).task_configs(&file).await.unwrap_err();
        assert!(matches!(err, Error::NoRuntime { .. }));
    }
}
