//! Walks paths and runs every registered discoverer over them.

use crate::app::AppDefnDiscoverer;
use crate::code::CodeTaskDiscoverer;
use crate::config::DiscoverConfig;
use crate::defn::DefnDiscoverer;
use crate::error::{Error, Result};
use crate::parser::NodeParser;
use crate::script::ScriptDiscoverer;
use crate::{AppConfig, AppDiscoverer, TaskConfig, TaskDiscoverer};
use async_recursion::async_recursion;
use futures::future::try_join_all;
use hangar_core::ApiClient;
use hangar_runtime::RuntimeRegistry;
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// Tasks and apps found by [`Discoverer::discover`], one per slug, sorted by slug.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Discovered {
    /// Discovered tasks.
    pub tasks: Vec<TaskConfig>,
    /// Discovered apps.
    pub apps: Vec<AppConfig>,
}

/// Configs found in one subtree, tagged with the index of the discoverer that
/// produced them, in traversal order.
#[derive(Default)]
struct Candidates {
    tasks: Vec<(usize, TaskConfig)>,
    apps: Vec<(usize, AppConfig)>,
}

impl Candidates {
    fn merge(mut self, other: Self) -> Self {
        self.tasks.extend(other.tasks);
        self.apps.extend(other.apps);
        self
    }

    fn into_discovered(self) -> Discovered {
        Discovered {
            tasks: pick(self.tasks, |config| config.slug().to_string()),
            apps: pick(self.apps, |config| config.slug.clone()),
        }
    }
}

/// One item per slug: the one from the lowest discoverer index, the earliest on ties.
fn pick<T>(candidates: Vec<(usize, T)>, slug: impl Fn(&T) -> String) -> Vec<T> {
    let mut by_slug: BTreeMap<String, (usize, T)> = BTreeMap::new();
    for (index, item) in candidates {
        match by_slug.entry(slug(&item)) {
            Entry::Vacant(entry) => {
                entry.insert((index, item));
            }
            Entry::Occupied(mut entry) => {
                if index < entry.get().0 {
                    entry.insert((index, item));
                }
            }
        }
    }
    by_slug.into_values().map(|(_, item)| item).collect()
}

/// Runs `fut` unless `cancel` fires first.
async fn until_cancelled<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T>> + Send,
) -> Result<T> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(Error::Cancelled),
        result = fut => result,
    }
}

/// Discovers tasks and apps under a set of paths.
///
/// Discoverers are consulted in registration order, which is also their
/// precedence when two of them produce a config with the same slug. At most
/// [`DiscoverConfig::effective_parallelism`] files are processed at once.
pub struct Discoverer {
    task_discoverers: Vec<Arc<dyn TaskDiscoverer>>,
    app_discoverers: Vec<Arc<dyn AppDiscoverer>>,
    file_permits: Semaphore,
    config: DiscoverConfig,
}

impl Discoverer {
    /// Creates a discoverer with no task or app discoverers registered.
    #[must_use]
    pub fn new(config: DiscoverConfig) -> Self {
        Self {
            task_discoverers: Vec::new(),
            app_discoverers: Vec::new(),
            file_permits: Semaphore::new(config.effective_parallelism()),
            config,
        }
    }

    /// Creates a discoverer with the built-in discoverers, in precedence order:
    /// definition files, linked scripts, tasks declared in code, then app
    /// definition files.
    #[must_use]
    pub fn from_config(
        client: Arc<dyn ApiClient>,
        registry: Arc<RuntimeRegistry>,
        config: DiscoverConfig,
    ) -> Self {
        let env_slug = config.env_slug.clone();
        let parser = Arc::new(NodeParser::new(config.parser.clone()));
        let defn = DefnDiscoverer::new(Arc::clone(&client), Arc::clone(&registry))
            .with_env_slug(env_slug.clone());
        let script = ScriptDiscoverer::new(Arc::clone(&client), Arc::clone(&registry))
            .with_env_slug(env_slug.clone());
        let code = CodeTaskDiscoverer::new(Arc::clone(&client), registry, parser)
            .with_suffixes(config.code_task_suffixes.clone())
            .with_env_slug(env_slug.clone());
        let app = AppDefnDiscoverer::new(client).with_env_slug(env_slug);

        Self::new(config)
            .with_task_discoverer(Arc::new(defn))
            .with_task_discoverer(Arc::new(script))
            .with_task_discoverer(Arc::new(code))
            .with_app_discoverer(Arc::new(app))
    }

    /// Registers a task discoverer after those already registered.
    #[must_use]
    pub fn with_task_discoverer(mut self, discoverer: Arc<dyn TaskDiscoverer>) -> Self {
        self.task_discoverers.push(discoverer);
        self
    }

    /// Registers an app discoverer after those already registered.
    #[must_use]
    pub fn with_app_discoverer(mut self, discoverer: Arc<dyn AppDiscoverer>) -> Self {
        self.app_discoverers.push(discoverer);
        self
    }

    /// The configuration this discoverer walks with.
    #[must_use]
    pub const fn config(&self) -> &DiscoverConfig {
        &self.config
    }

    /// Discovers every task and app under `paths`.
    ///
    /// Directories are walked recursively, skipping ignored directory names;
    /// sibling entries are visited concurrently. Only one config is kept per
    /// slug (see [`Discoverer`]) and the results are sorted by slug.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by a discoverer or while reading the
    /// tree, and [`Error::Cancelled`] if `cancel` fires. No partial results are
    /// returned.
    pub async fn discover(&self, cancel: &CancellationToken, paths: &[PathBuf]) -> Result<Discovered> {
        let visits = paths.iter().map(|path| self.visit(cancel, path.clone()));
        let found = try_join_all(visits)
            .await?
            .into_iter()
            .fold(Candidates::default(), Candidates::merge);
        let discovered = found.into_discovered();
        tracing::debug!(
            tasks = discovered.tasks.len(),
            apps = discovered.apps.len(),
            "Discovery finished"
        );
        Ok(discovered)
    }

    #[async_recursion]
    async fn visit(&self, cancel: &CancellationToken, path: PathBuf) -> Result<Candidates> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|e| Error::io(e, &path, "stat"))?;
        if !metadata.is_dir() {
            return self.visit_file(cancel, &path).await;
        }

        if let Some(name) = path.file_name().and_then(|name| name.to_str())
            && self.config.is_ignored(name)
        {
            tracing::debug!(path = %path.display(), "Skipping ignored directory");
            return Ok(Candidates::default());
        }

        let mut children = Vec::new();
        let mut entries = tokio::fs::read_dir(&path)
            .await
            .map_err(|e| Error::io(e, &path, "read directory"))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Error::io(e, &path, "read directory"))?
        {
            children.push(entry.path());
        }
        children.sort();

        tracing::debug!(path = %path.display(), entries = children.len(), "Walking directory");
        let found = try_join_all(children.into_iter().map(|child| self.visit(cancel, child))).await?;
        Ok(found.into_iter().fold(Candidates::default(), Candidates::merge))
    }

    async fn visit_file(&self, cancel: &CancellationToken, path: &Path) -> Result<Candidates> {
        let _permit = until_cancelled(cancel, async {
            self.file_permits.acquire().await.map_err(|_| Error::Cancelled)
        })
        .await?;
        let mut found = Candidates::default();
        for (index, discoverer) in self.task_discoverers.iter().enumerate() {
            let configs = until_cancelled(cancel, discoverer.task_configs(path)).await?;
            found.tasks.extend(configs.into_iter().map(|config| (index, config)));
        }
        for (index, discoverer) in self.app_discoverers.iter().enumerate() {
            if let Some(config) = until_cancelled(cancel, discoverer.app_config(path)).await? {
                found.apps.push((index, config));
            }
        }
        Ok(found)
    }
}
