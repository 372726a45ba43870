//! End-to-end discovery over a fixture tree.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use hangar_core::api::mock::MockClient;
use hangar_core::api::{ApiError, App, CreateTaskRequest, Resource, Task, UpdateTaskRequest};
use hangar_core::{ApiClient, TaskKind};
use hangar_discover::{
    AppConfig, ConfigSource, CreateMissingTask, DefnDiscoverer, DiscoverConfig, Discovered,
    Discoverer, Error, Result, TaskConfig, TaskDiscoverer,
};
use hangar_runtime::RuntimeRegistry;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

const DEFN: &str = "slug: my_task\nname: sunt in tempor eu\ndescription: ut dolor sit officia ea\nnode:\n  entrypoint: ./single_task.js\n  nodeVersion: \"14\"\n";

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn linked(slug: &str) -> String {
    format!("// Linked to https://app.hangar.dev/t/{slug} [do not edit this line]\n\nexport default async function () {{}}\n")
}

fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn fixtures() -> TempDir {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();
    write(root, "package.json", r#"{"private": true, "workspaces": ["subdir", "nonlinkedscript"]}"#);
    write(root, "single_task.js", &linked("my_task"));
    write(root, "single_task2.js", &linked("my_task2"));
    write(root, "defn.task.yaml", DEFN);
    write(
        root,
        "defn_incorrect_entrypoint.task.yaml",
        "slug: incorrect_entrypoint\nname: Incorrect\nnode:\n  entrypoint: ./does_not_exist.js\n  nodeVersion: \"14\"\n",
    );
    write(root, "subdir/package.json", "{}");
    write(root, "subdir/single_task.js", &linked("my_task"));
    write(root, "subdir/defn.task.yaml", DEFN);
    write(root, "nonlinkedscript/package.json", "{}");
    write(root, "nonlinkedscript/single_task.js", "export default async function () {}\n");
    write(root, "nonlinkedscript/single_task.task.yaml", DEFN);
    write(root, "nestedScripts/package.json", "{}");
    write(root, "nestedScripts/single_task.js", &linked("my_task"));
    write(root, "nestedScripts/single_task2.js", &linked("my_task2"));
    write(root, "app/defn.app.yaml", "slug: my_app\nname: My App\nentrypoint: foo.js\n");
    write(root, "app/foo.js", "export default function App() {}\n");
    tmp
}

fn node_task(id: &str, slug: &str, mode: &str) -> Task {
    Task {
        id: id.to_string(),
        slug: slug.to_string(),
        kind: TaskKind::Node,
        interpolation_mode: mode.to_string(),
        ..Task::default()
    }
}

fn client() -> MockClient {
    MockClient::new()
        .with_task(node_task("tsk123", "my_task", "handlebars"))
        .with_task(node_task("tsk456", "my_task2", "jst"))
        .with_task(node_task("tsk789", "incorrect_entrypoint", "jst"))
        .with_app(App {
            id: "app123".to_string(),
            slug: "my_app".to_string(),
            name: "My App".to_string(),
            is_archived: false,
        })
}

fn discoverer(client: MockClient) -> Discoverer {
    Discoverer::from_config(
        Arc::new(client),
        Arc::new(RuntimeRegistry::default()),
        DiscoverConfig::default(),
    )
}

async fn discover(root: &Path, rels: &[&str]) -> Result<Discovered> {
    init_tracing();
    let paths: Vec<PathBuf> = rels
        .iter()
        .map(|rel| if *rel == "." { root.to_path_buf() } else { root.join(rel) })
        .collect();
    discoverer(client()).discover(&CancellationToken::new(), &paths).await
}

fn assert_build(config: &TaskConfig, workdir: &str, entrypoint: &str) {
    let build = config.def.build_config();
    assert_eq!(build["workdir"], workdir, "{}", config.slug());
    assert_eq!(build["entrypoint"], entrypoint, "{}", config.slug());
}

#[tokio::test]
async fn test_single_script() {
    let tmp = fixtures();
    let root = tmp.path();
    let found = discover(root, &["single_task.js"]).await.unwrap();

    assert_eq!(found.tasks.len(), 1);
    let config = &found.tasks[0];
    assert_eq!(config.task_id, "tsk123");
    assert_eq!(config.slug(), "my_task");
    assert_eq!(config.source, ConfigSource::Script);
    assert_eq!(config.task_root, root);
    assert_eq!(config.task_entrypoint.as_deref(), Some(root.join("single_task.js").as_path()));
    assert_eq!(config.interpolation_mode.as_deref(), Some("handlebars"));
    assert_build(config, "", "single_task.js");
    assert!(found.apps.is_empty());
}

#[tokio::test]
async fn test_multiple_scripts_are_sorted() {
    let tmp = fixtures();
    let found = discover(tmp.path(), &["single_task2.js", "single_task.js"]).await.unwrap();
    let slugs: Vec<&str> = found.tasks.iter().map(TaskConfig::slug).collect();
    assert_eq!(slugs, ["my_task", "my_task2"]);
    assert_build(&found.tasks[1], "", "single_task2.js");
}

#[tokio::test]
async fn test_nested_package_is_its_own_root() {
    let tmp = fixtures();
    let found = discover(tmp.path(), &["nestedScripts"]).await.unwrap();
    assert_eq!(found.tasks.len(), 2);
    for config in &found.tasks {
        assert_eq!(config.task_root, tmp.path().join("nestedScripts"));
    }
    assert_build(&found.tasks[0], "", "single_task.js");
    assert_build(&found.tasks[1], "", "single_task2.js");
}

#[tokio::test]
async fn test_single_definition() {
    let tmp = fixtures();
    let root = tmp.path();
    let found = discover(root, &["defn.task.yaml"]).await.unwrap();

    let config = &found.tasks[0];
    assert_eq!(config.source, ConfigSource::Defn);
    assert_eq!(config.task_root, root);
    assert_eq!(config.def.name, "sunt in tempor eu");
    assert_eq!(config.def.description, "ut dolor sit officia ea");
    assert_eq!(config.def.entrypoint(), Some("./single_task.js"));
    assert_eq!(config.def.kind_options()["nodeVersion"], "14");
    assert_eq!(config.def.defn_file_path(), Some(root.join("defn.task.yaml").as_path()));
    assert_eq!(config.def.absolute_entrypoint().unwrap(), root.join("single_task.js"));
    assert_build(config, "", "single_task.js");
}

#[tokio::test]
async fn test_tasks_missing_remotely_are_skipped() {
    let tmp = fixtures();
    let paths = [tmp.path().join("single_task.js"), tmp.path().join("defn.task.yaml")];
    let found = discoverer(MockClient::new())
        .discover(&CancellationToken::new(), &paths)
        .await
        .unwrap();
    assert!(found.tasks.is_empty());
}

#[tokio::test]
async fn test_definition_wins_over_linked_script() {
    let tmp = fixtures();
    for order in [["defn.task.yaml", "single_task.js"], ["single_task.js", "defn.task.yaml"]] {
        let found = discover(tmp.path(), &order).await.unwrap();
        assert_eq!(found.tasks.len(), 1);
        assert_eq!(found.tasks[0].source, ConfigSource::Defn);
        assert_eq!(found.tasks[0].def.kind_options()["nodeVersion"], "14");
    }
}

#[tokio::test]
async fn test_workspace_package_workdir() {
    let tmp = fixtures();
    let root = tmp.path();

    let found = discover(root, &["subdir/single_task.js"]).await.unwrap();
    let config = &found.tasks[0];
    assert_eq!(config.source, ConfigSource::Script);
    assert_eq!(config.task_root, root);
    assert_build(config, "/subdir", "subdir/single_task.js");

    let found = discover(root, &["subdir/defn.task.yaml"]).await.unwrap();
    let config = &found.tasks[0];
    assert_eq!(config.source, ConfigSource::Defn);
    assert_eq!(config.task_entrypoint.as_deref(), Some(root.join("subdir/single_task.js").as_path()));
    assert_build(config, "/subdir", "subdir/single_task.js");
}

#[tokio::test]
async fn test_unlinked_script_with_sibling_definition() {
    let tmp = fixtures();
    let root = tmp.path();
    for path in ["nonlinkedscript/single_task.js", "nonlinkedscript"] {
        let found = discover(root, &[path]).await.unwrap();
        assert_eq!(found.tasks.len(), 1, "{path}");
        let config = &found.tasks[0];
        assert_eq!(config.source, ConfigSource::Defn);
        assert_eq!(config.task_root, root);
        assert_eq!(
            config.def.defn_file_path(),
            Some(root.join("nonlinkedscript/single_task.task.yaml").as_path())
        );
        assert_build(config, "/nonlinkedscript", "nonlinkedscript/single_task.js");
    }
}

#[tokio::test]
async fn test_incorrect_entrypoint_is_an_error() {
    let tmp = fixtures();
    let err = discover(tmp.path(), &["defn_incorrect_entrypoint.task.yaml"]).await.unwrap_err();
    let Error::EntrypointNotFound { defn_path, .. } = err else {
        panic!("expected EntrypointNotFound");
    };
    assert_eq!(defn_path, tmp.path().join("defn_incorrect_entrypoint.task.yaml"));

    // One bad file fails the whole walk.
    assert!(discover(tmp.path(), &["."]).await.is_err());
}

#[tokio::test]
async fn test_app_definition() {
    let tmp = fixtures();
    let found = discover(tmp.path(), &["app/defn.app.yaml"]).await.unwrap();
    assert_eq!(
        found.apps,
        vec![AppConfig {
            id: "app123".to_string(),
            slug: "my_app".to_string(),
            root: tmp.path().join("app"),
            entrypoint: tmp.path().join("app/foo.js"),
            source: ConfigSource::Defn,
        }]
    );
    assert!(found.tasks.is_empty());
}

#[tokio::test]
async fn test_discovery_is_idempotent() {
    let tmp = fixtures();
    let paths = ["subdir", "nonlinkedscript", "nestedScripts", "app", "single_task.js"];
    let first = discover(tmp.path(), &paths).await.unwrap();
    let second = discover(tmp.path(), &paths).await.unwrap();
    assert_eq!(first, second);

    let slugs: Vec<&str> = first.tasks.iter().map(TaskConfig::slug).collect();
    assert_eq!(slugs, ["my_task", "my_task2"]);
    assert_eq!(first.apps.len(), 1);
    // Definitions win; the first one walked is kept.
    assert_eq!(first.tasks[0].source, ConfigSource::Defn);
    assert_eq!(
        first.tasks[0].def.defn_file_path(),
        Some(tmp.path().join("subdir/defn.task.yaml").as_path())
    );
}

#[tokio::test]
async fn test_ignored_directories() {
    let tmp = fixtures();
    let root = tmp.path();
    write(root, "node_modules/dep/index.js", &linked("my_task2"));
    write(root, "extra/.git/hooks/post.js", &linked("my_task2"));
    fs::remove_file(root.join("defn_incorrect_entrypoint.task.yaml")).unwrap();

    let config = DiscoverConfig {
        ignored_directories: vec!["nestedScripts".to_string()],
        ..DiscoverConfig::default()
    };
    let found = Discoverer::from_config(Arc::new(client()), Arc::new(RuntimeRegistry::default()), config)
        .discover(&CancellationToken::new(), &[root.join("node_modules"), root.join("extra"), root.join("nestedScripts")])
        .await
        .unwrap();
    assert!(found.tasks.is_empty());

    let found = discover(root, &["."]).await.unwrap();
    let my_task2 = found.tasks.iter().find(|c| c.slug() == "my_task2").unwrap();
    assert_eq!(my_task2.task_entrypoint.as_deref(), Some(root.join("nestedScripts/single_task2.js").as_path()));
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let tmp = fixtures();
    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = discoverer(client())
        .discover(&cancel, &[tmp.path().join("single_task.js")])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Cancelled));
}

/// Never finishes on its own.
struct StuckDiscoverer;

#[async_trait]
impl TaskDiscoverer for StuckDiscoverer {
    async fn task_configs(&self, _file: &Path) -> Result<Vec<TaskConfig>> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(Vec::new())
    }

    fn config_source(&self) -> ConfigSource {
        ConfigSource::Code
    }
}

#[tokio::test]
async fn test_cancelled_while_running() {
    let tmp = fixtures();
    let discoverer = Discoverer::new(DiscoverConfig::default()).with_task_discoverer(Arc::new(StuckDiscoverer));
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let result = tokio::time::timeout(
        Duration::from_secs(10),
        discoverer.discover(&cancel, &[tmp.path().join("nestedScripts")]),
    )
    .await
    .expect("discovery did not stop after cancellation");
    assert!(matches!(result, Err(Error::Cancelled)));
}

/// Delays every lookup and creation, so concurrent walkers overlap.
struct SlowClient(MockClient);

#[async_trait]
impl ApiClient for SlowClient {
    async fn get_task(&self, slug: &str, env_slug: Option<&str>) -> std::result::Result<Task, ApiError> {
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.0.get_task(slug, env_slug).await
    }

    async fn get_app(&self, slug: &str, env_slug: Option<&str>) -> std::result::Result<App, ApiError> {
        self.0.get_app(slug, env_slug).await
    }

    async fn list_resources(&self) -> std::result::Result<Vec<Resource>, ApiError> {
        self.0.list_resources().await
    }

    async fn update_task(&self, request: &UpdateTaskRequest) -> std::result::Result<Task, ApiError> {
        self.0.update_task(request).await
    }

    async fn create_task(&self, request: &CreateTaskRequest) -> std::result::Result<Task, ApiError> {
        tokio::time::sleep(Duration::from_millis(100)).await;
        self.0.create_task(request).await
    }

    fn task_url(&self, slug: &str) -> String {
        self.0.task_url(slug)
    }
}

#[tokio::test]
async fn test_missing_task_is_created_once() {
    init_tracing();
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();
    write(root, "main.sh", "echo main\n");
    write(root, "main.task.yaml", "slug: fresh\nname: Fresh\nshell:\n  entrypoint: main.sh\n");
    write(root, "copy/run.sh", "echo copy\n");
    write(root, "copy/run.task.yaml", "slug: fresh\nname: Fresh\nshell:\n  entrypoint: run.sh\n");

    let client = Arc::new(SlowClient(MockClient::new()));
    let defn = DefnDiscoverer::new(client.clone(), Arc::new(RuntimeRegistry::default()))
        .with_missing_task_handler(Arc::new(CreateMissingTask::new()));
    let found = Discoverer::new(DiscoverConfig::default())
        .with_task_discoverer(Arc::new(defn))
        .discover(&CancellationToken::new(), &[root.to_path_buf()])
        .await
        .unwrap();

    assert_eq!(found.tasks.len(), 1);
    assert_eq!(found.tasks[0].task_id, "tsk_fresh");
    assert_eq!(client.0.creates().len(), 1, "task created more than once");
}

/// Records how many files it is handed at once.
#[derive(Default)]
struct CountingDiscoverer {
    active: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

#[async_trait]
impl TaskDiscoverer for CountingDiscoverer {
    async fn task_configs(&self, _file: &Path) -> Result<Vec<TaskConfig>> {
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(active, Ordering::SeqCst);
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(10)).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(Vec::new())
    }

    fn config_source(&self) -> ConfigSource {
        ConfigSource::Code
    }
}

#[tokio::test]
async fn test_file_concurrency_is_bounded() {
    let tmp = tempfile::tempdir().unwrap();
    for i in 0..40 {
        write(tmp.path(), &format!("pkg{}/job{i}.task.ts", i % 4), "export default {}\n");
    }
    let counting = Arc::new(CountingDiscoverer::default());
    let config = DiscoverConfig {
        max_parallel: 3,
        ..DiscoverConfig::default()
    };
    Discoverer::new(config)
        .with_task_discoverer(counting.clone())
        .discover(&CancellationToken::new(), &[tmp.path().to_path_buf()])
        .await
        .unwrap();

    assert_eq!(counting.calls.load(Ordering::SeqCst), 40);
    let peak = counting.peak.load(Ordering::SeqCst);
    assert!((1..=3).contains(&peak), "peak concurrency {peak}");
}
