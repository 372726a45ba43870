//! In-memory [`ApiClient`] for tests.

use super::{
    ApiClient, ApiError, App, CreateTaskRequest, Resource, Task, UpdateTaskRequest,
};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

const MOCK_APP_URL: &str = "https://app.hangar.test";

/// An [`ApiClient`] backed by in-memory maps.
///
/// Created tasks are added to the task map so that a subsequent `get_task`
/// returns them. Every update and create request is recorded.
#[derive(Debug, Default)]
pub struct MockClient {
    tasks: Mutex<BTreeMap<String, Task>>,
    apps: BTreeMap<String, App>,
    resources: Vec<Resource>,
    failing_slugs: BTreeMap<String, String>,
    updates: Mutex<Vec<UpdateTaskRequest>>,
    creates: Mutex<Vec<CreateTaskRequest>>,
}

impl MockClient {
    /// Creates an empty client.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an existing task.
    #[must_use]
    pub fn with_task(self, task: Task) -> Self {
        lock(&self.tasks).insert(task.slug.clone(), task);
        self
    }

    /// Registers an existing app.
    #[must_use]
    pub fn with_app(mut self, app: App) -> Self {
        self.apps.insert(app.slug.clone(), app);
        self
    }

    /// Registers a resource.
    #[must_use]
    pub fn with_resource(mut self, resource: Resource) -> Self {
        self.resources.push(resource);
        self
    }

    /// Makes every call involving `slug` fail with a transport error.
    #[must_use]
    pub fn with_failure(mut self, slug: impl Into<String>, message: impl Into<String>) -> Self {
        self.failing_slugs.insert(slug.into(), message.into());
        self
    }

    /// Update requests received so far.
    #[must_use]
    pub fn updates(&self) -> Vec<UpdateTaskRequest> {
        lock(&self.updates).clone()
    }

    /// Create requests received so far.
    #[must_use]
    pub fn creates(&self) -> Vec<CreateTaskRequest> {
        lock(&self.creates).clone()
    }

    fn check_failure(&self, slug: &str) -> Result<(), ApiError> {
        match self.failing_slugs.get(slug) {
            Some(message) => Err(ApiError::Transport {
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl ApiClient for MockClient {
    async fn get_task(&self, slug: &str, _env_slug: Option<&str>) -> Result<Task, ApiError> {
        self.check_failure(slug)?;
        lock(&self.tasks)
            .get(slug)
            .cloned()
            .ok_or_else(|| ApiError::TaskMissing {
                app_url: MOCK_APP_URL.to_string(),
                slug: slug.to_string(),
            })
    }

    async fn get_app(&self, slug: &str, _env_slug: Option<&str>) -> Result<App, ApiError> {
        self.check_failure(slug)?;
        self.apps
            .get(slug)
            .cloned()
            .ok_or_else(|| ApiError::AppMissing {
                app_url: MOCK_APP_URL.to_string(),
                slug: slug.to_string(),
            })
    }

    async fn list_resources(&self) -> Result<Vec<Resource>, ApiError> {
        Ok(self.resources.clone())
    }

    async fn update_task(&self, request: &UpdateTaskRequest) -> Result<Task, ApiError> {
        self.check_failure(&request.slug)?;
        let existing = self.get_task(&request.slug, None).await?;
        lock(&self.updates).push(request.clone());
        Ok(Task {
            image: request.image.clone(),
            kind: request.kind,
            kind_options: request.kind_options.clone(),
            ..existing
        })
    }

    async fn create_task(&self, request: &CreateTaskRequest) -> Result<Task, ApiError> {
        self.check_failure(&request.slug)?;
        lock(&self.creates).push(request.clone());
        let mut tasks = lock(&self.tasks);
        let task = Task {
            id: format!("tsk_{}", request.slug),
            name: request.name.clone(),
            slug: request.slug.clone(),
            description: request.description.clone(),
            kind: request.kind,
            kind_options: request.kind_options.clone(),
            ..Task::default()
        };
        tasks.insert(task.slug.clone(), task.clone());
        Ok(task)
    }

    fn task_url(&self, slug: &str) -> String {
        format!("{MOCK_APP_URL}/t/{slug}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TaskKind;

    #[tokio::test]
    async fn test_missing_task_is_not_found() {
        let client = MockClient::new();
        let err = client.get_task("nope", None).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_created_task_is_visible() {
        let client = MockClient::new();
        let req = CreateTaskRequest {
            slug: "fresh".to_string(),
            name: "Fresh".to_string(),
            description: String::new(),
            image: None,
            command: vec![],
            arguments: vec![],
            parameters: vec![],
            constraints: super::super::RunConstraints::default(),
            env: super::super::TaskEnv::new(),
            resources: super::super::Resources::new(),
            kind: TaskKind::Python,
            kind_options: crate::KindOptions::new(),
            timeout: 0,
            execute_rules: super::super::ExecuteRules::default(),
            runtime: String::new(),
        };
        client.create_task(&req).await.unwrap();

        let task = client.get_task("fresh", None).await.unwrap();
        assert_eq!(task.id, "tsk_fresh");
        assert_eq!(task.kind, TaskKind::Python);
        assert_eq!(client.creates().len(), 1);
    }

    #[tokio::test]
    async fn test_failure_is_transport_error() {
        let client = MockClient::new().with_failure("flaky", "connection reset");
        let err = client.get_task("flaky", None).await.unwrap_err();
        assert!(!err.is_not_found());
    }
}
