//! Conversion between definitions and remote task records.

use super::params::ParameterDefinition;
use super::task::{
    Definition, ImageDefinition, KindDefinition, NodeDefinition, PythonDefinition,
    RestDefinition, ShellDefinition, SqlDefinition, TaskRuntime,
};
use crate::api::{
    AgentLabel, ApiClient, CreateTaskRequest, ExecuteRules, Resource, Resources, RunConstraints,
    Task, UpdateTaskRequest,
};
use crate::error::{Error, Result};
use crate::kind::{KindOptions, TaskKind};
use serde_json::Value;
use std::collections::BTreeMap;

/// Resource alias the API uses for a SQL task's database.
const SQL_RESOURCE_ALIAS: &str = "db";
/// Resource alias the API uses for a REST task's endpoint.
const REST_RESOURCE_ALIAS: &str = "rest";

impl Definition {
    /// Reverse-engineers a definition from a remote task record.
    ///
    /// Resource IDs are mapped back to resource names through the client.
    ///
    /// # Errors
    ///
    /// Returns an error if a bound resource no longer exists, a parameter type has no
    /// definition equivalent, or listing resources fails.
    pub async fn from_task(client: &dyn ApiClient, task: &Task) -> Result<Self> {
        tracing::trace!(slug = %task.slug, kind = %task.kind, "Building definition from task");
        let names_by_id: BTreeMap<String, String> = if task.resources.is_empty() {
            BTreeMap::new()
        } else {
            client
                .list_resources()
                .await?
                .into_iter()
                .map(|r| (r.id, r.name))
                .collect()
        };
        let resource_name = |id: &str| {
            names_by_id
                .get(id)
                .cloned()
                .ok_or_else(|| Error::UnknownResource {
                    reference: id.to_string(),
                })
        };

        let opts = &task.kind_options;
        let kind_alias = match task.kind {
            TaskKind::Sql => Some(SQL_RESOURCE_ALIAS),
            TaskKind::Rest => Some(REST_RESOURCE_ALIAS),
            _ => None,
        };
        let kind_resource = match kind_alias.and_then(|alias| task.resources.get(alias)) {
            Some(id) => resource_name(id)?,
            None => String::new(),
        };

        let kind = match task.kind {
            TaskKind::Image => KindDefinition::Image(ImageDefinition {
                image: task.image.clone().unwrap_or_default(),
                entrypoint: join_command(&task.slug, &task.command)?,
                command: join_command(&task.slug, &task.arguments)?,
                env_vars: task.env.clone(),
            }),
            TaskKind::Node => KindDefinition::Node(NodeDefinition {
                entrypoint: str_option(opts, "entrypoint"),
                node_version: str_option(opts, "nodeVersion"),
                env_vars: task.env.clone(),
            }),
            TaskKind::Python => KindDefinition::Python(PythonDefinition {
                entrypoint: str_option(opts, "entrypoint"),
                env_vars: task.env.clone(),
            }),
            TaskKind::Shell => KindDefinition::Shell(ShellDefinition {
                entrypoint: str_option(opts, "entrypoint"),
                env_vars: task.env.clone(),
            }),
            TaskKind::Sql => KindDefinition::Sql(SqlDefinition {
                resource: kind_resource,
                entrypoint: str_option(opts, "entrypoint"),
                query_args: map_option(opts, "queryArgs"),
                transaction_mode: str_option(opts, "transactionMode"),
            }),
            TaskKind::Rest => KindDefinition::Rest(RestDefinition {
                resource: kind_resource,
                method: str_option(opts, "method"),
                path: str_option(opts, "path"),
                url_params: map_option(opts, "urlParams"),
                headers: map_option(opts, "headers")
                    .into_iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k, s.to_string())))
                    .collect(),
                body_type: str_option(opts, "bodyType"),
                body: Some(str_option(opts, "body"))
                    .filter(|body| !body.is_empty())
                    .map(Value::String),
                form_data: map_option(opts, "formData"),
            }),
        };

        let mut resources = BTreeMap::new();
        for (alias, id) in &task.resources {
            if Some(alias.as_str()) == kind_alias {
                continue;
            }
            resources.insert(alias.clone(), resource_name(id)?);
        }

        let mut def = Self::new(task.slug.clone(), task.name.clone(), kind);
        def.description.clone_from(&task.description);
        def.parameters = task
            .parameters
            .iter()
            .map(ParameterDefinition::from_api)
            .collect::<Result<_>>()?;
        def.resources = resources;
        def.constraints = task
            .constraints
            .labels
            .iter()
            .map(|label| (label.key.clone(), label.value.clone()))
            .collect();
        def.require_requests = task.execute_rules.require_requests.unwrap_or(false);
        def.allow_self_approvals = (task.execute_rules.disallow_self_approve == Some(true)).then_some(false);
        def.timeout = (task.timeout > 0).then_some(task.timeout);
        def.runtime = if task.runtime == TaskRuntime::Workflow.as_str() {
            TaskRuntime::Workflow
        } else {
            TaskRuntime::Standard
        };
        Ok(def)
    }

    /// Builds the request that updates the remote task to match this definition.
    ///
    /// `image` is the freshly built image, if the task kind needs one.
    ///
    /// # Errors
    ///
    /// Returns an error if a resource name is unknown, an image command cannot be
    /// split into arguments, or listing resources fails.
    pub async fn update_task_request(
        &self,
        client: &dyn ApiClient,
        image: Option<&str>,
    ) -> Result<UpdateTaskRequest> {
        let resources = self.resolve_resources(client).await?;

        let (image, command, arguments) = match &self.kind {
            KindDefinition::Image(d) => (
                Some(d.image.clone()),
                split_command(&self.slug, &d.entrypoint)?,
                split_command(&self.slug, &d.command)?,
            ),
            _ => (image.map(str::to_string), Vec::new(), Vec::new()),
        };

        Ok(UpdateTaskRequest {
            slug: self.slug.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            image,
            command,
            arguments,
            parameters: self.parameters.iter().map(ParameterDefinition::to_api).collect(),
            constraints: RunConstraints {
                labels: self
                    .constraints
                    .iter()
                    .map(|(key, value)| AgentLabel {
                        key: key.clone(),
                        value: value.clone(),
                    })
                    .collect(),
            },
            env: self.env(),
            resources,
            kind: self.task_kind(),
            kind_options: self.kind_options(),
            timeout: self.timeout.unwrap_or(0),
            build_id: None,
            interpolation_mode: None,
            execute_rules: ExecuteRules {
                disallow_self_approve: Some(!self.allow_self_approvals.unwrap_or(true)),
                require_requests: Some(self.require_requests),
            },
            runtime: self.runtime.as_str().to_string(),
        })
    }

    /// Builds the request that creates a remote task from this definition.
    ///
    /// # Errors
    ///
    /// Same as [`Definition::update_task_request`].
    pub async fn create_task_request(&self, client: &dyn ApiClient) -> Result<CreateTaskRequest> {
        self.update_task_request(client, None).await.map(Into::into)
    }

    /// Resource bindings by alias, with names mapped to IDs.
    async fn resolve_resources(&self, client: &dyn ApiClient) -> Result<Resources> {
        let mut wanted: Vec<(&str, &str)> = self
            .resources
            .iter()
            .map(|(alias, name)| (alias.as_str(), name.as_str()))
            .collect();
        match &self.kind {
            KindDefinition::Sql(d) if !d.resource.is_empty() => {
                wanted.push((SQL_RESOURCE_ALIAS, &d.resource));
            }
            KindDefinition::Rest(d) if !d.resource.is_empty() => {
                wanted.push((REST_RESOURCE_ALIAS, &d.resource));
            }
            _ => {}
        }
        if wanted.is_empty() {
            return Ok(Resources::new());
        }

        let available = client.list_resources().await?;
        wanted
            .into_iter()
            .map(|(alias, name)| {
                find_by_name(&available, name)
                    .map(|r| (alias.to_string(), r.id.clone()))
                    .ok_or_else(|| Error::UnknownResource {
                        reference: name.to_string(),
                    })
            })
            .collect()
    }
}

fn find_by_name<'a>(resources: &'a [Resource], name: &str) -> Option<&'a Resource> {
    resources.iter().find(|r| r.name == name)
}

fn str_option(opts: &KindOptions, key: &str) -> String {
    opts.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn map_option(opts: &KindOptions, key: &str) -> BTreeMap<String, Value> {
    match opts.get(key) {
        Some(Value::Object(map)) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        _ => BTreeMap::new(),
    }
}

fn split_command(slug: &str, command: &str) -> Result<Vec<String>> {
    if command.trim().is_empty() {
        return Ok(Vec::new());
    }
    shlex::split(command).ok_or_else(|| Error::InvalidCommand {
        slug: slug.to_string(),
        command: command.to_string(),
    })
}

pub(super) fn join_command(slug: &str, args: &[String]) -> Result<String> {
    shlex::try_join(args.iter().map(String::as_str)).map_err(|_| Error::InvalidCommand {
        slug: slug.to_string(),
        command: args.join(" "),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::MockClient;
    use crate::api::{EnvVarValue, Parameter, ParameterConstraints};
    use crate::definitions::DefFormat;
    use serde_json::json;

    fn client() -> MockClient {
        MockClient::new()
            .with_resource(Resource {
                id: "res_db".to_string(),
                name: "db".to_string(),
                kind: "postgres".to_string(),
            })
            .with_resource(Resource {
                id: "res_http".to_string(),
                name: "httpbin".to_string(),
                kind: "rest".to_string(),
            })
    }

    #[tokio::test]
    async fn test_from_task_node() {
        let task = Task {
            id: "tsk123".to_string(),
            slug: "my_task".to_string(),
            kind: TaskKind::Node,
            ..Task::default()
        };
        let def = Definition::from_task(&client(), &task).await.unwrap();
        assert_eq!(def.slug, "my_task");
        assert_eq!(def.kind, KindDefinition::Node(NodeDefinition::default()));
        assert_eq!(def.allow_self_approvals, None);
        assert_eq!(def.timeout, None);
    }

    #[tokio::test]
    async fn test_from_task_image_quotes_command() {
        let task = Task {
            slug: "img".to_string(),
            kind: TaskKind::Image,
            image: Some("ubuntu:latest".to_string()),
            command: vec!["bash".to_string()],
            arguments: vec!["-c".to_string(), "echo \"foobar\"".to_string()],
            ..Task::default()
        };
        let def = Definition::from_task(&client(), &task).await.unwrap();
        let KindDefinition::Image(image) = &def.kind else {
            panic!("expected image kind");
        };
        assert_eq!(image.image, "ubuntu:latest");
        assert_eq!(image.entrypoint, "bash");
        assert_eq!(image.command, "-c 'echo \"foobar\"'");

        let req = def.update_task_request(&client(), None).await.unwrap();
        assert_eq!(req.command, vec!["bash"]);
        assert_eq!(req.arguments, vec!["-c", "echo \"foobar\""]);
        assert_eq!(req.image.as_deref(), Some("ubuntu:latest"));
    }

    #[tokio::test]
    async fn test_from_task_maps_parameters_and_rules() {
        let task = Task {
            slug: "py".to_string(),
            name: "Py".to_string(),
            kind: TaskKind::Python,
            kind_options: KindOptions::from([("entrypoint".to_string(), json!("main.py"))]),
            parameters: vec![Parameter {
                name: "Query".to_string(),
                slug: "query".to_string(),
                kind: "string".to_string(),
                component: "editor-sql".to_string(),
                constraints: ParameterConstraints {
                    optional: true,
                    ..ParameterConstraints::default()
                },
                ..Parameter::default()
            }],
            execute_rules: ExecuteRules {
                disallow_self_approve: Some(true),
                require_requests: Some(true),
            },
            timeout: 600,
            ..Task::default()
        };
        let def = Definition::from_task(&client(), &task).await.unwrap();
        assert_eq!(def.entrypoint(), Some("main.py"));
        assert_eq!(def.parameters[0].kind, crate::definitions::ParamType::Sql);
        assert_eq!(def.parameters[0].required, Some(false));
        assert_eq!(def.allow_self_approvals, Some(false));
        assert!(def.require_requests);
        assert_eq!(def.timeout, Some(600));
    }

    #[tokio::test]
    async fn test_from_task_resolves_resource_names() {
        let task = Task {
            slug: "rest_task".to_string(),
            kind: TaskKind::Rest,
            resources: Resources::from([("rest".to_string(), "res_http".to_string())]),
            kind_options: KindOptions::from([
                ("method".to_string(), json!("GET")),
                ("path".to_string(), json!("/get")),
                ("headers".to_string(), json!({"accept": "application/json"})),
            ]),
            ..Task::default()
        };
        let def = Definition::from_task(&client(), &task).await.unwrap();
        let KindDefinition::Rest(rest) = &def.kind else {
            panic!("expected rest kind");
        };
        assert_eq!(rest.resource, "httpbin");
        assert_eq!(rest.headers["accept"], "application/json");
        assert!(def.resources.is_empty());
    }

    #[tokio::test]
    async fn test_from_task_unknown_resource_id() {
        let task = Task {
            slug: "sql_task".to_string(),
            kind: TaskKind::Sql,
            resources: Resources::from([("db".to_string(), "res_gone".to_string())]),
            ..Task::default()
        };
        let err = Definition::from_task(&client(), &task).await.unwrap_err();
        assert!(matches!(err, Error::UnknownResource { reference } if reference == "res_gone"));
    }

    #[tokio::test]
    async fn test_update_request_for_rest() {
        let yaml = b"slug: rest_task\nname: REST\nrest:\n  resource: httpbin\n  method: POST\n  path: /post\n  bodyType: raw\n  body: hello\n";
        let def = Definition::unmarshal(DefFormat::Yaml, yaml).unwrap();
        let req = def.update_task_request(&client(), None).await.unwrap();

        assert_eq!(req.kind, TaskKind::Rest);
        assert_eq!(req.resources["rest"], "res_http");
        assert_eq!(req.kind_options["urlParams"], json!({}));
        assert_eq!(req.kind_options["body"], json!("hello"));
        assert!(req.parameters.is_empty());
        assert_eq!(
            req.execute_rules,
            ExecuteRules {
                disallow_self_approve: Some(false),
                require_requests: Some(false),
            }
        );
    }

    #[tokio::test]
    async fn test_update_request_unknown_resource_name() {
        let yaml = b"slug: q\nname: Q\nsql:\n  resource: warehouse\n  entrypoint: q.sql\n";
        let def = Definition::unmarshal(DefFormat::Yaml, yaml).unwrap();
        let err = def.update_task_request(&client(), None).await.unwrap_err();
        assert!(matches!(err, Error::UnknownResource { reference } if reference == "warehouse"));
    }

    #[tokio::test]
    async fn test_update_request_sets_image_and_env() {
        let yaml = b"slug: n\nname: N\nallowSelfApprovals: false\nnode:\n  entrypoint: main.ts\n  nodeVersion: \"18\"\n  envVars:\n    TOKEN:\n      config: api_token\n";
        let def = Definition::unmarshal(DefFormat::Yaml, yaml).unwrap();
        let req = def
            .update_task_request(&client(), Some("registry/n:abc"))
            .await
            .unwrap();
        assert_eq!(req.image.as_deref(), Some("registry/n:abc"));
        assert_eq!(
            req.env["TOKEN"],
            EnvVarValue {
                value: None,
                config: Some("api_token".to_string()),
            }
        );
        assert_eq!(req.execute_rules.disallow_self_approve, Some(true));

        let create = def.create_task_request(&client()).await.unwrap();
        assert_eq!(create.slug, "n");
        assert_eq!(create.image, None);
    }
}
