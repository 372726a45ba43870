use crate::kind::{KindOptions, TaskKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Environment variables attached to a task, keyed by variable name.
pub type TaskEnv = BTreeMap<String, EnvVarValue>;

/// Resource bindings, keyed by alias.
pub type Resources = BTreeMap<String, String>;

/// A task as stored by the remote API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Task {
    /// Opaque task identifier.
    #[serde(rename = "taskID")]
    pub id: String,
    /// Display name.
    pub name: String,
    /// Unique, stable slug.
    pub slug: String,
    /// Free-form description.
    pub description: String,
    /// Container image, set for image tasks and after a build.
    pub image: Option<String>,
    /// Container entrypoint override.
    pub command: Vec<String>,
    /// Container arguments.
    pub arguments: Vec<String>,
    /// Parameters the task accepts.
    pub parameters: Vec<Parameter>,
    /// Agent constraints.
    pub constraints: RunConstraints,
    /// Environment variables.
    pub env: TaskEnv,
    /// Resource bindings by alias, values are resource IDs.
    pub resources: Resources,
    /// Task kind.
    pub kind: TaskKind,
    /// Kind-specific options.
    pub kind_options: KindOptions,
    /// Timeout in seconds, zero for the platform default.
    pub timeout: u32,
    /// Template interpolation mode (`jst`, `handlebars`).
    pub interpolation_mode: String,
    /// Approval rules.
    pub execute_rules: ExecuteRules,
    /// Execution runtime (`standard`, `workflow`).
    pub runtime: String,
    /// Archived tasks are never redeployed.
    pub is_archived: bool,
}

impl Default for Task {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            slug: String::new(),
            description: String::new(),
            image: None,
            command: Vec::new(),
            arguments: Vec::new(),
            parameters: Vec::new(),
            constraints: RunConstraints::default(),
            env: TaskEnv::new(),
            resources: Resources::new(),
            kind: TaskKind::Node,
            kind_options: KindOptions::new(),
            timeout: 0,
            interpolation_mode: String::new(),
            execute_rules: ExecuteRules::default(),
            runtime: String::new(),
            is_archived: false,
        }
    }
}

/// An app (view) as stored by the remote API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct App {
    /// Opaque app identifier.
    pub id: String,
    /// Unique, stable slug.
    pub slug: String,
    /// Display name.
    pub name: String,
    /// Archived apps are never redeployed.
    pub is_archived: bool,
}

/// A resource (database, REST endpoint, ...) tasks can bind to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Resource {
    /// Opaque resource identifier.
    pub id: String,
    /// Human-readable, unique name used in definition files.
    pub name: String,
    /// Resource kind (`postgres`, `rest`, ...).
    pub kind: String,
}

/// A task parameter in API form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Parameter {
    /// Display name.
    pub name: String,
    /// Slug used to reference the value.
    pub slug: String,
    /// Value type (`string`, `boolean`, `integer`, ...).
    #[serde(rename = "type")]
    pub kind: String,
    /// Description.
    pub desc: String,
    /// UI component (`textarea`, `editor-sql`), empty for the default.
    pub component: String,
    /// Default value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    /// Validation constraints.
    pub constraints: ParameterConstraints,
}

/// Constraints on a parameter's value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParameterConstraints {
    /// Whether the parameter may be omitted.
    pub optional: bool,
    /// Regular expression the value must match.
    pub regex: String,
    /// Allowed values.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<ConstraintOption>,
}

/// One allowed value of a parameter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConstraintOption {
    /// Display label, defaults to the value.
    pub label: String,
    /// The value.
    pub value: serde_json::Value,
}

/// Constraints on which agents may run a task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RunConstraints {
    /// Required agent labels.
    pub labels: Vec<AgentLabel>,
}

/// An agent label key/value pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentLabel {
    /// Label key.
    pub key: String,
    /// Label value.
    pub value: String,
}

/// Value of an environment variable: a literal or a config var reference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvVarValue {
    /// Literal value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Name of a config var to read the value from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<String>,
}

/// Approval rules for running a task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExecuteRules {
    /// Whether the requester may approve their own run request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disallow_self_approve: Option<bool>,
    /// Whether runs must be requested instead of executed directly.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub require_requests: Option<bool>,
}

/// Request to update an existing task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskRequest {
    /// Slug of the task to update.
    pub slug: String,
    /// Display name.
    pub name: String,
    /// Description.
    pub description: String,
    /// Container image.
    pub image: Option<String>,
    /// Container entrypoint override.
    pub command: Vec<String>,
    /// Container arguments.
    pub arguments: Vec<String>,
    /// Parameters, always present even when empty.
    pub parameters: Vec<Parameter>,
    /// Agent constraints.
    pub constraints: RunConstraints,
    /// Environment variables.
    pub env: TaskEnv,
    /// Resource bindings by alias, values are resource IDs.
    pub resources: Resources,
    /// Task kind.
    pub kind: TaskKind,
    /// Kind-specific options.
    pub kind_options: KindOptions,
    /// Timeout in seconds.
    pub timeout: u32,
    /// Build that produced `image`.
    #[serde(rename = "buildID")]
    pub build_id: Option<String>,
    /// Template interpolation mode.
    pub interpolation_mode: Option<String>,
    /// Approval rules.
    pub execute_rules: ExecuteRules,
    /// Execution runtime.
    pub runtime: String,
}

/// Request to create a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    /// Slug of the new task.
    pub slug: String,
    /// Display name.
    pub name: String,
    /// Description.
    pub description: String,
    /// Container image.
    pub image: Option<String>,
    /// Container entrypoint override.
    pub command: Vec<String>,
    /// Container arguments.
    pub arguments: Vec<String>,
    /// Parameters.
    pub parameters: Vec<Parameter>,
    /// Agent constraints.
    pub constraints: RunConstraints,
    /// Environment variables.
    pub env: TaskEnv,
    /// Resource bindings by alias, values are resource IDs.
    pub resources: Resources,
    /// Task kind.
    pub kind: TaskKind,
    /// Kind-specific options.
    pub kind_options: KindOptions,
    /// Timeout in seconds.
    pub timeout: u32,
    /// Approval rules.
    pub execute_rules: ExecuteRules,
    /// Execution runtime.
    pub runtime: String,
}

impl From<UpdateTaskRequest> for CreateTaskRequest {
    fn from(req: UpdateTaskRequest) -> Self {
        Self {
            slug: req.slug,
            name: req.name,
            description: req.description,
            image: req.image,
            command: req.command,
            arguments: req.arguments,
            parameters: req.parameters,
            constraints: req.constraints,
            env: req.env,
            resources: req.resources,
            kind: req.kind,
            kind_options: req.kind_options,
            timeout: req.timeout,
            execute_rules: req.execute_rules,
            runtime: req.runtime,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_deserializes_with_defaults() {
        let task: Task = serde_json::from_str(
            r#"{"taskID": "tsk123", "slug": "my_task", "kind": "python", "interpolationMode": "jst"}"#,
        )
        .unwrap();
        assert_eq!(task.id, "tsk123");
        assert_eq!(task.kind, TaskKind::Python);
        assert_eq!(task.interpolation_mode, "jst");
        assert!(task.parameters.is_empty());
        assert!(!task.is_archived);
    }

    #[test]
    fn test_update_request_wire_names() {
        let req = UpdateTaskRequest {
            slug: "s".to_string(),
            name: "n".to_string(),
            description: String::new(),
            image: None,
            command: vec![],
            arguments: vec![],
            parameters: vec![],
            constraints: RunConstraints::default(),
            env: TaskEnv::new(),
            resources: Resources::new(),
            kind: TaskKind::Node,
            kind_options: KindOptions::new(),
            timeout: 0,
            build_id: Some("bld1".to_string()),
            interpolation_mode: None,
            execute_rules: ExecuteRules::default(),
            runtime: String::new(),
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["buildID"], "bld1");
        assert_eq!(json["kindOptions"], serde_json::json!({}));
        assert_eq!(json["parameters"], serde_json::json!([]));
    }
}
