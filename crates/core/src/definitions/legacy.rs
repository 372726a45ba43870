//! The 0.2 definition schema and its upgrade to the current one.

use super::convert::join_command;
use super::params::ParameterDefinition;
use super::task::{
    Definition, ImageDefinition, KindDefinition, NodeDefinition, PythonDefinition,
    RestDefinition, ShellDefinition, deserialize_with_path,
};
use super::DefFormat;
use crate::api::{Parameter, RunConstraints, TaskEnv};
use crate::error::{Error, Result};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// A task definition in the 0.2 schema.
///
/// Parameters use the API shape, environment variables and arguments live at the
/// top level, and REST bodies come in per-encoding fields.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Definition0_2 {
    /// Unique, stable slug.
    pub slug: String,
    /// Display name.
    pub name: String,
    /// Description.
    pub description: String,
    /// Container arguments.
    pub arguments: Vec<String>,
    /// Parameters in API form.
    pub parameters: Vec<Parameter>,
    /// Agent constraints.
    pub constraints: RunConstraints,
    /// Environment variables.
    pub env: TaskEnv,
    /// Resource bindings by alias, values are resource names.
    pub resources: BTreeMap<String, String>,
    /// Timeout in seconds.
    pub timeout: u32,
    /// `image` block.
    pub image: Option<Image0_2>,
    /// `node` block.
    pub node: Option<Node0_2>,
    /// `python` block.
    pub python: Option<Script0_2>,
    /// `shell` block.
    pub shell: Option<Script0_2>,
    /// `sql` block.
    pub sql: Option<Sql0_2>,
    /// `rest` block.
    pub rest: Option<Rest0_2>,
}

/// 0.2 `image` block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Image0_2 {
    /// Image reference.
    pub image: String,
    /// Container command as a list.
    pub command: Vec<String>,
}

/// 0.2 `node` block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Node0_2 {
    /// Script path.
    pub entrypoint: String,
    /// `javascript` or `typescript`; inferred from the extension in 0.3.
    pub language: String,
    /// Node.js major version.
    pub node_version: String,
}

/// 0.2 `python` and `shell` blocks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Script0_2 {
    /// Script path.
    pub entrypoint: String,
}

/// 0.2 `sql` block with an inline query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Sql0_2 {
    /// Inline query text.
    pub query: String,
}

/// 0.2 `rest` block.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Rest0_2 {
    /// Request headers.
    pub headers: BTreeMap<String, String>,
    /// HTTP method.
    pub method: String,
    /// Request path.
    pub path: String,
    /// Query string parameters.
    pub url_params: BTreeMap<String, Value>,
    /// Raw body.
    pub body: String,
    /// JSON body, structured or pre-serialized.
    pub json_body: Option<Value>,
    /// URL-encoded form fields.
    pub form_url_encoded_body: Option<BTreeMap<String, Value>>,
    /// Multipart form fields.
    pub form_data_body: Option<BTreeMap<String, Value>>,
}

impl Definition0_2 {
    /// Parses a 0.2 document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDefinition`] with the path of the offending field.
    pub fn unmarshal(format: DefFormat, bytes: &[u8]) -> Result<Self> {
        deserialize_with_path(format, bytes)
    }

    /// Converts to the current schema.
    ///
    /// The `language` of node blocks is dropped, top-level environment variables
    /// move into the kind block and REST bodies collapse into `bodyType` + `body`.
    ///
    /// # Errors
    ///
    /// Returns an error if the definition does not have exactly one kind block, a
    /// parameter type has no 0.3 equivalent, or the SQL block uses an inline query.
    pub fn upgrade(self) -> Result<Definition> {
        tracing::debug!(slug = %self.slug, "Upgrading 0.2 definition");
        let mut kind = self.upgrade_kind()?;
        let mut resources = self.resources;
        if let KindDefinition::Rest(rest) = &mut kind
            && let Some(name) = resources.remove("rest")
        {
            rest.resource = name;
        }

        let mut def = Definition::new(self.slug, self.name, kind);
        def.description = self.description;
        def.parameters = self
            .parameters
            .iter()
            .map(ParameterDefinition::from_api)
            .collect::<Result<_>>()?;
        def.resources = resources;
        def.constraints = self
            .constraints
            .labels
            .into_iter()
            .map(|label| (label.key, label.value))
            .collect();
        def.timeout = (self.timeout > 0).then_some(self.timeout);
        Ok(def)
    }

    fn upgrade_kind(&self) -> Result<KindDefinition> {
        let present: Vec<&str> = [
            self.image.as_ref().map(|_| "image"),
            self.node.as_ref().map(|_| "node"),
            self.python.as_ref().map(|_| "python"),
            self.shell.as_ref().map(|_| "shell"),
            self.sql.as_ref().map(|_| "sql"),
            self.rest.as_ref().map(|_| "rest"),
        ]
        .into_iter()
        .flatten()
        .collect();
        if present.len() != 1 {
            let message = if present.is_empty() {
                "No task type defined".to_string()
            } else {
                format!(
                    "Too many task types defined: only one of ({}) expected",
                    present.join(", ")
                )
            };
            return Err(Error::invalid(vec![message]));
        }

        let env_vars = self.env.clone();
        if let Some(image) = &self.image {
            return Ok(KindDefinition::Image(ImageDefinition {
                image: image.image.clone(),
                entrypoint: join_command(&self.slug, &image.command)?,
                command: join_command(&self.slug, &self.arguments)?,
                env_vars,
            }));
        }
        if let Some(node) = &self.node {
            if !node.language.is_empty() {
                tracing::debug!(slug = %self.slug, language = %node.language, "Dropping node language, inferred from the entrypoint");
            }
            return Ok(KindDefinition::Node(NodeDefinition {
                entrypoint: node.entrypoint.clone(),
                node_version: node.node_version.clone(),
                env_vars,
            }));
        }
        if let Some(python) = &self.python {
            return Ok(KindDefinition::Python(PythonDefinition {
                entrypoint: python.entrypoint.clone(),
                env_vars,
            }));
        }
        if let Some(shell) = &self.shell {
            return Ok(KindDefinition::Shell(ShellDefinition {
                entrypoint: shell.entrypoint.clone(),
                env_vars,
            }));
        }
        if let Some(rest) = &self.rest {
            return Ok(KindDefinition::Rest(upgrade_rest(rest)));
        }
        Err(Error::Upgrade {
            slug: self.slug.clone(),
            message: "inline SQL queries are not supported; move the query into a .sql file and reference it from sql.entrypoint".to_string(),
        })
    }
}

fn upgrade_rest(rest: &Rest0_2) -> RestDefinition {
    let (body_type, body, form_data) = if let Some(json_body) = &rest.json_body {
        ("json", Some(json_body.clone()), BTreeMap::new())
    } else if let Some(form) = &rest.form_url_encoded_body {
        ("x-www-form-urlencoded", None, form.clone())
    } else if let Some(form) = &rest.form_data_body {
        ("form-data", None, form.clone())
    } else {
        let body = Some(rest.body.clone())
            .filter(|b| !b.is_empty())
            .map(Value::String);
        ("raw", body, BTreeMap::new())
    };

    RestDefinition {
        resource: String::new(),
        method: rest.method.clone(),
        path: rest.path.clone(),
        url_params: rest.url_params.clone(),
        headers: rest.headers.clone(),
        body_type: body_type.to_string(),
        body,
        form_data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definitions::DefinitionVersion;
    use crate::kind::TaskKind;
    use serde_json::json;

    #[test]
    fn test_upgrade_node() {
        let yaml = b"slug: hello\nname: Hello\nnode:\n  entrypoint: main.ts\n  language: typescript\n  nodeVersion: \"16\"\nenv:\n  TOKEN:\n    value: abc\nparameters:\n  - name: Notes\n    slug: notes\n    type: string\n    component: textarea\n    constraints:\n      optional: true\ntimeout: 60\n";
        let def = Definition::from_versioned(DefinitionVersion::V0_2, DefFormat::Yaml, yaml).unwrap();

        assert_eq!(def.task_kind(), TaskKind::Node);
        assert_eq!(def.kind_options()["nodeVersion"], "16");
        assert_eq!(def.env()["TOKEN"].value.as_deref(), Some("abc"));
        assert_eq!(def.parameters[0].kind, crate::definitions::ParamType::Longtext);
        assert_eq!(def.parameters[0].required, Some(false));
        assert_eq!(def.timeout, Some(60));
    }

    #[test]
    fn test_upgrade_image_quotes_command_and_arguments() {
        let yaml = b"slug: img\nname: Img\nimage:\n  image: alpine\n  command: [sh, -c]\narguments: [\"echo hi\"]\n";
        let def = Definition::from_versioned(DefinitionVersion::V0_2, DefFormat::Yaml, yaml).unwrap();
        let KindDefinition::Image(image) = def.kind else {
            panic!("expected image kind");
        };
        assert_eq!(image.entrypoint, "sh -c");
        assert_eq!(image.command, "'echo hi'");
    }

    #[test]
    fn test_upgrade_rest_bodies() {
        let yaml = b"slug: r\nname: R\nresources:\n  rest: httpbin\nrest:\n  method: POST\n  path: /post\n  jsonBody:\n    a: 1\n";
        let def = Definition::from_versioned(DefinitionVersion::V0_2, DefFormat::Yaml, yaml).unwrap();
        let KindDefinition::Rest(rest) = &def.kind else {
            panic!("expected rest kind");
        };
        assert_eq!(rest.resource, "httpbin");
        assert!(def.resources.is_empty());
        let options = def.kind_options();
        assert_eq!(options["bodyType"], "json");
        assert_eq!(options["body"], "{\"a\":1}");

        let yaml = b"slug: r\nname: R\nrest:\n  method: POST\n  path: /post\n  formDataBody:\n    f: v\n";
        let def = Definition::from_versioned(DefinitionVersion::V0_2, DefFormat::Yaml, yaml).unwrap();
        let options = def.kind_options();
        assert_eq!(options["bodyType"], "form-data");
        assert_eq!(options["formData"], json!({"f": "v"}));
    }

    #[test]
    fn test_upgrade_rejects_inline_sql() {
        let yaml = b"slug: q\nname: Q\nsql:\n  query: select 1\n";
        let err = Definition::from_versioned(DefinitionVersion::V0_2, DefFormat::Yaml, yaml).unwrap_err();
        assert!(matches!(err, Error::Upgrade { .. }));
    }

    #[test]
    fn test_upgrade_requires_one_kind() {
        let yaml = b"slug: q\nname: Q\n";
        let err = Definition::from_versioned(DefinitionVersion::V0_2, DefFormat::Yaml, yaml).unwrap_err();
        assert!(err.to_string().contains("No task type defined"));
    }
}
