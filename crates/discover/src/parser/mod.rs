//! Extraction of tasks declared in code.
//!
//! Code files declare tasks by wrapping exported functions; an external parser
//! loads the module and reports every declaration as JSON:
//!
//! ```json
//! [{"slug": "hello", "name": "Hello", "parameters": {"who": {"name": "Who", "kind": "shorttext"}}, "entrypointFunc": "hello"}]
//! ```

use crate::config::ParserConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use hangar_core::definitions::DefFormat;
use hangar_core::Definition;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Node version given to tasks declared in code.
pub const CODE_TASK_NODE_VERSION: &str = "18";

const NODE_PARSER_SCRIPT: &str = include_str!("node_parser.ts");

/// A task declaration reported by a parser.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParsedTask {
    /// Task slug.
    pub slug: String,
    /// Display name.
    pub name: String,
    /// Description.
    pub description: String,
    /// Parameters by slug.
    pub parameters: BTreeMap<String, ParsedParam>,
    /// Resource bindings by alias.
    pub resources: BTreeMap<String, String>,
    /// Whether runs must be requested.
    pub require_requests: Option<bool>,
    /// Whether requesters may approve their own requests.
    pub allow_self_approvals: Option<bool>,
    /// Timeout in seconds.
    pub timeout: Option<u32>,
    /// Agent label constraints.
    pub constraints: BTreeMap<String, String>,
    /// `standard` or `workflow`.
    pub runtime: Option<String>,
    /// Exported function that runs the task.
    pub entrypoint_func: String,
}

/// A parameter declaration reported by a parser.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ParsedParam {
    /// Display name.
    pub name: String,
    /// Parameter type, e.g. `shorttext`.
    #[serde(alias = "type")]
    pub kind: String,
    /// Description.
    pub description: String,
    /// Whether a value must be given.
    pub required: Option<bool>,
    /// Default value.
    pub default: Option<Value>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DefinitionDoc<'a> {
    slug: &'a str,
    name: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    description: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    parameters: Vec<ParamDoc<'a>>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    resources: &'a BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    require_requests: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    allow_self_approvals: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    timeout: Option<u32>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    constraints: &'a BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    runtime: Option<&'a str>,
    node: NodeDoc<'a>,
}

#[derive(Serialize)]
struct ParamDoc<'a> {
    slug: &'a str,
    name: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    description: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    required: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    default: Option<&'a Value>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NodeDoc<'a> {
    entrypoint: &'a str,
    node_version: &'a str,
}

impl ParsedTask {
    /// Builds a Node definition for this declaration.
    ///
    /// The declaration goes through the same validation as a definition file;
    /// problems are reported against `file`.
    ///
    /// # Errors
    ///
    /// Returns [`hangar_core::Error::ReadDefinition`] if the declaration is invalid.
    pub fn to_definition(&self, file: &Path, entrypoint: &str) -> Result<Definition> {
        let doc = DefinitionDoc {
            slug: &self.slug,
            name: &self.name,
            description: &self.description,
            parameters: self
                .parameters
                .iter()
                .map(|(slug, param)| ParamDoc {
                    slug,
                    name: if param.name.is_empty() { slug } else { &param.name },
                    kind: if param.kind.is_empty() { "shorttext" } else { &param.kind },
                    description: &param.description,
                    required: param.required,
                    default: param.default.as_ref(),
                })
                .collect(),
            resources: &self.resources,
            require_requests: self.require_requests,
            allow_self_approvals: self.allow_self_approvals,
            timeout: self.timeout,
            constraints: &self.constraints,
            runtime: self.runtime.as_deref(),
            node: NodeDoc {
                entrypoint,
                node_version: CODE_TASK_NODE_VERSION,
            },
        };
        let bytes = serde_json::to_vec(&doc).map_err(hangar_core::Error::serialize)?;
        Definition::unmarshal(DefFormat::Json, &bytes)
            .map_err(|e| e.with_path(file))
            .map_err(Error::from)
    }
}

/// Extracts task declarations from a code file.
#[async_trait]
pub trait TaskParser: Send + Sync {
    /// Every task declared in `file`, in declaration order.
    ///
    /// # Errors
    ///
    /// Returns an error if the parser fails, times out or prints malformed output.
    async fn parse(&self, file: &Path) -> Result<Vec<ParsedTask>>;
}

/// Runs the bundled TypeScript parser through an external command
/// (`npx ... ts-node` by default).
#[derive(Debug, Clone)]
pub struct NodeParser {
    config: ParserConfig,
}

impl NodeParser {
    /// Creates a parser running `config.program`.
    #[must_use]
    pub const fn new(config: ParserConfig) -> Self {
        Self { config }
    }

    async fn write_script() -> Result<tempfile::NamedTempFile> {
        let script = tempfile::Builder::new()
            .prefix("hangar.parser.node.")
            .suffix(".ts")
            .tempfile()
            .map_err(|e| Error::io(e, std::env::temp_dir(), "create parser script"))?;
        tokio::fs::write(script.path(), NODE_PARSER_SCRIPT)
            .await
            .map_err(|e| Error::io(e, script.path(), "write parser script"))?;
        Ok(script)
    }
}

impl Default for NodeParser {
    fn default() -> Self {
        Self::new(ParserConfig::default())
    }
}

#[async_trait]
impl TaskParser for NodeParser {
    async fn parse(&self, file: &Path) -> Result<Vec<ParsedTask>> {
        let script = Self::write_script().await?;

        let mut cmd = Command::new(&self.config.program);
        cmd.args(&self.config.args)
            .arg(script.path())
            .arg(file)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = file.parent() {
            cmd.current_dir(dir);
        }

        tracing::debug!(
            program = %self.config.program,
            path = %file.display(),
            "Running task parser"
        );
        let seconds = self.config.timeout_seconds;
        let output = match tokio::time::timeout(Duration::from_secs(seconds), cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(Error::io(e, PathBuf::from(&self.config.program), "run task parser"));
            }
            Err(_) => {
                return Err(Error::ParserTimeout {
                    path: file.to_path_buf(),
                    seconds,
                });
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::parser(
                file,
                format!("parser exited with {}: {}", output.status, stderr.trim()),
            ));
        }
        parse_output(file, &output.stdout)
    }
}

/// Decodes a parser's stdout.
///
/// # Errors
///
/// Returns [`Error::Parser`] if the output is not a JSON array of declarations.
pub fn parse_output(file: &Path, stdout: &[u8]) -> Result<Vec<ParsedTask>> {
    serde_json::from_slice(stdout)
        .map_err(|e| Error::parser(file, format!("malformed parser output: {e}")))
}
