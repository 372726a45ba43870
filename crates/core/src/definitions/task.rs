use super::build_config::BuildConfigOverrides;
use super::params::ParameterDefinition;
use super::{DefFormat, DefinitionVersion, validate};
use crate::api::{EnvVarValue, TaskEnv};
use crate::error::{Error, Result};
use crate::kind::{BuildConfig, KindOptions, TaskKind};
use crate::paths;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Execution runtime of a task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskRuntime {
    /// Regular run-to-completion task.
    #[default]
    Standard,
    /// Durable workflow task.
    Workflow,
}

impl TaskRuntime {
    /// The API name of this runtime.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Workflow => "workflow",
        }
    }

    const fn is_standard(&self) -> bool {
        matches!(self, Self::Standard)
    }
}

/// `image` block: run a prebuilt container image.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ImageDefinition {
    /// Image reference.
    #[serde(default)]
    pub image: String,
    /// Container entrypoint, shell-quoted.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub entrypoint: String,
    /// Container command, shell-quoted.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub command: String,
    /// Environment variables.
    #[serde(
        default,
        skip_serializing_if = "TaskEnv::is_empty",
        deserialize_with = "deserialize_env_vars"
    )]
    pub env_vars: TaskEnv,
}

/// `node` block: a JavaScript or TypeScript script.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NodeDefinition {
    /// Script path, relative to the definition file.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub entrypoint: String,
    /// Node.js major version.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub node_version: String,
    /// Environment variables.
    #[serde(
        default,
        skip_serializing_if = "TaskEnv::is_empty",
        deserialize_with = "deserialize_env_vars"
    )]
    pub env_vars: TaskEnv,
}

/// `python` block: a Python script.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PythonDefinition {
    /// Script path, relative to the definition file.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub entrypoint: String,
    /// Environment variables.
    #[serde(
        default,
        skip_serializing_if = "TaskEnv::is_empty",
        deserialize_with = "deserialize_env_vars"
    )]
    pub env_vars: TaskEnv,
}

/// `shell` block: a shell script.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ShellDefinition {
    /// Script path, relative to the definition file.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub entrypoint: String,
    /// Environment variables.
    #[serde(
        default,
        skip_serializing_if = "TaskEnv::is_empty",
        deserialize_with = "deserialize_env_vars"
    )]
    pub env_vars: TaskEnv,
}

/// `sql` block: a query file run against a database resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SqlDefinition {
    /// Name of the database resource.
    #[serde(default)]
    pub resource: String,
    /// Query file path, relative to the definition file.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub entrypoint: String,
    /// Named query arguments.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub query_args: BTreeMap<String, Value>,
    /// Transaction mode (`auto`, `readOnly`, `readWrite`, `none`).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub transaction_mode: String,
}

/// `rest` block: an HTTP request against a REST resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RestDefinition {
    /// Name of the REST resource.
    #[serde(default)]
    pub resource: String,
    /// HTTP method.
    #[serde(default)]
    pub method: String,
    /// Request path, appended to the resource base URL.
    #[serde(default)]
    pub path: String,
    /// Query string parameters.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub url_params: BTreeMap<String, Value>,
    /// Request headers.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    /// Body encoding (`raw`, `json`, `form-data`, `x-www-form-urlencoded`).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub body_type: String,
    /// Request body; structured JSON bodies are serialized before sending.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    /// Form fields for form body types.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub form_data: BTreeMap<String, Value>,
}

/// The kind-specific block of a definition. Exactly one is present per task.
#[derive(Debug, Clone, PartialEq)]
pub enum KindDefinition {
    /// `image` block.
    Image(ImageDefinition),
    /// `node` block.
    Node(NodeDefinition),
    /// `python` block.
    Python(PythonDefinition),
    /// `shell` block.
    Shell(ShellDefinition),
    /// `sql` block.
    Sql(SqlDefinition),
    /// `rest` block.
    Rest(RestDefinition),
}

impl KindDefinition {
    /// An empty block of the given kind.
    #[must_use]
    pub fn empty(kind: TaskKind) -> Self {
        match kind {
            TaskKind::Image => Self::Image(ImageDefinition::default()),
            TaskKind::Node => Self::Node(NodeDefinition::default()),
            TaskKind::Python => Self::Python(PythonDefinition::default()),
            TaskKind::Shell => Self::Shell(ShellDefinition::default()),
            TaskKind::Sql => Self::Sql(SqlDefinition::default()),
            TaskKind::Rest => Self::Rest(RestDefinition::default()),
        }
    }

    /// The task kind of this block.
    #[must_use]
    pub const fn kind(&self) -> TaskKind {
        match self {
            Self::Image(_) => TaskKind::Image,
            Self::Node(_) => TaskKind::Node,
            Self::Python(_) => TaskKind::Python,
            Self::Shell(_) => TaskKind::Shell,
            Self::Sql(_) => TaskKind::Sql,
            Self::Rest(_) => TaskKind::Rest,
        }
    }

    /// The entrypoint file, for kinds that run a file from the repository.
    #[must_use]
    pub fn entrypoint(&self) -> Option<&str> {
        match self {
            Self::Node(d) => Some(&d.entrypoint),
            Self::Python(d) => Some(&d.entrypoint),
            Self::Shell(d) => Some(&d.entrypoint),
            Self::Sql(d) => Some(&d.entrypoint),
            Self::Image(_) | Self::Rest(_) => None,
        }
    }

    /// Environment variables, for kinds that run a process.
    #[must_use]
    pub fn env_vars(&self) -> Option<&TaskEnv> {
        match self {
            Self::Image(d) => Some(&d.env_vars),
            Self::Node(d) => Some(&d.env_vars),
            Self::Python(d) => Some(&d.env_vars),
            Self::Shell(d) => Some(&d.env_vars),
            Self::Sql(_) | Self::Rest(_) => None,
        }
    }

    /// Mutable environment variables, for kinds that run a process.
    pub fn env_vars_mut(&mut self) -> Option<&mut TaskEnv> {
        match self {
            Self::Image(d) => Some(&mut d.env_vars),
            Self::Node(d) => Some(&mut d.env_vars),
            Self::Python(d) => Some(&mut d.env_vars),
            Self::Shell(d) => Some(&mut d.env_vars),
            Self::Sql(_) | Self::Rest(_) => None,
        }
    }

    /// Kind options as sent to the API.
    ///
    /// REST blocks always carry `urlParams`, `headers` and `formData`, and a
    /// structured body is serialized to a JSON string.
    #[must_use]
    pub fn kind_options(&self) -> KindOptions {
        let mut options = KindOptions::new();
        let mut put = |key: &str, value: Value| {
            options.insert(key.to_string(), value);
        };
        match self {
            Self::Image(_) => {}
            Self::Node(d) => {
                put("entrypoint", json!(d.entrypoint));
                put("nodeVersion", json!(d.node_version));
            }
            Self::Python(d) => put("entrypoint", json!(d.entrypoint)),
            Self::Shell(d) => put("entrypoint", json!(d.entrypoint)),
            Self::Sql(d) => {
                put("entrypoint", json!(d.entrypoint));
                put("queryArgs", json!(d.query_args));
                put("transactionMode", json!(d.transaction_mode));
            }
            Self::Rest(d) => {
                put("method", json!(d.method));
                put("path", json!(d.path));
                put("urlParams", json!(d.url_params));
                put("headers", json!(d.headers));
                put("bodyType", json!(d.body_type));
                let body = match &d.body {
                    None => String::new(),
                    Some(Value::String(s)) => s.clone(),
                    Some(other) => other.to_string(),
                };
                put("body", json!(body));
                put("formData", json!(d.form_data));
            }
        }
        options
    }
}

/// A task definition (schema 0.3).
///
/// Besides the serialized document, a definition carries state set during
/// discovery: build-config overrides, the path of the file it was read from and
/// the absolute path of its entrypoint.
#[derive(Debug, Clone, PartialEq)]
pub struct Definition {
    /// Display name.
    pub name: String,
    /// Unique, stable slug.
    pub slug: String,
    /// Description.
    pub description: String,
    /// Parameters the task accepts.
    pub parameters: Vec<ParameterDefinition>,
    /// The kind-specific block.
    pub kind: KindDefinition,
    /// Resource bindings by alias, values are resource names.
    pub resources: BTreeMap<String, String>,
    /// Agent label constraints.
    pub constraints: BTreeMap<String, String>,
    /// Whether runs must be requested instead of executed directly.
    pub require_requests: bool,
    /// `Some(false)` forbids requesters from approving their own requests.
    pub allow_self_approvals: Option<bool>,
    /// Timeout in seconds.
    pub timeout: Option<u32>,
    /// Execution runtime.
    pub runtime: TaskRuntime,
    build_config: BuildConfigOverrides,
    defn_file_path: Option<PathBuf>,
    absolute_entrypoint: Option<PathBuf>,
}

impl Definition {
    /// Creates a definition with the given identity and kind block.
    #[must_use]
    pub fn new(slug: impl Into<String>, name: impl Into<String>, kind: KindDefinition) -> Self {
        Self {
            name: name.into(),
            slug: slug.into(),
            description: String::new(),
            parameters: Vec::new(),
            kind,
            resources: BTreeMap::new(),
            constraints: BTreeMap::new(),
            require_requests: false,
            allow_self_approvals: None,
            timeout: None,
            runtime: TaskRuntime::Standard,
            build_config: BuildConfigOverrides::default(),
            defn_file_path: None,
            absolute_entrypoint: None,
        }
    }

    /// Parses and validates a definition document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDefinition`] listing every problem found: type errors
    /// are reported with the path of the offending field, semantic problems (missing
    /// slug, zero or several kind blocks, ...) are all collected.
    pub fn unmarshal(format: DefFormat, bytes: &[u8]) -> Result<Self> {
        let raw: RawDefinition = deserialize_with_path(format, bytes)?;
        raw.into_definition().map_err(Error::invalid)
    }

    /// Parses a definition file's contents and remembers where it came from.
    ///
    /// The format is picked from the file name. Documents declaring
    /// `version: "0.2"` are upgraded; everything else is read as 0.3.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReadDefinition`] naming `path` if the document is invalid.
    pub fn parse_file(path: &Path, bytes: &[u8]) -> Result<Self> {
        let format = DefFormat::from_path(path);
        let mut def = DefinitionVersion::detect(format, bytes)
            .and_then(|version| Self::from_versioned(version, format, bytes))
            .map_err(|e| e.with_path(path))?;
        def.defn_file_path = Some(path.to_path_buf());
        Ok(def)
    }

    /// Parses a definition written against any supported schema version.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is invalid for its version or cannot be
    /// expressed in the current schema.
    pub fn from_versioned(version: DefinitionVersion, format: DefFormat, bytes: &[u8]) -> Result<Self> {
        match version {
            DefinitionVersion::V0_3 => Self::unmarshal(format, bytes),
            DefinitionVersion::V0_2 => super::legacy::Definition0_2::unmarshal(format, bytes)?.upgrade(),
        }
    }

    /// Serializes the definition. JSON output is indented with tabs.
    ///
    /// # Errors
    ///
    /// Returns an error if a value cannot be represented in the target format.
    pub fn marshal(&self, format: DefFormat) -> Result<Vec<u8>> {
        match format {
            DefFormat::Yaml => serde_yaml::to_string(self)
                .map(String::into_bytes)
                .map_err(Error::serialize),
            DefFormat::Json => {
                let mut buf = Vec::new();
                let formatter = serde_json::ser::PrettyFormatter::with_indent(b"\t");
                let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
                self.serialize(&mut ser).map_err(Error::serialize)?;
                buf.push(b'\n');
                Ok(buf)
            }
        }
    }

    /// The task kind.
    #[must_use]
    pub const fn task_kind(&self) -> TaskKind {
        self.kind.kind()
    }

    /// The entrypoint as written in the definition, if the kind has one.
    #[must_use]
    pub fn entrypoint(&self) -> Option<&str> {
        self.kind.entrypoint()
    }

    /// The entrypoint resolved against the directory of the definition file.
    ///
    /// Definitions that were not read from a file resolve against the current
    /// directory, i.e. the entrypoint is returned as written.
    #[must_use]
    pub fn entrypoint_path(&self) -> Option<PathBuf> {
        let entrypoint = self.entrypoint()?;
        let dir = self
            .defn_file_path
            .as_deref()
            .and_then(Path::parent)
            .unwrap_or_else(|| Path::new(""));
        Some(paths::clean(&dir.join(entrypoint)))
    }

    /// Environment variables of the task.
    #[must_use]
    pub fn env(&self) -> TaskEnv {
        self.kind.env_vars().cloned().unwrap_or_default()
    }

    /// Kind options as sent to the API.
    #[must_use]
    pub fn kind_options(&self) -> KindOptions {
        self.kind.kind_options()
    }

    /// Kind options with the build-config overrides applied.
    #[must_use]
    pub fn build_config(&self) -> BuildConfig {
        self.build_config.apply(self.kind_options())
    }

    /// The raw build-config overrides.
    #[must_use]
    pub const fn build_config_overrides(&self) -> &BuildConfigOverrides {
        &self.build_config
    }

    /// Overrides a build-config key.
    pub fn set_build_config(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.build_config.set(key, value);
    }

    /// Masks a build-config key inherited from the kind options.
    pub fn unset_build_config(&mut self, key: impl Into<String>) {
        self.build_config.unset(key);
    }

    /// Records the working directory relative to the task root.
    ///
    /// Stored as the `workdir` build-config key: empty when the workdir is the root,
    /// `/sub/dir` when nested. Only Node tasks use a workdir; other kinds ignore it.
    pub fn set_workdir(&mut self, root: &Path, workdir: &Path) {
        if self.task_kind() != TaskKind::Node {
            return;
        }
        let value = match workdir.strip_prefix(root) {
            Ok(rel) if rel.as_os_str().is_empty() => String::new(),
            Ok(rel) => format!("/{}", paths::to_slash(rel)),
            Err(_) => workdir.to_string_lossy().into_owned(),
        };
        self.set_build_config("workdir", value);
    }

    /// Records the absolute path of the entrypoint file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoEntrypoint`] if the kind has no entrypoint.
    pub fn set_absolute_entrypoint(&mut self, path: impl Into<PathBuf>) -> Result<()> {
        if self.entrypoint().is_none() {
            return Err(Error::NoEntrypoint {
                kind: self.task_kind(),
            });
        }
        self.absolute_entrypoint = Some(path.into());
        Ok(())
    }

    /// The absolute path of the entrypoint file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoEntrypoint`] if the kind has no entrypoint, or
    /// [`Error::NoAbsoluteEntrypoint`] if it was never resolved.
    pub fn absolute_entrypoint(&self) -> Result<&Path> {
        if self.entrypoint().is_none() {
            return Err(Error::NoEntrypoint {
                kind: self.task_kind(),
            });
        }
        self.absolute_entrypoint
            .as_deref()
            .ok_or_else(|| Error::NoAbsoluteEntrypoint {
                slug: self.slug.clone(),
            })
    }

    /// Records the file this definition was read from.
    pub fn set_defn_file_path(&mut self, path: impl Into<PathBuf>) {
        self.defn_file_path = Some(path.into());
    }

    /// The file this definition was read from.
    #[must_use]
    pub fn defn_file_path(&self) -> Option<&Path> {
        self.defn_file_path.as_deref()
    }
}

impl Serialize for Definition {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        RawDefinition::from(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Definition {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        RawDefinition::deserialize(deserializer)?
            .into_definition()
            .map_err(|messages| D::Error::custom(messages.join("; ")))
    }
}

/// Wire shape of a 0.3 definition: one optional field per kind block.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub(super) struct RawDefinition {
    #[serde(default, skip_serializing)]
    pub version: Option<serde_json::Value>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<ParameterDefinition>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub resources: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub constraints: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub require_requests: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_self_approvals: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u32>,
    #[serde(default, skip_serializing_if = "TaskRuntime::is_standard")]
    pub runtime: TaskRuntime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<NodeDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub python: Option<PythonDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shell: Option<ShellDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sql: Option<SqlDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rest: Option<RestDefinition>,
}

impl RawDefinition {
    /// Builds the definition, collecting every validation message on failure.
    pub fn into_definition(mut self) -> std::result::Result<Definition, Vec<String>> {
        let mut kinds: Vec<KindDefinition> = [
            self.image.take().map(KindDefinition::Image),
            self.node.take().map(KindDefinition::Node),
            self.python.take().map(KindDefinition::Python),
            self.shell.take().map(KindDefinition::Shell),
            self.sql.take().map(KindDefinition::Sql),
            self.rest.take().map(KindDefinition::Rest),
        ]
        .into_iter()
        .flatten()
        .collect();

        let messages = validate::definition(&self, &kinds);
        if !messages.is_empty() {
            return Err(messages);
        }
        let Some(kind) = kinds.pop() else {
            return Err(vec![validate::NO_KIND_MESSAGE.to_string()]);
        };

        Ok(Definition {
            name: self.name,
            slug: self.slug,
            description: self.description,
            parameters: self.parameters,
            kind,
            resources: self.resources,
            constraints: self.constraints,
            require_requests: self.require_requests,
            allow_self_approvals: self.allow_self_approvals,
            timeout: self.timeout,
            runtime: self.runtime,
            build_config: BuildConfigOverrides::default(),
            defn_file_path: None,
            absolute_entrypoint: None,
        })
    }
}

impl From<&Definition> for RawDefinition {
    fn from(def: &Definition) -> Self {
        let mut raw = Self {
            name: def.name.clone(),
            slug: def.slug.clone(),
            description: def.description.clone(),
            parameters: def.parameters.clone(),
            resources: def.resources.clone(),
            constraints: def.constraints.clone(),
            require_requests: def.require_requests,
            allow_self_approvals: def.allow_self_approvals,
            timeout: def.timeout,
            runtime: def.runtime,
            ..Self::default()
        };
        match &def.kind {
            KindDefinition::Image(d) => raw.image = Some(d.clone()),
            KindDefinition::Node(d) => raw.node = Some(d.clone()),
            KindDefinition::Python(d) => raw.python = Some(d.clone()),
            KindDefinition::Shell(d) => raw.shell = Some(d.clone()),
            KindDefinition::Sql(d) => raw.sql = Some(d.clone()),
            KindDefinition::Rest(d) => raw.rest = Some(d.clone()),
        }
        raw
    }
}

/// Deserializes `bytes`, reporting type errors with the path of the offending field.
pub(super) fn deserialize_with_path<T: serde::de::DeserializeOwned>(
    format: DefFormat,
    bytes: &[u8],
) -> Result<T> {
    let message = match format {
        DefFormat::Yaml => {
            let de = serde_yaml::Deserializer::from_slice(bytes);
            match serde_path_to_error::deserialize(de) {
                Ok(value) => return Ok(value),
                Err(err) => field_message(&err.path().to_string(), err.inner()),
            }
        }
        DefFormat::Json => {
            let mut de = serde_json::Deserializer::from_slice(bytes);
            match serde_path_to_error::deserialize(&mut de) {
                Ok(value) => return Ok(value),
                Err(err) => field_message(&err.path().to_string(), err.inner()),
            }
        }
    };
    Err(Error::invalid(vec![message]))
}

fn field_message(path: &str, err: &impl std::fmt::Display) -> String {
    if path == "." {
        format!("(root): {err}")
    } else {
        format!("{path}: {err}")
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum EnvVarInput {
    Literal(String),
    Full(EnvVarValue),
}

/// Accepts `NAME: value` as shorthand for `NAME: {value: value}`.
fn deserialize_env_vars<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<TaskEnv, D::Error> {
    let raw = BTreeMap::<String, EnvVarInput>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(name, input)| {
            let value = match input {
                EnvVarInput::Literal(value) => EnvVarValue {
                    value: Some(value),
                    config: None,
                },
                EnvVarInput::Full(value) => value,
            };
            (name, value)
        })
        .collect())
}
