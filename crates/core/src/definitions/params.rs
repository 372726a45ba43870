use crate::api::{ConstraintOption, Parameter, ParameterConstraints};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Parameter type as written in definition files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    /// Single-line text.
    Shorttext,
    /// Multi-line text.
    Longtext,
    /// SQL text with an editor.
    Sql,
    /// True/false.
    Boolean,
    /// File upload.
    Upload,
    /// Whole number.
    Integer,
    /// Decimal number.
    Float,
    /// Calendar date.
    Date,
    /// Date and time.
    Datetime,
    /// Reference to a config variable.
    Configvar,
}

impl ParamType {
    /// The API `(type, component)` pair for this parameter type.
    #[must_use]
    pub const fn api_type(self) -> (&'static str, &'static str) {
        match self {
            Self::Shorttext => ("string", ""),
            Self::Longtext => ("string", "textarea"),
            Self::Sql => ("string", "editor-sql"),
            Self::Boolean => ("boolean", ""),
            Self::Upload => ("upload", ""),
            Self::Integer => ("integer", ""),
            Self::Float => ("float", ""),
            Self::Date => ("date", ""),
            Self::Datetime => ("datetime", ""),
            Self::Configvar => ("configvar", ""),
        }
    }

    /// Maps an API `(type, component)` pair back to a parameter type.
    #[must_use]
    pub fn from_api(kind: &str, component: &str) -> Option<Self> {
        Some(match (kind, component) {
            ("string", "textarea") => Self::Longtext,
            ("string", "editor-sql") => Self::Sql,
            ("string", _) => Self::Shorttext,
            ("boolean", _) => Self::Boolean,
            ("upload", _) => Self::Upload,
            ("integer", _) => Self::Integer,
            ("float", _) => Self::Float,
            ("date", _) => Self::Date,
            ("datetime", _) => Self::Datetime,
            ("configvar", _) => Self::Configvar,
            _ => return None,
        })
    }
}

/// One allowed value of a parameter: a bare value or a labeled one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionDefinition {
    /// Value with a display label.
    Labeled {
        /// Display label.
        label: String,
        /// The value.
        value: Value,
    },
    /// Value displayed as itself.
    Plain(Value),
}

/// A task parameter as written in definition files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterDefinition {
    /// Display name.
    pub name: String,
    /// Slug used to reference the value.
    pub slug: String,
    /// Value type.
    #[serde(rename = "type")]
    pub kind: ParamType,
    /// Description.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Default value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// `Some(false)` marks the parameter optional; parameters are required otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    /// Allowed values.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<OptionDefinition>,
    /// Regular expression the value must match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,
}

impl ParameterDefinition {
    /// Converts to the API representation.
    #[must_use]
    pub fn to_api(&self) -> Parameter {
        let (kind, component) = self.kind.api_type();
        Parameter {
            name: self.name.clone(),
            slug: self.slug.clone(),
            kind: kind.to_string(),
            desc: self.description.clone(),
            component: component.to_string(),
            default: self.default.clone(),
            constraints: ParameterConstraints {
                optional: self.required == Some(false),
                regex: self.regex.clone().unwrap_or_default(),
                options: self
                    .options
                    .iter()
                    .map(|option| match option {
                        OptionDefinition::Labeled { label, value } => ConstraintOption {
                            label: label.clone(),
                            value: value.clone(),
                        },
                        OptionDefinition::Plain(value) => ConstraintOption {
                            label: String::new(),
                            value: value.clone(),
                        },
                    })
                    .collect(),
            },
        }
    }

    /// Converts from the API representation.
    ///
    /// # Errors
    ///
    /// Returns an error if the parameter's type and component have no definition equivalent.
    pub fn from_api(param: &Parameter) -> Result<Self> {
        let kind = ParamType::from_api(&param.kind, &param.component).ok_or_else(|| {
            Error::invalid(vec![format!(
                "parameters.{}: unsupported parameter type '{}'",
                param.slug, param.kind
            )])
        })?;

        Ok(Self {
            name: param.name.clone(),
            slug: param.slug.clone(),
            kind,
            description: param.desc.clone(),
            default: param.default.clone(),
            required: param.constraints.optional.then_some(false),
            options: param
                .constraints
                .options
                .iter()
                .map(|option| {
                    if option.label.is_empty() {
                        OptionDefinition::Plain(option.value.clone())
                    } else {
                        OptionDefinition::Labeled {
                            label: option.label.clone(),
                            value: option.value.clone(),
                        }
                    }
                })
                .collect(),
            regex: Some(param.constraints.regex.clone()).filter(|regex| !regex.is_empty()),
        })
    }
}
