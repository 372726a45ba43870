use super::DefFormat;
use super::task::deserialize_with_path;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// An app (view) definition read from a `*.app.yaml` / `*.app.json` file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppDefinition {
    /// Unique, stable slug.
    #[serde(default)]
    pub slug: String,
    /// Display name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// Description.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Entry module, relative to the definition file.
    #[serde(default)]
    pub entrypoint: String,
}

impl AppDefinition {
    /// Parses and validates an app definition.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDefinition`] listing every problem found.
    pub fn unmarshal(format: DefFormat, bytes: &[u8]) -> Result<Self> {
        let def: Self = deserialize_with_path(format, bytes)?;

        let mut messages = Vec::new();
        if def.slug.trim().is_empty() {
            messages.push("slug: expected an app slug".to_string());
        }
        if def.entrypoint.trim().is_empty() {
            messages.push("entrypoint: expected an entrypoint".to_string());
        }
        if messages.is_empty() {
            Ok(def)
        } else {
            Err(Error::invalid(messages))
        }
    }

    /// Parses an app definition file's contents, picking the format from its name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReadDefinition`] naming `path` if the document is invalid.
    pub fn parse_file(path: &Path, bytes: &[u8]) -> Result<Self> {
        Self::unmarshal(DefFormat::from_path(path), bytes).map_err(|e| e.with_path(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_yaml_and_json() {
        let yaml = AppDefinition::parse_file(
            Path::new("/repo/app/defn.app.yaml"),
            b"slug: my_app\nname: My App\nentrypoint: foo.js\n",
        )
        .unwrap();
        let json = AppDefinition::parse_file(
            Path::new("/repo/app/defn.app.json"),
            br#"{"slug": "my_app", "name": "My App", "entrypoint": "foo.js"}"#,
        )
        .unwrap();
        assert_eq!(yaml, json);
        assert_eq!(yaml.entrypoint, "foo.js");
    }

    #[test]
    fn test_missing_fields_are_all_reported() {
        let err = AppDefinition::parse_file(Path::new("/repo/x.app.yaml"), b"name: Nameless\n").unwrap_err();
        let Error::ReadDefinition { messages, .. } = err else {
            panic!("expected ReadDefinition");
        };
        assert_eq!(messages.len(), 2);
    }
}
