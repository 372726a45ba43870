//! Task kinds and the option maps attached to them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Kind-specific options sent to the remote API alongside a task.
pub type KindOptions = BTreeMap<String, serde_json::Value>;

/// Resolved build configuration: kind options plus explicit overrides.
pub type BuildConfig = BTreeMap<String, serde_json::Value>;

/// The kind of a task, which decides how it is built and executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    /// A prebuilt container image.
    Image,
    /// A JavaScript or TypeScript script.
    Node,
    /// A Python script.
    Python,
    /// A shell script.
    Shell,
    /// A SQL query run against a database resource.
    Sql,
    /// An HTTP request against a REST resource.
    Rest,
}

impl TaskKind {
    /// All kinds, in the order definition blocks are checked.
    pub const ALL: [Self; 6] = [
        Self::Image,
        Self::Node,
        Self::Python,
        Self::Shell,
        Self::Sql,
        Self::Rest,
    ];

    /// The name used for this kind in definition files and API payloads.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Node => "node",
            Self::Python => "python",
            Self::Shell => "shell",
            Self::Sql => "sql",
            Self::Rest => "rest",
        }
    }

    /// Whether deploying a task of this kind requires building an image.
    #[must_use]
    pub const fn needs_building(self) -> bool {
        matches!(self, Self::Node | Self::Python | Self::Shell)
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| crate::Error::UnknownKind {
                kind: s.to_string(),
            })
    }
}
