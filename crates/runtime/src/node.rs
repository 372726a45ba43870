//! JavaScript and TypeScript tasks.

use crate::error::{Error, Result};
use crate::{Runtime, fsx};
use glob::Pattern;
use hangar_core::{TaskKind, paths};
use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

const PACKAGE_JSON: &str = "package.json";

/// Runtime for Node tasks.
///
/// The workdir is the nearest directory with a `package.json`. The root is the
/// nearest enclosing npm/yarn workspace root whose `workspaces` patterns
/// include the workdir, so monorepo packages build with their siblings;
/// otherwise it is the workdir.
#[derive(Debug, Clone, Copy, Default)]
pub struct NodeRuntime;

#[derive(Debug, Default, Deserialize)]
struct PackageJson {
    #[serde(default)]
    workspaces: Option<Value>,
}

impl PackageJson {
    fn read(dir: &Path) -> Result<Self> {
        let path = dir.join(PACKAGE_JSON);
        let contents = fs::read(&path).map_err(|e| Error::io(e, &path, "read package.json"))?;
        serde_json::from_slice(&contents).map_err(|e| Error::InvalidPackageJson {
            path,
            message: e.to_string(),
        })
    }

    /// Workspace patterns, from either `"workspaces": [...]` or
    /// `"workspaces": {"packages": [...]}`.
    fn workspace_patterns(&self) -> Vec<&str> {
        let patterns = match &self.workspaces {
            Some(Value::Array(patterns)) => patterns,
            Some(Value::Object(config)) => match config.get("packages") {
                Some(Value::Array(patterns)) => patterns,
                _ => return Vec::new(),
            },
            _ => return Vec::new(),
        };
        patterns.iter().filter_map(Value::as_str).collect()
    }

    /// Whether `dir`, a workspace root, includes the package at `workdir`.
    fn includes(&self, dir: &Path, workdir: &Path) -> bool {
        let patterns = self.workspace_patterns();
        if patterns.is_empty() {
            return false;
        }
        let Ok(rel) = workdir.strip_prefix(dir) else {
            return false;
        };
        if rel.as_os_str().is_empty() {
            return true;
        }
        let rel = paths::to_slash(rel);
        let matches = |pattern: &str| {
            let pattern = pattern.trim_start_matches("./").trim_end_matches('/');
            Pattern::new(pattern).is_ok_and(|p| p.matches(&rel))
        };
        let (excluded, included): (Vec<&str>, Vec<&str>) =
            patterns.into_iter().partition(|p| p.starts_with('!'));
        included.into_iter().any(|p| matches(p))
            && !excluded.into_iter().any(|p| matches(&p[1..]))
    }
}

impl Runtime for NodeRuntime {
    fn kind(&self) -> TaskKind {
        TaskKind::Node
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["js", "jsx", "mjs", "cjs", "ts", "tsx"]
    }

    fn root(&self, file: &Path) -> Result<PathBuf> {
        let workdir = self.workdir(file)?;
        for dir in workdir.ancestors() {
            if !dir.join(PACKAGE_JSON).is_file() {
                continue;
            }
            if PackageJson::read(dir)?.includes(dir, &workdir) {
                tracing::debug!(root = %dir.display(), "Found package.json with workspaces");
                return Ok(dir.to_path_buf());
            }
        }
        Ok(workdir)
    }

    fn workdir(&self, file: &Path) -> Result<PathBuf> {
        Ok(fsx::find(file, PACKAGE_JSON).unwrap_or_else(|| fsx::dir_of(file)))
    }

    fn comment_prefix(&self) -> &'static str {
        "//"
    }
}
