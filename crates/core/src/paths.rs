//! Lexical path helpers shared by discovery and definitions.
//!
//! Nothing here touches the filesystem except [`absolute`], which reads the
//! current directory. Symlinks are never resolved, so paths keep the shape the
//! user passed in.

use crate::{Error, Result};
use std::path::{Component, Path, PathBuf};

/// Removes `.` components and folds `..` into its parent, like `filepath.Clean`.
#[must_use]
pub fn clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = matches!(out.components().next_back(), Some(Component::Normal(_)))
                    && out.pop();
                if !popped && !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

/// Makes `path` absolute against the current directory and cleans it.
///
/// # Errors
///
/// Returns an error if `path` is relative and the current directory cannot be read.
pub fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(clean(path));
    }
    let cwd = std::env::current_dir().map_err(|e| Error::io(e, path, "resolve current directory"))?;
    Ok(clean(&cwd.join(path)))
}

/// Renders a relative path with `/` separators, as stored in build configs.
#[must_use]
pub fn to_slash(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
