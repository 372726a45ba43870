//! Python tasks.

use crate::error::Result;
use crate::{Runtime, fsx};
use hangar_core::TaskKind;
use std::path::{Path, PathBuf};

/// Runtime for Python tasks: rooted at the nearest `requirements.txt`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PythonRuntime;

impl Runtime for PythonRuntime {
    fn kind(&self) -> TaskKind {
        TaskKind::Python
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["py"]
    }

    fn root(&self, file: &Path) -> Result<PathBuf> {
        Ok(fsx::find(file, "requirements.txt").unwrap_or_else(|| fsx::dir_of(file)))
    }

    fn comment_prefix(&self) -> &'static str {
        "#"
    }
}
