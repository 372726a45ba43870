//! SQL tasks.

use crate::error::Result;
use crate::{Runtime, fsx};
use hangar_core::TaskKind;
use std::path::{Path, PathBuf};

/// Runtime for SQL tasks: rooted at the query file's directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlRuntime;

impl Runtime for SqlRuntime {
    fn kind(&self) -> TaskKind {
        TaskKind::Sql
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["sql"]
    }

    fn root(&self, file: &Path) -> Result<PathBuf> {
        Ok(fsx::dir_of(file))
    }

    fn comment_prefix(&self) -> &'static str {
        "--"
    }
}
