//! Explicit registry of runtimes, keyed by file extension.

use crate::error::{Error, Result};
use crate::{NodeRuntime, PythonRuntime, Runtime, ShellRuntime, SqlRuntime};
use hangar_core::TaskKind;
use std::path::Path;
use std::sync::Arc;

/// The runtimes known to discovery, in registration order.
///
/// Built once and shared (usually behind an `Arc`) by every discoverer. When two
/// runtimes claim the same extension, the first registered wins.
#[derive(Debug, Clone)]
pub struct RuntimeRegistry {
    runtimes: Vec<Arc<dyn Runtime>>,
}

impl Default for RuntimeRegistry {
    fn default() -> Self {
        Self::empty()
            .with(NodeRuntime)
            .with(PythonRuntime)
            .with(ShellRuntime)
            .with(SqlRuntime)
    }
}

impl RuntimeRegistry {
    /// A registry with no runtimes.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            runtimes: Vec::new(),
        }
    }

    /// Adds a runtime.
    #[must_use]
    pub fn with(mut self, runtime: impl Runtime + 'static) -> Self {
        self.register(runtime);
        self
    }

    /// Adds a runtime.
    pub fn register(&mut self, runtime: impl Runtime + 'static) {
        self.runtimes.push(Arc::new(runtime));
    }

    /// The runtime handling `path`'s extension, whatever its kind.
    #[must_use]
    pub fn for_file(&self, path: &Path) -> Option<&dyn Runtime> {
        let ext = extension(path)?;
        self.runtimes
            .iter()
            .find(|runtime| runtime.handles_extension(&ext))
            .map(AsRef::as_ref)
    }

    /// The runtime that runs `path` as a task of `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedRuntime`] if no registered runtime of `kind`
    /// handles the file's extension.
    pub fn lookup(&self, path: &Path, kind: TaskKind) -> Result<&dyn Runtime> {
        let found = extension(path).and_then(|ext| {
            self.runtimes
                .iter()
                .find(|runtime| runtime.kind() == kind && runtime.handles_extension(&ext))
        });
        match found {
            Some(runtime) => Ok(runtime.as_ref()),
            None => Err(Error::unsupported(path, Some(kind))),
        }
    }

    /// Every registered runtime.
    pub fn iter(&self) -> impl Iterator<Item = &dyn Runtime> {
        self.runtimes.iter().map(AsRef::as_ref)
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
}
