//! Task runtimes for hangar.
//!
//! A [`Runtime`] knows, for one task kind, which files it runs, where a task's
//! build root and working directory are, and how to write the comment that links
//! a script to its remote task:
//!
//! ```text
//! // Linked to https://app.hangar.dev/t/hello_world [do not edit this line]
//! ```
//!
//! Runtimes are collected in an explicit [`RuntimeRegistry`] that discovery
//! consults by file extension.
//!
//! ```
//! use hangar_runtime::RuntimeRegistry;
//! use std::path::Path;
//!
//! let registry = RuntimeRegistry::default();
//! let runtime = registry.for_file(Path::new("tasks/report.py")).unwrap();
//!
//! let source = "# Linked to https://app.hangar.dev/t/report [do not edit this line]\n";
//! assert_eq!(runtime.slug(source).as_deref(), Some("report"));
//! ```

pub mod comment;
pub mod error;
pub mod fsx;
mod node;
mod python;
mod registry;
mod shell;
mod sql;

pub use error::{Error, Result};
pub use node::NodeRuntime;
pub use python::PythonRuntime;
pub use registry::RuntimeRegistry;
pub use shell::ShellRuntime;
pub use sql::SqlRuntime;

use hangar_core::TaskKind;
use std::fmt;
use std::path::{Path, PathBuf};

/// Per-kind knowledge about how script tasks are laid out and linked.
pub trait Runtime: fmt::Debug + Send + Sync {
    /// The task kind this runtime runs.
    fn kind(&self) -> TaskKind;

    /// File extensions handled, lowercase and without the dot.
    fn extensions(&self) -> &'static [&'static str];

    /// The build root of the task whose entrypoint is `file`.
    ///
    /// # Errors
    ///
    /// Returns an error if a marker file on the way up cannot be read.
    fn root(&self, file: &Path) -> Result<PathBuf>;

    /// The directory the task runs in. Defaults to the root.
    ///
    /// # Errors
    ///
    /// Returns an error if a marker file on the way up cannot be read.
    fn workdir(&self, file: &Path) -> Result<PathBuf> {
        self.root(file)
    }

    /// Line-comment token of the language.
    fn comment_prefix(&self) -> &'static str;

    /// Renders `text` as line comments.
    fn format_comment(&self, text: &str) -> String {
        comment::format_comment(self.comment_prefix(), text)
    }

    /// The comment line linking a script to the task at `task_url`.
    fn linked_comment(&self, task_url: &str) -> String {
        self.format_comment(&comment::link_text(task_url))
    }

    /// The slug from the script's linked comment, if it has one.
    fn slug(&self, source: &str) -> Option<String> {
        comment::slug(source, self.comment_prefix())
    }

    /// Whether the runtime handles files with extension `ext` (lowercase).
    fn handles_extension(&self, ext: &str) -> bool {
        self.extensions().contains(&ext)
    }
}
