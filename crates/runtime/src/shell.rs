//! Shell tasks.

use crate::error::Result;
use crate::{Runtime, fsx};
use hangar_core::TaskKind;
use std::path::{Path, PathBuf};

/// Runtime for shell tasks: rooted at the script's directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellRuntime;

impl Runtime for ShellRuntime {
    fn kind(&self) -> TaskKind {
        TaskKind::Shell
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["sh"]
    }

    fn root(&self, file: &Path) -> Result<PathBuf> {
        Ok(fsx::dir_of(file))
    }

    fn comment_prefix(&self) -> &'static str {
        "#"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linked_comment_after_shebang() {
        let source = format!(
            "#!/bin/bash\n{}\n\necho \"Hello World!\"\n",
            ShellRuntime.linked_comment("https://app.hangar.dev/t/shell_simple")
        );
        assert_eq!(ShellRuntime.slug(&source).as_deref(), Some("shell_simple"));
        assert_eq!(ShellRuntime.root(Path::new("/repo/ops/run.sh")).unwrap(), PathBuf::from("/repo/ops"));
    }
}
