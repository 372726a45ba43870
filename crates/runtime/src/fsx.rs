//! Marker-file lookup.

use std::path::{Path, PathBuf};

/// Returns the nearest directory at or above `start` that contains `marker`.
///
/// `start` may be a file; the search then begins at its parent directory.
#[must_use]
pub fn find(start: &Path, marker: &str) -> Option<PathBuf> {
    let dir = if start.is_dir() { start } else { start.parent()? };
    dir.ancestors()
        .find(|candidate| candidate.join(marker).is_file())
        .map(Path::to_path_buf)
}

/// The directory containing `file`, or `file` itself if it has no parent.
#[must_use]
pub fn dir_of(file: &Path) -> PathBuf {
    file.parent().map_or_else(|| file.to_path_buf(), Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_find_nearest_marker() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("a/b/c")).unwrap();
        fs::write(root.join("requirements.txt"), "").unwrap();
        fs::write(root.join("a/b/requirements.txt"), "").unwrap();
        fs::write(root.join("a/b/c/main.py"), "").unwrap();

        assert_eq!(
            find(&root.join("a/b/c/main.py"), "requirements.txt"),
            Some(root.join("a/b"))
        );
        assert_eq!(find(&root.join("a"), "requirements.txt"), Some(root.to_path_buf()));
    }

    #[test]
    fn test_find_ignores_directories_named_like_marker() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("x/package.json")).unwrap();
        fs::write(tmp.path().join("x/main.js"), "").unwrap();
        let found = find(&tmp.path().join("x/main.js"), "package.json");
        assert_ne!(found, Some(tmp.path().join("x")));
    }

    #[test]
    fn test_dir_of() {
        assert_eq!(dir_of(Path::new("/repo/main.sql")), PathBuf::from("/repo"));
    }
}
