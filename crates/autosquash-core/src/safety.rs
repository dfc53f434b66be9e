//! Path validation for hunks about to be written into the working tree.

use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

/// Check that `path` names a location inside `root`.
///
/// Rejects absolute paths, paths whose `.`/`..` components climb above the
/// root, and paths whose nearest existing ancestor resolves (through
/// symlinks) outside the root. Returns the normalized relative path.
///
/// # Errors
/// Returns `UnsafePath` describing the violation.
pub fn validate_path(root: &Path, path: &str) -> Result<PathBuf> {
    let unsafe_path = |reason: &str| Error::UnsafePath {
        path: PathBuf::from(path),
        reason: reason.to_string(),
    };

    if path.is_empty() {
        return Err(unsafe_path("empty path"));
    }
    let candidate = Path::new(path);
    if candidate.is_absolute() || candidate.has_root() {
        return Err(unsafe_path("absolute path"));
    }

    let mut normalized = PathBuf::new();
    for component in candidate.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    return Err(unsafe_path("escapes repository root"));
                }
            }
            Component::Normal(part) => normalized.push(part),
            Component::RootDir | Component::Prefix(_) => {
                return Err(unsafe_path("absolute path"));
            }
        }
    }
    if normalized.as_os_str().is_empty() {
        return Err(unsafe_path("names the repository root"));
    }

    let root = root.canonicalize()?;
    let mut existing = root.join(&normalized);
    while !existing.exists() {
        if !existing.pop() {
            break;
        }
    }
    let resolved = existing.canonicalize()?;
    if !resolved.starts_with(&root) {
        return Err(unsafe_path("resolves outside repository root"));
    }

    Ok(normalized)
}

/// Validate every path, stopping at the first violation.
///
/// # Errors
/// Returns `UnsafePath` for the first offending path.
pub fn validate_paths<'a>(root: &Path, paths: impl IntoIterator<Item = &'a str>) -> Result<()> {
    paths
        .into_iter()
        .try_for_each(|p| validate_path(root, p).map(|_| ()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn assert_rejected(root: &Path, path: &str) {
        assert!(
            matches!(validate_path(root, path), Err(Error::UnsafePath { .. })),
            "{path} should be rejected"
        );
    }

    #[test]
    fn test_accepts_nested_and_missing_paths() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join("src")).unwrap();

        assert_eq!(
            validate_path(temp.path(), "src/lib.rs").unwrap(),
            PathBuf::from("src/lib.rs")
        );
        assert_eq!(
            validate_path(temp.path(), "./new/dir/../file.txt").unwrap(),
            PathBuf::from("new/file.txt")
        );
    }

    #[test]
    fn test_rejects_absolute_and_traversal() {
        let temp = TempDir::new().unwrap();
        assert_rejected(temp.path(), "/etc/passwd");
        assert_rejected(temp.path(), "../outside.txt");
        assert_rejected(temp.path(), "src/../../outside.txt");
        assert_rejected(temp.path(), "");
        assert_rejected(temp.path(), "a/..");
    }

    #[cfg(unix)]
    #[test]
    fn test_rejects_symlink_escape() {
        let outside = TempDir::new().unwrap();
        let temp = TempDir::new().unwrap();
        std::os::unix::fs::symlink(outside.path(), temp.path().join("link")).unwrap();

        assert_rejected(temp.path(), "link/file.txt");
    }

    #[test]
    fn test_validate_paths_stops_at_first_violation() {
        let temp = TempDir::new().unwrap();
        assert!(validate_paths(temp.path(), ["a.txt", "b/c.txt"]).is_ok());
        assert!(validate_paths(temp.path(), ["a.txt", "../x", "b.txt"]).is_err());
    }
}
