//! # Path Resolution Module
//!
//! Maps paths under the input root onto the output root.
//!
//! `mirror` is pure: it never touches the filesystem and gives the same result
//! for the same arguments. Creating the destination's ancestors is a separate
//! step (`ensure_parent_dirs`) done right before writing.

use crate::error::MirrorError;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Path mapping between the input tree and its mirror
pub struct PathResolver;

impl PathResolver {
    /// Destination of `entry_path` under `output_root`.
    ///
    /// `output_root / (entry_path relative to input_root)`. The input root
    /// itself maps to the output root.
    pub fn mirror(input_root: &Path, output_root: &Path, entry_path: &Path) -> Result<PathBuf, MirrorError> {
        let relative = entry_path
            .strip_prefix(input_root)
            .map_err(|_| MirrorError::NotContained {
                path: entry_path.to_path_buf(),
                root: input_root.to_path_buf(),
            })?;

        let destination = if relative.as_os_str().is_empty() {
            output_root.to_path_buf()
        } else {
            output_root.join(relative)
        };
        debug!("Resolved output path: {} -> {}", entry_path.display(), destination.display());
        Ok(destination)
    }

    /// True when `path` is `root` or lies below it (component-wise)
    pub fn is_within(path: &Path, root: &Path) -> bool {
        path.starts_with(root)
    }

    /// Path of `nested` expressed under `root` as spelled by the caller.
    ///
    /// Both are canonicalized to compare them, so `./out` and `/abs/in/out`
    /// match. `None` when `nested` is not inside `root` or cannot be resolved.
    pub fn nested_under(root: &Path, nested: &Path) -> Option<PathBuf> {
        let canonical_root = root.canonicalize().ok()?;
        let canonical_nested = nested.canonicalize().ok()?;
        if !Self::is_within(&canonical_nested, &canonical_root) {
            return None;
        }
        let relative = canonical_nested.strip_prefix(&canonical_root).ok()?;
        Some(root.join(relative))
    }

    /// Create the parent directories of `path` if needed
    pub async fn ensure_parent_dirs(path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_mirror_preserves_relative_path() {
        let dest = PathResolver::mirror(
            Path::new("/photos"),
            Path::new("/out/converted"),
            Path::new("/photos/2023/trip/IMG_1.JPG"),
        )
        .unwrap();
        assert_eq!(dest, PathBuf::from("/out/converted/2023/trip/IMG_1.JPG"));
    }

    #[test]
    fn test_mirror_root_is_output_root() {
        let dest = PathResolver::mirror(Path::new("/photos"), Path::new("/out"), Path::new("/photos")).unwrap();
        assert_eq!(dest, PathBuf::from("/out"));
    }

    #[test]
    fn test_mirror_rejects_outside_path() {
        let err = PathResolver::mirror(Path::new("/photos"), Path::new("/out"), Path::new("/photoshop/a.jpg"))
            .unwrap_err();
        assert_eq!(
            err,
            MirrorError::NotContained {
                path: PathBuf::from("/photoshop/a.jpg"),
                root: PathBuf::from("/photos"),
            }
        );
    }

    #[test]
    fn test_mirror_is_idempotent() {
        let args = (Path::new("in"), Path::new("out"), Path::new("in/a/b.jpeg"));
        assert_eq!(
            PathResolver::mirror(args.0, args.1, args.2),
            PathResolver::mirror(args.0, args.1, args.2)
        );
    }

    #[test]
    fn test_is_within_is_component_wise() {
        assert!(PathResolver::is_within(Path::new("/in/out/x"), Path::new("/in/out")));
        assert!(PathResolver::is_within(Path::new("/in"), Path::new("/in")));
        assert!(!PathResolver::is_within(Path::new("/in/outside"), Path::new("/in/out")));
    }

    #[test]
    fn test_nested_under() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("in");
        let nested = root.join("out");
        std::fs::create_dir_all(&nested).unwrap();

        assert_eq!(PathResolver::nested_under(&root, &nested), Some(root.join("out")));
        assert_eq!(PathResolver::nested_under(&nested, &root), None);
    }

    #[tokio::test]
    async fn test_ensure_parent_dirs() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("a/b/c/photo.jpg");
        PathResolver::ensure_parent_dirs(&file).await.unwrap();
        assert!(temp.path().join("a/b/c").is_dir());
        PathResolver::ensure_parent_dirs(&file).await.unwrap();
    }
}
