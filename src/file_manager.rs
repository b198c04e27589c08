//! # File Management Module
//!
//! Tree traversal and the extension-based scope filter.
//!
//! ## Responsibilities:
//! - `TreeWalker`: lazy, single-pass iterator of `DirectoryEntry` values under
//!   an input root. Order is stable (sorted by file name) and every directory
//!   is yielded before its children, so a directory's mirror can be created
//!   before any file is written into it
//! - `FileManager::is_in_scope()`: directories are always in scope, files only
//!   with a `.jpg`/`.jpeg` extension (case-insensitive)
//! - Size formatting and reduction helpers for reports
//!
//! Scope is decided by extension only. The real encoded format is detected
//! later from content by the codec.
//!
//! ## Example:
//! ```rust,no_run
//! use jpeg_mirror::file_manager::{FileManager, TreeWalker};
//!
//! for entry in TreeWalker::new("/photos") {
//!     let entry = entry?;
//!     if FileManager::is_in_scope(&entry) {
//!         println!("{}", entry.relative_path.display());
//!     }
//! }
//! # Ok::<(), walkdir::Error>(())
//! ```

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Extensions accepted by the scope filter (lower-case, without dot)
pub const JPEG_EXTENSIONS: &[&str] = &["jpg", "jpeg"];

/// Kind of filesystem node met during a walk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    File,
}

/// One filesystem node found under the input root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    /// Path as reached from the walk root
    pub path: PathBuf,
    /// Path relative to the walk root
    pub relative_path: PathBuf,
    pub kind: EntryKind,
    /// Lower-cased extension, if any
    pub extension: Option<String>,
}

impl DirectoryEntry {
    /// Build an entry for `path` found under `root`
    pub fn new(root: &Path, path: &Path, kind: EntryKind) -> Self {
        let relative_path = path.strip_prefix(root).unwrap_or(path).to_path_buf();
        let extension = match kind {
            EntryKind::File => path
                .extension()
                .map(|ext| ext.to_string_lossy().to_lowercase()),
            EntryKind::Directory => None,
        };

        Self {
            path: path.to_path_buf(),
            relative_path,
            kind,
            extension,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    /// File name without its extension
    pub fn base_name(&self) -> String {
        self.path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Lazy recursive walk over a root directory.
///
/// The root itself is not yielded. Symbolic links are not followed. Subtrees
/// under an excluded path are pruned without being read.
pub struct TreeWalker {
    root: PathBuf,
    excluded: Option<PathBuf>,
    inner: walkdir::IntoIter,
}

impl TreeWalker {
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        let inner = WalkDir::new(&root)
            .min_depth(1)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter();

        Self {
            root,
            excluded: None,
            inner,
        }
    }

    /// Prune `path` and everything below it from the walk
    pub fn excluding(mut self, path: impl AsRef<Path>) -> Self {
        self.excluded = Some(path.as_ref().to_path_buf());
        self
    }
}

impl Iterator for TreeWalker {
    type Item = Result<DirectoryEntry, walkdir::Error>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.inner.next()? {
                Ok(entry) => entry,
                Err(e) => return Some(Err(e)),
            };

            if let Some(ref excluded) = self.excluded {
                if entry.path().starts_with(excluded) {
                    if entry.file_type().is_dir() {
                        self.inner.skip_current_dir();
                    }
                    continue;
                }
            }

            let kind = if entry.file_type().is_dir() {
                EntryKind::Directory
            } else {
                EntryKind::File
            };
            return Some(Ok(DirectoryEntry::new(&self.root, entry.path(), kind)));
        }
    }
}

/// Stateless helpers for scope decisions and reporting
pub struct FileManager;

impl FileManager {
    /// Scope filter: directories always pass, files only as JPEG by extension
    pub fn is_in_scope(entry: &DirectoryEntry) -> bool {
        match entry.kind {
            EntryKind::Directory => true,
            EntryKind::File => entry
                .extension
                .as_deref()
                .map(Self::is_jpeg_extension)
                .unwrap_or(false),
        }
    }

    fn is_jpeg_extension(ext: &str) -> bool {
        JPEG_EXTENSIONS.contains(&ext)
    }

    /// True when `dir` has no entries (or does not exist)
    pub fn is_empty_dir(dir: &Path) -> std::io::Result<bool> {
        match std::fs::read_dir(dir) {
            Ok(mut entries) => Ok(entries.next().is_none()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(true),
            Err(e) => Err(e),
        }
    }

    /// Get human-readable file size
    pub fn format_size(size: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = size as f64;
        let mut unit_index = 0;

        while size >= 1024.0 && unit_index < UNITS.len() - 1 {
            size /= 1024.0;
            unit_index += 1;
        }

        if unit_index == 0 {
            format!("{} {}", size as u64, UNITS[unit_index])
        } else {
            format!("{:.2} {}", size, UNITS[unit_index])
        }
    }

    /// Calculate percentage reduction
    pub fn calculate_reduction(original_size: u64, new_size: u64) -> f64 {
        if original_size == 0 {
            0.0
        } else {
            ((original_size as f64 - new_size as f64) / original_size as f64) * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn file_entry(name: &str) -> DirectoryEntry {
        DirectoryEntry::new(Path::new("/in"), &Path::new("/in").join(name), EntryKind::File)
    }

    #[test]
    fn test_scope_filter_by_extension() {
        assert!(FileManager::is_in_scope(&file_entry("a.jpg")));
        assert!(FileManager::is_in_scope(&file_entry("a.JPEG")));
        assert!(FileManager::is_in_scope(&file_entry("deep/b.JpG")));
        assert!(!FileManager::is_in_scope(&file_entry("a.png")));
        assert!(!FileManager::is_in_scope(&file_entry("notes.txt")));
        assert!(!FileManager::is_in_scope(&file_entry("README")));
        assert!(!FileManager::is_in_scope(&file_entry("jpg")));

        let dir = DirectoryEntry::new(Path::new("/in"), Path::new("/in/album.jpg.d"), EntryKind::Directory);
        assert!(FileManager::is_in_scope(&dir));
        assert_eq!(dir.extension, None);
    }

    #[test]
    fn test_entry_fields() {
        let entry = file_entry("2023/trip/IMG_001.JPG");
        assert_eq!(entry.relative_path, PathBuf::from("2023/trip/IMG_001.JPG"));
        assert_eq!(entry.extension.as_deref(), Some("jpg"));
        assert_eq!(entry.base_name(), "IMG_001");
        assert!(!entry.is_dir());
    }

    #[test]
    fn test_walker_yields_directories_before_children() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("b/inner")).unwrap();
        fs::create_dir_all(root.join("a")).unwrap();
        fs::write(root.join("b/inner/x.jpg"), b"x").unwrap();
        fs::write(root.join("a/y.jpg"), b"y").unwrap();
        fs::write(root.join("top.txt"), b"t").unwrap();

        let relative: Vec<PathBuf> = TreeWalker::new(root)
            .map(|e| e.unwrap().relative_path)
            .collect();

        assert_eq!(
            relative,
            vec![
                PathBuf::from("a"),
                PathBuf::from("a/y.jpg"),
                PathBuf::from("b"),
                PathBuf::from("b/inner"),
                PathBuf::from("b/inner/x.jpg"),
                PathBuf::from("top.txt"),
            ]
        );
    }

    #[test]
    fn test_walker_prunes_excluded_subtree() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("out/nested")).unwrap();
        fs::write(root.join("out/nested/z.jpg"), b"z").unwrap();
        fs::write(root.join("keep.jpg"), b"k").unwrap();

        let relative: Vec<PathBuf> = TreeWalker::new(root)
            .excluding(root.join("out"))
            .map(|e| e.unwrap().relative_path)
            .collect();

        assert_eq!(relative, vec![PathBuf::from("keep.jpg")]);
    }

    #[test]
    fn test_is_empty_dir() {
        let temp = TempDir::new().unwrap();
        assert!(FileManager::is_empty_dir(temp.path()).unwrap());
        assert!(FileManager::is_empty_dir(&temp.path().join("missing")).unwrap());
        fs::write(temp.path().join("f"), b"").unwrap();
        assert!(!FileManager::is_empty_dir(temp.path()).unwrap());
    }

    #[test]
    fn test_format_size_and_reduction() {
        assert_eq!(FileManager::format_size(512), "512 B");
        assert_eq!(FileManager::format_size(1536), "1.50 KB");
        assert_eq!(FileManager::format_size(5 * 1024 * 1024), "5.00 MB");
        assert_eq!(FileManager::calculate_reduction(0, 10), 0.0);
        assert_eq!(FileManager::calculate_reduction(200, 50), 75.0);
    }
}
