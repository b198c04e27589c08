//! # Duplicate Auditor
//!
//! Read-only pass over an input tree that finds JPEG files sharing a base name
//! (file name without extension) in different directories.
//!
//! ## Output
//! - total JPEG files (by extension, same scope filter as transcoding)
//! - number of distinct base names
//! - every base name occurring more than once, with all its paths in walk
//!   order, sorted by descending count (ties keep first-encountered order)
//!
//! With content comparison enabled each path of a duplicate group is hashed
//! (SHA-256) so identical copies can be told apart from name collisions.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn, Instrument};

use crate::context::RunContext;
use crate::error::TranscodeError;
use crate::file_manager::{FileManager, TreeWalker};

/// Paths sharing one base name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    pub base_name: String,
    pub paths: Vec<PathBuf>,
    /// Hex SHA-256 per path, same order as `paths`; `None` entries could not be read
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_digests: Option<Vec<Option<String>>>,
}

impl DuplicateGroup {
    pub fn count(&self) -> usize {
        self.paths.len()
    }

    pub fn is_duplicate(&self) -> bool {
        self.count() > 1
    }

    /// Whether all members have the same content.
    ///
    /// `None` when the group was not hashed or any member could not be read.
    pub fn identical_content(&self) -> Option<bool> {
        let digests = self
            .content_digests
            .as_ref()?
            .iter()
            .map(Option::as_deref)
            .collect::<Option<Vec<&str>>>()?;
        Some(digests.windows(2).all(|pair| pair[0] == pair[1]))
    }
}

/// Result of an audit
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditReport {
    pub total_jpegs: usize,
    pub unique_base_names: usize,
    pub duplicates: Vec<DuplicateGroup>,
    pub cancelled: bool,
    pub duration_seconds: f64,
}

impl AuditReport {
    pub fn duplicate_group_count(&self) -> usize {
        self.duplicates.len()
    }

    /// Console rendering: summary lines plus one row per path
    pub fn format_table(&self, input_root: &Path) -> String {
        let mut out = String::new();
        out.push_str("JPEG duplicate audit\n");
        out.push_str(&format!("Directory: {}\n", input_root.display()));
        out.push_str(&format!("Total JPEG files: {}\n", self.total_jpegs));
        out.push_str(&format!("Unique base names: {}\n", self.unique_base_names));
        out.push_str(&format!("Duplicate base names: {}\n", self.duplicate_group_count()));
        out.push_str(&format!("Elapsed: {:.2}s\n", self.duration_seconds));
        if self.cancelled {
            out.push_str("(audit cancelled, results are partial)\n");
        }

        if self.duplicates.is_empty() {
            out.push_str("\nNo duplicate base names found.\n");
            return out;
        }

        let name_width = self
            .duplicates
            .iter()
            .map(|g| g.base_name.chars().count())
            .max()
            .unwrap_or(0)
            .max("Base name".len());

        out.push_str(&format!("\n{:<width$}  {:>5}  {}\n", "Base name", "Count", "Path", width = name_width));
        out.push_str(&format!("{}\n", "-".repeat(name_width + 15)));

        for group in &self.duplicates {
            let content = match (group.identical_content(), &group.content_digests) {
                (Some(true), _) => "  [same content]",
                (Some(false), _) => "  [content differs]",
                (None, Some(_)) => "  [content unknown]",
                (None, None) => "",
            };
            for (i, path) in group.paths.iter().enumerate() {
                let shown = path.strip_prefix(input_root).unwrap_or(path);
                if i == 0 {
                    out.push_str(&format!(
                        "{:<width$}  {:>5}  {}{}\n",
                        group.base_name,
                        group.count(),
                        shown.display(),
                        content,
                        width = name_width
                    ));
                } else {
                    out.push_str(&format!("{:<width$}  {:>5}  {}\n", "", "", shown.display(), width = name_width));
                }
            }
        }
        out
    }
}

/// Groups JPEG files by base name
#[derive(Debug, Default, Clone)]
pub struct DuplicateAuditor {
    compare_content: bool,
}

impl DuplicateAuditor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also hash the members of each duplicate group
    pub fn with_content_comparison(mut self, compare_content: bool) -> Self {
        self.compare_content = compare_content;
        self
    }

    /// Audit `input_root`. Never writes to the filesystem.
    pub async fn audit(&self, input_root: &Path, ctx: &mut RunContext) -> Result<AuditReport, TranscodeError> {
        let span = ctx.span().clone();
        self.audit_inner(input_root, ctx).instrument(span).await
    }

    async fn audit_inner(&self, input_root: &Path, ctx: &mut RunContext) -> Result<AuditReport, TranscodeError> {
        let start_time = Instant::now();

        match tokio::fs::metadata(input_root).await {
            Ok(metadata) if metadata.is_dir() => {}
            Ok(_) => return Err(TranscodeError::InputRootNotDirectory(input_root.to_path_buf())),
            Err(_) => return Err(TranscodeError::InputRootMissing(input_root.to_path_buf())),
        }
        info!("Auditing JPEG base names in {}", input_root.display());

        // Insertion-ordered groups: index of each base name into `groups`
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut groups: Vec<DuplicateGroup> = Vec::new();
        let mut total_jpegs = 0;
        let mut cancelled = false;

        for entry in TreeWalker::new(input_root) {
            if ctx.should_stop() {
                warn!("Audit cancelled, results are partial");
                cancelled = true;
                break;
            }

            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(cause = %e, "Skipping unreadable entry");
                    continue;
                }
            };
            if entry.is_dir() || !FileManager::is_in_scope(&entry) {
                continue;
            }

            total_jpegs += 1;
            let base_name = entry.base_name();
            match index.get(&base_name).copied() {
                Some(i) => groups[i].paths.push(entry.path),
                None => {
                    index.insert(base_name.clone(), groups.len());
                    groups.push(DuplicateGroup {
                        base_name,
                        paths: vec![entry.path],
                        content_digests: None,
                    });
                }
            }
        }

        let unique_base_names = groups.len();
        let mut duplicates: Vec<DuplicateGroup> = groups.into_iter().filter(DuplicateGroup::is_duplicate).collect();
        // Stable sort keeps walk order among equal counts
        duplicates.sort_by(|a, b| b.count().cmp(&a.count()));

        if self.compare_content && !cancelled {
            for group in &mut duplicates {
                group.content_digests = Some(hash_paths(&group.paths).await);
            }
        }

        debug!(
            "Audit found {} JPEG files, {} unique base names, {} duplicated",
            total_jpegs,
            unique_base_names,
            duplicates.len()
        );

        Ok(AuditReport {
            total_jpegs,
            unique_base_names,
            duplicates,
            cancelled,
            duration_seconds: start_time.elapsed().as_secs_f64(),
        })
    }
}

/// Hex SHA-256 of each file, `None` for files that cannot be read
async fn hash_paths(paths: &[PathBuf]) -> Vec<Option<String>> {
    let mut digests = Vec::with_capacity(paths.len());
    for path in paths {
        match tokio::fs::read(path).await {
            Ok(bytes) => digests.push(Some(hex::encode(Sha256::digest(&bytes)))),
            Err(e) => {
                warn!(source = %path.display(), cause = %e, "Failed to hash file");
                digests.push(None);
            }
        }
    }
    digests
}
