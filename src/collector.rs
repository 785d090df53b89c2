// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Directory walking and per-file metadata collection

use chrono::{DateTime, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::owner::OwnerLookup;
use crate::{Result, TreeAuditError};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// One file observed during a walk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub name: String,
    pub path: PathBuf,
    /// Extension including the leading dot, empty when there is none
    pub file_type: String,
    pub size_bytes: u64,
    pub created: Option<NaiveDate>,
    pub modified: Option<NaiveDate>,
    pub owner: String,
}

impl FileRecord {
    /// Size in megabytes, rounded to two decimals
    pub fn size_mb(&self) -> f64 {
        bytes_to_mb(self.size_bytes)
    }

    /// Build a record from filesystem metadata
    pub fn from_metadata(path: &Path, meta: &std::fs::Metadata, owner: String) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let modified = meta.modified().ok();
        // Some filesystems have no birth time; fall back to mtime
        let created = meta.created().ok().or(modified);

        Self {
            name,
            path: path.to_path_buf(),
            file_type: extension_of(path),
            size_bytes: meta.len(),
            created: created.map(to_date),
            modified: modified.map(to_date),
            owner,
        }
    }
}

/// Convert a byte count to megabytes rounded to two decimals
pub fn bytes_to_mb(bytes: u64) -> f64 {
    (bytes as f64 / BYTES_PER_MB * 100.0).round() / 100.0
}

pub fn mb_to_bytes(mb: f64) -> u64 {
    if mb.is_finite() && mb > 0.0 {
        (mb * BYTES_PER_MB).round() as u64
    } else {
        0
    }
}

/// `.ext` for a path, or an empty string
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default()
}

fn to_date(time: SystemTime) -> NaiveDate {
    DateTime::<Local>::from(time).date_naive()
}

/// Walks a directory tree and records every reachable file
pub struct Collector<'a> {
    root: PathBuf,
    excluded: HashSet<PathBuf>,
    owners: &'a dyn OwnerLookup,
}

impl<'a> Collector<'a> {
    /// Create a collector rooted at `root`.
    ///
    /// The root and every exclusion are resolved to absolute paths; an
    /// exclusion that cannot be resolved does not exist and is dropped.
    pub fn new(root: &Path, exclude: &[PathBuf], owners: &'a dyn OwnerLookup) -> Result<Self> {
        let root = root.canonicalize()?;
        let excluded = exclude
            .iter()
            .filter_map(|p| match p.canonicalize() {
                Ok(resolved) => Some(resolved),
                Err(e) => {
                    warn!("Ignoring exclusion {:?}: {}", p, e);
                    None
                }
            })
            .collect();

        Ok(Self { root, excluded, owners })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Walk the tree, pruning excluded folders before descending into them.
    ///
    /// Entries whose metadata cannot be read are logged and skipped.
    pub fn collect(&self) -> Vec<FileRecord> {
        let mut records = Vec::new();

        let walker = WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                if e.depth() > 0 && e.file_type().is_dir() && self.excluded.contains(e.path()) {
                    info!("Excluding folder: {:?}", e.path());
                    false
                } else {
                    true
                }
            });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };

            if entry.file_type().is_dir() {
                continue;
            }

            let path = entry.path();
            // Follows symlinks so a link to a file reports the target's metadata
            let meta = match std::fs::metadata(path) {
                Ok(meta) => meta,
                Err(e) => {
                    warn!("File not found when accessing metadata: {:?}, error: {}", path, e);
                    continue;
                }
            };
            if !meta.is_file() {
                debug!("Skipping non-file entry: {:?}", path);
                continue;
            }

            records.push(FileRecord::from_metadata(path, &meta, self.owners.owner_of(path)));
        }

        info!("Collected {} files under {:?}", records.len(), self.root);
        records
    }
}

/// Total size of all regular files under `folder`.
///
/// Symbolic links are not followed or counted; unreadable files are skipped.
pub fn folder_size(folder: &Path) -> u64 {
    let mut total = 0;

    for entry in WalkDir::new(folder).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping entry while sizing {:?}: {}", folder, e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        match entry.metadata() {
            Ok(meta) => total += meta.len(),
            Err(e) => warn!("File not found: {:?}, error: {}", entry.path(), e),
        }
    }

    total
}

/// Resolve folder names typed by a user to immediate subfolders of `root`.
///
/// Matching is case-insensitive. Any name without a matching folder makes the
/// whole request invalid so the caller can ask again.
pub fn resolve_exclusions(root: &Path, names: &[String]) -> Result<Vec<PathBuf>> {
    let root = root.canonicalize()?;

    let mut folders: HashMap<String, PathBuf> = HashMap::new();
    for entry in std::fs::read_dir(&root)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            folders.insert(entry.file_name().to_string_lossy().to_lowercase(), entry.path());
        }
    }

    let mut valid = Vec::new();
    let mut invalid = Vec::new();
    for name in names.iter().map(|n| n.trim()).filter(|n| !n.is_empty()) {
        match folders.get(&name.to_lowercase()) {
            Some(path) => valid.push(path.canonicalize()?),
            None => invalid.push(name.to_string()),
        }
    }

    if invalid.is_empty() {
        Ok(valid)
    } else {
        Err(TreeAuditError::InvalidExclusions(invalid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::owner::NoOwnerLookup;
    use std::fs;

    fn names(records: &[FileRecord]) -> Vec<String> {
        records.iter().map(|r| r.name.clone()).collect()
    }

    #[test]
    fn test_excluded_folder_is_pruned() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("tmp")).unwrap();
        fs::create_dir_all(dir.path().join("keep")).unwrap();
        fs::write(dir.path().join("tmp/x.txt"), b"x").unwrap();
        fs::write(dir.path().join("keep/y.txt"), b"y").unwrap();

        let collector = Collector::new(dir.path(), &[dir.path().join("tmp")], &NoOwnerLookup).unwrap();
        let records = collector.collect();
        assert_eq!(names(&records), vec!["y.txt"]);
    }

    #[test]
    fn test_exclusion_matches_path_not_prefix() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("tmp")).unwrap();
        fs::create_dir_all(dir.path().join("tmp2")).unwrap();
        fs::write(dir.path().join("tmp/a.txt"), b"a").unwrap();
        fs::write(dir.path().join("tmp2/b.txt"), b"b").unwrap();

        let collector = Collector::new(dir.path(), &[dir.path().join("tmp")], &NoOwnerLookup).unwrap();
        assert_eq!(names(&collector.collect()), vec!["b.txt"]);
    }

    #[test]
    fn test_record_metadata() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("report.docx"), vec![0u8; 2 * 1024 * 1024]).unwrap();

        let collector = Collector::new(dir.path(), &[], &NoOwnerLookup).unwrap();
        let records = collector.collect();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.file_type, ".docx");
        assert_eq!(record.size_bytes, 2 * 1024 * 1024);
        assert_eq!(record.size_mb(), 2.0);
        assert!(record.modified.is_some());
        assert!(record.created.is_some());
        assert!(record.path.is_absolute());
    }

    #[test]
    fn test_missing_root_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Collector::new(&dir.path().join("nope"), &[], &NoOwnerLookup).is_err());
    }

    #[test]
    fn test_folder_size_sums_nested_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("a/b")).unwrap();
        fs::write(dir.path().join("a/one.bin"), vec![0u8; 100]).unwrap();
        fs::write(dir.path().join("a/b/two.bin"), vec![0u8; 50]).unwrap();
        assert_eq!(folder_size(&dir.path().join("a")), 150);
    }

    #[cfg(unix)]
    #[test]
    fn test_folder_size_skips_symlinks() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("a")).unwrap();
        fs::write(dir.path().join("a/one.bin"), vec![0u8; 100]).unwrap();
        std::os::unix::fs::symlink(dir.path().join("a/one.bin"), dir.path().join("a/link.bin")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("a"), dir.path().join("a/loop")).unwrap();
        assert_eq!(folder_size(&dir.path().join("a")), 100);
    }

    #[test]
    fn test_resolve_exclusions_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("Archive")).unwrap();

        let resolved = resolve_exclusions(dir.path(), &["archive".to_string()]).unwrap();
        assert_eq!(resolved, vec![dir.path().join("Archive").canonicalize().unwrap()]);
    }

    #[test]
    fn test_resolve_exclusions_reports_unknown_names() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("Archive")).unwrap();

        match resolve_exclusions(dir.path(), &["archive".to_string(), "ghost".to_string()]) {
            Err(TreeAuditError::InvalidExclusions(invalid)) => assert_eq!(invalid, vec!["ghost"]),
            other => panic!("Expected InvalidExclusions, got {:?}", other),
        }
    }

    #[test]
    fn test_bytes_to_mb_rounds() {
        assert_eq!(bytes_to_mb(0), 0.0);
        assert_eq!(bytes_to_mb(1024 * 1024 + 1024 * 1024 / 3), 1.33);
        assert_eq!(mb_to_bytes(1.0), 1024 * 1024);
        assert_eq!(mb_to_bytes(-3.0), 0);
    }
}
