// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Hierarchical audit view built from a flat file listing
//!
//! Every folder between the audit root and a file gets exactly one row, placed
//! before any row beneath it. Rows carry a location reference back to their
//! real path so an edited workbook can be mapped onto the filesystem again.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::collector::{bytes_to_mb, FileRecord};

/// Whether an audit row describes a folder or a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemKind {
    Folder,
    File,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Folder => "Folder",
            Self::File => "File",
        }
    }

    /// Label of the Path column's reference
    pub fn open_label(&self) -> &'static str {
        match self {
            Self::Folder => "Open Folder",
            Self::File => "Open File",
        }
    }
}

/// User-editable remediation columns of an audit row
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Remediation {
    /// Free text, comma-separated action tokens
    pub action: String,
    pub rename_as: String,
    pub move_to: String,
}

/// One row of the hierarchical audit view
#[derive(Debug, Clone, PartialEq)]
pub struct AuditNode {
    pub kind: ItemKind,
    /// Bare file or folder name
    pub name: String,
    /// Nesting level below the audit root
    pub depth: usize,
    pub path: PathBuf,
    pub owner: String,
    pub created: Option<NaiveDate>,
    pub modified: Option<NaiveDate>,
    pub size_bytes: u64,
    pub remediation: Remediation,
}

impl AuditNode {
    /// Name indented by `indent_width` spaces per level
    pub fn display_name(&self, indent_width: usize) -> String {
        format!("{}{}", " ".repeat(indent_width * self.depth), self.name)
    }

    pub fn size_mb(&self) -> f64 {
        bytes_to_mb(self.size_bytes)
    }

    pub fn is_folder(&self) -> bool {
        self.kind == ItemKind::Folder
    }
}

/// Build the ordered audit sequence for `records` under `root`.
///
/// Records are ordered by comparing path components, so a folder always sorts
/// before everything beneath it even when a sibling's name extends its own.
/// `folder_size` supplies the size of each folder row. Records outside `root`
/// are logged and skipped.
pub fn build_audit_tree<F>(root: &Path, records: &[FileRecord], mut folder_size: F) -> Vec<AuditNode>
where
    F: FnMut(&Path) -> u64,
{
    let mut sorted: Vec<&FileRecord> = records.iter().collect();
    sorted.sort_by(|a, b| a.path.components().cmp(b.path.components()));

    let mut nodes = Vec::with_capacity(records.len());
    let mut seen_dirs: HashSet<PathBuf> = HashSet::new();

    for record in sorted {
        let relative = match record.path.strip_prefix(root) {
            Ok(rel) => rel,
            Err(_) => {
                warn!("Skipping {:?}: not under audit root {:?}", record.path, root);
                continue;
            }
        };

        let parts: Vec<_> = relative.components().collect();
        let Some((file_part, ancestors)) = parts.split_last() else {
            warn!("Skipping {:?}: it is the audit root itself", record.path);
            continue;
        };

        let mut cumulative = root.to_path_buf();
        for (depth, part) in ancestors.iter().enumerate() {
            cumulative.push(part);
            if seen_dirs.contains(&cumulative) {
                continue;
            }

            debug!("Folder row for {:?}", cumulative);
            nodes.push(AuditNode {
                kind: ItemKind::Folder,
                name: part.as_os_str().to_string_lossy().into_owned(),
                depth,
                path: cumulative.clone(),
                owner: record.owner.clone(),
                created: record.created,
                modified: record.modified,
                size_bytes: folder_size(&cumulative),
                remediation: Remediation::default(),
            });
            seen_dirs.insert(cumulative.clone());
        }

        nodes.push(AuditNode {
            kind: ItemKind::File,
            name: file_part.as_os_str().to_string_lossy().into_owned(),
            depth: ancestors.len(),
            path: record.path.clone(),
            owner: record.owner.clone(),
            created: record.created,
            modified: record.modified,
            size_bytes: record.size_bytes,
            remediation: Remediation::default(),
        });
    }

    nodes
}
