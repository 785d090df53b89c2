// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Audit workbook schema and xlsx reading/writing

pub mod links;
pub mod reader;
pub mod writer;

use serde::{Deserialize, Serialize};

use crate::audit::AuditNode;
use crate::collector::FileRecord;

pub use links::{LocationReference, StoredLink};
pub use reader::{read_audit_rows, read_location_references, read_raw_listing, AuditRow};
pub use writer::write_workbook;

/// Columns of the raw listing sheet
pub const RAW_COLUMNS: [&str; 7] = [
    "File Name",
    "File Path",
    "File Type",
    "File Size (MB)",
    "Date Created",
    "Last Modified",
    "Owner",
];

/// Columns of the hierarchical audit sheet
pub const AUDIT_COLUMNS: [&str; 14] = [
    "Name",
    "Item Type",
    "Owner",
    "Date Created",
    "Last Modified",
    "Size (MB)",
    "Path",
    "Action",
    "Rename as…",
    "Move to…",
    "Consult staff?",
    "Proposed retention",
    "Justification",
    "Notes",
];

const DATE_FORMAT: &str = "%Y-%m-%d";

/// How location references are embedded in cells
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkStyle {
    /// `=HYPERLINK("path", "label")` formula with a cached label
    #[default]
    Formula,
    /// Plain label with a hyperlink relationship attached to the cell
    Native,
}

/// A single cell value to be written
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Link(LocationReference),
}

impl Cell {
    fn text(s: impl Into<String>) -> Self {
        let s = s.into();
        if s.is_empty() {
            Self::Empty
        } else {
            Self::Text(s)
        }
    }
}

/// A named sheet: header row followed by data rows
#[derive(Debug, Clone)]
pub struct Sheet {
    pub name: String,
    pub header: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

fn format_date(date: Option<chrono::NaiveDate>) -> String {
    date.map(|d| d.format(DATE_FORMAT).to_string()).unwrap_or_default()
}

/// Build the raw listing sheet
pub fn raw_sheet(name: &str, records: &[FileRecord]) -> Sheet {
    let rows = records
        .iter()
        .map(|r| {
            vec![
                Cell::text(r.name.clone()),
                Cell::text(r.path.to_string_lossy()),
                Cell::text(r.file_type.clone()),
                Cell::Number(r.size_mb()),
                Cell::text(format_date(r.created)),
                Cell::text(format_date(r.modified)),
                Cell::text(r.owner.clone()),
            ]
        })
        .collect();

    Sheet {
        name: name.to_string(),
        header: RAW_COLUMNS.iter().map(|s| s.to_string()).collect(),
        rows,
    }
}

/// Build the hierarchical audit sheet
pub fn audit_sheet(name: &str, nodes: &[AuditNode], indent_width: usize) -> Sheet {
    let rows = nodes
        .iter()
        .map(|n| {
            let mut row = vec![
                Cell::Link(LocationReference::new(&n.path, n.display_name(indent_width))),
                Cell::text(n.kind.as_str()),
                Cell::text(n.owner.clone()),
                Cell::text(format_date(n.created)),
                Cell::text(format_date(n.modified)),
                Cell::Number(n.size_mb()),
                Cell::Link(LocationReference::new(&n.path, n.kind.open_label())),
                Cell::text(n.remediation.action.clone()),
                Cell::text(n.remediation.rename_as.clone()),
                Cell::text(n.remediation.move_to.clone()),
            ];
            row.resize(AUDIT_COLUMNS.len(), Cell::Empty);
            row
        })
        .collect();

    Sheet {
        name: name.to_string(),
        header: AUDIT_COLUMNS.iter().map(|s| s.to_string()).collect(),
        rows,
    }
}

/// Normalize header text for lookup: trimmed, lowercase, no trailing ellipsis
pub(crate) fn normalize_header(header: &str) -> String {
    header
        .trim()
        .trim_end_matches('…')
        .trim_end_matches("...")
        .trim()
        .to_lowercase()
}

/// Spreadsheet column letters for a zero-based index (0 -> A, 26 -> AA)
pub fn column_letters(mut index: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push(b'A' + (index % 26) as u8);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    letters.reverse();
    String::from_utf8_lossy(&letters).into_owned()
}

/// Parse a cell reference such as `G12` into zero-based (row, column)
pub fn parse_cell_ref(reference: &str) -> Option<(u32, u32)> {
    // A range like "A1:B2" is anchored at its first cell
    let first = reference.split(':').next()?.trim().trim_start_matches('$');
    let split = first.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = first.split_at(split);
    let letters = letters.trim_end_matches('$');
    if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }

    let mut col: u32 = 0;
    for c in letters.chars() {
        col = col.checked_mul(26)?.checked_add(c.to_ascii_uppercase() as u32 - 'A' as u32 + 1)?;
    }
    let row: u32 = digits.parse().ok()?;
    if row == 0 {
        return None;
    }
    Some((row - 1, col - 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{ItemKind, Remediation};
    use std::path::PathBuf;

    #[test]
    fn test_column_letters() {
        assert_eq!(column_letters(0), "A");
        assert_eq!(column_letters(6), "G");
        assert_eq!(column_letters(25), "Z");
        assert_eq!(column_letters(26), "AA");
        assert_eq!(column_letters(27), "AB");
        assert_eq!(column_letters(701), "ZZ");
        assert_eq!(column_letters(702), "AAA");
    }

    #[test]
    fn test_parse_cell_ref() {
        assert_eq!(parse_cell_ref("A1"), Some((0, 0)));
        assert_eq!(parse_cell_ref("G12"), Some((11, 6)));
        assert_eq!(parse_cell_ref("AA3:AB9"), Some((2, 26)));
        assert_eq!(parse_cell_ref("$B$4"), Some((3, 1)));
        assert_eq!(parse_cell_ref("12"), None);
        assert_eq!(parse_cell_ref("A0"), None);
    }

    #[test]
    fn test_normalize_header_accepts_ascii_ellipsis() {
        assert_eq!(normalize_header("Rename as…"), "rename as");
        assert_eq!(normalize_header(" Move to... "), "move to");
        assert_eq!(normalize_header("Path"), "path");
    }

    #[test]
    fn test_audit_sheet_row_shape() {
        let node = AuditNode {
            kind: ItemKind::Folder,
            name: "docs".to_string(),
            depth: 1,
            path: PathBuf::from("/r/a/docs"),
            owner: "amy".to_string(),
            created: None,
            modified: None,
            size_bytes: 0,
            remediation: Remediation::default(),
        };
        let sheet = audit_sheet("AuditSheet", &[node], 4);
        assert_eq!(sheet.header.len(), AUDIT_COLUMNS.len());
        let row = &sheet.rows[0];
        assert_eq!(row.len(), AUDIT_COLUMNS.len());
        match &row[0] {
            Cell::Link(link) => assert_eq!(link.label, "    docs"),
            other => panic!("Expected link, got {:?}", other),
        }
        match &row[6] {
            Cell::Link(link) => {
                assert_eq!(link.label, "Open Folder");
                assert_eq!(link.target, PathBuf::from("/r/a/docs"));
            }
            other => panic!("Expected link, got {:?}", other),
        }
        assert_eq!(row[1], Cell::Text("Folder".to_string()));
        assert_eq!(row[7], Cell::Empty);
    }
}
