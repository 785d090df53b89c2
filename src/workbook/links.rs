// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Location references: a display label plus the path it points at

use regex::Regex;
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;

/// A human-readable label carrying a machine-recoverable path
#[derive(Debug, Clone, PartialEq)]
pub struct LocationReference {
    pub target: PathBuf,
    pub label: String,
}

impl LocationReference {
    pub fn new(target: &Path, label: impl Into<String>) -> Self {
        Self {
            target: target.to_path_buf(),
            label: label.into(),
        }
    }

    /// The `HYPERLINK(...)` formula body for this reference (no leading `=`)
    pub fn to_formula(&self) -> String {
        format!(
            "HYPERLINK(\"{}\",\"{}\")",
            quote_formula_text(&self.target.to_string_lossy()),
            quote_formula_text(&self.label)
        )
    }
}

/// How a reference was found in a cell of a persisted sheet
#[derive(Debug, Clone, PartialEq)]
pub enum StoredLink {
    /// Literal formula text of the cell
    Formula(String),
    /// Target of a hyperlink attached to the cell
    Native(String),
}

impl StoredLink {
    /// Recover the referenced path, if the stored form contains one
    pub fn target(&self) -> Option<PathBuf> {
        match self {
            Self::Formula(formula) => parse_hyperlink_formula(formula).map(PathBuf::from),
            Self::Native(target) => parse_native_target(target).map(PathBuf::from),
        }
    }
}

fn hyperlink_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)HYPERLINK\(\s*"((?:[^"]|"")*)"(?:[^"]|$)"#).expect("hyperlink pattern is valid")
    })
}

/// Extract the target of the first `HYPERLINK("target", ...)` call in a formula
pub fn parse_hyperlink_formula(formula: &str) -> Option<String> {
    let captures = hyperlink_regex().captures(formula)?;
    let target = captures.get(1)?.as_str().replace("\"\"", "\"");
    if target.is_empty() {
        None
    } else {
        Some(target)
    }
}

/// Normalize a relationship target into a filesystem path string
pub fn parse_native_target(target: &str) -> Option<String> {
    let target = target.trim();
    if target.is_empty() {
        return None;
    }

    let Some(rest) = target.strip_prefix("file://") else {
        return Some(target.to_string());
    };
    // file:///C:/x -> C:/x, file:///srv/x -> /srv/x
    let path = match rest.strip_prefix('/') {
        Some(tail) if tail.len() > 1 && tail.as_bytes()[1] == b':' => tail,
        _ => rest,
    };
    Some(percent_decode(path))
}

/// Anchor a relative link target at `dir`, the folder holding the workbook.
///
/// Spreadsheet applications store links relative to the workbook. Targets
/// that are already absolute, including drive-letter and UNC forms written
/// on another platform, are returned unchanged. `..` is folded lexically so
/// the result can be compared component by component.
pub fn resolve_against(target: PathBuf, dir: &Path) -> PathBuf {
    if target.is_absolute() || looks_foreign_absolute(&target.to_string_lossy()) {
        return target;
    }

    let mut resolved = PathBuf::new();
    for component in dir.join(&target).components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !resolved.pop() && !resolved.has_root() {
                    resolved.push(component);
                }
            }
            other => resolved.push(other),
        }
    }
    resolved
}

fn looks_foreign_absolute(target: &str) -> bool {
    let bytes = target.as_bytes();
    let drive = bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':';
    drive || target.starts_with('/') || target.starts_with('\\')
}

fn quote_formula_text(text: &str) -> String {
    text.replace('"', "\"\"")
}

fn percent_decode(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                out.push(hi << 4 | lo);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_value(byte: u8) -> Option<u8> {
    (byte as char).to_digit(16).map(|d| d as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_formula_round_trip() {
        let reference = LocationReference::new(Path::new("/srv/share/Q1 \"final\"/a.txt"), "    a.txt");
        let stored = StoredLink::Formula(format!("={}", reference.to_formula()));
        assert_eq!(stored.target(), Some(reference.target));
    }

    #[test]
    fn test_formula_target_ending_in_quote() {
        let reference = LocationReference::new(Path::new("/srv/odd\""), "odd");
        assert_eq!(parse_hyperlink_formula(&reference.to_formula()), Some("/srv/odd\"".to_string()));
    }

    #[test]
    fn test_formula_without_equals_sign() {
        let stored = StoredLink::Formula(r#"HYPERLINK("C:\Users\amy\doc.docx", "Open File")"#.to_string());
        assert_eq!(stored.target(), Some(PathBuf::from(r"C:\Users\amy\doc.docx")));
    }

    #[test]
    fn test_formula_case_insensitive() {
        assert_eq!(parse_hyperlink_formula(r#"=hyperlink("/x/y","y")"#), Some("/x/y".to_string()));
    }

    #[test]
    fn test_non_hyperlink_formula() {
        assert_eq!(parse_hyperlink_formula("SUM(A1:A3)"), None);
        assert_eq!(parse_hyperlink_formula(r#"HYPERLINK("","x")"#), None);
    }

    #[test]
    fn test_native_targets() {
        assert_eq!(StoredLink::Native("/srv/a b.txt".to_string()).target(), Some(PathBuf::from("/srv/a b.txt")));
        assert_eq!(parse_native_target("file:///srv/a%20b.txt"), Some("/srv/a b.txt".to_string()));
        assert_eq!(parse_native_target("file:///C:/Users/amy"), Some("C:/Users/amy".to_string()));
        assert_eq!(parse_native_target("   "), None);
    }

    #[test]
    fn test_relative_targets_resolve_against_workbook_dir() {
        let dir = Path::new("/work/books");
        assert_eq!(
            resolve_against(PathBuf::from("../share/a.txt"), dir),
            PathBuf::from("/work/share/a.txt")
        );
        assert_eq!(resolve_against(PathBuf::from("./a.txt"), dir), PathBuf::from("/work/books/a.txt"));
        assert_eq!(resolve_against(PathBuf::from("/srv/a.txt"), dir), PathBuf::from("/srv/a.txt"));
        assert_eq!(resolve_against(PathBuf::from("C:/Users/amy"), dir), PathBuf::from("C:/Users/amy"));
        assert_eq!(
            resolve_against(PathBuf::from(r"\\server\share\a.txt"), dir),
            PathBuf::from(r"\\server\share\a.txt")
        );
    }

    #[test]
    fn test_percent_decode_leaves_malformed_escapes() {
        assert_eq!(percent_decode("100%"), "100%");
        assert_eq!(percent_decode("a%zzb"), "a%zzb");
        assert_eq!(percent_decode("%41"), "A");
    }
}
