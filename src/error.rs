// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Error types for treeaudit

use thiserror::Error;

/// Result type alias for treeaudit operations
pub type Result<T> = std::result::Result<T, TreeAuditError>;

/// Errors that stop a pass before or outside remediation.
///
/// Per-action failures during remediation are [`crate::remediation::ActionError`]
/// and are recorded in the action report instead of being returned.
#[derive(Error, Debug)]
pub enum TreeAuditError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File system error: {0}")]
    FileSystem(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Workbook error: {0}")]
    Workbook(String),

    #[error("Workbook package error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Workbook XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Sheet '{0}' not found in workbook")]
    MissingSheet(String),

    #[error("Column '{column}' not found in sheet '{sheet}'")]
    MissingColumn { sheet: String, column: String },

    #[error("Invalid output name '{0}': use only letters, numbers, hyphens, and underscores")]
    InvalidOutputName(String),

    #[error("Invalid or non-existent folders to exclude: {}", .0.join(", "))]
    InvalidExclusions(Vec<String>),

    #[error("No audit rows found in the workbook")]
    NoAuditRows,

    #[error("No valid actions (delete, rename, move) found in the Action column")]
    NoRecognizedActions,

    #[error("Could not determine a base directory from the resolved paths")]
    NoBaseDirectory,

    #[error("Aborted by user")]
    Aborted,
}
