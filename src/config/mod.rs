// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Configuration management for treeaudit

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::remediation::SearchScope;
use crate::workbook::LinkStyle;

/// Main application configuration
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AppConfig {
    /// Audit output settings
    #[serde(default)]
    pub audit: AuditConfig,

    /// Sheet and column names used in the workbook
    #[serde(default)]
    pub sheets: SheetConfig,

    /// Remediation settings
    #[serde(default)]
    pub remediation: RemediationConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AuditConfig {
    /// Directory where audit workbooks are written
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    /// Spaces of indentation per tree level in the Name column
    #[serde(default = "default_indent_width")]
    pub indent_width: usize,
    /// How location references are stored in the workbook
    #[serde(default)]
    pub link_style: LinkStyle,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SheetConfig {
    #[serde(default = "default_raw_sheet")]
    pub raw_sheet: String,
    #[serde(default = "default_audit_sheet")]
    pub audit_sheet: String,
    /// Column whose embedded references identify each row's path
    #[serde(default = "default_reference_column")]
    pub reference_column: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RemediationConfig {
    /// Where deleted entries are relocated
    #[serde(default)]
    pub recycle_dir: Option<String>,
    /// Where to look for existing "Move to" folders, in priority order
    #[serde(default = "default_search_order")]
    pub search_order: Vec<SearchScope>,
    /// JSONL log receiving one line per processed row
    #[serde(default = "default_report_path")]
    pub report_path: String,
}

// Default value functions
fn default_output_dir() -> String { ".".to_string() }
fn default_indent_width() -> usize { 4 }
fn default_raw_sheet() -> String { "RawData".to_string() }
fn default_audit_sheet() -> String { "AuditSheet".to_string() }
fn default_reference_column() -> String { "Path".to_string() }
fn default_report_path() -> String { "treeaudit_report.jsonl".to_string() }

fn default_search_order() -> Vec<SearchScope> {
    vec![SearchScope::Base, SearchScope::Siblings, SearchScope::Ancestors]
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            indent_width: default_indent_width(),
            link_style: LinkStyle::default(),
        }
    }
}

impl Default for SheetConfig {
    fn default() -> Self {
        Self {
            raw_sheet: default_raw_sheet(),
            audit_sheet: default_audit_sheet(),
            reference_column: default_reference_column(),
        }
    }
}

impl Default for RemediationConfig {
    fn default() -> Self {
        Self {
            recycle_dir: None,
            search_order: default_search_order(),
            report_path: default_report_path(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> crate::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = serde_json::from_str(&content)
                .map_err(|e| crate::TreeAuditError::Config(format!("Failed to parse config: {}", e)))?;
            config.validate()?;
            Ok(config)
        } else {
            tracing::info!("Config file not found at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject settings that would make a pass meaningless
    pub fn validate(&self) -> crate::Result<()> {
        if self.audit.indent_width == 0 {
            return Err(crate::TreeAuditError::Config("audit.indent_width must be at least 1".to_string()));
        }
        if self.remediation.search_order.is_empty() {
            return Err(crate::TreeAuditError::Config("remediation.search_order must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn output_dir(&self) -> PathBuf {
        PathBuf::from(&self.audit.output_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config.audit.indent_width, 4);
        assert_eq!(config.sheets.audit_sheet, "AuditSheet");
        assert_eq!(config.remediation.search_order.len(), 3);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("treeaudit.json");
        std::fs::write(&path, r#"{"remediation": {"search_order": ["ancestors"]}}"#).unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.remediation.search_order, vec![SearchScope::Ancestors]);
        assert_eq!(config.sheets.reference_column, "Path");
        assert_eq!(config.audit.link_style, LinkStyle::Formula);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("treeaudit.json");
        let mut config = AppConfig::default();
        config.remediation.recycle_dir = Some("/srv/recycle".to_string());
        config.audit.link_style = LinkStyle::Native;
        config.save(&path).unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded.remediation.recycle_dir.as_deref(), Some("/srv/recycle"));
        assert_eq!(loaded.audit.link_style, LinkStyle::Native);
    }

    #[test]
    fn test_empty_search_order_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("treeaudit.json");
        std::fs::write(&path, r#"{"remediation": {"search_order": []}}"#).unwrap();
        assert!(AppConfig::load(&path).is_err());
    }
}
