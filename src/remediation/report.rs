// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Persistent log of remediation outcomes (JSON lines)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

use super::executor::RowOutcome;
use crate::Result;

/// One processed audit row
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportEntry {
    pub timestamp: DateTime<Utc>,
    pub sheet_row: u32,
    pub actions: String,
    pub final_path: Option<PathBuf>,
    /// Semicolon-joined status messages
    pub status: String,
    pub failed: bool,
}

impl From<&RowOutcome> for ReportEntry {
    fn from(outcome: &RowOutcome) -> Self {
        Self {
            timestamp: Utc::now(),
            sheet_row: outcome.sheet_row,
            actions: outcome.actions.clone(),
            final_path: outcome.final_path.clone(),
            status: outcome.status(),
            failed: outcome.has_failures(),
        }
    }
}

/// Append-only report file
pub struct ActionReport {
    path: PathBuf,
}

impl ActionReport {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn append(&self, entry: &ReportEntry) -> Result<()> {
        self.append_all(std::slice::from_ref(entry))
    }

    /// Append entries in order with a single open
    pub fn append_all(&self, entries: &[ReportEntry]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let mut writer = BufWriter::new(file);
        for entry in entries {
            let json = serde_json::to_string(entry)?;
            writeln!(writer, "{}", json)?;
        }
        writer.flush()?;

        Ok(())
    }

    /// Entries in the order they were appended. Lines that do not parse are
    /// logged with their line number and skipped.
    pub fn entries(&self) -> Result<Vec<ReportEntry>> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        Ok(text
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .filter_map(|(index, line)| match serde_json::from_str(line) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("Skipping report line {} in {:?}: {}", index + 1, self.path, e);
                    None
                }
            })
            .collect())
    }

    /// Up to `count` entries, newest first. With `failed_only`, rows whose
    /// actions all succeeded are left out before counting.
    pub fn recent(&self, count: usize, failed_only: bool) -> Result<Vec<ReportEntry>> {
        Ok(self
            .entries()?
            .into_iter()
            .rev()
            .filter(|entry| !failed_only || entry.failed)
            .take(count)
            .collect())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remediation::executor::ActionStatus;

    fn entry(sheet_row: u32, failed: bool) -> ReportEntry {
        ReportEntry {
            timestamp: Utc::now(),
            sheet_row,
            actions: "rename".to_string(),
            final_path: Some(PathBuf::from(format!("/r/f{}.txt", sheet_row))),
            status: "Renamed".to_string(),
            failed,
        }
    }

    #[test]
    fn test_append_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let report = ActionReport::new(dir.path().join("logs/report.jsonl"));
        assert!(report.entries().unwrap().is_empty());

        report.append(&entry(2, false)).unwrap();
        report.append_all(&[entry(3, true), entry(4, false)]).unwrap();

        let all = report.entries().unwrap();
        assert_eq!(all.iter().map(|e| e.sheet_row).collect::<Vec<_>>(), vec![2, 3, 4]);
        assert!(all[1].failed);

        let recent = report.recent(2, false).unwrap();
        assert_eq!(recent.iter().map(|e| e.sheet_row).collect::<Vec<_>>(), vec![4, 3]);
    }

    #[test]
    fn test_recent_failed_only() {
        let dir = tempfile::tempdir().unwrap();
        let report = ActionReport::new(dir.path().join("report.jsonl"));
        report
            .append_all(&[entry(2, true), entry(3, false), entry(4, true), entry(5, false), entry(6, true)])
            .unwrap();

        let failed = report.recent(2, true).unwrap();
        assert_eq!(failed.iter().map(|e| e.sheet_row).collect::<Vec<_>>(), vec![6, 4]);

        let all_failed = report.recent(10, true).unwrap();
        assert_eq!(all_failed.iter().map(|e| e.sheet_row).collect::<Vec<_>>(), vec![6, 4, 2]);
        assert!(report.recent(0, true).unwrap().is_empty());
    }

    #[test]
    fn test_bad_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.jsonl");
        let report = ActionReport::new(path.clone());
        report.append(&entry(2, false)).unwrap();
        fs::write(&path, format!("{}not json\n\n", fs::read_to_string(&path).unwrap())).unwrap();

        assert_eq!(report.entries().unwrap().len(), 1);
    }

    #[test]
    fn test_from_outcome() {
        let outcome = RowOutcome {
            sheet_row: 7,
            actions: "rename, delete".to_string(),
            final_path: Some(PathBuf::from("/r/x.txt")),
            statuses: Some(vec![
                ActionStatus::Done("Renamed a to b".to_string()),
                ActionStatus::Skipped("Move skipped, identical: /r".to_string()),
            ]),
        };
        let entry = ReportEntry::from(&outcome);
        assert_eq!(entry.sheet_row, 7);
        assert_eq!(entry.status, "Renamed a to b; Move skipped, identical: /r");
        assert!(!entry.failed);

        let missing = RowOutcome { sheet_row: 8, actions: "move".to_string(), final_path: None, statuses: None };
        let entry = ReportEntry::from(&missing);
        assert_eq!(entry.status, "original path not found");
        assert!(entry.failed);
    }
}
