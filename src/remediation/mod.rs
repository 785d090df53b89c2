// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Remediation: turning an edited audit sheet into file-system actions

pub mod base;
pub mod executor;
pub mod report;
pub mod targets;

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::workbook::AuditRow;
use crate::{Result, TreeAuditError};

pub use base::infer_base_directory;
pub use executor::{check_recycle_dir, execute_plans, prepare_recycle_dir, ActionStatus, RemediationContext, RowOutcome};
pub use report::{ActionReport, ReportEntry};
pub use targets::{reconcile_targets, SearchScope, TargetFolderMap};

/// One token of the free-text Action column
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionToken {
    Rename,
    Move,
    Delete,
    Unknown(String),
}

impl ActionToken {
    pub fn parse(token: &str) -> Self {
        let token = token.trim().to_lowercase();
        match token.as_str() {
            "rename" => Self::Rename,
            "move" => Self::Move,
            "delete" => Self::Delete,
            _ => Self::Unknown(token),
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }
}

impl fmt::Display for ActionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rename => write!(f, "rename"),
            Self::Move => write!(f, "move"),
            Self::Delete => write!(f, "delete"),
            Self::Unknown(token) => write!(f, "{}", token),
        }
    }
}

/// Split an Action cell into tokens, in the order written
pub fn parse_actions(text: &str) -> Vec<ActionToken> {
    text.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(ActionToken::parse)
        .collect()
}

/// Why a single action could not be carried out
#[derive(Error, Debug)]
pub enum ActionError {
    #[error("{action} failed - original file/folder does not exist: {path}")]
    NotFound { action: ActionToken, path: PathBuf },

    #[error("{action} failed - destination already exists: {path}")]
    Conflict { action: ActionToken, path: PathBuf },

    #[error("{action} failed - {reason}")]
    ResolutionFailure { action: ActionToken, reason: String },

    #[error("{action} failed - '{field}' is empty")]
    MissingField { action: ActionToken, field: &'static str },

    #[error("{action} failed - invalid name '{name}'")]
    InvalidName { action: ActionToken, name: String },

    #[error("unrecognized action '{0}'")]
    UnknownAction(String),

    #[error("{action} error: {source}")]
    Io {
        action: ActionToken,
        #[source]
        source: std::io::Error,
    },
}

/// The actions requested for one audit row
#[derive(Debug, Clone, PartialEq)]
pub struct RemediationPlan {
    pub sheet_row: u32,
    pub name: String,
    /// Path recovered from the row's location reference
    pub path: Option<PathBuf>,
    pub actions: Vec<ActionToken>,
    pub rename_as: Option<String>,
    pub move_to: Option<String>,
}

impl RemediationPlan {
    pub fn from_row(row: &AuditRow) -> Self {
        let non_empty = |s: &str| {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        };

        Self {
            sheet_row: row.sheet_row,
            name: row.name.trim().to_string(),
            path: row.path.clone(),
            actions: parse_actions(&row.action),
            rename_as: non_empty(&row.rename_as),
            move_to: non_empty(&row.move_to),
        }
    }

    pub fn has(&self, action: &ActionToken) -> bool {
        self.actions.contains(action)
    }

    /// Action tokens as written, comma-joined
    pub fn actions_label(&self) -> String {
        self.actions.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
    }
}

/// Plans for every row with a non-empty Action.
///
/// Fails when there are no rows at all, or when no row names a recognized action.
pub fn build_plans(rows: &[AuditRow]) -> Result<Vec<RemediationPlan>> {
    if rows.is_empty() {
        return Err(TreeAuditError::NoAuditRows);
    }

    let plans: Vec<RemediationPlan> = rows
        .iter()
        .map(RemediationPlan::from_row)
        .filter(|p| !p.actions.is_empty())
        .collect();

    if !plans.iter().any(|p| p.actions.iter().any(ActionToken::is_recognized)) {
        return Err(TreeAuditError::NoRecognizedActions);
    }

    Ok(plans)
}

/// Distinct "Move to" names across all rows, whatever their actions
pub fn move_target_names(rows: &[AuditRow]) -> BTreeSet<String> {
    rows.iter()
        .map(|r| r.move_to.trim())
        .filter(|m| !m.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(sheet_row: u32, action: &str, rename_as: &str, move_to: &str) -> AuditRow {
        AuditRow {
            sheet_row,
            name: format!("row{}", sheet_row),
            item_type: "File".to_string(),
            action: action.to_string(),
            rename_as: rename_as.to_string(),
            move_to: move_to.to_string(),
            path: Some(PathBuf::from(format!("/r/f{}.txt", sheet_row))),
        }
    }

    #[test]
    fn test_parse_actions_keeps_order_and_case_insensitive() {
        assert_eq!(
            parse_actions(" Move, RENAME ,, delete,archive"),
            vec![
                ActionToken::Move,
                ActionToken::Rename,
                ActionToken::Delete,
                ActionToken::Unknown("archive".to_string())
            ]
        );
        assert!(parse_actions("  ").is_empty());
    }

    #[test]
    fn test_build_plans_skips_rows_without_action() {
        let rows = vec![row(2, "", "", ""), row(3, "rename", " new ", ""), row(4, "bogus", "", "")];
        let plans = build_plans(&rows).unwrap();
        assert_eq!(plans.len(), 2);
        assert_eq!(plans[0].sheet_row, 3);
        assert_eq!(plans[0].rename_as.as_deref(), Some("new"));
        assert_eq!(plans[0].move_to, None);
        assert_eq!(plans[1].actions, vec![ActionToken::Unknown("bogus".to_string())]);
    }

    #[test]
    fn test_build_plans_structural_errors() {
        assert!(matches!(build_plans(&[]), Err(TreeAuditError::NoAuditRows)));
        let rows = vec![row(2, "", "", ""), row(3, "archive", "", "")];
        assert!(matches!(build_plans(&rows), Err(TreeAuditError::NoRecognizedActions)));
    }

    #[test]
    fn test_move_target_names_from_all_rows() {
        let rows = vec![row(2, "move", "", "Keep"), row(3, "", "", " Old "), row(4, "move", "", "Keep")];
        let names: Vec<String> = move_target_names(&rows).into_iter().collect();
        assert_eq!(names, vec!["Keep", "Old"]);
    }

    #[test]
    fn test_actions_label() {
        let plan = RemediationPlan::from_row(&row(2, "rename,move", "a", "b"));
        assert_eq!(plan.actions_label(), "rename, move");
        assert!(plan.has(&ActionToken::Move));
        assert!(!plan.has(&ActionToken::Delete));
    }
}
