// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Applying remediation plans to the filesystem
//!
//! Each row runs its actions in the order they were written. A failed action
//! is recorded and the next one still runs; no failure stops the pass.

use chrono::Local;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::{ActionError, ActionToken, RemediationPlan, TargetFolderMap};
use crate::{Result, TreeAuditError};

const NOT_FOUND_STATUS: &str = "original path not found";

/// Everything the executor consults besides the plans themselves
pub struct RemediationContext<'a> {
    pub targets: &'a TargetFolderMap,
    /// Where deleted entries go; `None` makes every delete fail
    pub recycle_dir: Option<&'a Path>,
}

/// Outcome of one attempted action
#[derive(Debug)]
pub enum ActionStatus {
    Done(String),
    Skipped(String),
    Failed(ActionError),
}

impl ActionStatus {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

impl fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Done(message) | Self::Skipped(message) => write!(f, "{}", message),
            Self::Failed(error) => write!(f, "{}", error),
        }
    }
}

/// Result of processing one row
#[derive(Debug)]
pub struct RowOutcome {
    pub sheet_row: u32,
    pub actions: String,
    /// Where the entry ended up (or the original path if nothing moved it)
    pub final_path: Option<PathBuf>,
    /// `None` when the row's path did not exist and nothing was attempted
    pub statuses: Option<Vec<ActionStatus>>,
}

impl RowOutcome {
    /// Semicolon-joined status log
    pub fn status(&self) -> String {
        match &self.statuses {
            None => NOT_FOUND_STATUS.to_string(),
            Some(statuses) => statuses.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "),
        }
    }

    pub fn has_failures(&self) -> bool {
        match &self.statuses {
            None => true,
            Some(statuses) => statuses.iter().any(ActionStatus::is_failure),
        }
    }
}

/// Run every plan and return one outcome per plan, in order
pub fn execute_plans(plans: &[RemediationPlan], ctx: &RemediationContext<'_>) -> Vec<RowOutcome> {
    plans.iter().map(|plan| execute_plan(plan, ctx)).collect()
}

fn execute_plan(plan: &RemediationPlan, ctx: &RemediationContext<'_>) -> RowOutcome {
    debug!("Processing row {} ({})", plan.sheet_row, plan.name);

    let actions = plan.actions_label();
    let mut working = match &plan.path {
        Some(path) if path.exists() || path.is_symlink() => path.clone(),
        other => {
            warn!("Row {}: original path not found: {:?}", plan.sheet_row, other);
            return RowOutcome {
                sheet_row: plan.sheet_row,
                actions,
                final_path: other.clone(),
                statuses: None,
            };
        }
    };

    let mut statuses = Vec::with_capacity(plan.actions.len());
    for action in &plan.actions {
        let status = match action {
            ActionToken::Rename => match plan.rename_as.as_deref() {
                Some(new_name) => apply_rename(&mut working, new_name),
                None => ActionStatus::Failed(ActionError::MissingField {
                    action: ActionToken::Rename,
                    field: "Rename as…",
                }),
            },
            ActionToken::Move => match plan.move_to.as_deref() {
                Some(name) => apply_move(&mut working, name, ctx.targets),
                None => ActionStatus::Failed(ActionError::MissingField {
                    action: ActionToken::Move,
                    field: "Move to…",
                }),
            },
            ActionToken::Delete => apply_delete(&mut working, ctx.recycle_dir),
            ActionToken::Unknown(token) => ActionStatus::Failed(ActionError::UnknownAction(token.clone())),
        };

        match &status {
            ActionStatus::Failed(e) => warn!("Row {}: {}", plan.sheet_row, e),
            other => info!("Row {}: {}", plan.sheet_row, other),
        }
        statuses.push(status);
    }

    RowOutcome {
        sheet_row: plan.sheet_row,
        actions,
        final_path: Some(working),
        statuses: Some(statuses),
    }
}

fn exists(path: &Path) -> bool {
    path.exists() || path.is_symlink()
}

/// A name that stays inside the directory it is joined to
fn is_plain_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}

fn apply_rename(working: &mut PathBuf, new_name: &str) -> ActionStatus {
    let action = ActionToken::Rename;
    if !exists(working) {
        return ActionStatus::Failed(ActionError::NotFound { action, path: working.clone() });
    }
    if !is_plain_name(new_name) {
        return ActionStatus::Failed(ActionError::InvalidName { action, name: new_name.to_string() });
    }

    let mut file_name = new_name.to_string();
    if working.is_file() {
        if let Some(ext) = working.extension().map(|e| e.to_string_lossy().into_owned()) {
            let suffix = format!(".{}", ext);
            if !file_name.to_lowercase().ends_with(&suffix.to_lowercase()) {
                file_name.push_str(&suffix);
            }
        }
    }

    let destination = match working.parent() {
        Some(parent) => parent.join(&file_name),
        None => PathBuf::from(&file_name),
    };
    if exists(&destination) {
        return ActionStatus::Failed(ActionError::Conflict { action, path: destination });
    }

    match fs::rename(&*working, &destination) {
        Ok(()) => {
            let message = format!("Renamed {} to {}", working.display(), destination.display());
            *working = destination;
            ActionStatus::Done(message)
        }
        Err(source) => ActionStatus::Failed(ActionError::Io { action, source }),
    }
}

fn apply_move(working: &mut PathBuf, target_name: &str, targets: &TargetFolderMap) -> ActionStatus {
    let action = ActionToken::Move;
    if !exists(working) {
        return ActionStatus::Failed(ActionError::NotFound { action, path: working.clone() });
    }

    let Some(target_dir) = targets.get(target_name) else {
        return ActionStatus::Failed(ActionError::ResolutionFailure {
            action,
            reason: format!("target directory not found for moving: {}", target_name),
        });
    };
    if !target_dir.is_dir() {
        return ActionStatus::Failed(ActionError::ResolutionFailure {
            action,
            reason: format!("target is not a directory: {}", target_dir.display()),
        });
    }

    if working.as_path() == target_dir || working.parent() == Some(target_dir) {
        return ActionStatus::Skipped(format!("Move skipped, identical: {}", working.display()));
    }

    let Some(file_name) = working.file_name().map(|n| n.to_os_string()) else {
        return ActionStatus::Failed(ActionError::InvalidName {
            action,
            name: working.display().to_string(),
        });
    };
    let destination = target_dir.join(file_name);
    if exists(&destination) {
        return ActionStatus::Failed(ActionError::Conflict { action, path: destination });
    }

    match relocate(&*working, &destination) {
        Ok(()) => {
            let message = format!("Moved {} to {}", working.display(), target_dir.display());
            *working = destination;
            ActionStatus::Done(message)
        }
        Err(source) => ActionStatus::Failed(ActionError::Io { action, source }),
    }
}

fn apply_delete(working: &mut PathBuf, recycle_dir: Option<&Path>) -> ActionStatus {
    let action = ActionToken::Delete;
    let Some(recycle_dir) = recycle_dir else {
        return ActionStatus::Failed(ActionError::ResolutionFailure {
            action,
            reason: "no recycle directory configured".to_string(),
        });
    };
    if !exists(working) {
        return ActionStatus::Failed(ActionError::NotFound { action, path: working.clone() });
    }

    let Some(file_name) = working.file_name().map(|n| n.to_string_lossy().into_owned()) else {
        return ActionStatus::Failed(ActionError::InvalidName {
            action,
            name: working.display().to_string(),
        });
    };

    let mut destination = recycle_dir.join(&file_name);
    if exists(&destination) {
        // Keep both: the incoming entry gets a timestamp suffix
        let timestamp = Local::now().format("%Y%m%d%H%M%S").to_string();
        let candidate = Path::new(&file_name);
        let stem = candidate.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
        let renamed = match candidate.extension() {
            Some(ext) => format!("{}_{}.{}", stem, timestamp, ext.to_string_lossy()),
            None => format!("{}_{}", stem, timestamp),
        };
        destination = recycle_dir.join(renamed);
        if exists(&destination) {
            return ActionStatus::Failed(ActionError::Conflict { action, path: destination });
        }
    }

    match relocate(&*working, &destination) {
        Ok(()) => {
            let message = format!(
                "Moved {} to recycle directory: {}",
                working.display(),
                recycle_dir.display()
            );
            *working = destination;
            ActionStatus::Done(message)
        }
        Err(source) => ActionStatus::Failed(ActionError::Io { action, source }),
    }
}

/// Move `from` to `to`, copying across filesystems when a rename cannot.
///
/// The source is removed only after the copy is complete; a failed copy
/// removes whatever part of `to` it created and leaves `from` untouched.
fn relocate(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device(&e) => {
            debug!("Rename crosses devices, copying {:?} to {:?}", from, to);
            copy_then_remove(from, to)
        }
        Err(e) => Err(e),
    }
}

#[cfg(unix)]
fn is_cross_device(e: &io::Error) -> bool {
    e.raw_os_error() == Some(libc::EXDEV)
}

#[cfg(windows)]
fn is_cross_device(e: &io::Error) -> bool {
    // ERROR_NOT_SAME_DEVICE
    e.raw_os_error() == Some(17)
}

#[cfg(not(any(unix, windows)))]
fn is_cross_device(_e: &io::Error) -> bool {
    false
}

fn copy_then_remove(from: &Path, to: &Path) -> io::Result<()> {
    let file_type = fs::symlink_metadata(from)?.file_type();
    if fs::symlink_metadata(to).is_ok() {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("destination exists: {}", to.display()),
        ));
    }

    let copied = if file_type.is_dir() {
        copy_tree(from, to)
    } else if file_type.is_symlink() {
        copy_link(from, to)
    } else {
        fs::copy(from, to).map(|_| ())
    };

    if let Err(e) = copied {
        let cleanup = if file_type.is_dir() { fs::remove_dir_all(to) } else { fs::remove_file(to) };
        match cleanup {
            Err(c) if c.kind() != io::ErrorKind::NotFound => {
                warn!("Could not remove partial copy {:?}: {}", to, c);
            }
            _ => {}
        }
        return Err(e);
    }

    if file_type.is_dir() {
        fs::remove_dir_all(from)
    } else {
        fs::remove_file(from)
    }
}

fn copy_tree(from: &Path, to: &Path) -> io::Result<()> {
    for entry in WalkDir::new(from) {
        let entry = entry.map_err(io::Error::from)?;
        let relative = entry.path().strip_prefix(from).map_err(io::Error::other)?;
        let destination = to.join(relative);

        let file_type = entry.file_type();
        if file_type.is_dir() {
            fs::create_dir(&destination)?;
        } else if file_type.is_symlink() {
            copy_link(entry.path(), &destination)?;
        } else {
            fs::copy(entry.path(), &destination)?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_link(from: &Path, to: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(fs::read_link(from)?, to)
}

#[cfg(not(unix))]
fn copy_link(from: &Path, to: &Path) -> io::Result<()> {
    fs::copy(from, to).map(|_| ())
}

/// Resolve the recycle directory to an absolute path and check it lies
/// outside `base`. Nothing is created.
pub fn check_recycle_dir(recycle_dir: &Path, base: &Path) -> Result<PathBuf> {
    let recycle_dir = if recycle_dir.is_absolute() {
        recycle_dir.to_path_buf()
    } else {
        std::env::current_dir()?.join(recycle_dir)
    };

    if recycle_dir.starts_with(base) {
        return Err(TreeAuditError::Config(format!(
            "The recycle directory should not be inside the base directory {:?}",
            base
        )));
    }
    if recycle_dir.exists() && !recycle_dir.is_dir() {
        return Err(TreeAuditError::Config(format!(
            "The recycle path is not a directory: {:?}",
            recycle_dir
        )));
    }

    Ok(recycle_dir)
}

/// Check the recycle directory and create it if missing. Safe to call repeatedly.
pub fn prepare_recycle_dir(recycle_dir: &Path, base: &Path) -> Result<PathBuf> {
    let recycle_dir = check_recycle_dir(recycle_dir, base)?;
    if !recycle_dir.is_dir() {
        fs::create_dir_all(&recycle_dir)?;
        info!("Recycle directory created: {:?}", recycle_dir);
    }
    Ok(recycle_dir)
}
