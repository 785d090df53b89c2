// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! End-to-end passes: audit, rebuild from a listing, and remediation

use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{info, warn};

use crate::audit::{build_audit_tree, AuditNode};
use crate::collector::{folder_size, Collector, FileRecord};
use crate::config::AppConfig;
use crate::owner::OwnerLookup;
use crate::remediation::{
    build_plans, check_recycle_dir, execute_plans, infer_base_directory, move_target_names, prepare_recycle_dir,
    reconcile_targets, ActionReport, ActionToken, RemediationContext, RemediationPlan, ReportEntry, RowOutcome,
    TargetFolderMap,
};
use crate::workbook::{self, read_audit_rows, read_raw_listing, write_workbook};
use crate::{Result, TreeAuditError};

fn output_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("valid output name pattern"))
}

/// Workbook names may only use letters, digits, hyphens, and underscores
pub fn validate_output_name(name: &str) -> Result<()> {
    if output_name_pattern().is_match(name) {
        Ok(())
    } else {
        Err(TreeAuditError::InvalidOutputName(name.to_string()))
    }
}

/// Replace characters outside the allowed set with `_`
pub fn sanitize_output_name(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

/// `<folder>_audit` for the audited folder
pub fn default_output_name(root: &Path) -> String {
    let folder = root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "root".to_string());
    format!("{}_audit", sanitize_output_name(&folder))
}

/// What an audit or rebuild pass produced
#[derive(Debug)]
pub struct AuditSummary {
    pub workbook: PathBuf,
    pub root: PathBuf,
    pub files: usize,
    pub rows: usize,
}

fn write_audit_workbook(
    config: &AppConfig,
    output_name: &str,
    root: &Path,
    records: &[FileRecord],
    nodes: &[AuditNode],
) -> Result<AuditSummary> {
    let output_dir = config.output_dir();
    std::fs::create_dir_all(&output_dir)?;
    let workbook_path = output_dir.join(format!("{}.xlsx", output_name));

    let sheets = [
        workbook::raw_sheet(&config.sheets.raw_sheet, records),
        workbook::audit_sheet(&config.sheets.audit_sheet, nodes, config.audit.indent_width),
    ];
    write_workbook(&workbook_path, &sheets, config.audit.link_style)?;
    info!("Data saved to {:?}", workbook_path);

    Ok(AuditSummary {
        workbook: workbook_path,
        root: root.to_path_buf(),
        files: records.len(),
        rows: nodes.len(),
    })
}

/// Walk `root`, skipping `exclusions`, and write the two-sheet audit workbook
pub fn run_audit(
    root: &Path,
    exclusions: &[PathBuf],
    config: &AppConfig,
    output_name: &str,
    owners: &dyn OwnerLookup,
) -> Result<AuditSummary> {
    validate_output_name(output_name)?;

    let collector = Collector::new(root, exclusions, owners)?;
    let records = collector.collect();
    let nodes = build_audit_tree(collector.root(), &records, folder_size);

    write_audit_workbook(config, output_name, collector.root(), &records, &nodes)
}

/// Rebuild an audit workbook from a previously exported raw listing.
///
/// The tree root is inferred from the listed paths. Folder sizes are the sums
/// of the listed file sizes, so the tree need not exist on this machine.
pub fn run_rebuild(
    listing: &Path,
    config: &AppConfig,
    output_name: &str,
    owners: &dyn OwnerLookup,
) -> Result<AuditSummary> {
    let output_name = format!("{}_audit_file", output_name);
    validate_output_name(&output_name)?;

    let records = read_raw_listing(listing, owners)?;
    let root = infer_base_directory(records.iter().map(|r| r.path.as_path())).ok_or(TreeAuditError::NoBaseDirectory)?;
    info!("Base directory of listing: {:?}", root);

    let sizes = listed_folder_sizes(&root, &records);
    let nodes = build_audit_tree(&root, &records, |folder| sizes.get(folder).copied().unwrap_or(0));

    write_audit_workbook(config, &output_name, &root, &records, &nodes)
}

fn listed_folder_sizes(root: &Path, records: &[FileRecord]) -> HashMap<PathBuf, u64> {
    let mut sizes: HashMap<PathBuf, u64> = HashMap::new();
    for record in records {
        for folder in record.path.ancestors().skip(1) {
            if !folder.starts_with(root) {
                break;
            }
            *sizes.entry(folder.to_path_buf()).or_default() += record.size_bytes;
        }
    }
    sizes
}

/// Everything resolved from the workbook before any file is touched
#[derive(Debug)]
pub struct RemediationPass {
    pub base: PathBuf,
    pub plans: Vec<RemediationPlan>,
    pub targets: TargetFolderMap,
    /// Present only when some row asks for a delete
    pub recycle_dir: Option<PathBuf>,
}

impl RemediationPass {
    /// Run every plan, in sheet order
    pub fn execute(&self) -> Vec<RowOutcome> {
        let ctx = RemediationContext {
            targets: &self.targets,
            recycle_dir: self.recycle_dir.as_deref(),
        };
        execute_plans(&self.plans, &ctx)
    }

    pub fn has_deletes(&self) -> bool {
        self.plans.iter().any(|p| p.has(&ActionToken::Delete))
    }
}

/// Read the audit sheet and resolve plans, the base directory, target folders,
/// and the recycle directory.
///
/// With `dry_run`, missing target and recycle folders are only planned; the
/// filesystem is left untouched.
pub fn plan_remediation(
    workbook_path: &Path,
    config: &AppConfig,
    recycle_dir: Option<&Path>,
    dry_run: bool,
) -> Result<RemediationPass> {
    let rows = read_audit_rows(workbook_path, &config.sheets)?;
    let plans = build_plans(&rows)?;

    let base = infer_base_directory(rows.iter().filter_map(|r| r.path.as_deref())).ok_or(TreeAuditError::NoBaseDirectory)?;
    info!("Base directory: {:?}", base);

    let names = move_target_names(&rows);
    let targets = reconcile_targets(&base, &names, &config.remediation.search_order, !dry_run);
    for name in &names {
        if targets.get(name).is_none() {
            warn!("Move target '{}' could not be resolved", name);
        }
    }

    let mut pass = RemediationPass { base, plans, targets, recycle_dir: None };

    if pass.has_deletes() {
        let configured = recycle_dir
            .map(Path::to_path_buf)
            .or_else(|| config.remediation.recycle_dir.as_ref().map(PathBuf::from))
            .ok_or_else(|| TreeAuditError::Config("a recycle directory is required for delete actions".to_string()))?;

        pass.recycle_dir = Some(if dry_run {
            check_recycle_dir(&configured, &pass.base)?
        } else {
            prepare_recycle_dir(&configured, &pass.base)?
        });
    }

    Ok(pass)
}

/// Execute a resolved pass and append its outcomes to the report log
pub fn run_remediation(pass: &RemediationPass, report: &ActionReport) -> Result<Vec<RowOutcome>> {
    let outcomes = pass.execute();

    let entries: Vec<ReportEntry> = outcomes.iter().map(ReportEntry::from).collect();
    report.append_all(&entries)?;

    let failed = outcomes.iter().filter(|o| o.has_failures()).count();
    info!(
        "Remediation finished: {} rows processed, {} with failures",
        outcomes.len(),
        failed
    );
    Ok(outcomes)
}
