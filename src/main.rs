// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! treeaudit: audit a directory tree into a workbook, then apply the
//! remediation actions recorded in the edited workbook.

use clap::{Parser, Subcommand};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{info, warn};

use treeaudit::collector::resolve_exclusions;
use treeaudit::config::AppConfig;
use treeaudit::owner::SystemOwnerLookup;
use treeaudit::pipeline::{
    default_output_name, plan_remediation, run_audit, run_rebuild, run_remediation, sanitize_output_name,
    RemediationPass,
};
use treeaudit::prompt::{prompt_confirm, prompt_line, Confirm};
use treeaudit::remediation::targets::TargetOrigin;
use treeaudit::remediation::ActionReport;
use treeaudit::workbook::LinkStyle;
use treeaudit::{Result, TreeAuditError};

/// treeaudit CLI - directory audit workbooks and bulk remediation
#[derive(Parser, Debug)]
#[command(name = "treeaudit")]
#[command(author = "Jonathan D. A. Jewell <hyperpolymath>")]
#[command(version)]
#[command(about = "Audit a directory tree into a workbook and apply the edits made to it", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (JSON format)
    #[arg(short, long, default_value = "treeaudit.json", global = true)]
    config: PathBuf,

    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable trace logging (most verbose)
    #[arg(long, global = true)]
    trace: bool,

    /// Suppress non-essential output (quiet mode)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Walk a directory and write an audit workbook
    Audit {
        /// Directory to audit
        dir: PathBuf,

        /// Immediate subfolder to leave out (repeatable, case-insensitive)
        #[arg(short, long)]
        exclude: Vec<String>,

        /// Workbook name, without extension
        #[arg(short, long)]
        name: Option<String>,

        /// Directory to write the workbook to (overrides config)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// How path links are stored (overrides config)
        #[arg(long, value_parser = ["formula", "native"])]
        link_style: Option<String>,

        /// Skip confirmation prompts
        #[arg(short, long)]
        yes: bool,
    },

    /// Rebuild an audit workbook from a raw listing (xlsx or csv)
    Rebuild {
        /// Listing exported by an earlier audit
        listing: PathBuf,

        /// Workbook name, without extension; `_audit_file` is appended
        #[arg(short, long)]
        name: Option<String>,

        /// Directory to write the workbook to (overrides config)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Apply the actions recorded in an edited audit workbook
    Remediate {
        /// Edited audit workbook
        workbook: PathBuf,

        /// Where deleted entries are moved (overrides config)
        #[arg(short, long)]
        recycle_dir: Option<PathBuf>,

        /// Show what would happen without touching any file
        #[arg(long)]
        dry_run: bool,

        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,

        /// Report log to append to (overrides config)
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Show recent remediation report entries
    Report {
        /// Number of entries to show
        #[arg(short = 'n', long, default_value = "20")]
        count: usize,

        /// Only show rows where an action failed
        #[arg(long)]
        failed: bool,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Generate default configuration file
    Generate {
        /// Output file path
        #[arg(short, long, default_value = "treeaudit.json")]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);
    match &cli.log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            subscriber.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        None => subscriber.init(),
    }

    let mut config = AppConfig::load(&cli.config)?;

    match cli.command {
        Commands::Audit { dir, exclude, name, output_dir, link_style, yes } => {
            if let Some(output_dir) = output_dir {
                config.audit.output_dir = output_dir.to_string_lossy().into_owned();
            }
            if let Some(style) = link_style {
                config.audit.link_style = parse_link_style(&style);
            }
            run_audit_command(&config, &dir, exclude, name, yes)
        }
        Commands::Rebuild { listing, name, output_dir } => {
            if let Some(output_dir) = output_dir {
                config.audit.output_dir = output_dir.to_string_lossy().into_owned();
            }
            run_rebuild_command(&config, &listing, name)
        }
        Commands::Remediate { workbook, recycle_dir, dry_run, yes, report } => {
            if let Some(report) = report {
                config.remediation.report_path = report.to_string_lossy().into_owned();
            }
            run_remediate_command(&config, &workbook, recycle_dir.as_deref(), dry_run, yes)
        }
        Commands::Report { count, failed } => run_report_command(&config, count, failed),
        Commands::Config { action } => run_config_command(&config, action),
    }
}

fn parse_link_style(style: &str) -> LinkStyle {
    match style {
        "native" => LinkStyle::Native,
        _ => LinkStyle::Formula,
    }
}

fn ask_exclusions() -> Result<Vec<String>> {
    let line = prompt_line("Folders to exclude (comma-separated, blank for none)")?;
    Ok(line
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect())
}

/// Resolve exclusion names, asking again while any name is unknown or the
/// user rejects the resolved list
fn confirm_exclusions(root: &Path, mut names: Vec<String>, yes: bool) -> Result<Vec<PathBuf>> {
    loop {
        let resolved = match resolve_exclusions(root, &names) {
            Ok(resolved) => resolved,
            Err(TreeAuditError::InvalidExclusions(invalid)) if !yes => {
                eprintln!("Invalid or non-existent folders: {}", invalid.join(", "));
                names = ask_exclusions()?;
                continue;
            }
            Err(e) => return Err(e),
        };

        if yes || resolved.is_empty() {
            return Ok(resolved);
        }

        println!("Folders to exclude:");
        for path in &resolved {
            println!("  {}", path.display());
        }
        match prompt_confirm("Is this correct?")? {
            Confirm::Yes => return Ok(resolved),
            Confirm::No => names = ask_exclusions()?,
            Confirm::Quit => return Err(TreeAuditError::Aborted),
        }
    }
}

fn run_audit_command(config: &AppConfig, dir: &Path, exclude: Vec<String>, name: Option<String>, yes: bool) -> Result<()> {
    let root = dir.canonicalize()?;
    let exclusions = confirm_exclusions(&root, exclude, yes)?;
    let name = name.unwrap_or_else(|| default_output_name(&root));

    info!("Auditing {:?}", root);
    let owners = SystemOwnerLookup::new();
    let summary = run_audit(&root, &exclusions, config, &name, &owners)?;

    println!(
        "Audited {} files ({} rows) under {}",
        summary.files,
        summary.rows,
        summary.root.display()
    );
    println!("Workbook: {}", summary.workbook.display());
    Ok(())
}

fn run_rebuild_command(config: &AppConfig, listing: &Path, name: Option<String>) -> Result<()> {
    let name = name.unwrap_or_else(|| {
        let stem = listing
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "listing".to_string());
        sanitize_output_name(&stem)
    });

    let owners = SystemOwnerLookup::new();
    let summary = run_rebuild(listing, config, &name, &owners)?;

    println!(
        "Rebuilt {} rows from {} listed files under {}",
        summary.rows,
        summary.files,
        summary.root.display()
    );
    println!("Workbook: {}", summary.workbook.display());
    Ok(())
}

fn print_pass(pass: &RemediationPass) {
    println!("Base directory: {}", pass.base.display());
    if let Some(recycle_dir) = &pass.recycle_dir {
        println!("Recycle directory: {}", recycle_dir.display());
    }

    if !pass.targets.is_empty() {
        println!("Move targets:");
        for (name, folder) in pass.targets.iter() {
            let origin = match folder.origin {
                TargetOrigin::Found => "existing",
                TargetOrigin::Created => "created",
                TargetOrigin::Planned => "to be created",
            };
            println!("  {} -> {} ({})", name, folder.path.display(), origin);
        }
    }

    println!("Planned actions ({} rows):", pass.plans.len());
    for plan in &pass.plans {
        let path = plan
            .path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<no path>".to_string());
        println!("  row {}: [{}] {}", plan.sheet_row, plan.actions_label(), path);
    }
}

fn run_remediate_command(
    config: &AppConfig,
    workbook: &Path,
    recycle_dir: Option<&Path>,
    dry_run: bool,
    yes: bool,
) -> Result<()> {
    let pass = plan_remediation(workbook, config, recycle_dir, dry_run)?;
    print_pass(&pass);

    if dry_run {
        warn!("DRY RUN MODE - no files were changed");
        return Ok(());
    }

    if !yes && prompt_confirm("Apply these actions?")? != Confirm::Yes {
        return Err(TreeAuditError::Aborted);
    }

    let report = ActionReport::new(PathBuf::from(&config.remediation.report_path));
    let outcomes = run_remediation(&pass, &report)?;

    println!("Action report:");
    for outcome in &outcomes {
        let marker = if outcome.has_failures() { "FAILED" } else { "ok" };
        println!("  row {} [{}] {}: {}", outcome.sheet_row, outcome.actions, marker, outcome.status());
    }
    println!("Report appended to {}", report.path().display());
    Ok(())
}

fn run_report_command(config: &AppConfig, count: usize, failed_only: bool) -> Result<()> {
    let report = ActionReport::new(PathBuf::from(&config.remediation.report_path));
    let entries = report.recent(count, failed_only)?;

    if failed_only {
        println!("Recent failed rows ({}):", entries.len());
    } else {
        println!("Recent report entries ({}):", entries.len());
    }
    for entry in entries {
        let marker = if entry.failed { "[FAILED]" } else { "" };
        let final_path = entry
            .final_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        println!(
            "  {} row {} [{}] {} {} {}",
            entry.timestamp.format("%Y-%m-%d %H:%M"),
            entry.sheet_row,
            entry.actions,
            final_path,
            entry.status,
            marker
        );
    }

    Ok(())
}

fn run_config_command(config: &AppConfig, action: ConfigCommands) -> Result<()> {
    match action {
        ConfigCommands::Show => {
            let json = serde_json::to_string_pretty(config)?;
            println!("{}", json);
        }
        ConfigCommands::Generate { output } => {
            AppConfig::default().save(&output)?;
            println!("Generated config at {:?}", output);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["treeaudit"]).is_err());
    }

    #[test]
    fn test_cli_audit_command() {
        let cli = Cli::try_parse_from([
            "treeaudit", "audit", "/srv/share", "--exclude", "tmp", "-e", "Cache", "--name", "q1", "--yes",
        ])
        .unwrap();

        match cli.command {
            Commands::Audit { dir, exclude, name, yes, link_style, .. } => {
                assert_eq!(dir, PathBuf::from("/srv/share"));
                assert_eq!(exclude, vec!["tmp", "Cache"]);
                assert_eq!(name.as_deref(), Some("q1"));
                assert!(yes);
                assert!(link_style.is_none());
            }
            _ => panic!("Expected Audit command"),
        }
    }

    #[test]
    fn test_cli_rejects_unknown_link_style() {
        assert!(Cli::try_parse_from(["treeaudit", "audit", ".", "--link-style", "html"]).is_err());
        assert_eq!(parse_link_style("native"), LinkStyle::Native);
    }

    #[test]
    fn test_cli_remediate_command() {
        let cli = Cli::try_parse_from([
            "treeaudit", "--log-file", "run.log", "remediate", "edited.xlsx", "--dry-run", "-r", "/srv/recycle",
        ])
        .unwrap();

        assert_eq!(cli.log_file, Some(PathBuf::from("run.log")));
        match cli.command {
            Commands::Remediate { workbook, recycle_dir, dry_run, yes, report } => {
                assert_eq!(workbook, PathBuf::from("edited.xlsx"));
                assert_eq!(recycle_dir, Some(PathBuf::from("/srv/recycle")));
                assert!(dry_run);
                assert!(!yes);
                assert!(report.is_none());
            }
            _ => panic!("Expected Remediate command"),
        }
    }

    #[test]
    fn test_cli_report_default_count() {
        let cli = Cli::try_parse_from(["treeaudit", "report"]).unwrap();
        assert!(matches!(cli.command, Commands::Report { count: 20, failed: false }));
    }

    #[test]
    fn test_cli_report_failed_only() {
        let cli = Cli::try_parse_from(["treeaudit", "report", "--failed", "-n", "5"]).unwrap();
        assert!(matches!(cli.command, Commands::Report { count: 5, failed: true }));
    }
}
