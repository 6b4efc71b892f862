//! coldscan - per-user storage tracking and cold-storage migration reports.
//!
//! Usage:
//!   coldscan scan [USER...]       Scan user directories and record snapshots
//!   coldscan status               Capacity usage from the latest snapshots
//!   coldscan history USER         Snapshot series for one user
//!   coldscan ages [USER]          Age distribution of the current findings
//!   coldscan report               Cold-storage migration candidates
//!   coldscan import LEGACY_DB     Import snapshots from an older database
//!   coldscan --help               Show help

mod logging;

use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Context, Result, bail};
use tracing::{info, warn};

use coldscan_analyze::{AggregationEngine, EngineConfig, MigrationReport, UserAgeStats};
use coldscan_core::{FileRecord, MonitorConfig, NewSnapshot};
use coldscan_scan::{DirectoryScanner, discover_users};
use coldscan_store::{SnapshotStore, SqliteStore, import_legacy_snapshots};

#[derive(Parser)]
#[command(
    name = "coldscan",
    version,
    about = "Per-user storage tracking and cold-storage migration reports",
    long_about = "coldscan records how much space each user's files take over time \
                  and flags files that have not been accessed for long enough to \
                  move to cold storage.\n\n\
                  Run `coldscan scan` periodically, then use the reporting \
                  subcommands against the same database."
)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Database file (overrides the config)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Directory holding one subdirectory per user (overrides the config)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Total storage capacity, e.g. "80TB" (overrides the config)
    #[arg(long, global = true)]
    capacity: Option<String>,

    /// Days since last access before a file is a migration candidate
    #[arg(long, global = true)]
    threshold: Option<i64>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan user directories and record a snapshot per user
    Scan {
        /// Users to scan (defaults to the known users, then the root's subdirectories)
        users: Vec<String>,

        /// Record the users that scanned cleanly even if others failed
        #[arg(long)]
        keep_going: bool,
    },

    /// Show capacity usage from the latest snapshots
    Status {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Show the snapshot series of one user
    History {
        /// User to show
        user: String,

        /// Window length in days (overrides the config)
        #[arg(short, long)]
        days: Option<i64>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Show the age distribution of the current findings
    Ages {
        /// Restrict to one user
        user: Option<String>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// List cold-storage migration candidates
    Report {
        /// Restrict the candidate list to one user
        #[arg(short, long)]
        user: Option<String>,

        /// Maximum number of candidates to list
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Import snapshots from an older `storage_data` database
    Import {
        /// Path to the legacy database
        legacy_db: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    logging::init_logger(cli.verbose);

    let config = load_config(&cli)?;

    match cli.command {
        Command::Scan { users, keep_going } => run_scan(&config, users, keep_going)?,
        Command::Status { format } => run_status(&config, format)?,
        Command::History { user, days, format } => run_history(config, &user, days, format)?,
        Command::Ages { user, format } => run_ages(&config, user.as_deref(), format)?,
        Command::Report {
            user,
            limit,
            format,
        } => run_report(&config, user.as_deref(), limit, format)?,
        Command::Import { legacy_db } => run_import(&config, &legacy_db)?,
    }

    Ok(())
}

/// Load the config file (if any) and apply command-line overrides.
fn load_config(cli: &Cli) -> Result<MonitorConfig> {
    let mut config = match &cli.config {
        Some(path) => MonitorConfig::load(path).context("Failed to load configuration")?,
        None => MonitorConfig::default(),
    };

    if let Some(db) = &cli.db {
        config.database = db.clone();
    }
    if let Some(root) = &cli.root {
        config.scan_root = root.clone();
    }
    if let Some(capacity) = &cli.capacity {
        config.capacity_bytes = parse_size(capacity)?;
    }
    if let Some(threshold) = cli.threshold {
        config.cold_storage_threshold_days = threshold;
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn open_store(config: &MonitorConfig) -> Result<SqliteStore> {
    SqliteStore::open(&config.database).context("Failed to open database")
}

fn engine_for(config: &MonitorConfig) -> Result<AggregationEngine> {
    Ok(AggregationEngine::with_config(EngineConfig::from_monitor(config)?))
}

/// Scan every user and commit findings and snapshots in one go.
fn run_scan(config: &MonitorConfig, users: Vec<String>, keep_going: bool) -> Result<()> {
    let mut store = open_store(config)?;

    let users = if !users.is_empty() {
        users
    } else {
        let known = store.snapshot_users()?;
        if known.is_empty() {
            discover_users(&config.scan_root).context("Failed to list user directories")?
        } else {
            known
        }
    };
    if users.is_empty() {
        bail!("No user directories found under {}", config.scan_root.display());
    }

    eprintln!("Scanning {} user(s) under {}...", users.len(), config.scan_root.display());

    let start = Instant::now();
    let scanner = DirectoryScanner::from_config(config);
    let results = scanner.scan_users(&config.scan_root, &users, &config.extension);

    let mut passes = Vec::new();
    let mut failed = Vec::new();
    for (user, result) in results {
        match result {
            Ok(pass) => passes.push(pass),
            Err(err) => {
                warn!(user = %user, error = %err, "User scan failed");
                failed.push(user);
            }
        }
    }

    if !failed.is_empty() && !keep_going {
        bail!(
            "Scan failed for {}; nothing was recorded (use --keep-going to record the rest)",
            failed.join(", ")
        );
    }

    // Findings and snapshots are only written once every pass is complete.
    let scan_date = Utc::now();
    let records: Vec<FileRecord> = passes
        .iter()
        .flat_map(|p| p.records.iter().cloned())
        .collect();
    let snapshots: Vec<NewSnapshot> = passes.iter().map(|p| p.snapshot(scan_date)).collect();

    store
        .replace_file_findings(&records)
        .context("Failed to store file findings")?;
    store
        .append_snapshots(&snapshots)
        .context("Failed to store snapshots")?;
    info!(users = snapshots.len(), files = records.len(), "Scan recorded");

    println!();
    println!("{}", "─".repeat(60));
    println!(
        " {} user(s), {} files, {}",
        passes.len(),
        records.len(),
        format_size(passes.iter().map(|p| p.total_size()).sum())
    );
    println!(" Scanned in {:.2}s", start.elapsed().as_secs_f64());
    println!("{}", "─".repeat(60));
    for pass in &passes {
        println!(
            "   {:<20} {:>10} {:>8} files",
            truncate(&pass.user, 20),
            format_size(pass.total_size()),
            pass.file_count()
        );
    }

    let warnings: usize = passes.iter().map(|p| p.warnings.len()).sum();
    if warnings > 0 {
        println!();
        println!("{} file(s) skipped during scan", warnings);
    }
    if !failed.is_empty() {
        println!("{} user(s) failed and were not recorded: {}", failed.len(), failed.join(", "));
    }

    Ok(())
}

/// Show total usage and the latest snapshot of each user.
fn run_status(config: &MonitorConfig, format: OutputFormat) -> Result<()> {
    let store = open_store(config)?;
    let engine = engine_for(config)?;

    let latest = engine.latest_per_user(&store)?;
    let status = engine.storage_status(engine.total_storage(&latest));

    match format {
        OutputFormat::Text => {
            println!();
            println!("{}", "─".repeat(70));
            println!(" Storage Status");
            println!("{}", "─".repeat(70));
            println!();
            println!(
                " {} of {} used ({:.1}%) - {}",
                format_size(status.used),
                format_size(status.capacity),
                status.percent,
                status.warning_level
            );
            if status.is_over_capacity() {
                println!(" Over capacity by {}", format_size(status.available.unsigned_abs()));
            } else {
                println!(" {} available", format_size(status.available.unsigned_abs()));
            }
            println!();

            if latest.is_empty() {
                println!(" No snapshots recorded yet.");
            } else {
                for snapshot in &latest {
                    let share = if status.used > 0 {
                        snapshot.total_size_bytes as f64 / status.used as f64
                    } else {
                        0.0
                    };
                    println!(
                        "   {:<20} {:>10} {}  {}",
                        truncate(&snapshot.user, 20),
                        format_size(snapshot.total_size_bytes),
                        make_bar(share, 20),
                        snapshot.scan_date.format("%Y-%m-%d %H:%M")
                    );
                }
            }
            println!();
        }
        OutputFormat::Json => {
            let value = serde_json::json!({ "status": status, "users": latest });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
    }

    Ok(())
}

/// Show one user's snapshots within the history window.
fn run_history(
    mut config: MonitorConfig,
    user: &str,
    days: Option<i64>,
    format: OutputFormat,
) -> Result<()> {
    if let Some(days) = days {
        config.history_window_days = days;
        config.validate().context("Invalid history window")?;
    }
    let store = open_store(&config)?;
    let engine = engine_for(&config)?;

    let history = engine.user_history(&store, user, Utc::now())?;

    match format {
        OutputFormat::Text => {
            println!();
            println!(" {} - last {} days", user, config.history_window_days);
            println!();
            if history.is_empty() {
                println!(" No snapshots in this window.");
            }
            let max_size = history.iter().map(|s| s.total_size_bytes).max().unwrap_or(1).max(1);
            for snapshot in &history {
                println!(
                    "   {}  {:>10} {}",
                    snapshot.scan_date.format("%Y-%m-%d %H:%M"),
                    format_size(snapshot.total_size_bytes),
                    make_bar(snapshot.total_size_bytes as f64 / max_size as f64, 30)
                );
            }
            println!();
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&history)?);
        }
    }

    Ok(())
}

/// Show the age distribution for one user or all users.
fn run_ages(config: &MonitorConfig, user: Option<&str>, format: OutputFormat) -> Result<()> {
    let store = open_store(config)?;
    let engine = engine_for(config)?;
    let now = Utc::now();

    let overview = match user {
        Some(user) => vec![engine.user_age_stats(user, &store.file_findings()?, now)],
        None => engine.stored_age_overview(&store, now)?,
    };

    match format {
        OutputFormat::Text => {
            println!();
            println!("{}", "─".repeat(70));
            println!(" Age Distribution Report");
            println!("{}", "─".repeat(70));

            if overview.is_empty() {
                println!();
                println!(" No findings recorded yet.");
            }
            for stats in &overview {
                print_user_ages(stats);
            }
            println!();
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&overview)?);
        }
    }

    Ok(())
}

fn print_user_ages(stats: &UserAgeStats) {
    println!();
    println!(
        " {} ({} files, {})",
        stats.user,
        stats.total_files(),
        format_size(stats.total_size())
    );

    let max_size = stats.buckets.iter().map(|b| b.total_size).max().unwrap_or(1).max(1);
    for bucket in &stats.buckets {
        let oldest = bucket
            .oldest_access
            .map(|t| t.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "   {:<16} {:>10} {:>8} files  oldest {:<10}  {}",
            bucket.bucket.as_ref(),
            format_size(bucket.total_size),
            bucket.count,
            oldest,
            make_bar(bucket.total_size as f64 / max_size as f64, 20)
        );
    }
}

/// List migration candidates.
fn run_report(
    config: &MonitorConfig,
    user: Option<&str>,
    limit: Option<usize>,
    format: OutputFormat,
) -> Result<()> {
    let store = open_store(config)?;
    let engine = engine_for(config)?;

    let report = engine.stored_report(&store, Utc::now())?;

    match format {
        OutputFormat::Text => print_report(&report, user, limit),
        OutputFormat::Json => match user {
            Some(user) => {
                let recs: Vec<_> = report
                    .recommendations_for(user)
                    .take(limit.unwrap_or(usize::MAX))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&recs)?);
            }
            None => println!("{}", serde_json::to_string_pretty(&report)?),
        },
    }

    Ok(())
}

fn print_report(report: &MigrationReport, user: Option<&str>, limit: Option<usize>) {
    println!();
    println!("{}", "─".repeat(70));
    println!(" Cold Storage Migration Report");
    println!("{}", "─".repeat(70));
    println!();

    if !report.has_candidates() {
        println!(
            " No files unused for {} days or more ({} files scanned).",
            report.threshold_days, report.scanned_files
        );
        println!();
        return;
    }

    println!(
        " {} of {} files unused for {}+ days, {} can be freed",
        report.total_files,
        report.scanned_files,
        report.threshold_days,
        format_size(report.total_size)
    );
    println!(
        " {} user(s) affected, {} high priority",
        report.users_affected,
        report.high_priority_count()
    );
    println!();

    for detail in &report.user_details {
        println!(
            "   {:<20} {:>10} {:>8} files  oldest access {}",
            truncate(&detail.user, 20),
            format_size(detail.total_size),
            detail.file_count,
            detail.oldest_access
        );
    }
    println!();

    let selected: Vec<_> = match user {
        Some(user) => report.recommendations_for(user).collect(),
        None => report.recommendations.iter().collect(),
    };
    let shown = limit.unwrap_or(selected.len()).min(selected.len());

    for rec in &selected[..shown] {
        println!(
            "   {:<6} {:<48} {:>10} {:>5}d",
            rec.priority.as_ref(),
            truncate_start(&rec.path.display().to_string(), 48),
            format_size(rec.size_bytes),
            rec.days_unused
        );
    }
    if selected.len() > shown {
        println!("   ... and {} more", selected.len() - shown);
    }
    println!();
}

/// Import snapshots from a legacy database.
fn run_import(config: &MonitorConfig, legacy_db: &Path) -> Result<()> {
    let mut store = open_store(config)?;
    let imported = import_legacy_snapshots(&mut store, legacy_db)
        .with_context(|| format!("Failed to import {}", legacy_db.display()))?;

    info!(rows = imported, "Legacy import complete");
    println!("Imported {} snapshot(s) into {}", imported, config.database.display());
    Ok(())
}

/// Create a simple ASCII bar.
fn make_bar(ratio: f64, width: usize) -> String {
    let filled = (ratio.clamp(0.0, 1.0) * width as f64).round() as usize;
    let empty = width.saturating_sub(filled);
    format!("[{}{}]", "█".repeat(filled), "░".repeat(empty))
}

/// Format size in human-readable form.
fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}

/// Truncate a string to max length, keeping the start.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len - 1).collect();
        format!("{}…", head)
    }
}

/// Truncate a string to max length, keeping the end (file names matter most).
fn truncate_start(s: &str, max_len: usize) -> String {
    let count = s.chars().count();
    if count <= max_len {
        s.to_string()
    } else {
        let tail: String = s.chars().skip(count - (max_len - 1)).collect();
        format!("…{}", tail)
    }
}

/// Parse a size string (e.g., "500GB", "80TB", "1024").
fn parse_size(s: &str) -> Result<i64> {
    let s = s.trim().to_uppercase();
    let digits = s.trim_end_matches(|c: char| !c.is_ascii_digit() && c != '.');

    let multiplier: u64 = match &s[digits.len()..] {
        "" | "B" => 1,
        "K" | "KB" => 1024,
        "M" | "MB" => 1024 * 1024,
        "G" | "GB" => 1024 * 1024 * 1024,
        "T" | "TB" => 1024_u64.pow(4),
        "P" | "PB" => 1024_u64.pow(5),
        unit => bail!("Unknown size unit {:?} in {:?}", unit, s),
    };
    let num: f64 = digits
        .parse()
        .with_context(|| format!("Invalid size {:?}", s))?;

    Ok((num * multiplier as f64) as i64)
}
