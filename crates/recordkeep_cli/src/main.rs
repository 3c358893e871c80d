//! Command-line host for record lifecycle workflows.
//!
//! # Responsibility
//! - Load configuration, initialize logging and open the record database.
//! - Expose each lifecycle workflow as a subcommand with plain-text output.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use recordkeep_core::db::open_db;
use recordkeep_core::{
    default_log_level, init_logging, Record, RecordId, RecordKeepConfig, RecordLifecycleService,
    RecordRepository, SqliteRecordRepository, DEFAULT_IMPORT_COUNT,
};
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG_PATH: &str = "recordkeep.json";

#[derive(Debug, Parser)]
#[command(name = "recordkeep", version, about = "Named, timestamped record store")]
struct Cli {
    /// JSON settings file. The default path may be absent.
    #[arg(long, env = "RECORDKEEP_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// SQLite database file; overrides `database.path`.
    #[arg(long, env = "RECORDKEEP_DB")]
    db: Option<PathBuf>,

    /// trace|debug|info|warn|error; overrides `logging.level`.
    #[arg(long)]
    log_level: Option<String>,

    /// Directory for rolling log files; overrides `logging.dir`.
    #[arg(long)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand, PartialEq, Eq)]
enum Command {
    /// Purge, seed, report, then list every record.
    Run,
    /// Print today's and total record counts.
    Report,
    /// Delete records older than the retention window.
    Purge {
        /// Retention in days; overrides `business_rules.data_retention_days`.
        #[arg(long)]
        days: Option<u32>,
    },
    /// Insert missing seed catalog entries.
    Seed,
    /// Insert synthetic `LoadTest-N` records in batches.
    Import {
        #[arg(long, default_value_t = DEFAULT_IMPORT_COUNT)]
        count: u64,
    },
    /// List all records oldest first.
    List,
    /// Insert one record.
    Add { name: String },
    /// Show one record by id.
    Get {
        #[arg(allow_negative_numbers = true)]
        id: RecordId,
    },
    /// Delete one record by id.
    Remove {
        #[arg(allow_negative_numbers = true)]
        id: RecordId,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    start_logging(&cli, &config)?;

    let db_path = cli.db.clone().unwrap_or_else(|| config.database.path.clone());
    let conn = open_db(&db_path)
        .with_context(|| format!("failed to open database `{}`", db_path.display()))?;
    info!(
        "event=cli_start module=cli status=ok db_path={}",
        db_path.display()
    );

    let service = RecordLifecycleService::new(SqliteRecordRepository::new(conn));
    run_command(&service, &config, cli.command.unwrap_or(Command::Run))
}

fn load_config(path: &Path) -> Result<RecordKeepConfig> {
    if path == Path::new(DEFAULT_CONFIG_PATH) && !path.exists() {
        return Ok(RecordKeepConfig::default());
    }
    RecordKeepConfig::load(path)
        .with_context(|| format!("failed to load config `{}`", path.display()))
}

fn start_logging(cli: &Cli, config: &RecordKeepConfig) -> Result<()> {
    let Some(dir) = cli.log_dir.as_ref().or(config.logging.dir.as_ref()) else {
        return Ok(());
    };
    let level = cli
        .log_level
        .as_deref()
        .or(config.logging.level.as_deref())
        .unwrap_or_else(|| default_log_level());

    let dir = if dir.is_absolute() {
        dir.clone()
    } else {
        std::env::current_dir()
            .context("failed to resolve working directory")?
            .join(dir)
    };
    init_logging(level, &dir).context("failed to initialize logging")?;
    Ok(())
}

fn run_command(
    service: &RecordLifecycleService<SqliteRecordRepository>,
    config: &RecordKeepConfig,
    command: Command,
) -> Result<()> {
    let rules = &config.business_rules;
    match command {
        Command::Run => {
            println!("Starting operations...\n");
            purge(service, rules.data_retention_days)?;
            seed(service, config)?;
            report(service)?;
            println!();
            list(service)?;
        }
        Command::Report => report(service)?,
        Command::Purge { days } => purge(service, days.unwrap_or(rules.data_retention_days))?,
        Command::Seed => seed(service, config)?,
        Command::Import { count } => {
            let summary = service.bulk_import(count)?;
            println!("Imported {} records", summary.inserted);
        }
        Command::List => list(service)?,
        Command::Add { name } => {
            let record = service.add_record(&name)?;
            println!("Added {}", describe(&record));
        }
        Command::Get { id } => match service.get_record(id)? {
            Some(record) => println!("{}", describe(&record)),
            None => println!("Record {id} not found"),
        },
        Command::Remove { id } => {
            if service.remove_record(id)? {
                println!("Removed record {id}");
            } else {
                println!("Record {id} not found");
            }
        }
    }
    Ok(())
}

fn report(service: &RecordLifecycleService<SqliteRecordRepository>) -> Result<()> {
    let report = service.report_daily()?;
    println!(
        "Daily Report: {} records created today, {} records total",
        report.today_count, report.total_count
    );
    Ok(())
}

fn purge(service: &RecordLifecycleService<SqliteRecordRepository>, days: u32) -> Result<()> {
    let summary = service.purge_expired(days)?;
    println!(
        "Cleanup completed: removed {} records older than {days} days",
        summary.removed_count
    );
    Ok(())
}

fn seed(
    service: &RecordLifecycleService<SqliteRecordRepository>,
    config: &RecordKeepConfig,
) -> Result<()> {
    let summary = service.seed_from_catalog(
        &config.business_rules.batch_operation_prefix,
        &config.seed_data.products,
    )?;
    println!(
        "Seed completed: {} new records added, {} duplicates skipped",
        summary.inserted, summary.skipped
    );
    Ok(())
}

fn list(service: &RecordLifecycleService<SqliteRecordRepository>) -> Result<()> {
    println!(
        "Total records in database: {}",
        service.repository().count()?
    );
    for record in service.records() {
        println!("  - {}", describe(&record?));
    }
    Ok(())
}

fn describe(record: &Record) -> String {
    format!(
        "{} (ID: {}, Created: {})",
        record.name,
        record.id,
        record.created_at.format("%Y-%m-%d %H:%M:%S")
    )
}
