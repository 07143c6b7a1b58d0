//! Maintenance CLI for the call log database.
//!
//! # Responsibility
//! - Provide a small executable to verify `calllog_core` linkage.
//! - Offer read-only reporting (years, statistics, CSV export) without the UI.

use anyhow::{Context, Result};
use calllog_core::export::csv::{calls_to_csv, export_file_name};
use calllog_core::{
    open_db, AppConfig, CallService, SqliteCallRepository, SqliteSettingsRepository,
    SqliteUserRepository, UserFilter, UserRepository,
};
use chrono::{Datelike, Local};
use clap::{Parser, Subcommand};
use rusqlite::Connection;
use std::collections::HashMap;
use std::path::PathBuf;

/// Fire/EMS call log tools.
#[derive(Parser)]
#[command(name = "calllog")]
#[command(about = "Inspect and export the fire/EMS call log", long_about = None)]
struct Cli {
    /// Database file; defaults to `CALLLOG_DB_PATH` or `fd-calls.db`.
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print core health and version.
    Ping,

    /// List the years that have calls, newest first.
    Years,

    /// Show call totals for one year.
    Stats {
        /// Calendar year; defaults to the current year.
        #[arg(long)]
        year: Option<i32>,
    },

    /// Write one year of calls as CSV.
    Export {
        /// Calendar year; defaults to the current year.
        #[arg(long)]
        year: Option<i32>,

        /// Output directory for `calls-export-<date>.csv`.
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = AppConfig::from_env();
    if let Some(db) = cli.db {
        config.db_path = db;
    }
    if let Some(log_dir) = &config.log_dir {
        calllog_core::init_logging(&config.log_level, &log_dir.to_string_lossy())
            .context("failed to initialize logging")?;
    }

    let current_year = Local::now().year();
    match cli.command {
        Commands::Ping => {
            println!("calllog_core ping={}", calllog_core::ping());
            println!("calllog_core version={}", calllog_core::core_version());
            Ok(())
        }
        Commands::Years => {
            let conn = open(&config)?;
            for year in calls(&conn).list_call_years(current_year)? {
                println!("{year}");
            }
            Ok(())
        }
        Commands::Stats { year } => {
            let conn = open(&config)?;
            let stats = calls(&conn).year_statistics(year.unwrap_or(current_year))?;
            println!("year={}", stats.year);
            println!("total={}", stats.total);
            println!("mutual_aid_given={}", stats.mutual_aid_given);
            println!("mutual_aid_received={}", stats.mutual_aid_received);
            println!(
                "most_common_call_type={}",
                stats.most_common_call_type.as_deref().unwrap_or("-")
            );
            Ok(())
        }
        Commands::Export { year, out } => {
            let conn = open(&config)?;
            export(&conn, year.unwrap_or(current_year), &out)
        }
    }
}

fn open(config: &AppConfig) -> Result<Connection> {
    open_db(&config.db_path)
        .with_context(|| format!("failed to open database {}", config.db_path.display()))
}

fn calls(conn: &Connection) -> CallService<SqliteCallRepository<'_>, SqliteSettingsRepository<'_>> {
    CallService::new(
        SqliteCallRepository::new(conn),
        SqliteSettingsRepository::new(conn),
    )
}

fn export(conn: &Connection, year: i32, out: &std::path::Path) -> Result<()> {
    let calls = calls(conn).list_calls_by_year(year)?;
    let names: HashMap<_, _> = SqliteUserRepository::new(conn)
        .list_users(UserFilter::All)?
        .into_iter()
        .map(|user| (user.id, user.display_name()))
        .collect();

    let path = out.join(export_file_name(Local::now().date_naive()));
    std::fs::write(&path, calls_to_csv(&calls, &names))
        .with_context(|| format!("failed to write {}", path.display()))?;
    println!("exported {} call(s) to {}", calls.len(), path.display());
    Ok(())
}
