//! Command-line driver for the agreement handlers.
//!
//! # Responsibility
//! - Feed one gateway event (file or stdin) to a handler and print the
//!   response envelope.
//! - Provision the agreement table for local use.

use agreement_api::api::handle_event;
use agreement_api::Operation;
use agreement_core::{core_version, default_log_level, init_logging, provision_table, StoreConfig};
use clap::{Args, Parser, Subcommand};
use log::info;
use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

const LOG_DIR_ENV: &str = "AGREEMENT_LOG_DIR";
const LOG_LEVEL_ENV: &str = "AGREEMENT_LOG_LEVEL";

#[derive(Parser)]
#[command(name = "agreement")]
#[command(about = "Create, read, update and delete agreements with optimistic concurrency")]
struct Cli {
    /// Agreement table name (overrides TABLE_NAME)
    #[arg(long, global = true)]
    table: Option<String>,

    /// SQLite database file (overrides ENDPOINT_OVERRIDE)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create an agreement from the event body
    Create(EventArgs),
    /// Read the agreement named by the event path parameter
    Get(EventArgs),
    /// Update the agreement named by the event path parameter
    Update(EventArgs),
    /// Delete the agreement named by the event path parameter
    Delete(EventArgs),
    /// Create the agreement table if it does not exist
    Provision,
    /// Print the core crate version
    Version,
}

#[derive(Args)]
struct EventArgs {
    /// Gateway event JSON file; stdin when omitted
    #[arg(short, long)]
    event: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging_from_env();

    let mut config = StoreConfig::from_env();
    if let Some(table) = cli.table {
        config.table_name = table;
    }
    if let Some(db) = cli.db {
        config.db_path = db;
    }

    match run(cli.command, &config) {
        Ok(code) => code,
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command, config: &StoreConfig) -> Result<ExitCode, String> {
    let (operation, args) = match command {
        Command::Create(args) => (Operation::Create, args),
        Command::Get(args) => (Operation::Get, args),
        Command::Update(args) => (Operation::Update, args),
        Command::Delete(args) => (Operation::Delete, args),
        Command::Provision => return provision(config),
        Command::Version => {
            println!("agreement_core version={}", core_version());
            return Ok(ExitCode::SUCCESS);
        }
    };

    let raw_event = read_event(args.event.as_ref())?;
    let response = handle_event(config, operation.as_str(), &raw_event);
    println!("{}", response.to_json());
    if response.status_code < 400 {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

fn provision(config: &StoreConfig) -> Result<ExitCode, String> {
    let conn = config
        .open_connection()
        .map_err(|err| format!("open {} failed: {err}", config.db_path.display()))?;
    provision_table(&conn, &config.table_name).map_err(|err| err.to_string())?;
    info!(
        "event=cli_provision module=cli status=ok table={} db_path={}",
        config.table_name,
        config.db_path.display()
    );
    println!(
        "table {} ready in {}",
        config.table_name,
        config.db_path.display()
    );
    Ok(ExitCode::SUCCESS)
}

fn read_event(path: Option<&PathBuf>) -> Result<String, String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .map_err(|err| format!("read {} failed: {err}", path.display())),
        None => {
            let mut raw = String::new();
            std::io::stdin()
                .read_to_string(&mut raw)
                .map_err(|err| format!("read stdin failed: {err}"))?;
            Ok(raw)
        }
    }
}

/// Enables file logging only when a log directory is configured.
fn init_logging_from_env() {
    let Some(log_dir) = std::env::var(LOG_DIR_ENV)
        .ok()
        .filter(|dir| !dir.trim().is_empty())
    else {
        return;
    };
    let level = std::env::var(LOG_LEVEL_ENV).unwrap_or_else(|_| default_log_level().to_string());
    if let Err(err) = init_logging(&level, &log_dir) {
        eprintln!("warning: logging disabled: {err}");
    }
}
