mod commands;
mod config;

use clap::{Parser, ValueEnum};
use owo_colors::OwoColorize;
use std::path::PathBuf;
use std::process::ExitCode;
use thiserror::Error;

/// Create the application schema and load delimited files into Postgres.
#[derive(Parser, Debug)]
#[command(name = "dbloader", version)]
struct Cli {
    /// Operation to run
    #[arg(long, value_enum)]
    operation: Operation,

    /// Table to load into (required for load-csv)
    #[arg(long = "table_name", required_if_eq("operation", "load-csv"))]
    table_name: Option<String>,

    /// Input file, relative to STORAGE_PATH (required for load-csv)
    #[arg(long, required_if_eq("operation", "load-csv"))]
    file: Option<PathBuf>,

    /// Field delimiter of the input file
    #[arg(long, default_value = ",", value_parser = parse_delimiter)]
    delimiter: u8,

    /// Print the planned DDL without applying it (create-schema)
    #[arg(long)]
    dry_run: bool,

    /// Log every executed statement
    #[arg(short, long)]
    verbose: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Operation {
    /// Create missing tables and add missing columns
    CreateSchema,
    /// Append a delimited file to an existing table
    LoadCsv,
}

fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value.as_bytes() {
        [b] if b.is_ascii() => Ok(*b),
        _ => Err(format!("delimiter must be a single ASCII character, got {value:?}")),
    }
}

#[derive(Debug, Error)]
enum CliError {
    #[error("{0}")]
    Usage(&'static str),

    #[error(transparent)]
    Config(#[from] config::ConfigError),

    #[error("failed to connect to {target}: {source}")]
    Connect {
        target: String,
        #[source]
        source: tokio_postgres::Error,
    },

    #[error("transaction failed: {0}")]
    Transaction(#[source] tokio_postgres::Error),

    #[error(transparent)]
    Dbloader(#[from] dbloader::Error),
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_tracing(cli.verbose);
    config::load_dotenv();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", "error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr; `RUST_LOG` overrides the default filter.
fn init_tracing(verbose: bool) {
    let directive = if verbose { "dbloader=debug" } else { "dbloader=info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(directive));

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = config::Config::from_env()?;

    match cli.operation {
        Operation::CreateSchema => commands::create_schema(&config.db, cli.dry_run).await,
        Operation::LoadCsv => match (cli.table_name, cli.file) {
            (Some(table), Some(file)) => {
                let path = config.resolve_input(&file)?;
                commands::load_csv(&config.db, &table, &path, cli.delimiter).await
            }
            _ => Err(CliError::Usage(
                "--table_name and --file are required for load-csv",
            )),
        },
    }
}
