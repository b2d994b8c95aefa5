//! Command-line interface for csv-snowflake-loader
//!
//! # Usage Examples
//!
//! ```bash
//! # Connection settings from the environment (or a .env file)
//! export SNOWFLAKE_USER=LOADER SNOWFLAKE_PASSWORD=... SNOWFLAKE_ACCOUNT=xy12345.us-east-1
//! export SNOWFLAKE_WAREHOUSE=LOAD_WH SNOWFLAKE_DATABASE=ANALYTICS SNOWFLAKE_SCHEMA=PUBLIC
//! export SNOWFLAKE_ROLE=LOADER_ROLE
//!
//! # Create the table if needed and append the file
//! csv-snowflake-loader --file orders.csv --table ORDERS
//!
//! # Replace the table contents, forcing a column type
//! csv-snowflake-loader --file orders.csv --table ORDERS --overwrite --column-type zip=utf8
//!
//! # Show the statements without connecting
//! csv-snowflake-loader --file orders.csv --table ORDERS --dry-run
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{ArgAction, Parser};
use csv_snowflake_loader::ingestion::CsvOptions;
use csv_snowflake_loader::pipeline::{LoadRequest, plan_load, run_load};
use csv_snowflake_loader::reporting::{CompositeReporter, FileReporter, StdOutReporter};
use csv_snowflake_loader::types::DataType;
use csv_snowflake_loader::warehouse::{
    ConnectionParams, DEFAULT_CHUNK_SIZE, TableType, UploadOptions,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "csv-snowflake-loader")]
#[command(about = "Load a CSV file into a Snowflake table", version)]
#[command(long_about = None)]
struct Cli {
    /// Input CSV file (header row required)
    #[arg(long, env = "CSV_PATH")]
    file: PathBuf,

    /// Destination table
    #[arg(long, env = "SNOWFLAKE_TABLE")]
    table: String,

    /// Snowflake connection options
    #[command(flatten)]
    connection: ConnectionParams,

    /// Create the table from the inferred schema when it does not exist
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    auto_create_table: bool,

    /// Delete existing rows before inserting (in the same transaction)
    #[arg(long)]
    overwrite: bool,

    /// Maximum rows per INSERT batch
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Kind of table created by --auto-create-table
    #[arg(long, value_enum, default_value_t = TableType::Permanent)]
    table_type: TableType,

    /// Quote table and column names so they keep their exact case
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    quote_identifiers: bool,

    /// Field delimiter (single ASCII character)
    #[arg(long, default_value_t = ',')]
    delimiter: char,

    /// Force a column type, e.g. `zip=utf8` (repeatable)
    #[arg(long = "column-type", value_name = "NAME=TYPE", value_parser = parse_column_type)]
    column_types: Vec<(String, DataType)>,

    /// Also append progress lines to this file
    #[arg(long, env = "LOADER_REPORT_FILE")]
    report_file: Option<PathBuf>,

    /// Load the file and print the statements without connecting
    #[arg(long)]
    dry_run: bool,
}

fn parse_column_type(s: &str) -> Result<(String, DataType), String> {
    let (name, ty) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=TYPE, got '{s}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing column name in '{s}'"));
    }
    Ok((name.to_string(), ty.parse()?))
}

fn main() -> anyhow::Result<()> {
    if let Err(e) = run() {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Logs go to stderr; stdout carries the progress report.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if !cli.delimiter.is_ascii() {
        anyhow::bail!("delimiter must be a single ASCII character, got '{}'", cli.delimiter);
    }

    let request = LoadRequest {
        path: cli.file,
        table: cli.table,
        connection: cli.connection,
        csv: CsvOptions {
            delimiter: cli.delimiter as u8,
            type_overrides: cli.column_types,
            ..CsvOptions::default()
        },
        upload: UploadOptions {
            auto_create_table: cli.auto_create_table,
            overwrite: cli.overwrite,
            chunk_size: cli.chunk_size,
            quote_identifiers: cli.quote_identifiers,
            table_type: cli.table_type,
        },
    };

    let mut reporter = CompositeReporter::default();
    reporter.push(Arc::new(StdOutReporter));
    if let Some(path) = &cli.report_file {
        reporter.push(Arc::new(FileReporter::new(path)));
    }

    if cli.dry_run {
        plan_load(&request, &reporter).context("Dry run failed")?;
        return Ok(());
    }

    run_load(&request, &reporter)
        .with_context(|| format!("Failed to load {}", request.path.display()))?;
    Ok(())
}
