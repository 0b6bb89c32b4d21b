//! Metastore Command-Line Interface
//!
//! Browse and edit a metastore catalog from the shell.
//!
//! # Usage
//!
//! ```bash
//! # List databases of the default catalog
//! metastore databases list
//!
//! # Create a partitioned table
//! metastore tables create sales orders --partition-key year:int --partition-key month:int
//!
//! # Add and list partitions, as JSON
//! metastore partitions add sales orders 2023 11 --location s3://warehouse/orders/2023/11
//! metastore -o json partitions list sales orders
//! ```

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

mod commands;
mod formatter;

use commands::{DatabaseCommand, Executor, PartitionCommand, TableCommand};
use formatter::OutputFormat;
use metastore_common::constants::DEFAULT_PORT;

/// Metastore command-line interface
#[derive(Parser, Debug)]
#[command(
    name = "metastore",
    version,
    about = "Command-line interface for the metastore",
    long_about = "Browse and edit the databases, tables and partitions of a metastore catalog."
)]
struct Args {
    /// Server hostname
    #[arg(short = 'H', long, default_value = "localhost", env = "METASTORE_HOST")]
    host: String,

    /// Server port
    #[arg(short = 'p', long, default_value_t = DEFAULT_PORT, env = "METASTORE_PORT")]
    port: u16,

    /// Catalog name
    #[arg(short = 'C', long, default_value = "hive", env = "METASTORE_CATALOG")]
    catalog: String,

    /// Output format
    #[arg(short = 'o', long, value_enum, default_value = "table")]
    output: OutputFormatArg,

    /// Enable verbose output
    #[arg(short = 'v', long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Manage databases
    #[command(subcommand)]
    Databases(DatabaseCommand),
    /// Manage tables
    #[command(subcommand)]
    Tables(TableCommand),
    /// Manage partitions
    #[command(subcommand)]
    Partitions(PartitionCommand),
}

/// Output format argument
#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormatArg {
    /// Display results in a formatted table
    Table,
    /// Display results as JSON
    Json,
}

impl From<OutputFormatArg> for OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Table => OutputFormat::Table,
            OutputFormatArg::Json => OutputFormat::Json,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose);

    let endpoint = format!("http://{}:{}", args.host, args.port);
    let mut executor = Executor::connect(endpoint, args.catalog, args.output.into()).await?;

    let output = match args.command {
        Command::Databases(cmd) => executor.database(cmd).await?,
        Command::Tables(cmd) => executor.table(cmd).await?,
        Command::Partitions(cmd) => executor.partition(cmd).await?,
    };
    println!("{output}");
    Ok(())
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("metastore=debug")
    } else {
        EnvFilter::new("metastore=warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();
}
