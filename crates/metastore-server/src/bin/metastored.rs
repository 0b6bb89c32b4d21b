//! Metastore Server Daemon
//!
//! The `metastored` binary:
//! - Opens the catalog file (or an in-memory catalog)
//! - Serves the gRPC API
//! - Shuts down on SIGTERM/SIGINT
//!
//! # Usage
//!
//! ```bash
//! # Start server with default settings (./hms2.db, port 10010)
//! metastored
//!
//! # Use another catalog file and port
//! metastored --db-path /var/lib/metastore/hms2.db --port 10020
//!
//! # Use configuration file
//! metastored --config /etc/metastore/metastored.toml
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use metastore_server::config::ServerConfig;
use metastore_server::grpc::GrpcServer;
use metastore_store::MetaStore;

/// Metastore Server Daemon
#[derive(Parser, Debug)]
#[command(
    name = "metastored",
    version,
    about = "Metastore catalog server",
    long_about = "Serves a catalog of databases, tables and partitions over gRPC.\n\n\
                  The catalog is kept in a single embedded database file."
)]
struct Args {
    /// Host address to bind to
    #[arg(short = 'H', long, env = "METASTORE_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short = 'p', long, env = "METASTORE_PORT")]
    port: Option<u16>,

    /// Catalog file
    #[arg(short = 'd', long, value_name = "FILE", env = "METASTORE_DB_PATH")]
    db_path: Option<PathBuf>,

    /// Configuration file path
    #[arg(short = 'c', long, value_name = "FILE", env = "METASTORE_CONFIG")]
    config: Option<PathBuf>,

    /// Run in memory-only mode (no persistence)
    #[arg(long)]
    memory: bool,

    /// Fill empty partition locations from the storage descriptor on add
    #[arg(long)]
    copy_sd_location: bool,

    /// Records buffered per list stream
    #[arg(long, env = "METASTORE_STREAM_BUFFER")]
    stream_buffer: Option<usize>,

    /// Enable verbose logging
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", env = "METASTORE_LOG_LEVEL")]
    log_level: String,

    /// Print configuration and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args);

    let config = load_config(&args)?;

    if args.print_config {
        println!("{}", config.to_toml()?);
        return Ok(());
    }

    run_server(config).await
}

fn init_logging(args: &Args) {
    let level = if args.verbose {
        "debug"
    } else {
        &args.log_level
    };

    let filter = EnvFilter::try_new(format!(
        "metastored={level},metastore_server={level},metastore_store={level}"
    ))
    .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

fn load_config(args: &Args) -> Result<ServerConfig> {
    let mut config = if let Some(path) = &args.config {
        ServerConfig::from_file(path)
            .with_context(|| format!("Failed to load config file {}", path.display()))?
    } else {
        ServerConfig::default()
    };

    // Command-line arguments win over the file.
    if let Some(host) = &args.host {
        config.host = host.clone();
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(path) = &args.db_path {
        config.db_path = path.clone();
    }
    if let Some(size) = args.stream_buffer {
        config.stream_buffer = size;
    }
    if args.memory {
        config.memory_mode = true;
    }
    if args.copy_sd_location {
        config.copy_sd_location = true;
    }

    Ok(config)
}

async fn run_server(config: ServerConfig) -> Result<()> {
    if config.memory_mode {
        info!("Starting in memory-only mode (catalog will not be persisted)");
    } else {
        info!("Catalog file: {}", config.db_path.display());
        if let Some(parent) = config.db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).context("Failed to create catalog directory")?;
        }
    }

    let store = MetaStore::open(config.store_config()).context("Failed to open catalog")?;
    let store = Arc::new(store);

    let addr: SocketAddr = config
        .socket_addr()
        .parse()
        .context("Invalid server address")?;

    info!("Server configuration:");
    info!("  Listen address: {}", addr);
    info!("  Stream buffer: {}", config.stream_buffer);
    info!("  Copy sd location: {}", config.copy_sd_location);

    let grpc_server = GrpcServer::new(store, addr).with_stream_buffer(config.stream_buffer);

    info!("Metastore v{} starting on {}", env!("CARGO_PKG_VERSION"), addr);
    info!("Press Ctrl+C to shutdown");

    tokio::select! {
        result = grpc_server.serve() => {
            if let Err(e) = result {
                error!("Server error: {}", e);
                return Err(anyhow::anyhow!("Server error: {}", e));
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
    }

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
