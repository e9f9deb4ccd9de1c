//! Tabula CLI Entry Point
//!
//! Subcommands:
//! - `serve` - run the web viewer (default when no subcommand is given)
//! - `tables` - print the table listing as a JSON envelope
//! - `show` - print one table snapshot as a JSON envelope
//!
//! All output to stdout is JSON. Logs go to stderr.

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

use tabula::{config, server, ErrorEnvelope, Metadata, SuccessEnvelope, TabulaError, Viewer};

/// Tabula - browse database tables from a web page
#[derive(Parser)]
#[command(name = "tabula")]
#[command(about = "Web viewer for the tables of one database")]
#[command(version)]
struct Cli {
    /// Config file (defaults to .tabula/config.json, then the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server
    Serve {
        /// Address to listen on (overrides config)
        #[arg(long)]
        bind: Option<SocketAddr>,
    },

    /// List tables and views
    Tables,

    /// Print the columns and rows of one table
    Show {
        /// Table name, exactly as listed
        table: String,

        /// Row limit for this call (overrides config)
        #[arg(long)]
        max_rows: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    init_logging();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Serve { bind: None }) {
        Commands::Serve { bind } => {
            let mut config =
                config::load(cli.config.as_deref()).context("failed to load configuration")?;
            if let Some(bind) = bind {
                config.server.bind = bind;
            }
            server::serve(config).await.context("server failed")?;
            Ok(ExitCode::SUCCESS)
        }

        Commands::Tables => {
            let start = Instant::now();
            let viewer = match load_viewer(cli.config, None) {
                Ok(viewer) => viewer,
                Err(e) => return emit_error("", "tables", &e),
            };
            let engine = viewer.engine().as_str();

            match viewer.list_tables().await {
                Ok(tables) => {
                    let meta = Metadata::new(start.elapsed().as_millis() as u64);
                    emit(&SuccessEnvelope::new(
                        engine,
                        "tables",
                        serde_json::json!({ "tables": tables }),
                        meta,
                    ))?;
                    Ok(ExitCode::SUCCESS)
                }
                Err(e) => emit_error(engine, "tables", &e),
            }
        }

        Commands::Show { table, max_rows } => {
            let start = Instant::now();
            let viewer = match load_viewer(cli.config, max_rows) {
                Ok(viewer) => viewer,
                Err(e) => return emit_error("", "show", &e),
            };
            let engine = viewer.engine().as_str();

            match viewer.render_table(&table).await {
                Ok(snapshot) => {
                    let meta = Metadata::with_rows(
                        start.elapsed().as_millis() as u64,
                        snapshot.row_count(),
                        snapshot.truncated,
                    );
                    emit(&SuccessEnvelope::new(engine, "show", snapshot, meta))?;
                    Ok(ExitCode::SUCCESS)
                }
                Err(e) => emit_error(engine, "show", &e),
            }
        }
    }
}

/// Logs go to stderr so stdout stays machine-readable
fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("tabula=info,tower_http=info"));

    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn load_viewer(
    config_path: Option<PathBuf>,
    max_rows: Option<usize>,
) -> Result<Viewer, TabulaError> {
    let config = config::load(config_path.as_deref())?;
    let mut limits = config.limits;
    if max_rows.is_some() {
        limits.max_rows = max_rows;
    }
    Ok(Viewer::new(config.connection, limits))
}

fn emit<T: Serialize>(envelope: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string(envelope).context("failed to serialize output")?;
    println!("{json}");
    Ok(())
}

fn emit_error(engine: &str, command: &str, err: &TabulaError) -> anyhow::Result<ExitCode> {
    if err.is_client_error() {
        tracing::warn!(command, error = %err, "command rejected");
    } else {
        tracing::error!(command, error = %err, "command failed");
    }
    emit(&ErrorEnvelope::from_error(engine, command, err))?;
    Ok(ExitCode::FAILURE)
}
