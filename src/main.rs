//! # fetcher
//!
//! Loads Stack Overflow and related crawl data into SQLite in batches and
//! serves a small listing of matching posts.

#![deny(unsafe_code)]

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use fetcher_settings::FetcherSettings;
use fetcher_store::ingest::load_with_retries;
use fetcher_store::{schema, BatchInserter, Database};
use fetcher_telemetry::TelemetryConfig;

#[derive(Parser, Debug)]
#[command(name = "fetcher", about = "Batch loader and post browser")]
struct Cli {
    /// Settings file (defaults to `fetcher.json` in the working directory).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the database and all tables.
    Init,
    /// Load a JSON-lines file into a table.
    Load {
        table: String,
        file: PathBuf,
        #[arg(long)]
        batch_size: Option<usize>,
        /// Pad each batch with nulls so every row has the same fields.
        #[arg(long)]
        fill_missing: bool,
        /// Extra attempts for a batch whose write fails.
        #[arg(long, default_value_t = 0)]
        retries: u32,
    },
    /// Serve the post listing until interrupted.
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    fetcher_telemetry::init_telemetry(&TelemetryConfig {
        json: cli.json_logs,
        ..Default::default()
    })?;

    let settings_path = cli.config.clone().unwrap_or_else(fetcher_settings::settings_path);
    let settings = fetcher_settings::load_settings_from_path(&settings_path)
        .with_context(|| format!("Failed to load settings from {}", settings_path.display()))?;

    let db = Database::open(&settings.database.path).with_context(|| {
        format!("Failed to open database {}", settings.database.path.display())
    })?;

    match cli.command {
        Command::Init => {
            tracing::info!(tables = schema::TABLES.len(), "database ready");
        }
        Command::Load {
            table,
            file,
            batch_size,
            fill_missing,
            retries,
        } => {
            let batch_size = batch_size.unwrap_or(settings.loader.batch_size);
            let fill = fill_missing || settings.loader.fill_missing_fields;
            load(&db, &table, &file, batch_size, fill, retries)?;
        }
        Command::Serve => serve(&settings, db).await?,
    }

    Ok(())
}

fn load(
    db: &Database,
    table: &str,
    file: &Path,
    batch_size: usize,
    fill_missing: bool,
    retries: u32,
) -> Result<()> {
    let Some(table) = schema::table(table) else {
        bail!("Unknown table: {table}");
    };
    let input =
        File::open(file).with_context(|| format!("Failed to open {}", file.display()))?;

    let mut inserter = BatchInserter::new(db.clone(), table, batch_size, fill_missing)?;
    let report = load_with_retries(BufReader::new(input), &mut inserter, retries)
        .with_context(|| {
            format!(
                "Failed to load {} into {} ({} rows left unwritten)",
                file.display(),
                table.name,
                inserter.len()
            )
        })?;

    tracing::info!(
        table = table.name,
        read = report.read,
        written = report.written,
        retried = report.retried,
        "load complete"
    );
    Ok(())
}

async fn serve(settings: &FetcherSettings, db: Database) -> Result<()> {
    let config = fetcher_server::ServerConfig {
        host: settings.server.host.clone(),
        port: settings.server.port,
        search_term: settings.server.search_term.clone(),
        result_limit: settings.server.result_limit,
        ..Default::default()
    };
    let handle = fetcher_server::start(config, db)
        .await
        .context("Failed to start server")?;

    tracing::info!(port = handle.port, "fetcher server ready");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl+c")?;

    tracing::info!("Shutting down");
    Ok(())
}
