use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use campuswatch::analytics::{AnalyticsEngine, Report};
use campuswatch::config::{CampusWatchConfig, LoggingConfig};
use campuswatch::storage;

#[derive(Parser)]
#[command(
    name = "campuswatch",
    about = "Geotagged campus incident reporting with spatial and temporal analytics",
    version,
    long_about = None
)]
struct Cli {
    /// Path to a TOML config file; it must exist and be valid
    #[arg(long, global = true, env = "CAMPUSWATCH_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Bind address (overrides `server.bind`)
        #[arg(long)]
        bind: Option<String>,

        /// SQLite database path (overrides `storage.db_path`)
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Create the database schema and insert sample incidents
    InitDb {
        /// SQLite database path (overrides `storage.db_path`)
        #[arg(long)]
        db: Option<PathBuf>,

        /// Only create the schema
        #[arg(long)]
        no_seed: bool,
    },

    /// Compute an analytics report and print it as JSON
    Analyze {
        #[command(subcommand)]
        report: AnalyzeReport,

        /// SQLite database path (overrides `storage.db_path`)
        #[arg(long, global = true)]
        db: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum AnalyzeReport {
    /// Severity-weighted points for active incidents
    Heatmap,
    /// DBSCAN clusters of incident locations
    Clusters,
    /// Daily and hourly incident histograms
    Trends,
    /// Headline counts by status, type and severity
    Summary,
    /// Proximity buffers around active high-severity incidents
    Buffer {
        /// Buffer radius in meters
        #[arg(long, allow_hyphen_values = true)]
        distance: f64,
    },
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));
    // Logs go to stderr so `analyze` output stays pipeable.
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn print_report<T: Serialize>(report: Report<T>) -> Result<()> {
    if report.skipped > 0 {
        tracing::warn!(skipped = report.skipped, "some incident records were skipped");
    }
    println!("{}", serde_json::to_string_pretty(&report.body)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = CampusWatchConfig::resolve(cli.config.as_deref())?;
    init_tracing(&config.logging);

    match cli.command {
        Commands::Serve { bind, db } => {
            if let Some(bind) = bind {
                config.server.bind = bind;
            }
            if let Some(db) = db {
                config.storage.db_path = db;
            }
            tracing::info!(bind = %config.server.bind, "Starting campuswatch server");
            campuswatch::serve(&config).await?;
        }
        Commands::InitDb { db, no_seed } => {
            let path = db.unwrap_or(config.storage.db_path);
            let (_, seeded) = storage::open_store(&path, !no_seed)?;
            println!("Database ready at {} ({} sample incidents inserted)", path.display(), seeded);
        }
        Commands::Analyze { report, db } => {
            let path = db.unwrap_or(config.storage.db_path);
            let pool = storage::open_pool(&path)?;
            let store = storage::IncidentStore::new(pool);
            let engine = AnalyticsEngine::new(Arc::new(store), config.analytics);

            let result = tokio::task::spawn_blocking(move || -> Result<()> {
                match report {
                    AnalyzeReport::Heatmap => print_report(engine.heatmap()?),
                    AnalyzeReport::Clusters => print_report(engine.clusters()?),
                    AnalyzeReport::Trends => print_report(engine.trends()?),
                    AnalyzeReport::Summary => print_report(engine.summary()?),
                    AnalyzeReport::Buffer { distance } => print_report(engine.buffers(distance)?),
                }
            })
            .await
            .context("analytics task panicked")?;
            result?;
        }
    }

    Ok(())
}
