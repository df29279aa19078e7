//! Job scraper daemon.
//!
//! Runs a scrape cycle immediately and then on a fixed interval until
//! interrupted. `once` runs a single cycle and prints its report; `migrate`
//! only prepares the database.

use anyhow::{Context, Result};
use browser_session::{ChromiumConfig, ChromiumEngine};
use clap::{Parser, Subcommand};
use job_scraper::{db, telemetry, Config, PgJobStore, Scheduler, ScrapeCycle};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "job-scraper")]
#[command(about = "Scrape job listings into Postgres on a schedule")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run cycles on the configured interval until Ctrl-C (default)
    Run,

    /// Run a single cycle and print its report as JSON
    Once,

    /// Create the database if needed and apply migrations
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::from_env().context("Failed to load configuration")?;
    telemetry::init(config.log_file.as_deref())?;

    info!("Starting job scraper");

    let pool = db::prepare(&config)
        .await
        .context("Failed to prepare database")?;

    if let Some(Commands::Migrate) = cli.command {
        info!("Database ready");
        return Ok(());
    }

    let mut chromium = ChromiumConfig::default().with_headless(config.headless);
    if let Some(path) = &config.chrome_executable {
        chromium = chromium.with_executable(path.clone());
    }

    let cycle = ScrapeCycle::new(
        ChromiumEngine::new(chromium),
        PgJobStore::new(pool),
        config.scrape.clone(),
    )
    .context("Invalid card selectors")?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Once => {
            let report = cycle.run().await;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Run | Commands::Migrate => {
            let shutdown = CancellationToken::new();
            tokio::spawn({
                let shutdown = shutdown.clone();
                async move {
                    match tokio::signal::ctrl_c().await {
                        Ok(()) => info!("Shutdown requested, finishing current cycle"),
                        Err(e) => warn!(error = %e, "Failed to listen for Ctrl-C, shutting down"),
                    }
                    shutdown.cancel();
                }
            });

            Scheduler::new(cycle, config.scheduler.clone())
                .run(shutdown)
                .await;
        }
    }

    info!("Job scraper stopped");
    Ok(())
}
