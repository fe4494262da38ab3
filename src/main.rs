use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

use offer_watcher::scheduler::RunScheduler;
use offer_watcher::utils::telemetry;
use offer_watcher::{AppConfig, OfferStore, OfferWatcher, RunMode, RunSummary};

#[derive(Parser)]
#[command(name = "offer-watcher", version, about = "Watches classified-ad sites for new offers")]
struct Cli {
    /// Configuration file (defaults to config/default.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scrape once, notify about new offers and record them
    Run {
        /// Only log what is new; never notify or record
        #[arg(long)]
        dry_run: bool,
    },
    /// Scrape periodically until interrupted
    Watch {
        /// Six-field cron expression overriding scheduler.cron
        #[arg(long)]
        cron: Option<String>,
    },
    /// Print what the offer store holds
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    let _log_guard = telemetry::init_tracing(&config.logging)?;
    telemetry::init_metrics(&config.metrics)?;

    match cli.command {
        Command::Run { dry_run } => {
            let mode = if dry_run { RunMode::DryRun } else { RunMode::Commit };
            let mut watcher = OfferWatcher::from_config(&config)?;
            let summary = watcher.run_once(mode).await?;
            print_summary(&summary);
        }
        Command::Watch { cron } => {
            if let Some(cron) = cron {
                config.scheduler.cron = cron;
            }
            watch(config).await?;
        }
        Command::Stats => {
            let store = OfferStore::load(&config.store.path);
            println!("{}: {} known offers", store.path().display(), store.len());
        }
    }

    Ok(())
}

async fn watch(config: AppConfig) -> Result<()> {
    info!("Starting Offer Watcher...");
    let watcher = OfferWatcher::from_config(&config)?;
    let mut scheduler = RunScheduler::new(watcher, config.scheduler.clone()).await?;

    if config.scheduler.run_on_start {
        if let Some(summary) = scheduler.run_now().await {
            print_summary(&summary);
        }
    }

    scheduler.start().await?;
    tokio::signal::ctrl_c().await?;

    info!("Shutting down...");
    scheduler.shutdown().await?;
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!(
        "run {} ({:?}): {} urls, {} offers, {} new, {} notified, {} failed, store size {}",
        summary.run_id,
        summary.mode,
        summary.urls_scraped,
        summary.offers_found,
        summary.new_offers,
        summary.notifications_delivered,
        summary.notifications_failed,
        summary.store_size
    );
}
