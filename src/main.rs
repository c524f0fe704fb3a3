use anyhow::{Context, Result, bail};
use beachcast::api::AppState;
use beachcast::models::location::load_locations;
use beachcast::{
    BeachcastConfig, Collector, CollectorOptions, ForecastStore, MarineClient, VilageClient, web,
};
use chrono::{Duration, NaiveDateTime, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "beachcast", version, about = "Beach weather and marine forecast collector")]
struct Cli {
    /// Path to the configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one collection pass over the configured beaches
    Collect {
        /// Only collect beaches in this region
        #[arg(long)]
        region: Option<String>,
        /// Only collect the beach with this id
        #[arg(long)]
        beach_id: Option<u32>,
    },
    /// Serve the read API
    Serve {
        /// Port override
        #[arg(long)]
        port: Option<u16>,
    },
    /// Delete forecasts older than a retention window
    Cleanup {
        /// Retention window in days
        #[arg(long, default_value_t = 10)]
        days: u32,
        /// Count stale records without deleting them
        #[arg(long)]
        dry_run: bool,
        /// Only prune this region
        #[arg(long)]
        region: Option<String>,
        /// Only prune the beach with this id
        #[arg(long)]
        beach_id: Option<u32>,
    },
}

/// Local wall-clock time of the forecast service (KST, no DST)
fn local_now() -> NaiveDateTime {
    Utc::now().naive_utc() + Duration::hours(9)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = BeachcastConfig::load_from_path(cli.config.clone())
        .with_context(|| "Failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone())),
        )
        .init();

    let store = Arc::new(
        ForecastStore::open(&config.storage.location)
            .with_context(|| "Failed to open forecast store")?,
    );

    match cli.command {
        Command::Collect { region, beach_id } => {
            collect(&config, store, region, beach_id).await?;
        }
        Command::Serve { port } => {
            let locations = load_locations(&config.storage.locations_path)
                .with_context(|| "Failed to load locations registry")?;
            let state = AppState {
                store,
                locations: Arc::new(locations),
            };
            web::run(port.unwrap_or(config.server.port), state).await?;
        }
        Command::Cleanup {
            days,
            dry_run,
            region,
            beach_id,
        } => {
            cleanup(store, days, dry_run, region, beach_id).await?;
        }
    }

    Ok(())
}

async fn collect(
    config: &BeachcastConfig,
    store: Arc<ForecastStore>,
    region: Option<String>,
    beach_id: Option<u32>,
) -> Result<()> {
    let mut locations = load_locations(&config.storage.locations_path)
        .with_context(|| "Failed to load locations registry")?;
    if let Some(region) = &region {
        locations.retain(|l| l.region == *region);
    }
    if let Some(beach_id) = beach_id {
        locations.retain(|l| l.beach_id == beach_id);
    }
    if locations.is_empty() {
        bail!("No beaches match the given filters");
    }

    let primary = Arc::new(VilageClient::new(config)?);
    let marine = Arc::new(MarineClient::new(config)?);
    let collector = Collector::new(store, primary, marine, CollectorOptions::from_config(config));

    let summary = collector.run(&locations, local_now()).await;
    if summary.failed == summary.total {
        bail!("Collection failed for every beach");
    }
    Ok(())
}

async fn cleanup(
    store: Arc<ForecastStore>,
    days: u32,
    dry_run: bool,
    region: Option<String>,
    beach_id: Option<u32>,
) -> Result<()> {
    if days == 0 {
        bail!("Retention window must be at least 1 day");
    }
    if days < 7 {
        warn!(days, "short retention window, recent forecasts will be deleted");
    }

    let cutoff = local_now() - Duration::days(i64::from(days));
    let count = store
        .prune_before(cutoff, dry_run, region.as_deref(), beach_id)
        .await?;
    if dry_run {
        info!(count, %cutoff, "dry run complete");
    } else {
        info!(count, %cutoff, "cleanup complete");
    }
    Ok(())
}
