//! Collection orchestration
//!
//! One run walks the configured beaches, fetches and merges both sources
//! per beach and persists the result. A failing beach never stops the
//! run: failures are counted and the run carries on with the next beach.
//! Marine data is supplementary, so a beach whose marine fetch fails
//! still persists its primary data and counts as partial.

use crate::config::BeachcastConfig;
use crate::kma::{self, FallbackPolicy, RawForecastItem, VilageFetch};
use crate::marine::MarineFetch;
use crate::models::{BeachLocation, MarineRecord, PickedItem};
use crate::store::{BeachMetadata, BeachSummary, ForecastStore, RegionBeaches};
use chrono::{Days, NaiveDateTime};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Outcome counts of one collection run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub total: usize,
    /// Both sources fetched and persisted
    pub success: usize,
    /// Primary persisted, marine fetch failed
    pub partial: usize,
    /// Nothing persisted for the beach
    pub failed: usize,
}

/// Horizon and persistence policy of a run
#[derive(Debug, Clone)]
pub struct CollectorOptions {
    /// How many days ahead to keep forecasts for
    pub forecast_days: u32,
    /// Hours of day worth persisting; `None` keeps every full hour
    pub allowed_hours: Option<BTreeSet<u32>>,
    pub fallback: FallbackPolicy,
}

impl CollectorOptions {
    #[must_use]
    pub fn from_config(config: &BeachcastConfig) -> Self {
        let allowed_hours = if config.storage.allowed_hours.is_empty() {
            None
        } else {
            Some(config.storage.allowed_hours.iter().copied().collect())
        };
        Self {
            forecast_days: config.schedule.forecast_days,
            allowed_hours,
            fallback: FallbackPolicy::from_config(config),
        }
    }
}

pub struct Collector {
    store: Arc<ForecastStore>,
    primary: Arc<dyn VilageFetch + Send + Sync>,
    marine: Arc<dyn MarineFetch + Send + Sync>,
    options: CollectorOptions,
}

impl Collector {
    pub fn new(
        store: Arc<ForecastStore>,
        primary: Arc<dyn VilageFetch + Send + Sync>,
        marine: Arc<dyn MarineFetch + Send + Sync>,
        options: CollectorOptions,
    ) -> Self {
        Self {
            store,
            primary,
            marine,
            options,
        }
    }

    /// Collect and persist forecasts for every given beach, then refresh
    /// the per-region listings
    pub async fn run(&self, locations: &[BeachLocation], now: NaiveDateTime) -> RunSummary {
        let mut summary = RunSummary {
            total: locations.len(),
            ..RunSummary::default()
        };

        for location in locations {
            match self.collect_one(location, now).await {
                Ok(BeachOutcome::Complete) => summary.success += 1,
                Ok(BeachOutcome::PrimaryOnly) => summary.partial += 1,
                Ok(BeachOutcome::NoData) => summary.failed += 1,
                Err(err) => {
                    error!(
                        region = location.region,
                        beach = location.beach,
                        "beach collection failed: {err}"
                    );
                    summary.failed += 1;
                }
            }
        }

        if let Err(err) = self.update_region_listings(locations).await {
            error!("failed to refresh region listings: {err}");
        }

        info!(
            total = summary.total,
            success = summary.success,
            partial = summary.partial,
            failed = summary.failed,
            "collection run finished"
        );
        summary
    }

    async fn collect_one(
        &self,
        location: &BeachLocation,
        now: NaiveDateTime,
    ) -> crate::Result<BeachOutcome> {
        let cell = kma::project(location.lat, location.lon);
        info!(
            region = location.region,
            beach = location.beach,
            %cell,
            "collecting beach"
        );

        let Some((items, slot)) =
            kma::fetch_with_fallback(self.primary.as_ref(), cell, &self.options.fallback, now)
                .await
        else {
            warn!(
                region = location.region,
                beach = location.beach,
                "no primary forecast available"
            );
            return Ok(BeachOutcome::NoData);
        };
        info!(%slot, items = items.len(), "primary forecast fetched");

        let picked = pick_within_horizon(&items, now, self.options.forecast_days);

        let (marine, marine_ok) = match self.marine.fetch(location.lat, location.lon).await {
            Ok(records) => (records, true),
            Err(err) => {
                warn!(
                    region = location.region,
                    beach = location.beach,
                    "marine fetch failed, continuing without: {err}"
                );
                (Vec::new(), false)
            }
        };

        let merged = crate::merge::merge(
            &location.region,
            &location.beach,
            location.beach_id,
            &picked,
            &marine,
            self.options.allowed_hours.as_ref(),
        );
        for record in &merged {
            self.store.save_merged(record).await?;
        }

        let coverage = self
            .store
            .coverage(&location.region, location.beach_id, now)
            .await?;
        let status = if coverage.count > 0 { "active" } else { "empty" };
        self.store
            .put_beach_metadata(&BeachMetadata {
                region: location.region.clone(),
                beach: location.beach.clone(),
                beach_id: location.beach_id,
                display_name: location.display_name.clone(),
                lat: location.lat,
                lon: location.lon,
                grid_x: cell.x,
                grid_y: cell.y,
                last_updated: now,
                forecast_count: coverage.count,
                earliest_forecast: coverage.earliest,
                latest_forecast: coverage.latest,
                next_forecast: coverage.next,
                status: status.to_string(),
            })
            .await?;

        info!(
            region = location.region,
            beach = location.beach,
            records = merged.len(),
            "beach persisted"
        );
        Ok(if marine_ok {
            BeachOutcome::Complete
        } else {
            BeachOutcome::PrimaryOnly
        })
    }

    async fn update_region_listings(&self, locations: &[BeachLocation]) -> crate::Result<()> {
        let mut by_region: BTreeMap<String, RegionBeaches> = BTreeMap::new();
        for location in locations {
            let listing = by_region
                .entry(location.region_key())
                .or_insert_with(|| RegionBeaches {
                    region: location.region.clone(),
                    region_name: location.region_name.clone(),
                    beaches: Vec::new(),
                });
            listing.beaches.push(BeachSummary::from_location(location));
        }
        for listing in by_region.values() {
            self.store.put_region_beaches(listing).await?;
        }
        Ok(())
    }
}

enum BeachOutcome {
    Complete,
    PrimaryOnly,
    NoData,
}

/// Parse raw readings into picked items, keeping only timestamps within
/// `[now, now + forecast_days)`. Unparseable timestamps are skipped.
fn pick_within_horizon(
    items: &[RawForecastItem],
    now: NaiveDateTime,
    forecast_days: u32,
) -> Vec<PickedItem> {
    let horizon = now
        .checked_add_days(Days::new(u64::from(forecast_days)))
        .unwrap_or(NaiveDateTime::MAX);

    items
        .iter()
        .filter_map(|item| match item.timestamp() {
            Ok(datetime) if datetime >= now && datetime < horizon => Some(PickedItem {
                datetime,
                category: item.category.clone(),
                value: item.fcst_value.clone(),
            }),
            Ok(_) => None,
            Err(err) => {
                warn!("skipping raw reading: {err}");
                None
            }
        })
        .collect()
}

/// Marine source that always reports unavailability; used when no marine
/// endpoint is configured
pub struct NoMarine;

#[async_trait::async_trait]
impl MarineFetch for NoMarine {
    async fn fetch(&self, _lat: f64, _lon: f64) -> crate::Result<Vec<MarineRecord>> {
        Err(crate::BeachcastError::api("marine source not configured"))
    }
}
