//! Forecast persistence
//!
//! Embedded key-value store holding merged forecasts, per-beach metadata
//! and per-region beach listings. Keys are path-shaped strings whose
//! timestamp segment (`YYYYMMDDHHMM`) sorts lexicographically in time
//! order, so time-range reads are prefix scans. Values are postcard
//! encoded. The store handle is cheap to clone and shared behind an
//! `Arc` by the collector and the read API.

use crate::models::location::sanitize_path_segment;
use crate::models::{BeachLocation, MergedForecast};
use crate::{BeachcastError, Result};
use chrono::NaiveDateTime;
use fjall::Keyspace;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::task;
use tracing::{debug, info};

/// Timestamp segment of forecast keys
const DOC_ID_FORMAT: &str = "%Y%m%d%H%M";

/// Per-beach collection metadata, refreshed on every successful run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BeachMetadata {
    pub region: String,
    pub beach: String,
    pub beach_id: u32,
    pub display_name: String,
    pub lat: f64,
    pub lon: f64,
    pub grid_x: i32,
    pub grid_y: i32,
    pub last_updated: NaiveDateTime,
    /// Stored forecast coverage at the time of the last run
    pub forecast_count: usize,
    pub earliest_forecast: Option<NaiveDateTime>,
    pub latest_forecast: Option<NaiveDateTime>,
    /// First stored timestamp at or after the last run's clock reading
    pub next_forecast: Option<NaiveDateTime>,
    /// "active" when the last run persisted records, "empty" otherwise
    pub status: String,
}

/// Listing of one region's beaches for the read API
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegionBeaches {
    pub region: String,
    pub region_name: String,
    pub beaches: Vec<BeachSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BeachSummary {
    pub beach: String,
    pub beach_id: u32,
    pub display_name: String,
}

impl BeachSummary {
    #[must_use]
    pub fn from_location(location: &BeachLocation) -> Self {
        Self {
            beach: location.beach.clone(),
            beach_id: location.beach_id,
            display_name: location.display_name.clone(),
        }
    }
}

/// Stored-forecast coverage for one beach
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ForecastCoverage {
    pub count: usize,
    pub earliest: Option<NaiveDateTime>,
    pub latest: Option<NaiveDateTime>,
    /// First stored timestamp at or after the reference clock reading
    pub next: Option<NaiveDateTime>,
}

#[derive(Clone)]
pub struct ForecastStore {
    store: Keyspace,
}

fn doc_id(datetime: NaiveDateTime) -> String {
    datetime.format(DOC_ID_FORMAT).to_string()
}

fn forecast_prefix(region: &str, beach_id: u32) -> String {
    format!("fx/{}/{}/", sanitize_path_segment(region), beach_id)
}

fn forecast_key(region: &str, beach_id: u32, datetime: NaiveDateTime) -> String {
    format!("{}{}", forecast_prefix(region, beach_id), doc_id(datetime))
}

fn metadata_key(region: &str, beach_id: u32) -> String {
    format!("meta/{}/{}", sanitize_path_segment(region), beach_id)
}

fn region_key(region: &str) -> String {
    format!("rg/{}", sanitize_path_segment(region))
}

fn get_raw(store: Keyspace, key: Vec<u8>) -> Result<Option<Vec<u8>>> {
    let value = store
        .get(key)
        .map_err(|e| BeachcastError::store(format!("read failed: {e}")))?;
    Ok(value.map(|v| v.to_vec()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    postcard::from_bytes(bytes).map_err(|e| BeachcastError::store(format!("decode failed: {e}")))
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    postcard::to_stdvec(value).map_err(|e| BeachcastError::store(format!("encode failed: {e}")))
}

impl ForecastStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = fjall::Database::builder(&path)
            .open()
            .map_err(|e| BeachcastError::store(format!("failed to open database: {e}")))?;
        let store = db
            .keyspace("forecasts", fjall::KeyspaceCreateOptions::default)
            .map_err(|e| BeachcastError::store(format!("failed to open keyspace: {e}")))?;
        Ok(Self { store })
    }

    async fn get_value<T: DeserializeOwned + Send + 'static>(&self, key: String) -> Result<Option<T>> {
        let store = self.store.clone();
        let bytes = task::spawn_blocking(move || get_raw(store, key.into_bytes()))
            .await
            .map_err(|e| BeachcastError::store(format!("task failed: {e}")))??;
        bytes.as_deref().map(decode).transpose()
    }

    async fn put_value<T: Serialize>(&self, key: String, value: &T) -> Result<()> {
        let bytes = encode(value)?;
        let store = self.store.clone();
        task::spawn_blocking(move || store.insert(key.into_bytes(), bytes))
            .await
            .map_err(|e| BeachcastError::store(format!("task failed: {e}")))?
            .map_err(|e| BeachcastError::store(format!("write failed: {e}")))?;
        Ok(())
    }

    /// Persist one merged forecast, field-merging into any stored record
    /// for the same (region, beach, timestamp). Fields missing from the
    /// incoming record never erase stored values.
    pub async fn save_merged(&self, forecast: &MergedForecast) -> Result<()> {
        let key = forecast_key(&forecast.region, forecast.beach_id, forecast.datetime);
        let merged = match self.get_value::<MergedForecast>(key.clone()).await? {
            Some(mut stored) => {
                stored.merge_from(forecast);
                stored
            }
            None => forecast.clone(),
        };
        self.put_value(key, &merged).await
    }

    /// Forecasts for a beach in the half-open range `[from, to)`, in
    /// timestamp order
    pub async fn forecasts_between(
        &self,
        region: &str,
        beach_id: u32,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<MergedForecast>> {
        let prefix = forecast_prefix(region, beach_id);
        let low = doc_id(from);
        let high = doc_id(to);
        let store = self.store.clone();

        task::spawn_blocking(move || {
            let mut out = Vec::new();
            for entry in store.prefix(prefix.as_bytes()) {
                let (key, value) =
                    entry.into_inner().map_err(|e| BeachcastError::store(format!("scan failed: {e}")))?;
                let key = String::from_utf8_lossy(&key);
                let Some(id) = key.strip_prefix(prefix.as_str()) else {
                    continue;
                };
                if id >= low.as_str() && id < high.as_str() {
                    out.push(decode::<MergedForecast>(&value)?);
                }
            }
            Ok(out)
        })
        .await
        .map_err(|e| BeachcastError::store(format!("task failed: {e}")))?
    }

    /// Most recent forecast at or before `now`, if any
    pub async fn current_conditions(
        &self,
        region: &str,
        beach_id: u32,
        now: NaiveDateTime,
    ) -> Result<Option<MergedForecast>> {
        let prefix = forecast_prefix(region, beach_id);
        let cutoff = doc_id(now);
        let store = self.store.clone();

        task::spawn_blocking(move || {
            let mut latest: Option<MergedForecast> = None;
            for entry in store.prefix(prefix.as_bytes()) {
                let (key, value) =
                    entry.into_inner().map_err(|e| BeachcastError::store(format!("scan failed: {e}")))?;
                let key = String::from_utf8_lossy(&key);
                let Some(id) = key.strip_prefix(prefix.as_str()) else {
                    continue;
                };
                if id <= cutoff.as_str() {
                    latest = Some(decode::<MergedForecast>(&value)?);
                }
            }
            Ok(latest)
        })
        .await
        .map_err(|e| BeachcastError::store(format!("task failed: {e}")))?
    }

    /// Coverage summary over every stored forecast of one beach. Keys
    /// iterate in timestamp order, so earliest and latest fall out of a
    /// single pass.
    pub async fn coverage(
        &self,
        region: &str,
        beach_id: u32,
        now: NaiveDateTime,
    ) -> Result<ForecastCoverage> {
        let prefix = forecast_prefix(region, beach_id);
        let cutoff = doc_id(now);
        let store = self.store.clone();

        task::spawn_blocking(move || {
            let mut coverage = ForecastCoverage::default();
            for entry in store.prefix(prefix.as_bytes()) {
                let (key, _) =
                    entry.into_inner().map_err(|e| BeachcastError::store(format!("scan failed: {e}")))?;
                let key = String::from_utf8_lossy(&key);
                let Some(id) = key.strip_prefix(prefix.as_str()) else {
                    continue;
                };
                let Ok(datetime) = NaiveDateTime::parse_from_str(id, DOC_ID_FORMAT) else {
                    continue;
                };
                coverage.count += 1;
                if coverage.earliest.is_none() {
                    coverage.earliest = Some(datetime);
                }
                coverage.latest = Some(datetime);
                if coverage.next.is_none() && id >= cutoff.as_str() {
                    coverage.next = Some(datetime);
                }
            }
            Ok(coverage)
        })
        .await
        .map_err(|e| BeachcastError::store(format!("task failed: {e}")))?
    }

    pub async fn put_beach_metadata(&self, metadata: &BeachMetadata) -> Result<()> {
        let key = metadata_key(&metadata.region, metadata.beach_id);
        self.put_value(key, metadata).await
    }

    pub async fn beach_metadata(
        &self,
        region: &str,
        beach_id: u32,
    ) -> Result<Option<BeachMetadata>> {
        self.get_value(metadata_key(region, beach_id)).await
    }

    pub async fn put_region_beaches(&self, listing: &RegionBeaches) -> Result<()> {
        self.put_value(region_key(&listing.region), listing).await
    }

    pub async fn region_beaches(&self, region: &str) -> Result<Option<RegionBeaches>> {
        self.get_value(region_key(region)).await
    }

    /// Delete forecasts older than `cutoff`, optionally narrowed to one
    /// region or one beach. With `dry_run` nothing is deleted, only
    /// counted. Returns the number of affected records.
    pub async fn prune_before(
        &self,
        cutoff: NaiveDateTime,
        dry_run: bool,
        region: Option<&str>,
        beach_id: Option<u32>,
    ) -> Result<usize> {
        let cutoff_id = doc_id(cutoff);
        let prefix = match region {
            Some(region) => match beach_id {
                Some(beach_id) => forecast_prefix(region, beach_id),
                None => format!("fx/{}/", sanitize_path_segment(region)),
            },
            None => "fx/".to_string(),
        };
        let beach_segment = beach_id.map(|id| id.to_string());
        let store = self.store.clone();

        let stale: Vec<Vec<u8>> = task::spawn_blocking(move || {
            let mut keys = Vec::new();
            for entry in store.prefix(prefix.as_bytes()) {
                let (key, _) =
                    entry.into_inner().map_err(|e| BeachcastError::store(format!("scan failed: {e}")))?;
                let text = String::from_utf8_lossy(&key);
                let mut segments = text.rsplit('/');
                // Key shape is fx/{region}/{beach_id}/{timestamp}
                let Some(id) = segments.next() else {
                    continue;
                };
                if let Some(wanted) = &beach_segment {
                    if segments.next() != Some(wanted.as_str()) {
                        continue;
                    }
                }
                if id < cutoff_id.as_str() {
                    keys.push(key.to_vec());
                }
            }
            Ok::<_, BeachcastError>(keys)
        })
        .await
        .map_err(|e| BeachcastError::store(format!("task failed: {e}")))??;

        let count = stale.len();
        if dry_run {
            info!(count, "dry run, would delete stale forecasts");
            return Ok(count);
        }

        let store = self.store.clone();
        task::spawn_blocking(move || {
            for key in stale {
                store
                    .remove(key)
                    .map_err(|e| BeachcastError::store(format!("delete failed: {e}")))?;
            }
            Ok::<_, BeachcastError>(())
        })
        .await
        .map_err(|e| BeachcastError::store(format!("task failed: {e}")))??;

        debug!(count, "stale forecasts deleted");
        Ok(count)
    }
}
