//! Secondary forecast source: hourly marine conditions
//!
//! The marine API returns parallel hourly arrays; `reshape` turns them
//! into per-hour records. Marine data is supplementary: any failure here
//! is logged and swallowed by the caller, never fails a collection run.

use crate::config::BeachcastConfig;
use crate::models::MarineRecord;
use crate::models::forecast::MARINE_SOURCE;
use crate::{BeachcastError, Result};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use reqwest_middleware::ClientWithMiddleware;
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use std::time::Duration;
use tracing::{debug, warn};

/// One marine conditions lookup. Implemented by the HTTP client and, in
/// tests, by scripted sources.
#[async_trait]
pub trait MarineFetch {
    async fn fetch(&self, lat: f64, lon: f64) -> Result<Vec<MarineRecord>>;
}

/// Client for the marine conditions API
pub struct MarineClient {
    client: ClientWithMiddleware,
    base_url: String,
    timezone: String,
    forecast_days: u32,
}

impl MarineClient {
    pub fn new(config: &BeachcastConfig) -> Result<Self> {
        let inner = reqwest::Client::builder()
            .timeout(Duration::from_secs(u64::from(config.marine.timeout_seconds)))
            .user_agent(concat!("beachcast/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BeachcastError::api(format!("Failed to create HTTP client: {e}")))?;
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(3);
        let client = reqwest_middleware::ClientBuilder::new(inner)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();
        Ok(Self {
            client,
            base_url: config.marine.base_url.clone(),
            timezone: config.marine.timezone.clone(),
            forecast_days: config.marine.forecast_days,
        })
    }
}

#[async_trait]
impl MarineFetch for MarineClient {
    /// Fetch hourly marine conditions for a coordinate
    async fn fetch(&self, lat: f64, lon: f64) -> Result<Vec<MarineRecord>> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("latitude", lat.to_string()),
                ("longitude", lon.to_string()),
                (
                    "hourly",
                    "wave_height,wave_direction,sea_surface_temperature".to_string(),
                ),
                ("timezone", self.timezone.clone()),
                ("forecast_days", self.forecast_days.to_string()),
                ("cell_selection", "sea".to_string()),
            ])
            .send()
            .await
            .map_err(|e| BeachcastError::api(format!("marine request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(BeachcastError::api(format!(
                "marine API returned HTTP {}",
                response.status()
            )));
        }

        let body: wire::MarineResponse = response
            .json()
            .await
            .map_err(|e| BeachcastError::api(format!("unparseable marine response: {e}")))?;

        let records = reshape(&body);
        debug!(lat, lon, records = records.len(), "marine conditions fetched");
        Ok(records)
    }
}

/// Turn the parallel hourly arrays into per-hour records. Entries whose
/// timestamp does not parse are skipped; a value array shorter than the
/// time array yields `None` for the missing tail.
#[must_use]
fn reshape(response: &wire::MarineResponse) -> Vec<MarineRecord> {
    let Some(hourly) = &response.hourly else {
        return Vec::new();
    };

    let mut records = Vec::with_capacity(hourly.time.len());
    for (i, time) in hourly.time.iter().enumerate() {
        let Ok(datetime) = NaiveDateTime::parse_from_str(time, "%Y-%m-%dT%H:%M") else {
            warn!(time, "skipping marine entry with unparseable timestamp");
            continue;
        };
        records.push(MarineRecord {
            datetime,
            wave_height: pick(&hourly.wave_height, i),
            wave_direction: pick(&hourly.wave_direction, i),
            sea_surface_temperature: pick(&hourly.sea_surface_temperature, i),
            source: MARINE_SOURCE.to_string(),
        });
    }
    records
}

fn pick(values: &Option<Vec<Option<f64>>>, i: usize) -> Option<f64> {
    values.as_ref().and_then(|v| v.get(i).copied().flatten())
}

/// Marine API response structures
mod wire {
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    pub struct MarineResponse {
        pub hourly: Option<HourlyMarine>,
    }

    #[derive(Debug, Deserialize)]
    pub struct HourlyMarine {
        pub time: Vec<String>,
        pub wave_height: Option<Vec<Option<f64>>>,
        pub wave_direction: Option<Vec<Option<f64>>>,
        pub sea_surface_temperature: Option<Vec<Option<f64>>>,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn response(json: serde_json::Value) -> wire::MarineResponse {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_reshape_parallel_arrays() {
        let body = response(serde_json::json!({
            "hourly": {
                "time": ["2026-08-30T09:00", "2026-08-30T10:00"],
                "wave_height": [0.4, 0.6],
                "wave_direction": [112.0, null],
                "sea_surface_temperature": [25.3, 25.4]
            }
        }));

        let records = reshape(&body);
        assert_eq!(records.len(), 2);
        assert_eq!(
            records[0].datetime,
            NaiveDate::from_ymd_opt(2026, 8, 30)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap()
        );
        assert_eq!(records[0].wave_height, Some(0.4));
        assert_eq!(records[0].wave_direction, Some(112.0));
        assert_eq!(records[1].wave_direction, None);
        assert_eq!(records[1].sea_surface_temperature, Some(25.4));
        assert_eq!(records[0].source, MARINE_SOURCE);
    }

    #[test]
    fn test_reshape_skips_bad_timestamps() {
        let body = response(serde_json::json!({
            "hourly": {
                "time": ["not-a-time", "2026-08-30T10:00"],
                "wave_height": [0.4, 0.6]
            }
        }));

        let records = reshape(&body);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].wave_height, Some(0.6));
    }

    #[test]
    fn test_reshape_short_value_arrays() {
        let body = response(serde_json::json!({
            "hourly": {
                "time": ["2026-08-30T09:00", "2026-08-30T10:00"],
                "wave_height": [0.4]
            }
        }));

        let records = reshape(&body);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].wave_height, Some(0.4));
        assert_eq!(records[1].wave_height, None);
    }

    #[test]
    fn test_reshape_without_hourly_block() {
        let body = response(serde_json::json!({}));
        assert!(reshape(&body).is_empty());
    }
}
