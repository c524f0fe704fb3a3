//! Village forecast client and fallback fetch loop
//!
//! Forecasts are published on a fixed 8-times-daily cadence. When the most
//! recent slot has nothing yet, the immediately preceding slot very likely
//! does, so the fetch loop steps backward through real publication slots
//! instead of blindly retrying the same request. Fatal status codes abort
//! the walk at once: they describe configuration problems no earlier slot
//! can fix.

use crate::config::BeachcastConfig;
use crate::kma::basetime::{self, BaseTime};
use crate::kma::grid::GridCell;
use crate::kma::status::{self, StatusKind};
use crate::{BeachcastError, Result};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::Deserialize;
use std::time::Duration;
use tracing::{error, info, warn};

/// One raw forecast reading as the wire reports it
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RawForecastItem {
    #[serde(rename = "fcstDate")]
    pub fcst_date: String,
    #[serde(rename = "fcstTime")]
    pub fcst_time: String,
    pub category: String,
    #[serde(rename = "fcstValue")]
    pub fcst_value: String,
}

impl RawForecastItem {
    /// Forecast timestamp parsed from the `YYYYMMDD` + `HHMM` pair
    pub fn timestamp(&self) -> Result<NaiveDateTime> {
        let combined = format!("{}{}", self.fcst_date, self.fcst_time);
        NaiveDateTime::parse_from_str(&combined, "%Y%m%d%H%M").map_err(|e| {
            BeachcastError::api(format!("unparseable forecast timestamp '{combined}': {e}"))
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct VilageResponse {
    pub response: ResponseEnvelope,
}

#[derive(Debug, Deserialize)]
pub struct ResponseEnvelope {
    pub header: ResponseHeader,
    #[serde(default)]
    pub body: Option<ResponseBody>,
}

#[derive(Debug, Deserialize)]
pub struct ResponseHeader {
    #[serde(rename = "resultCode")]
    pub result_code: String,
    #[serde(rename = "resultMsg", default)]
    pub result_msg: String,
}

#[derive(Debug, Deserialize)]
pub struct ResponseBody {
    #[serde(default)]
    pub items: Option<ItemList>,
}

#[derive(Debug, Deserialize)]
pub struct ItemList {
    #[serde(default)]
    pub item: Vec<RawForecastItem>,
}

impl VilageResponse {
    fn into_items(self) -> Option<Vec<RawForecastItem>> {
        self.response.body.and_then(|b| b.items).map(|i| i.item)
    }
}

/// One request against the village forecast service. Implemented by the
/// HTTP client and, in tests, by scripted sources.
#[async_trait]
pub trait VilageFetch {
    async fn request(&self, slot: &BaseTime, cell: GridCell) -> Result<VilageResponse>;
}

/// HTTP client for the village forecast service
pub struct VilageClient {
    client: reqwest::Client,
    base_url: String,
    service_key: String,
}

impl VilageClient {
    pub fn new(config: &BeachcastConfig) -> Result<Self> {
        let service_key = config.service_key().ok_or_else(|| {
            BeachcastError::config("Primary-source service key is not configured")
        })?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(u64::from(config.kma.timeout_seconds)))
            .user_agent(concat!("beachcast/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BeachcastError::api(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: config.kma.base_url.clone(),
            service_key,
        })
    }
}

#[async_trait]
impl VilageFetch for VilageClient {
    async fn request(&self, slot: &BaseTime, cell: GridCell) -> Result<VilageResponse> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("serviceKey", self.service_key.as_str()),
                ("numOfRows", "1000"),
                ("pageNo", "1"),
                ("dataType", "JSON"),
                ("base_date", &slot.base_date_param()),
                ("base_time", &slot.base_time_param()),
                ("nx", &cell.x.to_string()),
                ("ny", &cell.y.to_string()),
            ])
            .send()
            .await
            .map_err(|e| BeachcastError::api(format!("request failed: {e}")))?;

        response
            .json::<VilageResponse>()
            .await
            .map_err(|e| BeachcastError::api(format!("unparseable response: {e}")))
    }
}

/// Retry budget and pacing of the fallback walk
#[derive(Debug, Clone)]
pub struct FallbackPolicy {
    /// How many slots to try before giving up; 0 is treated as 1
    pub max_attempts: u32,
    /// Delay between attempts
    pub retry_delay: Duration,
    /// Extra wait after a rate-limit status
    pub rate_limit_cooldown: Duration,
}

impl Default for FallbackPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            retry_delay: Duration::from_millis(400),
            rate_limit_cooldown: Duration::from_secs(5),
        }
    }
}

impl FallbackPolicy {
    #[must_use]
    pub fn from_config(config: &BeachcastConfig) -> Self {
        Self {
            max_attempts: config.kma.retry_count,
            retry_delay: Duration::from_millis(config.kma.retry_delay_ms),
            ..Self::default()
        }
    }
}

/// Fetch forecast items for a grid cell, walking backward through
/// publication slots on failure.
///
/// Returns the items of the first successful slot together with the slot
/// that produced them, or `None` when a fatal status aborts the walk or
/// the attempt budget runs out.
pub async fn fetch_with_fallback<F: VilageFetch + ?Sized>(
    source: &F,
    cell: GridCell,
    policy: &FallbackPolicy,
    now: NaiveDateTime,
) -> Option<(Vec<RawForecastItem>, BaseTime)> {
    let max_attempts = policy.max_attempts.max(1);
    let mut slot = basetime::latest_slot(now);

    for attempt in 1..=max_attempts {
        match source.request(&slot, cell).await {
            Err(err) => {
                warn!(%slot, attempt, max_attempts, "transport failure: {err}");
            }
            Ok(response) => {
                let code = response.response.header.result_code.clone();
                let message = response.response.header.result_msg.clone();
                match status::classify(&code) {
                    StatusKind::Success => match response.into_items() {
                        Some(items) if !items.is_empty() => {
                            info!(%slot, items = items.len(), "forecast fetched");
                            return Some((items, slot));
                        }
                        _ => {
                            warn!(%slot, attempt, "success status without items, stepping back");
                        }
                    },
                    StatusKind::NoData => {
                        // Expected between publications, not a fault
                        info!(%slot, attempt, "no forecast published for this slot yet");
                    }
                    StatusKind::Fatal => {
                        error!(
                            code,
                            meaning = status::describe(&code),
                            message,
                            "fatal upstream status, aborting fetch"
                        );
                        return None;
                    }
                    StatusKind::Retryable => {
                        warn!(
                            code,
                            meaning = status::describe(&code),
                            attempt,
                            max_attempts,
                            "retryable upstream status"
                        );
                        if code == status::RATE_LIMIT_CODE
                            && !policy.rate_limit_cooldown.is_zero()
                        {
                            tokio::time::sleep(policy.rate_limit_cooldown).await;
                        }
                    }
                    StatusKind::Unknown => {
                        warn!(code, message, attempt, "unknown upstream status, stepping back");
                    }
                }
            }
        }

        if attempt < max_attempts {
            slot = basetime::previous_slot(slot);
            if !policy.retry_delay.is_zero() {
                tokio::time::sleep(policy.retry_delay).await;
            }
        }
    }

    warn!(max_attempts, "all fallback attempts failed");
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 8, 30)
            .unwrap()
            .and_hms_opt(12, 30, 0)
            .unwrap()
    }

    fn zero_delay(max_attempts: u32) -> FallbackPolicy {
        FallbackPolicy {
            max_attempts,
            retry_delay: Duration::ZERO,
            rate_limit_cooldown: Duration::ZERO,
        }
    }

    fn status_response(code: &str) -> VilageResponse {
        serde_json::from_value(serde_json::json!({
            "response": {
                "header": { "resultCode": code, "resultMsg": "test" }
            }
        }))
        .unwrap()
    }

    fn success_response(items: usize) -> VilageResponse {
        let item: Vec<_> = (0..items)
            .map(|i| {
                serde_json::json!({
                    "fcstDate": "20260830",
                    "fcstTime": "1500",
                    "category": "TMP",
                    "fcstValue": format!("{i}")
                })
            })
            .collect();
        serde_json::from_value(serde_json::json!({
            "response": {
                "header": { "resultCode": "00", "resultMsg": "NORMAL_SERVICE" },
                "body": { "items": { "item": item } }
            }
        }))
        .unwrap()
    }

    /// Scripted source: hands out canned responses and records the slots
    /// it was queried with.
    struct ScriptedSource {
        responses: Mutex<VecDeque<Result<VilageResponse>>>,
        seen: Mutex<Vec<BaseTime>>,
    }

    impl ScriptedSource {
        fn new(responses: Vec<Result<VilageResponse>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn seen_slots(&self) -> Vec<BaseTime> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl VilageFetch for ScriptedSource {
        async fn request(&self, slot: &BaseTime, _cell: GridCell) -> Result<VilageResponse> {
            self.seen.lock().unwrap().push(*slot);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(BeachcastError::api("script exhausted")))
        }
    }

    #[tokio::test]
    async fn test_two_no_data_then_success() {
        let source = ScriptedSource::new(vec![
            Ok(status_response("03")),
            Ok(status_response("03")),
            Ok(success_response(4)),
        ]);
        let cell = GridCell { x: 99, y: 75 };

        let picked = fetch_with_fallback(&source, cell, &zero_delay(5), now()).await;
        let (items, used_slot) = picked.expect("third slot should succeed");
        assert_eq!(items.len(), 4);

        // At 12:30 the slot walk is 11:00 -> 08:00 -> 05:00
        let slots = source.seen_slots();
        assert_eq!(slots.len(), 3);
        assert_eq!(
            slots.iter().map(|s| s.hour).collect::<Vec<_>>(),
            vec![11, 8, 5]
        );
        assert_eq!(used_slot.hour, 5);
        assert_eq!(used_slot.date, now().date());
    }

    #[tokio::test]
    async fn test_fatal_short_circuits_after_one_attempt() {
        let source = ScriptedSource::new(vec![
            Ok(status_response("30")),
            Ok(success_response(4)), // must never be reached
        ]);
        let cell = GridCell { x: 99, y: 75 };

        let picked = fetch_with_fallback(&source, cell, &zero_delay(5), now()).await;
        assert!(picked.is_none());
        assert_eq!(source.seen_slots().len(), 1);
        assert_eq!(source.seen_slots()[0].hour, 11);
    }

    #[tokio::test]
    async fn test_budget_exhaustion_returns_none() {
        let source = ScriptedSource::new(vec![
            Ok(status_response("03")),
            Ok(status_response("99")),
            Err(BeachcastError::api("timeout")),
        ]);
        let cell = GridCell { x: 60, y: 127 };

        let picked = fetch_with_fallback(&source, cell, &zero_delay(3), now()).await;
        assert!(picked.is_none());
        assert_eq!(source.seen_slots().len(), 3);
    }

    #[tokio::test]
    async fn test_transport_failures_are_retryable() {
        let source = ScriptedSource::new(vec![
            Err(BeachcastError::api("connection refused")),
            Ok(success_response(1)),
        ]);
        let cell = GridCell { x: 60, y: 127 };

        let picked = fetch_with_fallback(&source, cell, &zero_delay(5), now()).await;
        assert!(picked.is_some());
        assert_eq!(source.seen_slots().len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_code_fails_open() {
        let source = ScriptedSource::new(vec![
            Ok(status_response("77")),
            Ok(success_response(1)),
        ]);
        let cell = GridCell { x: 60, y: 127 };

        let picked = fetch_with_fallback(&source, cell, &zero_delay(5), now()).await;
        assert!(picked.is_some());
        assert_eq!(source.seen_slots().len(), 2);
    }

    #[tokio::test]
    async fn test_success_without_items_steps_back() {
        let source = ScriptedSource::new(vec![
            Ok(status_response("00")), // 00 but no body
            Ok(success_response(2)),
        ]);
        let cell = GridCell { x: 60, y: 127 };

        let picked = fetch_with_fallback(&source, cell, &zero_delay(5), now()).await;
        let (items, _) = picked.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(source.seen_slots().len(), 2);
    }

    #[tokio::test]
    async fn test_zero_attempt_budget_still_tries_once() {
        let source = ScriptedSource::new(vec![Ok(success_response(1))]);
        let cell = GridCell { x: 60, y: 127 };

        let picked = fetch_with_fallback(&source, cell, &zero_delay(0), now()).await;
        assert!(picked.is_some());
        assert_eq!(source.seen_slots().len(), 1);
    }

    #[test]
    fn test_raw_item_timestamp_parsing() {
        let item = RawForecastItem {
            fcst_date: "20260830".to_string(),
            fcst_time: "1500".to_string(),
            category: "TMP".to_string(),
            fcst_value: "27".to_string(),
        };
        let ts = item.timestamp().unwrap();
        assert_eq!(
            ts,
            NaiveDate::from_ymd_opt(2026, 8, 30)
                .unwrap()
                .and_hms_opt(15, 0, 0)
                .unwrap()
        );

        let bad = RawForecastItem {
            fcst_date: "2026".to_string(),
            fcst_time: "99".to_string(),
            category: "TMP".to_string(),
            fcst_value: "27".to_string(),
        };
        assert!(bad.timestamp().is_err());
    }
}
