//! Merge engine
//!
//! Takes the category-keyed primary readings and the hourly marine
//! records and produces one unified document per forecast timestamp.
//! The primary source defines the timeline: marine fields are only
//! copied onto timestamps the primary source produced. Values that
//! cannot be normalized are dropped with a warning instead of failing
//! the batch.

use crate::models::{MarineRecord, MergedForecast, PickedItem};
use chrono::{NaiveDateTime, Timelike};
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

/// Forecast categories of the primary source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    /// Wind speed, m/s
    WindSpeed,
    /// Wind direction, degrees
    WindDirection,
    /// Wave height, m
    WaveHeight,
    /// Air temperature, C
    Temperature,
    /// Precipitation probability, %
    PrecipitationProbability,
    /// Precipitation type code
    PrecipitationType,
    /// Sky condition code
    SkyCondition,
    /// Relative humidity, %
    Humidity,
    /// Hourly precipitation amount, mm
    Precipitation,
    /// Hourly snowfall amount, cm
    Snow,
    /// East-west wind component, m/s
    WindU,
    /// North-south wind component, m/s
    WindV,
}

impl Category {
    #[must_use]
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "WSD" => Some(Self::WindSpeed),
            "VEC" => Some(Self::WindDirection),
            "WAV" => Some(Self::WaveHeight),
            "TMP" => Some(Self::Temperature),
            "POP" => Some(Self::PrecipitationProbability),
            "PTY" => Some(Self::PrecipitationType),
            "SKY" => Some(Self::SkyCondition),
            "REH" => Some(Self::Humidity),
            "PCP" => Some(Self::Precipitation),
            "SNO" => Some(Self::Snow),
            "UUU" => Some(Self::WindU),
            "VVV" => Some(Self::WindV),
            _ => None,
        }
    }
}

/// Normalize a precipitation or snowfall amount string to a number.
///
/// The upstream mixes sentinel phrases with unit-suffixed numbers:
/// "없음"-suffixed phrases, bare zeros and below-threshold ("미만")
/// readings all normalize to 0.0; otherwise the unit suffix is stripped
/// and the rest parsed.
#[must_use]
pub fn parse_amount(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.ends_with("없음") || trimmed == "0" || trimmed == "0.0" || trimmed.contains("미만")
    {
        return Some(0.0);
    }
    let stripped = trimmed.replace("mm", "").replace("cm", "");
    stripped.trim().parse::<f64>().ok()
}

/// Wind direction in degrees derived from the (u, v) vector components,
/// rounded to two decimals
#[must_use]
pub fn derive_wind_direction(u: f64, v: f64) -> f64 {
    let degrees = (u.atan2(v).to_degrees() + 360.0) % 360.0;
    (degrees * 100.0).round() / 100.0
}

/// True when a forecast timestamp passes the persistence policy: exactly
/// on the hour, and the hour is in the allowed set when one is given
#[must_use]
pub fn is_allowed_timestamp(datetime: NaiveDateTime, allowed_hours: Option<&BTreeSet<u32>>) -> bool {
    if datetime.minute() != 0 {
        return false;
    }
    allowed_hours.is_none_or(|hours| hours.contains(&datetime.hour()))
}

/// Merge primary readings and marine records into per-timestamp documents.
///
/// Readings at disallowed timestamps are skipped up front. Duplicate
/// readings for the same (timestamp, category) resolve last-value-wins.
/// The derived wind direction is computed once per timestamp after all
/// of its readings are in, so it never depends on input order. Output is
/// sorted by timestamp.
#[must_use]
pub fn merge(
    region: &str,
    beach: &str,
    beach_id: u32,
    picked: &[PickedItem],
    marine: &[MarineRecord],
    allowed_hours: Option<&BTreeSet<u32>>,
) -> Vec<MergedForecast> {
    let mut timeline: BTreeMap<NaiveDateTime, MergedForecast> = BTreeMap::new();

    for item in picked {
        if !is_allowed_timestamp(item.datetime, allowed_hours) {
            continue;
        }
        let Some(category) = Category::from_code(&item.category) else {
            continue;
        };
        let record = timeline
            .entry(item.datetime)
            .or_insert_with(|| MergedForecast::new(region, beach, beach_id, item.datetime));
        apply(record, category, &item.value);
    }

    for record in timeline.values_mut() {
        if let (Some(u), Some(v)) = (record.wind_u, record.wind_v) {
            record.wind_direction_calc = Some(derive_wind_direction(u, v));
        }
    }

    // Marine fields ride along on the primary timeline only
    for marine_record in marine {
        if let Some(record) = timeline.get_mut(&marine_record.datetime) {
            record.om_wave_height = marine_record.wave_height;
            record.om_wave_direction = marine_record.wave_direction;
            record.sea_surface_temperature = marine_record.sea_surface_temperature;
        }
    }

    timeline.into_values().collect()
}

fn apply(record: &mut MergedForecast, category: Category, raw: &str) {
    match category {
        Category::WindSpeed => record.wind_speed = parse_number(category, raw),
        Category::WindDirection => record.wind_direction = parse_number(category, raw),
        Category::WaveHeight => record.wave_height = parse_number(category, raw),
        Category::Temperature => record.air_temperature = parse_number(category, raw),
        Category::PrecipitationProbability => {
            record.precipitation_probability = parse_number(category, raw);
        }
        Category::PrecipitationType => record.precipitation_type = parse_code(category, raw),
        Category::SkyCondition => record.sky_condition = parse_code(category, raw),
        Category::Humidity => record.humidity = parse_number(category, raw),
        Category::Precipitation => record.precipitation = parse_amount(raw),
        Category::Snow => record.snow = parse_amount(raw),
        Category::WindU => record.wind_u = parse_number(category, raw),
        Category::WindV => record.wind_v = parse_number(category, raw),
    }
}

fn parse_number(category: Category, raw: &str) -> Option<f64> {
    let parsed = raw.trim().parse::<f64>().ok();
    if parsed.is_none() {
        warn!(?category, raw, "dropping unparseable reading");
    }
    parsed
}

fn parse_code(category: Category, raw: &str) -> Option<i32> {
    let parsed = raw.trim().parse::<i32>().ok();
    if parsed.is_none() {
        warn!(?category, raw, "dropping unparseable reading");
    }
    parsed
}
