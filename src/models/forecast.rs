//! Forecast record models
//!
//! `PickedItem` is one primary-source reading after timestamp parsing,
//! `MarineRecord` is one secondary-source reading, and `MergedForecast`
//! is the unified per-timestamp document the store persists.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Provenance tag attached to marine records
pub const MARINE_SOURCE: &str = "open-meteo";

/// One primary-source reading: a forecast timestamp, a category code and
/// the raw string value exactly as the upstream reported it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PickedItem {
    pub datetime: NaiveDateTime,
    pub category: String,
    pub value: String,
}

/// One secondary-source reading: wave and sea-surface conditions for an hour
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MarineRecord {
    pub datetime: NaiveDateTime,
    pub wave_height: Option<f64>,
    pub wave_direction: Option<f64>,
    pub sea_surface_temperature: Option<f64>,
    pub source: String,
}

/// Merged forecast for one (beach, timestamp), combining normalized fields
/// from both sources
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct MergedForecast {
    pub region: String,
    pub beach: String,
    pub beach_id: u32,
    pub datetime: NaiveDateTime,

    // Primary-source fields
    pub wind_speed: Option<f64>,
    pub wind_direction: Option<f64>,
    /// Direction derived from the wind vector components; kept separate
    /// from a directly reported `wind_direction`
    pub wind_direction_calc: Option<f64>,
    pub wave_height: Option<f64>,
    pub air_temperature: Option<f64>,
    pub precipitation_probability: Option<f64>,
    pub precipitation_type: Option<i32>,
    pub sky_condition: Option<i32>,
    pub humidity: Option<f64>,
    pub precipitation: Option<f64>,
    pub snow: Option<f64>,
    pub wind_u: Option<f64>,
    pub wind_v: Option<f64>,

    // Secondary-source fields
    pub om_wave_height: Option<f64>,
    pub om_wave_direction: Option<f64>,
    pub sea_surface_temperature: Option<f64>,
}

impl MergedForecast {
    /// Create an empty record carrying only the identifying fields
    #[must_use]
    pub fn new(region: &str, beach: &str, beach_id: u32, datetime: NaiveDateTime) -> Self {
        Self {
            region: region.to_string(),
            beach: beach.to_string(),
            beach_id,
            datetime,
            ..Self::default()
        }
    }

    /// Field-level merge: fields set in `newer` win, fields absent from
    /// `newer` keep their current value. Re-running a collection with an
    /// overlapping batch must never erase previously stored fields.
    pub fn merge_from(&mut self, newer: &MergedForecast) {
        self.region = newer.region.clone();
        self.beach = newer.beach.clone();
        self.beach_id = newer.beach_id;
        self.datetime = newer.datetime;

        macro_rules! take_newer {
            ($($field:ident),+ $(,)?) => {
                $(if newer.$field.is_some() {
                    self.$field = newer.$field.clone();
                })+
            };
        }

        take_newer!(
            wind_speed,
            wind_direction,
            wind_direction_calc,
            wave_height,
            air_temperature,
            precipitation_probability,
            precipitation_type,
            sky_condition,
            humidity,
            precipitation,
            snow,
            wind_u,
            wind_v,
            om_wave_height,
            om_wave_direction,
            sea_surface_temperature,
        );
    }

    /// True if at least one primary-source field is set
    #[must_use]
    pub fn has_primary_data(&self) -> bool {
        self.wind_speed.is_some()
            || self.wind_direction.is_some()
            || self.wind_direction_calc.is_some()
            || self.wave_height.is_some()
            || self.air_temperature.is_some()
            || self.precipitation_probability.is_some()
            || self.precipitation_type.is_some()
            || self.sky_condition.is_some()
            || self.humidity.is_some()
            || self.precipitation.is_some()
            || self.snow.is_some()
            || self.wind_u.is_some()
            || self.wind_v.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 8, 30)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_merge_from_keeps_existing_fields() {
        let mut stored = MergedForecast::new("busan", "songjeong", 4001, ts());
        stored.wind_speed = Some(3.2);
        stored.sea_surface_temperature = Some(24.1);

        let mut newer = MergedForecast::new("busan", "songjeong", 4001, ts());
        newer.wind_speed = Some(4.0);

        stored.merge_from(&newer);
        assert_eq!(stored.wind_speed, Some(4.0));
        // Absent in the new batch, must survive
        assert_eq!(stored.sea_surface_temperature, Some(24.1));
    }

    #[test]
    fn test_has_primary_data() {
        let mut record = MergedForecast::new("busan", "songjeong", 4001, ts());
        assert!(!record.has_primary_data());
        record.om_wave_height = Some(1.0);
        assert!(!record.has_primary_data());
        record.humidity = Some(60.0);
        assert!(record.has_primary_data());
    }
}
