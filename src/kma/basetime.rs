//! Publication slot arithmetic
//!
//! The village forecast is published 8 times a day at fixed hours. A slot
//! is a (date, hour) pair from that grid; walking backward through slots
//! is the basis of the fallback fetch strategy.

use chrono::{Days, NaiveDate, NaiveDateTime, Timelike};

/// Daily publication hours, descending
pub const BASE_HOURS: [u32; 8] = [23, 20, 17, 14, 11, 8, 5, 2];

/// One publication slot of the village forecast service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BaseTime {
    pub date: NaiveDate,
    pub hour: u32,
}

impl BaseTime {
    /// `base_date` request parameter (`YYYYMMDD`)
    #[must_use]
    pub fn base_date_param(&self) -> String {
        self.date.format("%Y%m%d").to_string()
    }

    /// `base_time` request parameter (`HHMM`)
    #[must_use]
    pub fn base_time_param(&self) -> String {
        format!("{:02}00", self.hour)
    }
}

impl std::fmt::Display for BaseTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {:02}:00", self.date.format("%Y-%m-%d"), self.hour)
    }
}

/// Most recent slot published at or before `now`.
///
/// Scans the descending hour grid for the first hour `now` has reached;
/// before the day's first publication (02:00) the answer is yesterday's
/// 23:00 slot.
#[must_use]
pub fn latest_slot(now: NaiveDateTime) -> BaseTime {
    let hour = now.hour();
    for h in BASE_HOURS {
        if hour >= h {
            return BaseTime {
                date: now.date(),
                hour: h,
            };
        }
    }
    BaseTime {
        date: previous_day(now.date()),
        hour: 23,
    }
}

/// Immediate predecessor of a slot in the publication cycle.
///
/// The next entry in the descending hour grid, rolling back to the
/// previous day's 23:00 slot after the day's first publication.
#[must_use]
pub fn previous_slot(slot: BaseTime) -> BaseTime {
    match BASE_HOURS.iter().find(|&&h| h < slot.hour) {
        Some(&h) => BaseTime {
            date: slot.date,
            hour: h,
        },
        None => BaseTime {
            date: previous_day(slot.date),
            hour: 23,
        },
    }
}

fn previous_day(date: NaiveDate) -> NaiveDate {
    // NaiveDate covers +/- ~262000 years; one day back never overflows
    // for any date a clock can produce.
    date.checked_sub_days(Days::new(1)).unwrap_or(date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn at(y: i32, m: u32, d: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[rstest]
    #[case(at(2026, 8, 30, 1, 59), date(2026, 8, 29), 23)] // before first publication
    #[case(at(2026, 8, 30, 2, 0), date(2026, 8, 30), 2)]
    #[case(at(2026, 8, 30, 4, 59), date(2026, 8, 30), 2)]
    #[case(at(2026, 8, 30, 12, 30), date(2026, 8, 30), 11)]
    #[case(at(2026, 8, 30, 23, 0), date(2026, 8, 30), 23)]
    fn test_latest_slot_boundaries(
        #[case] now: NaiveDateTime,
        #[case] expected_date: NaiveDate,
        #[case] expected_hour: u32,
    ) {
        let slot = latest_slot(now);
        assert_eq!(slot.date, expected_date);
        assert_eq!(slot.hour, expected_hour);
    }

    #[test]
    fn test_previous_slot_rolls_over_midnight() {
        let slot = BaseTime {
            date: date(2026, 3, 1),
            hour: 2,
        };
        let prev = previous_slot(slot);
        assert_eq!(prev.date, date(2026, 2, 28));
        assert_eq!(prev.hour, 23);
    }

    #[test]
    fn test_eight_steps_back_is_one_day_earlier() {
        // From any starting slot, 8 predecessors later the hour repeats
        // exactly one calendar day earlier, visiting every publication
        // hour once, in descending order.
        for start_hour in BASE_HOURS {
            let start = BaseTime {
                date: date(2026, 8, 30),
                hour: start_hour,
            };
            let mut slot = start;
            let mut hours_seen = Vec::new();
            for _ in 0..8 {
                slot = previous_slot(slot);
                hours_seen.push(slot.hour);
            }
            assert_eq!(slot.hour, start.hour);
            assert_eq!(slot.date, date(2026, 8, 29));

            let mut expected: Vec<u32> = BASE_HOURS.to_vec();
            let pos = BASE_HOURS.iter().position(|&h| h == start_hour).unwrap();
            expected.rotate_left(pos + 1);
            assert_eq!(hours_seen, expected);
        }
    }

    #[test]
    fn test_request_params_format() {
        let slot = BaseTime {
            date: date(2026, 8, 30),
            hour: 5,
        };
        assert_eq!(slot.base_date_param(), "20260830");
        assert_eq!(slot.base_time_param(), "0500");
    }
}
