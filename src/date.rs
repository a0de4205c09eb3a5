//! Encoded calendar days (`YYYYMMDD` as an integer) and the reference-timezone clock.

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, Offset, Utc};

use crate::error::{AnalyticsError, Result};

/// Encode a calendar day, e.g. 2017-09-01 -> 20170901.
pub fn date_as_integer(date: NaiveDate) -> u32 {
    date.year() as u32 * 10_000 + date.month() * 100 + date.day()
}

pub fn date_from_integer(value: u32) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt((value / 10_000) as i32, (value / 100) % 100, value % 100)
        .ok_or(AnalyticsError::InvalidDate(value))
}

pub fn is_valid_date_as_integer(value: u32) -> bool {
    date_from_integer(value).is_ok()
}

pub fn next_day(value: u32) -> Result<u32> {
    let date = date_from_integer(value)?;
    Ok(date_as_integer(date + Duration::days(1)))
}

/// The encoded day `now` falls on in a fixed UTC offset.
pub fn date_as_integer_at(now: DateTime<Utc>, utc_offset_hours: i32) -> u32 {
    let offset = FixedOffset::east_opt(utc_offset_hours * 3600)
        .unwrap_or_else(|| Utc.fix());
    date_as_integer(now.with_timezone(&offset).date_naive())
}

/// Today in the reference timezone.
pub fn today_as_integer(utc_offset_hours: i32) -> u32 {
    date_as_integer_at(Utc::now(), utc_offset_hours)
}

/// Bounded forward walk over the days strictly after a starting day.
///
/// Yields at most `max_days` encoded days, then stops. Used by the rollup
/// cursor so that a gap in the event history cannot scan forever.
#[derive(Debug, Clone)]
pub struct DayScan {
    next: NaiveDate,
    remaining: u32,
}

impl DayScan {
    pub fn after(day: u32, max_days: u32) -> Result<Self> {
        let start = date_from_integer(day)?;
        Ok(Self {
            next: start + Duration::days(1),
            remaining: max_days,
        })
    }

    /// True once the scan has yielded its full allowance.
    pub fn exhausted(&self) -> bool {
        self.remaining == 0
    }
}

impl Iterator for DayScan {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let day = date_as_integer(self.next);
        self.next += Duration::days(1);
        Some(day)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_encode_decode() {
        let date = NaiveDate::from_ymd_opt(2017, 9, 1).unwrap();
        assert_eq!(date_as_integer(date), 20170901);
        assert_eq!(date_from_integer(20170901).unwrap(), date);
    }

    #[test]
    fn test_invalid_dates_rejected() {
        assert!(date_from_integer(20170231).is_err());
        assert!(date_from_integer(0).is_err());
        assert!(!is_valid_date_as_integer(20171301));
    }

    #[test]
    fn test_next_day_rolls_month_and_year() {
        assert_eq!(next_day(20170930).unwrap(), 20171001);
        assert_eq!(next_day(20171231).unwrap(), 20180101);
        assert_eq!(next_day(20200228).unwrap(), 20200229);
    }

    #[test]
    fn test_reference_offset_moves_the_day() {
        // 05:00 UTC is still the previous evening eight hours west.
        let now = Utc.with_ymd_and_hms(2024, 11, 6, 5, 0, 0).unwrap();
        assert_eq!(date_as_integer_at(now, 0), 20241106);
        assert_eq!(date_as_integer_at(now, -8), 20241105);
    }

    #[test]
    fn test_day_scan_is_bounded() {
        let days: Vec<u32> = DayScan::after(20171230, 4).unwrap().collect();
        assert_eq!(days, vec![20171231, 20180101, 20180102, 20180103]);

        let mut scan = DayScan::after(20170101, 500).unwrap();
        assert_eq!(scan.by_ref().count(), 500);
        assert!(scan.exhausted());
    }
}
