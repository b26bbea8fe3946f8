//! The inclusive UTC time interval a harvest run covers, plus the timestamp
//! parsing shared by the sources.

use crate::partition::error::PartitionError;
use chrono::{DateTime, NaiveDateTime, Utc};
use log::info;

/// Format used for time ranges on the command line and in telemetry queries.
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// An inclusive `(start, end)` pair of UTC timestamps.
///
/// Construction normalizes the order: a reversed pair is swapped rather than
/// rejected, so no data is silently dropped.
///
/// # Examples
///
/// ```
/// use hydro_harvest::TimeRange;
///
/// let range = TimeRange::parse("2021-09-04 00:30:00", "2021-09-01 03:00:30").unwrap();
/// assert_eq!(range.start_string(), "2021-09-01 03:00:30");
/// assert_eq!(range.end_string(), "2021-09-04 00:30:00");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeRange {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeRange {
    /// Creates a range, swapping the bounds when `start > end`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        if start > end {
            info!("Swapping input times {} and {}", start, end);
            Self {
                start: end,
                end: start,
            }
        } else {
            Self { start, end }
        }
    }

    /// Parses both bounds using [`TIME_FORMAT`], interpreted as UTC.
    pub fn parse(start: &str, end: &str) -> Result<Self, PartitionError> {
        Ok(Self::new(parse_utc(start)?, parse_utc(end)?))
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Truncates the end to `now` for sources that cannot serve future data.
    ///
    /// Returns `None` when the whole range lies in the future.
    pub fn clamp_to(self, now: DateTime<Utc>) -> Option<Self> {
        if self.start > now {
            return None;
        }
        if self.end > now {
            info!("Truncating range: new end time is {}", now.format(TIME_FORMAT));
            return Some(Self {
                start: self.start,
                end: now,
            });
        }
        Some(self)
    }

    pub fn start_string(&self) -> String {
        self.start.format(TIME_FORMAT).to_string()
    }

    pub fn end_string(&self) -> String {
        self.end.format(TIME_FORMAT).to_string()
    }
}

/// Parses a [`TIME_FORMAT`] string as a UTC timestamp.
pub fn parse_utc(value: &str) -> Result<DateTime<Utc>, PartitionError> {
    NaiveDateTime::parse_from_str(value.trim(), TIME_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|e| PartitionError::InvalidTime(value.to_string(), e))
}

/// Tries each format in turn; sources are not consistent about seconds or the
/// date/time separator.
pub(crate) fn parse_timestamp(value: &str, formats: &[&str]) -> Option<NaiveDateTime> {
    let value = value.trim();
    formats
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_reversed_bounds_are_swapped() {
        let a = Utc.with_ymd_and_hms(2021, 9, 1, 3, 0, 30).unwrap();
        let b = Utc.with_ymd_and_hms(2021, 9, 4, 0, 30, 0).unwrap();
        assert_eq!(TimeRange::new(b, a), TimeRange::new(a, b));
        assert_eq!(TimeRange::new(b, a).start(), a);
    }

    #[test]
    fn test_clamp_truncates_future_end() {
        let range = TimeRange::parse("2021-09-01 00:00:00", "2021-09-10 00:00:00").unwrap();
        let now = Utc.with_ymd_and_hms(2021, 9, 5, 12, 0, 0).unwrap();
        let clamped = range.clamp_to(now).unwrap();
        assert_eq!(clamped.end(), now);
        assert_eq!(clamped.start(), range.start());
    }

    #[test]
    fn test_clamp_drops_range_entirely_in_future() {
        let range = TimeRange::parse("2030-01-01 00:00:00", "2030-01-02 00:00:00").unwrap();
        let now = Utc.with_ymd_and_hms(2021, 9, 5, 12, 0, 0).unwrap();
        assert!(range.clamp_to(now).is_none());
    }

    #[test]
    fn test_parse_rejects_wrong_format() {
        assert!(matches!(
            TimeRange::parse("2021/09/01", "2021-09-02 00:00:00"),
            Err(PartitionError::InvalidTime(..))
        ));
    }

    #[test]
    fn test_parse_timestamp_tries_formats_in_order() {
        let formats = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"];
        let parsed = parse_timestamp("2021-09-01 03:06", &formats).unwrap();
        assert_eq!(parsed.to_string(), "2021-09-01 03:06:00");
        assert!(parse_timestamp("not a time", &formats).is_none());
    }
}
