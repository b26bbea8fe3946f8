//! Calendar-day partitioning for the telemetry source, which caps the number
//! of rows per response.

use crate::types::time_range::TimeRange;
use chrono::{DateTime, Duration, Timelike, Utc};
use log::{debug, warn};

/// Length of a full-day sub-range: the next one starts one second later.
fn full_day() -> Duration {
    Duration::hours(23) + Duration::minutes(59) + Duration::seconds(59)
}

/// Splits `range` into sub-ranges that each stay within one calendar day.
///
/// The end is clamped to `now` first. The first sub-range runs from the start
/// to `23:59:59` of its day, interior ones span `00:00:00..=23:59:59` and the
/// last ends at the range end. Consecutive sub-ranges are one second apart.
pub fn daily_periods(range: TimeRange, now: DateTime<Utc>) -> Vec<TimeRange> {
    let Some(range) = range.clamp_to(now) else {
        warn!(
            "Range starting {} lies entirely in the future, nothing to fetch",
            range.start_string()
        );
        return Vec::new();
    };

    let start = range.start();
    let mut interval = Duration::hours(23 - i64::from(start.hour()))
        + Duration::minutes(59 - i64::from(start.minute()))
        + Duration::seconds(59 - i64::from(start.second()));

    let mut periods = Vec::new();
    let mut sub_start = start;
    loop {
        let sub_end = (sub_start + interval).min(range.end());
        periods.push(TimeRange::new(sub_start, sub_end));
        if sub_end >= range.end() {
            break;
        }
        sub_start = sub_end + Duration::seconds(1);
        interval = full_day();
    }
    debug!(
        "Split {} - {} into {} daily periods",
        range.start_string(),
        range.end_string(),
        periods.len()
    );
    periods
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn far_future() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2100, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_partial_days_at_both_ends() {
        let range = TimeRange::parse("2021-09-01 03:00:30", "2021-09-04 00:30:00").unwrap();
        let periods = daily_periods(range, far_future());
        let rendered: Vec<(String, String)> = periods
            .iter()
            .map(|p| (p.start_string(), p.end_string()))
            .collect();
        assert_eq!(
            rendered,
            vec![
                ("2021-09-01 03:00:30".to_string(), "2021-09-01 23:59:59".to_string()),
                ("2021-09-02 00:00:00".to_string(), "2021-09-02 23:59:59".to_string()),
                ("2021-09-03 00:00:00".to_string(), "2021-09-03 23:59:59".to_string()),
                ("2021-09-04 00:00:00".to_string(), "2021-09-04 00:30:00".to_string()),
            ]
        );
    }

    #[test]
    fn test_reversed_range_partitions_identically() {
        let forward = TimeRange::parse("2021-09-01 03:00:30", "2021-09-04 00:30:00").unwrap();
        let reversed = TimeRange::parse("2021-09-04 00:30:00", "2021-09-01 03:00:30").unwrap();
        assert_eq!(
            daily_periods(forward, far_future()),
            daily_periods(reversed, far_future())
        );
    }

    #[test]
    fn test_periods_are_contiguous_and_cover_range() {
        let range = TimeRange::parse("2021-01-30 17:42:05", "2021-02-11 08:01:59").unwrap();
        let periods = daily_periods(range, far_future());
        assert_eq!(periods.first().unwrap().start(), range.start());
        assert_eq!(periods.last().unwrap().end(), range.end());
        for pair in periods.windows(2) {
            assert_eq!(pair[1].start() - pair[0].end(), Duration::seconds(1));
        }
        for interior in &periods[1..periods.len() - 1] {
            assert_eq!(interior.end() - interior.start(), full_day());
        }
    }

    #[test]
    fn test_single_instant_yields_one_period() {
        let range = TimeRange::parse("2021-09-01 12:00:00", "2021-09-01 12:00:00").unwrap();
        let periods = daily_periods(range, far_future());
        assert_eq!(periods, vec![range]);
    }

    #[test]
    fn test_end_is_clamped_to_now() {
        let range = TimeRange::parse("2021-09-01 00:00:00", "2021-09-30 00:00:00").unwrap();
        let now = Utc.with_ymd_and_hms(2021, 9, 2, 6, 0, 0).unwrap();
        let periods = daily_periods(range, now);
        assert_eq!(periods.len(), 2);
        assert_eq!(periods[1].end(), now);
    }
}
