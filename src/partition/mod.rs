//! Splits a run's time range into the periods each source queries.

pub mod daily;
pub mod error;
pub mod snapshot_times;

use crate::types::time_range::TimeRange;

/// The tide-gauge service accepts the whole range in one query.
pub fn whole_range(range: TimeRange) -> Vec<TimeRange> {
    vec![range]
}
