//! Six-hourly snapshot times for model output. Model runs are published at
//! 00, 06, 12 and 18 UTC; minutes and seconds of the input are ignored.

use crate::partition::error::PartitionError;
use crate::types::product::CastType;
use crate::types::time_range::TimeRange;
use chrono::{DateTime, Duration, NaiveTime, Timelike, Utc};
use log::{debug, warn};

const CYCLE_HOURS: u32 = 6;

/// Quantizes an hour of day onto the six-hour cycle.
///
/// Nowcast rounds down so a snapshot never lies past the requested time.
/// Forecast rounds to the nearest cycle (ties go up), which may be `24`,
/// meaning midnight of the following day.
pub fn quantize_hour(hour: u32, cast: CastType) -> Result<u32, PartitionError> {
    if hour >= 24 {
        return Err(PartitionError::HourOutOfRange(hour));
    }
    let floor = hour / CYCLE_HOURS * CYCLE_HOURS;
    match cast {
        CastType::Nowcast => Ok(floor),
        CastType::Forecast => {
            let ceil = floor + CYCLE_HOURS;
            if hour - floor < ceil - hour {
                Ok(floor)
            } else {
                Ok(ceil)
            }
        }
    }
}

fn cycle_time(at: DateTime<Utc>, hour: u32) -> DateTime<Utc> {
    at.date_naive().and_time(NaiveTime::MIN).and_utc() + Duration::hours(i64::from(hour))
}

/// Lists the snapshot times covering `range`.
///
/// The first snapshot is the most recent cycle at or before the start. For a
/// nowcast the end is clamped to `now` and rounded down; a forecast end is
/// rounded to the nearest cycle and may lie in the future.
pub fn snapshot_times(
    range: TimeRange,
    cast: CastType,
    now: DateTime<Utc>,
) -> Result<Vec<DateTime<Utc>>, PartitionError> {
    let range = match cast {
        CastType::Nowcast => match range.clamp_to(now) {
            Some(clamped) => clamped,
            None => {
                warn!(
                    "Nowcast range starting {} lies in the future, no snapshots",
                    range.start_string()
                );
                return Ok(Vec::new());
            }
        },
        CastType::Forecast => range,
    };

    let first = cycle_time(
        range.start(),
        quantize_hour(range.start().hour(), CastType::Nowcast)?,
    );
    let last = cycle_time(range.end(), quantize_hour(range.end().hour(), cast)?);

    let mut times = Vec::new();
    let mut step = first;
    while step <= last {
        times.push(step);
        step += Duration::hours(i64::from(CYCLE_HOURS));
    }
    debug!("{} {} snapshot times from {} to {}", times.len(), cast, first, last);
    Ok(times)
}
