//! Positional decoding of model-output access paths.
//!
//! Paths look like
//! `.../{run}/{grid}/{host}/{instance}/{ensemble}/fort.61.nc`, counted from
//! the end: the run time is the 6th segment from last, the grid the 5th, the
//! instance the 3rd and the ensemble (cast) the 2nd.

use crate::types::product::CastType;
use chrono::{DateTime, NaiveDateTime, Utc};
use log::error;

const RUN_TIME_FORMAT: &str = "%Y%m%d%H";

/// The run identifier encoded in a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunTime {
    /// A synoptic run, e.g. `2021052318`.
    Cycle(NaiveDateTime),
    /// A hurricane advisory number, e.g. `15`.
    Advisory(String),
}

fn segment(location: &str, from_end: usize) -> Option<&str> {
    let parts: Vec<&str> = location.split('/').collect();
    parts
        .len()
        .checked_sub(from_end)
        .and_then(|i| parts.get(i).copied())
}

pub fn run_time(location: &str) -> Option<RunTime> {
    let raw = segment(location, 6)?;
    // chrono needs a minute field to build a full timestamp
    let padded = format!("{}00", raw);
    match NaiveDateTime::parse_from_str(&padded, "%Y%m%d%H%M") {
        Ok(time) if raw.len() == 10 => Some(RunTime::Cycle(time)),
        _ => Some(RunTime::Advisory(raw.to_string())),
    }
}

pub fn grid_name(location: &str) -> Option<&str> {
    segment(location, 5)
}

pub fn instance_name(location: &str) -> Option<&str> {
    segment(location, 3)
}

pub fn ensemble(location: &str) -> Option<&str> {
    segment(location, 2)
}

/// Rewrites the ensemble segment to `nowcast`, giving the companion nowcast
/// file of a forecast run.
pub fn to_nowcast_location(location: &str) -> Option<String> {
    let mut parts: Vec<&str> = location.split('/').collect();
    if parts.len() < 6 {
        return None;
    }
    let i = parts.len() - 2;
    parts[i] = "nowcast";
    Some(parts.join("/"))
}

/// Renders snapshot times into access paths. The template marks the run time
/// with `%s` or `{time}`.
pub fn snapshot_locations(template: &str, times: &[DateTime<Utc>]) -> Vec<String> {
    times
        .iter()
        .map(|time| {
            let stamp = time.format(RUN_TIME_FORMAT).to_string();
            template.replace("{time}", &stamp).replace("%s", &stamp)
        })
        .collect()
}

/// Classifies a snapshot: data running past the path's run time means a
/// forecast. Advisory runs are always forecasts. `None` when the path is too
/// short to carry a run segment.
pub fn classify(location: &str, last_time: NaiveDateTime) -> Option<CastType> {
    match run_time(location)? {
        RunTime::Cycle(run) if last_time > run => Some(CastType::Forecast),
        RunTime::Cycle(_) => Some(CastType::Nowcast),
        RunTime::Advisory(advisory) => {
            error!("Found a hurricane advisory run {}, assuming forecast", advisory);
            Some(CastType::Forecast)
        }
    }
}
