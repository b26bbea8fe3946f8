//! Access to gridded model-output snapshots (station time-series files).
//!
//! The adapter only talks to [`SnapshotReader`]; the NetCDF implementation
//! lives behind the `netcdf` feature.

use crate::types::time_range::parse_timestamp;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Failed to open snapshot {location}: {message}")]
    Open { location: String, message: String },

    #[error("Variable '{variable}' missing from snapshot {location}")]
    MissingVariable { location: String, variable: String },

    #[error("Failed to read '{variable}' from snapshot {location}: {message}")]
    Read {
        location: String,
        variable: String,
        message: String,
    },

    #[error("Unsupported time units '{0}'")]
    TimeUnits(String),

    #[error("Node {node} is outside the {nodes} stations of snapshot {location}")]
    NodeOutOfRange {
        location: String,
        node: usize,
        nodes: usize,
    },
}

/// One opened snapshot file.
pub trait Snapshot {
    fn location(&self) -> &str;

    /// Raw entries of the station-name variable, in node order.
    fn station_names(&self) -> Result<Vec<String>, SnapshotError>;

    /// Decoded time axis.
    fn times(&self) -> Result<Vec<NaiveDateTime>, SnapshotError>;

    fn has_variable(&self, name: &str) -> bool;

    /// The full time series of `variable` at one station node.
    fn node_values(&self, variable: &str, node: usize) -> Result<Vec<f64>, SnapshotError>;

    /// `(lon, lat)` of a station node.
    fn node_location(&self, node: usize) -> Result<(f64, f64), SnapshotError>;

    /// The global `source` attribute, naming the producing model.
    fn source(&self) -> Option<String>;
}

/// Opens snapshots by location (a local path or a remote access URL).
pub trait SnapshotReader: Send + Sync {
    fn open(&self, location: &str) -> Result<Box<dyn Snapshot>, SnapshotError>;
}

/// Station identifier of a raw station-name entry: its first whitespace
/// separated token (names look like `8410140 Eastport, ME`).
pub fn station_code(raw: &str) -> &str {
    raw.split_whitespace().next().unwrap_or("")
}

/// Decodes a CF-style time axis (`<unit> since <base>`) into timestamps.
pub fn decode_time_axis(units: &str, values: &[f64]) -> Result<Vec<NaiveDateTime>, SnapshotError> {
    let bad_units = || SnapshotError::TimeUnits(units.to_string());
    let (unit, base) = units.split_once(" since ").ok_or_else(bad_units)?;
    let millis_per_unit = match unit.trim().to_ascii_lowercase().as_str() {
        "seconds" | "second" | "secs" | "s" => 1_000.0,
        "minutes" | "minute" | "mins" => 60_000.0,
        "hours" | "hour" | "hrs" | "h" => 3_600_000.0,
        "days" | "day" | "d" => 86_400_000.0,
        _ => return Err(bad_units()),
    };

    let base = base.trim().trim_end_matches(|c: char| !c.is_ascii_digit());
    let tokens: Vec<&str> = base.split_whitespace().collect();
    let base = parse_timestamp(base, &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"])
        .or_else(|| {
            tokens.get(..2).and_then(|pair| {
                parse_timestamp(&pair.join(" "), &["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"])
            })
        })
        .or_else(|| {
            tokens
                .first()
                .and_then(|day| NaiveDate::parse_from_str(day, "%Y-%m-%d").ok())
                .and_then(|day| day.and_hms_opt(0, 0, 0))
        })
        .ok_or_else(bad_units)?;

    Ok(values
        .iter()
        .map(|v| base + Duration::milliseconds((v * millis_per_unit).round() as i64))
        .collect())
}
