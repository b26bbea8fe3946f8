//! The wide, station-per-column table produced by a harvest run.

use crate::types::series_frame::{SeriesFrame, VALUE_COLUMN};
use chrono::NaiveDateTime;
use log::warn;
use polars::prelude::*;
use std::collections::HashSet;

/// Name of the time column in every frame handed to downstream writers.
pub const TIME_COLUMN: &str = "TIME";
/// Timestamp format of the time column.
pub const OUTPUT_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Time-aligned values for many stations.
///
/// Rows are the sorted union of every station's timestamps. Cells a station
/// has no value for hold the table's fill value, never null or NaN.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateTable {
    /// A millisecond `TIME` column followed by one `f64` column per station.
    pub frame: DataFrame,
    fill_value: f64,
}

impl AggregateTable {
    /// A table with no stations and no rows.
    pub fn empty(fill_value: f64) -> Self {
        let schema = Schema::from_iter([Field::new(
            TIME_COLUMN.into(),
            DataType::Datetime(TimeUnit::Milliseconds, None),
        )]);
        Self {
            frame: DataFrame::empty_with_schema(&schema),
            fill_value,
        }
    }

    pub(crate) fn from_frame(frame: DataFrame, fill_value: f64) -> Self {
        Self { frame, fill_value }
    }

    /// Concatenates frames column-wise on the union of their time indexes.
    ///
    /// Column order follows the order of `frames`. A station appearing twice
    /// keeps its first frame. Missing cells are set to `fill_value`.
    ///
    /// # Errors
    ///
    /// Returns a [`PolarsError`] if the full join of the station frames fails.
    pub fn concat(frames: Vec<SeriesFrame>, fill_value: f64) -> PolarsResult<Self> {
        let mut seen = HashSet::new();
        let mut stations: Vec<String> = Vec::with_capacity(frames.len());
        let mut joined: Option<LazyFrame> = None;
        for frame in frames {
            let station = frame.station().to_string();
            if !seen.insert(station.clone()) {
                warn!("Dropping duplicate column for station {}", station);
                continue;
            }
            let column = frame
                .frame
                .lazy()
                .select([col(TIME_COLUMN), col(VALUE_COLUMN).alias(station.as_str())]);
            joined = Some(match joined {
                None => column,
                Some(acc) => acc.join(
                    column,
                    [col(TIME_COLUMN)],
                    [col(TIME_COLUMN)],
                    JoinArgs::new(JoinType::Full).with_coalesce(JoinCoalesce::CoalesceColumns),
                ),
            });
            stations.push(station);
        }

        let Some(joined) = joined else {
            return Ok(Self::empty(fill_value));
        };
        let fills: Vec<Expr> = stations
            .iter()
            .map(|station| col(station.as_str()).fill_null(lit(fill_value)))
            .collect();
        let frame = joined
            .unique_stable(
                Some(vec![PlSmallStr::from(TIME_COLUMN)]),
                UniqueKeepStrategy::First,
            )
            .sort([TIME_COLUMN], SortMultipleOptions::default())
            .with_columns(fills)
            .collect()?;
        Ok(Self { frame, fill_value })
    }

    pub fn index(&self) -> PolarsResult<Vec<NaiveDateTime>> {
        Ok(self
            .frame
            .column(TIME_COLUMN)?
            .datetime()?
            .as_datetime_iter()
            .flatten()
            .collect())
    }

    /// Station identifiers in column order.
    pub fn stations(&self) -> Vec<String> {
        self.frame
            .get_column_names()
            .into_iter()
            .filter(|name| name.as_str() != TIME_COLUMN)
            .map(|name| name.to_string())
            .collect()
    }

    pub fn fill_value(&self) -> f64 {
        self.fill_value
    }

    /// `true` when no station survived.
    pub fn is_empty(&self) -> bool {
        self.frame.width() <= 1
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }

    pub fn column(&self, station: &str) -> Option<Vec<f64>> {
        if station == TIME_COLUMN {
            return None;
        }
        let values = self.frame.column(station).ok()?.f64().ok()?;
        Some(
            values
                .into_iter()
                .map(|v| v.unwrap_or(self.fill_value))
                .collect(),
        )
    }

    /// The cell at `time` for `station`, fill value included.
    pub fn value(&self, time: NaiveDateTime, station: &str) -> Option<f64> {
        let row = self.index().ok()?.iter().position(|t| *t == time)?;
        self.column(station)?.get(row).copied()
    }

    /// Converts to the writer layout: the `TIME` column rendered as
    /// [`OUTPUT_TIME_FORMAT`] strings, followed by the station columns.
    pub fn to_dataframe(&self) -> PolarsResult<DataFrame> {
        self.frame
            .clone()
            .lazy()
            .with_column(col(TIME_COLUMN).dt().strftime(OUTPUT_TIME_FORMAT))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::error::Error;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2021, 9, 1)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn frame(station: &str, samples: Vec<(NaiveDateTime, Option<f64>)>) -> SeriesFrame {
        SeriesFrame::from_samples(station, samples).unwrap().0
    }

    #[test]
    fn test_concat_aligns_on_union_and_fills_gaps() -> Result<(), Box<dyn Error>> {
        let a = frame("A", vec![(at(0, 0), Some(1.0)), (at(0, 15), None)]);
        let c = frame("C", vec![(at(0, 15), Some(2.0)), (at(0, 30), Some(3.0))]);
        let table = AggregateTable::concat(vec![a, c], -99999.0)?;

        assert_eq!(table.stations(), vec!["A".to_string(), "C".to_string()]);
        assert_eq!(table.index()?, vec![at(0, 0), at(0, 15), at(0, 30)]);
        assert_eq!(table.column("A").unwrap(), vec![1.0, -99999.0, -99999.0]);
        assert_eq!(table.column("C").unwrap(), vec![-99999.0, 2.0, 3.0]);
        assert_eq!(table.value(at(0, 30), "C"), Some(3.0));
        Ok(())
    }

    #[test]
    fn test_duplicate_station_keeps_first_frame() -> Result<(), Box<dyn Error>> {
        let first = frame("A", vec![(at(0, 0), Some(1.0))]);
        let second = frame("A", vec![(at(0, 0), Some(7.0))]);
        let table = AggregateTable::concat(vec![first, second], -99999.0)?;
        assert_eq!(table.stations().len(), 1);
        assert_eq!(table.column("A").unwrap(), vec![1.0]);
        Ok(())
    }

    #[test]
    fn test_empty_concat() -> Result<(), Box<dyn Error>> {
        let table = AggregateTable::concat(Vec::new(), -99999.0)?;
        assert!(table.is_empty());
        assert_eq!(table.height(), 0);
        assert!(table.column(TIME_COLUMN).is_none());
        Ok(())
    }

    #[test]
    fn test_to_dataframe_layout() -> Result<(), Box<dyn Error>> {
        let a = frame("8410140", vec![(at(0, 0), Some(1.5))]);
        let df = AggregateTable::concat(vec![a], -99999.0)?.to_dataframe()?;
        let names: Vec<String> = df.get_column_names().iter().map(|n| n.to_string()).collect();
        assert_eq!(names, vec!["TIME", "8410140"]);
        let time = df.column("TIME")?.str()?.get(0);
        assert_eq!(time, Some("2021-09-01T00:00:00"));
        assert_eq!(df.column("8410140")?.f64()?.get(0), Some(1.5));
        Ok(())
    }
}
