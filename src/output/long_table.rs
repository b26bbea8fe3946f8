//! Long ("melted") form of an [`AggregateTable`]: one `(TIME, STATION, value)`
//! row per cell, station-major.

use crate::types::aggregate_table::{AggregateTable, OUTPUT_TIME_FORMAT, TIME_COLUMN};
use crate::types::metadata::STATION_COLUMN;
use chrono::NaiveDateTime;
use polars::lazy::frame::pivot::pivot_stable;
use polars::prelude::*;

#[derive(Debug, Clone, PartialEq)]
pub struct LongRow {
    pub time: NaiveDateTime,
    pub station: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LongTable {
    /// Name of the value column, usually the product name.
    value_column: String,
    /// `TIME`, `STATION` and the value column.
    pub frame: DataFrame,
    fill_value: f64,
}

impl LongTable {
    /// Melts a wide table. Every cell becomes a row, fill values included.
    ///
    /// # Errors
    ///
    /// Returns a [`PolarsError`] if the unpivot fails.
    pub fn from_wide(table: &AggregateTable, value_column: impl Into<String>) -> PolarsResult<Self> {
        let value_column = value_column.into();
        let stations = table.stations();
        let frame = if stations.is_empty() {
            DataFrame::empty_with_schema(&Schema::from_iter([
                Field::new(
                    TIME_COLUMN.into(),
                    DataType::Datetime(TimeUnit::Milliseconds, None),
                ),
                Field::new(STATION_COLUMN.into(), DataType::String),
                Field::new(value_column.as_str().into(), DataType::Float64),
            ]))
        } else {
            table
                .frame
                .clone()
                .lazy()
                .unpivot(UnpivotArgsDSL {
                    on: stations.iter().map(|s| Selector::from(s.as_str())).collect(),
                    index: vec![Selector::from(TIME_COLUMN)],
                    variable_name: Some(STATION_COLUMN.into()),
                    value_name: Some(value_column.as_str().into()),
                })
                .collect()?
        };
        Ok(Self {
            value_column,
            frame,
            fill_value: table.fill_value(),
        })
    }

    pub fn rows(&self) -> PolarsResult<Vec<LongRow>> {
        let times = self.frame.column(TIME_COLUMN)?.datetime()?;
        let stations = self.frame.column(STATION_COLUMN)?.str()?;
        let values = self.frame.column(&self.value_column)?.f64()?;
        Ok(times
            .as_datetime_iter()
            .zip(stations)
            .zip(values)
            .filter_map(|((time, station), value)| {
                Some(LongRow {
                    time: time?,
                    station: station?.to_string(),
                    value: value.unwrap_or(self.fill_value),
                })
            })
            .collect())
    }

    pub fn value_column(&self) -> &str {
        &self.value_column
    }

    pub fn len(&self) -> usize {
        self.frame.height()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.height() == 0
    }

    /// Pivots back to the wide layout. Stations keep their first-seen order;
    /// cells without a row get the fill value.
    pub fn to_wide(&self) -> PolarsResult<AggregateTable> {
        if self.is_empty() {
            return Ok(AggregateTable::empty(self.fill_value));
        }
        let wide = pivot_stable(
            &self.frame,
            [STATION_COLUMN],
            Some([TIME_COLUMN]),
            Some([self.value_column.as_str()]),
            false,
            None,
            None,
        )?;
        let fills: Vec<Expr> = wide
            .get_column_names()
            .into_iter()
            .filter(|name| name.as_str() != TIME_COLUMN)
            .map(|name| col(name.clone()).fill_null(lit(self.fill_value)))
            .collect();
        let frame = wide
            .lazy()
            .sort([TIME_COLUMN], SortMultipleOptions::default())
            .with_columns(fills)
            .collect()?;
        Ok(AggregateTable::from_frame(frame, self.fill_value))
    }

    /// `TIME` as [`OUTPUT_TIME_FORMAT`] strings, `STATION` and the value column.
    pub fn to_dataframe(&self) -> PolarsResult<DataFrame> {
        self.frame
            .clone()
            .lazy()
            .with_column(col(TIME_COLUMN).dt().strftime(OUTPUT_TIME_FORMAT))
            .collect()
    }
}
