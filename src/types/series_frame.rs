//! A single station's time series for one product, and the per-station
//! normalization applied before aggregation (gap fill and fixed-cadence
//! resampling).

use crate::types::aggregate_table::TIME_COLUMN;
use chrono::{Duration, NaiveDateTime};
use log::debug;
use polars::prelude::{
    col, lit, when, ChunkApply, Column, DataFrame, DataType, DynamicGroupOptions, Expr, Field,
    IntoLazy, IntoSeries, Label, PlSmallStr, PolarsResult, PolarsUpsample, Schema,
    SortMultipleOptions, StartBy, TimeUnit, UniqueKeepStrategy,
};
use polars::prelude::{ClosedWindow, Duration as WindowDuration};

/// Name of the value column of a [`SeriesFrame`].
pub const VALUE_COLUMN: &str = "VALUE";

/// Time-indexed values for one station and one product.
///
/// The frame holds a millisecond `TIME` column, strictly ascending, and a
/// nullable `f64` `VALUE` column. Duplicate timestamps are collapsed on
/// construction, keeping the first-seen value. Non-finite inputs are stored
/// as nulls.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesFrame {
    station: String,
    /// The underlying `TIME`/`VALUE` frame.
    pub frame: DataFrame,
}

fn schema() -> Schema {
    Schema::from_iter([
        Field::new(
            TIME_COLUMN.into(),
            DataType::Datetime(TimeUnit::Milliseconds, None),
        ),
        Field::new(VALUE_COLUMN.into(), DataType::Float64),
    ])
}

impl SeriesFrame {
    pub fn empty(station: impl Into<String>) -> Self {
        Self {
            station: station.into(),
            frame: DataFrame::empty_with_schema(&schema()),
        }
    }

    /// Builds a frame from samples in arrival order.
    ///
    /// Samples are sorted by time (stable, so arrival order decides between equal
    /// timestamps) and duplicate timestamps keep their first value. The returned
    /// flag is `true` when duplicates were dropped.
    ///
    /// # Errors
    ///
    /// Returns a [`polars::prelude::PolarsError`] if the frame cannot be built.
    pub fn from_samples(
        station: impl Into<String>,
        samples: Vec<(NaiveDateTime, Option<f64>)>,
    ) -> PolarsResult<(Self, bool)> {
        let station = station.into();
        let received = samples.len();
        let (times, values): (Vec<NaiveDateTime>, Vec<Option<f64>>) = samples
            .into_iter()
            .map(|(time, value)| (time, value.filter(|v| v.is_finite())))
            .unzip();

        let frame = DataFrame::new(vec![
            Column::new(TIME_COLUMN.into(), times),
            Column::new(VALUE_COLUMN.into(), values),
        ])?
        .lazy()
        .sort(
            [TIME_COLUMN],
            SortMultipleOptions::default().with_maintain_order(true),
        )
        .unique_stable(
            Some(vec![PlSmallStr::from(TIME_COLUMN)]),
            UniqueKeepStrategy::First,
        )
        .collect()?;

        let multivalue = frame.height() != received;
        if multivalue {
            debug!(
                "Dropped {} duplicate timestamps for station {}",
                received - frame.height(),
                station
            );
        }
        Ok((Self { station, frame }, multivalue))
    }

    /// Concatenates partial frames (e.g. one per sub-range) in the given order.
    pub fn concat(
        station: impl Into<String>,
        parts: impl IntoIterator<Item = SeriesFrame>,
    ) -> PolarsResult<(Self, bool)> {
        let mut samples = Vec::new();
        for part in parts {
            samples.extend(part.index()?.into_iter().zip(part.values()?));
        }
        Self::from_samples(station, samples)
    }

    pub fn station(&self) -> &str {
        &self.station
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

    pub fn values(&self) -> PolarsResult<Vec<Option<f64>>> {
        Ok(self.frame.column(VALUE_COLUMN)?.f64()?.into_iter().collect())
    }

    pub fn len(&self) -> usize {
        self.frame.height()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.height() == 0
    }

    /// `true` when at least one value is present.
    pub fn has_data(&self) -> bool {
        self.frame
            .column(VALUE_COLUMN)
            .map(|values| values.null_count() < values.len())
            .unwrap_or(false)
    }

    /// Applies `f` to every present value, e.g. a unit conversion.
    pub fn map_values(mut self, f: impl Fn(f64) -> f64 + Copy) -> PolarsResult<Self> {
        let mapped = self.frame.column(VALUE_COLUMN)?.f64()?.apply_values(f);
        self.frame.with_column(mapped.into_series())?;
        Ok(self)
    }

    /// Fills at most one missing sample per interior gap by linear interpolation
    /// in time between the values bounding the gap. Leading and trailing gaps
    /// are left alone.
    pub fn interpolate_single_gaps(self) -> PolarsResult<Self> {
        let value = col(VALUE_COLUMN);
        let opens_gap = value
            .clone()
            .is_null()
            .and(value.clone().shift(lit(1)).is_not_null());
        let frame = self
            .frame
            .lazy()
            .with_column(
                when(opens_gap)
                    .then(value.clone().interpolate_by(col(TIME_COLUMN)))
                    .otherwise(value)
                    .alias(VALUE_COLUMN),
            )
            .collect()?;
        Ok(Self {
            station: self.station,
            frame,
        })
    }

    /// Resamples onto a fixed cadence aligned to the Unix epoch.
    ///
    /// Each bucket is labelled with its start time and takes the first present
    /// value observed in it. Every bucket between the first and last occupied
    /// one is emitted, so empty buckets show up as nulls.
    pub fn resample(&self, cadence: Duration) -> PolarsResult<Self> {
        let step = cadence.num_seconds();
        if step <= 0 {
            return Ok(self.clone());
        }
        if self.is_empty() {
            return Ok(Self::empty(self.station.clone()));
        }

        let every = WindowDuration::try_parse(&format!("{}s", step))?;
        let options = DynamicGroupOptions {
            every,
            period: every,
            offset: WindowDuration::try_parse("0s")?,
            label: Label::Left,
            closed_window: ClosedWindow::Left,
            start_by: StartBy::WindowBound,
            ..Default::default()
        };
        let buckets = self
            .frame
            .clone()
            .lazy()
            .group_by_dynamic(col(TIME_COLUMN), Vec::<Expr>::new(), options)
            .agg([col(VALUE_COLUMN).drop_nulls().first()])
            .sort([TIME_COLUMN], SortMultipleOptions::default())
            .collect()?;
        let frame = buckets.upsample_stable(Vec::<PlSmallStr>::new(), TIME_COLUMN, every)?;
        Ok(Self {
            station: self.station.clone(),
            frame,
        })
    }
}
