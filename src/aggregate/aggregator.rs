//! Drives one [`SourceAdapter`] over a station list and merges the survivors
//! into a single time-aligned table.
//!
//! A station that fails (error or empty result) is logged and excluded; the
//! run continues. Only a fatal [`FetchError`] aborts the phase.

use crate::sources::error::FetchError;
use crate::sources::source::SourceAdapter;
use crate::types::aggregate_table::AggregateTable;
use crate::types::metadata::{MetadataTable, StationMetadata};
use crate::types::series_frame::SeriesFrame;
use crate::types::station::Station;
use bon::bon;
use chrono::Duration;
use futures_util::{stream, StreamExt};
use log::{error, info, warn};
use polars::prelude::PolarsResult;

pub const DEFAULT_RESAMPLE_MINUTES: u32 = 15;
pub const DEFAULT_FILL_VALUE: f64 = -99999.0;

/// How station series are normalized and merged.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregationSettings {
    /// Resampling cadence; `None` keeps each source's native timestamps.
    pub resample: Option<Duration>,
    /// Written into every missing cell of the output tables.
    pub fill_value: f64,
    /// Stations fetched at once. `1` is strictly sequential.
    pub max_concurrent: usize,
}

impl AggregationSettings {
    /// Settings with a resampling cadence in minutes, `0` disabling it.
    pub fn with_resample_minutes(minutes: u32) -> Self {
        Self {
            resample: (minutes > 0).then(|| Duration::minutes(i64::from(minutes))),
            ..Self::default()
        }
    }
}

impl Default for AggregationSettings {
    fn default() -> Self {
        Self {
            resample: Some(Duration::minutes(i64::from(DEFAULT_RESAMPLE_MINUTES))),
            fill_value: DEFAULT_FILL_VALUE,
            max_concurrent: 1,
        }
    }
}

/// Result of the data phase.
#[derive(Debug, Clone)]
pub struct DataReport {
    pub table: AggregateTable,
    pub included: Vec<String>,
    pub excluded: Vec<String>,
}

/// Result of the metadata phase.
#[derive(Debug, Clone)]
pub struct MetadataReport {
    pub table: MetadataTable,
    pub included: Vec<String>,
    pub excluded: Vec<String>,
}

pub struct StationAggregator<A: SourceAdapter> {
    adapter: A,
    stations: Vec<Station>,
    periods: Vec<A::Period>,
    settings: AggregationSettings,
}

#[bon]
impl<A: SourceAdapter> StationAggregator<A> {
    #[builder]
    pub fn new(
        adapter: A,
        stations: Vec<Station>,
        periods: Vec<A::Period>,
        settings: Option<AggregationSettings>,
    ) -> Self {
        Self {
            adapter,
            stations,
            periods,
            settings: settings.unwrap_or_default(),
        }
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn stations(&self) -> &[Station] {
        &self.stations
    }

    pub fn settings(&self) -> &AggregationSettings {
        &self.settings
    }

    fn concurrency(&self) -> usize {
        self.settings.max_concurrent.max(1)
    }

    /// Interpolates single-step gaps, then resamples onto the cadence.
    fn normalize(&self, frame: SeriesFrame) -> PolarsResult<SeriesFrame> {
        let frame = frame.interpolate_single_gaps()?;
        match self.settings.resample {
            Some(cadence) => frame.resample(cadence),
            None => Ok(frame),
        }
    }

    /// Fetches every station's series and merges them into one table.
    ///
    /// Columns follow the input station order, minus excluded stations.
    /// When every station fails the table is empty, which is not an error.
    ///
    /// # Errors
    ///
    /// Returns the first fatal [`FetchError`] an adapter reports.
    pub async fn aggregate_station_data(&self) -> Result<DataReport, FetchError> {
        let periods = self.periods.as_slice();
        let fetches = stream::iter(self.stations.iter())
            .map(|station| async move {
                info!("{}: fetching station {}", self.adapter.name(), station);
                (station, self.adapter.fetch_series(station, periods).await)
            })
            .buffered(self.concurrency());
        let mut fetches = std::pin::pin!(fetches);

        let mut frames = Vec::with_capacity(self.stations.len());
        let mut included = Vec::new();
        let mut excluded = Vec::new();
        while let Some((station, result)) = fetches.next().await {
            match result {
                Err(e) if e.is_fatal() => {
                    error!("{}: aborting on station {}: {}", self.adapter.name(), station, e);
                    return Err(e);
                }
                Err(e) => {
                    warn!("Skipping station {}, probably no data: {}", station, e);
                    excluded.push(station.id().to_string());
                }
                Ok(frame) if !frame.has_data() => {
                    warn!("Skipping station {}: no usable values", station);
                    excluded.push(station.id().to_string());
                }
                Ok(frame) => match self.normalize(frame) {
                    Ok(frame) => {
                        frames.push(frame);
                        included.push(station.id().to_string());
                    }
                    Err(e) => {
                        warn!("Skipping station {}, could not normalize its series: {}", station, e);
                        excluded.push(station.id().to_string());
                    }
                },
            }
        }

        info!("{} stations were excluded", excluded.len());
        info!("{} stations included", included.len());
        if frames.is_empty() {
            warn!("No data was found for the given station list. Perhaps the server is down");
        }

        let table =
            AggregateTable::concat(frames, self.settings.fill_value).map_err(FetchError::Merge)?;
        Ok(DataReport {
            table,
            included,
            excluded,
        })
    }

    /// Fetches one metadata row per station.
    ///
    /// # Errors
    ///
    /// Returns the first fatal [`FetchError`] an adapter reports.
    pub async fn aggregate_station_metadata(&self) -> Result<MetadataReport, FetchError> {
        let fetches = stream::iter(self.stations.iter())
            .map(|station| async move { (station, self.adapter.fetch_metadata(station).await) })
            .buffered(self.concurrency());
        let mut fetches = std::pin::pin!(fetches);

        let mut rows: Vec<StationMetadata> = Vec::with_capacity(self.stations.len());
        let mut included = Vec::new();
        let mut excluded = Vec::new();
        while let Some((station, result)) = fetches.next().await {
            match result {
                Err(e) if e.is_fatal() => {
                    error!("{}: metadata aborted on station {}: {}", self.adapter.name(), station, e);
                    return Err(e);
                }
                Err(e) => {
                    warn!("Metadata: skipping station {}: {}", station, e);
                    excluded.push(station.id().to_string());
                }
                Ok(row) => {
                    info!("Metadata: kept station {}", station);
                    included.push(station.id().to_string());
                    rows.push(row);
                }
            }
        }

        info!("{} metadata stations were excluded", excluded.len());
        if rows.is_empty() {
            warn!("Metadata: no site data was found for the given station list");
        }

        Ok(MetadataReport {
            table: MetadataTable::new(rows, self.settings.fill_value),
            included,
            excluded,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;
    use std::collections::HashMap;

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    enum Canned {
        Series(Vec<(NaiveDateTime, Option<f64>)>),
        Recoverable,
        Fatal,
    }

    struct FakeAdapter {
        canned: HashMap<String, Canned>,
    }

    impl FakeAdapter {
        fn new(entries: Vec<(&str, Canned)>) -> Self {
            Self {
                canned: entries
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), v))
                    .collect(),
            }
        }

        fn lookup(&self, station: &Station) -> Result<&Vec<(NaiveDateTime, Option<f64>)>, FetchError> {
            match self.canned.get(station.id()) {
                Some(Canned::Series(samples)) => Ok(samples),
                Some(Canned::Fatal) => Err(FetchError::UnresolvedStation(station.id().to_string())),
                _ => Err(FetchError::NoData {
                    station: station.id().to_string(),
                }),
            }
        }
    }

    impl SourceAdapter for FakeAdapter {
        type Period = ();

        fn name(&self) -> &'static str {
            "fake"
        }

        async fn fetch_series(&self, station: &Station, _: &[()]) -> Result<SeriesFrame, FetchError> {
            let samples = self.lookup(station)?.clone();
            let (frame, _) = SeriesFrame::from_samples(station.id(), samples)
                .map_err(|e| FetchError::from_frame(station.id(), e))?;
            Ok(frame)
        }

        async fn fetch_metadata(&self, station: &Station) -> Result<StationMetadata, FetchError> {
            self.lookup(station)?;
            let mut row = StationMetadata::new(station.id());
            row.lat = Some(35.0);
            Ok(row)
        }
    }

    fn quarter_hours(values: &[f64]) -> Vec<(NaiveDateTime, Option<f64>)> {
        let start = at("2021-09-01 00:00:00");
        values
            .iter()
            .enumerate()
            .map(|(i, v)| (start + Duration::minutes(15 * i as i64), Some(*v)))
            .collect()
    }

    fn aggregator(adapter: FakeAdapter, stations: &[&str], max_concurrent: usize) -> StationAggregator<FakeAdapter> {
        StationAggregator::builder()
            .adapter(adapter)
            .stations(stations.iter().map(|s| Station::from(*s)).collect::<Vec<_>>())
            .periods(vec![()])
            .settings(AggregationSettings {
                max_concurrent,
                ..AggregationSettings::default()
            })
            .build()
    }

    #[tokio::test]
    async fn test_failed_station_is_excluded() -> Result<(), Box<dyn std::error::Error>> {
        let adapter = FakeAdapter::new(vec![
            ("A", Canned::Series(quarter_hours(&[1.0, 2.0, 3.0]))),
            ("B", Canned::Recoverable),
            ("C", Canned::Series(quarter_hours(&[4.0, 5.0]))),
        ]);
        let report = aggregator(adapter, &["A", "B", "C"], 1)
            .aggregate_station_data()
            .await?;
        assert_eq!(report.table.stations(), vec!["A".to_string(), "C".to_string()]);
        assert_eq!(report.included, vec!["A", "C"]);
        assert_eq!(report.excluded, vec!["B"]);
        assert_eq!(report.table.height(), 3);
        assert_eq!(report.table.value(at("2021-09-01 00:30:00"), "C"), Some(DEFAULT_FILL_VALUE));
        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_fetch_keeps_station_order() -> Result<(), Box<dyn std::error::Error>> {
        let adapter = FakeAdapter::new(vec![
            ("A", Canned::Series(quarter_hours(&[1.0]))),
            ("B", Canned::Series(quarter_hours(&[2.0]))),
            ("C", Canned::Series(quarter_hours(&[3.0]))),
        ]);
        let report = aggregator(adapter, &["C", "A", "B"], 3)
            .aggregate_station_data()
            .await?;
        assert_eq!(report.included, vec!["C", "A", "B"]);
        assert_eq!(report.table.stations(), vec!["C".to_string(), "A".to_string(), "B".to_string()]);
        Ok(())
    }

    #[tokio::test]
    async fn test_empty_frame_counts_as_failure() -> Result<(), Box<dyn std::error::Error>> {
        let start = at("2021-09-01 00:00:00");
        let adapter = FakeAdapter::new(vec![
            ("A", Canned::Series(vec![(start, None)])),
            ("B", Canned::Series(Vec::new())),
        ]);
        let report = aggregator(adapter, &["A", "B"], 1)
            .aggregate_station_data()
            .await?;
        assert!(report.table.is_empty());
        assert_eq!(report.excluded, vec!["A", "B"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_fatal_error_aborts() {
        let adapter = FakeAdapter::new(vec![
            ("A", Canned::Series(quarter_hours(&[1.0]))),
            ("B", Canned::Fatal),
        ]);
        let result = aggregator(adapter, &["A", "B"], 1).aggregate_station_data().await;
        assert!(matches!(result, Err(FetchError::UnresolvedStation(_))));
    }

    #[tokio::test]
    async fn test_gaps_are_filled_before_resampling() -> Result<(), Box<dyn std::error::Error>> {
        let start = at("2021-09-01 00:00:00");
        let samples = vec![
            (start, Some(1.0)),
            (start + Duration::minutes(15), None),
            (start + Duration::minutes(30), Some(3.0)),
        ];
        let adapter = FakeAdapter::new(vec![("A", Canned::Series(samples))]);
        let report = aggregator(adapter, &["A"], 1).aggregate_station_data().await?;
        assert_eq!(report.table.value(start + Duration::minutes(15), "A"), Some(2.0));
        Ok(())
    }

    #[tokio::test]
    async fn test_resampling_can_be_disabled() -> Result<(), Box<dyn std::error::Error>> {
        let start = at("2021-09-01 00:00:00");
        let samples = vec![(start, Some(1.0)), (start + Duration::minutes(6), Some(2.0))];
        let adapter = FakeAdapter::new(vec![("A", Canned::Series(samples))]);
        let report = StationAggregator::builder()
            .adapter(adapter)
            .stations(vec![Station::from("A")])
            .periods(vec![()])
            .settings(AggregationSettings::with_resample_minutes(0))
            .build()
            .aggregate_station_data()
            .await?;
        assert_eq!(report.table.height(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_metadata_phase_reports_exclusions() -> Result<(), Box<dyn std::error::Error>> {
        let adapter = FakeAdapter::new(vec![
            ("A", Canned::Series(Vec::new())),
            ("B", Canned::Recoverable),
        ]);
        let report = aggregator(adapter, &["A", "B"], 2)
            .aggregate_station_metadata()
            .await?;
        assert_eq!(report.included, vec!["A"]);
        assert_eq!(report.excluded, vec!["B"]);
        assert_eq!(report.table.get("A").and_then(|r| r.lat), Some(35.0));
        Ok(())
    }
}
