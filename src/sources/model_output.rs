//! Adapter for hydrodynamic model output published as station time-series
//! snapshots (one file per six-hourly run).
//!
//! Connecting surveys the snapshot list once: unreadable locations are dropped,
//! station codes are resolved to grid nodes from the first readable file, and
//! every file is classified as nowcast or forecast. Extraction then reads one
//! node's series from each remaining file.

use crate::sources::error::FetchError;
use crate::sources::snapshot::{station_code, SnapshotReader};
use crate::sources::snapshot_path::{self, classify};
use crate::sources::source::SourceAdapter;
use crate::types::metadata::StationMetadata;
use crate::types::product::{CastType, ModelProduct};
use crate::types::series_frame::SeriesFrame;
use crate::types::station::Station;
use bon::bon;
use chrono::NaiveDateTime;
use log::{debug, error, info, warn};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::{task, time};

/// Values below this are the model's dry-node marker.
const DRY_THRESHOLD: f64 = -1000.0;

/// How long one blocking snapshot job may run when no timeout is given.
pub const DEFAULT_SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(60);

struct Survey {
    readable: Vec<String>,
    stations: Option<Vec<Station>>,
    casts: BTreeSet<CastType>,
    owner: Option<String>,
}

/// Runs a blocking snapshot job on the blocking pool, giving up after `after`.
///
/// The job itself cannot be cancelled; on timeout it is left to finish in the
/// background and its result is dropped.
async fn run_blocking<T, F>(what: String, after: Duration, job: F) -> Result<T, FetchError>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    match time::timeout(after, task::spawn_blocking(job)).await {
        Ok(joined) => Ok(joined?),
        Err(_) => {
            error!("{} did not finish within {:?}", what, after);
            Err(FetchError::SnapshotTimeout { what, after })
        }
    }
}

/// Matches requested codes against the station-name entries of a snapshot,
/// keeping the caller's order. Codes the file does not carry are dropped.
pub fn resolve_stations(requested: &[String], names: &[String]) -> Vec<Station> {
    let codes: Vec<&str> = names.iter().map(|n| station_code(n)).collect();
    requested
        .iter()
        .filter_map(|id| match codes.iter().position(|code| code == id) {
            Some(node) => {
                debug!("{} is station node {}", id, node);
                Some(Station::GridBound {
                    id: id.clone(),
                    node,
                })
            }
            None => {
                info!("{} not in snapshot station_name list", id);
                None
            }
        })
        .collect()
}

/// A location counts as readable once it opens, carries `variable` and has a
/// decodable, non-empty time axis.
fn survey(
    reader: &dyn SnapshotReader,
    variable: &str,
    requested: &[String],
    locations: &[String],
) -> Result<Survey, FetchError> {
    let mut result = Survey {
        readable: Vec::new(),
        stations: None,
        casts: BTreeSet::new(),
        owner: None,
    };
    for location in locations {
        let snapshot = match reader.open(location) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                info!("Snapshot not found, removing {}: {}", location, e);
                continue;
            }
        };

        if result.stations.is_none() {
            match snapshot.station_names() {
                Ok(names) => {
                    result.stations = Some(resolve_stations(requested, &names));
                    result.owner = snapshot.source();
                }
                Err(e) => warn!("Could not read station names from {}, trying next: {}", location, e),
            }
        }

        if !snapshot.has_variable(variable) {
            warn!("{} not found in {}, removing it", variable, location);
            continue;
        }
        let last = match snapshot.times() {
            Ok(times) => times.last().copied(),
            Err(e) => {
                warn!("Could not read the time axis of {}, removing it: {}", location, e);
                continue;
            }
        };
        let Some(last) = last else {
            warn!("Snapshot {} has an empty time axis, removing it", location);
            continue;
        };
        let cast = classify(location, last)
            .ok_or_else(|| FetchError::MalformedLocation(location.clone()))?;
        result.casts.insert(cast);
        result.readable.push(location.clone());
    }
    Ok(result)
}

/// Reads one node's samples from every location, skipping files that cannot
/// be used. Dry values come back as `None`.
fn extract_node(
    reader: &dyn SnapshotReader,
    variable: &str,
    id: &str,
    node: usize,
    locations: &[String],
) -> Vec<(NaiveDateTime, Option<f64>)> {
    let mut samples = Vec::new();
    for location in locations {
        let snapshot = match reader.open(location) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Skipping unreadable snapshot {}: {}", location, e);
                continue;
            }
        };
        if !snapshot.has_variable(variable) {
            warn!("{} not found in {}", variable, location);
            continue;
        }
        let values = match snapshot.node_values(variable, node) {
            Ok(values) => values,
            Err(e) => {
                error!("Reading node {} for station {} failed: {}", node, id, e);
                continue;
            }
        };
        let times = match snapshot.times() {
            Ok(times) => times,
            Err(e) => {
                warn!("Skipping {} for station {}, bad time axis: {}", location, id, e);
                continue;
            }
        };
        if times.len() != values.len() {
            warn!(
                "Skipping {} for station {}: {} times but {} values",
                location,
                id,
                times.len(),
                values.len()
            );
            continue;
        }
        samples.extend(
            times
                .into_iter()
                .zip(values)
                .map(|(time, value)| (time, Some(value).filter(|v| *v >= DRY_THRESHOLD))),
        );
    }
    samples
}

/// Fetches water level at model grid nodes matched to station codes.
///
/// Snapshot access is blocking, so every survey, extraction and metadata
/// lookup runs on the blocking pool under the adapter's timeout.
pub struct ModelOutputAdapter {
    reader: Arc<dyn SnapshotReader>,
    product: ModelProduct,
    stations: Vec<Station>,
    locations: Vec<String>,
    cast_type: CastType,
    grid_name: String,
    owner: Option<String>,
    timeout: Duration,
}

#[bon]
impl ModelOutputAdapter {
    /// Surveys `locations` and resolves `stations` against them.
    ///
    /// # Arguments
    ///
    /// * `reader` - Opens snapshots by location.
    /// * `product` - The model variable to extract.
    /// * `stations` - Station codes, matched against the first readable file.
    /// * `locations` - Snapshot locations in run order.
    /// * `grid_name` - Overrides the grid name taken from the first location.
    /// * `timeout` - Limit for each blocking snapshot job, [`DEFAULT_SNAPSHOT_TIMEOUT`]
    ///   when absent.
    ///
    /// # Errors
    ///
    /// Fails with a fatal [`FetchError`] when no location can be read, when
    /// the readable snapshots mix nowcast and forecast runs, or when a
    /// location does not follow the positional path layout. A survey that
    /// outlives `timeout` fails with [`FetchError::SnapshotTimeout`].
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use std::sync::Arc;
    /// # use std::time::Duration;
    /// # use hydro_harvest::{FetchError, ModelOutputAdapter, ModelProduct, SnapshotReader};
    /// # async fn example(reader: Arc<dyn SnapshotReader>) -> Result<(), FetchError> {
    /// let adapter = ModelOutputAdapter::connect()
    ///     .reader(reader)
    ///     .product(ModelProduct::WaterLevel)
    ///     .stations(vec!["8651370".to_string()])
    ///     .locations(vec!["/data/2021061306/fort.61.nc".to_string()])
    ///     .timeout(Duration::from_secs(30))
    ///     .call()
    ///     .await?;
    /// println!("{} run, {} stations", adapter.cast_type(), adapter.stations().len());
    /// # Ok(())
    /// # }
    /// ```
    #[builder]
    pub async fn connect(
        reader: Arc<dyn SnapshotReader>,
        product: ModelProduct,
        stations: Vec<String>,
        locations: Vec<String>,
        grid_name: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, FetchError> {
        info!("Model output: surveying {} snapshot locations", locations.len());
        let total = locations.len();
        let timeout = timeout.unwrap_or(DEFAULT_SNAPSHOT_TIMEOUT);
        let variable = product.variable();
        let survey_reader = Arc::clone(&reader);
        let survey_locations = locations.clone();
        let survey = run_blocking(
            format!("Survey of {} snapshot locations", total),
            timeout,
            move || survey(survey_reader.as_ref(), variable, &stations, &survey_locations),
        )
        .await??;

        let Some(resolved) = survey.stations else {
            error!("No readable snapshot among {} locations", total);
            return Err(FetchError::NoReadableSnapshot(total));
        };
        info!("Resolved model stations {:?}", resolved);

        let cast_type = match survey.casts.len() {
            0 => CastType::from_ensemble(
                locations
                    .first()
                    .and_then(|l| snapshot_path::ensemble(l))
                    .unwrap_or_default(),
            ),
            1 => survey.casts.iter().next().copied().unwrap_or(CastType::Nowcast),
            _ => {
                error!("Snapshots mix cast types: {:?}", survey.casts);
                return Err(FetchError::MixedCastTypes(survey.casts.into_iter().collect()));
            }
        };
        info!("Model output type determined to be {}", cast_type);

        let grid_name = grid_name
            .or_else(|| {
                survey
                    .readable
                    .first()
                    .or(locations.first())
                    .and_then(|l| snapshot_path::grid_name(l))
                    .map(str::to_string)
            })
            .unwrap_or_else(|| "unknown".to_string());

        Ok(Self {
            reader,
            product,
            stations: resolved,
            locations: survey.readable,
            cast_type,
            grid_name,
            owner: survey.owner,
            timeout,
        })
    }

    /// Stations resolved to grid nodes, in the caller's order.
    pub fn stations(&self) -> &[Station] {
        &self.stations
    }

    /// Readable snapshot locations, in the order given.
    pub fn locations(&self) -> &[String] {
        &self.locations
    }

    pub fn cast_type(&self) -> CastType {
        self.cast_type
    }

    pub fn product(&self) -> ModelProduct {
        self.product
    }

    /// Limit applied to each blocking snapshot job.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl SourceAdapter for ModelOutputAdapter {
    type Period = String;

    fn name(&self) -> &'static str {
        "model-output"
    }

    /// Concatenates the node's series across `periods` (snapshot locations).
    ///
    /// Files that cannot be opened, lack the variable, have an unreadable
    /// time axis or a time axis whose length differs from the node series
    /// are logged and skipped.
    ///
    /// # Errors
    ///
    /// [`FetchError::UnresolvedStation`] (fatal) for a station without a grid
    /// node, and [`FetchError::SnapshotTimeout`] when the reads outlive the
    /// adapter's timeout.
    async fn fetch_series(
        &self,
        station: &Station,
        periods: &[String],
    ) -> Result<SeriesFrame, FetchError> {
        let node = station
            .node()
            .ok_or_else(|| FetchError::UnresolvedStation(station.id().to_string()))?;
        let id = station.id().to_string();
        let reader = Arc::clone(&self.reader);
        let periods = periods.to_vec();
        let variable = self.product.variable();

        let job_id = id.clone();
        let samples = run_blocking(
            format!("Reading station {} from {} snapshots", id, periods.len()),
            self.timeout,
            move || extract_node(reader.as_ref(), variable, &job_id, node, &periods),
        )
        .await?;
        let (frame, _) =
            SeriesFrame::from_samples(id.as_str(), samples).map_err(|e| FetchError::from_frame(&id, e))?;
        Ok(frame)
    }

    async fn fetch_metadata(&self, station: &Station) -> Result<StationMetadata, FetchError> {
        let node = station
            .node()
            .ok_or_else(|| FetchError::UnresolvedStation(station.id().to_string()))?;
        let reader = Arc::clone(&self.reader);
        let locations = self.locations.clone();

        let coords = run_blocking(
            format!("Metadata lookup for station {}", station.id()),
            self.timeout,
            move || {
                for location in &locations {
                    match reader.open(location).and_then(|s| s.node_location(node)) {
                        Ok(coords) => return Some(coords),
                        Err(e) => error!("Metadata lookup in {} failed: {}", location, e),
                    }
                }
                None
            },
        )
        .await?;
        let (lon, lat) = coords.ok_or_else(|| FetchError::NoData {
            station: station.id().to_string(),
        })?;

        Ok(StationMetadata {
            station: station.id().to_string(),
            lat: Some(lat),
            lon: Some(lon),
            name: Some(format!("{}_{}", self.grid_name.to_uppercase(), self.cast_type)),
            units: Some("meters".to_string()),
            tz: Some("gmt".to_string()),
            owner: self.owner.clone(),
            state: None,
            county: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::snapshot::memory::{MemoryReader, MemorySnapshot};
    use chrono::{Duration, NaiveDate, NaiveDateTime};

    const TEMPLATE: &str = "http://tds.renci.org/thredds/dodsC/2021/nam/%s/hsofs/hatteras.renci.org/hsofs-nam-bob-2021/{ens}/fort.61.nc";

    fn location(run: &str, ensemble: &str) -> String {
        TEMPLATE.replace("%s", run).replace("{ens}", ensemble)
    }

    fn run_start(run: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(&format!("{}00", run), "%Y%m%d%H%M").unwrap()
    }

    /// A nowcast covers the six hours up to its run time.
    fn nowcast(run: &str) -> MemorySnapshot {
        let end = run_start(run);
        let times: Vec<NaiveDateTime> = (0..=6).map(|h| end - Duration::hours(6 - h)).collect();
        MemorySnapshot {
            location: location(run, "nowcast"),
            names: vec![
                "8410140   Eastport, ME".to_string(),
                "8443970   Boston, MA".to_string(),
                "8651370   Duck, NC".to_string(),
            ],
            zeta: Some(vec![
                times.iter().map(|_| 0.1).collect(),
                times.iter().map(|_| -99999.0).collect(),
                times.iter().enumerate().map(|(i, _)| i as f64).collect(),
            ]),
            times,
            coords: vec![(-66.98, 44.90), (-71.05, 42.35), (-75.74, 36.18)],
            source: Some("ADCIRC".to_string()),
            broken_time_units: None,
        }
    }

    fn forecast(run: &str) -> MemorySnapshot {
        let start = run_start(run);
        let mut snapshot = nowcast(run);
        snapshot.location = location(run, "namforecast");
        snapshot.times = (0..=6).map(|h| start + Duration::hours(h)).collect();
        snapshot
    }

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_resolution_keeps_caller_order_and_drops_unknown() {
        let reader = MemoryReader::default().with(nowcast("2021061306"));
        let adapter = ModelOutputAdapter::connect()
            .reader(Arc::new(reader))
            .product(ModelProduct::WaterLevel)
            .stations(ids(&["8651370", "9999999", "8410140"]))
            .locations(vec![location("2021061306", "nowcast")])
            .call()
            .await
            .unwrap();
        assert_eq!(
            adapter.stations(),
            &[
                Station::GridBound { id: "8651370".to_string(), node: 2 },
                Station::GridBound { id: "8410140".to_string(), node: 0 },
            ]
        );
        assert_eq!(adapter.cast_type(), CastType::Nowcast);
    }

    #[tokio::test]
    async fn test_unreadable_locations_are_filtered() {
        let reader = MemoryReader::default()
            .with(nowcast("2021061306"))
            .with(nowcast("2021061318"));
        let locations = vec![
            location("2021061300", "nowcast"),
            location("2021061306", "nowcast"),
            location("2021061312", "nowcast"),
            location("2021061318", "nowcast"),
        ];
        let adapter = ModelOutputAdapter::connect()
            .reader(Arc::new(reader))
            .product(ModelProduct::WaterLevel)
            .stations(ids(&["8651370"]))
            .locations(locations)
            .call()
            .await
            .unwrap();
        assert_eq!(adapter.locations().len(), 2);

        let station = adapter.stations()[0].clone();
        let frame = adapter
            .fetch_series(&station, adapter.locations())
            .await
            .unwrap();
        // seven hourly samples from each readable file
        assert_eq!(frame.len(), 14);
        assert_eq!(frame.values().unwrap()[0], Some(0.0));
    }

    #[tokio::test]
    async fn test_mixed_cast_types_are_fatal() {
        let reader = MemoryReader::default()
            .with(nowcast("2021061306"))
            .with(forecast("2021061312"));
        let result = ModelOutputAdapter::connect()
            .reader(Arc::new(reader))
            .product(ModelProduct::WaterLevel)
            .stations(ids(&["8410140"]))
            .locations(vec![
                location("2021061306", "nowcast"),
                location("2021061312", "namforecast"),
            ])
            .call()
            .await;
        let err = result.err().unwrap();
        assert!(matches!(err, FetchError::MixedCastTypes(_)));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_no_readable_snapshot_is_fatal() {
        let result = ModelOutputAdapter::connect()
            .reader(Arc::new(MemoryReader::default()))
            .product(ModelProduct::WaterLevel)
            .stations(ids(&["8410140"]))
            .locations(vec![location("2021061306", "nowcast")])
            .call()
            .await;
        assert!(matches!(result.err(), Some(FetchError::NoReadableSnapshot(1))));
    }

    #[tokio::test]
    async fn test_dry_values_are_missing_and_metadata_names_run() {
        let reader = MemoryReader::default().with(forecast("2021061306"));
        let adapter = ModelOutputAdapter::connect()
            .reader(Arc::new(reader))
            .product(ModelProduct::WaterLevel)
            .stations(ids(&["8443970"]))
            .locations(vec![location("2021061306", "namforecast")])
            .call()
            .await
            .unwrap();
        assert_eq!(adapter.cast_type(), CastType::Forecast);

        let station = adapter.stations()[0].clone();
        let frame = adapter.fetch_series(&station, adapter.locations()).await.unwrap();
        assert!(!frame.has_data());

        let meta = adapter.fetch_metadata(&station).await.unwrap();
        assert_eq!(meta.name.as_deref(), Some("HSOFS_FORECAST"));
        assert_eq!(meta.lat, Some(42.35));
        assert_eq!(meta.lon, Some(-71.05));
        assert_eq!(meta.owner.as_deref(), Some("ADCIRC"));
    }

    #[tokio::test]
    async fn test_snapshot_without_variable_is_skipped() {
        let mut dry = nowcast("2021061306");
        dry.zeta = None;
        let reader = MemoryReader::default().with(dry).with(nowcast("2021061312"));
        let adapter = ModelOutputAdapter::connect()
            .reader(Arc::new(reader))
            .product(ModelProduct::WaterLevel)
            .stations(ids(&["8410140"]))
            .locations(vec![
                location("2021061306", "nowcast"),
                location("2021061312", "nowcast"),
            ])
            .call()
            .await
            .unwrap();
        let station = adapter.stations()[0].clone();
        let frame = adapter.fetch_series(&station, adapter.locations()).await.unwrap();
        assert_eq!(frame.len(), 7);
        let first = NaiveDate::from_ymd_opt(2021, 6, 13).unwrap().and_hms_opt(6, 0, 0).unwrap();
        assert_eq!(frame.index().unwrap()[0], first);
    }

    #[tokio::test]
    async fn test_unresolved_station_is_fatal() {
        let reader = MemoryReader::default().with(nowcast("2021061306"));
        let adapter = ModelOutputAdapter::connect()
            .reader(Arc::new(reader))
            .product(ModelProduct::WaterLevel)
            .stations(ids(&["8410140"]))
            .locations(vec![location("2021061306", "nowcast")])
            .call()
            .await
            .unwrap();
        let err = adapter
            .fetch_series(&Station::from("8410140"), adapter.locations())
            .await
            .unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_bad_time_axis_skips_only_that_snapshot() {
        let mut broken = nowcast("2021061312");
        broken.broken_time_units = Some("fortnights since 2021-06-13".to_string());
        let good = location("2021061306", "nowcast");
        let bad = broken.location.clone();
        let reader = MemoryReader::default().with(nowcast("2021061306")).with(broken);
        let adapter = ModelOutputAdapter::connect()
            .reader(Arc::new(reader))
            .product(ModelProduct::WaterLevel)
            .stations(ids(&["8651370"]))
            .locations(vec![good.clone(), bad.clone()])
            .call()
            .await
            .unwrap();
        // the survey drops the file whose time axis cannot be decoded
        assert_eq!(adapter.locations(), &[good.clone()]);

        // extraction over both files still keeps the good file's samples
        let station = adapter.stations()[0].clone();
        let frame = adapter.fetch_series(&station, &[good, bad]).await.unwrap();
        assert_eq!(frame.len(), 7);
        assert_eq!(frame.values().unwrap()[6], Some(6.0));
    }

    #[tokio::test]
    async fn test_time_axis_length_mismatch_skips_snapshot() {
        let mut short = nowcast("2021061312");
        if let Some(zeta) = short.zeta.as_mut() {
            for series in zeta.iter_mut() {
                series.truncate(5);
            }
        }
        let reader = MemoryReader::default().with(nowcast("2021061306")).with(short);
        let adapter = ModelOutputAdapter::connect()
            .reader(Arc::new(reader))
            .product(ModelProduct::WaterLevel)
            .stations(ids(&["8410140"]))
            .locations(vec![
                location("2021061306", "nowcast"),
                location("2021061312", "nowcast"),
            ])
            .call()
            .await
            .unwrap();
        let station = adapter.stations()[0].clone();
        let frame = adapter.fetch_series(&station, adapter.locations()).await.unwrap();
        assert_eq!(frame.len(), 7);
        let last = NaiveDate::from_ymd_opt(2021, 6, 13).unwrap().and_hms_opt(6, 0, 0).unwrap();
        assert_eq!(frame.index().unwrap()[6], last);
    }

    #[tokio::test]
    async fn test_stalled_survey_times_out() {
        let reader = MemoryReader::default().with(nowcast("2021061306"));
        reader.stall(std::time::Duration::from_millis(400));
        let result = ModelOutputAdapter::connect()
            .reader(Arc::new(reader))
            .product(ModelProduct::WaterLevel)
            .stations(ids(&["8410140"]))
            .locations(vec![location("2021061306", "nowcast")])
            .timeout(std::time::Duration::from_millis(50))
            .call()
            .await;
        let err = result.err().unwrap();
        assert!(matches!(err, FetchError::SnapshotTimeout { .. }));
        assert!(!err.is_fatal());
    }

    #[tokio::test]
    async fn test_stalled_reads_exclude_the_station() {
        let reader = Arc::new(MemoryReader::default().with(nowcast("2021061306")));
        let adapter = ModelOutputAdapter::connect()
            .reader(reader.clone())
            .product(ModelProduct::WaterLevel)
            .stations(ids(&["8410140"]))
            .locations(vec![location("2021061306", "nowcast")])
            .timeout(std::time::Duration::from_millis(50))
            .call()
            .await
            .unwrap();
        assert_eq!(adapter.timeout(), std::time::Duration::from_millis(50));

        reader.stall(std::time::Duration::from_millis(400));
        let station = adapter.stations()[0].clone();
        let err = adapter
            .fetch_series(&station, adapter.locations())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::SnapshotTimeout { .. }));
        assert!(!err.is_fatal());

        let err = adapter.fetch_metadata(&station).await.unwrap_err();
        assert!(matches!(err, FetchError::SnapshotTimeout { .. }));
    }
}
