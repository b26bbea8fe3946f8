//! Provides the `ModelOutputClient`, obtained via [`Harvester::model_output()`].
//!
//! Snapshot locations are either passed explicitly or rendered from a path
//! template over the six-hourly run times covering a range.

use crate::error::HarvestError;
use crate::harvester::Harvester;
use crate::partition::snapshot_times::snapshot_times;
use crate::run::HarvestRun;
use crate::sources::model_output::ModelOutputAdapter;
use crate::sources::snapshot::SnapshotReader;
use crate::sources::snapshot_path::snapshot_locations;
use crate::types::product::{CastType, ModelProduct};
use crate::types::time_range::TimeRange;
use bon::bon;
use chrono::Utc;
use log::info;
use std::sync::Arc;

#[cfg(feature = "netcdf")]
fn default_reader() -> Result<Arc<dyn SnapshotReader>, HarvestError> {
    Ok(Arc::new(crate::sources::netcdf_reader::NetcdfReader))
}

#[cfg(not(feature = "netcdf"))]
fn default_reader() -> Result<Arc<dyn SnapshotReader>, HarvestError> {
    Err(HarvestError::NoSnapshotReader)
}

/// Resolves the snapshot list for a run.
fn resolve_locations(
    locations: Option<Vec<String>>,
    template: Option<&str>,
    range: Option<TimeRange>,
    cast: CastType,
) -> Result<Vec<String>, HarvestError> {
    if let Some(locations) = locations {
        return Ok(locations);
    }
    match (template, range) {
        (Some(template), Some(range)) => {
            let times = snapshot_times(range, cast, Utc::now())?;
            Ok(snapshot_locations(template, &times))
        }
        _ => Err(HarvestError::NoSnapshotLocations),
    }
}

pub struct ModelOutputClient<'a> {
    harvester: &'a Harvester,
}

#[bon]
impl<'a> ModelOutputClient<'a> {
    pub(crate) fn new(harvester: &'a Harvester) -> Self {
        Self { harvester }
    }

    /// Harvests model water level at the grid nodes matching `stations`.
    ///
    /// Give either `.locations(..)` or `.template(..)` with `.range(..)`; the
    /// template marks the run time with `%s` or `{time}`. `.cast(..)` picks
    /// how the range end is rounded onto run times (nowcast by default).
    /// Without `.reader(..)` the NetCDF reader is used, which needs the
    /// `netcdf` feature.
    ///
    /// # Arguments
    ///
    /// * `stations` - ids matched against the grid's station names.
    /// * `.locations(Vec<String>)` - explicit snapshot paths or URLs.
    /// * `.template(String)`, `.range(TimeRange)` - render locations instead.
    /// * `.cast(CastType)` - nowcast or forecast rounding of the range end.
    /// * `.reader(Arc<dyn SnapshotReader>)` - snapshot backend.
    /// * `.grid_name(String)` - overrides the grid name taken from the files.
    /// * `.product(ModelProduct)` - defaults to water level.
    ///
    /// Surveying and reading snapshots is bounded by the configured request
    /// timeout.
    ///
    /// # Errors
    ///
    /// [`HarvestError::NoSnapshotLocations`], [`HarvestError::NoSnapshotReader`],
    /// or the errors of [`ModelOutputAdapter::connect`], including
    /// [`FetchError::SnapshotTimeout`](crate::FetchError::SnapshotTimeout).
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use hydro_harvest::{CastType, Harvester, HarvestError, TimeRange};
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), HarvestError> {
    /// let harvester = Harvester::new()?;
    /// let range = TimeRange::parse("2021-06-12 00:00:00", "2021-06-13 00:00:00")?;
    /// let run = harvester
    ///     .model_output()
    ///     .stations(vec!["8410140".to_string()])
    ///     .template("/data/adcirc/%s/fort.63.nc".to_string())
    ///     .range(range)
    ///     .cast(CastType::Forecast)
    ///     .call()
    ///     .await?;
    /// println!("{} model time steps", run.data.table.height());
    /// # Ok(())
    /// # }
    /// ```
    #[builder(start_fn = stations)]
    #[doc(hidden)]
    pub async fn build_stations(
        &self,
        #[builder(start_fn)] stations: Vec<String>,
        locations: Option<Vec<String>>,
        template: Option<String>,
        range: Option<TimeRange>,
        cast: Option<CastType>,
        reader: Option<Arc<dyn SnapshotReader>>,
        grid_name: Option<String>,
        product: Option<ModelProduct>,
    ) -> Result<HarvestRun, HarvestError> {
        let cast = cast.unwrap_or(CastType::Nowcast);
        let locations = resolve_locations(locations, template.as_deref(), range, cast)?;
        if locations.is_empty() {
            return Err(HarvestError::NoSnapshotLocations);
        }
        info!("Model output: {} snapshot locations", locations.len());

        let reader = match reader {
            Some(reader) => reader,
            None => default_reader()?,
        };
        let product = product.unwrap_or(ModelProduct::WaterLevel);
        let adapter = ModelOutputAdapter::connect()
            .reader(reader)
            .product(product)
            .stations(stations)
            .locations(locations)
            .maybe_grid_name(grid_name)
            .timeout(self.harvester.config().request_timeout())
            .call()
            .await?;
        let resolved = adapter.stations().to_vec();
        let periods = adapter.locations().to_vec();
        self.harvester
            .run(adapter, resolved, periods, product.to_string())
            .await
    }
}
