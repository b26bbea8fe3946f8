//! Provides the `TelemetryClient`, obtained via [`Harvester::telemetry()`].
//! Data is requested one calendar day at a time.

use crate::error::HarvestError;
use crate::harvester::Harvester;
use crate::partition::daily::daily_periods;
use crate::run::HarvestRun;
use crate::sources::error::FetchError;
use crate::sources::telemetry::TelemetryAdapter;
use crate::types::product::TelemetryProduct;
use crate::types::station::Station;
use crate::types::time_range::TimeRange;
use bon::bon;
use chrono::Utc;

pub struct TelemetryClient<'a> {
    harvester: &'a Harvester,
}

#[bon]
impl<'a> TelemetryClient<'a> {
    pub(crate) fn new(harvester: &'a Harvester) -> Self {
        Self { harvester }
    }

    /// Harvests `product` (river water level by default) for `stations`.
    /// The range is truncated to the current time.
    ///
    /// # Arguments
    ///
    /// * `stations` - site ids known to the telemetry system.
    /// * `.range(TimeRange)` - requested window, split into calendar days.
    /// * `.product(TelemetryProduct)` - river or coastal water level.
    ///
    /// # Errors
    ///
    /// [`FetchError::MissingCredentials`] when the config carries no
    /// `telemetry` section, otherwise only run-fatal fetch errors.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use hydro_harvest::{Harvester, HarvestError, TelemetryProduct, TimeRange};
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), HarvestError> {
    /// let harvester = Harvester::from_config_file("harvest.toml").await?;
    /// let range = TimeRange::parse("2021-09-01 00:00:00", "2021-09-03 00:00:00")?;
    /// let run = harvester
    ///     .telemetry()
    ///     .stations(vec!["30".to_string(), "31".to_string()])
    ///     .range(range)
    ///     .product(TelemetryProduct::CoastalWaterLevel)
    ///     .call()
    ///     .await?;
    /// for station in &run.data.excluded {
    ///     println!("no data for {station}");
    /// }
    /// # Ok(())
    /// # }
    /// ```
    #[builder(start_fn = stations)]
    #[doc(hidden)]
    pub async fn build_stations(
        &self,
        #[builder(start_fn)] stations: Vec<String>,
        range: TimeRange,
        product: Option<TelemetryProduct>,
    ) -> Result<HarvestRun, HarvestError> {
        let credentials = self
            .harvester
            .config()
            .telemetry
            .clone()
            .ok_or(FetchError::MissingCredentials("telemetry"))?;
        let product = product.unwrap_or(TelemetryProduct::RiverWaterLevel);
        let adapter = TelemetryAdapter::builder()
            .client(self.harvester.client().clone())
            .domain(credentials.domain)
            .system_key(credentials.system_key)
            .product(product)
            .maybe_owner(credentials.owner)
            .build();
        let periods = daily_periods(range, Utc::now());
        let stations = stations.into_iter().map(Station::from).collect();
        self.harvester
            .run(adapter, stations, periods, product.to_string())
            .await
    }
}
