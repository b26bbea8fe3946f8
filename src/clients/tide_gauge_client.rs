//! Provides the `TideGaugeClient`, obtained via [`Harvester::tide_gauge()`],
//! for harvesting tide-gauge products over a station list.

use crate::error::HarvestError;
use crate::harvester::Harvester;
use crate::partition::whole_range;
use crate::run::HarvestRun;
use crate::sources::tide_gauge::TideGaugeAdapter;
use crate::types::product::TideGaugeProduct;
use crate::types::station::Station;
use crate::types::time_range::TimeRange;
use bon::bon;

pub struct TideGaugeClient<'a> {
    harvester: &'a Harvester,
}

#[bon]
impl<'a> TideGaugeClient<'a> {
    pub(crate) fn new(harvester: &'a Harvester) -> Self {
        Self { harvester }
    }

    /// Harvests one product for `stations` over `range`.
    ///
    /// # Arguments
    ///
    /// * `stations` - gauge ids, e.g. `8410140`.
    /// * `.range(TimeRange)` - requested window, fetched as a single period.
    /// * `.product(TideGaugeProduct)` - defaults to water level.
    /// * `.interval(String)` - `h` requests hourly values.
    /// * `.datum(String)` - vertical datum, `MSL` by default.
    ///
    /// # Errors
    ///
    /// Only run-fatal [`FetchError`](crate::FetchError)s surface here; stations
    /// that fail are listed in the run's `excluded` lists instead.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use hydro_harvest::{Harvester, HarvestError, TideGaugeProduct, TimeRange};
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), HarvestError> {
    /// let harvester = Harvester::new()?;
    /// let range = TimeRange::parse("2021-09-01 00:00:00", "2021-09-02 00:00:00")?;
    /// let run = harvester
    ///     .tide_gauge()
    ///     .stations(vec!["8410140".to_string()])
    ///     .range(range)
    ///     .product(TideGaugeProduct::Predictions)
    ///     .interval("h".to_string())
    ///     .call()
    ///     .await?;
    /// println!("{} stations harvested", run.data.included.len());
    /// # Ok(())
    /// # }
    /// ```
    #[builder(start_fn = stations)]
    #[doc(hidden)]
    pub async fn build_stations(
        &self,
        #[builder(start_fn)] stations: Vec<String>,
        range: TimeRange,
        product: Option<TideGaugeProduct>,
        interval: Option<String>,
        datum: Option<String>,
    ) -> Result<HarvestRun, HarvestError> {
        let product = product.unwrap_or(TideGaugeProduct::WaterLevel);
        let config = self.harvester.config();
        let adapter = TideGaugeAdapter::builder()
            .client(self.harvester.client().clone())
            .product(product)
            .data_url(config.tide_gauge_url.clone())
            .metadata_url(config.tide_gauge_metadata_url.clone())
            .maybe_interval(interval)
            .maybe_datum(datum)
            .build();
        let stations = stations.into_iter().map(Station::from).collect();
        self.harvester
            .run(adapter, stations, whole_range(range), product.to_string())
            .await
    }
}
