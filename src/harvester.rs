//! Main entry point: one configured HTTP client shared by per-source request
//! builders.

use crate::aggregate::aggregator::StationAggregator;
use crate::clients::model_output_client::ModelOutputClient;
use crate::clients::telemetry_client::TelemetryClient;
use crate::clients::tide_gauge_client::TideGaugeClient;
use crate::config::HarvestConfig;
use crate::error::HarvestError;
use crate::output::writer::OutputWriter;
use crate::run::HarvestRun;
use crate::sources::source::SourceAdapter;
use crate::types::station::Station;
use log::info;
use reqwest::Client;
use std::path::Path;

/// Harvests station water levels from the supported sources.
///
/// # Examples
///
/// ```no_run
/// # use hydro_harvest::{Harvester, HarvestError, TimeRange};
/// # #[tokio::main]
/// # async fn main() -> Result<(), HarvestError> {
/// let harvester = Harvester::new()?;
/// let range = TimeRange::parse("2021-09-01 00:00:00", "2021-09-02 00:00:00")?;
/// let run = harvester
///     .tide_gauge()
///     .stations(vec!["8410140".to_string(), "8443970".to_string()])
///     .range(range)
///     .call()
///     .await?;
/// println!("excluded: {:?}", run.data.excluded);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Harvester {
    config: HarvestConfig,
    client: Client,
}

impl Harvester {
    /// A harvester with the default [`HarvestConfig`].
    pub fn new() -> Result<Self, HarvestError> {
        Self::with_config(HarvestConfig::default())
    }

    pub fn with_config(config: HarvestConfig) -> Result<Self, HarvestError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(HarvestError::HttpClient)?;
        Ok(Self { config, client })
    }

    pub async fn from_config_file(path: impl AsRef<Path>) -> Result<Self, HarvestError> {
        let config = HarvestConfig::from_toml_file(path).await?;
        Self::with_config(config)
    }

    pub fn config(&self) -> &HarvestConfig {
        &self.config
    }

    pub(crate) fn client(&self) -> &Client {
        &self.client
    }

    /// Tide-gauge water levels and related products.
    pub fn tide_gauge(&self) -> TideGaugeClient<'_> {
        TideGaugeClient::new(self)
    }

    /// River and coastal telemetry. Needs `telemetry` credentials in the config.
    pub fn telemetry(&self) -> TelemetryClient<'_> {
        TelemetryClient::new(self)
    }

    /// Model-output station snapshots.
    pub fn model_output(&self) -> ModelOutputClient<'_> {
        ModelOutputClient::new(self)
    }

    /// A CSV writer rooted at the configured output directory.
    pub fn writer(&self) -> OutputWriter {
        OutputWriter::builder()
            .output_dir(self.config.output_dir.clone())
            .build()
    }

    /// Runs the data phase then the metadata phase over one adapter.
    pub(crate) async fn run<A: SourceAdapter>(
        &self,
        adapter: A,
        stations: Vec<Station>,
        periods: Vec<A::Period>,
        product: String,
    ) -> Result<HarvestRun, HarvestError> {
        info!(
            "{}: harvesting {} for {} stations",
            adapter.name(),
            product,
            stations.len()
        );
        let aggregator = StationAggregator::builder()
            .adapter(adapter)
            .stations(stations)
            .periods(periods)
            .settings(self.config.aggregation_settings())
            .build();
        let data = aggregator.aggregate_station_data().await?;
        let metadata = aggregator.aggregate_station_metadata().await?;
        Ok(HarvestRun {
            product,
            data,
            metadata,
        })
    }
}
