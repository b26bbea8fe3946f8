//! Run configuration, passed explicitly to the [`Harvester`](crate::Harvester)
//! and from there to every adapter and the aggregator.

use crate::aggregate::aggregator::{AggregationSettings, DEFAULT_FILL_VALUE, DEFAULT_RESAMPLE_MINUTES};
use crate::sources::tide_gauge::{DEFAULT_DATA_URL, DEFAULT_METADATA_URL};
use chrono::Duration;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{0}'")]
    Read(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse config file '{0}'")]
    Parse(PathBuf, #[source] toml::de::Error),
}

/// Access to the telemetry service. Both the domain (the service endpoint)
/// and the system key are issued per account.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TelemetryCredentials {
    pub domain: String,
    pub system_key: String,
    #[serde(default)]
    pub owner: Option<String>,
}

/// Every field has a default, so an empty file is a valid configuration.
///
/// ```
/// use hydro_harvest::HarvestConfig;
///
/// let config: HarvestConfig = toml::from_str("resample_minutes = 60").unwrap();
/// assert_eq!(config.resample_minutes, 60);
/// assert_eq!(config.fill_value, -99999.0);
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    /// Resampling cadence; `0` disables resampling.
    pub resample_minutes: u32,
    pub fill_value: f64,
    pub request_timeout_secs: u64,
    /// Stations fetched at once; `1` is sequential.
    pub max_concurrent_stations: usize,
    pub output_dir: PathBuf,
    pub tide_gauge_url: String,
    pub tide_gauge_metadata_url: String,
    pub telemetry: Option<TelemetryCredentials>,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            resample_minutes: DEFAULT_RESAMPLE_MINUTES,
            fill_value: DEFAULT_FILL_VALUE,
            request_timeout_secs: 60,
            max_concurrent_stations: 1,
            output_dir: PathBuf::from("."),
            tide_gauge_url: DEFAULT_DATA_URL.to_string(),
            tide_gauge_metadata_url: DEFAULT_METADATA_URL.to_string(),
            telemetry: None,
        }
    }
}

impl HarvestConfig {
    pub async fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
        toml::from_str(&text).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))
    }

    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.request_timeout_secs)
    }

    pub fn aggregation_settings(&self) -> AggregationSettings {
        AggregationSettings {
            resample: (self.resample_minutes > 0)
                .then(|| Duration::minutes(i64::from(self.resample_minutes))),
            fill_value: self.fill_value,
            max_concurrent: self.max_concurrent_stations.max(1),
        }
    }
}
