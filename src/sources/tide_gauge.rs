//! Adapter for the NOAA CO-OPS tide-gauge web service.

use crate::sources::error::FetchError;
use crate::sources::http::get_text;
use crate::sources::source::SourceAdapter;
use crate::types::metadata::{known, StationMetadata};
use crate::types::product::{TideGaugeProduct, ValueField};
use crate::types::series_frame::SeriesFrame;
use crate::types::station::Station;
use crate::types::time_range::{parse_timestamp, TimeRange};
use bon::bon;
use log::{error, info, warn};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

pub const DEFAULT_DATA_URL: &str = "https://api.tidesandcurrents.noaa.gov/api/prod/datagetter";
pub const DEFAULT_METADATA_URL: &str =
    "https://api.tidesandcurrents.noaa.gov/mdapi/prod/webapi/stations";

const REQUEST_TIME_FORMAT: &str = "%Y%m%d %H:%M";
const RESPONSE_TIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M", "%Y-%m-%d %H:%M:%S"];
const OWNER: &str = "NOAA/NOS";

#[derive(Debug, Deserialize)]
struct DataResponse {
    #[serde(default)]
    data: Option<Vec<Observation>>,
    #[serde(default)]
    predictions: Option<Vec<Observation>>,
    #[serde(default)]
    error: Option<ServiceMessage>,
}

#[derive(Debug, Deserialize)]
struct Observation {
    t: String,
    #[serde(default)]
    v: Option<String>,
    #[serde(default)]
    s: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ServiceMessage {
    message: String,
}

#[derive(Debug, Deserialize)]
struct MetadataResponse {
    #[serde(default)]
    stations: Vec<StationRecord>,
    #[serde(default)]
    error: Option<ServiceMessage>,
}

#[derive(Debug, Deserialize)]
struct StationRecord {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    lat: Option<Value>,
    #[serde(default)]
    lng: Option<Value>,
}

/// Coordinates come back as numbers from some endpoints and strings from others.
fn coordinate(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn parse_value(raw: Option<&str>) -> Option<f64> {
    raw.map(str::trim)
        .filter(|v| !v.is_empty())
        .and_then(|v| v.parse().ok())
}

/// Decodes one data response into a frame. Returns the frame and whether
/// duplicate timestamps were dropped.
fn parse_series(
    station: &str,
    product: TideGaugeProduct,
    url: &str,
    body: &str,
) -> Result<(SeriesFrame, bool), FetchError> {
    let response: DataResponse =
        serde_json::from_str(body).map_err(|e| FetchError::JsonParse {
            url: url.to_string(),
            source: e,
        })?;
    if let Some(err) = response.error {
        return Err(FetchError::ServiceError {
            station: station.to_string(),
            message: err.message,
        });
    }

    let observations = match product {
        TideGaugeProduct::Predictions => response.predictions,
        _ => response.data,
    }
    .ok_or_else(|| FetchError::NoData {
        station: station.to_string(),
    })?;

    let mut samples = Vec::with_capacity(observations.len());
    for obs in &observations {
        let Some(time) = parse_timestamp(&obs.t, RESPONSE_TIME_FORMATS) else {
            return Err(FetchError::UnexpectedData {
                station: station.to_string(),
                message: format!("unparseable timestamp '{}'", obs.t),
            });
        };
        let raw = match product.value_field() {
            ValueField::Value => obs.v.as_deref(),
            ValueField::Speed => obs.s.as_deref(),
        };
        samples.push((time, parse_value(raw)));
    }
    SeriesFrame::from_samples(station, samples).map_err(|e| FetchError::from_frame(station, e))
}

fn parse_metadata(station: &str, url: &str, body: &str) -> Result<StationMetadata, FetchError> {
    let response: MetadataResponse =
        serde_json::from_str(body).map_err(|e| FetchError::JsonParse {
            url: url.to_string(),
            source: e,
        })?;
    if let Some(err) = response.error {
        return Err(FetchError::ServiceError {
            station: station.to_string(),
            message: err.message,
        });
    }
    let record = response
        .stations
        .into_iter()
        .next()
        .ok_or_else(|| FetchError::NoData {
            station: station.to_string(),
        })?;

    Ok(StationMetadata {
        station: station.to_string(),
        lat: coordinate(record.lat.as_ref()),
        lon: coordinate(record.lng.as_ref()),
        name: known(record.name),
        units: Some("meters".to_string()),
        tz: Some("gmt".to_string()),
        owner: Some(OWNER.to_string()),
        state: known(record.state),
        county: None,
    })
}

/// Fetches one product from the tide-gauge service. The service accepts a full
/// time range per request, so periods are normally a single range.
pub struct TideGaugeAdapter {
    client: Client,
    product: TideGaugeProduct,
    data_url: String,
    metadata_url: String,
    interval: Option<String>,
    datum: String,
}

#[bon]
impl TideGaugeAdapter {
    /// `interval` is passed through to the service (`h` for hourly values);
    /// when unset the service's native cadence is returned.
    ///
    /// # Arguments
    ///
    /// * `client` - shared HTTP client.
    /// * `product` - the product requested for every station.
    /// * `data_url`, `metadata_url` - service endpoints, NOAA's by default.
    /// * `datum` - vertical datum, `MSL` by default.
    ///
    /// # Examples
    ///
    /// ```
    /// use hydro_harvest::{TideGaugeAdapter, TideGaugeProduct};
    ///
    /// let adapter = TideGaugeAdapter::builder()
    ///     .client(reqwest::Client::new())
    ///     .product(TideGaugeProduct::HourlyHeight)
    ///     .interval("h".to_string())
    ///     .build();
    /// assert_eq!(adapter.product(), TideGaugeProduct::HourlyHeight);
    /// ```
    #[builder]
    pub fn new(
        client: Client,
        product: TideGaugeProduct,
        data_url: Option<String>,
        metadata_url: Option<String>,
        interval: Option<String>,
        datum: Option<String>,
    ) -> Self {
        info!("Tide-gauge fetching product {}", product);
        Self {
            client,
            product,
            data_url: data_url.unwrap_or_else(|| DEFAULT_DATA_URL.to_string()),
            metadata_url: metadata_url.unwrap_or_else(|| DEFAULT_METADATA_URL.to_string()),
            interval,
            datum: datum.unwrap_or_else(|| "MSL".to_string()),
        }
    }

    pub fn product(&self) -> TideGaugeProduct {
        self.product
    }

    async fn fetch_range(
        &self,
        station: &str,
        range: &TimeRange,
    ) -> Result<(SeriesFrame, bool), FetchError> {
        let begin = range.start().format(REQUEST_TIME_FORMAT).to_string();
        let end = range.end().format(REQUEST_TIME_FORMAT).to_string();
        let mut params = vec![
            ("begin_date", begin.as_str()),
            ("end_date", end.as_str()),
            ("station", station),
            ("product", self.product.api_name()),
            ("datum", self.datum.as_str()),
            ("units", "metric"),
            ("time_zone", "gmt"),
            ("format", "json"),
        ];
        if let Some(interval) = &self.interval {
            params.push(("interval", interval.as_str()));
        }
        let (url, body) = get_text(&self.client, &self.data_url, &params).await?;
        parse_series(station, self.product, &url, &body)
    }
}

impl SourceAdapter for TideGaugeAdapter {
    type Period = TimeRange;

    fn name(&self) -> &'static str {
        "tide-gauge"
    }

    async fn fetch_series(
        &self,
        station: &Station,
        periods: &[TimeRange],
    ) -> Result<SeriesFrame, FetchError> {
        let id = station.id();
        let mut parts = Vec::with_capacity(periods.len());
        for range in periods {
            info!(
                "Tide-gauge: start time is {}, end time is {}, station is {}",
                range.start_string(),
                range.end_string(),
                id
            );
            match self.fetch_range(id, range).await {
                Ok((frame, multivalue)) => {
                    if multivalue {
                        info!(
                            "Duplicated data found for station {}, kept first value(s) only",
                            id
                        );
                    }
                    parts.push(frame);
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e @ FetchError::NetworkRequest(..)) => {
                    error!("Could not connect to tide-gauge service for {}: {}", id, e)
                }
                Err(e @ FetchError::HttpStatus { .. }) => {
                    error!("HTTP error from tide-gauge service for {}: {}", id, e)
                }
                Err(e @ FetchError::Timeout(..)) => {
                    error!("Timeout from tide-gauge service for {}: {}", id, e)
                }
                Err(e) => warn!("Tide-gauge data error for {} ({}): {}", id, self.product, e),
            }
        }
        let (frame, _) =
            SeriesFrame::concat(id, parts).map_err(|e| FetchError::from_frame(id, e))?;
        Ok(frame)
    }

    async fn fetch_metadata(&self, station: &Station) -> Result<StationMetadata, FetchError> {
        let base = format!("{}/{}.json", self.metadata_url.trim_end_matches('/'), station.id());
        let no_params: [(&str, &str); 0] = [];
        let (url, body) = get_text(&self.client, &base, &no_params).await?;
        parse_metadata(station.id(), &url, &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WATER_LEVEL: &str = r#"{
        "metadata": {"id":"8410140","name":"Eastport","lat":"44.9046","lon":"-66.9829"},
        "data": [
            {"t":"2021-09-01 00:00", "v":"1.234", "s":"0.003", "f":"0,0,0,0", "q":"v"},
            {"t":"2021-09-01 00:06", "v":"", "s":"", "f":"1,0,0,0", "q":"v"},
            {"t":"2021-09-01 00:06", "v":"9.999", "s":"0.003", "f":"0,0,0,0", "q":"v"},
            {"t":"2021-09-01 00:12", "v":"1.301", "s":"0.002", "f":"0,0,0,0", "q":"v"}
        ]
    }"#;

    #[test]
    fn test_water_level_keeps_first_duplicate() {
        let (frame, multivalue) =
            parse_series("8410140", TideGaugeProduct::WaterLevel, "url", WATER_LEVEL).unwrap();
        assert!(multivalue);
        assert_eq!(frame.len(), 3);
        assert_eq!(frame.values().unwrap(), vec![Some(1.234), None, Some(1.301)]);
    }

    #[test]
    fn test_predictions_array() {
        let body = r#"{"predictions":[{"t":"2021-09-01 00:00","v":"0.5"}]}"#;
        let (frame, _) = parse_series("A", TideGaugeProduct::Predictions, "url", body).unwrap();
        assert_eq!(frame.values().unwrap(), vec![Some(0.5)]);
    }

    #[test]
    fn test_wind_reads_speed() {
        let body = r#"{"data":[{"t":"2021-09-01 00:00","s":"4.1","d":"200.0","dr":"SSW","g":"6.0","f":"0,0"}]}"#;
        let (frame, _) = parse_series("A", TideGaugeProduct::Wind, "url", body).unwrap();
        assert_eq!(frame.values().unwrap(), vec![Some(4.1)]);
    }

    #[test]
    fn test_service_error_message() {
        let body = r#"{"error":{"message":"No data was found. This product may not be offered at this station at the requested time."}}"#;
        let err = parse_series("A", TideGaugeProduct::WaterLevel, "url", body).unwrap_err();
        assert!(matches!(err, FetchError::ServiceError { .. }));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_metadata_record() {
        let body = r#"{"count":1,"units":null,"stations":[
            {"state":"ME","tidal":true,"name":"Eastport","lat":44.904598,"lng":-66.982903,"id":"8410140"}
        ]}"#;
        let meta = parse_metadata("8410140", "url", body).unwrap();
        assert_eq!(meta.name.as_deref(), Some("Eastport"));
        assert_eq!(meta.state.as_deref(), Some("ME"));
        assert_eq!(meta.owner.as_deref(), Some("NOAA/NOS"));
        assert_eq!(meta.units.as_deref(), Some("meters"));
        assert!((meta.lat.unwrap() - 44.904598).abs() < 1e-9);
        assert_eq!(meta.county, None);
    }

    #[test]
    fn test_metadata_blank_state_is_unknown() {
        let body = r#"{"stations":[{"state":"","name":"Bermuda","lat":"32.37","lng":"-64.70"}]}"#;
        let meta = parse_metadata("2695540", "url", body).unwrap();
        assert_eq!(meta.state, None);
        assert_eq!(meta.lon, Some(-64.70));
    }

    #[tokio::test]
    async fn test_unreachable_service_yields_empty_frame() {
        let adapter = TideGaugeAdapter::builder()
            .client(Client::new())
            .product(TideGaugeProduct::WaterLevel)
            .data_url("http://127.0.0.1:9/datagetter".to_string())
            .build();
        let range = TimeRange::parse("2021-09-01 00:00:00", "2021-09-02 00:00:00").unwrap();
        let frame = adapter
            .fetch_series(&Station::from("8410140"), &[range])
            .await
            .unwrap();
        assert!(frame.is_empty());
    }
}
