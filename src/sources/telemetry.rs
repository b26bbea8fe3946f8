//! Adapter for the Contrails (OneRain) river and coastal telemetry API.
//!
//! The service caps each response at roughly 5000 rows, so data is requested
//! one calendar day at a time (see [`crate::partition::daily`]). Values are
//! reported in feet and converted to meters on receipt.

use crate::sources::error::FetchError;
use crate::sources::http::get_text;
use crate::sources::source::SourceAdapter;
use crate::types::metadata::{known, StationMetadata};
use crate::types::product::TelemetryProduct;
use crate::types::series_frame::SeriesFrame;
use crate::types::station::Station;
use crate::types::time_range::{parse_timestamp, TimeRange};
use bon::bon;
use log::{info, warn};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;

pub const FEET_TO_METERS: f64 = 0.3048;
pub const DEFAULT_OWNER: &str = "NCEM";

const RESPONSE_TIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"];

#[derive(Debug, Deserialize)]
struct OneRain<R> {
    response: Response<R>,
}

#[derive(Debug, Deserialize)]
struct Response<R> {
    #[serde(default = "Option::default")]
    general: Option<General<R>>,
}

#[derive(Debug, Deserialize)]
struct General<R> {
    #[serde(rename = "row", default = "Vec::new")]
    rows: Vec<R>,
}

#[derive(Debug, Deserialize)]
struct DataRow {
    data_time: String,
    #[serde(default)]
    data_value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SensorRow {
    #[serde(default)]
    sensor_class: Option<String>,
    or_site_id: String,
    #[serde(default)]
    location: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SiteRow {
    #[serde(default)]
    latitude_dec: Option<String>,
    #[serde(default)]
    longitude_dec: Option<String>,
    #[serde(default)]
    location: Option<String>,
}

fn parse_rows<R: DeserializeOwned>(url: &str, body: &str) -> Result<Vec<R>, FetchError> {
    let doc: OneRain<R> = quick_xml::de::from_str(body).map_err(|e| FetchError::XmlParse {
        url: url.to_string(),
        source: e,
    })?;
    Ok(doc.response.general.map(|g| g.rows).unwrap_or_default())
}

fn parse_number(raw: Option<&str>) -> Option<f64> {
    raw.map(str::trim)
        .filter(|v| !v.is_empty())
        .and_then(|v| v.parse().ok())
}

/// Decodes one day of readings, still in feet.
fn parse_data(station: &str, url: &str, body: &str) -> Result<SeriesFrame, FetchError> {
    let rows: Vec<DataRow> = parse_rows(url, body)?;
    if rows.is_empty() {
        return Err(FetchError::NoData {
            station: station.to_string(),
        });
    }
    let mut samples = Vec::with_capacity(rows.len());
    for row in rows {
        let time = parse_timestamp(&row.data_time, RESPONSE_TIME_FORMATS).ok_or_else(|| {
            FetchError::UnexpectedData {
                station: station.to_string(),
                message: format!("unparseable timestamp '{}'", row.data_time),
            }
        })?;
        samples.push((time, parse_number(row.data_value.as_deref())));
    }
    let (frame, _) =
        SeriesFrame::from_samples(station, samples).map_err(|e| FetchError::from_frame(station, e))?;
    Ok(frame)
}

/// Picks the sensor row for the requested class. A site can carry several
/// sensors; a response listing many rows with none of the right class is the
/// upstream defect where one identifier bundles other stations.
fn select_sensor(station: &str, class_code: u32, rows: Vec<SensorRow>) -> Result<SensorRow, FetchError> {
    let count = rows.len();
    if count == 1 {
        return rows.into_iter().next().ok_or_else(|| FetchError::NoData {
            station: station.to_string(),
        });
    }
    if count == 0 {
        return Err(FetchError::NoData {
            station: station.to_string(),
        });
    }
    let code = class_code.to_string();
    rows.into_iter()
        .find(|row| row.sensor_class.as_deref().map(str::trim) == Some(code.as_str()))
        .ok_or_else(|| FetchError::UnexpectedAggregate {
            station: station.to_string(),
            rows: count,
        })
}

fn select_site(station: &str, rows: Vec<SiteRow>) -> Result<SiteRow, FetchError> {
    match rows.len() {
        0 => Err(FetchError::NoData {
            station: station.to_string(),
        }),
        1 => rows.into_iter().next().ok_or_else(|| FetchError::NoData {
            station: station.to_string(),
        }),
        n => Err(FetchError::UnexpectedAggregate {
            station: station.to_string(),
            rows: n,
        }),
    }
}

/// Fetches one product from the telemetry service.
pub struct TelemetryAdapter {
    client: Client,
    domain: String,
    system_key: String,
    owner: String,
    product: TelemetryProduct,
}

#[bon]
impl TelemetryAdapter {
    /// # Arguments
    ///
    /// * `client` - shared HTTP client.
    /// * `domain` - service endpoint the export requests go to.
    /// * `system_key` - per-deployment key sent with every request.
    /// * `product` - sensor class harvested for every station.
    /// * `owner` - data owner, `NCEM` by default.
    ///
    /// # Examples
    ///
    /// ```
    /// use hydro_harvest::{TelemetryAdapter, TelemetryProduct};
    ///
    /// let adapter = TelemetryAdapter::builder()
    ///     .client(reqwest::Client::new())
    ///     .domain("https://telemetry.example.org/export".to_string())
    ///     .system_key("key".to_string())
    ///     .product(TelemetryProduct::RiverWaterLevel)
    ///     .build();
    /// assert_eq!(adapter.product(), TelemetryProduct::RiverWaterLevel);
    /// ```
    #[builder]
    pub fn new(
        client: Client,
        domain: String,
        system_key: String,
        product: TelemetryProduct,
        owner: Option<String>,
    ) -> Self {
        info!("Telemetry fetching product {}", product.sensor_class());
        Self {
            client,
            domain,
            system_key,
            owner: owner.unwrap_or_else(|| DEFAULT_OWNER.to_string()),
            product,
        }
    }

    pub fn product(&self) -> TelemetryProduct {
        self.product
    }

    async fn fetch_range(&self, station: &str, range: &TimeRange) -> Result<SeriesFrame, FetchError> {
        let params = [
            ("method", "GetSensorData".to_string()),
            ("class", self.product.class_code().to_string()),
            ("system_key", self.system_key.clone()),
            ("site_id", station.to_string()),
            ("tz", "gmt".to_string()),
            ("data_start", range.start_string()),
            ("data_end", range.end_string()),
        ];
        let (url, body) = get_text(&self.client, &self.domain, &params).await?;
        parse_data(station, &url, &body)
    }
}

impl SourceAdapter for TelemetryAdapter {
    type Period = TimeRange;

    fn name(&self) -> &'static str {
        "telemetry"
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
                "Telemetry: start time is {}, end time is {}, station is {}",
                range.start_string(),
                range.end_string(),
                id
            );
            match self.fetch_range(id, range).await {
                Ok(frame) => parts.push(frame),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => warn!("Telemetry response error, perhaps an empty day for {}: {}", id, e),
            }
        }
        let (frame, multivalue) =
            SeriesFrame::concat(id, parts).map_err(|e| FetchError::from_frame(id, e))?;
        if multivalue {
            info!("Duplicated data found for station {}, kept first value(s) only", id);
        }
        frame
            .map_values(|feet| feet * FEET_TO_METERS)
            .map_err(|e| FetchError::from_frame(id, e))
    }

    async fn fetch_metadata(&self, station: &Station) -> Result<StationMetadata, FetchError> {
        let id = station.id();
        let class = self.product.class_code().to_string();

        let sensor_params = [
            ("method", "GetSensorMetaData"),
            ("tz", "gmt"),
            ("class", class.as_str()),
            ("system_key", self.system_key.as_str()),
            ("site_id", id),
        ];
        let (url, body) = get_text(&self.client, &self.domain, &sensor_params).await?;
        let sensor = select_sensor(id, self.product.class_code(), parse_rows(&url, &body)?)?;
        info!("Station {} resolved to or_site_id {}", id, sensor.or_site_id);

        let site_params = [
            ("method", "GetSiteMetaData"),
            ("tz", "gmt"),
            ("class", class.as_str()),
            ("system_key", self.system_key.as_str()),
            ("or_site_id", sensor.or_site_id.as_str()),
        ];
        let (url, body) = get_text(&self.client, &self.domain, &site_params).await?;
        let site = select_site(id, parse_rows(&url, &body)?)?;

        Ok(StationMetadata {
            station: id.to_string(),
            lat: parse_number(site.latitude_dec.as_deref()),
            lon: parse_number(site.longitude_dec.as_deref()),
            name: known(site.location).or_else(|| known(sensor.location)),
            units: Some("meters".to_string()),
            tz: Some("gmt".to_string()),
            owner: Some(self.owner.clone()),
            state: None,
            county: None,
        })
    }
}
