use crate::sources::snapshot::SnapshotError;
use crate::types::product::CastType;
use polars::prelude::PolarsError;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Network request failed for {0}")]
    NetworkRequest(String, #[source] reqwest::Error),

    #[error("Request timed out for {0}")]
    Timeout(String, #[source] reqwest::Error),

    #[error("HTTP request failed for {url} with status {status}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to decode JSON response from {url}")]
    JsonParse {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to decode XML response from {url}")]
    XmlParse {
        url: String,
        #[source]
        source: quick_xml::DeError,
    },

    #[error("Service reported an error for station {station}: {message}")]
    ServiceError { station: String, message: String },

    #[error("No data returned for station {station}")]
    NoData { station: String },

    #[error("Unexpected data state, station {station}: {message}")]
    UnexpectedData { station: String, message: String },

    #[error("Metadata lookup for station {station} returned {rows} rows, expected one")]
    UnexpectedAggregate { station: String, rows: usize },

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error("Reading {what} did not finish within {after:?}")]
    SnapshotTimeout { what: String, after: Duration },

    #[error("Polars operation failed for station {station}")]
    Frame {
        station: String,
        #[source]
        source: PolarsError,
    },

    #[error("Background task failed to complete")]
    TaskJoin(#[from] tokio::task::JoinError),

    // Run-fatal: the caller's inputs are inconsistent.
    #[error("Product '{product}' is not served by the {provider} source")]
    UnsupportedProduct {
        provider: &'static str,
        product: String,
    },

    #[error("Snapshots disagree on cast type: {0:?}")]
    MixedCastTypes(Vec<CastType>),

    #[error("None of the {0} snapshot locations could be read")]
    NoReadableSnapshot(usize),

    #[error("Station {0} has not been resolved to a grid node")]
    UnresolvedStation(String),

    #[error("Snapshot location '{0}' does not follow the run/grid/instance/ensemble layout")]
    MalformedLocation(String),

    #[error("No credentials configured for the {0} source")]
    MissingCredentials(&'static str),

    #[error("Failed to merge station frames into one table")]
    Merge(#[source] PolarsError),
}

impl FetchError {
    /// Fatal errors abort the whole run; everything else only excludes the
    /// station (or sub-range) it happened for.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            FetchError::UnsupportedProduct { .. }
                | FetchError::MixedCastTypes(_)
                | FetchError::NoReadableSnapshot(_)
                | FetchError::UnresolvedStation(_)
                | FetchError::MalformedLocation(_)
                | FetchError::MissingCredentials(_)
                | FetchError::Merge(_)
        )
    }

    pub(crate) fn from_frame(station: &str, source: PolarsError) -> Self {
        FetchError::Frame {
            station: station.to_string(),
            source,
        }
    }

    pub(crate) fn from_request(url: &str, e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout(url.to_string(), e)
        } else if let Some(status) = e.status() {
            FetchError::HttpStatus {
                url: url.to_string(),
                status,
                source: e,
            }
        } else {
            FetchError::NetworkRequest(url.to_string(), e)
        }
    }
}
