use crate::config::ConfigError;
use crate::output::error::OutputError;
use crate::partition::error::PartitionError;
use crate::sources::error::FetchError;
use crate::stations::error::StationListError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarvestError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Partition(#[from] PartitionError),

    #[error(transparent)]
    Output(#[from] OutputError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    StationList(#[from] StationListError),

    #[error("Failed to build HTTP client")]
    HttpClient(#[source] reqwest::Error),

    #[error("No snapshot locations: pass them explicitly or give a template and a time range")]
    NoSnapshotLocations,

    #[error("No snapshot reader available: enable the `netcdf` feature or supply a reader")]
    NoSnapshotReader,
}
