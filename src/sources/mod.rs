pub mod error;
pub(crate) mod http;
pub mod model_output;
#[cfg(feature = "netcdf")]
pub mod netcdf_reader;
pub mod snapshot;
pub mod snapshot_path;
pub mod source;
pub mod telemetry;
pub mod tide_gauge;
