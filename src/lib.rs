mod aggregate;
mod clients;
mod config;
mod error;
mod harvester;
mod output;
mod partition;
mod run;
mod sources;
mod stations;
mod types;

pub use config::{ConfigError, HarvestConfig, TelemetryCredentials};
pub use error::HarvestError;
pub use harvester::Harvester;
pub use run::HarvestRun;

pub use clients::model_output_client::*;
pub use clients::telemetry_client::*;
pub use clients::tide_gauge_client::*;

pub use aggregate::aggregator::{
    AggregationSettings, DataReport, MetadataReport, StationAggregator, DEFAULT_FILL_VALUE,
    DEFAULT_RESAMPLE_MINUTES,
};

pub use partition::daily::daily_periods;
pub use partition::error::PartitionError;
pub use partition::snapshot_times::{quantize_hour, snapshot_times};
pub use partition::whole_range;

pub use sources::error::FetchError;
pub use sources::model_output::{resolve_stations, ModelOutputAdapter, DEFAULT_SNAPSHOT_TIMEOUT};
#[cfg(feature = "netcdf")]
pub use sources::netcdf_reader::NetcdfReader;
pub use sources::snapshot::{decode_time_axis, station_code, Snapshot, SnapshotError, SnapshotReader};
pub use sources::snapshot_path::{
    classify, ensemble, grid_name, instance_name, run_time, snapshot_locations,
    to_nowcast_location, RunTime,
};
pub use sources::source::SourceAdapter;
pub use sources::telemetry::{TelemetryAdapter, FEET_TO_METERS};
pub use sources::tide_gauge::TideGaugeAdapter;

pub use output::error::OutputError;
pub use output::long_table::{LongRow, LongTable};
pub use output::writer::{run_tag, OutputFormat, OutputWriter};

pub use stations::error::StationListError;
pub use stations::station_list::{load_station_list, parse_station_list};

pub use types::aggregate_table::{AggregateTable, OUTPUT_TIME_FORMAT, TIME_COLUMN};
pub use types::metadata::{MetadataTable, StationMetadata, METADATA_COLUMNS, STATION_COLUMN};
pub use types::product::{
    sensor_class_code, CastType, ModelProduct, TelemetryProduct, TideGaugeProduct, SENSOR_CLASSES,
};
pub use types::series_frame::{SeriesFrame, VALUE_COLUMN};
pub use types::station::Station;
pub use types::time_range::{parse_utc, TimeRange, TIME_FORMAT};
