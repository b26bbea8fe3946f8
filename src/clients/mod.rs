pub mod model_output_client;
pub mod telemetry_client;
pub mod tide_gauge_client;
