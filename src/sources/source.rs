use crate::sources::error::FetchError;
use crate::types::metadata::StationMetadata;
use crate::types::series_frame::SeriesFrame;
use crate::types::station::Station;

/// A remote source bound to one product.
///
/// Station and periods vary per call. Implementations return `Ok` with an
/// empty frame when every period failed; the aggregator treats that as a
/// station failure.
#[allow(async_fn_in_trait)]
pub trait SourceAdapter {
    /// What the partitioner produced for this source: time ranges or
    /// snapshot locations.
    type Period;

    /// Short source name used in log lines.
    fn name(&self) -> &'static str;

    async fn fetch_series(
        &self,
        station: &Station,
        periods: &[Self::Period],
    ) -> Result<SeriesFrame, FetchError>;

    async fn fetch_metadata(&self, station: &Station) -> Result<StationMetadata, FetchError>;
}
