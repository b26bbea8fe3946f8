//! What a harvest run hands back: the merged data, the station metadata and
//! the exclusions of both phases.

use crate::aggregate::aggregator::{DataReport, MetadataReport};
use crate::error::HarvestError;
use crate::output::error::OutputError;
use crate::output::long_table::LongTable;
use crate::output::writer::OutputWriter;
use polars::prelude::PolarsResult;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct HarvestRun {
    /// Product name, used as the value column of the long form.
    pub product: String,
    pub data: DataReport,
    pub metadata: MetadataReport,
}

impl HarvestRun {
    /// The data melted to `(TIME, STATION, PRODUCT)` rows, the layout
    /// collaborators load.
    pub fn long_form(&self) -> PolarsResult<LongTable> {
        LongTable::from_wide(&self.data.table, self.product.to_uppercase())
    }

    /// Writes the long-form data to `{fileroot}{iometadata}` and the metadata
    /// to `{fileroot}_meta{iometadata}`. Returns both paths.
    pub async fn write(
        &self,
        writer: &OutputWriter,
        fileroot: &str,
        iometadata: &str,
    ) -> Result<(PathBuf, PathBuf), HarvestError> {
        let data = self
            .long_form()
            .and_then(|long| long.to_dataframe())
            .map_err(OutputError::Frame)?;
        let meta = self
            .metadata
            .table
            .to_dataframe()
            .map_err(OutputError::Frame)?;
        let data_path = writer.write(data, fileroot, iometadata).await?;
        let meta_path = writer
            .write(meta, &format!("{}_meta", fileroot), iometadata)
            .await?;
        Ok((data_path, meta_path))
    }
}
