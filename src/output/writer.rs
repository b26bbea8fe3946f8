//! Writes harvested frames to `{output_dir}/{fileroot}{iometadata}.{ext}`.

use crate::output::error::OutputError;
use crate::types::aggregate_table::OUTPUT_TIME_FORMAT;
use crate::types::time_range::TimeRange;
use bon::bon;
use log::info;
use polars::prelude::*;
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::{fs, task};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Csv,
    Parquet,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Parquet => "parquet",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Suffix identifying a run by its time range, e.g.
/// `_2021-09-01T03:00:30_2021-09-04T00:30:00`.
pub fn run_tag(range: &TimeRange) -> String {
    format!(
        "_{}_{}",
        range.start().format(OUTPUT_TIME_FORMAT),
        range.end().format(OUTPUT_TIME_FORMAT)
    )
}

#[derive(Debug, Clone)]
pub struct OutputWriter {
    output_dir: PathBuf,
    format: OutputFormat,
}

#[bon]
impl OutputWriter {
    #[builder]
    pub fn new(#[builder(into)] output_dir: PathBuf, format: Option<OutputFormat>) -> Self {
        Self {
            output_dir,
            format: format.unwrap_or_default(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn path_for(&self, fileroot: &str, iometadata: &str) -> PathBuf {
        self.output_dir
            .join(format!("{}{}.{}", fileroot, iometadata, self.format.extension()))
    }

    /// Writes `df`, creating the output directory when needed, and returns
    /// the written path.
    pub async fn write(
        &self,
        df: DataFrame,
        fileroot: &str,
        iometadata: &str,
    ) -> Result<PathBuf, OutputError> {
        fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| OutputError::DirCreation(self.output_dir.clone(), e))?;
        let path = self.path_for(fileroot, iometadata);
        let format = self.format;
        let target = path.clone();
        task::spawn_blocking(move || write_frame(df, &target, format)).await??;
        info!("Wrote {} rows to {:?}", format, path);
        Ok(path)
    }
}

fn write_frame(mut df: DataFrame, path: &Path, format: OutputFormat) -> Result<(), OutputError> {
    let file = std::fs::File::create(path).map_err(|e| OutputError::WriteIo(path.to_path_buf(), e))?;
    match format {
        OutputFormat::Csv => CsvWriter::new(file)
            .include_header(true)
            .finish(&mut df)
            .map_err(|e| OutputError::WritePolars(path.to_path_buf(), e)),
        OutputFormat::Parquet => ParquetWriter::new(file)
            .with_compression(ParquetCompression::Snappy)
            .finish(&mut df)
            .map(|_| ())
            .map_err(|e| OutputError::WritePolars(path.to_path_buf(), e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::series_frame::SeriesFrame;
    use crate::types::aggregate_table::AggregateTable;
    use chrono::NaiveDate;
    use std::error::Error;

    #[test]
    fn test_run_tag() -> Result<(), Box<dyn Error>> {
        let range = TimeRange::parse("2021-09-01 03:00:30", "2021-09-04 00:30:00")?;
        assert_eq!(run_tag(&range), "_2021-09-01T03:00:30_2021-09-04T00:30:00");
        Ok(())
    }

    #[tokio::test]
    async fn test_write_csv_creates_directories() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let time = NaiveDate::from_ymd_opt(2021, 9, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .ok_or("bad date")?;
        let frame = SeriesFrame::from_samples("8410140", vec![(time, Some(0.25))])?.0;
        let df = AggregateTable::concat(vec![frame], -99999.0)?.to_dataframe()?;

        let writer = OutputWriter::builder()
            .output_dir(dir.path().join("nested"))
            .build();
        let path = writer.write(df, "noaa_stationdata", "_run").await?;

        assert_eq!(path, dir.path().join("nested").join("noaa_stationdata_run.csv"));
        let text = std::fs::read_to_string(&path)?;
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("TIME,8410140"));
        assert_eq!(lines.next(), Some("2021-09-01T00:00:00,0.25"));
        Ok(())
    }

    #[tokio::test]
    async fn test_write_parquet() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let df = DataFrame::new(vec![Column::new("TIME".into(), vec!["2021-09-01T00:00:00"])])?;
        let writer = OutputWriter::builder()
            .output_dir(dir.path())
            .format(OutputFormat::Parquet)
            .build();
        let path = writer.write(df, "meta", "").await?;
        assert!(path.ends_with("meta.parquet"));
        assert!(std::fs::metadata(&path)?.len() > 0);
        Ok(())
    }
}
