//! Per-station descriptive metadata and the table that collects it across a
//! run, one row per station in request order.

use log::warn;
use polars::prelude::*;
use std::collections::HashSet;

/// Name of the key column of the metadata frame.
pub const STATION_COLUMN: &str = "STATION";

/// Metadata columns, in output order.
pub const METADATA_COLUMNS: [&str; 8] = [
    "LAT", "LON", "NAME", "UNITS", "TZ", "OWNER", "STATE", "COUNTY",
];

/// Descriptive record for one station. Fields a source does not know are `None`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StationMetadata {
    pub station: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub name: Option<String>,
    pub units: Option<String>,
    pub tz: Option<String>,
    pub owner: Option<String>,
    pub state: Option<String>,
    pub county: Option<String>,
}

impl StationMetadata {
    pub fn new(station: impl Into<String>) -> Self {
        Self {
            station: station.into(),
            ..Default::default()
        }
    }
}

/// Normalizes a text field from a remote record: blank means unknown.
pub(crate) fn known(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// One row per station.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataTable {
    rows: Vec<StationMetadata>,
    fill_value: f64,
}

impl MetadataTable {
    /// Builds the table in the given order. A station listed twice keeps its first row.
    pub fn new(rows: Vec<StationMetadata>, fill_value: f64) -> Self {
        let mut seen = HashSet::new();
        let rows = rows
            .into_iter()
            .filter(|row| {
                let first = seen.insert(row.station.clone());
                if !first {
                    warn!("Dropping duplicate metadata row for station {}", row.station);
                }
                first
            })
            .collect();
        Self { rows, fill_value }
    }

    pub fn rows(&self) -> &[StationMetadata] {
        &self.rows
    }

    pub fn get(&self, station: &str) -> Option<&StationMetadata> {
        self.rows.iter().find(|row| row.station == station)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// The fill value rendered for text columns, e.g. `-99999`.
    pub fn fill_text(&self) -> String {
        if self.fill_value.fract() == 0.0 {
            format!("{}", self.fill_value as i64)
        } else {
            self.fill_value.to_string()
        }
    }

    /// Converts to a polars frame keyed by `STATION` with every unknown field
    /// replaced by the fill value.
    pub fn to_dataframe(&self) -> PolarsResult<DataFrame> {
        let fill = self.fill_text();
        let text = |value: &Option<String>| value.clone().unwrap_or_else(|| fill.clone());

        let mut stations = Vec::with_capacity(self.rows.len());
        let mut lat = Vec::with_capacity(self.rows.len());
        let mut lon = Vec::with_capacity(self.rows.len());
        let mut text_columns: [Vec<String>; 6] = Default::default();
        for row in &self.rows {
            stations.push(row.station.clone());
            lat.push(row.lat.unwrap_or(self.fill_value));
            lon.push(row.lon.unwrap_or(self.fill_value));
            let fields = [
                &row.name, &row.units, &row.tz, &row.owner, &row.state, &row.county,
            ];
            for (column, field) in text_columns.iter_mut().zip(fields) {
                column.push(text(field));
            }
        }

        let mut columns = vec![
            Column::new(STATION_COLUMN.into(), stations),
            Column::new(METADATA_COLUMNS[0].into(), lat),
            Column::new(METADATA_COLUMNS[1].into(), lon),
        ];
        for (name, values) in METADATA_COLUMNS[2..].iter().zip(text_columns) {
            columns.push(Column::new((*name).into(), values));
        }
        DataFrame::new(columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_fields_are_filled() -> Result<(), Box<dyn std::error::Error>> {
        let mut row = StationMetadata::new("8410140");
        row.lat = Some(44.9);
        row.name = Some("Eastport".to_string());
        let table = MetadataTable::new(vec![row], -99999.0);
        let df = table.to_dataframe()?;

        assert_eq!(df.width(), 1 + METADATA_COLUMNS.len());
        assert_eq!(df.column("LAT")?.f64()?.get(0), Some(44.9));
        assert_eq!(df.column("LON")?.f64()?.get(0), Some(-99999.0));
        assert_eq!(df.column("NAME")?.str()?.get(0), Some("Eastport"));
        assert_eq!(df.column("COUNTY")?.str()?.get(0), Some("-99999"));
        Ok(())
    }

    #[test]
    fn test_duplicate_rows_keep_first() {
        let mut first = StationMetadata::new("A");
        first.owner = Some("NOAA/NOS".to_string());
        let second = StationMetadata::new("A");
        let table = MetadataTable::new(vec![first, second], -99999.0);
        assert_eq!(table.len(), 1);
        assert_eq!(table.get("A").unwrap().owner.as_deref(), Some("NOAA/NOS"));
    }

    #[test]
    fn test_blank_text_is_unknown() {
        assert_eq!(known(Some("  ".to_string())), None);
        assert_eq!(known(Some(" NC ".to_string())), Some("NC".to_string()));
    }
}
