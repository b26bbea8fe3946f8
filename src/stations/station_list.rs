//! Plain-text station lists: a comment header line, then one identifier per
//! line.

use crate::stations::error::StationListError;
use log::info;
use std::path::Path;

/// Parses list text. The first line is always treated as a header.
pub fn parse_station_list(text: &str) -> Vec<String> {
    text.lines()
        .skip(1)
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect()
}

/// Reads a station list from disk.
///
/// # Errors
///
/// [`StationListError::Read`] when the file cannot be read and
/// [`StationListError::Empty`] when it holds no identifiers.
pub async fn load_station_list(path: impl AsRef<Path>) -> Result<Vec<String>, StationListError> {
    let path = path.as_ref();
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| StationListError::Read(path.to_path_buf(), e))?;
    let stations = parse_station_list(&text);
    if stations.is_empty() {
        return Err(StationListError::Empty(path.to_path_buf()));
    }
    info!("Loaded {} stations from {:?}", stations.len(), path);
    Ok(stations)
}
