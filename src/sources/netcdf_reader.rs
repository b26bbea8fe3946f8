//! [`SnapshotReader`] over NetCDF station files (`fort.61.nc`). Remote
//! locations need a libnetcdf built with OPeNDAP support.

use crate::sources::snapshot::{decode_time_axis, Snapshot, SnapshotError, SnapshotReader};
use chrono::NaiveDateTime;
use log::debug;
use netcdf::{AttributeValue, Extent};

const STATION_NAME: &str = "station_name";
const TIME: &str = "time";

#[derive(Debug, Default, Clone, Copy)]
pub struct NetcdfReader;

impl SnapshotReader for NetcdfReader {
    fn open(&self, location: &str) -> Result<Box<dyn Snapshot>, SnapshotError> {
        let file = netcdf::open(location).map_err(|e| SnapshotError::Open {
            location: location.to_string(),
            message: e.to_string(),
        })?;
        debug!("Opened snapshot {}", location);
        Ok(Box::new(NetcdfSnapshot {
            location: location.to_string(),
            file,
        }))
    }
}

struct NetcdfSnapshot {
    location: String,
    file: netcdf::File,
}

impl NetcdfSnapshot {
    fn read_error(&self, variable: &str, e: netcdf::Error) -> SnapshotError {
        SnapshotError::Read {
            location: self.location.clone(),
            variable: variable.to_string(),
            message: e.to_string(),
        }
    }

    fn variable(&self, name: &str) -> Result<netcdf::Variable<'_>, SnapshotError> {
        self.file
            .variable(name)
            .ok_or_else(|| SnapshotError::MissingVariable {
                location: self.location.clone(),
                variable: name.to_string(),
            })
    }

    fn text_attribute(attribute: Option<netcdf::Attribute<'_>>) -> Option<String> {
        match attribute?.value().ok()? {
            AttributeValue::Str(s) => Some(s),
            _ => None,
        }
    }

    fn node_count(&self, variable: &netcdf::Variable<'_>) -> usize {
        variable
            .dimensions()
            .last()
            .map(|dim| dim.len())
            .unwrap_or(0)
    }

    fn check_node(&self, variable: &netcdf::Variable<'_>, node: usize) -> Result<(), SnapshotError> {
        let nodes = self.node_count(variable);
        if node >= nodes {
            return Err(SnapshotError::NodeOutOfRange {
                location: self.location.clone(),
                node,
                nodes,
            });
        }
        Ok(())
    }

    fn scalar_at(&self, name: &str, node: usize) -> Result<f64, SnapshotError> {
        let variable = self.variable(name)?;
        self.check_node(&variable, node)?;
        let extents = [Extent::from(node)];
        let values = variable
            .get_values::<f64, _>(&extents[..])
            .map_err(|e| self.read_error(name, e))?;
        values.first().copied().ok_or_else(|| SnapshotError::Read {
            location: self.location.clone(),
            variable: name.to_string(),
            message: format!("no value at node {}", node),
        })
    }
}

impl Snapshot for NetcdfSnapshot {
    fn location(&self) -> &str {
        &self.location
    }

    fn station_names(&self) -> Result<Vec<String>, SnapshotError> {
        let variable = self.variable(STATION_NAME)?;
        let width = variable
            .dimensions()
            .get(1)
            .map(|dim| dim.len())
            .unwrap_or(0);
        let raw = variable
            .get_raw_values(&[] as &[Extent])
            .map_err(|e| self.read_error(STATION_NAME, e))?;
        if width == 0 {
            return Ok(Vec::new());
        }
        Ok(raw
            .chunks(width)
            .map(|chunk| {
                String::from_utf8_lossy(chunk)
                    .trim_end_matches('\0')
                    .trim()
                    .to_string()
            })
            .collect())
    }

    fn times(&self) -> Result<Vec<NaiveDateTime>, SnapshotError> {
        let variable = self.variable(TIME)?;
        let units = Self::text_attribute(variable.attribute("units"))
            .ok_or_else(|| SnapshotError::TimeUnits(String::new()))?;
        let values = variable
            .get_values::<f64, _>(&[] as &[Extent])
            .map_err(|e| self.read_error(TIME, e))?;
        decode_time_axis(&units, &values)
    }

    fn has_variable(&self, name: &str) -> bool {
        self.file.variable(name).is_some()
    }

    fn node_values(&self, name: &str, node: usize) -> Result<Vec<f64>, SnapshotError> {
        let variable = self.variable(name)?;
        self.check_node(&variable, node)?;
        let extents = [Extent::from(..), Extent::from(node)];
        variable
            .get_values::<f64, _>(&extents[..])
            .map_err(|e| self.read_error(name, e))
    }

    fn node_location(&self, node: usize) -> Result<(f64, f64), SnapshotError> {
        Ok((self.scalar_at("x", node)?, self.scalar_at("y", node)?))
    }

    fn source(&self) -> Option<String> {
        Self::text_attribute(self.file.attribute("source"))
    }
}
