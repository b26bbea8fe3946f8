//! Defines the station identifiers the harvester works with.
//!
//! Observation sources (tide gauges, river telemetry) address a station by its
//! source-specific code alone. Model output addresses a station through the grid
//! node it was resolved to, and that node is only valid for the snapshots it was
//! resolved against.

use std::fmt;

/// A monitored location, identified by a source-specific code.
///
/// Identity is always the code. The grid node of a [`Station::GridBound`] station
/// is derived data: it is re-resolved on every run because a new grid or model
/// version can shift node numbering.
///
/// # Examples
///
/// ```
/// use hydro_harvest::Station;
///
/// let gauge = Station::from("8410140");
/// assert_eq!(gauge.id(), "8410140");
/// assert_eq!(gauge.node(), None);
///
/// let node = Station::GridBound { id: "8410140".to_string(), node: 1411 };
/// assert_eq!(node.id(), "8410140");
/// assert_eq!(node.node(), Some(1411));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Station {
    /// A station addressed by its code only.
    Simple(String),
    /// A station resolved to a node index of a model grid.
    GridBound {
        /// The source-specific station code.
        id: String,
        /// Zero-based index into the snapshot's station dimension.
        node: usize,
    },
}

impl Station {
    /// The station code, regardless of variant.
    pub fn id(&self) -> &str {
        match self {
            Station::Simple(id) => id,
            Station::GridBound { id, .. } => id,
        }
    }

    /// The resolved grid node, if any.
    pub fn node(&self) -> Option<usize> {
        match self {
            Station::Simple(_) => None,
            Station::GridBound { node, .. } => Some(*node),
        }
    }
}

impl From<&str> for Station {
    fn from(id: &str) -> Self {
        Station::Simple(id.to_string())
    }
}

impl From<String> for Station {
    fn from(id: String) -> Self {
        Station::Simple(id)
    }
}

impl fmt::Display for Station {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Station::Simple(id) => write!(f, "{}", id),
            Station::GridBound { id, node } => write!(f, "{} (node {})", id, node),
        }
    }
}
