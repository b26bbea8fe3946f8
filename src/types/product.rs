//! Products (measured quantities) each source can deliver, and the model cast type.

use crate::sources::error::FetchError;
use std::fmt;
use std::str::FromStr;

/// Products served by the tide-gauge source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TideGaugeProduct {
    /// Observed water level, 6-minute cadence.
    WaterLevel,
    /// Predicted tide, 6-minute cadence unless an hourly interval is requested.
    Predictions,
    /// Verified hourly heights.
    HourlyHeight,
    AirPressure,
    /// Wind speed.
    Wind,
}

impl TideGaugeProduct {
    /// Name used in the `product` query parameter.
    pub(crate) fn api_name(&self) -> &'static str {
        match self {
            TideGaugeProduct::WaterLevel => "water_level",
            TideGaugeProduct::Predictions => "predictions",
            TideGaugeProduct::HourlyHeight => "hourly_height",
            TideGaugeProduct::AirPressure => "air_pressure",
            TideGaugeProduct::Wind => "wind",
        }
    }

    /// Which field of an observation record carries the value.
    pub(crate) fn value_field(&self) -> ValueField {
        match self {
            TideGaugeProduct::Wind => ValueField::Speed,
            _ => ValueField::Value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ValueField {
    /// `v`
    Value,
    /// `s`
    Speed,
}

impl FromStr for TideGaugeProduct {
    type Err = FetchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "water_level" => Ok(TideGaugeProduct::WaterLevel),
            "predictions" => Ok(TideGaugeProduct::Predictions),
            "hourly_height" => Ok(TideGaugeProduct::HourlyHeight),
            "air_pressure" => Ok(TideGaugeProduct::AirPressure),
            "wind" => Ok(TideGaugeProduct::Wind),
            other => Err(FetchError::UnsupportedProduct {
                provider: "tide-gauge",
                product: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for TideGaugeProduct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.api_name())
    }
}

/// Sensor class codes understood by the telemetry service.
pub const SENSOR_CLASSES: &[(&str, u32)] = &[
    ("Rain Increment", 10),
    ("Rain Accumulation", 11),
    ("Stage", 20),
    ("Flow Volume", 25),
    ("Air Temperature", 30),
    ("Fuel Temperature", 38),
    ("Wind Velocity", 40),
    ("Wind Velocity, maximum", 41),
    ("Wind Direction", 44),
    ("ALERT Wind", 47),
    ("Relative Humidity", 50),
    ("Soil Moisture", 51),
    ("Fuel Moisture", 52),
    ("Barometric Pressure", 53),
    ("Net Solar Radiation", 60),
    ("Evapotranspiration Rate", 84),
    ("Water Elevation", 94),
    ("Binary Status", 197),
    ("Repeater Status", 198),
    ("Battery", 199),
    ("Average Voltage", 200),
    ("Repeater Pass List", 240),
    ("Msg Count", 246),
];

/// Looks up the class code for a sensor class name.
pub fn sensor_class_code(name: &str) -> Option<u32> {
    SENSOR_CLASSES
        .iter()
        .find(|(class, _)| *class == name)
        .map(|(_, code)| *code)
}

/// Products served by the telemetry source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TelemetryProduct {
    /// River gauges, sensor class `Stage`.
    RiverWaterLevel,
    /// Coastal gauges, sensor class `Water Elevation`.
    CoastalWaterLevel,
}

impl TelemetryProduct {
    pub fn sensor_class(&self) -> &'static str {
        match self {
            TelemetryProduct::RiverWaterLevel => "Stage",
            TelemetryProduct::CoastalWaterLevel => "Water Elevation",
        }
    }

    pub fn class_code(&self) -> u32 {
        match self {
            TelemetryProduct::RiverWaterLevel => 20,
            TelemetryProduct::CoastalWaterLevel => 94,
        }
    }
}

impl FromStr for TelemetryProduct {
    type Err = FetchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "river_water_level" => Ok(TelemetryProduct::RiverWaterLevel),
            "coastal_water_level" => Ok(TelemetryProduct::CoastalWaterLevel),
            other => Err(FetchError::UnsupportedProduct {
                provider: "telemetry",
                product: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for TelemetryProduct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryProduct::RiverWaterLevel => write!(f, "river_water_level"),
            TelemetryProduct::CoastalWaterLevel => write!(f, "coastal_water_level"),
        }
    }
}

/// Products served by the model-output source. Only water level is stored at
/// station points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelProduct {
    WaterLevel,
}

impl ModelProduct {
    /// Name of the gridded variable holding the product.
    pub(crate) fn variable(&self) -> &'static str {
        match self {
            ModelProduct::WaterLevel => "zeta",
        }
    }
}

impl FromStr for ModelProduct {
    type Err = FetchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "water_level" => Ok(ModelProduct::WaterLevel),
            other => Err(FetchError::UnsupportedProduct {
                provider: "model-output",
                product: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for ModelProduct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "water_level")
    }
}

/// Whether a model snapshot covers the past (nowcast) or runs ahead of its
/// nominal run time (forecast).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CastType {
    Nowcast,
    Forecast,
}

impl CastType {
    /// Interprets the ensemble segment of a snapshot path. Anything other than
    /// `nowcast` (e.g. `namforecast`, `nhc0fcl`) is a forecast.
    pub fn from_ensemble(ensemble: &str) -> Self {
        if ensemble.eq_ignore_ascii_case("nowcast") {
            CastType::Nowcast
        } else {
            CastType::Forecast
        }
    }
}

impl fmt::Display for CastType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CastType::Nowcast => write!(f, "NOWCAST"),
            CastType::Forecast => write!(f, "FORECAST"),
        }
    }
}
