//! Provider adapters and the data types they share
//!
//! Each adapter wraps one upstream API behind an async method that returns a
//! normalized, typed result. Adapters know nothing about caching or about
//! each other.

pub mod alerts;
pub mod geocode;
pub mod report;
pub mod weather;

pub use alerts::{Alert, AlertsClient, AlertsData, ForecastPeriod};
pub use geocode::{GeocodeClient, GeocodeError, Place};
pub use report::{
    build_prompt, DeepInfraGenerator, GeminiGenerator, ReportError, ReportGenerator,
    TextGenerator, FALLBACK_REPORT,
};
pub use weather::{Forecast, WeatherClient, WeatherError};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors caused by malformed client input
#[derive(Debug, Error, PartialEq)]
pub enum InputError {
    /// Latitude or longitude was not supplied
    #[error("lat and lon required")]
    MissingCoordinates,

    /// A coordinate could not be parsed as a finite number
    #[error("invalid {name}: '{value}'")]
    InvalidCoordinate { name: &'static str, value: String },

    /// A coordinate was outside the valid range
    #[error("{name} out of range: {value}")]
    CoordinateOutOfRange { name: &'static str, value: f64 },

    /// The units parameter was not recognized
    #[error("units must be 'imperial' or 'metric', got '{0}'")]
    InvalidUnits(String),

    /// A required query parameter was not supplied
    #[error("{0} required")]
    MissingParameter(&'static str),
}

/// A validated latitude/longitude pair in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    /// Creates coordinates, checking that both values are in range
    pub fn new(lat: f64, lon: f64) -> Result<Self, InputError> {
        if !(-90.0..=90.0).contains(&lat) {
            return Err(InputError::CoordinateOutOfRange {
                name: "lat",
                value: lat,
            });
        }
        if !(-180.0..=180.0).contains(&lon) {
            return Err(InputError::CoordinateOutOfRange {
                name: "lon",
                value: lon,
            });
        }
        Ok(Self { lat, lon })
    }

    /// Parses raw query-string values
    ///
    /// Missing or blank values yield `MissingCoordinates`; anything that is
    /// not a finite number yields `InvalidCoordinate`.
    pub fn parse(lat: Option<&str>, lon: Option<&str>) -> Result<Self, InputError> {
        let (lat, lon) = match (non_blank(lat), non_blank(lon)) {
            (Some(lat), Some(lon)) => (lat, lon),
            _ => return Err(InputError::MissingCoordinates),
        };
        Self::new(parse_coordinate("lat", lat)?, parse_coordinate("lon", lon)?)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn parse_coordinate(name: &'static str, raw: &str) -> Result<f64, InputError> {
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| InputError::InvalidCoordinate {
            name,
            value: raw.to_string(),
        })
}

/// Unit system requested by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    #[default]
    Imperial,
    Metric,
}

impl Units {
    /// Parses the optional `units` query parameter, defaulting to imperial
    pub fn parse(raw: Option<&str>) -> Result<Self, InputError> {
        match non_blank(raw) {
            None => Ok(Units::default()),
            Some(s) if s.eq_ignore_ascii_case("imperial") => Ok(Units::Imperial),
            Some(s) if s.eq_ignore_ascii_case("metric") => Ok(Units::Metric),
            Some(s) => Err(InputError::InvalidUnits(s.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Units::Imperial => "imperial",
            Units::Metric => "metric",
        }
    }

    /// Open-Meteo `temperature_unit` value
    pub fn temperature_unit(&self) -> &'static str {
        match self {
            Units::Imperial => "fahrenheit",
            Units::Metric => "celsius",
        }
    }

    /// Open-Meteo `wind_speed_unit` value
    pub fn wind_speed_unit(&self) -> &'static str {
        match self {
            Units::Imperial => "mph",
            Units::Metric => "kmh",
        }
    }

    /// Open-Meteo `precipitation_unit` value
    pub fn precipitation_unit(&self) -> &'static str {
        match self {
            Units::Imperial => "inch",
            Units::Metric => "mm",
        }
    }
}
