//! Open-Meteo weather API client
//!
//! Fetches the primary forecast blend and, in parallel, the ECMWF model's
//! daily series for comparison. The comparison model is an enhancement: if
//! it fails for any reason the primary forecast is returned without it.

use futures::future::join;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use super::{Coordinates, Units};

/// Base URL for the Open-Meteo forecast API
pub const OPEN_METEO_BASE_URL: &str = "https://api.open-meteo.com/v1/forecast";

/// Base URL for the Open-Meteo ECMWF model API
pub const OPEN_METEO_ECMWF_URL: &str = "https://api.open-meteo.com/v1/ecmwf";

/// Days of daily forecast requested from both models
const FORECAST_DAYS: u32 = 14;

/// Hours of hourly forecast requested from the primary model
const FORECAST_HOURS: u32 = 24;

const CURRENT_FIELDS: &str = "temperature_2m,relative_humidity_2m,apparent_temperature,weather_code,wind_speed_10m,wind_direction_10m,precipitation,is_day";
const HOURLY_FIELDS: &str =
    "temperature_2m,weather_code,precipitation_probability,wind_speed_10m,is_day";
const DAILY_FIELDS: &str = "weather_code,temperature_2m_max,temperature_2m_min,precipitation_probability_max,precipitation_sum,snowfall_sum,sunrise,sunset,uv_index_max,wind_speed_10m_max,wind_gusts_10m_max";
const COMPARISON_DAILY_FIELDS: &str = "weather_code,temperature_2m_max,temperature_2m_min";

/// Errors that can occur when fetching weather data
#[derive(Debug, Error)]
pub enum WeatherError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// Upstream answered with a non-success status
    #[error("Open-Meteo error: {0}")]
    Status(u16),

    /// Failed to parse JSON response
    #[error("Failed to parse JSON response: {0}")]
    ParseError(#[from] serde_json::Error),

    /// Parallel series arrays disagree in length
    #[error("{0} arrays have inconsistent lengths")]
    InconsistentSeries(&'static str),
}

/// Normalized forecast returned to the dashboard
///
/// Field names follow Open-Meteo so the browser can read the payload as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Forecast {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub timezone: String,
    #[serde(default)]
    pub timezone_abbreviation: String,
    /// Offset of the location's local time from UTC
    #[serde(default)]
    pub utc_offset_seconds: i32,
    #[serde(default)]
    pub elevation: Option<f64>,
    pub current_units: CurrentUnits,
    pub current: CurrentConditions,
    pub hourly_units: HourlyUnits,
    pub hourly: HourlySeries,
    pub daily_units: DailyUnits,
    pub daily: DailySeries,
    /// Daily series from the ECMWF model, when it could be fetched
    #[serde(default)]
    pub ecmwf: Option<ModelComparison>,
}

/// Unit labels for the current conditions block
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CurrentUnits {
    pub temperature_2m: String,
    pub relative_humidity_2m: String,
    pub apparent_temperature: String,
    pub wind_speed_10m: String,
    pub precipitation: String,
}

/// Conditions at the time of the request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentConditions {
    #[serde(default)]
    pub time: String,
    pub temperature_2m: f64,
    pub relative_humidity_2m: f64,
    pub apparent_temperature: f64,
    pub weather_code: u8,
    pub wind_speed_10m: f64,
    #[serde(default)]
    pub wind_direction_10m: f64,
    #[serde(default)]
    pub precipitation: f64,
    #[serde(default)]
    pub is_day: u8,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HourlyUnits {
    pub temperature_2m: String,
    pub precipitation_probability: String,
    pub wind_speed_10m: String,
}

/// Hourly forecast as parallel arrays indexed by `time`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HourlySeries {
    pub time: Vec<String>,
    pub temperature_2m: Vec<f64>,
    pub weather_code: Vec<u8>,
    pub precipitation_probability: Vec<Option<f64>>,
    pub wind_speed_10m: Vec<f64>,
    #[serde(default)]
    pub is_day: Vec<u8>,
}

impl HourlySeries {
    fn validate(&self) -> Result<(), WeatherError> {
        let len = self.time.len();
        if self.temperature_2m.len() != len
            || self.weather_code.len() != len
            || self.precipitation_probability.len() != len
            || self.wind_speed_10m.len() != len
            || (!self.is_day.is_empty() && self.is_day.len() != len)
        {
            return Err(WeatherError::InconsistentSeries("hourly"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DailyUnits {
    pub temperature_2m_max: String,
    pub temperature_2m_min: String,
    pub precipitation_sum: String,
    pub snowfall_sum: String,
    pub wind_speed_10m_max: String,
    pub wind_gusts_10m_max: String,
}

/// Daily forecast as parallel arrays indexed by `time` (ISO dates)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailySeries {
    pub time: Vec<String>,
    pub weather_code: Vec<u8>,
    pub temperature_2m_max: Vec<f64>,
    pub temperature_2m_min: Vec<f64>,
    pub precipitation_probability_max: Vec<Option<f64>>,
    #[serde(default)]
    pub precipitation_sum: Vec<Option<f64>>,
    #[serde(default)]
    pub snowfall_sum: Vec<Option<f64>>,
    #[serde(default)]
    pub sunrise: Vec<String>,
    #[serde(default)]
    pub sunset: Vec<String>,
    pub uv_index_max: Vec<Option<f64>>,
    #[serde(default)]
    pub wind_speed_10m_max: Vec<Option<f64>>,
    #[serde(default)]
    pub wind_gusts_10m_max: Vec<Option<f64>>,
}

impl DailySeries {
    fn validate(&self) -> Result<(), WeatherError> {
        let len = self.time.len();
        let optional_ok = |l: usize| l == 0 || l == len;
        if self.weather_code.len() != len
            || self.temperature_2m_max.len() != len
            || self.temperature_2m_min.len() != len
            || self.precipitation_probability_max.len() != len
            || self.uv_index_max.len() != len
            || !optional_ok(self.precipitation_sum.len())
            || !optional_ok(self.snowfall_sum.len())
            || !optional_ok(self.sunrise.len())
            || !optional_ok(self.sunset.len())
            || !optional_ok(self.wind_speed_10m_max.len())
            || !optional_ok(self.wind_gusts_10m_max.len())
        {
            return Err(WeatherError::InconsistentSeries("daily"));
        }
        Ok(())
    }
}

/// Secondary model's daily outlook, kept for side-by-side comparison
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelComparison {
    #[serde(default)]
    pub daily_units: DailyUnits,
    pub daily: ComparisonDaily,
}

/// ECMWF daily arrays; later days may be null when the model run is short
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonDaily {
    pub time: Vec<String>,
    pub weather_code: Vec<Option<u8>>,
    pub temperature_2m_max: Vec<Option<f64>>,
    pub temperature_2m_min: Vec<Option<f64>>,
}

impl ComparisonDaily {
    fn validate(&self) -> Result<(), WeatherError> {
        let len = self.time.len();
        if self.weather_code.len() != len
            || self.temperature_2m_max.len() != len
            || self.temperature_2m_min.len() != len
        {
            return Err(WeatherError::InconsistentSeries("ecmwf daily"));
        }
        Ok(())
    }
}

/// Client for fetching weather data from Open-Meteo API
#[derive(Debug, Clone)]
pub struct WeatherClient {
    client: Client,
    base_url: String,
    ecmwf_url: String,
}

impl Default for WeatherClient {
    fn default() -> Self {
        Self::new()
    }
}

impl WeatherClient {
    /// Create a new WeatherClient with default settings
    pub fn new() -> Self {
        Self::with_client(Client::new())
    }

    /// Create a new WeatherClient with a custom HTTP client
    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            base_url: OPEN_METEO_BASE_URL.to_string(),
            ecmwf_url: OPEN_METEO_ECMWF_URL.to_string(),
        }
    }

    /// Point the client at different forecast and comparison endpoints
    pub fn with_base_urls(mut self, base_url: impl Into<String>, ecmwf_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self.ecmwf_url = ecmwf_url.into();
        self
    }

    /// Fetch the forecast for the given coordinates
    ///
    /// Issues the primary and comparison requests concurrently. A failure of
    /// the primary request is returned as an error; a failure of the
    /// comparison request only leaves `ecmwf` empty.
    pub async fn fetch_forecast(
        &self,
        coords: Coordinates,
        units: Units,
    ) -> Result<Forecast, WeatherError> {
        let (primary, comparison) = join(
            self.fetch_primary(coords, units),
            self.fetch_comparison(coords, units),
        )
        .await;

        let mut forecast = primary?;
        forecast.ecmwf = match comparison {
            Ok(comparison) => Some(comparison),
            Err(e) => {
                warn!(
                    operation = "weather",
                    error = %e,
                    "ECMWF comparison unavailable, continuing without it"
                );
                None
            }
        };

        Ok(forecast)
    }

    async fn fetch_primary(&self, coords: Coordinates, units: Units) -> Result<Forecast, WeatherError> {
        let query = [
            ("latitude", coords.lat.to_string()),
            ("longitude", coords.lon.to_string()),
            ("current", CURRENT_FIELDS.to_string()),
            ("hourly", HOURLY_FIELDS.to_string()),
            ("daily", DAILY_FIELDS.to_string()),
            ("temperature_unit", units.temperature_unit().to_string()),
            ("wind_speed_unit", units.wind_speed_unit().to_string()),
            ("precipitation_unit", units.precipitation_unit().to_string()),
            ("timezone", "auto".to_string()),
            ("forecast_days", FORECAST_DAYS.to_string()),
            ("forecast_hours", FORECAST_HOURS.to_string()),
        ];

        debug!(lat = coords.lat, lon = coords.lon, units = units.as_str(), "Fetching Open-Meteo forecast");

        let response = self.client.get(&self.base_url).query(&query).send().await?;
        if !response.status().is_success() {
            return Err(WeatherError::Status(response.status().as_u16()));
        }
        let text = response.text().await?;
        parse_forecast(&text)
    }

    async fn fetch_comparison(
        &self,
        coords: Coordinates,
        units: Units,
    ) -> Result<ModelComparison, WeatherError> {
        let query = [
            ("latitude", coords.lat.to_string()),
            ("longitude", coords.lon.to_string()),
            ("daily", COMPARISON_DAILY_FIELDS.to_string()),
            ("temperature_unit", units.temperature_unit().to_string()),
            ("wind_speed_unit", units.wind_speed_unit().to_string()),
            ("precipitation_unit", units.precipitation_unit().to_string()),
            ("timezone", "auto".to_string()),
            ("forecast_days", FORECAST_DAYS.to_string()),
        ];

        let response = self.client.get(&self.ecmwf_url).query(&query).send().await?;
        if !response.status().is_success() {
            return Err(WeatherError::Status(response.status().as_u16()));
        }
        let text = response.text().await?;
        parse_comparison(&text)
    }
}

/// Parse and validate a primary forecast response body
fn parse_forecast(body: &str) -> Result<Forecast, WeatherError> {
    let mut forecast: Forecast = serde_json::from_str(body)?;
    forecast.hourly.validate()?;
    forecast.daily.validate()?;
    // Only the comparison request may populate this
    forecast.ecmwf = None;
    Ok(forecast)
}

/// Parse and validate an ECMWF comparison response body
fn parse_comparison(body: &str) -> Result<ModelComparison, WeatherError> {
    let comparison: ModelComparison = serde_json::from_str(body)?;
    comparison.daily.validate()?;
    Ok(comparison)
}

/// Short description of a WMO weather code
///
/// See: https://open-meteo.com/en/docs#weathervariables
pub fn weather_code_description(code: u8) -> &'static str {
    match code {
        0 => "Clear sky",
        1 => "Mainly clear",
        2 => "Partly cloudy",
        3 => "Overcast",
        45 => "Foggy",
        48 => "Rime fog",
        51 => "Light drizzle",
        53 => "Moderate drizzle",
        55 => "Dense drizzle",
        56 => "Freezing drizzle",
        57 => "Heavy freezing drizzle",
        61 => "Slight rain",
        63 => "Moderate rain",
        65 => "Heavy rain",
        66 => "Light freezing rain",
        67 => "Heavy freezing rain",
        71 => "Slight snow",
        73 => "Moderate snow",
        75 => "Heavy snow",
        77 => "Snow grains",
        80 => "Slight rain showers",
        81 => "Moderate rain showers",
        82 => "Violent rain showers",
        85 => "Slight snow showers",
        86 => "Heavy snow showers",
        95 => "Thunderstorm",
        96 => "Thunderstorm with hail",
        99 => "Thunderstorm with heavy hail",
        _ => "Unknown",
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Sample valid Open-Meteo API response, trimmed to three hours and two days
    pub(crate) const VALID_RESPONSE: &str = r#"{
        "latitude": 43.62,
        "longitude": -116.2,
        "generationtime_ms": 0.123,
        "utc_offset_seconds": -21600,
        "timezone": "America/Boise",
        "timezone_abbreviation": "MDT",
        "elevation": 824.0,
        "current_units": {
            "time": "iso8601",
            "interval": "seconds",
            "temperature_2m": "°F",
            "relative_humidity_2m": "%",
            "apparent_temperature": "°F",
            "weather_code": "wmo code",
            "wind_speed_10m": "mp/h",
            "wind_direction_10m": "°",
            "precipitation": "inch",
            "is_day": ""
        },
        "current": {
            "time": "2024-07-15T14:00",
            "interval": 900,
            "temperature_2m": 91.4,
            "relative_humidity_2m": 18,
            "apparent_temperature": 88.0,
            "weather_code": 1,
            "wind_speed_10m": 7.5,
            "wind_direction_10m": 310,
            "precipitation": 0.0,
            "is_day": 1
        },
        "hourly_units": {
            "time": "iso8601",
            "temperature_2m": "°F",
            "weather_code": "wmo code",
            "precipitation_probability": "%",
            "wind_speed_10m": "mp/h",
            "is_day": ""
        },
        "hourly": {
            "time": ["2024-07-15T14:00", "2024-07-15T15:00", "2024-07-15T16:00"],
            "temperature_2m": [91.4, 93.0, 94.1],
            "weather_code": [1, 2, 3],
            "precipitation_probability": [0, 5, null],
            "wind_speed_10m": [7.5, 8.1, 9.0],
            "is_day": [1, 1, 1]
        },
        "daily_units": {
            "time": "iso8601",
            "weather_code": "wmo code",
            "temperature_2m_max": "°F",
            "temperature_2m_min": "°F",
            "precipitation_probability_max": "%",
            "precipitation_sum": "inch",
            "snowfall_sum": "inch",
            "sunrise": "iso8601",
            "sunset": "iso8601",
            "uv_index_max": "",
            "wind_speed_10m_max": "mp/h",
            "wind_gusts_10m_max": "mp/h"
        },
        "daily": {
            "time": ["2024-07-15", "2024-07-16"],
            "weather_code": [1, 95],
            "temperature_2m_max": [96.0, 88.5],
            "temperature_2m_min": [64.2, 61.0],
            "precipitation_probability_max": [3, 40],
            "precipitation_sum": [0.0, 0.12],
            "snowfall_sum": [0.0, 0.0],
            "sunrise": ["2024-07-15T06:14", "2024-07-16T06:15"],
            "sunset": ["2024-07-15T21:22", "2024-07-16T21:21"],
            "uv_index_max": [9.1, 7.4],
            "wind_speed_10m_max": [12.0, 18.3],
            "wind_gusts_10m_max": [22.1, 35.6]
        }
    }"#;

    pub(crate) const VALID_COMPARISON: &str = r#"{
        "latitude": 43.6,
        "longitude": -116.2,
        "daily_units": {
            "time": "iso8601",
            "weather_code": "wmo code",
            "temperature_2m_max": "°F",
            "temperature_2m_min": "°F"
        },
        "daily": {
            "time": ["2024-07-15", "2024-07-16"],
            "weather_code": [2, 3],
            "temperature_2m_max": [95.0, 81.0],
            "temperature_2m_min": [63.0, null]
        }
    }"#;

    #[test]
    fn test_parse_valid_response() {
        let forecast = parse_forecast(VALID_RESPONSE).expect("Failed to parse forecast");

        assert!((forecast.current.temperature_2m - 91.4).abs() < 0.01);
        assert!((forecast.current.apparent_temperature - 88.0).abs() < 0.01);
        assert_eq!(forecast.current.weather_code, 1);
        assert_eq!(forecast.current_units.temperature_2m, "°F");
        assert_eq!(forecast.utc_offset_seconds, -21600);
        assert_eq!(forecast.hourly.time.len(), 3);
        assert_eq!(forecast.hourly.precipitation_probability[2], None);
        assert_eq!(forecast.daily.time.len(), 2);
        assert_eq!(forecast.daily.uv_index_max[0], Some(9.1));
        assert!(forecast.ecmwf.is_none());
    }

    #[test]
    fn test_parse_valid_comparison() {
        let comparison = parse_comparison(VALID_COMPARISON).expect("Failed to parse comparison");

        assert_eq!(comparison.daily.temperature_2m_max, vec![Some(95.0), Some(81.0)]);
        assert_eq!(comparison.daily.temperature_2m_min[1], None);
    }

    #[test]
    fn test_parse_malformed_json() {
        let result = parse_forecast("{ invalid json }");
        assert!(matches!(result, Err(WeatherError::ParseError(_))));
    }

    #[test]
    fn test_parse_missing_fields() {
        let missing_daily = r#"{
            "latitude": 1.0,
            "longitude": 2.0,
            "current_units": {},
            "current": {
                "temperature_2m": 22.5,
                "relative_humidity_2m": 65,
                "apparent_temperature": 23.8,
                "weather_code": 2,
                "wind_speed_10m": 12.5
            }
        }"#;

        assert!(parse_forecast(missing_daily).is_err());
    }

    #[test]
    fn test_parse_hourly_with_inconsistent_array_lengths() {
        let hourly = HourlySeries {
            time: vec!["2024-07-15T00:00".to_string(), "2024-07-15T01:00".to_string()],
            temperature_2m: vec![15.0], // Only 1 element instead of 2
            weather_code: vec![0, 0],
            precipitation_probability: vec![Some(0.0), Some(0.0)],
            wind_speed_10m: vec![5.0, 5.0],
            is_day: vec![],
        };

        match hourly.validate() {
            Err(WeatherError::InconsistentSeries(series)) => assert_eq!(series, "hourly"),
            other => panic!("Expected InconsistentSeries error, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_daily_with_inconsistent_array_lengths() {
        let body = VALID_RESPONSE.replace(r#""uv_index_max": [9.1, 7.4]"#, r#""uv_index_max": [9.1]"#);

        let err = parse_forecast(&body).unwrap_err();
        assert!(err.to_string().contains("daily"));
    }

    #[test]
    fn test_primary_response_never_carries_comparison() {
        let body = VALID_RESPONSE.replacen(
            "\"latitude\": 43.62,",
            &format!("\"latitude\": 43.62, \"ecmwf\": {},", VALID_COMPARISON),
            1,
        );

        let forecast = parse_forecast(&body).expect("Failed to parse forecast");
        assert!(forecast.ecmwf.is_none());
    }

    #[test]
    fn test_forecast_serializes_with_open_meteo_names() {
        let mut forecast = parse_forecast(VALID_RESPONSE).unwrap();
        forecast.ecmwf = Some(parse_comparison(VALID_COMPARISON).unwrap());

        let json = serde_json::to_value(&forecast).unwrap();

        assert_eq!(json["current"]["temperature_2m"], 91.4);
        assert_eq!(json["daily"]["temperature_2m_max"][1], 88.5);
        assert_eq!(json["ecmwf"]["daily"]["temperature_2m_max"][0], 95.0);
    }

    #[test]
    fn test_missing_comparison_serializes_as_null() {
        let forecast = parse_forecast(VALID_RESPONSE).unwrap();
        let json = serde_json::to_value(&forecast).unwrap();
        assert!(json["ecmwf"].is_null());
    }

    #[test]
    fn test_weather_code_description() {
        assert_eq!(weather_code_description(0), "Clear sky");
        assert_eq!(weather_code_description(3), "Overcast");
        assert_eq!(weather_code_description(65), "Heavy rain");
        assert_eq!(weather_code_description(99), "Thunderstorm with heavy hail");
        assert_eq!(weather_code_description(42), "Unknown");
    }

    #[test]
    fn test_weather_client_default_urls() {
        let client = WeatherClient::default();
        assert_eq!(client.base_url, OPEN_METEO_BASE_URL);
        assert_eq!(client.ecmwf_url, OPEN_METEO_ECMWF_URL);
    }

    #[test]
    fn test_weather_client_with_base_urls() {
        let client = WeatherClient::new().with_base_urls("http://a/forecast", "http://a/ecmwf");
        assert_eq!(client.base_url, "http://a/forecast");
        assert_eq!(client.ecmwf_url, "http://a/ecmwf");
    }
}
