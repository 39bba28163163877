//! National Weather Service alerts and text forecast
//!
//! The NWS only covers the United States, so a failed lookup is an expected
//! outcome rather than an error: every failure degrades to empty data.
//! The three requests run in sequence because each needs the previous
//! response (point → zone → alerts, then the point's forecast URL).

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::Coordinates;

/// Base URL for the NWS API
pub const NWS_BASE_URL: &str = "https://api.weather.gov";

/// The NWS rejects requests without an identifying User-Agent
const USER_AGENT: &str = "skycast/0.1 (personal weather dashboard)";

/// Number of text forecast periods kept (roughly two days)
const FORECAST_PERIODS: usize = 4;

/// Alerts and official forecast for a location
///
/// `forecast` is `None` when the location is outside NWS coverage or the
/// forecast could not be fetched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertsData {
    pub alerts: Vec<Alert>,
    pub forecast: Option<Vec<ForecastPeriod>>,
}

impl AlertsData {
    /// The "no data" result: no alerts and no forecast
    pub fn empty() -> Self {
        Self::default()
    }
}

/// An active weather alert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub event: String,
    pub severity: Option<String>,
    pub urgency: Option<String>,
    pub headline: Option<String>,
    pub description: Option<String>,
    pub instruction: Option<String>,
    pub expires: Option<String>,
}

/// One named period of the NWS text forecast ("Tonight", "Tuesday", ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastPeriod {
    pub name: String,
    pub temperature: Option<f64>,
    pub temperature_unit: Option<String>,
    pub wind_speed: Option<String>,
    pub wind_direction: Option<String>,
    pub short_forecast: String,
    pub detailed_forecast: Option<String>,
    pub is_daytime: bool,
}

// ── NWS response types ────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct PointResponse {
    properties: PointProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PointProperties {
    #[serde(default)]
    forecast_zone: Option<String>,
    #[serde(default)]
    forecast: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AlertCollection {
    #[serde(default)]
    features: Vec<AlertFeature>,
}

#[derive(Debug, Deserialize)]
struct AlertFeature {
    properties: AlertProperties,
}

#[derive(Debug, Deserialize)]
struct AlertProperties {
    id: String,
    event: String,
    #[serde(default)]
    severity: Option<String>,
    #[serde(default)]
    urgency: Option<String>,
    #[serde(default)]
    headline: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    instruction: Option<String>,
    #[serde(default)]
    expires: Option<String>,
}

impl From<AlertProperties> for Alert {
    fn from(p: AlertProperties) -> Self {
        Alert {
            id: p.id,
            event: p.event,
            severity: p.severity,
            urgency: p.urgency,
            headline: p.headline,
            description: p.description,
            instruction: p.instruction,
            expires: p.expires,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TextForecastResponse {
    properties: TextForecastProperties,
}

#[derive(Debug, Deserialize)]
struct TextForecastProperties {
    #[serde(default)]
    periods: Vec<ForecastPeriod>,
}

// ── Implementation ────────────────────────────────────────────────────

/// Client for the NWS API
#[derive(Debug, Clone)]
pub struct AlertsClient {
    client: Client,
    base_url: String,
}

impl Default for AlertsClient {
    fn default() -> Self {
        Self::new()
    }
}

impl AlertsClient {
    pub fn new() -> Self {
        Self::with_client(Client::new())
    }

    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            base_url: NWS_BASE_URL.to_string(),
        }
    }

    /// Point the client at a different NWS host
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Fetch active alerts and the text forecast for a location
    ///
    /// Never fails. An unknown point yields [`AlertsData::empty`]; a failure
    /// fetching alerts or the forecast only blanks that part.
    pub async fn fetch_alerts(&self, coords: Coordinates) -> AlertsData {
        let point_url = format!("{}/points/{:.4},{:.4}", self.base_url, coords.lat, coords.lon);
        let point: PointResponse = match self.get_json(&point_url).await {
            Some(point) => point,
            None => return AlertsData::empty(),
        };

        let zone = match point.properties.forecast_zone.as_deref().and_then(zone_id) {
            Some(zone) => zone.to_string(),
            None => {
                debug!(
                    operation = "alerts",
                    lat = coords.lat,
                    lon = coords.lon,
                    "NWS point has no forecast zone"
                );
                return AlertsData::empty();
            }
        };

        let alerts_url = format!("{}/alerts/active/zone/{}", self.base_url, zone);
        let alerts: Vec<Alert> = self
            .get_json::<AlertCollection>(&alerts_url)
            .await
            .map(|collection| {
                collection
                    .features
                    .into_iter()
                    .map(|feature| Alert::from(feature.properties))
                    .collect()
            })
            .unwrap_or_default();

        let forecast: Option<Vec<ForecastPeriod>> = match point.properties.forecast.as_deref() {
            Some(url) => self
                .get_json::<TextForecastResponse>(url)
                .await
                .map(|f| f.properties.periods.into_iter().take(FORECAST_PERIODS).collect()),
            None => None,
        };

        AlertsData { alerts, forecast }
    }

    /// GET a JSON document, logging and swallowing any failure
    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Option<T> {
        let response = self
            .client
            .get(url)
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/geo+json")
            .send()
            .await;

        let response = match response {
            Ok(r) => r,
            Err(e) => {
                warn!(operation = "alerts", url, error = %e, "NWS request failed");
                return None;
            }
        };

        if !response.status().is_success() {
            debug!(
                operation = "alerts",
                url,
                status = response.status().as_u16(),
                "NWS returned non-success"
            );
            return None;
        }

        match response.json::<T>().await {
            Ok(body) => Some(body),
            Err(e) => {
                warn!(operation = "alerts", url, error = %e, "NWS response parse error");
                None
            }
        }
    }
}

/// Last path segment of a zone URL, e.g. `.../zones/forecast/IDZ014` → `IDZ014`
fn zone_id(zone_url: &str) -> Option<&str> {
    zone_url
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|id| !id.is_empty())
}
