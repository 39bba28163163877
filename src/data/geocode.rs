//! Place search via the Open-Meteo geocoding API

use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Base URL for the Open-Meteo geocoding API
pub const GEOCODING_BASE_URL: &str = "https://geocoding-api.open-meteo.com/v1/search";

/// Maximum number of places returned for one query
pub const MAX_RESULTS: usize = 8;

/// Queries shorter than this (after trimming) never reach the network
pub const MIN_QUERY_LEN: usize = 2;

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Geocoding error: {0}")]
    Status(u16),
}

/// A place matching a search query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Place {
    pub id: i64,
    pub name: String,
    /// First-level administrative area (state, province)
    pub admin1: String,
    pub country: String,
    pub country_code: String,
    pub lat: f64,
    pub lon: f64,
    /// Display label, e.g. "Boise, Idaho, United States"
    pub label: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Option<Vec<SearchResult>>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    id: i64,
    name: String,
    latitude: f64,
    longitude: f64,
    #[serde(default)]
    admin1: Option<String>,
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    country_code: Option<String>,
}

impl From<SearchResult> for Place {
    fn from(r: SearchResult) -> Self {
        let admin1 = r.admin1.unwrap_or_default();
        let country = r.country.unwrap_or_default();
        let label = [r.name.as_str(), admin1.as_str(), country.as_str()]
            .iter()
            .filter(|part| !part.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(", ");

        Place {
            id: r.id,
            name: r.name,
            admin1,
            country,
            country_code: r.country_code.unwrap_or_default(),
            lat: r.latitude,
            lon: r.longitude,
            label,
        }
    }
}

/// Client for the Open-Meteo geocoding API
#[derive(Debug, Clone)]
pub struct GeocodeClient {
    client: Client,
    base_url: String,
}

impl Default for GeocodeClient {
    fn default() -> Self {
        Self::new()
    }
}

impl GeocodeClient {
    pub fn new() -> Self {
        Self::with_client(Client::new())
    }

    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            base_url: GEOCODING_BASE_URL.to_string(),
        }
    }

    /// Point the client at a different search endpoint
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Search for places by free text
    ///
    /// Returns at most [`MAX_RESULTS`] places. Queries shorter than
    /// [`MIN_QUERY_LEN`] characters return an empty list without a request.
    pub async fn search(&self, query: &str) -> Result<Vec<Place>, GeocodeError> {
        let query = query.trim();
        if query.chars().count() < MIN_QUERY_LEN {
            return Ok(Vec::new());
        }

        debug!(query, "Searching places");

        let count = MAX_RESULTS.to_string();
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("name", query),
                ("count", count.as_str()),
                ("language", "en"),
                ("format", "json"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GeocodeError::Status(response.status().as_u16()));
        }

        let body: SearchResponse = response.json().await?;
        Ok(normalize(body))
    }
}

fn normalize(body: SearchResponse) -> Vec<Place> {
    body.results
        .unwrap_or_default()
        .into_iter()
        .take(MAX_RESULTS)
        .map(Place::from)
        .collect()
}
