//! Shared server state and the cache-in-front-of-upstream lookups
//!
//! Each lookup checks its cache, goes upstream on a miss and stores the
//! result. Failed lookups are never cached. Concurrent misses for the same
//! key are not coalesced.

use std::sync::Arc;

use chrono::Duration;
use futures::future::join;
use reqwest::Client;
use tracing::debug;

use crate::cache::{geo_key, query_key, Clock, SystemClock, TtlCache};
use crate::cli::Config;
use crate::data::geocode::MIN_QUERY_LEN;
use crate::data::{
    AlertsClient, AlertsData, Coordinates, DeepInfraGenerator, Forecast, GeocodeClient,
    GeocodeError, GeminiGenerator, Place, ReportGenerator, Units, WeatherClient, WeatherError,
};

const WEATHER_TTL_MINUTES: i64 = 5;
const GEOCODE_TTL_MINUTES: i64 = 60;
const ALERTS_TTL_MINUTES: i64 = 5;
const REPORT_TTL_MINUTES: i64 = 15;

/// Location name used in reports when the client sends none
pub const DEFAULT_LOCATION_NAME: &str = "this location";

/// Upstream clients the server fans out to
#[derive(Debug, Clone, Default)]
pub struct Upstreams {
    pub weather: WeatherClient,
    pub geocode: GeocodeClient,
    pub alerts: AlertsClient,
    pub reports: ReportGenerator,
}

impl Upstreams {
    /// Builds clients for the configured endpoints, sharing one HTTP client
    ///
    /// Report providers are only registered when their API key is set;
    /// Gemini is tried before DeepInfra.
    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(concat!("skycast/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let urls = &config.upstreams;

        let mut reports = ReportGenerator::default();
        if let Some(key) = &config.gemini_api_key {
            reports = reports.with_provider(Arc::new(
                GeminiGenerator::new(client.clone(), key.clone()).with_base_url(urls.gemini.clone()),
            ));
        }
        if let Some(key) = &config.deepinfra_api_key {
            reports = reports.with_provider(Arc::new(
                DeepInfraGenerator::new(client.clone(), key.clone())
                    .with_base_url(urls.deepinfra.clone()),
            ));
        }

        Ok(Self {
            weather: WeatherClient::with_client(client.clone())
                .with_base_urls(urls.open_meteo.clone(), urls.open_meteo_ecmwf.clone()),
            geocode: GeocodeClient::with_client(client.clone()).with_base_url(urls.geocoding.clone()),
            alerts: AlertsClient::with_client(client).with_base_url(urls.nws.clone()),
            reports,
        })
    }
}

/// State shared by all request handlers
#[derive(Clone)]
pub struct AppState {
    upstreams: Arc<Upstreams>,
    weather_cache: Arc<TtlCache<Forecast>>,
    geocode_cache: Arc<TtlCache<Vec<Place>>>,
    alerts_cache: Arc<TtlCache<AlertsData>>,
    report_cache: Arc<TtlCache<String>>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("upstreams", &self.upstreams)
            .field("weather_cache", &self.weather_cache)
            .field("geocode_cache", &self.geocode_cache)
            .field("alerts_cache", &self.alerts_cache)
            .field("report_cache", &self.report_cache)
            .finish()
    }
}

impl AppState {
    pub fn new(upstreams: Upstreams) -> Self {
        Self::with_clock(upstreams, Arc::new(SystemClock))
    }

    /// Creates state whose caches and report timestamps follow `clock`
    pub fn with_clock(upstreams: Upstreams, clock: Arc<dyn Clock>) -> Self {
        Self {
            upstreams: Arc::new(upstreams),
            weather_cache: Arc::new(TtlCache::with_clock(
                Duration::minutes(WEATHER_TTL_MINUTES),
                clock.clone(),
            )),
            geocode_cache: Arc::new(TtlCache::with_clock(
                Duration::minutes(GEOCODE_TTL_MINUTES),
                clock.clone(),
            )),
            alerts_cache: Arc::new(TtlCache::with_clock(
                Duration::minutes(ALERTS_TTL_MINUTES),
                clock.clone(),
            )),
            report_cache: Arc::new(TtlCache::with_clock(
                Duration::minutes(REPORT_TTL_MINUTES),
                clock.clone(),
            )),
            clock,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        Ok(Self::new(Upstreams::from_config(config)?))
    }

    /// Forecast for a location, cached per rounded coordinates and units
    pub async fn forecast(&self, coords: Coordinates, units: Units) -> Result<Forecast, WeatherError> {
        let key = geo_key(coords.lat, coords.lon, &format!("weather:{}", units.as_str()));
        if let Some(forecast) = self.weather_cache.get(&key) {
            debug!(key, "Weather cache hit");
            return Ok(forecast);
        }

        let forecast = self.upstreams.weather.fetch_forecast(coords, units).await?;
        self.weather_cache.set(key, forecast.clone());
        Ok(forecast)
    }

    /// Places matching a free-text query
    ///
    /// Queries shorter than two characters return an empty list and touch
    /// neither the cache nor the network.
    pub async fn places(&self, query: &str) -> Result<Vec<Place>, GeocodeError> {
        if query.trim().chars().count() < MIN_QUERY_LEN {
            return Ok(Vec::new());
        }

        let key = query_key("geo", query);
        if let Some(places) = self.geocode_cache.get(&key) {
            debug!(key, "Geocode cache hit");
            return Ok(places);
        }

        let places = self.upstreams.geocode.search(query).await?;
        self.geocode_cache.set(key, places.clone());
        Ok(places)
    }

    /// NWS alerts and text forecast; never fails
    pub async fn alerts(&self, coords: Coordinates) -> AlertsData {
        let key = geo_key(coords.lat, coords.lon, "alerts");
        if let Some(alerts) = self.alerts_cache.get(&key) {
            debug!(key, "Alerts cache hit");
            return alerts;
        }

        let alerts = self.upstreams.alerts.fetch_alerts(coords).await;
        self.alerts_cache.set(key, alerts.clone());
        alerts
    }

    /// AI narrative for a location
    ///
    /// On a miss the forecast and alerts are resolved concurrently through
    /// their own caches, so a recent dashboard load is reused. Only a
    /// forecast failure is an error; provider failures yield the fallback
    /// text, which is cached like any other report.
    pub async fn report(
        &self,
        coords: Coordinates,
        units: Units,
        location_name: &str,
    ) -> Result<String, WeatherError> {
        let key = geo_key(coords.lat, coords.lon, &format!("report:{}", units.as_str()));
        if let Some(report) = self.report_cache.get(&key) {
            debug!(key, "Report cache hit");
            return Ok(report);
        }

        let (forecast, alerts) = join(self.forecast(coords, units), self.alerts(coords)).await;
        let forecast = forecast?;

        let report = self
            .upstreams
            .reports
            .report(&forecast, &alerts, location_name, self.clock.now())
            .await;
        self.report_cache.set(key, report.clone());
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::UpstreamUrls;

    #[test]
    fn test_from_config_registers_keyed_providers_only() {
        let config = Config {
            gemini_api_key: None,
            deepinfra_api_key: Some("di-key".to_string()),
            ..Config::default()
        };
        let upstreams = Upstreams::from_config(&config).unwrap();
        assert_eq!(upstreams.reports.provider_count(), 1);

        let config = Config {
            gemini_api_key: Some("g-key".to_string()),
            deepinfra_api_key: Some("di-key".to_string()),
            upstreams: UpstreamUrls::default(),
            ..Config::default()
        };
        let upstreams = Upstreams::from_config(&config).unwrap();
        assert_eq!(upstreams.reports.provider_count(), 2);
    }

    #[test]
    fn test_from_config_without_keys() {
        let upstreams = Upstreams::from_config(&Config::default()).unwrap();
        assert_eq!(upstreams.reports.provider_count(), 0);
    }

    #[tokio::test]
    async fn test_short_query_skips_cache_and_network() {
        let upstreams = Upstreams {
            geocode: GeocodeClient::new().with_base_url("http://127.0.0.1:9/search"),
            ..Upstreams::default()
        };
        let state = AppState::new(upstreams);

        assert!(state.places(" x ").await.unwrap().is_empty());
        assert!(state.geocode_cache.is_empty());
    }
}
