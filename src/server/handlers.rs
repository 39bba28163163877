//! HTTP handlers
//!
//! Handlers only validate input and shape responses; caching and upstream
//! fan-out live in [`AppState`].

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::error::ApiError;
use super::state::{AppState, DEFAULT_LOCATION_NAME};
use crate::data::{AlertsData, Coordinates, Forecast, InputError, Place, Units};

/// Query parameters shared by the location endpoints
///
/// Everything is optional here so that a missing value surfaces as our own
/// 400 body. Handlers take the extractor result so that a query string serde
/// rejects, such as a repeated key, is also answered as JSON.
#[derive(Debug, Default, Deserialize)]
pub struct LocationQuery {
    pub lat: Option<String>,
    pub lon: Option<String>,
    pub units: Option<String>,
    pub name: Option<String>,
}

impl LocationQuery {
    fn coordinates(&self) -> Result<Coordinates, InputError> {
        Coordinates::parse(self.lat.as_deref(), self.lon.as_deref())
    }

    fn units(&self) -> Result<Units, InputError> {
        Units::parse(self.units.as_deref())
    }

    fn location_name(&self) -> &str {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_LOCATION_NAME)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct GeocodeQuery {
    pub q: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReportResponse {
    pub report: String,
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn not_found() -> (StatusCode, Json<Value>) {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "not found" })))
}

pub async fn weather(
    State(state): State<AppState>,
    query: Result<Query<LocationQuery>, QueryRejection>,
) -> Result<Json<Forecast>, ApiError> {
    let Query(query) = query?;
    let coords = query.coordinates()?;
    let units = query.units()?;
    Ok(Json(state.forecast(coords, units).await?))
}

pub async fn geocode(
    State(state): State<AppState>,
    query: Result<Query<GeocodeQuery>, QueryRejection>,
) -> Result<Json<Vec<Place>>, ApiError> {
    let Query(query) = query?;
    let q = query.q.ok_or(InputError::MissingParameter("q"))?;
    Ok(Json(state.places(&q).await?))
}

pub async fn alerts(
    State(state): State<AppState>,
    query: Result<Query<LocationQuery>, QueryRejection>,
) -> Result<Json<AlertsData>, ApiError> {
    let Query(query) = query?;
    let coords = query.coordinates()?;
    Ok(Json(state.alerts(coords).await))
}

pub async fn report(
    State(state): State<AppState>,
    query: Result<Query<LocationQuery>, QueryRejection>,
) -> Result<Json<ReportResponse>, ApiError> {
    let Query(query) = query?;
    let coords = query.coordinates()?;
    let units = query.units()?;
    let report = state
        .report(coords, units, query.location_name())
        .await
        .map_err(|e| ApiError::upstream("report", e))?;
    Ok(Json(ReportResponse { report }))
}
