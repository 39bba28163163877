//! Mapping of failures to HTTP responses

use axum::extract::rejection::QueryRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::data::{GeocodeError, InputError, WeatherError};

/// Errors returned by request handlers
///
/// Every variant renders as `{"error": message}`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed or missing client input; nothing was sent upstream
    #[error(transparent)]
    BadRequest(#[from] InputError),

    /// The query string could not be deserialized, e.g. a repeated key
    #[error("{}", .0.body_text())]
    InvalidQuery(#[from] QueryRejection),

    /// An essential upstream (forecast or geocoding) failed
    #[error("{message}")]
    Upstream {
        operation: &'static str,
        message: String,
    },
}

impl ApiError {
    pub fn upstream(operation: &'static str, err: impl std::fmt::Display) -> Self {
        ApiError::Upstream {
            operation,
            message: err.to_string(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::InvalidQuery(_) => StatusCode::BAD_REQUEST,
            ApiError::Upstream { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<WeatherError> for ApiError {
    fn from(err: WeatherError) -> Self {
        ApiError::upstream("weather", err)
    }
}

impl From<GeocodeError> for ApiError {
    fn from(err: GeocodeError) -> Self {
        ApiError::upstream("geocode", err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Upstream { operation, message } = &self {
            error!(operation, error = %message, "Upstream request failed");
        }
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_errors_are_bad_requests() {
        let err = ApiError::from(InputError::MissingCoordinates);
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "lat and lon required");
    }

    #[test]
    fn test_upstream_errors_are_internal() {
        let err = ApiError::from(WeatherError::Status(503));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "Open-Meteo error: 503");
        assert!(matches!(err, ApiError::Upstream { operation: "weather", .. }));
    }

    #[test]
    fn test_geocode_errors_carry_operation() {
        let err = ApiError::from(GeocodeError::Status(502));
        assert!(matches!(err, ApiError::Upstream { operation: "geocode", .. }));
    }

    #[test]
    fn test_query_rejections_are_bad_requests() {
        use axum::extract::Query;

        #[derive(Debug, serde::Deserialize)]
        struct Params {
            #[allow(dead_code)]
            lat: Option<String>,
        }

        let uri: axum::http::Uri = "/weather?lat=1&lat=2".parse().unwrap();
        let rejection = Query::<Params>::try_from_uri(&uri).unwrap_err();
        let err = ApiError::from(rejection);
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(err.to_string().contains("duplicate field"), "{}", err);
    }

    #[test]
    fn test_response_status() {
        let response = ApiError::from(InputError::MissingParameter("q")).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
