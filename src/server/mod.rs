//! HTTP surface of the weather backend
//!
//! Routes are served both at the root and under `/api`. The browser client
//! uses the `/weather/*` aliases. Unknown paths get a JSON 404.

mod error;
mod handlers;
mod state;

pub use error::ApiError;
pub use state::{AppState, Upstreams, DEFAULT_LOCATION_NAME};

use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tracing::{info, warn};

/// Builds the application router
pub fn router(state: AppState) -> Router {
    let routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/weather", get(handlers::weather))
        .route("/weather/forecast", get(handlers::weather))
        .route("/geocode", get(handlers::geocode))
        .route("/weather/geocode", get(handlers::geocode))
        .route("/alerts", get(handlers::alerts))
        .route("/weather/alerts", get(handlers::alerts))
        .route("/report", get(handlers::report))
        .route("/weather/report", get(handlers::report));

    Router::new()
        .merge(routes.clone())
        .nest("/api", routes)
        .fallback(handlers::not_found)
        .with_state(state)
}

/// Serves the router on an already-bound listener until Ctrl-C
pub async fn serve(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    info!(addr = %listener.local_addr()?, "Weather server listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutting down"),
        Err(e) => {
            warn!(error = %e, "Could not install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    }
}
