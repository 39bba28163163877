//! Skycast - backend for a personal weather dashboard
//!
//! Proxies Open-Meteo, the National Weather Service and an LLM provider
//! behind a small JSON API with short-lived in-memory caching.

use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use skycast::cli::{Cli, Config};
use skycast::server::{self, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Must run before parsing so env fallbacks see .env values
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("skycast=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_cli(&cli)?;

    if config.gemini_api_key.is_none() && config.deepinfra_api_key.is_none() {
        tracing::warn!("No report provider configured; /report will return the fallback text");
    }

    let state = AppState::from_config(&config)?;
    let listener = TcpListener::bind(config.addr).await?;
    server::serve(listener, state).await?;

    Ok(())
}
