//! Command-line and environment configuration for the Skycast server
//!
//! Every option can be given as a flag or through the environment (a `.env`
//! file is loaded before parsing). Parsed arguments are validated into a
//! [`Config`] before the server starts.

use std::net::{IpAddr, SocketAddr};

use clap::Parser;
use thiserror::Error;
use url::Url;

use crate::data::alerts::NWS_BASE_URL;
use crate::data::geocode::GEOCODING_BASE_URL;
use crate::data::report::{DEEPINFRA_BASE_URL, GEMINI_BASE_URL};
use crate::data::weather::{OPEN_METEO_BASE_URL, OPEN_METEO_ECMWF_URL};

/// Default listening port
pub const DEFAULT_PORT: u16 = 3001;

/// Error types for configuration validation
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    /// Port 0 would bind a random port
    #[error("Invalid port: 0. Choose a port between 1 and 65535")]
    InvalidPort,

    /// The host is not an IP address
    #[error("Invalid host: '{0}'. Expected an IP address such as 0.0.0.0 or 127.0.0.1")]
    InvalidHost(String),

    /// An upstream base URL could not be parsed
    #[error("Invalid URL for {name}: '{value}'")]
    InvalidUrl { name: &'static str, value: String },
}

/// Skycast - weather dashboard backend
#[derive(Parser, Debug, Clone)]
#[command(name = "skycast")]
#[command(about = "Weather dashboard backend: forecasts, alerts, geocoding and AI weather reports")]
#[command(version)]
pub struct Cli {
    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Address to bind
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Google Gemini API key (primary report provider)
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub gemini_api_key: Option<String>,

    /// DeepInfra API key (fallback report provider)
    #[arg(long, env = "DEEPINFRA_API_KEY", hide_env_values = true)]
    pub deepinfra_api_key: Option<String>,

    /// Open-Meteo forecast endpoint
    #[arg(long, env = "OPEN_METEO_URL", default_value = OPEN_METEO_BASE_URL)]
    pub open_meteo_url: String,

    /// Open-Meteo ECMWF endpoint used for model comparison
    #[arg(long, env = "OPEN_METEO_ECMWF_URL", default_value = OPEN_METEO_ECMWF_URL)]
    pub open_meteo_ecmwf_url: String,

    /// Open-Meteo geocoding endpoint
    #[arg(long, env = "GEOCODING_URL", default_value = GEOCODING_BASE_URL)]
    pub geocoding_url: String,

    /// National Weather Service API host
    #[arg(long, env = "NWS_URL", default_value = NWS_BASE_URL)]
    pub nws_url: String,

    /// Gemini API base URL
    #[arg(long, env = "GEMINI_URL", default_value = GEMINI_BASE_URL)]
    pub gemini_url: String,

    /// DeepInfra chat completions endpoint
    #[arg(long, env = "DEEPINFRA_URL", default_value = DEEPINFRA_BASE_URL)]
    pub deepinfra_url: String,
}

/// Upstream endpoints, overridable for testing or self-hosted mirrors
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamUrls {
    pub open_meteo: String,
    pub open_meteo_ecmwf: String,
    pub geocoding: String,
    pub nws: String,
    pub gemini: String,
    pub deepinfra: String,
}

impl Default for UpstreamUrls {
    fn default() -> Self {
        Self {
            open_meteo: OPEN_METEO_BASE_URL.to_string(),
            open_meteo_ecmwf: OPEN_METEO_ECMWF_URL.to_string(),
            geocoding: GEOCODING_BASE_URL.to_string(),
            nws: NWS_BASE_URL.to_string(),
            gemini: GEMINI_BASE_URL.to_string(),
            deepinfra: DEEPINFRA_BASE_URL.to_string(),
        }
    }
}

/// Validated server configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Socket address the server binds to
    pub addr: SocketAddr,
    pub gemini_api_key: Option<String>,
    pub deepinfra_api_key: Option<String>,
    pub upstreams: UpstreamUrls,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            gemini_api_key: None,
            deepinfra_api_key: None,
            upstreams: UpstreamUrls::default(),
        }
    }
}

impl Config {
    /// Validates parsed CLI arguments into a Config.
    ///
    /// Blank API keys are treated as absent so that an empty `KEY=` line in a
    /// `.env` file disables the provider instead of sending empty credentials.
    pub fn from_cli(cli: &Cli) -> Result<Self, ConfigError> {
        if cli.port == 0 {
            return Err(ConfigError::InvalidPort);
        }

        let host: IpAddr = cli
            .host
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidHost(cli.host.clone()))?;

        let upstreams = UpstreamUrls {
            open_meteo: validate_url("OPEN_METEO_URL", &cli.open_meteo_url)?,
            open_meteo_ecmwf: validate_url("OPEN_METEO_ECMWF_URL", &cli.open_meteo_ecmwf_url)?,
            geocoding: validate_url("GEOCODING_URL", &cli.geocoding_url)?,
            nws: validate_url("NWS_URL", &cli.nws_url)?,
            gemini: validate_url("GEMINI_URL", &cli.gemini_url)?,
            deepinfra: validate_url("DEEPINFRA_URL", &cli.deepinfra_url)?,
        };

        Ok(Config {
            addr: SocketAddr::new(host, cli.port),
            gemini_api_key: non_blank(cli.gemini_api_key.as_deref()),
            deepinfra_api_key: non_blank(cli.deepinfra_api_key.as_deref()),
            upstreams,
        })
    }
}

/// Checks that a base URL is an absolute http(s) URL
fn validate_url(name: &'static str, value: &str) -> Result<String, ConfigError> {
    let value = value.trim();
    match Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(value.to_string()),
        _ => Err(ConfigError::InvalidUrl {
            name,
            value: value.to_string(),
        }),
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_cli() -> Cli {
        Cli {
            port: DEFAULT_PORT,
            host: "0.0.0.0".to_string(),
            gemini_api_key: None,
            deepinfra_api_key: None,
            open_meteo_url: OPEN_METEO_BASE_URL.to_string(),
            open_meteo_ecmwf_url: OPEN_METEO_ECMWF_URL.to_string(),
            geocoding_url: GEOCODING_BASE_URL.to_string(),
            nws_url: NWS_BASE_URL.to_string(),
            gemini_url: GEMINI_BASE_URL.to_string(),
            deepinfra_url: DEEPINFRA_BASE_URL.to_string(),
        }
    }

    #[test]
    fn test_from_cli_defaults() {
        let config = Config::from_cli(&base_cli()).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_cli_parse_explicit_flags() {
        let cli = Cli::parse_from([
            "skycast",
            "--port",
            "8080",
            "--host",
            "127.0.0.1",
            "--gemini-api-key",
            "g-key",
        ]);
        assert_eq!(cli.port, 8080);
        assert_eq!(cli.host, "127.0.0.1");
        assert_eq!(cli.gemini_api_key.as_deref(), Some("g-key"));

        let config = Config::from_cli(&cli).unwrap();
        assert_eq!(config.addr, "127.0.0.1:8080".parse().unwrap());
    }

    #[test]
    fn test_cli_rejects_non_numeric_port() {
        assert!(Cli::try_parse_from(["skycast", "--port", "abc"]).is_err());
        assert!(Cli::try_parse_from(["skycast", "--port", "70000"]).is_err());
    }

    #[test]
    fn test_from_cli_rejects_port_zero() {
        let cli = Cli {
            port: 0,
            ..base_cli()
        };
        assert_eq!(Config::from_cli(&cli), Err(ConfigError::InvalidPort));
    }

    #[test]
    fn test_from_cli_rejects_bad_host() {
        let cli = Cli {
            host: "localhost:3001".to_string(),
            ..base_cli()
        };
        let err = Config::from_cli(&cli).unwrap_err();
        assert!(err.to_string().contains("Invalid host"));
    }

    #[test]
    fn test_from_cli_accepts_ipv6_host() {
        let cli = Cli {
            host: "::1".to_string(),
            ..base_cli()
        };
        let config = Config::from_cli(&cli).unwrap();
        assert!(config.addr.is_ipv6());
    }

    #[test]
    fn test_from_cli_rejects_bad_url() {
        let cli = Cli {
            nws_url: "api.weather.gov".to_string(),
            ..base_cli()
        };
        assert_eq!(
            Config::from_cli(&cli),
            Err(ConfigError::InvalidUrl {
                name: "NWS_URL",
                value: "api.weather.gov".to_string()
            })
        );

        let cli = Cli {
            gemini_url: "ftp://example.com".to_string(),
            ..base_cli()
        };
        assert!(Config::from_cli(&cli).is_err());
    }

    #[test]
    fn test_from_cli_blank_keys_are_absent() {
        let cli = Cli {
            gemini_api_key: Some("   ".to_string()),
            deepinfra_api_key: Some(" di-key ".to_string()),
            ..base_cli()
        };
        let config = Config::from_cli(&cli).unwrap();
        assert!(config.gemini_api_key.is_none());
        assert_eq!(config.deepinfra_api_key.as_deref(), Some("di-key"));
    }

    #[test]
    fn test_from_cli_url_overrides() {
        let cli = Cli {
            open_meteo_url: "http://127.0.0.1:9000/v1/forecast".to_string(),
            ..base_cli()
        };
        let config = Config::from_cli(&cli).unwrap();
        assert_eq!(config.upstreams.open_meteo, "http://127.0.0.1:9000/v1/forecast");
        assert_eq!(config.upstreams.nws, NWS_BASE_URL);
    }
}
