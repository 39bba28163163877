//! AI-generated weather narrative
//!
//! A prompt is built from the forecast and alerts, then offered to an
//! ordered list of text-generation providers. The first provider that
//! answers wins; if none do, a fixed placeholder is returned. Provider
//! failures are logged and never reach the caller.

use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, Offset, Timelike, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use super::alerts::AlertsData;
use super::weather::{weather_code_description, Forecast};

/// Returned when no provider produced a report
pub const FALLBACK_REPORT: &str =
    "AI weather report is temporarily unavailable. Check the forecast data below.";

/// Base URL for the Gemini API
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// DeepInfra's OpenAI-compatible chat completions endpoint
pub const DEEPINFRA_BASE_URL: &str = "https://api.deepinfra.com/v1/openai/chat/completions";

const GEMINI_MODEL: &str = "gemini-2.0-flash";
const DEEPINFRA_MODEL: &str = "meta-llama/Llama-3.3-70B-Instruct-Turbo";
const DEEPINFRA_MAX_TOKENS: u32 = 300;
const DEEPINFRA_TEMPERATURE: f64 = 0.7;

/// Hours of hourly trend included in the prompt
const TREND_HOURS: usize = 12;

/// Days of daily outlook included in the prompt
const OUTLOOK_DAYS: usize = 7;

/// Daily highs differing by at least this many degrees are called out
const MODEL_DISAGREEMENT_DEGREES: f64 = 5.0;

/// Errors from a single text-generation provider
#[derive(Debug, Error)]
pub enum ReportError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// Provider answered with a non-success status
    #[error("{provider} error: {status}")]
    Status { provider: &'static str, status: u16 },

    /// Provider answered but without any text
    #[error("{0} returned no text")]
    EmptyResponse(&'static str),
}

/// A text-generation provider
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Provider name used in logs
    fn name(&self) -> &'static str;

    /// Generate text for a prompt
    async fn generate(&self, prompt: &str) -> Result<String, ReportError>;
}

// ── Prompt ────────────────────────────────────────────────────────────

/// Build the report prompt
///
/// Deterministic for a given input: the only time dependency is `now`,
/// which is shifted into the location's local time using the forecast's
/// UTC offset.
pub fn build_prompt(
    forecast: &Forecast,
    alerts: &AlertsData,
    location_name: &str,
    now: DateTime<Utc>,
) -> String {
    let offset = FixedOffset::east_opt(forecast.utc_offset_seconds).unwrap_or_else(|| Utc.fix());
    let local = now.with_timezone(&offset);
    let time_of_day = match local.hour() {
        0..=11 => "morning",
        12..=16 => "afternoon",
        _ => "evening",
    };

    let c = &forecast.current;
    let units = &forecast.current_units;
    let temp_unit = units.temperature_2m.as_str();

    let mut prompt = String::new();
    let _ = writeln!(
        prompt,
        "You are a concise, friendly weather reporter. Write a brief weather narrative for {}.",
        location_name
    );
    let _ = writeln!(
        prompt,
        "It is {} {} in {}.",
        local.format("%A"),
        time_of_day,
        local.format("%B")
    );

    prompt.push_str("\nCURRENT CONDITIONS:\n");
    let _ = writeln!(prompt, "- Temperature: {}{}", c.temperature_2m, temp_unit);
    let _ = writeln!(
        prompt,
        "- Feels like: {}{}",
        c.apparent_temperature, units.apparent_temperature
    );
    let _ = writeln!(prompt, "- Humidity: {}%", c.relative_humidity_2m);
    let _ = writeln!(prompt, "- Wind: {} {}", c.wind_speed_10m, units.wind_speed_10m);
    let _ = writeln!(
        prompt,
        "- Conditions: {} (weather code {})",
        weather_code_description(c.weather_code),
        c.weather_code
    );
    let _ = writeln!(prompt, "- Precipitation: {} {}", c.precipitation, units.precipitation);

    prompt.push_str("\nNEXT 12 HOURS TREND:\n");
    let hourly = &forecast.hourly;
    for (i, time) in hourly.time.iter().enumerate().take(TREND_HOURS) {
        let _ = writeln!(
            prompt,
            "- {} → {}{}, precip chance {}",
            hour_label(time),
            hourly.temperature_2m[i],
            temp_unit,
            percent(hourly.precipitation_probability[i])
        );
    }

    prompt.push_str("\n7-DAY OUTLOOK:\n");
    let daily = &forecast.daily;
    for (i, date) in daily.time.iter().enumerate().take(OUTLOOK_DAYS) {
        let _ = writeln!(
            prompt,
            "- {}: {}, H {}° / L {}°, precip {}, UV {}",
            weekday_label(date),
            weather_code_description(daily.weather_code[i]),
            daily.temperature_2m_max[i],
            daily.temperature_2m_min[i],
            percent(daily.precipitation_probability_max[i]),
            daily.uv_index_max[i].map_or_else(|| "n/a".to_string(), |uv| uv.to_string())
        );
    }

    if !alerts.alerts.is_empty() {
        prompt.push_str("\nACTIVE WEATHER ALERTS:\n");
        for alert in &alerts.alerts {
            match alert.headline.as_deref() {
                Some(headline) => {
                    let _ = writeln!(prompt, "- {}: {}", alert.event, headline);
                }
                None => {
                    let _ = writeln!(prompt, "- {}", alert.event);
                }
            }
        }
    }

    if let Some(periods) = alerts.forecast.as_ref().filter(|p| !p.is_empty()) {
        prompt.push_str("\nNWS OFFICIAL FORECAST:\n");
        for period in periods {
            let temperature = period
                .temperature
                .map(|t| format!(", {}°{}", t, period.temperature_unit.as_deref().unwrap_or("")))
                .unwrap_or_default();
            let _ = writeln!(prompt, "- {}: {}{}", period.name, period.short_forecast, temperature);
        }
    }

    let disagreements = model_disagreements(forecast);
    if !disagreements.is_empty() {
        prompt.push_str("\nMODEL DISAGREEMENT (ECMWF vs primary forecast, treat as uncertain):\n");
        for line in &disagreements {
            let _ = writeln!(prompt, "- {}", line);
        }
    }

    prompt.push_str(
        "\nRULES:\n\
         - Keep it to 3-5 sentences max\n\
         - Be conversational and practical (mention driving conditions, outdoor plans, etc.)\n\
         - If there are alerts, mention them prominently\n\
         - If the models disagree, mention the uncertainty briefly\n\
         - Don't list raw numbers, weave them naturally into prose\n\
         - Don't use emoji or markdown formatting\n\
         - Don't sign off or use a greeting",
    );

    prompt
}

/// Days in the outlook where the ECMWF high differs notably from the primary
fn model_disagreements(forecast: &Forecast) -> Vec<String> {
    let Some(ecmwf) = forecast.ecmwf.as_ref() else {
        return Vec::new();
    };

    forecast
        .daily
        .time
        .iter()
        .zip(&forecast.daily.temperature_2m_max)
        .take(OUTLOOK_DAYS)
        .filter_map(|(date, primary_high)| {
            let idx = ecmwf.daily.time.iter().position(|d| d == date)?;
            let ecmwf_high = (*ecmwf.daily.temperature_2m_max.get(idx)?)?;
            ((primary_high - ecmwf_high).abs() >= MODEL_DISAGREEMENT_DEGREES).then(|| {
                format!(
                    "{}: primary high {}°, ECMWF high {}°",
                    weekday_label(date),
                    primary_high,
                    ecmwf_high
                )
            })
        })
        .collect()
}

/// "2024-07-15T14:00" → "14:00"
fn hour_label(time: &str) -> String {
    NaiveDateTime::parse_from_str(time, "%Y-%m-%dT%H:%M")
        .map(|t| format!("{}:00", t.hour()))
        .unwrap_or_else(|_| time.to_string())
}

/// "2024-07-15" → "Mon"
fn weekday_label(date: &str) -> String {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map(|d| d.weekday().to_string())
        .unwrap_or_else(|_| date.to_string())
}

fn percent(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{}%", v))
}

// ── Providers ─────────────────────────────────────────────────────────

/// Google Gemini `generateContent`
#[derive(Debug, Clone)]
pub struct GeminiGenerator {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiGenerator {
    pub fn new(client: Client, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            base_url: GEMINI_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[derive(Debug, Serialize)]
struct GeminiRequest<'a> {
    contents: [GeminiContent<'a>; 1],
}

#[derive(Debug, Serialize)]
struct GeminiContent<'a> {
    parts: [GeminiPart<'a>; 1],
}

#[derive(Debug, Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiCandidateContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidateContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    #[serde(default)]
    text: Option<String>,
}

impl GeminiResponse {
    fn text(self) -> Option<String> {
        let content = self.candidates.into_iter().next()?.content?;
        let text: String = content.parts.into_iter().filter_map(|p| p.text).collect();
        Some(text)
    }
}

#[async_trait]
impl TextGenerator for GeminiGenerator {
    fn name(&self) -> &'static str {
        "Gemini"
    }

    async fn generate(&self, prompt: &str) -> Result<String, ReportError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, GEMINI_MODEL);
        let body = GeminiRequest {
            contents: [GeminiContent {
                parts: [GeminiPart { text: prompt }],
            }],
        };

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ReportError::Status {
                provider: self.name(),
                status: response.status().as_u16(),
            });
        }

        let body: GeminiResponse = response.json().await?;
        body.text().ok_or(ReportError::EmptyResponse(self.name()))
    }
}

/// DeepInfra chat completions (OpenAI-compatible)
#[derive(Debug, Clone)]
pub struct DeepInfraGenerator {
    client: Client,
    api_key: String,
    base_url: String,
}

impl DeepInfraGenerator {
    pub fn new(client: Client, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            base_url: DEEPINFRA_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    max_tokens: u32,
    temperature: f64,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl TextGenerator for DeepInfraGenerator {
    fn name(&self) -> &'static str {
        "DeepInfra"
    }

    async fn generate(&self, prompt: &str) -> Result<String, ReportError> {
        let body = ChatRequest {
            model: DEEPINFRA_MODEL,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: DEEPINFRA_MAX_TOKENS,
            temperature: DEEPINFRA_TEMPERATURE,
        };

        let response = self
            .client
            .post(&self.base_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ReportError::Status {
                provider: self.name(),
                status: response.status().as_u16(),
            });
        }

        let body: ChatResponse = response.json().await?;
        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(ReportError::EmptyResponse(self.name()))
    }
}

// ── Fallback chain ────────────────────────────────────────────────────

/// Ordered list of providers tried one after another
#[derive(Clone, Default)]
pub struct ReportGenerator {
    providers: Vec<Arc<dyn TextGenerator>>,
}

impl std::fmt::Debug for ReportGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.providers.iter().map(|p| p.name()).collect();
        f.debug_struct("ReportGenerator").field("providers", &names).finish()
    }
}

impl ReportGenerator {
    /// Append a provider to the end of the chain
    pub fn with_provider(mut self, provider: Arc<dyn TextGenerator>) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    /// Try each provider in order, returning the first non-empty text
    ///
    /// Falls back to [`FALLBACK_REPORT`] when every provider fails or none
    /// is configured. Each provider is tried once.
    pub async fn generate(&self, prompt: &str) -> String {
        for provider in &self.providers {
            match provider.generate(prompt).await {
                Ok(text) if !text.trim().is_empty() => {
                    info!(provider = provider.name(), "Generated weather report");
                    return text.trim().to_string();
                }
                Ok(_) => {
                    warn!(provider = provider.name(), "Provider returned an empty report");
                }
                Err(e) => {
                    warn!(provider = provider.name(), error = %e, "Report generation failed");
                }
            }
        }
        FALLBACK_REPORT.to_string()
    }

    /// Build the prompt for a location and generate its report
    pub async fn report(
        &self,
        forecast: &Forecast,
        alerts: &AlertsData,
        location_name: &str,
        now: DateTime<Utc>,
    ) -> String {
        let prompt = build_prompt(forecast, alerts, location_name, now);
        self.generate(&prompt).await
    }
}
