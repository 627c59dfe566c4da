use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde_json::Value;
use std::{convert::TryFrom, fmt::Debug, time::Duration};
use tracing::{debug, warn};

use crate::{
    Config,
    model::Metrics,
    provider::{nasa_power::NasaPowerProvider, open_meteo::OpenMeteoProvider},
};

pub mod nasa_power;
pub mod open_meteo;

const USER_AGENT: &str = concat!("comfort/", env!("CARGO_PKG_VERSION"));

/// Meters/second to kilometers/hour.
pub const MS_TO_KMH: f64 = 3.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderId {
    NasaPower,
    OpenMeteo,
    Nominatim,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::NasaPower => "nasa-power",
            ProviderId::OpenMeteo => "open-meteo",
            ProviderId::Nominatim => "nominatim",
        }
    }

    pub const fn all() -> &'static [ProviderId] {
        &[ProviderId::NasaPower, ProviderId::OpenMeteo, ProviderId::Nominatim]
    }

    /// Public endpoint used when the config has no override.
    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderId::NasaPower => nasa_power::DEFAULT_BASE_URL,
            ProviderId::OpenMeteo => open_meteo::DEFAULT_BASE_URL,
            ProviderId::Nominatim => crate::geocode::DEFAULT_BASE_URL,
        }
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ProviderId {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();

        match lower.as_str() {
            "nasa-power" => Ok(ProviderId::NasaPower),
            "open-meteo" => Ok(ProviderId::OpenMeteo),
            "nominatim" => Ok(ProviderId::Nominatim),
            _ => {
                let supported: Vec<&str> =
                    ProviderId::all().iter().map(|id| id.as_str()).collect();
                Err(anyhow!(
                    "Unknown provider '{value}'. Supported providers: {}.",
                    supported.join(", ")
                ))
            }
        }
    }
}

/// A source of single-day observations or forecasts.
///
/// `fetch_point` never fails: transport, status and parse errors are logged
/// and reported as `None` so the caller can move on to the next source.
#[async_trait]
pub trait DailyProvider: Send + Sync + Debug {
    fn id(&self) -> ProviderId;

    async fn fetch_point(&self, lat: f64, lon: f64, date: NaiveDate) -> Option<Value>;

    /// Whether `response` carries any real reading for `date`.
    fn has_day(&self, response: &Value, date: NaiveDate) -> bool;

    /// Map `response` into unsanitized metrics for `date`.
    fn to_metrics(&self, response: &Value, date: NaiveDate) -> Metrics;
}

/// A source of consecutive daily observations, used for prediction.
#[async_trait]
pub trait RangeProvider: Send + Sync + Debug {
    async fn fetch_range(
        &self,
        lat: f64,
        lon: f64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Option<Value>;

    /// Extract per-day readings in provider units, `None` if malformed.
    fn to_history(&self, response: &Value) -> Option<DailyHistory>;
}

/// Daily readings over a range, keyed by the provider's date keys.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DailyHistory {
    /// Value the provider uses for "no observation", if it declares one.
    pub fill_value: Option<f64>,
    pub days: Vec<HistoryDay>,
}

/// One day of history in provider units (wind in meters/second).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryDay {
    pub date: String,
    pub temp_c: Option<f64>,
    pub precip_mm: Option<f64>,
    pub wind_ms: Option<f64>,
    pub humidity: Option<f64>,
}

/// Shared HTTP client with the configured per-request timeout.
pub fn http_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .context("Failed to build HTTP client")
}

/// Construct the primary daily provider from config.
pub fn primary_from_config(config: &Config) -> Result<NasaPowerProvider> {
    let http = http_client(config.timeout())?;
    Ok(NasaPowerProvider::new(http, config.base_url(ProviderId::NasaPower)))
}

/// Construct the secondary daily provider from config.
pub fn secondary_from_config(config: &Config) -> Result<OpenMeteoProvider> {
    let http = http_client(config.timeout())?;
    Ok(OpenMeteoProvider::new(http, config.base_url(ProviderId::OpenMeteo)))
}

/// GET `url` and parse the body as JSON, failing on any non-success status.
pub(crate) async fn get_json(
    http: &Client,
    url: &str,
    query: &[(&str, String)],
    label: &str,
) -> Result<Value> {
    debug!(provider = label, url, ?query, "sending request");

    let res = http
        .get(url)
        .query(query)
        .send()
        .await
        .with_context(|| format!("Failed to send request to {label}"))?;

    let status = res.status();
    let body = res
        .text()
        .await
        .with_context(|| format!("Failed to read {label} response body"))?;

    if !status.is_success() {
        return Err(anyhow!(
            "{label} request failed with status {status}: {}",
            truncate_body(&body),
        ));
    }

    serde_json::from_str(&body).with_context(|| format!("Failed to parse {label} JSON"))
}

/// Collapse an adapter error into "unavailable", logging why.
pub(crate) fn available<T>(label: &str, result: Result<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(provider = label, error = %format!("{err:#}"), "provider unavailable");
            None
        }
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn provider_id_as_str_roundtrip() {
        for id in ProviderId::all() {
            let s = id.as_str();
            let parsed = ProviderId::try_from(s).expect("roundtrip should succeed");
            assert_eq!(*id, parsed);
        }
    }

    #[test]
    fn provider_id_is_case_insensitive() {
        assert_eq!(ProviderId::try_from("NASA-Power").unwrap(), ProviderId::NasaPower);
    }

    #[test]
    fn unknown_provider_error() {
        let err = ProviderId::try_from("doesnotexist").unwrap_err();
        assert!(err.to_string().contains("Unknown provider"));
    }

    #[test]
    fn providers_from_default_config_use_public_endpoints() {
        let cfg = Config::default();

        let primary = primary_from_config(&cfg).unwrap();
        assert_eq!(primary.base_url(), nasa_power::DEFAULT_BASE_URL);

        let secondary = secondary_from_config(&cfg).unwrap();
        assert_eq!(secondary.base_url(), open_meteo::DEFAULT_BASE_URL);
    }

    #[test]
    fn providers_honor_base_url_override() {
        let mut cfg = Config::default();
        cfg.upsert_provider_base_url(ProviderId::OpenMeteo, "http://localhost:9999/".into());

        let secondary = secondary_from_config(&cfg).unwrap();
        assert_eq!(secondary.base_url(), "http://localhost:9999");
    }

    #[test]
    fn truncate_body_respects_char_boundaries() {
        let long = "é".repeat(300);
        let out = truncate_body(&long);
        assert!(out.ends_with("..."));
        assert_eq!(out.chars().count(), 203);

        assert_eq!(truncate_body("short"), "short");
    }
}
