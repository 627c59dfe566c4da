use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use crate::{
    model::Metrics,
    provider::{DailyProvider, ProviderId, available, get_json},
    sanitize::coerce,
};

pub const DEFAULT_BASE_URL: &str = "https://api.open-meteo.com";
const FORECAST_PATH: &str = "/v1/forecast";
const DAILY_VARIABLES: &str = concat!(
    "temperature_2m_max,temperature_2m_min,precipitation_sum,",
    "windspeed_10m_max,relativehumidity_2m_max"
);

/// Open-Meteo daily forecast API.
#[derive(Debug, Clone)]
pub struct OpenMeteoProvider {
    base_url: String,
    http: Client,
}

impl OpenMeteoProvider {
    pub fn new(http: Client, base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn fetch_daily(&self, lat: f64, lon: f64, date: NaiveDate) -> Result<Value> {
        let url = format!("{}{FORECAST_PATH}", self.base_url);
        let day = date.format("%Y-%m-%d").to_string();

        let query = [
            ("latitude", lat.to_string()),
            ("longitude", lon.to_string()),
            ("daily", DAILY_VARIABLES.to_string()),
            ("timezone", "UTC".to_string()),
            ("start_date", day.clone()),
            ("end_date", day),
        ];

        get_json(&self.http, &url, &query, "Open-Meteo").await
    }
}

#[async_trait]
impl DailyProvider for OpenMeteoProvider {
    fn id(&self) -> ProviderId {
        ProviderId::OpenMeteo
    }

    async fn fetch_point(&self, lat: f64, lon: f64, date: NaiveDate) -> Option<Value> {
        available("Open-Meteo", self.fetch_daily(lat, lon, date).await)
    }

    fn has_day(&self, response: &Value, _date: NaiveDate) -> bool {
        OmResponse::parse(response).is_some_and(|r| r.daily.is_some())
    }

    fn to_metrics(&self, response: &Value, _date: NaiveDate) -> Metrics {
        let Some(daily) = OmResponse::parse(response).and_then(|r| r.daily) else {
            return Metrics::default();
        };

        Metrics {
            temp_c: first(daily.temperature_2m_max.as_deref())
                .or_else(|| first(daily.temperature_2m_min.as_deref())),
            humidity: first(daily.relativehumidity_2m_max.as_deref()),
            precip_mm: first(daily.precipitation_sum.as_deref()),
            // Already km/h.
            wind_kmh: first(daily.windspeed_10m_max.as_deref()),
            heat_index_c: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct OmDaily {
    #[serde(default)]
    temperature_2m_max: Option<Vec<Value>>,
    #[serde(default)]
    temperature_2m_min: Option<Vec<Value>>,
    #[serde(default)]
    precipitation_sum: Option<Vec<Value>>,
    #[serde(default)]
    windspeed_10m_max: Option<Vec<Value>>,
    #[serde(default)]
    relativehumidity_2m_max: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct OmResponse {
    #[serde(default)]
    daily: Option<OmDaily>,
}

impl OmResponse {
    fn parse(value: &Value) -> Option<Self> {
        OmResponse::deserialize(value).ok()
    }
}

fn first(values: Option<&[Value]>) -> Option<f64> {
    values?.first().and_then(coerce)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn provider() -> OpenMeteoProvider {
        OpenMeteoProvider::new(Client::new(), DEFAULT_BASE_URL)
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, 14).unwrap()
    }

    #[test]
    fn maps_first_daily_entry() {
        let response = json!({
            "latitude": 28.625,
            "daily": {
                "time": ["2024-07-14"],
                "temperature_2m_max": [38.4],
                "temperature_2m_min": [29.1],
                "precipitation_sum": [0.3],
                "windspeed_10m_max": [14.2],
                "relativehumidity_2m_max": [62]
            }
        });

        assert!(provider().has_day(&response, date()));

        let metrics = provider().to_metrics(&response, date());
        assert_eq!(metrics.temp_c, Some(38.4));
        assert_eq!(metrics.precip_mm, Some(0.3));
        assert_eq!(metrics.wind_kmh, Some(14.2));
        assert_eq!(metrics.humidity, Some(62.0));
        assert_eq!(metrics.heat_index_c, None);
    }

    #[test]
    fn falls_back_to_min_temperature() {
        let response = json!({
            "daily": {
                "temperature_2m_max": [null],
                "temperature_2m_min": [12.5]
            }
        });

        assert_eq!(provider().to_metrics(&response, date()).temp_c, Some(12.5));
    }

    #[test]
    fn empty_daily_record_still_counts_as_a_record() {
        let response = json!({ "daily": {} });

        assert!(provider().has_day(&response, date()));
        assert!(provider().to_metrics(&response, date()).is_empty());
    }

    #[test]
    fn missing_daily_block_is_not_a_record() {
        let response = json!({ "error": true, "reason": "out of allowed range" });

        assert!(!provider().has_day(&response, date()));
        assert!(!provider().has_day(&json!(null), date()));
    }
}
