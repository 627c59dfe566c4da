use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::{
    model::Metrics,
    provider::{
        DailyHistory, DailyProvider, HistoryDay, MS_TO_KMH, ProviderId, RangeProvider, available,
        get_json,
    },
    request::format_ymd,
    sanitize::coerce,
};

pub const DEFAULT_BASE_URL: &str = "https://power.larc.nasa.gov";
const DAILY_POINT_PATH: &str = "/api/temporal/daily/point";
const COMMUNITY: &str = "AG";
const PARAMETERS: &str = "T2M,PRECTOTCORR,WS2M,RH2M";

pub const TEMPERATURE: &str = "T2M";
pub const PRECIPITATION: &str = "PRECTOT";
pub const WIND_SPEED: &str = "WS2M";
pub const HUMIDITY: &str = "RH2M";
pub const HEAT_INDEX: &str = "HI";

/// Suffix of the bias-corrected variant of a parameter name.
const CORRECTED_SUFFIX: &str = "CORR";

/// NASA POWER daily point API.
///
/// Responses carry one series per parameter under `properties.parameter`,
/// each keyed by `YYYYMMDD`. Missing days are reported with the fill value
/// declared in `header.fill_value` (usually `-999`).
#[derive(Debug, Clone)]
pub struct NasaPowerProvider {
    base_url: String,
    http: Client,
}

impl NasaPowerProvider {
    pub fn new(http: Client, base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn fetch_daily(
        &self,
        lat: f64,
        lon: f64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Value> {
        let url = format!("{}{DAILY_POINT_PATH}", self.base_url);

        let query = [
            ("start", format_ymd(start)),
            ("end", format_ymd(end)),
            ("latitude", lat.to_string()),
            ("longitude", lon.to_string()),
            ("community", COMMUNITY.to_string()),
            ("parameters", PARAMETERS.to_string()),
            ("format", "JSON".to_string()),
        ];

        get_json(&self.http, &url, &query, "NASA POWER").await
    }
}

#[async_trait]
impl DailyProvider for NasaPowerProvider {
    fn id(&self) -> ProviderId {
        ProviderId::NasaPower
    }

    async fn fetch_point(&self, lat: f64, lon: f64, date: NaiveDate) -> Option<Value> {
        available("NASA POWER", self.fetch_daily(lat, lon, date, date).await)
    }

    fn has_day(&self, response: &Value, date: NaiveDate) -> bool {
        PowerResponse::parse(response).is_some_and(|r| !r.is_all_fill(&format_ymd(date)))
    }

    fn to_metrics(&self, response: &Value, date: NaiveDate) -> Metrics {
        let Some(parsed) = PowerResponse::parse(response) else {
            return Metrics::default();
        };
        let key = format_ymd(date);

        Metrics {
            temp_c: parsed.reading(TEMPERATURE, &key),
            humidity: parsed.reading(HUMIDITY, &key),
            precip_mm: parsed.reading(PRECIPITATION, &key),
            wind_kmh: parsed.reading(WIND_SPEED, &key).map(|ms| ms * MS_TO_KMH),
            heat_index_c: parsed.reading(HEAT_INDEX, &key),
        }
    }
}

#[async_trait]
impl RangeProvider for NasaPowerProvider {
    async fn fetch_range(
        &self,
        lat: f64,
        lon: f64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Option<Value> {
        available("NASA POWER range", self.fetch_daily(lat, lon, start, end).await)
    }

    fn to_history(&self, response: &Value) -> Option<DailyHistory> {
        let parsed = PowerResponse::parse(response)?;
        parsed.parameters()?;

        // Dates come from the temperature series; other series are read at
        // the same keys.
        let days = match parsed.series(TEMPERATURE) {
            Some(Value::Object(series)) => {
                let mut keys: Vec<&String> = series.keys().collect();
                keys.sort();
                keys.into_iter()
                    .map(|key| HistoryDay {
                        date: key.clone(),
                        temp_c: parsed.reading(TEMPERATURE, key),
                        precip_mm: parsed.reading(PRECIPITATION, key),
                        wind_ms: parsed.reading(WIND_SPEED, key),
                        humidity: parsed.reading(HUMIDITY, key),
                    })
                    .collect()
            }
            _ => Vec::new(),
        };

        Some(DailyHistory {
            fill_value: parsed.fill_value(),
            days,
        })
    }
}

#[derive(Debug, Deserialize)]
struct PowerHeader {
    #[serde(default)]
    fill_value: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct PowerProperties {
    #[serde(default)]
    parameter: Option<BTreeMap<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct PowerResponse {
    #[serde(default)]
    header: Option<PowerHeader>,
    #[serde(default)]
    properties: Option<PowerProperties>,
}

impl PowerResponse {
    fn parse(value: &Value) -> Option<Self> {
        PowerResponse::deserialize(value).ok()
    }

    fn parameters(&self) -> Option<&BTreeMap<String, Value>> {
        self.properties.as_ref()?.parameter.as_ref()
    }

    fn fill_value(&self) -> Option<f64> {
        self.header.as_ref()?.fill_value.as_ref().and_then(coerce)
    }

    /// Series for `name`, falling back to the corrected variant.
    fn series(&self, name: &str) -> Option<&Value> {
        let params = self.parameters()?;
        params
            .get(name)
            .or_else(|| params.get(&format!("{name}{CORRECTED_SUFFIX}")))
            .filter(|v| !v.is_null())
    }

    /// Numeric reading of `name` on `key`. Scalar series apply to every day.
    fn reading(&self, name: &str, key: &str) -> Option<f64> {
        day_value(self.series(name)?, key).and_then(coerce)
    }

    /// True when no parameter has a non-fill, non-null value for `key`.
    fn is_all_fill(&self, key: &str) -> bool {
        let Some(params) = self.parameters() else {
            return true;
        };
        let fill = self.fill_value();

        params.values().all(|series| match day_value(series, key) {
            None => true,
            Some(v) => fill.is_some_and(|fill| coerce(v) == Some(fill)),
        })
    }
}

/// Only numbers and strings count as a scalar reading; arrays, booleans and
/// nulls carry no value for any day.
fn day_value<'a>(series: &'a Value, key: &str) -> Option<&'a Value> {
    match series {
        Value::Object(days) => days.get(key).filter(|v| !v.is_null()),
        Value::Number(_) | Value::String(_) => Some(series),
        Value::Null | Value::Bool(_) | Value::Array(_) => None,
    }
}
