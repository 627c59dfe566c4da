use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::sanitize::sanitize;

/// Names of the numeric fields carried by [`Metrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    TempC,
    Humidity,
    PrecipMm,
    WindKmh,
    HeatIndexC,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::TempC => "tempC",
            Field::Humidity => "humidity",
            Field::PrecipMm => "precipMM",
            Field::WindKmh => "windKmh",
            Field::HeatIndexC => "heatIndexC",
        }
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Daily weather metrics in a provider-independent shape.
///
/// Every field is independently optional: a provider may report humidity
/// without temperature, and so on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    pub temp_c: Option<f64>,
    pub humidity: Option<f64>,
    #[serde(rename = "precipMM")]
    pub precip_mm: Option<f64>,
    pub wind_kmh: Option<f64>,
    pub heat_index_c: Option<f64>,
}

impl Metrics {
    /// True when no field carries a value.
    pub fn is_empty(&self) -> bool {
        self.temp_c.is_none()
            && self.humidity.is_none()
            && self.precip_mm.is_none()
            && self.wind_kmh.is_none()
            && self.heat_index_c.is_none()
    }

    /// Run every field through [`sanitize`].
    pub fn sanitized(self) -> Self {
        Self {
            temp_c: sanitize(self.temp_c, Field::TempC),
            humidity: sanitize(self.humidity, Field::Humidity),
            precip_mm: sanitize(self.precip_mm, Field::PrecipMm),
            wind_kmh: sanitize(self.wind_kmh, Field::WindKmh),
            heat_index_c: sanitize(self.heat_index_c, Field::HeatIndexC),
        }
    }
}

/// Comfort category tags, in the order the classifier emits them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    VeryHot,
    VeryCold,
    VeryWet,
    VeryWindy,
    VeryUncomfortable,
    Comfortable,
    NoData,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::VeryHot => "very_hot",
            Category::VeryCold => "very_cold",
            Category::VeryWet => "very_wet",
            Category::VeryWindy => "very_windy",
            Category::VeryUncomfortable => "very_uncomfortable",
            Category::Comfortable => "comfortable",
            Category::NoData => "no_data",
        }
    }

    /// Short human-readable description, used by the CLI.
    pub fn description(&self) -> &'static str {
        match self {
            Category::VeryHot => "Very hot",
            Category::VeryCold => "Very cold",
            Category::VeryWet => "Very wet",
            Category::VeryWindy => "Very windy",
            Category::VeryUncomfortable => "Very uncomfortable",
            Category::Comfortable => "Comfortable",
            Category::NoData => "No data available",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the metrics in a [`ComfortReport`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Source {
    PrimaryObserved,
    SecondaryForecast,
    HistoricalPredicted,
    None,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::PrimaryObserved => "primary-observed",
            Source::SecondaryForecast => "secondary-forecast",
            Source::HistoricalPredicted => "historical-predicted",
            Source::None => "none",
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result envelope produced by the fusion pipeline for one query.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComfortReport {
    pub source: Source,
    /// Normalized `YYYYMMDD` date the query resolved to.
    pub date: String,
    pub lat: f64,
    pub lon: f64,
    pub metrics: Metrics,
    pub categories: Vec<Category>,
    pub no_data: bool,
    pub raw_primary: Option<Value>,
    pub raw_secondary: Option<Value>,
    pub raw_history: Option<Value>,
}

impl ComfortReport {
    /// The tag a UI should lead with.
    pub fn primary_category(&self) -> Category {
        self.categories.first().copied().unwrap_or(Category::NoData)
    }

    /// Drop the diagnostic provider payloads.
    pub fn without_raw(mut self) -> Self {
        self.raw_primary = None;
        self.raw_secondary = None;
        self.raw_history = None;
        self
    }
}
