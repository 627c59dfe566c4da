use crate::model::{Category, Metrics};

pub const VERY_HOT_C: f64 = 35.0;
pub const VERY_COLD_C: f64 = 5.0;
pub const VERY_WET_MM: f64 = 5.0;
pub const VERY_WINDY_KMH: f64 = 20.0;
pub const UNCOMFORTABLE_HEAT_C: f64 = 32.0;
pub const UNCOMFORTABLE_HUMIDITY: f64 = 80.0;

/// Map metrics to comfort categories.
///
/// Rules are independent and appended in a fixed order; `comfortable` is
/// emitted only when nothing else matched, so the result is never empty.
/// Values are taken literally, callers sanitize first.
pub fn classify(metrics: &Metrics) -> Vec<Category> {
    let mut categories = Vec::new();

    if metrics.temp_c.is_some_and(|t| t >= VERY_HOT_C) {
        categories.push(Category::VeryHot);
    }
    if metrics.temp_c.is_some_and(|t| t <= VERY_COLD_C) {
        categories.push(Category::VeryCold);
    }
    if metrics.precip_mm.unwrap_or(0.0) >= VERY_WET_MM {
        categories.push(Category::VeryWet);
    }
    if metrics.wind_kmh.unwrap_or(0.0) >= VERY_WINDY_KMH {
        categories.push(Category::VeryWindy);
    }

    let humidity = metrics.humidity.unwrap_or(0.0);
    if effective_heat(metrics)
        .is_some_and(|heat| heat >= UNCOMFORTABLE_HEAT_C || humidity >= UNCOMFORTABLE_HUMIDITY)
    {
        categories.push(Category::VeryUncomfortable);
    }

    if categories.is_empty() {
        categories.push(Category::Comfortable);
    }

    categories
}

/// Heat index when reported and nonzero, otherwise air temperature.
fn effective_heat(metrics: &Metrics) -> Option<f64> {
    metrics.heat_index_c.filter(|hi| *hi != 0.0).or(metrics.temp_c)
}
