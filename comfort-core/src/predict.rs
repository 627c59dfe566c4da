use chrono::NaiveDate;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::{
    error::ComfortError,
    model::{Field, Metrics},
    provider::{DailyHistory, HistoryDay, MS_TO_KMH, RangeProvider},
    request::{format_ymd, shift_days},
    sanitize::sanitize,
};

/// Number of days averaged, including the window's last day.
pub const WINDOW_DAYS: i64 = 7;

/// Inclusive span of days used for a prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl HistoryWindow {
    /// The seven days ending the day before `min(target, today)`, so the
    /// target day itself is never read. `None` outside chrono's range.
    pub fn before(target: NaiveDate, today: NaiveDate) -> Option<Self> {
        let anchor = target.min(today);
        let end = shift_days(anchor, -1)?;
        let start = shift_days(end, -(WINDOW_DAYS - 1))?;
        Some(Self { start, end })
    }
}

/// Averaged metrics together with the history payload they came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub metrics: Metrics,
    pub raw_history: Value,
}

/// Metrics prediction from a trailing window of daily history.
#[derive(Debug, Clone)]
pub struct HistoricalPredictor {
    history: Arc<dyn RangeProvider>,
}

impl HistoricalPredictor {
    pub fn new(history: Arc<dyn RangeProvider>) -> Self {
        Self { history }
    }

    /// Predict metrics for `target` from the seven days before
    /// `min(target, today)`. `Ok(None)` when the history is unavailable,
    /// empty, or yields no valid sample for any field; an error only when
    /// the window falls outside the supported calendar.
    pub async fn predict(
        &self,
        lat: f64,
        lon: f64,
        target: NaiveDate,
        today: NaiveDate,
    ) -> Result<Option<Prediction>, ComfortError> {
        let window = HistoryWindow::before(target, today).ok_or_else(|| {
            let date = format_ymd(target);
            ComfortError::Internal(format!("cannot compute history window for {date}"))
        })?;

        Ok(self.predict_window(lat, lon, window).await)
    }

    /// Average the given window.
    pub async fn predict_window(
        &self,
        lat: f64,
        lon: f64,
        window: HistoryWindow,
    ) -> Option<Prediction> {
        debug!(
            start = %format_ymd(window.start),
            end = %format_ymd(window.end),
            "fetching history window"
        );

        let raw = self.history.fetch_range(lat, lon, window.start, window.end).await?;
        let history = self.history.to_history(&raw)?;

        let metrics = average(&history)?;
        Some(Prediction {
            metrics,
            raw_history: raw,
        })
    }
}

/// Average every predictable field over the history's days.
pub fn average(history: &DailyHistory) -> Option<Metrics> {
    if history.days.is_empty() {
        return None;
    }

    let days = &history.days;
    let fill = history.fill_value;
    let samples = move |pick: fn(&HistoryDay) -> Option<f64>| {
        days.iter()
            .filter_map(pick)
            .filter(move |v| v.is_finite() && Some(*v) != fill)
    };

    let metrics = Metrics {
        temp_c: mean(samples(|d| d.temp_c), Field::TempC),
        humidity: mean(samples(|d| d.humidity), Field::Humidity),
        precip_mm: mean(samples(|d| d.precip_mm), Field::PrecipMm),
        wind_kmh: mean(samples(|d| d.wind_ms).map(|ms| ms * MS_TO_KMH), Field::WindKmh),
        heat_index_c: None,
    };

    (!metrics.is_empty()).then_some(metrics)
}

/// Mean of the samples that pass [`sanitize`], `None` if there are none.
fn mean(samples: impl Iterator<Item = f64>, field: Field) -> Option<f64> {
    let (sum, count) = samples
        .filter_map(|v| sanitize(Some(v), field))
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));

    (count > 0).then(|| sum / count as f64)
}
