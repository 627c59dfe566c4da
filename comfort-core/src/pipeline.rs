use chrono::{NaiveDate, Utc};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

use crate::{
    Config,
    classify::classify,
    error::ComfortError,
    model::{Category, ComfortReport, Metrics, Source},
    predict::HistoricalPredictor,
    provider::{DailyProvider, RangeProvider, primary_from_config, secondary_from_config},
    request::{ComfortQuery, QueryParams, format_ymd},
};

/// Pipeline states, in the order they are normally visited.
///
/// Each stage performs at most one network call and picks the next stage
/// from its outcome; provider failures only move the machine forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    PrimaryLookup,
    SecondaryLookup,
    NoDataCheck,
    Prediction,
    Finalize,
}

impl Stage {
    /// Usable primary data skips the secondary provider.
    pub fn after_primary(usable: bool) -> Stage {
        if usable {
            Stage::NoDataCheck
        } else {
            Stage::SecondaryLookup
        }
    }

    pub fn after_secondary() -> Stage {
        Stage::NoDataCheck
    }

    /// Predict only when nothing survived sanitization.
    pub fn after_check(metrics: &Metrics) -> Stage {
        if metrics.is_empty() {
            Stage::Prediction
        } else {
            Stage::Finalize
        }
    }

    pub fn after_prediction() -> Stage {
        Stage::Finalize
    }
}

/// State accumulated while walking the stages of one query.
#[derive(Debug, Default)]
struct Progress {
    metrics: Metrics,
    source: Option<Source>,
    no_data: bool,
    raw_primary: Option<Value>,
    raw_secondary: Option<Value>,
    raw_history: Option<Value>,
}

impl Progress {
    fn accept(&mut self, metrics: Metrics, source: Source) {
        self.metrics = metrics.sanitized();
        self.source = Some(source);
    }

    fn finish(self, query: &ComfortQuery) -> ComfortReport {
        let categories = if self.no_data {
            vec![Category::NoData]
        } else {
            classify(&self.metrics)
        };

        ComfortReport {
            source: self.source.unwrap_or(Source::None),
            date: query.date_key(),
            lat: query.lat,
            lon: query.lon,
            metrics: self.metrics,
            categories,
            no_data: self.no_data,
            raw_primary: self.raw_primary,
            raw_secondary: self.raw_secondary,
            raw_history: self.raw_history,
        }
    }
}

/// Primary observation, secondary forecast, then a prediction from recent
/// history. The only errors are invalid input and internal faults.
#[derive(Debug, Clone)]
pub struct FusionPipeline {
    primary: Arc<dyn DailyProvider>,
    secondary: Arc<dyn DailyProvider>,
    predictor: HistoricalPredictor,
}

impl FusionPipeline {
    pub fn new(
        primary: Arc<dyn DailyProvider>,
        secondary: Arc<dyn DailyProvider>,
        history: Arc<dyn RangeProvider>,
    ) -> Self {
        Self {
            primary,
            secondary,
            predictor: HistoricalPredictor::new(history),
        }
    }

    /// Build the standard provider chain from config.
    ///
    /// The primary provider doubles as the history source.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let primary = Arc::new(primary_from_config(config)?);
        let secondary = Arc::new(secondary_from_config(config)?);

        Ok(Self::new(primary.clone(), secondary, primary))
    }

    /// Validate raw parameters and run the query.
    pub async fn run(&self, params: &QueryParams) -> Result<ComfortReport, ComfortError> {
        let query = ComfortQuery::parse(params)?;
        self.check(&query).await
    }

    /// Run a validated query against today's UTC date.
    pub async fn check(&self, query: &ComfortQuery) -> Result<ComfortReport, ComfortError> {
        self.check_on(query, Utc::now().date_naive()).await
    }

    /// Run a validated query with an explicit notion of "today".
    pub async fn check_on(
        &self,
        query: &ComfortQuery,
        today: NaiveDate,
    ) -> Result<ComfortReport, ComfortError> {
        let ComfortQuery { lat, lon, date } = *query;
        let mut progress = Progress::default();
        let mut stage = Stage::PrimaryLookup;

        loop {
            debug!(?stage, date = %format_ymd(date), "pipeline stage");

            stage = match stage {
                Stage::PrimaryLookup => {
                    let raw = self.primary.fetch_point(lat, lon, date).await;
                    let usable = raw.as_ref().filter(|r| self.primary.has_day(r, date));

                    if let Some(response) = usable {
                        let metrics = self.primary.to_metrics(response, date);
                        progress.accept(metrics, Source::PrimaryObserved);
                    } else if raw.is_some() {
                        debug!(provider = %self.primary.id(), "no real readings for requested day");
                    }

                    let next = Stage::after_primary(usable.is_some());
                    progress.raw_primary = raw;
                    next
                }
                Stage::SecondaryLookup => {
                    let raw = self.secondary.fetch_point(lat, lon, date).await;
                    let usable = raw.as_ref().filter(|r| self.secondary.has_day(r, date));

                    if let Some(response) = usable {
                        let metrics = self.secondary.to_metrics(response, date);
                        progress.accept(metrics, Source::SecondaryForecast);
                    }

                    progress.raw_secondary = raw;
                    Stage::after_secondary()
                }
                Stage::NoDataCheck => {
                    progress.no_data = progress.metrics.is_empty();
                    Stage::after_check(&progress.metrics)
                }
                Stage::Prediction => {
                    match self.predictor.predict(lat, lon, date, today).await? {
                        Some(prediction) => {
                            progress.metrics = prediction.metrics;
                            progress.source = Some(Source::HistoricalPredicted);
                            progress.raw_history = Some(prediction.raw_history);
                            progress.no_data = false;
                        }
                        None if progress.source.is_none() => {
                            progress.source = Some(Source::None);
                        }
                        None => {}
                    }

                    Stage::after_prediction()
                }
                Stage::Finalize => {
                    let report = progress.finish(query);
                    info!(
                        source = %report.source,
                        date = %report.date,
                        no_data = report.no_data,
                        categories = ?report.categories,
                        "comfort check finished"
                    );
                    return Ok(report);
                }
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{DailyHistory, HistoryDay, ProviderId};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Daily provider whose payload is `{"day": {...metrics...}}`, or
    /// `{"empty": true}` for a response without the requested day.
    #[derive(Debug)]
    struct FakeDaily {
        id: ProviderId,
        payload: Option<Value>,
        calls: AtomicUsize,
    }

    impl FakeDaily {
        fn new(id: ProviderId, payload: Option<Value>) -> Arc<Self> {
            Arc::new(Self {
                id,
                payload,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DailyProvider for FakeDaily {
        fn id(&self) -> ProviderId {
            self.id
        }

        async fn fetch_point(&self, _: f64, _: f64, _: NaiveDate) -> Option<Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.payload.clone()
        }

        fn has_day(&self, response: &Value, _: NaiveDate) -> bool {
            response.get("day").is_some()
        }

        fn to_metrics(&self, response: &Value, _: NaiveDate) -> Metrics {
            serde_json::from_value(response["day"].clone()).unwrap()
        }
    }

    #[derive(Debug)]
    struct FakeHistory {
        temps: Option<Vec<f64>>,
        calls: AtomicUsize,
    }

    impl FakeHistory {
        fn new(temps: Option<Vec<f64>>) -> Arc<Self> {
            Arc::new(Self {
                temps,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl RangeProvider for FakeHistory {
        async fn fetch_range(&self, _: f64, _: f64, _: NaiveDate, _: NaiveDate) -> Option<Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.temps.as_ref().map(|t| json!({ "temps": t }))
        }

        fn to_history(&self, _: &Value) -> Option<DailyHistory> {
            let days = self
                .temps
                .as_ref()?
                .iter()
                .map(|t| HistoryDay {
                    temp_c: Some(*t),
                    ..HistoryDay::default()
                })
                .collect();
            Some(DailyHistory {
                fill_value: Some(-999.0),
                days,
            })
        }
    }

    fn query() -> ComfortQuery {
        ComfortQuery::new(28.61, 77.21, NaiveDate::from_ymd_opt(2023, 9, 1).unwrap()).unwrap()
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    fn day(metrics: Value) -> Option<Value> {
        Some(json!({ "day": metrics }))
    }

    fn pipeline(
        primary: &Arc<FakeDaily>,
        secondary: &Arc<FakeDaily>,
        history: &Arc<FakeHistory>,
    ) -> FusionPipeline {
        FusionPipeline::new(primary.clone(), secondary.clone(), history.clone())
    }

    #[test]
    fn transitions() {
        assert_eq!(Stage::after_primary(true), Stage::NoDataCheck);
        assert_eq!(Stage::after_primary(false), Stage::SecondaryLookup);
        assert_eq!(Stage::after_secondary(), Stage::NoDataCheck);
        assert_eq!(Stage::after_check(&Metrics::default()), Stage::Prediction);
        assert_eq!(
            Stage::after_check(&Metrics {
                temp_c: Some(1.0),
                ..Metrics::default()
            }),
            Stage::Finalize
        );
        assert_eq!(Stage::after_prediction(), Stage::Finalize);
    }

    #[tokio::test]
    async fn heat_index_drives_discomfort_over_temperature() {
        let primary = FakeDaily::new(
            ProviderId::NasaPower,
            day(json!({ "tempC": 30.0, "heatIndexC": 33.0, "humidity": 50.0 })),
        );
        let secondary = FakeDaily::new(ProviderId::OpenMeteo, None);
        let history = FakeHistory::new(None);

        let report = pipeline(&primary, &secondary, &history)
            .check_on(&query(), today())
            .await
            .unwrap();

        assert_eq!(report.source, Source::PrimaryObserved);
        assert_eq!(report.metrics.heat_index_c, Some(33.0));
        assert_eq!(report.categories, vec![Category::VeryUncomfortable]);
    }

    #[tokio::test]
    async fn primary_data_is_sanitized_and_classified() {
        let primary = FakeDaily::new(
            ProviderId::NasaPower,
            day(json!({ "tempC": 40.0, "humidity": 130.0, "precipMM": -999.0, "windKmh": 5.0 })),
        );
        let secondary = FakeDaily::new(ProviderId::OpenMeteo, day(json!({ "tempC": 1.0 })));
        let history = FakeHistory::new(Some(vec![20.0]));

        let report = pipeline(&primary, &secondary, &history)
            .check_on(&query(), today())
            .await
            .unwrap();

        assert_eq!(report.source, Source::PrimaryObserved);
        assert_eq!(report.metrics.temp_c, Some(40.0));
        assert_eq!(report.metrics.humidity, None);
        assert_eq!(report.metrics.precip_mm, None);
        assert_eq!(report.categories, vec![Category::VeryHot, Category::VeryUncomfortable]);
        assert!(!report.no_data);
        assert_eq!(report.date, "20230901");
        assert!(report.raw_primary.is_some());
        assert!(report.raw_secondary.is_none());
        assert!(report.raw_history.is_none());
        assert_eq!(secondary.calls(), 0);
    }

    #[tokio::test]
    async fn unavailable_primary_falls_back_to_secondary() {
        let primary = FakeDaily::new(ProviderId::NasaPower, None);
        let secondary = FakeDaily::new(
            ProviderId::OpenMeteo,
            day(json!({ "tempC": 22.0, "humidity": 50.0, "precipMM": 0.0, "windKmh": 5.0 })),
        );
        let history = FakeHistory::new(Some(vec![20.0]));

        let report = pipeline(&primary, &secondary, &history)
            .check_on(&query(), today())
            .await
            .unwrap();

        assert_eq!(report.source, Source::SecondaryForecast);
        assert_eq!(report.categories, vec![Category::Comfortable]);
        assert!(report.raw_primary.is_none());
        assert!(report.raw_secondary.is_some());
        assert_eq!(history.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn all_fill_primary_is_treated_as_unavailable() {
        let primary = FakeDaily::new(ProviderId::NasaPower, Some(json!({ "empty": true })));
        let secondary = FakeDaily::new(ProviderId::OpenMeteo, day(json!({ "windKmh": 30.0 })));
        let history = FakeHistory::new(None);

        let report = pipeline(&primary, &secondary, &history)
            .check_on(&query(), today())
            .await
            .unwrap();

        assert_eq!(report.source, Source::SecondaryForecast);
        assert_eq!(report.categories, vec![Category::VeryWindy]);
        assert_eq!(report.raw_primary, Some(json!({ "empty": true })));
        assert_eq!(secondary.calls(), 1);
    }

    #[tokio::test]
    async fn both_unavailable_uses_prediction() {
        let primary = FakeDaily::new(ProviderId::NasaPower, None);
        let secondary = FakeDaily::new(ProviderId::OpenMeteo, None);
        let history = FakeHistory::new(Some(vec![2.0, 4.0]));

        let report = pipeline(&primary, &secondary, &history)
            .check_on(&query(), today())
            .await
            .unwrap();

        assert_eq!(report.source, Source::HistoricalPredicted);
        assert!(!report.no_data);
        assert_eq!(report.metrics.temp_c, Some(3.0));
        assert_eq!(report.metrics.heat_index_c, None);
        assert_eq!(report.categories, vec![Category::VeryCold]);
        assert_eq!(report.raw_history, Some(json!({ "temps": [2.0, 4.0] })));
    }

    #[tokio::test]
    async fn everything_unavailable_is_no_data() {
        let primary = FakeDaily::new(ProviderId::NasaPower, None);
        let secondary = FakeDaily::new(ProviderId::OpenMeteo, None);
        let history = FakeHistory::new(None);

        let report = pipeline(&primary, &secondary, &history)
            .check_on(&query(), today())
            .await
            .unwrap();

        assert!(report.no_data);
        assert_eq!(report.source, Source::None);
        assert_eq!(report.categories, vec![Category::NoData]);
        assert!(report.metrics.is_empty());
    }

    #[tokio::test]
    async fn all_sentinel_secondary_keeps_its_source_when_prediction_fails() {
        let primary = FakeDaily::new(ProviderId::NasaPower, None);
        let secondary = FakeDaily::new(
            ProviderId::OpenMeteo,
            day(json!({ "tempC": -999.0, "humidity": -999.0 })),
        );
        let history = FakeHistory::new(Some(vec![-999.0]));

        let report = pipeline(&primary, &secondary, &history)
            .check_on(&query(), today())
            .await
            .unwrap();

        assert!(report.no_data);
        assert_eq!(report.source, Source::SecondaryForecast);
        assert_eq!(report.categories, vec![Category::NoData]);
        assert_eq!(history.calls.load(Ordering::SeqCst), 1);
        assert!(report.raw_history.is_none());
    }

    #[tokio::test]
    async fn empty_primary_after_sanitizing_goes_to_prediction() {
        let primary = FakeDaily::new(ProviderId::NasaPower, day(json!({ "tempC": -9999.0 })));
        let secondary = FakeDaily::new(ProviderId::OpenMeteo, day(json!({ "tempC": 20.0 })));
        let history = FakeHistory::new(Some(vec![36.0]));

        let report = pipeline(&primary, &secondary, &history)
            .check_on(&query(), today())
            .await
            .unwrap();

        assert_eq!(report.source, Source::HistoricalPredicted);
        assert_eq!(secondary.calls(), 0);
        assert_eq!(report.categories, vec![Category::VeryHot, Category::VeryUncomfortable]);
    }

    #[tokio::test]
    async fn invalid_input_fails_before_any_call() {
        let primary = FakeDaily::new(ProviderId::NasaPower, None);
        let secondary = FakeDaily::new(ProviderId::OpenMeteo, None);
        let history = FakeHistory::new(None);

        let params = QueryParams {
            lat: Some(1.0.into()),
            lon: None,
            date: Some("20230901".into()),
        };
        let err = pipeline(&primary, &secondary, &history).run(&params).await.unwrap_err();

        assert!(err.is_client_error());
        assert_eq!(primary.calls(), 0);
    }

    #[tokio::test]
    async fn window_overflow_is_an_internal_fault() {
        let primary = FakeDaily::new(ProviderId::NasaPower, None);
        let secondary = FakeDaily::new(ProviderId::OpenMeteo, None);
        let history = FakeHistory::new(None);

        let query = ComfortQuery::new(0.0, 0.0, NaiveDate::MIN).unwrap();
        let err = pipeline(&primary, &secondary, &history)
            .check_on(&query, today())
            .await
            .unwrap_err();

        assert!(matches!(err, ComfortError::Internal(_)));
    }
}
