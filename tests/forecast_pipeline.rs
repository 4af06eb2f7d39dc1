use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use pricecast::application::market_data::FrameLoader;
use pricecast::application::ml::{FeatureBuilder, InferenceEngine, MarketHistory, ModelArtifact};
use pricecast::application::worker::{ForecastWorker, PipelineSettings, TrainingPipeline};
use pricecast::domain::errors::PipelineError;
use pricecast::domain::market::{DataProvider, PriceRow, Timeframe};
use pricecast::domain::ml::{FeatureLayout, ModelKind};
use pricecast::domain::ports::{ArtifactStore, PriceHistorySource, RawFeedAdapter};
use pricecast::infrastructure::persistence::InMemoryArtifactStore;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Deterministic OHLC path per token, one row every `step_minutes`
fn synthetic_rows(token: &str, count: usize, step_minutes: i64) -> Vec<PriceRow> {
    let base = match token {
        "BTC" => 90_000.0,
        _ => 3_000.0,
    };
    let start: DateTime<Utc> = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();

    (0..count)
        .map(|i| {
            let t = i as f64;
            let p = base * (1.0 + 0.01 * (t / 37.0).sin() + 0.002 * (t / 5.0).cos() + t * 1e-5);
            PriceRow::new(
                start + Duration::minutes(i as i64 * step_minutes),
                p,
                p * (1.001 + 0.0005 * (t / 3.0).sin().abs()),
                p * (0.999 - 0.0005 * (t / 7.0).cos().abs()),
                p * (1.0 + 0.0003 * (t / 11.0).sin()),
            )
            .with_volume(10.0 + (t / 13.0).cos())
        })
        .collect()
}

/// Raw fragments named `<TOKEN>-history`, each yielding the synthetic path
struct SyntheticFeed {
    count: usize,
    step_minutes: i64,
}

impl RawFeedAdapter for SyntheticFeed {
    fn provider(&self) -> DataProvider {
        DataProvider::Binance
    }

    fn list_fragments(&self, token: &str) -> Result<Vec<String>, PipelineError> {
        Ok(vec![format!("{}-history", token.to_uppercase())])
    }

    fn normalize(&self, fragment: &str) -> Result<Vec<PriceRow>, PipelineError> {
        let token = fragment.trim_end_matches("-history");
        Ok(synthetic_rows(token, self.count, self.step_minutes))
    }
}

struct SyntheticSource {
    count: usize,
    step_minutes: i64,
    recent: usize,
}

#[async_trait]
impl PriceHistorySource for SyntheticSource {
    async fn download_history(&self, token: &str, _days: u32) -> Result<Vec<String>, PipelineError> {
        Ok(vec![format!("{}-history", token.to_uppercase())])
    }

    async fn fetch_recent(&self, token: &str, _lookback_minutes: usize) -> Result<Vec<PriceRow>, PipelineError> {
        let rows = synthetic_rows(&token.to_uppercase(), self.count, self.step_minutes);
        Ok(rows[rows.len() - self.recent..].to_vec())
    }
}

/// One hourly fragment whose close rises by 2 every hour
struct RisingFeed;

impl RawFeedAdapter for RisingFeed {
    fn provider(&self) -> DataProvider {
        DataProvider::Binance
    }

    fn list_fragments(&self, _token: &str) -> Result<Vec<String>, PipelineError> {
        Ok(vec!["rising".to_string()])
    }

    fn normalize(&self, _fragment: &str) -> Result<Vec<PriceRow>, PipelineError> {
        let start: DateTime<Utc> = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        Ok((0..100)
            .map(|i| {
                let t = i as f64;
                let close = 3_000.0 + 2.0 * t;
                let open = close - 1.0 + 0.4 * (t / 3.0).sin();
                PriceRow::new(
                    start + Duration::hours(i),
                    open,
                    close + 1.5 + 0.3 * (t / 5.0).cos(),
                    open - 1.5 - 0.2 * (t / 7.0).sin().abs(),
                    close,
                )
            })
            .collect())
    }
}

/// Archive mirror that refuses every download
struct RejectingSource;

#[async_trait]
impl PriceHistorySource for RejectingSource {
    async fn download_history(&self, _token: &str, _days: u32) -> Result<Vec<String>, PipelineError> {
        Err(PipelineError::pipeline("archive download failed (403 Forbidden)"))
    }

    async fn fetch_recent(&self, _token: &str, _lookback_minutes: usize) -> Result<Vec<PriceRow>, PipelineError> {
        Ok(Vec::new())
    }
}

fn lagged_layout() -> FeatureLayout {
    FeatureLayout::for_model(ModelKind::Knn, "eth", "btc", 10)
}

fn pipeline(
    kind: ModelKind,
    layout: FeatureLayout,
    timeframe: Timeframe,
    feed: impl RawFeedAdapter + 'static,
) -> (Arc<InMemoryArtifactStore>, TrainingPipeline) {
    let store = Arc::new(InMemoryArtifactStore::new());
    let settings = PipelineSettings::new("ETH", timeframe, kind, layout);
    let pipeline = TrainingPipeline::new(settings, store.clone(), Arc::new(feed));
    (store, pipeline)
}

fn hourly_feed() -> SyntheticFeed {
    SyntheticFeed {
        count: 100,
        step_minutes: 60,
    }
}

fn minute_feed() -> SyntheticFeed {
    SyntheticFeed {
        count: 2_000,
        step_minutes: 1,
    }
}

#[test]
fn test_simple_strategies_predict_finite_values() {
    for kind in [
        ModelKind::LinearRegression,
        ModelKind::Svr,
        ModelKind::KernelRidge,
        ModelKind::BayesianRidge,
    ] {
        let (store, pipeline) = pipeline(kind, FeatureLayout::Simple, Timeframe::OneHour, hourly_feed());
        let (_, artifact) = pipeline.run(&BTreeMap::new()).unwrap();

        assert_eq!(artifact.kind, kind);
        assert_eq!(artifact.training_rows, 99);
        assert!(artifact.scaler.is_none());
        assert!(store.has_model());

        let history = pipeline.load_history().unwrap();
        let prediction = InferenceEngine::predict_latest(&artifact, &history).unwrap();
        assert!(prediction.is_finite(), "{} predicted {}", kind, prediction);
    }
}

#[test]
fn test_rising_hourly_close_trains_and_predicts_every_simple_strategy() {
    for kind in [
        ModelKind::LinearRegression,
        ModelKind::Svr,
        ModelKind::KernelRidge,
        ModelKind::BayesianRidge,
    ] {
        let (_, pipeline) = pipeline(kind, FeatureLayout::Simple, Timeframe::OneHour, RisingFeed);
        let (_, artifact) = pipeline.run(&BTreeMap::new()).unwrap();
        assert_eq!(artifact.training_rows, 99);

        let history = pipeline.load_history().unwrap();
        let closes = history.primary.closes();
        assert!(closes.windows(2).all(|w| w[0] < w[1]));

        let prediction = InferenceEngine::predict_latest(&artifact, &history).unwrap();
        assert!(prediction.is_finite(), "{} predicted {}", kind, prediction);
    }
}

#[test]
fn test_linear_regression_extrapolates_a_rising_close() {
    let (_, pipeline) = pipeline(
        ModelKind::LinearRegression,
        FeatureLayout::Simple,
        Timeframe::OneHour,
        RisingFeed,
    );
    let (_, artifact) = pipeline.run(&BTreeMap::new()).unwrap();
    let history = pipeline.load_history().unwrap();

    // Next close is exactly close + 2
    let prediction = InferenceEngine::predict_latest(&artifact, &history).unwrap();
    assert!((prediction - 3_200.0).abs() < 0.5, "got {}", prediction);
}

#[test]
fn test_linear_regression_tracks_the_price_level() {
    let (_, pipeline) = pipeline(
        ModelKind::LinearRegression,
        FeatureLayout::Simple,
        Timeframe::OneHour,
        hourly_feed(),
    );
    let (_, artifact) = pipeline.run(&BTreeMap::new()).unwrap();
    let history = pipeline.load_history().unwrap();

    let prediction = InferenceEngine::predict_latest(&artifact, &history).unwrap();
    let last_close = history.primary.rows().last().unwrap().close;
    assert!((prediction - last_close).abs() / last_close < 0.05);
}

#[test]
fn test_model_missing_before_training() {
    let (_, pipeline) = pipeline(
        ModelKind::LinearRegression,
        FeatureLayout::Simple,
        Timeframe::OneHour,
        hourly_feed(),
    );

    let err = pipeline.load_artifact().unwrap_err();
    assert!(err.is_artifact_missing());
}

#[test]
fn test_training_without_tables_is_insufficient_data() {
    let (_, pipeline) = pipeline(
        ModelKind::LinearRegression,
        FeatureLayout::Simple,
        Timeframe::OneHour,
        hourly_feed(),
    );

    assert!(matches!(
        pipeline.train(),
        Err(PipelineError::InsufficientData(_))
    ));
}

#[test]
fn test_reloaded_artifact_predicts_identically() {
    for kind in ModelKind::all() {
        let layout = FeatureLayout::for_model(kind, "ETH", "BTC", 10);
        let (timeframe, feed) = if kind == ModelKind::Knn {
            (Timeframe::TenMin, minute_feed())
        } else {
            (Timeframe::OneHour, hourly_feed())
        };
        let (store, pipeline) = pipeline(kind, layout, timeframe, feed);
        let (_, trained) = pipeline.run(&BTreeMap::new()).unwrap();

        let reloaded = ModelArtifact::from_bytes(&store.read_model().unwrap()).unwrap();
        let history = pipeline.load_history().unwrap();

        let before = InferenceEngine::predict_latest(&trained, &history).unwrap();
        let after = InferenceEngine::predict_latest(&reloaded, &history).unwrap();
        assert_eq!(before.to_bits(), after.to_bits(), "{} drifted after reload", kind);
    }
}

#[test]
fn test_lagged_knn_uses_81_standardized_columns() {
    let (store, pipeline) = pipeline(ModelKind::Knn, lagged_layout(), Timeframe::TenMin, minute_feed());
    let (tables, artifact) = pipeline.run(&BTreeMap::new()).unwrap();

    assert_eq!(tables.len(), 2);
    assert_eq!(tables[0].0, "ETH");
    assert_eq!(tables[1].0, "BTC");

    assert_eq!(artifact.width(), 81);
    assert_eq!(artifact.feature_names[0], "open_ETHUSDT_lag1");
    assert_eq!(artifact.feature_names[40], "open_BTCUSDT_lag1");
    assert_eq!(artifact.feature_names[80], "hour_of_day");
    assert!(artifact.scaler.is_some());

    // Persisted dataset: timestamp, 81 features, target
    let dataset = store.read_feature_dataset().unwrap().unwrap();
    assert_eq!(dataset.columns.len(), 83);
    assert_eq!(dataset.columns[82], "target_ETHUSDT");
    assert_eq!(dataset.len(), artifact.training_rows);

    let history = pipeline.load_history().unwrap();
    let prediction = InferenceEngine::predict_latest(&artifact, &history).unwrap();
    assert!(prediction.is_finite());
}

#[test]
fn test_wrong_width_is_a_shape_error() {
    let (_, pipeline) = pipeline(ModelKind::Knn, lagged_layout(), Timeframe::TenMin, minute_feed());
    let (_, artifact) = pipeline.run(&BTreeMap::new()).unwrap();

    let err = InferenceEngine::score(&artifact, &[0.0; 80]).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Shape {
            expected: 81,
            actual: 80
        }
    ));
}

#[test]
fn test_training_and_inference_features_agree() {
    let history = MarketHistory::paired(
        FrameLoader::load_rows(synthetic_rows("ETH", 600, 1)),
        FrameLoader::load_rows(synthetic_rows("BTC", 600, 1)),
    );
    let builder = FeatureBuilder::new(lagged_layout(), Timeframe::TenMin);
    let frame = builder.build(&history).unwrap();

    assert_eq!(frame.width(), 81);
    assert!(frame.targets.last().unwrap().is_none());
    assert!(frame.rows.iter().all(|r| r.len() == 81));

    // Row i targets the close of the bucket that is lag 1 two rows later
    let close_lag1 = frame.feature_names.iter().position(|n| n == "close_ETHUSDT_lag1").unwrap();
    for i in 0..frame.len() - 2 {
        assert_eq!(frame.targets[i], Some(frame.rows[i + 2][close_lag1]));
    }
}

#[tokio::test]
async fn test_worker_update_then_inference() {
    let store = Arc::new(InMemoryArtifactStore::new());
    let settings = PipelineSettings::new("eth", Timeframe::TenMin, ModelKind::Knn, lagged_layout());
    let worker = ForecastWorker::new(
        settings,
        store.clone(),
        Arc::new(SyntheticSource {
            count: 2_000,
            step_minutes: 1,
            recent: 300,
        }),
        Arc::new(minute_feed()),
    );

    let err = worker.inference().await.unwrap_err();
    assert!(err.is_artifact_missing());

    let report = worker.update().await.unwrap();
    assert_eq!(report.downloaded, 2);
    assert_eq!(report.kind, ModelKind::Knn);
    assert!(report.training_rows > 100);
    assert!(store.has_price_table("ETH"));
    assert!(store.has_price_table("BTC"));

    let prediction = worker.inference().await.unwrap();
    assert!(prediction.is_finite());
    assert!((2_500.0..3_500.0).contains(&prediction));
}

#[tokio::test]
async fn test_failed_download_leaves_tables_and_model_untouched() {
    let store = Arc::new(InMemoryArtifactStore::new());
    let settings = PipelineSettings::new(
        "eth",
        Timeframe::OneHour,
        ModelKind::LinearRegression,
        FeatureLayout::Simple,
    );
    let worker = ForecastWorker::new(
        settings,
        store.clone(),
        Arc::new(RejectingSource),
        Arc::new(hourly_feed()),
    );

    let err = worker.update().await.unwrap_err();
    assert!(matches!(err, PipelineError::Pipeline(_)));
    assert!(!store.has_price_table("ETH"));
    assert!(!store.has_model());
}
