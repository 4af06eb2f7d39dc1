//! Update and inference orchestration
//!
//! [`TrainingPipeline`] is the synchronous core: normalize raw fragments,
//! rebuild features from the canonical tables, fit, persist. [`ForecastWorker`]
//! wraps it for async callers, running downloads on the runtime and the
//! CPU-bound pipeline on the blocking pool. Every call re-reads its inputs
//! from the store; nothing is cached between requests.

use crate::application::market_data::{FrameLoader, NormalizeOutcome, RawFeedNormalizer};
use crate::application::ml::trainer::training_set_from_frame;
use crate::application::ml::{
    FeatureBuilder, InferenceEngine, MarketHistory, ModelArtifact, ModelTrainer,
};
use crate::config::Config;
use crate::domain::errors::PipelineError;
use crate::domain::market::{PriceTable, Timeframe};
use crate::domain::ml::{FeatureLayout, ModelKind};
use crate::domain::ports::{ArtifactStore, PriceHistorySource, RawFeedAdapter};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

/// The subset of [`Config`] the pipeline needs
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub token: String,
    pub timeframe: Timeframe,
    pub training_days: u32,
    pub kind: ModelKind,
    pub layout: FeatureLayout,
}

impl PipelineSettings {
    pub fn new(token: &str, timeframe: Timeframe, kind: ModelKind, layout: FeatureLayout) -> Self {
        Self {
            token: token.to_uppercase(),
            timeframe,
            training_days: 30,
            kind,
            layout,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let layout = FeatureLayout::for_model(
            config.model.kind,
            &config.token,
            &config.model.reference_token,
            config.model.lag_depth,
        );
        Self {
            token: config.token.clone(),
            timeframe: config.timeframe,
            training_days: config.training_days,
            kind: config.model.kind,
            layout,
        }
    }

    /// Tokens whose history the configured layout needs, primary first
    pub fn tokens(&self) -> Vec<String> {
        self.layout
            .tokens(&self.token)
            .into_iter()
            .map(str::to_string)
            .collect()
    }
}

/// Summary of one completed update
#[derive(Debug, Clone)]
pub struct UpdateReport {
    pub downloaded: usize,
    pub tables: Vec<(String, NormalizeOutcome)>,
    pub kind: ModelKind,
    pub training_rows: usize,
}

pub struct TrainingPipeline {
    settings: PipelineSettings,
    store: Arc<dyn ArtifactStore>,
    normalizer: RawFeedNormalizer,
}

impl TrainingPipeline {
    pub fn new(
        settings: PipelineSettings,
        store: Arc<dyn ArtifactStore>,
        adapter: Arc<dyn RawFeedAdapter>,
    ) -> Self {
        Self {
            normalizer: RawFeedNormalizer::new(adapter, store.clone()),
            settings,
            store,
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Force-rebuilds the canonical table of every token the layout needs
    pub fn refresh_tables(
        &self,
        new_fragments: &BTreeMap<String, Vec<String>>,
    ) -> Result<Vec<(String, NormalizeOutcome)>, PipelineError> {
        let mut outcomes = Vec::new();
        for token in self.settings.tokens() {
            let fresh = new_fragments.get(&token).map(Vec::as_slice).unwrap_or(&[]);
            let outcome = self.normalizer.normalize(&token, fresh, true)?;
            if let NormalizeOutcome::NoData { fragments } = outcome {
                warn!(
                    "TrainingPipeline: no price rows for {} ({} fragments)",
                    token, fragments
                );
            }
            outcomes.push((token, outcome));
        }
        Ok(outcomes)
    }

    fn load_table(&self, token: &str) -> Result<PriceTable, PipelineError> {
        let frame = self.store.read_price_table(token)?.ok_or_else(|| {
            PipelineError::InsufficientData(format!(
                "no canonical price table for {}; run an update first",
                token
            ))
        })?;
        FrameLoader::load(&frame)
    }

    /// Canonical history for the configured layout, as stored
    pub fn load_history(&self) -> Result<MarketHistory, PipelineError> {
        let primary = self.load_table(&self.settings.token)?;
        let reference = match &self.settings.layout {
            FeatureLayout::Simple => None,
            FeatureLayout::Lagged { reference, .. } => Some(self.load_table(reference)?),
        };
        Ok(MarketHistory { primary, reference })
    }

    /// Builds features from the stored tables, fits and persists the model
    pub fn train(&self) -> Result<ModelArtifact, PipelineError> {
        let history = self.load_history()?;
        let builder = FeatureBuilder::new(self.settings.layout.clone(), self.settings.timeframe);
        let frame = builder.build(&history)?;

        let set = match &self.settings.layout {
            FeatureLayout::Simple => frame.training_set()?,
            FeatureLayout::Lagged { .. } => {
                // The persisted dataset is what the model is fitted on
                self.store.write_feature_dataset(&frame)?;
                let stored = self.store.read_feature_dataset()?.ok_or_else(|| {
                    PipelineError::pipeline("lagged feature dataset missing after write")
                })?;
                training_set_from_frame(&stored, &self.settings.layout)?
            }
        };

        let trainer = ModelTrainer::new(
            self.settings.kind,
            self.settings.layout.clone(),
            self.settings.timeframe,
        );
        let artifact = trainer.train(&set)?;
        self.store.write_model(&artifact.to_bytes()?)?;

        info!(
            "TrainingPipeline: saved {} model trained on {} rows",
            artifact.kind, artifact.training_rows
        );
        Ok(artifact)
    }

    /// Refresh then train
    pub fn run(
        &self,
        new_fragments: &BTreeMap<String, Vec<String>>,
    ) -> Result<(Vec<(String, NormalizeOutcome)>, ModelArtifact), PipelineError> {
        let tables = self.refresh_tables(new_fragments)?;
        let artifact = self.train()?;
        Ok((tables, artifact))
    }

    pub fn load_artifact(&self) -> Result<ModelArtifact, PipelineError> {
        ModelArtifact::from_bytes(&self.store.read_model()?)
    }
}

/// Async facade used by the HTTP surface and the CLI
pub struct ForecastWorker {
    pipeline: Arc<TrainingPipeline>,
    source: Arc<dyn PriceHistorySource>,
}

async fn blocking<T, F>(task: F) -> Result<T, PipelineError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, PipelineError> + Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| PipelineError::pipeline(format!("pipeline task failed: {}", e)))?
}

impl ForecastWorker {
    pub fn new(
        settings: PipelineSettings,
        store: Arc<dyn ArtifactStore>,
        source: Arc<dyn PriceHistorySource>,
        adapter: Arc<dyn RawFeedAdapter>,
    ) -> Self {
        Self {
            pipeline: Arc::new(TrainingPipeline::new(settings, store, adapter)),
            source,
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        self.pipeline.settings()
    }

    /// Token this worker forecasts
    pub fn token(&self) -> &str {
        &self.settings().token
    }

    /// Downloads fresh history, rebuilds the canonical tables and retrains
    pub async fn update(&self) -> Result<UpdateReport, PipelineError> {
        let settings = self.settings();
        let mut new_fragments = BTreeMap::new();
        for token in settings.tokens() {
            let fragments = self
                .source
                .download_history(&token, settings.training_days)
                .await?;
            info!(
                "ForecastWorker: {} new fragments for {}",
                fragments.len(),
                token
            );
            new_fragments.insert(token, fragments);
        }
        let downloaded = new_fragments.values().map(Vec::len).sum();

        let pipeline = self.pipeline.clone();
        let (tables, artifact) = blocking(move || pipeline.run(&new_fragments)).await?;

        Ok(UpdateReport {
            downloaded,
            tables,
            kind: artifact.kind,
            training_rows: artifact.training_rows,
        })
    }

    /// Predicts the next close for the configured token from the freshest rows.
    ///
    /// Fails with `ArtifactNotFound` before touching the network when no model exists.
    pub async fn inference(&self) -> Result<f64, PipelineError> {
        let pipeline = self.pipeline.clone();
        let artifact = blocking(move || pipeline.load_artifact()).await?;

        let lookback = artifact
            .timeframe
            .lookback_minutes(artifact.layout.warmup_buckets() + 2);

        let mut tables = Vec::new();
        for token in artifact.layout.tokens(&self.settings().token) {
            let rows = self.source.fetch_recent(token, lookback).await?;
            tables.push(FrameLoader::load_rows(rows));
        }
        let mut tables = tables.into_iter();
        let history = MarketHistory {
            primary: tables.next().unwrap_or_default(),
            reference: tables.next(),
        };

        let prediction = blocking(move || InferenceEngine::predict_latest(&artifact, &history)).await?;
        info!(
            "ForecastWorker: {} next close prediction {}",
            self.token(),
            prediction
        );
        Ok(prediction)
    }
}
