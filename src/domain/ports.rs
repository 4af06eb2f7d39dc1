use crate::domain::errors::PipelineError;
use crate::domain::market::{DataProvider, PriceRow, PriceTable, RawFrame};
use crate::domain::ml::FeatureFrame;
use async_trait::async_trait;

/// Converts one provider's raw fragments into canonical price rows
pub trait RawFeedAdapter: Send + Sync {
    fn provider(&self) -> DataProvider;

    /// Identifiers of every fragment available locally for `token`, sorted and deduplicated
    fn list_fragments(&self, token: &str) -> Result<Vec<String>, PipelineError>;

    /// Rows of one fragment, corrupt (beyond-2100) rows already discarded
    fn normalize(&self, fragment: &str) -> Result<Vec<PriceRow>, PipelineError>;
}

/// Remote source of price history for one provider
#[async_trait]
pub trait PriceHistorySource: Send + Sync {
    /// Downloads missing historical fragments for `token`, returning the newly stored ones
    async fn download_history(&self, token: &str, days: u32)
    -> Result<Vec<String>, PipelineError>;

    /// Freshest rows covering at least the last `lookback_minutes`
    async fn fetch_recent(
        &self,
        token: &str,
        lookback_minutes: usize,
    ) -> Result<Vec<PriceRow>, PipelineError>;
}

/// Persistence for the canonical tables, the lagged dataset and the model artifact
pub trait ArtifactStore: Send + Sync {
    /// Canonical table for `token` as stored, or `None` when it has never been written
    fn read_price_table(&self, token: &str) -> Result<Option<RawFrame>, PipelineError>;

    fn write_price_table(&self, token: &str, table: &PriceTable) -> Result<(), PipelineError>;

    /// Returns true when a table existed and was removed
    fn remove_price_table(&self, token: &str) -> Result<bool, PipelineError>;

    /// Writes the rows of `frame` that have a target
    fn write_feature_dataset(&self, frame: &FeatureFrame) -> Result<(), PipelineError>;

    fn read_feature_dataset(&self) -> Result<Option<RawFrame>, PipelineError>;

    /// Serialized model, or `PipelineError::ArtifactNotFound`
    fn read_model(&self) -> Result<Vec<u8>, PipelineError>;

    /// Overwrites any existing model
    fn write_model(&self, bytes: &[u8]) -> Result<(), PipelineError>;
}
