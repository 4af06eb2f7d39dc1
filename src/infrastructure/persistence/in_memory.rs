//! In-memory artifact store
//!
//! Same contract as the file store, held behind a lock. Used by tests and
//! by callers that want a throwaway pipeline without touching disk.

use super::csv_codec;
use crate::domain::errors::PipelineError;
use crate::domain::market::{PriceTable, RawFrame};
use crate::domain::ml::FeatureFrame;
use crate::domain::ports::ArtifactStore;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Default)]
struct Artifacts {
    tables: HashMap<String, Vec<u8>>,
    dataset: Option<Vec<u8>>,
    model: Option<Vec<u8>>,
}

/// Tables and the dataset are kept CSV-encoded so reads go through the same
/// decoding path as the file store.
#[derive(Default)]
pub struct InMemoryArtifactStore {
    artifacts: RwLock<Artifacts>,
}

impl InMemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Artifacts>, PipelineError> {
        self.artifacts
            .read()
            .map_err(|_| PipelineError::pipeline("artifact store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Artifacts>, PipelineError> {
        self.artifacts
            .write()
            .map_err(|_| PipelineError::pipeline("artifact store lock poisoned"))
    }

    pub fn has_price_table(&self, token: &str) -> bool {
        self.read()
            .map(|a| a.tables.contains_key(&token.to_uppercase()))
            .unwrap_or(false)
    }

    pub fn has_model(&self) -> bool {
        self.read().map(|a| a.model.is_some()).unwrap_or(false)
    }

    /// Seeds a canonical table as raw CSV text, bypassing encoding
    pub fn insert_raw_table(&self, token: &str, csv: &str) -> Result<(), PipelineError> {
        self.write()?
            .tables
            .insert(token.to_uppercase(), csv.as_bytes().to_vec());
        Ok(())
    }
}

impl ArtifactStore for InMemoryArtifactStore {
    fn read_price_table(&self, token: &str) -> Result<Option<RawFrame>, PipelineError> {
        self.read()?
            .tables
            .get(&token.to_uppercase())
            .map(|bytes| csv_codec::decode_frame(bytes))
            .transpose()
    }

    fn write_price_table(&self, token: &str, table: &PriceTable) -> Result<(), PipelineError> {
        let bytes = csv_codec::encode_price_table(table)?;
        self.write()?.tables.insert(token.to_uppercase(), bytes);
        Ok(())
    }

    fn remove_price_table(&self, token: &str) -> Result<bool, PipelineError> {
        Ok(self.write()?.tables.remove(&token.to_uppercase()).is_some())
    }

    fn write_feature_dataset(&self, frame: &FeatureFrame) -> Result<(), PipelineError> {
        let bytes = csv_codec::encode_feature_dataset(frame)?;
        self.write()?.dataset = Some(bytes);
        Ok(())
    }

    fn read_feature_dataset(&self) -> Result<Option<RawFrame>, PipelineError> {
        self.read()?
            .dataset
            .as_deref()
            .map(csv_codec::decode_frame)
            .transpose()
    }

    fn read_model(&self) -> Result<Vec<u8>, PipelineError> {
        self.read()?
            .model
            .clone()
            .ok_or_else(|| PipelineError::ArtifactNotFound {
                path: "<memory>".to_string(),
            })
    }

    fn write_model(&self, bytes: &[u8]) -> Result<(), PipelineError> {
        self.write()?.model = Some(bytes.to_vec());
        Ok(())
    }
}
