use super::csv_codec;
use crate::config::{Config, price_table_path};
use crate::domain::errors::PipelineError;
use crate::domain::market::{PriceTable, RawFrame};
use crate::domain::ml::FeatureFrame;
use crate::domain::ports::ArtifactStore;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Artifacts as flat files under the configured data directory
pub struct FileArtifactStore {
    base_path: PathBuf,
    dataset_path: PathBuf,
    model_path: PathBuf,
}

impl FileArtifactStore {
    pub fn new(base_path: impl Into<PathBuf>, model_path: impl Into<PathBuf>) -> Self {
        let base_path = base_path.into();
        Self {
            dataset_path: base_path.join("lagged_features.csv"),
            model_path: model_path.into(),
            base_path,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            base_path: config.data_base_path.clone(),
            dataset_path: config.feature_dataset_path(),
            model_path: config.model_file_path.clone(),
        }
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, PipelineError> {
        match fs::read(path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Atomic write: write to temp file then rename
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), PipelineError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    let temp_path = path.with_extension("tmp");
    fs::write(&temp_path, bytes)?;
    fs::rename(&temp_path, path)?;
    debug!("FileArtifactStore: wrote {} bytes to {:?}", bytes.len(), path);
    Ok(())
}

impl ArtifactStore for FileArtifactStore {
    fn read_price_table(&self, token: &str) -> Result<Option<RawFrame>, PipelineError> {
        Self::read_optional(&price_table_path(&self.base_path, token))?
            .map(|bytes| csv_codec::decode_frame(&bytes))
            .transpose()
    }

    fn write_price_table(&self, token: &str, table: &PriceTable) -> Result<(), PipelineError> {
        let path = price_table_path(&self.base_path, token);
        write_atomic(&path, &csv_codec::encode_price_table(table)?)?;
        info!("FileArtifactStore: saved {} rows to {:?}", table.len(), path);
        Ok(())
    }

    fn remove_price_table(&self, token: &str) -> Result<bool, PipelineError> {
        match fs::remove_file(price_table_path(&self.base_path, token)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn write_feature_dataset(&self, frame: &FeatureFrame) -> Result<(), PipelineError> {
        write_atomic(&self.dataset_path, &csv_codec::encode_feature_dataset(frame)?)?;
        info!("FileArtifactStore: saved feature dataset to {:?}", self.dataset_path);
        Ok(())
    }

    fn read_feature_dataset(&self) -> Result<Option<RawFrame>, PipelineError> {
        Self::read_optional(&self.dataset_path)?
            .map(|bytes| csv_codec::decode_frame(&bytes))
            .transpose()
    }

    fn read_model(&self) -> Result<Vec<u8>, PipelineError> {
        Self::read_optional(&self.model_path)?.ok_or_else(|| PipelineError::ArtifactNotFound {
            path: self.model_path.display().to_string(),
        })
    }

    fn write_model(&self, bytes: &[u8]) -> Result<(), PipelineError> {
        write_atomic(&self.model_path, bytes)?;
        info!("FileArtifactStore: model saved to {:?}", self.model_path);
        Ok(())
    }
}
