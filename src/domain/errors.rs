use thiserror::Error;

/// Errors raised anywhere in the ingest, training or inference pipeline
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Unsupported provider, model kind or malformed setting. Raised before any data is touched.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// No usable timestamp (or OHLC) column in a frame
    #[error("Schema error: {0}")]
    Schema(String),

    /// Feature/target matrices are empty after transformation
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Model artifact not found at {path}")]
    ArtifactNotFound { path: String },

    #[error("Feature vector has wrong width: expected {expected}, got {actual}")]
    Shape { expected: usize, actual: usize },

    /// Download, parse or fit failures not otherwise classified
    #[error("{0}")]
    Pipeline(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP error: {0}")]
    HttpMiddleware(#[from] reqwest_middleware::Error),
}

impl PipelineError {
    pub fn pipeline(msg: impl Into<String>) -> Self {
        PipelineError::Pipeline(msg.into())
    }

    /// True when inference failed only because no model has been trained yet
    pub fn is_artifact_missing(&self) -> bool {
        matches!(self, PipelineError::ArtifactNotFound { .. })
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
