use crate::domain::errors::PipelineError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

pub const MODEL_MISSING_MESSAGE: &str = "Model not found. Please update first.";

/// Error responses of the worker API
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("bad_request: {0}")]
    BadRequest(String),
    /// Inference before any model was trained
    #[error("Model not found. Please update first.")]
    ModelMissing,
    #[error("inference_error: {0}")]
    Inference(String),
    #[error("update_failed: {0}")]
    UpdateFailed(String),
}

impl ApiError {
    pub fn from_inference(e: PipelineError) -> Self {
        if e.is_artifact_missing() {
            Self::ModelMissing
        } else {
            Self::Inference(e.to_string())
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            Self::ModelMissing => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": MODEL_MISSING_MESSAGE }),
            ),
            Self::Inference(msg) => (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": msg })),
            Self::UpdateFailed(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "status": "failed", "error": msg }),
            ),
        };
        (status, axum::Json(body)).into_response()
    }
}
