//! Worker API
//!
//! - `GET /inference/{token}`: next-close prediction as a bare JSON number
//! - `GET /update`: download, normalize and retrain
//! - `GET /health`: liveness

use super::error::ApiError;
use crate::application::worker::ForecastWorker;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{error, info};

pub struct AppState {
    pub worker: ForecastWorker,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/inference", get(missing_token))
        .route("/inference/", get(missing_token))
        .route("/inference/{token}", get(inference))
        .route("/update", get(update))
        .route("/health", get(health))
        .with_state(state)
}

pub(crate) async fn missing_token() -> ApiError {
    ApiError::BadRequest("Token is required".to_string())
}

pub(crate) async fn inference(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> Result<Response, ApiError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(ApiError::BadRequest("Token is required".to_string()));
    }
    if token.to_uppercase() != state.worker.token() {
        return Err(ApiError::BadRequest("Token not supported".to_string()));
    }

    let prediction = state
        .worker
        .inference()
        .await
        .map_err(ApiError::from_inference)?;
    if !prediction.is_finite() {
        return Err(ApiError::Inference(format!(
            "Prediction is not a finite number: {}",
            prediction
        )));
    }

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        prediction.to_string(),
    )
        .into_response())
}

pub(crate) async fn update(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    match state.worker.update().await {
        Ok(report) => {
            info!(
                "Update complete: {} new fragments, {} model on {} rows",
                report.downloaded, report.kind, report.training_rows
            );
            Ok(Json(json!({ "status": "success" })))
        }
        Err(e) => {
            error!("Update failed: {}", e);
            Err(ApiError::UpdateFailed(e.to_string()))
        }
    }
}

pub(crate) async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::worker::PipelineSettings;
    use crate::domain::errors::PipelineError;
    use crate::domain::market::{DataProvider, PriceRow, Timeframe};
    use crate::domain::ml::{FeatureLayout, ModelKind};
    use crate::domain::ports::{PriceHistorySource, RawFeedAdapter};
    use crate::infrastructure::persistence::InMemoryArtifactStore;
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone, Utc};

    struct HourlyRows;

    fn hourly_rows(n: usize) -> Vec<PriceRow> {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        (0..n)
            .map(|i| {
                let t = i as f64;
                let base = 3000.0 + (t * 0.3).sin() * 25.0 + t;
                PriceRow::new(
                    start + Duration::hours(i as i64),
                    base,
                    base + 4.0 + (t * 0.7).cos().abs() * 3.0,
                    base - 3.0 - (t * 1.1).sin().abs() * 2.0,
                    base + (t * 0.5).cos() * 2.0,
                )
            })
            .collect()
    }

    #[async_trait]
    impl PriceHistorySource for HourlyRows {
        async fn download_history(&self, _token: &str, _days: u32) -> Result<Vec<String>, PipelineError> {
            Ok(vec!["day-1".to_string()])
        }

        async fn fetch_recent(&self, _token: &str, _lookback_minutes: usize) -> Result<Vec<PriceRow>, PipelineError> {
            Ok(hourly_rows(10))
        }
    }

    struct Fragments {
        rows: usize,
    }

    impl RawFeedAdapter for Fragments {
        fn provider(&self) -> DataProvider {
            DataProvider::Binance
        }

        fn list_fragments(&self, _token: &str) -> Result<Vec<String>, PipelineError> {
            Ok(vec!["day-1".to_string()])
        }

        fn normalize(&self, _fragment: &str) -> Result<Vec<PriceRow>, PipelineError> {
            Ok(hourly_rows(self.rows))
        }
    }

    fn state(rows: usize) -> Arc<AppState> {
        let settings = PipelineSettings::new(
            "eth",
            Timeframe::OneHour,
            ModelKind::LinearRegression,
            FeatureLayout::Simple,
        );
        let worker = ForecastWorker::new(
            settings,
            Arc::new(InMemoryArtifactStore::new()),
            Arc::new(HourlyRows),
            Arc::new(Fragments { rows }),
        );
        Arc::new(AppState { worker })
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let Json(body) = health().await;
        assert_eq!(body, json!({ "status": "ok" }));
    }

    #[tokio::test]
    async fn test_missing_token() {
        let response = missing_token().await.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await, json!({ "error": "Token is required" }));
    }

    #[tokio::test]
    async fn test_unsupported_token() {
        let err = inference(State(state(100)), Path("btc".to_string()))
            .await
            .unwrap_err();
        let response = err.into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await, json!({ "error": "Token not supported" }));
    }

    #[tokio::test]
    async fn test_inference_before_update_reports_missing_model() {
        let err = inference(State(state(100)), Path("ETH".to_string()))
            .await
            .unwrap_err();
        let response = err.into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_json(response).await,
            json!({ "error": "Model not found. Please update first." })
        );
    }

    #[tokio::test]
    async fn test_update_then_inference() {
        let state = state(100);
        let Json(body) = update(State(state.clone())).await.unwrap();
        assert_eq!(body, json!({ "status": "success" }));

        let response = inference(State(state), Path("eth".to_string()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/json"
        );

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let prediction: f64 = std::str::from_utf8(&bytes).unwrap().parse().unwrap();
        assert!(prediction.is_finite());
    }

    #[tokio::test]
    async fn test_failed_update() {
        let err = update(State(state(0))).await.unwrap_err();
        let response = err.into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["status"], "failed");
        assert!(body["error"].as_str().is_some());
    }
}
