//! HTTP handlers for the REST API.
//!
//! Each handler validates the raw body, decodes it, and hands the
//! CPU-bound forecasting work to the blocking thread pool.

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use super::dto::HealthResponse;
use super::error::AppError;
use super::state::AppState;
use crate::api::{DemandRequest, DemandResponse, SupplierPerformanceRequest, SupplierPerformanceResponse};
use crate::services::{self, validation};

/// Result type for handlers.
pub type HandlerResult<T> = Result<Json<T>, AppError>;

/// Decode a validated body, reporting the failing field path.
fn decode<T: DeserializeOwned>(body: Value) -> Result<T, AppError> {
    serde_path_to_error::deserialize(body).map_err(|e| AppError::Invalid {
        message: "Invalid input data".to_string(),
        details: vec![format!("{}: {}", e.path(), e.inner())],
    })
}

/// Reject a body with validation issues.
fn check(issues: Vec<String>) -> Result<(), AppError> {
    if !issues.is_empty() {
        warn!(?issues, "Returning 400 error");
    }
    validation::ensure_valid(issues).map_err(AppError::from)
}

// =============================================================================
// Health Check
// =============================================================================

/// GET /health
pub async fn health_check() -> HandlerResult<HealthResponse> {
    Ok(Json(HealthResponse::ok()))
}

// =============================================================================
// Forecast Endpoints
// =============================================================================

/// POST /predict/demand
///
/// Forecast demand for a location/model pair.
pub async fn predict_demand(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> HandlerResult<DemandResponse> {
    let Json(body) = body?;
    let settings = state.config.forecast.clone();
    check(validation::validate_demand(&body, settings.max_future_periods))?;
    let request: DemandRequest = decode(body)?;

    let response = tokio::task::spawn_blocking(move || services::forecast_demand(&request, &settings))
        .await
        .map_err(|e| AppError::Internal(format!("Task join error: {}", e)))??;

    Ok(Json(response))
}

/// POST /predict/supplier-performance
///
/// Forecast quality rating and lead-time reliability for a supplier.
pub async fn predict_supplier_performance(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> HandlerResult<SupplierPerformanceResponse> {
    let Json(body) = body?;
    let settings = state.config.forecast.clone();
    check(validation::validate_supplier(&body, settings.max_future_periods))?;
    let request: SupplierPerformanceRequest = decode(body)?;

    let response = tokio::task::spawn_blocking(move || {
        services::forecast_supplier_performance(&request, &settings)
    })
    .await
    .map_err(|e| AppError::Internal(format!("Task join error: {}", e)))??;

    Ok(Json(response))
}
