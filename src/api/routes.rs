//! API route definitions.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use super::error::ApiError;
use super::state::AppState;
use crate::analysis::AnalysisResult;
use crate::suggest::{self, Recommendations};
use crate::topology::{self, Topology, ValidationReport};

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/topology/validate", post(validate_topology))
        .route("/analyze", post(analyze))
        .route("/suggest-fix", post(suggest_fix))
        .route("/model/reload", post(reload_model))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "model_loaded": state.analyzer.models().is_loaded(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn validate_topology(
    payload: Result<Json<Topology>, JsonRejection>,
) -> Result<Json<ValidationReport>, ApiError> {
    let Json(topology) = payload?;
    Ok(Json(topology::validate(&topology)?))
}

async fn analyze(
    State(state): State<AppState>,
    payload: Result<Json<Topology>, JsonRejection>,
) -> Result<Json<AnalysisResult>, ApiError> {
    let Json(topology) = payload?;
    let result = state.analyzer.analyze(&topology).await?;
    Ok(Json(result))
}

async fn suggest_fix(payload: Result<Json<Value>, JsonRejection>) -> Result<Json<Recommendations>, ApiError> {
    let Json(analysis) = payload?;
    Ok(Json(suggest::suggest_value(&analysis)?))
}

async fn reload_model(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let models = state.analyzer.models().clone();
    let scorer = tokio::task::spawn_blocking(move || models.reload())
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;
    tracing::info!("model artifact reloaded");
    Ok(Json(json!({
        "reloaded": true,
        "feature_count": scorer.feature_names().len(),
    })))
}
