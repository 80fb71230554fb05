//! Service info, liveness and warm-up handlers

use axum::{extract::State, Json};
use ragserve_common::errors::{AppError, Result};
use serde::Serialize;
use tracing::info;

use crate::AppState;

#[derive(Serialize)]
pub struct ServiceInfo {
    pub service: String,
    pub version: String,
    pub build_sha: String,
    pub image_tag: String,
    pub env: String,
    pub embedding_model: String,
    pub embedding_dimension: usize,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: String,
    pub version: String,
    pub build_sha: String,
    pub image_tag: String,
    pub env: String,
}

#[derive(Serialize)]
pub struct WarmupResponse {
    pub status: &'static str,
    pub embedding_dimension: usize,
}

/// Build metadata and the embedding backend in use
///
/// Reports the configured model before the backend is initialized; never
/// initializes it.
pub async fn root(State(state): State<AppState>) -> Json<ServiceInfo> {
    let service = &state.config.service;
    let embedder = state.pipeline.embedder();
    Json(ServiceInfo {
        service: service.name.clone(),
        version: service.version.clone(),
        build_sha: service.build_sha.clone(),
        image_tag: service.image_tag.clone(),
        env: service.env.clone(),
        embedding_model: embedder.model_name().to_string(),
        embedding_dimension: embedder.dimension(),
    })
}

/// Liveness probe - always returns ok if the server is running
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let service = &state.config.service;
    Json(HealthResponse {
        status: "ok",
        service: service.name.clone(),
        version: service.version.clone(),
        build_sha: service.build_sha.clone(),
        image_tag: service.image_tag.clone(),
        env: service.env.clone(),
    })
}

/// Force the embedding backend to initialize
pub async fn warmup(State(state): State<AppState>) -> Result<Json<WarmupResponse>> {
    let timeout = state.config.request_timeout();
    let report = tokio::time::timeout(timeout, state.pipeline.warmup())
        .await
        .map_err(|_| AppError::Timeout {
            operation: "warmup".to_string(),
            timeout_ms: timeout.as_millis() as u64,
        })?
        .map_err(|e| AppError::Other(anyhow::anyhow!("Warmup failed: {}", e)))?;

    info!(dimension = report.embedding_dimension, "Warm-up requested");
    Ok(Json(WarmupResponse {
        status: "ok",
        embedding_dimension: report.embedding_dimension,
    }))
}
