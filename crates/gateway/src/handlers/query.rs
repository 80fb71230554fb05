//! Question answering handler

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use ragserve_common::{
    errors::{AppError, Result},
    pipeline::{Query, DEFAULT_TOP_K},
    SearchHit,
};
use serde::{Deserialize, Serialize};
use tracing::warn;
use validator::Validate;

use crate::AppState;

/// Query request
#[derive(Debug, Deserialize, Validate)]
pub struct QueryRequest {
    #[validate(length(min = 1))]
    pub question: String,

    #[serde(default = "default_top_k")]
    #[validate(range(min = 1, max = 10))]
    pub top_k: usize,
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

/// Query response
#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub answer: String,
    pub contexts: Vec<SearchHit>,
}

/// Answer a question from the indexed documents
pub async fn query(
    State(state): State<AppState>,
    payload: std::result::Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResponse>> {
    let Json(request) = payload.map_err(|e| AppError::Validation {
        message: e.body_text(),
        field: None,
    })?;

    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: e.field_errors().keys().next().map(|k| k.to_string()),
    })?;

    let query = Query::new(request.question, Some(request.top_k))?;

    let timeout = state.config.request_timeout();
    let outcome = tokio::time::timeout(timeout, state.pipeline.handle_query(&query))
        .await
        .map_err(|_| AppError::Timeout {
            operation: "query".to_string(),
            timeout_ms: timeout.as_millis() as u64,
        })?;

    match outcome {
        Ok(answer) => Ok(Json(QueryResponse {
            answer: answer.answer,
            contexts: answer.contexts,
        })),
        Err(failure) => {
            if !failure.contexts.is_empty() {
                let ids: Vec<&str> = failure.contexts.iter().map(|h| h.id.as_str()).collect();
                warn!(context_ids = ?ids, "Discarding retrieved contexts of failed query");
            }
            Err(failure.into())
        }
    }
}
