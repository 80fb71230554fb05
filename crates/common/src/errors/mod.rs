//! Error types for RagServe services
//!
//! Provides the error handling system shared by the gateway and the
//! ingestion tool:
//! - Distinct error types per pipeline stage (embed, search, synthesize)
//! - HTTP status code mapping
//! - Structured error responses
//! - Error codes for client handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Stage of the query pipeline an error originated from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Embed,
    Search,
    Synthesize,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Embed => "embed",
            PipelineStage::Search => "search",
            PipelineStage::Synthesize => "synthesize",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (1xxx)
    ValidationError,

    // External service errors (8xxx)
    UpstreamError,
    EmbeddingError,
    SearchError,
    SynthesisError,
    Timeout,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
    SerializationError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            ErrorCode::ValidationError => 1001,

            ErrorCode::UpstreamError => 8001,
            ErrorCode::EmbeddingError => 8002,
            ErrorCode::SearchError => 8003,
            ErrorCode::SynthesisError => 8004,
            ErrorCode::Timeout => 8005,

            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
            ErrorCode::SerializationError => 9003,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    // Pipeline stage errors
    #[error("Embedding failed: {message}")]
    Embedding { message: String },

    #[error("Search failed: {message}")]
    Search { message: String },

    #[error("Answer synthesis failed: {message}")]
    Synthesis { message: String },

    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    // Internal errors
    #[error("Internal server error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::Embedding { .. } => ErrorCode::EmbeddingError,
            AppError::Search { .. } => ErrorCode::SearchError,
            AppError::Synthesis { .. } => ErrorCode::SynthesisError,
            AppError::Timeout { .. } => ErrorCode::Timeout,
            AppError::HttpClient(_) => ErrorCode::UpstreamError,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Pipeline stage this error belongs to, if any
    pub fn stage(&self) -> Option<PipelineStage> {
        match self {
            AppError::Embedding { .. } => Some(PipelineStage::Embed),
            AppError::Search { .. } => Some(PipelineStage::Search),
            AppError::Synthesis { .. } => Some(PipelineStage::Synthesize),
            _ => None,
        }
    }

    /// Wrap any error as a failure of the given stage, keeping its message
    pub fn at_stage(stage: PipelineStage, err: AppError) -> Self {
        if err.stage() == Some(stage) {
            return err;
        }
        let message = err.to_string();
        match stage {
            PipelineStage::Embed => AppError::Embedding { message },
            PipelineStage::Search => AppError::Search { message },
            PipelineStage::Synthesize => AppError::Synthesis { message },
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,

            // 504 Gateway Timeout
            AppError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,

            // 500 Internal Server Error: every stage failure is a service failure
            AppError::Embedding { .. }
            | AppError::Search { .. }
            | AppError::Synthesis { .. }
            | AppError::HttpClient(_)
            | AppError::Internal { .. }
            | AppError::Configuration { .. }
            | AppError::Serialization(_)
            | AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Check if this error is a client error
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

/// Structured error response for API
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let stage = self.stage();
        let message = self.to_string();

        if self.is_server_error() {
            tracing::error!(
                error = %message,
                code = ?code,
                stage = stage.map(|s| s.as_str()),
                status = status.as_u16(),
                "Server error"
            );
        } else if self.is_client_error() {
            tracing::warn!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Client error"
            );
        }

        let body = ErrorResponse {
            error: ErrorDetails {
                code,
                message,
                details: stage.map(|s| serde_json::json!({ "stage": s })),
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error() {
        let err = AppError::Validation {
            message: "top_k out of range".into(),
            field: Some("top_k".into()),
        };
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.stage(), None);
        assert!(!err.is_server_error());
        assert!(err.is_client_error());
    }

    #[test]
    fn test_stage_errors_are_service_failures() {
        let errors = [
            AppError::Embedding { message: "backend down".into() },
            AppError::Search { message: "503".into() },
            AppError::Synthesis { message: "bad gateway".into() },
        ];
        for err in &errors {
            assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
            assert!(err.is_server_error());
        }
        assert_eq!(errors[0].stage(), Some(PipelineStage::Embed));
        assert_eq!(errors[1].stage(), Some(PipelineStage::Search));
        assert_eq!(errors[2].stage(), Some(PipelineStage::Synthesize));
    }

    #[test]
    fn test_at_stage_wraps_configuration_error() {
        let err = AppError::Configuration {
            message: "OPENAI_API_KEY is not set".into(),
        };
        let wrapped = AppError::at_stage(PipelineStage::Synthesize, err);
        assert_eq!(wrapped.code(), ErrorCode::SynthesisError);
        assert!(wrapped.to_string().contains("OPENAI_API_KEY is not set"));
    }

    #[test]
    fn test_at_stage_keeps_matching_stage() {
        let err = AppError::Search { message: "index missing".into() };
        let wrapped = AppError::at_stage(PipelineStage::Search, err);
        assert_eq!(wrapped.to_string(), "Search failed: index missing");
    }

    #[test]
    fn test_error_code_wire_format() {
        let json = serde_json::to_string(&ErrorCode::SynthesisError).unwrap();
        assert_eq!(json, "\"SYNTHESIS_ERROR\"");
        assert_eq!(ErrorCode::SearchError.as_code(), 8003);
    }
}
