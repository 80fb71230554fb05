//! Configuration management for RagServe services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default, config/{APP_ENV}, config/local)
//! - Default values
//!
//! Every field has a default so the gateway can start and answer liveness
//! probes with no configuration at all. Missing credentials are reported by
//! the component that needs them, when it is first used.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Build and deployment metadata
    #[serde(default)]
    pub service: ServiceConfig,

    /// Embedding backend configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Hybrid search index configuration
    #[serde(default)]
    pub search: SearchConfig,

    /// Completion provider configuration
    #[serde(default)]
    pub llm: LlmConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Ingestion tool configuration
    #[serde(default)]
    pub ingestion: IngestionConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Boundary timeout for query and warm-up requests, in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Shutdown timeout in seconds
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    /// Service name reported by info and health endpoints
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Application version (injected by CI/CD)
    #[serde(default = "default_version")]
    pub version: String,

    /// Git commit the image was built from
    #[serde(default = "default_unknown")]
    pub build_sha: String,

    /// Container image tag
    #[serde(default = "default_unknown")]
    pub image_tag: String,

    /// Deployment environment: dev, stg, prod
    #[serde(default = "default_env_name")]
    pub env: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    /// Embedding provider: openai, azure_openai, hashing
    #[serde(default = "default_embedding_provider")]
    pub provider: String,

    /// API key for embedding service
    pub api_key: Option<String>,

    /// API base URL (Azure resource endpoint or custom OpenAI-compatible base)
    pub api_base: Option<String>,

    /// API version (Azure OpenAI only)
    #[serde(default = "default_embedding_api_version")]
    pub api_version: String,

    /// Model (or Azure deployment) to use
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Embedding dimension
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    /// Request timeout in seconds
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,

    /// Batch size for embedding requests
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchConfig {
    /// Search service endpoint, e.g. https://<name>.search.windows.net
    pub endpoint: Option<String>,

    /// Index name
    pub index_name: Option<String>,

    /// Admin or query API key
    pub api_key: Option<String>,

    /// REST API version
    #[serde(default = "default_search_api_version")]
    pub api_version: String,

    /// Name of the vector field holding chunk embeddings
    #[serde(default = "default_vector_field")]
    pub vector_field: String,

    /// Exhaustive (brute-force) vector search; suited to small corpora
    #[serde(default = "default_exhaustive")]
    pub exhaustive: bool,

    /// Request timeout in seconds
    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    /// Base URL of the OpenAI-compatible API
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    /// API key; absence is reported when synthesis is first attempted
    pub api_key: Option<String>,

    /// Model identifier
    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Maximum output tokens
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    /// Reasoning effort: none, minimal, low, medium, high, xhigh
    #[serde(default = "default_medium")]
    pub reasoning_effort: String,

    /// Verbosity: low, medium, high
    #[serde(default = "default_medium")]
    pub verbosity: String,

    /// Prompt language: zh, en
    #[serde(default = "default_prompt_language")]
    pub prompt_language: String,

    /// Request timeout in seconds
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IngestionConfig {
    /// Directory scanned for .pdf, .md and .txt files
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Target chunk size in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Overlap between chunks in characters
    #[serde(default)]
    pub chunk_overlap: usize,

    /// Documents per upload request
    #[serde(default = "default_index_batch_size")]
    pub upload_batch_size: usize,

    /// Documents per delete request
    #[serde(default = "default_index_batch_size")]
    pub delete_batch_size: usize,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_request_timeout() -> u64 { 60 }
fn default_shutdown_timeout() -> u64 { 30 }
fn default_service_name() -> String { "ragserve".to_string() }
fn default_version() -> String { crate::VERSION.to_string() }
fn default_unknown() -> String { "unknown".to_string() }
fn default_env_name() -> String { "stg".to_string() }
fn default_embedding_provider() -> String { "hashing".to_string() }
fn default_embedding_api_version() -> String { "2024-02-01".to_string() }
fn default_embedding_model() -> String { crate::DEFAULT_EMBEDDING_MODEL.to_string() }
fn default_embedding_dimension() -> usize { crate::DEFAULT_EMBEDDING_DIMENSION }
fn default_embedding_timeout() -> u64 { 30 }
fn default_batch_size() -> usize { 16 }
fn default_search_api_version() -> String { "2023-11-01".to_string() }
fn default_vector_field() -> String { "contentVector".to_string() }
fn default_exhaustive() -> bool { true }
fn default_search_timeout() -> u64 { 30 }
fn default_llm_base_url() -> String { "https://api.openai.com/v1".to_string() }
fn default_llm_model() -> String { "gpt-5-mini".to_string() }
fn default_max_output_tokens() -> u32 { 1024 }
fn default_medium() -> String { "medium".to_string() }
fn default_prompt_language() -> String { "zh".to_string() }
fn default_llm_timeout() -> u64 { 60 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_port() -> u16 { 9090 }
fn default_data_dir() -> String { "data".to_string() }
fn default_chunk_size() -> usize { 500 }
fn default_index_batch_size() -> usize { 100 }

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__LLM__MODEL=gpt-5-mini
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )

            .build()?;

        config.try_deserialize()
    }

    /// Load from a specific file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )
            .build()?;

        config.try_deserialize()
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            version: default_version(),
            build_sha: default_unknown(),
            image_tag: default_unknown(),
            env: default_env_name(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            api_key: None,
            api_base: None,
            api_version: default_embedding_api_version(),
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            timeout_secs: default_embedding_timeout(),
            batch_size: default_batch_size(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            index_name: None,
            api_key: None,
            api_version: default_search_api_version(),
            vector_field: default_vector_field(),
            exhaustive: default_exhaustive(),
            timeout_secs: default_search_timeout(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            api_key: None,
            model: default_llm_model(),
            max_output_tokens: default_max_output_tokens(),
            reasoning_effort: default_medium(),
            verbosity: default_medium(),
            prompt_language: default_prompt_language(),
            timeout_secs: default_llm_timeout(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: default_metrics_port(),
        }
    }
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            chunk_size: default_chunk_size(),
            chunk_overlap: 0,
            upload_batch_size: default_index_batch_size(),
            delete_batch_size: default_index_batch_size(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.llm.model, "gpt-5-mini");
        assert_eq!(config.llm.max_output_tokens, 1024);
        assert_eq!(config.search.vector_field, "contentVector");
        assert!(config.search.exhaustive);
        assert!(config.llm.api_key.is_none());
    }

    #[test]
    fn test_empty_sources_deserialize_to_defaults() {
        let config: AppConfig = Config::builder()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(config.embedding.provider, "hashing");
        assert_eq!(config.ingestion.chunk_size, 500);
        assert_eq!(config.service.env, "stg");
    }

    #[test]
    fn test_partial_section_keeps_field_defaults() {
        let config: AppConfig = Config::builder()
            .set_override("llm.model", "gpt-4o-mini")
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.llm.reasoning_effort, "medium");
        assert_eq!(config.llm.base_url, "https://api.openai.com/v1");
    }

    #[test]
    fn test_from_file_overrides_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gateway.toml");
        std::fs::write(
            &path,
            "[server]\nport = 9000\n\n[search]\nindex_name = \"manuals\"\nexhaustive = false\n",
        )
        .unwrap();

        let config = AppConfig::from_file(path.to_str().unwrap()).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.request_timeout_secs, 60);
        assert_eq!(config.search.index_name.as_deref(), Some("manuals"));
        assert!(!config.search.exhaustive);
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(30));
    }
}
