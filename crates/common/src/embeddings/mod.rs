//! Embedding service abstraction
//!
//! Provides a unified interface for embedding providers:
//! - OpenAI (text-embedding-3-small, text-embedding-ada-002)
//! - Azure OpenAI deployments
//! - Feature hashing (offline, deterministic)
//!
//! The gateway talks to the backend through [`LazyEmbedder`], which builds
//! the provider on first use so the process can serve liveness probes
//! before a slow backend is ready.

mod hashing;
mod lazy;
mod openai;

pub use hashing::HashingEmbedder;
pub use lazy::{EmbedderFactory, LazyEmbedder};
pub use openai::OpenAIEmbedder;

use crate::config::EmbeddingConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Trait for embedding generation
///
/// Implementations return an empty vector for empty input text instead of
/// failing, and keep input order in batches.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts (batch)
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Get the model name
    fn model_name(&self) -> &str;

    /// Get the embedding dimension
    fn dimension(&self) -> usize;
}

/// Create an embedder based on configuration
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider.trim().to_lowercase().as_str() {
        "openai" => {
            let key = required_key(config)?;
            Ok(Arc::new(OpenAIEmbedder::openai(
                key,
                config.model.clone(),
                config.api_base.clone(),
                config,
            )?))
        }
        "azure_openai" | "azure" => {
            let key = required_key(config)?;
            let endpoint = config.api_base.clone().ok_or_else(|| AppError::Configuration {
                message: "embedding.api_base is required for azure_openai".to_string(),
            })?;
            Ok(Arc::new(OpenAIEmbedder::azure(
                key,
                endpoint,
                config.model.clone(),
                config,
            )?))
        }
        "hashing" => Ok(Arc::new(HashingEmbedder::new(config.dimension))),
        other => Err(AppError::Configuration {
            message: format!("Unknown embedding provider: {}", other),
        }),
    }
}

fn required_key(config: &EmbeddingConfig) -> Result<String> {
    config
        .api_key
        .clone()
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| AppError::Configuration {
            message: format!("embedding.api_key is required for provider {}", config.provider),
        })
}
