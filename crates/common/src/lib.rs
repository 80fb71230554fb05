//! RagServe Common Library
//!
//! Shared code for the query gateway and the ingestion tool:
//! - Configuration management
//! - Error types and handling
//! - Embedding client abstraction
//! - Hybrid search client
//! - Completion (LLM) client
//! - Context assembly and answer synthesis
//! - The query pipeline
//! - Metrics and observability

pub mod config;
pub mod context;
pub mod embeddings;
pub mod errors;
pub mod llm;
pub mod metrics;
pub mod pipeline;
pub mod search;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-export commonly used types
pub use config::AppConfig;
pub use embeddings::Embedder;
pub use errors::{AppError, PipelineStage, Result};
pub use pipeline::{Query, QueryAnswer, QueryFailure, QueryOrchestrator};
pub use search::{SearchGateway, SearchHit};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default embedding model
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Default embedding dimension
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 384;
