//! Hybrid search gateway
//!
//! The index itself is an external service; this module defines the
//! contract the query pipeline relies on and the Azure AI Search client
//! that fulfils it:
//! - Keyword text and query vector scored together in one ranked list
//! - Exhaustive vector mode for small corpora
//! - Index administration used by the ingestion tool

mod azure;
mod schema;

pub use azure::AzureSearchClient;
pub use schema::{IndexDocument, IndexField, IndexSchema};

use crate::config::SearchConfig;
use crate::errors::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;

/// Fields requested from the index for every hit
pub const DEFAULT_SELECT: &[&str] = &["id", "content", "source", "createdAt"];

/// One ranked passage returned by the search gateway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Document (chunk) id
    pub id: String,

    /// Origin label, usually the source file name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Relevance score assigned by the gateway
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,

    /// Passage text
    #[serde(default)]
    pub content: String,
}

/// A combined keyword + vector query
#[derive(Debug, Clone)]
pub struct HybridQuery {
    /// Raw question text, used for keyword matching
    pub text: String,

    /// Query embedding, used for vector matching
    pub vector: Vec<f32>,

    /// Maximum hits to return
    pub top_k: usize,

    /// Fields to select
    pub select: Vec<String>,

    /// Exhaustive (high-recall) vector search
    pub exhaustive: bool,
}

impl HybridQuery {
    pub fn new(text: impl Into<String>, vector: Vec<f32>, top_k: usize) -> Self {
        Self {
            text: text.into(),
            vector,
            top_k,
            select: DEFAULT_SELECT.iter().map(|f| f.to_string()).collect(),
            exhaustive: true,
        }
    }

    pub fn exhaustive(mut self, exhaustive: bool) -> Self {
        self.exhaustive = exhaustive;
        self
    }
}

/// Common trait for hybrid search backends
///
/// Hits come back in the backend's ranking order, which callers treat as
/// authoritative.
#[async_trait]
pub trait SearchGateway: Send + Sync {
    async fn search(&self, query: &HybridQuery) -> Result<Vec<SearchHit>>;
}

/// Search client built from configuration on first use
///
/// Lets the gateway start without search credentials; a missing setting
/// surfaces as a search failure on the first query instead.
pub struct LazySearchClient {
    config: SearchConfig,
    cell: OnceCell<AzureSearchClient>,
}

impl LazySearchClient {
    pub fn new(config: SearchConfig) -> Self {
        Self {
            config,
            cell: OnceCell::new(),
        }
    }

    pub async fn client(&self) -> Result<&AzureSearchClient> {
        self.cell
            .get_or_try_init(|| async { AzureSearchClient::from_config(&self.config) })
            .await
    }
}

#[async_trait]
impl SearchGateway for LazySearchClient {
    async fn search(&self, query: &HybridQuery) -> Result<Vec<SearchHit>> {
        self.client().await?.search(query).await
    }
}
