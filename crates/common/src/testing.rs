//! In-memory collaborators for tests
//!
//! Each fake counts its calls so tests can assert how often a pipeline
//! stage ran. Enabled for this crate's tests and, through the `testing`
//! feature, for dependent crates' tests.

use crate::embeddings::Embedder;
use crate::errors::{AppError, Result};
use crate::llm::{CompletionProvider, CompletionRequest};
use crate::search::{HybridQuery, SearchGateway, SearchHit};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Build a hit with a fixed score
pub fn hit(id: &str, source: Option<&str>, content: &str) -> SearchHit {
    SearchHit {
        id: id.to_string(),
        source: source.map(str::to_string),
        score: Some(0.5),
        content: content.to_string(),
    }
}

/// Embedder returning a constant vector, or failing
pub struct FakeEmbedder {
    dimension: usize,
    error: Option<String>,
    calls: AtomicUsize,
}

impl FakeEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            error: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            dimension: 0,
            error: Some(message.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn vector(&self, text: &str) -> Result<Vec<f32>> {
        if let Some(message) = &self.error {
            return Err(AppError::Embedding {
                message: message.clone(),
            });
        }
        if text.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![0.1; self.dimension])
    }
}

#[async_trait]
impl Embedder for FakeEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.vector(text)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        texts.iter().map(|t| self.vector(t)).collect()
    }

    fn model_name(&self) -> &str {
        "fake-embedder"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Search gateway returning canned hits, or failing
pub struct FakeSearch {
    hits: Vec<SearchHit>,
    error: Option<String>,
    queries: Mutex<Vec<HybridQuery>>,
}

impl FakeSearch {
    pub fn returning(hits: Vec<SearchHit>) -> Self {
        Self {
            hits,
            error: None,
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            hits: Vec::new(),
            error: Some(message.to_string()),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.queries.lock().map(|q| q.len()).unwrap_or_default()
    }

    /// Queries received so far
    pub fn queries(&self) -> Vec<HybridQuery> {
        self.queries.lock().map(|q| q.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl SearchGateway for FakeSearch {
    async fn search(&self, query: &HybridQuery) -> Result<Vec<SearchHit>> {
        if let Ok(mut queries) = self.queries.lock() {
            queries.push(query.clone());
        }
        match &self.error {
            Some(message) => Err(AppError::Search {
                message: message.clone(),
            }),
            None => Ok(self.hits.clone()),
        }
    }
}

/// Completion provider replying with fixed text, or failing
pub struct FakeProvider {
    reply: std::result::Result<String, String>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl FakeProvider {
    pub fn replying(text: &str) -> Self {
        Self {
            reply: Ok(text.to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Fails the way a provider without credentials does
    pub fn failing(message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or_default()
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl CompletionProvider for FakeProvider {
    async fn generate(&self, request: &CompletionRequest) -> Result<String> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        match &self.reply {
            Ok(text) => Ok(text.clone()),
            Err(message) => Err(AppError::Configuration {
                message: message.clone(),
            }),
        }
    }
}
