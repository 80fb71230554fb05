//! Query pipeline
//!
//! Runs one question through Embed -> Search -> Assemble -> Synthesize,
//! strictly in that order. Nothing is retried; a failing stage ends the
//! query and is reported with its stage so callers can tell embedding,
//! search and synthesis failures apart.

use crate::config::AppConfig;
use crate::context::{assemble, AnswerSynthesizer, PromptTemplate};
use crate::embeddings::{create_embedder, Embedder, EmbedderFactory, LazyEmbedder};
use crate::errors::{AppError, PipelineStage, Result};
use crate::llm::{LazyCompletionClient, ModelInvocationParams};
use crate::metrics::{self, QueryOutcome, StageTimer};
use crate::search::{HybridQuery, LazySearchClient, SearchGateway, SearchHit};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

/// Hits retrieved when the caller does not say
pub const DEFAULT_TOP_K: usize = 3;

/// Largest accepted `top_k`
pub const MAX_TOP_K: usize = 10;

/// Text embedded by the warm-up probe
const WARMUP_TEXT: &str = "warmup";

/// A validated question
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    question: String,
    top_k: usize,
}

impl Query {
    /// Validate a question; `top_k` defaults to 3 and must be in `1..=10`
    pub fn new(question: impl Into<String>, top_k: Option<usize>) -> Result<Self> {
        let question = question.into();
        if question.is_empty() {
            return Err(AppError::Validation {
                message: "question must not be empty".to_string(),
                field: Some("question".to_string()),
            });
        }

        let top_k = top_k.unwrap_or(DEFAULT_TOP_K);
        if !(1..=MAX_TOP_K).contains(&top_k) {
            return Err(AppError::Validation {
                message: format!("top_k must be between 1 and {}, got {}", MAX_TOP_K, top_k),
                field: Some("top_k".to_string()),
            });
        }

        Ok(Self { question, top_k })
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }
}

/// Successful query result
#[derive(Debug, Clone, PartialEq)]
pub struct QueryAnswer {
    pub answer: String,

    /// Hits the answer was grounded on, in gateway order
    pub contexts: Vec<SearchHit>,

    /// Citation indices found in the answer
    pub citations: Vec<usize>,
}

/// Failed query
///
/// `contexts` holds the retrieved hits when the failure happened after a
/// successful search, empty otherwise.
#[derive(Debug)]
pub struct QueryFailure {
    pub error: AppError,
    pub contexts: Vec<SearchHit>,
}

impl QueryFailure {
    fn before_retrieval(error: AppError) -> Self {
        Self {
            error,
            contexts: Vec::new(),
        }
    }

    pub fn stage(&self) -> Option<PipelineStage> {
        self.error.stage()
    }
}

impl From<QueryFailure> for AppError {
    fn from(failure: QueryFailure) -> Self {
        failure.error
    }
}

/// Result of the warm-up probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WarmupReport {
    pub embedding_dimension: usize,
}

/// Sequences the pipeline stages for each query
pub struct QueryOrchestrator {
    embedder: Arc<dyn Embedder>,
    search: Arc<dyn SearchGateway>,
    synthesizer: AnswerSynthesizer,
    exhaustive: bool,
}

impl QueryOrchestrator {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        search: Arc<dyn SearchGateway>,
        synthesizer: AnswerSynthesizer,
    ) -> Self {
        Self {
            embedder,
            search,
            synthesizer,
            exhaustive: true,
        }
    }

    /// Wire the production collaborators from configuration
    ///
    /// Nothing connects here: the embedding backend, the search client and
    /// the completion client are all built on first use.
    pub fn from_config(config: &AppConfig) -> Self {
        let embedding = config.embedding.clone();
        let factory: EmbedderFactory = Arc::new(move || create_embedder(&embedding));
        let embedder = Arc::new(LazyEmbedder::new(
            factory,
            config.embedding.model.clone(),
            config.embedding.dimension,
        ));

        let params = ModelInvocationParams::from_config(&config.llm);
        let template = PromptTemplate::for_language(&config.llm.prompt_language);
        info!(
            model = %params.model,
            reasoning_effort = %params.reasoning_effort,
            verbosity = %params.verbosity,
            reasoning_params = params.capabilities().supports_reasoning_params,
            prompt_language = template.language,
            "Answer synthesis configured"
        );

        let synthesizer = AnswerSynthesizer::new(
            Arc::new(LazyCompletionClient::new(config.llm.clone())),
            params,
            template,
        );

        Self::new(
            embedder,
            Arc::new(LazySearchClient::new(config.search.clone())),
            synthesizer,
        )
        .with_exhaustive(config.search.exhaustive)
    }

    /// Request exhaustive (high-recall) vector search; on by default
    pub fn with_exhaustive(mut self, exhaustive: bool) -> Self {
        self.exhaustive = exhaustive;
        self
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    /// Answer one question
    #[instrument(skip(self, query), fields(top_k = query.top_k()))]
    pub async fn handle_query(&self, query: &Query) -> std::result::Result<QueryAnswer, QueryFailure> {
        let started = Instant::now();
        info!("Query started");
        debug!(question = %query.question(), "Query text");

        let vector = self
            .embed(query.question())
            .await
            .map_err(|e| self.fail(QueryFailure::before_retrieval(e)))?;

        let hits = self
            .retrieve(query, vector)
            .await
            .map_err(|e| self.fail(QueryFailure::before_retrieval(e)))?;

        let timer = StageTimer::start("assemble");
        let block = assemble(hits);
        timer.finish();

        if block.is_empty() {
            warn!("No relevant context retrieved");
        }

        let timer = StageTimer::start("synthesize");
        let result = self
            .synthesizer
            .synthesize(query.question(), block.clone())
            .await;
        let synthesize_ms = timer.finish();

        let answer = result.map_err(|e| {
            self.fail(QueryFailure {
                error: AppError::at_stage(PipelineStage::Synthesize, e),
                contexts: block.into_hits(),
            })
        })?;

        let outcome = if answer.is_fallback() {
            QueryOutcome::NoContext
        } else {
            QueryOutcome::Answered
        };
        metrics::record_query_outcome(outcome);
        info!(
            outcome = %outcome,
            hits = answer.contexts.len(),
            citations = ?answer.citations,
            synthesize_ms,
            latency_ms = started.elapsed().as_millis() as u64,
            "Query finished"
        );

        Ok(QueryAnswer {
            answer: answer.text,
            contexts: answer.contexts.into_hits(),
            citations: answer.citations,
        })
    }

    /// Exercise the embedder once so lazy initialization happens off the
    /// request path. Safe to call repeatedly.
    pub async fn warmup(&self) -> Result<WarmupReport> {
        let result = self.embedder.embed(WARMUP_TEXT).await;
        metrics::record_warmup(result.is_ok());

        match result {
            Ok(vector) => {
                info!(dimension = vector.len(), "Warm-up succeeded");
                Ok(WarmupReport {
                    embedding_dimension: vector.len(),
                })
            }
            Err(e) => {
                error!(error = %e, "Warm-up failed");
                Err(e)
            }
        }
    }

    async fn embed(&self, question: &str) -> Result<Vec<f32>> {
        let timer = StageTimer::start("embed");
        let result = self.embedder.embed(question).await;
        let elapsed_ms = timer.finish();

        let vector = result.map_err(|e| AppError::at_stage(PipelineStage::Embed, e))?;
        if vector.is_empty() {
            return Err(AppError::Embedding {
                message: "embedder returned an empty vector".to_string(),
            });
        }
        debug!(dimension = vector.len(), elapsed_ms, "Question embedded");
        Ok(vector)
    }

    async fn retrieve(&self, query: &Query, vector: Vec<f32>) -> Result<Vec<SearchHit>> {
        let request =
            HybridQuery::new(query.question(), vector, query.top_k()).exhaustive(self.exhaustive);

        let timer = StageTimer::start("search");
        let result = self.search.search(&request).await;
        let elapsed_ms = timer.finish();

        let mut hits = result.map_err(|e| AppError::at_stage(PipelineStage::Search, e))?;
        hits.truncate(query.top_k());
        metrics::record_search_hits(hits.len());
        debug!(hits = hits.len(), elapsed_ms, "Search finished");
        Ok(hits)
    }

    fn fail(&self, failure: QueryFailure) -> QueryFailure {
        let outcome = match failure.stage() {
            Some(PipelineStage::Embed) => QueryOutcome::FailedEmbed,
            Some(PipelineStage::Search) => QueryOutcome::FailedSearch,
            _ => QueryOutcome::FailedSynthesize,
        };
        metrics::record_query_outcome(outcome);
        error!(
            stage = failure.stage().map(|s| s.as_str()).unwrap_or("unknown"),
            error = %failure.error,
            retrieved = failure.contexts.len(),
            "Query failed"
        );
        failure
    }
}
