//! Process-wide lazily initialized embedding backend
//!
//! The backend is built on first use, at most once, even when several
//! requests arrive before it is ready: concurrent callers wait on the same
//! initialization. The initialization runs on its own task, so a caller
//! that gives up (a request timeout) does not abandon it. A failed
//! initialization is not cached, so the next caller tries again.

use super::Embedder;
use crate::errors::{AppError, Result};
use crate::metrics;
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, OnceCell};
use tracing::{info, warn};

/// Builds the embedding backend. May block (model loading, client setup),
/// so it runs on the blocking pool.
pub type EmbedderFactory = Arc<dyn Fn() -> Result<Arc<dyn Embedder>> + Send + Sync>;

type InitResult = std::result::Result<Arc<dyn Embedder>, Arc<AppError>>;
type PendingInit = Shared<BoxFuture<'static, InitResult>>;

pub struct LazyEmbedder {
    cell: Arc<OnceCell<Arc<dyn Embedder>>>,
    pending: Arc<Mutex<Option<PendingInit>>>,
    factory: EmbedderFactory,
    initializations: Arc<AtomicUsize>,
    model_name: String,
    dimension: usize,
}

impl LazyEmbedder {
    /// `model_name` and `dimension` are reported until the backend exists
    pub fn new(factory: EmbedderFactory, model_name: impl Into<String>, dimension: usize) -> Self {
        Self {
            cell: Arc::new(OnceCell::new()),
            pending: Arc::new(Mutex::new(None)),
            factory,
            initializations: Arc::new(AtomicUsize::new(0)),
            model_name: model_name.into(),
            dimension,
        }
    }

    /// Get the backend, initializing it if this is the first use
    pub async fn get_or_init(&self) -> Result<Arc<dyn Embedder>> {
        if let Some(embedder) = self.cell.get() {
            return Ok(Arc::clone(embedder));
        }

        let init = {
            let mut pending = self.pending.lock().await;
            // The init task fills the cell before it clears `pending`
            if let Some(embedder) = self.cell.get() {
                return Ok(Arc::clone(embedder));
            }
            match pending.as_ref() {
                Some(init) => init.clone(),
                None => {
                    let init = self.spawn_init();
                    *pending = Some(init.clone());
                    init
                }
            }
        };

        init.await.map_err(unshare)
    }

    fn spawn_init(&self) -> PendingInit {
        let factory = Arc::clone(&self.factory);
        let cell = Arc::clone(&self.cell);
        let pending = Arc::clone(&self.pending);
        let initializations = Arc::clone(&self.initializations);

        let task = tokio::spawn(async move {
            let start = Instant::now();
            let built = tokio::task::spawn_blocking(move || factory())
                .await
                .map_err(|e| AppError::Embedding {
                    message: format!("Embedding backend initialization panicked: {}", e),
                })
                .and_then(|r| r);

            let outcome = match built {
                Ok(embedder) => {
                    cell.set(Arc::clone(&embedder)).ok();
                    initializations.fetch_add(1, Ordering::SeqCst);
                    metrics::record_embedder_initialization();
                    info!(
                        model = embedder.model_name(),
                        dimension = embedder.dimension(),
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "Embedding backend initialized"
                    );
                    Ok(embedder)
                }
                Err(e) => {
                    warn!(error = %e, "Embedding backend initialization failed");
                    Err(Arc::new(e))
                }
            };

            pending.lock().await.take();
            outcome
        });

        task.map(|joined| {
            joined.unwrap_or_else(|e| {
                Err(Arc::new(AppError::Embedding {
                    message: format!("Embedding backend initialization aborted: {}", e),
                }))
            })
        })
        .boxed()
        .shared()
    }

    /// Whether the backend has been initialized
    pub fn is_ready(&self) -> bool {
        self.cell.initialized()
    }

    /// Number of successful backend initializations (0 or 1)
    pub fn initializations(&self) -> usize {
        self.initializations.load(Ordering::SeqCst)
    }
}

/// Every waiter gets an owned error; the last one takes the original
fn unshare(err: Arc<AppError>) -> AppError {
    Arc::try_unwrap(err).unwrap_or_else(|shared| match shared.as_ref() {
        AppError::Embedding { message } => AppError::Embedding {
            message: message.clone(),
        },
        AppError::Configuration { message } => AppError::Configuration {
            message: message.clone(),
        },
        other => AppError::Embedding {
            message: other.to_string(),
        },
    })
}

#[async_trait]
impl Embedder for LazyEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.get_or_init().await?.embed(text).await
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.get_or_init().await?.embed_batch(texts).await
    }

    fn model_name(&self) -> &str {
        self.cell
            .get()
            .map(|e| e.model_name())
            .unwrap_or(self.model_name.as_str())
    }

    fn dimension(&self) -> usize {
        self.cell.get().map(|e| e.dimension()).unwrap_or(self.dimension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::HashingEmbedder;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    fn counting_factory(calls: Arc<AtomicUsize>, dimension: usize) -> EmbedderFactory {
        Arc::new(move || {
            calls.fetch_add(1, Ordering::SeqCst);
            // Simulate a slow model load so concurrent callers overlap
            std::thread::sleep(Duration::from_millis(50));
            Ok(Arc::new(HashingEmbedder::new(dimension)) as Arc<dyn Embedder>)
        })
    }

    #[tokio::test]
    async fn test_not_initialized_until_first_use() {
        let calls = Arc::new(AtomicUsize::new(0));
        let lazy = LazyEmbedder::new(counting_factory(calls.clone(), 32), "hash", 32);

        assert!(!lazy.is_ready());
        assert_eq!(lazy.dimension(), 32);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        lazy.embed("warmup").await.unwrap();
        assert!(lazy.is_ready());
        assert_eq!(lazy.model_name(), "feature-hashing");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_use_initializes_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let lazy = Arc::new(LazyEmbedder::new(counting_factory(calls.clone(), 16), "hash", 16));

        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let lazy = Arc::clone(&lazy);
                tokio::spawn(async move { lazy.embed(&format!("question {}", i)).await })
            })
            .collect();

        for result in futures::future::join_all(tasks).await {
            assert_eq!(result.unwrap().unwrap().len(), 16);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(lazy.initializations(), 1);
    }

    #[tokio::test]
    async fn test_failed_initialization_is_retried() {
        let fail_first = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&fail_first);
        let factory: EmbedderFactory = Arc::new(move || {
            if flag.swap(false, Ordering::SeqCst) {
                Err(AppError::Embedding {
                    message: "model download failed".to_string(),
                })
            } else {
                Ok(Arc::new(HashingEmbedder::new(8)) as Arc<dyn Embedder>)
            }
        });
        let lazy = LazyEmbedder::new(factory, "hash", 8);

        let err = lazy.embed("x").await.unwrap_err();
        assert!(err.to_string().contains("model download failed"));
        assert!(!lazy.is_ready());

        assert_eq!(lazy.embed("x").await.unwrap().len(), 8);
        assert_eq!(lazy.initializations(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_abandoned_first_caller_does_not_restart_initialization() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let factory: EmbedderFactory = Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(300));
            Ok(Arc::new(HashingEmbedder::new(12)) as Arc<dyn Embedder>)
        });
        let lazy = LazyEmbedder::new(factory, "hash", 12);

        let first = tokio::time::timeout(Duration::from_millis(50), lazy.embed("warmup")).await;
        assert!(first.is_err());

        assert_eq!(lazy.embed("warmup").await.unwrap().len(), 12);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(lazy.initializations(), 1);
    }

    #[tokio::test]
    async fn test_waiters_share_the_failure() {
        let factory: EmbedderFactory = Arc::new(|| {
            std::thread::sleep(Duration::from_millis(20));
            Err(AppError::Embedding {
                message: "no such model".to_string(),
            })
        });
        let lazy = LazyEmbedder::new(factory, "hash", 8);

        let (a, b) = tokio::join!(lazy.embed("a"), lazy.embed("b"));
        for err in [a.unwrap_err(), b.unwrap_err()] {
            assert!(matches!(err, AppError::Embedding { ref message } if message == "no such model"));
        }
        assert!(!lazy.is_ready());
    }
}
