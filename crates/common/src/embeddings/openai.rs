//! OpenAI and Azure OpenAI embedding client

use super::Embedder;
use crate::config::EmbeddingConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Where requests go and how they authenticate
#[derive(Debug, Clone)]
enum Endpoint {
    /// `{base}/embeddings` with a bearer token
    OpenAI { base_url: String },
    /// `{endpoint}/openai/deployments/{deployment}/embeddings` with an `api-key` header
    Azure { endpoint: String, api_version: String },
}

/// OpenAI-compatible embedding client
pub struct OpenAIEmbedder {
    client: reqwest::Client,
    api_key: String,
    model: String,
    dimension: usize,
    batch_size: usize,
    endpoint: Endpoint,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: Option<usize>,
    embedding: Vec<f32>,
}

impl OpenAIEmbedder {
    /// Create a client for the OpenAI API (or a compatible base URL)
    pub fn openai(
        api_key: String,
        model: String,
        base_url: Option<String>,
        config: &EmbeddingConfig,
    ) -> Result<Self> {
        let base_url = base_url
            .unwrap_or_else(|| "https://api.openai.com/v1".to_string())
            .trim_end_matches('/')
            .to_string();
        Self::build(api_key, model, Endpoint::OpenAI { base_url }, config)
    }

    /// Create a client for an Azure OpenAI embedding deployment
    pub fn azure(
        api_key: String,
        endpoint: String,
        deployment: String,
        config: &EmbeddingConfig,
    ) -> Result<Self> {
        let endpoint = Endpoint::Azure {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_version: config.api_version.clone(),
        };
        Self::build(api_key, deployment, endpoint, config)
    }

    fn build(
        api_key: String,
        model: String,
        endpoint: Endpoint,
        config: &EmbeddingConfig,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        if let Some(native) = fixed_dimension(&model) {
            if native != config.dimension {
                return Err(AppError::Configuration {
                    message: format!(
                        "{} always returns {} dimensions but embedding.dimension is {}",
                        model, native, config.dimension
                    ),
                });
            }
        }

        Ok(Self {
            client,
            api_key,
            dimension: config.dimension,
            model,
            batch_size: config.batch_size.max(1),
            endpoint,
        })
    }

    fn url(&self) -> String {
        match &self.endpoint {
            Endpoint::OpenAI { base_url } => format!("{}/embeddings", base_url),
            Endpoint::Azure { endpoint, api_version } => format!(
                "{}/openai/deployments/{}/embeddings?api-version={}",
                endpoint, self.model, api_version
            ),
        }
    }

    fn request<'a>(&'a self, texts: &'a [String]) -> EmbeddingRequest<'a> {
        EmbeddingRequest {
            input: texts,
            // Azure selects the model through the deployment in the URL
            model: match self.endpoint {
                Endpoint::OpenAI { .. } => Some(self.model.as_str()),
                Endpoint::Azure { .. } => None,
            },
            dimensions: supports_dimensions(&self.model).then_some(self.dimension),
        }
    }

    async fn make_request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let builder = self.client.post(self.url()).json(&self.request(texts));
        let builder = match self.endpoint {
            Endpoint::OpenAI { .. } => builder.bearer_auth(&self.api_key),
            Endpoint::Azure { .. } => builder.header("api-key", &self.api_key),
        };

        let response = builder.send().await.map_err(|e| AppError::Embedding {
            message: format!("Request failed: {}", e),
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Embedding {
                message: format!("API error {}: {}", status, body),
            });
        }

        let result: EmbeddingResponse = response.json().await.map_err(|e| AppError::Embedding {
            message: format!("Failed to parse response: {}", e),
        })?;

        order_embeddings(result.data, texts.len(), self.dimension)
    }
}

/// Put embeddings back in input order and check count and dimension
fn order_embeddings(
    mut data: Vec<EmbeddingData>,
    expected: usize,
    dimension: usize,
) -> Result<Vec<Vec<f32>>> {
    if data.len() != expected {
        return Err(AppError::Embedding {
            message: format!("Expected {} embeddings, got {}", expected, data.len()),
        });
    }
    if let Some(bad) = data.iter().find(|d| d.embedding.len() != dimension) {
        return Err(AppError::Embedding {
            message: format!(
                "Expected {}-dimensional embeddings, got {}",
                dimension,
                bad.embedding.len()
            ),
        });
    }
    if data.iter().all(|d| d.index.is_some()) {
        data.sort_by_key(|d| d.index);
    }
    Ok(data.into_iter().map(|d| d.embedding).collect())
}

/// Models whose output size cannot be changed
fn fixed_dimension(model: &str) -> Option<usize> {
    match model {
        "text-embedding-ada-002" => Some(1536),
        _ => None,
    }
}

/// text-embedding-3 models shorten their output to a requested size
fn supports_dimensions(model: &str) -> bool {
    model.starts_with("text-embedding-3")
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.is_empty() {
            return Ok(Vec::new());
        }
        let embeddings = self.make_request(&[text.to_string()]).await?;
        embeddings.into_iter().next().ok_or_else(|| AppError::Embedding {
            message: "Empty response".to_string(),
        })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut all_embeddings = vec![Vec::new(); texts.len()];

        // The API rejects empty strings; they keep their empty vector
        let non_empty: Vec<usize> = (0..texts.len()).filter(|&i| !texts[i].is_empty()).collect();

        for positions in non_empty.chunks(self.batch_size) {
            let batch: Vec<String> = positions.iter().map(|&i| texts[i].clone()).collect();
            let embeddings = self.make_request(&batch).await?;
            for (&i, embedding) in positions.iter().zip(embeddings) {
                all_embeddings[i] = embedding;
            }
        }

        Ok(all_embeddings)
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> EmbeddingConfig {
        EmbeddingConfig {
            dimension: 384,
            ..EmbeddingConfig::default()
        }
    }

    #[test]
    fn test_openai_url_and_dimension() {
        let embedder = OpenAIEmbedder::openai(
            "sk-test".to_string(),
            "text-embedding-3-large".to_string(),
            Some("https://proxy.local/v1/".to_string()),
            &config(),
        )
        .unwrap();
        assert_eq!(embedder.url(), "https://proxy.local/v1/embeddings");
        assert_eq!(embedder.dimension(), 384);
    }

    #[test]
    fn test_configured_dimension_is_requested() {
        let embedder = OpenAIEmbedder::openai(
            "sk-test".to_string(),
            "text-embedding-3-small".to_string(),
            None,
            &config(),
        )
        .unwrap();
        let texts = vec!["hello".to_string()];
        let body = serde_json::to_value(embedder.request(&texts)).unwrap();
        assert_eq!(body["model"], "text-embedding-3-small");
        assert_eq!(body["dimensions"], 384);
        assert_eq!(embedder.dimension(), 384);
    }

    #[test]
    fn test_fixed_size_model_rejects_other_dimension() {
        let err = OpenAIEmbedder::openai(
            "sk-test".to_string(),
            "text-embedding-ada-002".to_string(),
            None,
            &config(),
        )
        .err()
        .unwrap();
        assert!(matches!(err, AppError::Configuration { .. }));

        let native = EmbeddingConfig {
            dimension: 1536,
            ..EmbeddingConfig::default()
        };
        let embedder = OpenAIEmbedder::openai(
            "sk-test".to_string(),
            "text-embedding-ada-002".to_string(),
            None,
            &native,
        )
        .unwrap();
        let texts = vec!["hello".to_string()];
        let body = serde_json::to_value(embedder.request(&texts)).unwrap();
        assert!(body.get("dimensions").is_none());
    }

    #[test]
    fn test_azure_url_uses_deployment() {
        let embedder = OpenAIEmbedder::azure(
            "key".to_string(),
            "https://res.openai.azure.com/".to_string(),
            "embed-small".to_string(),
            &config(),
        )
        .unwrap();
        assert_eq!(
            embedder.url(),
            "https://res.openai.azure.com/openai/deployments/embed-small/embeddings?api-version=2024-02-01"
        );
        assert_eq!(embedder.dimension(), 384);
        let texts = vec!["hello".to_string()];
        let body = serde_json::to_value(embedder.request(&texts)).unwrap();
        assert!(body.get("model").is_none());
    }

    #[test]
    fn test_order_embeddings_restores_input_order() {
        let data = vec![
            EmbeddingData { index: Some(1), embedding: vec![2.0] },
            EmbeddingData { index: Some(0), embedding: vec![1.0] },
        ];
        let ordered = order_embeddings(data, 2, 1).unwrap();
        assert_eq!(ordered, vec![vec![1.0], vec![2.0]]);
    }

    #[test]
    fn test_order_embeddings_count_mismatch() {
        let data = vec![EmbeddingData { index: None, embedding: vec![1.0] }];
        assert!(order_embeddings(data, 2, 1).is_err());
    }

    #[test]
    fn test_order_embeddings_dimension_mismatch() {
        let data = vec![EmbeddingData { index: Some(0), embedding: vec![0.5; 1536] }];
        let err = order_embeddings(data, 1, 384).unwrap_err();
        assert!(err.to_string().contains("384"));
    }

    #[tokio::test]
    async fn test_empty_text_skips_request() {
        // Unroutable base URL: any request would fail
        let embedder = OpenAIEmbedder::openai(
            "sk-test".to_string(),
            "text-embedding-3-small".to_string(),
            Some("http://127.0.0.1:9".to_string()),
            &config(),
        )
        .unwrap();
        assert!(embedder.embed("").await.unwrap().is_empty());
        let batch = embedder.embed_batch(&[String::new(), String::new()]).await.unwrap();
        assert_eq!(batch, vec![Vec::<f32>::new(), Vec::new()]);
    }
}
