//! Azure AI Search REST client

use super::schema::{delete_action, IndexDocument, IndexSchema};
use super::{HybridQuery, SearchGateway, SearchHit};
use crate::config::SearchConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument};

/// Azure AI Search client bound to one index
pub struct AzureSearchClient {
    client: reqwest::Client,
    endpoint: String,
    index_name: String,
    api_key: String,
    api_version: String,
    vector_field: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchBody<'a> {
    search: &'a str,
    top: usize,
    select: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    vector_queries: Vec<VectorQuery<'a>>,
}

#[derive(Serialize)]
struct VectorQuery<'a> {
    kind: &'static str,
    vector: &'a [f32],
    k: usize,
    fields: &'a str,
    exhaustive: bool,
}

#[derive(Deserialize)]
struct SearchResponseBody {
    #[serde(default)]
    value: Vec<RawHit>,
}

#[derive(Deserialize)]
struct RawHit {
    #[serde(rename = "@search.score")]
    score: Option<f64>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct IndexingResponseBody {
    #[serde(default)]
    value: Vec<IndexingResult>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexingResult {
    key: String,
    status: bool,
    #[serde(default)]
    error_message: Option<String>,
}

fn required(value: &Option<String>, name: &str) -> Result<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AppError::Search {
            message: format!("search.{} is not configured", name),
        })
}

impl AzureSearchClient {
    /// Create a client from configuration
    pub fn from_config(config: &SearchConfig) -> Result<Self> {
        let endpoint = required(&config.endpoint, "endpoint")?;
        let index_name = required(&config.index_name, "index_name")?;
        let api_key = required(&config.api_key, "api_key")?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Search {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            index_name,
            api_key,
            api_version: config.api_version.clone(),
            vector_field: config.vector_field.clone(),
        })
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    pub fn vector_field(&self) -> &str {
        &self.vector_field
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/indexes/{}{}?api-version={}",
            self.endpoint, self.index_name, path, self.api_version
        )
    }

    fn search_body<'a>(&'a self, query: &'a HybridQuery) -> SearchBody<'a> {
        let vector_queries = if query.vector.is_empty() {
            Vec::new()
        } else {
            vec![VectorQuery {
                kind: "vector",
                vector: &query.vector,
                k: query.top_k,
                fields: &self.vector_field,
                exhaustive: query.exhaustive,
            }]
        };

        SearchBody {
            search: &query.text,
            top: query.top_k,
            select: query.select.join(","),
            vector_queries,
        }
    }

    async fn send<T: Serialize + ?Sized>(
        &self,
        method: reqwest::Method,
        url: String,
        body: &T,
    ) -> Result<reqwest::Response> {
        let response = self
            .client
            .request(method, &url)
            .header("api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::Search {
                message: format!("Request failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Search {
                message: format!("API error {}: {}", status, body),
            });
        }

        Ok(response)
    }

    /// Create the index, or update it in place if it already exists
    pub async fn create_or_update_index(&self, schema: &IndexSchema) -> Result<()> {
        self.send(reqwest::Method::PUT, self.url(""), schema).await?;
        Ok(())
    }

    /// Upload (insert or replace) documents
    pub async fn upload_documents(&self, documents: &[IndexDocument]) -> Result<usize> {
        let actions: Vec<Value> = documents
            .iter()
            .map(|d| d.upload_action(&self.vector_field))
            .collect();
        self.index_batch(actions).await
    }

    /// Delete documents by key
    pub async fn delete_documents(&self, ids: &[String]) -> Result<usize> {
        let actions: Vec<Value> = ids.iter().map(|id| delete_action(id)).collect();
        self.index_batch(actions).await
    }

    /// List document ids, at most `limit`
    pub async fn list_document_ids(&self, limit: usize) -> Result<Vec<String>> {
        let body = serde_json::json!({ "search": "*", "select": "id", "top": limit });
        let response = self
            .send(reqwest::Method::POST, self.url("/docs/search"), &body)
            .await?;
        let parsed: SearchResponseBody = response.json().await.map_err(|e| AppError::Search {
            message: format!("Failed to parse response: {}", e),
        })?;
        Ok(parsed.value.into_iter().filter_map(|h| h.id).collect())
    }

    async fn index_batch(&self, actions: Vec<Value>) -> Result<usize> {
        if actions.is_empty() {
            return Ok(0);
        }
        let body = serde_json::json!({ "value": actions });
        let response = self
            .send(reqwest::Method::POST, self.url("/docs/index"), &body)
            .await?;
        let parsed: IndexingResponseBody = response.json().await.map_err(|e| AppError::Search {
            message: format!("Failed to parse indexing response: {}", e),
        })?;

        let failures: Vec<String> = parsed
            .value
            .iter()
            .filter(|r| !r.status)
            .map(|r| format!("{}: {}", r.key, r.error_message.as_deref().unwrap_or("unknown error")))
            .collect();
        if !failures.is_empty() {
            return Err(AppError::Search {
                message: format!("{} documents rejected: {}", failures.len(), failures.join("; ")),
            });
        }
        Ok(parsed.value.len())
    }
}

#[async_trait]
impl SearchGateway for AzureSearchClient {
    #[instrument(skip(self, query), fields(index = %self.index_name, top_k = query.top_k))]
    async fn search(&self, query: &HybridQuery) -> Result<Vec<SearchHit>> {
        let body = self.search_body(query);
        let response = self
            .send(reqwest::Method::POST, self.url("/docs/search"), &body)
            .await?;

        let parsed: SearchResponseBody = response.json().await.map_err(|e| AppError::Search {
            message: format!("Failed to parse response: {}", e),
        })?;

        let hits = parsed
            .value
            .into_iter()
            .map(RawHit::into_hit)
            .collect::<Result<Vec<_>>>()?;

        debug!(hits = hits.len(), "Hybrid search returned");
        Ok(hits)
    }
}

impl RawHit {
    fn into_hit(self) -> Result<SearchHit> {
        let id = self.id.ok_or_else(|| AppError::Search {
            message: "Search hit without id".to_string(),
        })?;
        Ok(SearchHit {
            id,
            source: self.source,
            score: self.score,
            content: self.content.unwrap_or_default(),
        })
    }
}
