//! OpenAI Responses API client

use super::{CompletionProvider, CompletionRequest};
use crate::config::LlmConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, info};

pub struct OpenAIResponsesClient {
    client: reqwest::Client,
    api_key: String,
    url: String,
}

#[derive(Debug, Default, Deserialize)]
struct ResponsesBody {
    #[serde(default)]
    output_text: Option<String>,
    #[serde(default)]
    output: Vec<OutputItem>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct OutputItem {
    #[serde(default)]
    content: Vec<ContentPart>,
}

#[derive(Debug, Deserialize)]
struct ContentPart {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

impl OpenAIResponsesClient {
    /// Build the client. Fails with a configuration error when no API key is set.
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| AppError::Configuration {
                message: "OPENAI_API_KEY is not set (llm.api_key)".to_string(),
            })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        let url = format!("{}/responses", config.base_url.trim_end_matches('/'));
        info!(url = %url, model = %config.model, "Completion client initialized");

        Ok(Self { client, api_key, url })
    }
}

/// Pull the generated text out of a Responses API body
fn extract_output_text(body: ResponsesBody) -> Result<String> {
    if let Some(error) = body.error {
        return Err(AppError::Synthesis {
            message: error.message,
        });
    }

    let text = match body.output_text {
        Some(text) => text,
        None => body
            .output
            .into_iter()
            .flat_map(|item| item.content)
            .filter(|part| part.kind == "output_text")
            .filter_map(|part| part.text)
            .collect::<Vec<_>>()
            .join(""),
    };

    if text.trim().is_empty() {
        return Err(AppError::Synthesis {
            message: "Empty response from completion provider".to_string(),
        });
    }
    Ok(text)
}

#[async_trait]
impl CompletionProvider for OpenAIResponsesClient {
    async fn generate(&self, request: &CompletionRequest) -> Result<String> {
        let started = Instant::now();

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| AppError::Synthesis {
                message: format!("Completion request failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Synthesis {
                message: format!("Completion API error {}: {}", status, body),
            });
        }

        let body: ResponsesBody = response.json().await.map_err(|e| AppError::Synthesis {
            message: format!("Failed to parse completion response: {}", e),
        })?;

        let text = extract_output_text(body)?;
        debug!(
            model = %request.model,
            output_len = text.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Completion received"
        );
        Ok(text)
    }
}
