//! Completion provider abstraction
//!
//! Provides:
//! - The outbound request shape (OpenAI Responses API)
//! - Reasoning effort and verbosity settings with lenient normalization
//! - Model capability lookup deciding which optional parameters are sent
//! - A lazily built HTTP client that reports missing credentials on first use

mod openai;

pub use openai::OpenAIResponsesClient;

use crate::config::LlmConfig;
use crate::errors::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::OnceCell;

/// Reasoning effort requested from reasoning-capable models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
    None,
    Minimal,
    Low,
    Medium,
    High,
    Xhigh,
}

impl ReasoningEffort {
    /// Trim and lowercase `value`; anything unrecognized becomes `Medium`
    pub fn normalize(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "none" => Self::None,
            "minimal" => Self::Minimal,
            "low" => Self::Low,
            "medium" => Self::Medium,
            "high" => Self::High,
            "xhigh" => Self::Xhigh,
            _ => Self::Medium,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Minimal => "minimal",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Xhigh => "xhigh",
        }
    }
}

impl fmt::Display for ReasoningEffort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output verbosity requested from models that support it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    Low,
    Medium,
    High,
}

impl Verbosity {
    /// Trim and lowercase `value`; anything unrecognized becomes `Medium`
    pub fn normalize(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "low" => Self::Low,
            "medium" => Self::Medium,
            "high" => Self::High,
            _ => Self::Medium,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for Verbosity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a model family accepts beyond the basic request fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ModelCapabilities {
    pub supports_reasoning_params: bool,
}

/// Model id prefixes and their capabilities; first match wins
const MODEL_FAMILIES: &[(&str, ModelCapabilities)] = &[(
    "gpt-5",
    ModelCapabilities {
        supports_reasoning_params: true,
    },
)];

impl ModelCapabilities {
    pub fn for_model(model: &str) -> Self {
        MODEL_FAMILIES
            .iter()
            .find(|(prefix, _)| model.starts_with(prefix))
            .map(|(_, caps)| *caps)
            .unwrap_or_default()
    }
}

/// Resolved invocation parameters for one deployment
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInvocationParams {
    pub model: String,
    pub max_output_tokens: u32,
    pub reasoning_effort: ReasoningEffort,
    pub verbosity: Verbosity,
}

impl ModelInvocationParams {
    /// Normalize the configured strings once, at startup
    pub fn from_config(config: &LlmConfig) -> Self {
        Self {
            model: config.model.clone(),
            max_output_tokens: config.max_output_tokens,
            reasoning_effort: ReasoningEffort::normalize(&config.reasoning_effort),
            verbosity: Verbosity::normalize(&config.verbosity),
        }
    }

    pub fn capabilities(&self) -> ModelCapabilities {
        ModelCapabilities::for_model(&self.model)
    }

    /// Build the outbound request, attaching reasoning and verbosity only
    /// for models that accept them
    pub fn request(&self, instructions: String, input: String) -> CompletionRequest {
        let supports = self.capabilities().supports_reasoning_params;
        CompletionRequest {
            model: self.model.clone(),
            instructions,
            input,
            max_output_tokens: self.max_output_tokens,
            reasoning: supports.then_some(ReasoningOptions {
                effort: self.reasoning_effort,
            }),
            text: supports.then_some(TextOptions {
                verbosity: self.verbosity,
            }),
        }
    }
}

/// Request body for the Responses API
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub instructions: String,
    pub input: String,
    pub max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<ReasoningOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<TextOptions>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReasoningOptions {
    pub effort: ReasoningEffort,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TextOptions {
    pub verbosity: Verbosity,
}

/// A text-generation endpoint
///
/// Implementations return an error rather than an empty string when no
/// text was produced.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn generate(&self, request: &CompletionRequest) -> Result<String>;
}

/// Completion client built on first use
///
/// The gateway starts without an API key; the missing key is reported
/// as a configuration error when an answer is first synthesized.
pub struct LazyCompletionClient {
    config: LlmConfig,
    cell: OnceCell<OpenAIResponsesClient>,
}

impl LazyCompletionClient {
    pub fn new(config: LlmConfig) -> Self {
        Self {
            config,
            cell: OnceCell::new(),
        }
    }

    pub async fn client(&self) -> Result<&OpenAIResponsesClient> {
        self.cell
            .get_or_try_init(|| async { OpenAIResponsesClient::from_config(&self.config) })
            .await
    }
}

#[async_trait]
impl CompletionProvider for LazyCompletionClient {
    async fn generate(&self, request: &CompletionRequest) -> Result<String> {
        self.client().await?.generate(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AppError;
    use serde_json::json;

    fn params(model: &str) -> ModelInvocationParams {
        ModelInvocationParams::from_config(&LlmConfig {
            model: model.to_string(),
            reasoning_effort: " HIGH ".to_string(),
            verbosity: "Low".to_string(),
            ..LlmConfig::default()
        })
    }

    #[test]
    fn test_normalize_accepts_case_and_whitespace() {
        assert_eq!(ReasoningEffort::normalize("  XHigh"), ReasoningEffort::Xhigh);
        assert_eq!(ReasoningEffort::normalize("none"), ReasoningEffort::None);
        assert_eq!(Verbosity::normalize("HIGH\n"), Verbosity::High);
    }

    #[test]
    fn test_unknown_values_fall_back_to_medium() {
        assert_eq!(ReasoningEffort::normalize("extreme"), ReasoningEffort::Medium);
        assert_eq!(ReasoningEffort::normalize(""), ReasoningEffort::Medium);
        assert_eq!(Verbosity::normalize("chatty"), Verbosity::Medium);
        assert_eq!(Verbosity::normalize("minimal"), Verbosity::Medium);
    }

    #[test]
    fn test_capability_lookup() {
        assert!(ModelCapabilities::for_model("gpt-5-mini").supports_reasoning_params);
        assert!(ModelCapabilities::for_model("gpt-5").supports_reasoning_params);
        assert!(!ModelCapabilities::for_model("gpt-4o-mini").supports_reasoning_params);
        assert!(!ModelCapabilities::for_model("my-gpt-5").supports_reasoning_params);
    }

    #[test]
    fn test_reasoning_family_request_carries_options() {
        let request = params("gpt-5-mini").request("rules".into(), "input".into());
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(
            body,
            json!({
                "model": "gpt-5-mini",
                "instructions": "rules",
                "input": "input",
                "max_output_tokens": 1024,
                "reasoning": { "effort": "high" },
                "text": { "verbosity": "low" }
            })
        );
    }

    #[test]
    fn test_other_models_never_carry_reasoning_fields() {
        let request = params("gpt-4.1").request("rules".into(), "input".into());
        let body = serde_json::to_value(&request).unwrap();
        let keys: Vec<&String> = body.as_object().unwrap().keys().collect();
        assert_eq!(keys.len(), 4);
        assert!(body.get("reasoning").is_none());
        assert!(body.get("text").is_none());
    }

    #[tokio::test]
    async fn test_missing_key_reported_on_first_use() {
        let lazy = LazyCompletionClient::new(LlmConfig::default());
        let request = params("gpt-5-mini").request("i".into(), "q".into());
        let err = lazy.generate(&request).await.unwrap_err();
        assert!(matches!(err, AppError::Configuration { .. }));
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }
}
