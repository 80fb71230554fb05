//! Answer synthesizer - grounded answer generation from numbered context
//!
//! Provides:
//! - Prompt construction (system instructions + numbered context + question)
//! - The empty-context short circuit
//! - Citation extraction for logging

use super::assembler::ContextBlock;
use super::prompt::PromptTemplate;
use crate::errors::{AppError, PipelineStage, Result};
use crate::llm::{CompletionProvider, ModelInvocationParams};
use regex_lite::Regex;
use std::sync::{Arc, OnceLock};
use tracing::{debug, info};

/// Instructions and user input for one completion call
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub instructions: String,
    pub input: String,
}

/// Answer grounded on a context block
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    /// Generated (or canned) answer text
    pub text: String,

    /// Passages the answer was grounded on
    pub contexts: ContextBlock,

    /// Citation indices found in the text, ascending
    pub citations: Vec<usize>,
}

impl Answer {
    /// Whether the canned no-context answer was returned
    pub fn is_fallback(&self) -> bool {
        self.contexts.is_empty()
    }
}

/// Synthesizer for generating answers
pub struct AnswerSynthesizer {
    provider: Arc<dyn CompletionProvider>,
    params: ModelInvocationParams,
    template: PromptTemplate,
}

impl AnswerSynthesizer {
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        params: ModelInvocationParams,
        template: PromptTemplate,
    ) -> Self {
        Self {
            provider,
            params,
            template,
        }
    }

    pub fn params(&self) -> &ModelInvocationParams {
        &self.params
    }

    pub fn template(&self) -> &PromptTemplate {
        &self.template
    }

    /// Build the prompt for a non-empty context block
    pub fn build_prompt(&self, question: &str, contexts: &ContextBlock) -> Prompt {
        let rendered = contexts.render(self.template.source_label);
        Prompt {
            instructions: self.template.instructions.to_string(),
            input: self.template.user_input(&rendered, question),
        }
    }

    /// Synthesize an answer from context
    ///
    /// An empty block returns the canned answer without calling the
    /// provider. Provider failures come back as synthesis-stage errors and
    /// are not retried.
    pub async fn synthesize(&self, question: &str, contexts: ContextBlock) -> Result<Answer> {
        if contexts.is_empty() {
            info!("No context retrieved, returning fallback answer");
            return Ok(Answer {
                text: self.template.no_context_answer.to_string(),
                contexts,
                citations: Vec::new(),
            });
        }

        let prompt = self.build_prompt(question, &contexts);
        let request = self.params.request(prompt.instructions, prompt.input);
        debug!(
            model = %request.model,
            reasoning = request.reasoning.is_some(),
            passages = contexts.len(),
            "Calling completion provider"
        );

        let text = self
            .provider
            .generate(&request)
            .await
            .map_err(|e| AppError::at_stage(PipelineStage::Synthesize, e))?;

        let citations = extract_citations(&text, contexts.len());
        Ok(Answer {
            text,
            contexts,
            citations,
        })
    }
}

fn citation_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"\[(\d+)\]").ok())
        .as_ref()
}

/// Find `[n]` markers in `text` with `1 <= n <= passages`, deduplicated and ascending
pub fn extract_citations(text: &str, passages: usize) -> Vec<usize> {
    let Some(pattern) = citation_pattern() else {
        return Vec::new();
    };
    let mut indices: Vec<usize> = pattern
        .captures_iter(text)
        .filter_map(|cap| cap.get(1))
        .filter_map(|m| m.as_str().parse::<usize>().ok())
        .filter(|&idx| idx > 0 && idx <= passages)
        .collect();
    indices.sort_unstable();
    indices.dedup();
    indices
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LlmConfig;
    use crate::context::{assemble, prompt};
    use crate::testing::{hit, FakeProvider};

    fn block(sources: &[&str]) -> ContextBlock {
        assemble(
            sources
                .iter()
                .enumerate()
                .map(|(i, s)| hit(&format!("doc-{}", i), Some(s), &format!("passage {}", s)))
                .collect(),
        )
    }

    fn synthesizer(provider: Arc<FakeProvider>, model: &str) -> AnswerSynthesizer {
        let params = ModelInvocationParams::from_config(&LlmConfig {
            model: model.to_string(),
            ..LlmConfig::default()
        });
        AnswerSynthesizer::new(provider, params, prompt::ZH)
    }

    #[tokio::test]
    async fn test_empty_context_skips_provider() {
        let provider = Arc::new(FakeProvider::replying("unused"));
        let synth = synthesizer(provider.clone(), "gpt-5-mini");

        let answer = synth
            .synthesize("什么是 RAG？", ContextBlock::default())
            .await
            .unwrap();

        assert_eq!(answer.text, "抱歉，未能检索到相关信息来回答您的问题。");
        assert!(answer.is_fallback());
        assert!(answer.contexts.is_empty());
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_prompt_carries_numbered_block_then_question() {
        let provider = Arc::new(FakeProvider::replying("RAG 是检索增强生成 [1][3]。"));
        let synth = synthesizer(provider.clone(), "gpt-5-mini");

        let answer = synth
            .synthesize("什么是 RAG？", block(&["A", "B", "C"]))
            .await
            .unwrap();

        assert_eq!(answer.text, "RAG 是检索增强生成 [1][3]。");
        assert_eq!(answer.citations, vec![1, 3]);

        let requests = provider.requests();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.instructions, prompt::ZH.instructions);
        assert_eq!(
            request.input,
            "上下文信息（已编号）：\n\
             [1] 来源: A\npassage A\n\n\
             [2] 来源: B\npassage B\n\n\
             [3] 来源: C\npassage C\n\n\
             用户问题：什么是 RAG？\n\n\
             请基于上述上下文信息回答问题。"
        );
        assert!(request.reasoning.is_some());
        assert!(request.text.is_some());
    }

    #[tokio::test]
    async fn test_non_reasoning_model_request_is_plain() {
        let provider = Arc::new(FakeProvider::replying("ok [1]"));
        let synth = synthesizer(provider.clone(), "gpt-4o-mini");

        synth.synthesize("q", block(&["A"])).await.unwrap();

        let requests = provider.requests();
        assert!(requests[0].reasoning.is_none());
        assert!(requests[0].text.is_none());
    }

    #[tokio::test]
    async fn test_english_template() {
        let provider = Arc::new(FakeProvider::replying("answer"));
        let params = ModelInvocationParams::from_config(&LlmConfig::default());
        let synth = AnswerSynthesizer::new(provider.clone(), params, prompt::EN);

        let built = synth.build_prompt("What is RAG?", &block(&["A"]));
        assert!(built.input.starts_with("Context (numbered):\n[1] source: A\npassage A"));
        assert!(built.input.contains("Question: What is RAG?"));

        let answer = synth.synthesize("q", ContextBlock::default()).await.unwrap();
        assert_eq!(answer.text, prompt::EN.no_context_answer);
    }

    #[tokio::test]
    async fn test_provider_failure_is_synthesis_stage() {
        let provider = Arc::new(FakeProvider::failing("OPENAI_API_KEY is not set"));
        let synth = synthesizer(provider.clone(), "gpt-5-mini");

        let err = synth.synthesize("q", block(&["A"])).await.unwrap_err();

        assert_eq!(err.stage(), Some(PipelineStage::Synthesize));
        assert!(err.to_string().contains("OPENAI_API_KEY"));
        assert_eq!(provider.calls(), 1);
    }

    #[test]
    fn test_extract_citations_bounds_and_dedup() {
        assert_eq!(extract_citations("见 [2]、[1] 和 [2]", 3), vec![1, 2]);
        assert_eq!(extract_citations("[0] [4] [x] [3]", 3), vec![3]);
        assert!(extract_citations("no markers", 3).is_empty());
    }
}
