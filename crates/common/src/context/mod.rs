//! Context engine
//!
//! Turns retrieved passages into a grounded answer:
//! - Context assembly with citation numbering
//! - Prompt templates (zh, en)
//! - Answer synthesis with model-specific request shaping

mod assembler;
pub mod prompt;
mod synthesizer;

pub use assembler::{assemble, ContextBlock, UNKNOWN_SOURCE};
pub use prompt::PromptTemplate;
pub use synthesizer::{extract_citations, Answer, AnswerSynthesizer, Prompt};
