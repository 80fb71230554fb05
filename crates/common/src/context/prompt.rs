//! Prompt templates for grounded answering

/// Wording used to talk to the model and to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptTemplate {
    /// Language tag this template was selected for
    pub language: &'static str,

    /// Label placed before each passage's source
    pub source_label: &'static str,

    /// System instructions enforcing the grounding rules
    pub instructions: &'static str,

    /// Text placed before the numbered context
    pub context_header: &'static str,

    /// Text placed between the context and the question
    pub question_header: &'static str,

    /// Text placed after the question
    pub footer: &'static str,

    /// Answer returned when retrieval found nothing
    pub no_context_answer: &'static str,
}

pub const ZH: PromptTemplate = PromptTemplate {
    language: "zh",
    source_label: "来源",
    instructions: "你是一个专业的问答助手。只根据提供的上下文信息回答问题，禁止编造。\n\
                   如果上下文不足以回答，请直接说“我不知道”，或提出一个最关键的追问。\n\
                   回答要求：先给结论，再给要点；引用来源用编号，如 [1]、[2]。",
    context_header: "上下文信息（已编号）：\n",
    question_header: "\n\n用户问题：",
    footer: "\n\n请基于上述上下文信息回答问题。",
    no_context_answer: "抱歉，未能检索到相关信息来回答您的问题。",
};

pub const EN: PromptTemplate = PromptTemplate {
    language: "en",
    source_label: "source",
    instructions: "You are a professional question-answering assistant. Answer only from the \
                   provided context and never make things up.\n\
                   If the context is not enough to answer, say \"I don't know\" or ask the single \
                   most important clarifying question.\n\
                   Lead with the conclusion, then the key points; cite sources by number, \
                   such as [1], [2].",
    context_header: "Context (numbered):\n",
    question_header: "\n\nQuestion: ",
    footer: "\n\nAnswer the question based on the context above.",
    no_context_answer: "Sorry, no relevant information was found to answer your question.",
};

impl PromptTemplate {
    /// Template for a configured language tag; unknown tags use `zh`
    pub fn for_language(language: &str) -> Self {
        match language.trim().to_lowercase().as_str() {
            "en" | "english" => EN,
            _ => ZH,
        }
    }

    /// User message: header, the rendered context, the literal question, footer
    pub fn user_input(&self, rendered_context: &str, question: &str) -> String {
        format!(
            "{}{}{}{}{}",
            self.context_header, rendered_context, self.question_header, question, self.footer
        )
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        ZH
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_selection() {
        assert_eq!(PromptTemplate::for_language(" EN "), EN);
        assert_eq!(PromptTemplate::for_language("zh"), ZH);
        assert_eq!(PromptTemplate::for_language("fr"), ZH);
        assert_eq!(PromptTemplate::default().language, "zh");
    }

    #[test]
    fn test_zh_user_input_frame() {
        let input = ZH.user_input("[1] 来源: A\nalpha", "什么是 RAG？");
        assert_eq!(
            input,
            "上下文信息（已编号）：\n[1] 来源: A\nalpha\n\n用户问题：什么是 RAG？\n\n请基于上述上下文信息回答问题。"
        );
    }

    #[test]
    fn test_zh_instructions_are_single_spaced_lines() {
        let lines: Vec<&str> = ZH.instructions.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("你是一个专业的问答助手。"));
        assert!(lines[2].ends_with("如 [1]、[2]。"));
    }

    #[test]
    fn test_en_fallback_text() {
        assert_eq!(
            EN.no_context_answer,
            "Sorry, no relevant information was found to answer your question."
        );
    }
}
