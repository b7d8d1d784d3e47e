//! Prompt Builder - Assembles the language model prompt
//!
//! Provides:
//! - Document context blocks with source attribution
//! - A fixed sliding window over conversation history
//! - Localized headings and instructions
//! - Repeated target-language directives for multilingual turns

use crate::localization::LocalizedStrings;
use crate::search::SearchResult;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Messages of history kept in the prompt
pub const HISTORY_WINDOW: usize = 5;

/// Speaker of a history message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// One earlier message of the conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageContext {
    pub role: MessageRole,
    pub content: String,
}

impl MessageContext {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Everything needed to build one prompt
#[derive(Debug, Clone)]
pub struct PromptContext {
    pub user_message: String,
    pub search_results: Vec<SearchResult>,
    pub conversation_history: Vec<MessageContext>,
    pub response_language: String,
    pub detected_language: Option<String>,
    pub use_document_search: bool,
}

/// Builds prompts from retrieved documents and conversation state
pub struct PromptBuilder {
    strings: Arc<dyn LocalizedStrings>,
}

impl PromptBuilder {
    pub fn new(strings: Arc<dyn LocalizedStrings>) -> Self {
        Self { strings }
    }

    /// `[source] content` lines; with several results, a source summary
    /// and an honesty reminder follow. No results yields an empty string.
    pub fn build_documents_context(&self, results: &[SearchResult], language: &str) -> String {
        if results.is_empty() {
            return String::new();
        }

        let mut lines: Vec<String> = results
            .iter()
            .map(|r| format!("[{}] {}", r.citation_label(), r.content.trim()))
            .collect();

        if results.len() > 1 {
            let mut sources: Vec<&str> = Vec::with_capacity(results.len());
            for label in results.iter().map(SearchResult::citation_label) {
                if !sources.contains(&label) {
                    sources.push(label);
                }
            }

            lines.push(String::new());
            lines.push(format!(
                "{} {}: {}",
                self.text("ui_labels", "sources", language),
                self.text("ui_labels", "used", language),
                sources.join(", ")
            ));
            lines.push(self.text("instructions", "be_honest", language));
        }

        lines.join("\n")
    }

    /// Prompt with system instructions, knowledge-base context, recent
    /// history and the current question
    pub fn build_contextual_prompt(&self, context: &PromptContext) -> String {
        self.assemble(context, false)
    }

    /// [`Self::build_contextual_prompt`] with the target language stated up
    /// front, as an explicit marker, and again at the end
    pub fn build_multilingual_contextual_prompt(&self, context: &PromptContext) -> String {
        self.assemble(context, true)
    }

    fn assemble(&self, context: &PromptContext, multilingual: bool) -> String {
        let language = context.response_language.as_str();
        let mut sections: Vec<String> = Vec::new();

        let target_name = self.language_name(language, language);
        if multilingual {
            sections.push(format!(
                "IMPORTANT: {}",
                self.text("instructions", "respond_in_language", language)
                    .replace("{language}", &target_name)
            ));
            sections.push(format!("MUST RESPOND IN: {}", language.to_uppercase()));

            if let Some(detected) = context
                .detected_language
                .as_deref()
                .filter(|detected| !detected.eq_ignore_ascii_case(language))
            {
                sections.push(
                    self.text("system_prompts", "translation_note", language)
                        .replace("{source}", &self.language_name(detected, language))
                        .replace("{target}", &target_name),
                );
            }
        }

        let (system_key, instruction_key) = if context.use_document_search {
            ("rag_assistant", "context_instruction")
        } else {
            ("rag_assistant_no_docs", "context_instruction_no_docs")
        };
        let mut preamble = vec![
            self.text("system_prompts", system_key, language),
            self.text("system_prompts", instruction_key, language),
        ];
        if !context.use_document_search {
            preamble.push(self.text("instructions", "be_honest_no_docs", language));
        }
        sections.push(preamble.join("\n"));

        let knowledge = if context.use_document_search {
            let documents = self.build_documents_context(&context.search_results, language);
            if documents.is_empty() {
                self.text("system_prompts", "documents_unavailable", language)
            } else {
                documents
            }
        } else {
            self.text("system_prompts", "no_document_search_note", language)
        };
        sections.push(format!(
            "## {}\n{}",
            self.text("system_prompts", "knowledge_base_context", language),
            knowledge
        ));

        let history = recent_history(context);
        if !history.is_empty() {
            let user_label = self.text("ui_labels", "user", language);
            let assistant_label = self.text("ui_labels", "assistant", language);
            let user_tag = match (&context.detected_language, multilingual) {
                (Some(detected), true) => format!("{} ({})", user_label, detected),
                _ => user_label,
            };

            let lines: Vec<String> = history
                .iter()
                .map(|message| {
                    let label = match message.role {
                        MessageRole::User => &user_tag,
                        MessageRole::Assistant => &assistant_label,
                    };
                    format!("{}: {}", label, message.content.trim())
                })
                .collect();

            sections.push(format!(
                "## {}\n{}",
                self.text("system_prompts", "conversation_history", language),
                lines.join("\n")
            ));
        }

        sections.push(format!(
            "## {}\n{}",
            self.text("system_prompts", "current_question", language),
            context.user_message.trim()
        ));

        if multilingual {
            sections.push(format!(
                "REMINDER: {}",
                self.text("instructions", "language_reinforcement", language)
                    .replace("{language}", &target_name)
            ));
        }

        sections.push(format!("{}:", self.text("system_prompts", "response", language)));

        let prompt = sections.join("\n\n");
        tracing::debug!(
            language,
            multilingual,
            documents = context.search_results.len(),
            history = history.len(),
            prompt_chars = prompt.chars().count(),
            "Prompt assembled"
        );
        prompt
    }

    fn text(&self, category: &str, key: &str, language: &str) -> String {
        self.strings.get_localized_string(category, key, language)
    }

    /// Name of `code` in `language`, e.g. "Polish" or "polski"
    fn language_name(&self, code: &str, language: &str) -> String {
        self.text("language_names", &code.to_lowercase(), language)
    }
}

/// Last messages before the current turn
///
/// A trailing user message equal to the current one is the turn itself
/// and is not repeated.
fn recent_history(context: &PromptContext) -> &[MessageContext] {
    let mut history = context.conversation_history.as_slice();

    if let Some((last, earlier)) = history.split_last() {
        if last.role == MessageRole::User && last.content.trim() == context.user_message.trim() {
            history = earlier;
        }
    }

    let start = history.len().saturating_sub(HISTORY_WINDOW);
    &history[start..]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::localization::JsonLocalizedResources;
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn builder() -> PromptBuilder {
        PromptBuilder::new(Arc::new(JsonLocalizedResources::builtin("en").unwrap()))
    }

    fn result(source: &str, file_name: Option<&str>, content: &str) -> SearchResult {
        let now = Utc::now();
        SearchResult {
            id: source.to_string(),
            title: source.to_string(),
            content: content.to_string(),
            score: 1.0,
            source: source.to_string(),
            content_type: "chunk".to_string(),
            file_name: file_name.map(str::to_string),
            metadata: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    fn context(message: &str) -> PromptContext {
        PromptContext {
            user_message: message.to_string(),
            search_results: Vec::new(),
            conversation_history: Vec::new(),
            response_language: "en".to_string(),
            detected_language: None,
            use_document_search: true,
        }
    }

    #[test]
    fn test_documents_context_empty() {
        assert_eq!(builder().build_documents_context(&[], "en"), "");
    }

    #[test]
    fn test_documents_context_single() {
        let text = builder().build_documents_context(
            &[result("docs/a.pdf (2 chunks)", Some("a.pdf"), "Invoices are due in 14 days.")],
            "en",
        );

        assert_eq!(text, "[a.pdf] Invoices are due in 14 days.");
    }

    #[test]
    fn test_documents_context_many_lists_sources() {
        let text = builder().build_documents_context(
            &[
                result("docs/a.pdf", Some("a.pdf"), "alpha"),
                result("b-source", None, "bravo"),
            ],
            "en",
        );

        assert!(text.starts_with("[a.pdf] alpha\n[b-source] bravo"));
        assert!(text.contains("Sources used: a.pdf, b-source"));
        assert!(text.contains("say so honestly"));
    }

    #[test]
    fn test_documents_context_missing_strings_degrade() {
        let builder = PromptBuilder::new(Arc::new(JsonLocalizedResources::empty("en")));
        let text = builder.build_documents_context(
            &[result("a", None, "alpha"), result("b", None, "bravo")],
            "xx",
        );

        assert!(text.contains("sources used: a, b"));
    }

    #[test]
    fn test_contextual_prompt_with_documents() {
        let mut ctx = context("When are invoices due?");
        ctx.search_results = vec![result("a.pdf", Some("a.pdf"), "Invoices are due in 14 days.")];

        let prompt = builder().build_contextual_prompt(&ctx);

        assert!(prompt.contains("company's document knowledge base"));
        assert!(prompt.contains("## Knowledge base context\n[a.pdf] Invoices are due in 14 days."));
        assert!(prompt.contains("## Current question\nWhen are invoices due?"));
        assert!(prompt.ends_with("Response:"));
        assert!(!prompt.contains("## Conversation history"));
    }

    #[test]
    fn test_contextual_prompt_without_document_search() {
        let mut ctx = context("Hello");
        ctx.use_document_search = false;
        ctx.search_results = vec![result("a.pdf", None, "ignored")];

        let prompt = builder().build_contextual_prompt(&ctx);

        assert!(prompt.contains("Document search is turned off"));
        assert!(prompt.contains("Document search is disabled."));
        assert!(!prompt.contains("ignored"));
    }

    #[test]
    fn test_contextual_prompt_no_results_found() {
        let prompt = builder().build_contextual_prompt(&context("Where is the contract?"));
        assert!(prompt.contains("No relevant documents were found"));
    }

    #[test]
    fn test_history_limited_to_recent_messages() {
        let mut ctx = context("Question 10");
        for i in 0..10 {
            ctx.conversation_history.push(MessageContext::user(format!("Question {i}")));
            ctx.conversation_history.push(MessageContext::assistant(format!("Answer {i}")));
        }

        let prompt = builder().build_contextual_prompt(&ctx);

        assert!(prompt.contains("## Conversation history"));
        assert!(prompt.contains("User: Question 9"));
        assert!(prompt.contains("Assistant: Answer 9"));
        assert!(prompt.contains("Answer 7"));
        assert!(!prompt.contains("Question 7"));
        assert!(!prompt.contains("Question 0"));
        assert!(!prompt.contains("Answer 0"));
    }

    #[test]
    fn test_current_turn_not_repeated_in_history() {
        let mut ctx = context("How do I approve a contact?");
        ctx.conversation_history = vec![
            MessageContext::user("Hi"),
            MessageContext::assistant("Hello!"),
            MessageContext::user("How do I approve a contact?"),
        ];

        let prompt = builder().build_contextual_prompt(&ctx);

        assert_eq!(prompt.matches("How do I approve a contact?").count(), 1);
        assert!(prompt.contains("User: Hi\nAssistant: Hello!"));
    }

    #[test]
    fn test_localized_headings() {
        let mut ctx = context("Jak działa system?");
        ctx.response_language = "pl".to_string();

        let prompt = builder().build_contextual_prompt(&ctx);

        assert!(prompt.contains("## Aktualne pytanie\nJak działa system?"));
        assert!(prompt.ends_with("Odpowiedź:"));
    }

    #[test]
    fn test_multilingual_prompt_repeats_language() {
        let mut ctx = context("Jak działa system?");
        ctx.response_language = "en".to_string();
        ctx.detected_language = Some("pl".to_string());
        ctx.conversation_history = vec![MessageContext::user("Cześć"), MessageContext::assistant("Hello!")];

        let prompt = builder().build_multilingual_contextual_prompt(&ctx);

        let important = prompt.find("IMPORTANT: Respond in English.").unwrap();
        let marker = prompt.find("MUST RESPOND IN: EN").unwrap();
        let note = prompt.find("The user wrote in Polish. Answer in English.").unwrap();
        let reminder = prompt.find("REMINDER: Write the entire response in English").unwrap();
        assert!(important < marker && marker < note && note < reminder);

        assert!(prompt.starts_with("IMPORTANT:"));
        assert!(prompt.contains("User (pl): Cześć"));
        assert!(prompt.ends_with("Response:"));
    }

    #[test]
    fn test_multilingual_prompt_same_language_has_no_note() {
        let mut ctx = context("Jak działa system?");
        ctx.response_language = "pl".to_string();
        ctx.detected_language = Some("pl".to_string());

        let prompt = builder().build_multilingual_contextual_prompt(&ctx);

        assert!(prompt.contains("MUST RESPOND IN: PL"));
        assert!(prompt.contains("Odpowiadaj w języku: polski."));
        assert!(!prompt.contains("Użytkownik pisał"));
    }

    #[test]
    fn test_prompt_is_deterministic() {
        let mut ctx = context("faktura VAT");
        ctx.search_results = vec![result("a", None, "x"), result("b", None, "y")];

        let builder = builder();
        assert_eq!(
            builder.build_multilingual_contextual_prompt(&ctx),
            builder.build_multilingual_contextual_prompt(&ctx)
        );
    }
}
