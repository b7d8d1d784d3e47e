//! Chat orchestration
//!
//! One chat turn: resolve languages, retrieve documents, assemble the
//! prompt and ask the language model. Retrieval problems never fail the
//! turn; the answer is then produced without document context.

use super::llm::LanguageModel;
use super::prompt_builder::{MessageContext, PromptBuilder, PromptContext};
use crate::config::AppConfig;
use crate::errors::Result;
use crate::localization::{LanguageDetector, LocalizedStrings};
use crate::metrics;
use crate::search::{SearchRequest, SearchResult, SearchService};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Chat turn request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,

    #[serde(default)]
    pub history: Vec<MessageContext>,

    /// Language the user writes in; detected when absent
    #[serde(default)]
    pub language: Option<String>,

    /// Language of the answer; defaults to the user's language
    #[serde(default)]
    pub response_language: Option<String>,

    #[serde(default = "default_use_document_search")]
    pub use_document_search: bool,
}

fn default_use_document_search() -> bool {
    true
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            history: Vec::new(),
            language: None,
            response_language: None,
            use_document_search: true,
        }
    }
}

/// Document cited by an answer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSource {
    pub id: String,
    pub title: String,
    pub source: String,
    pub score: f64,
}

impl From<&SearchResult> for ChatSource {
    fn from(result: &SearchResult) -> Self {
        Self {
            id: result.id.clone(),
            title: result.title.clone(),
            source: result.source.clone(),
            score: result.score,
        }
    }
}

/// Chat turn response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub id: Uuid,
    pub answer: String,
    pub sources: Vec<ChatSource>,
    pub detected_language: String,
    pub response_language: String,
    pub documents_used: usize,
    pub prompt_chars: usize,
    pub created_at: DateTime<Utc>,
}

/// Answers chat turns over the document index
pub struct ChatOrchestrator {
    search: Arc<SearchService>,
    model: Arc<dyn LanguageModel>,
    prompts: PromptBuilder,
    detector: LanguageDetector,
    document_limit: usize,
}

impl ChatOrchestrator {
    pub fn new(
        config: &AppConfig,
        search: Arc<SearchService>,
        model: Arc<dyn LanguageModel>,
        strings: Arc<dyn LocalizedStrings>,
    ) -> Self {
        Self {
            search,
            model,
            prompts: PromptBuilder::new(strings),
            detector: LanguageDetector::new(&config.localization),
            document_limit: config.retrieval.chat_document_limit,
        }
    }

    /// Answer one chat turn
    pub async fn respond(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let detected_language = match &request.language {
            Some(language) => self.detector.normalize(language),
            None => self.detector.detect(&request.message),
        };
        let response_language = request
            .response_language
            .as_deref()
            .map(|language| self.detector.normalize(language))
            .unwrap_or_else(|| detected_language.clone());

        let search_results = if request.use_document_search {
            self.retrieve(&request.message).await
        } else {
            Vec::new()
        };

        let context = PromptContext {
            user_message: request.message.clone(),
            search_results,
            conversation_history: request.history.clone(),
            response_language: response_language.clone(),
            detected_language: Some(detected_language.clone()),
            use_document_search: request.use_document_search,
        };
        let prompt = self.prompts.build_multilingual_contextual_prompt(&context);
        let prompt_chars = prompt.chars().count();

        let start = Instant::now();
        let answer = self.model.generate(&prompt).await?;
        let llm_secs = start.elapsed().as_secs_f64();

        let documents_used = context.search_results.len();
        metrics::record_chat(llm_secs, documents_used > 0, prompt_chars);

        tracing::info!(
            model = self.model.model_name(),
            detected_language = %detected_language,
            response_language = %response_language,
            documents_used,
            prompt_chars,
            llm_ms = (llm_secs * 1000.0) as u64,
            "Chat turn answered"
        );

        Ok(ChatResponse {
            id: Uuid::new_v4(),
            answer,
            sources: context.search_results.iter().map(ChatSource::from).collect(),
            detected_language,
            response_language,
            documents_used,
            prompt_chars,
            created_at: Utc::now(),
        })
    }

    async fn retrieve(&self, message: &str) -> Vec<SearchResult> {
        let request = SearchRequest::new(message, self.document_limit, 0);
        match self.search.search(&request).await {
            Ok(response) => response.results,
            Err(e) => {
                tracing::warn!(error = %e, "Document search failed, answering without documents");
                Vec::new()
            }
        }
    }
}
