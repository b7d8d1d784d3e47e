//! Language model clients
//!
//! The chat orchestrator hands a finished prompt to a [`LanguageModel`]
//! and uses the returned text as the answer.

use crate::config::LlmConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::Duration;

/// Generates a completion for a prompt
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;

    fn model_name(&self) -> &str;
}

/// Client for OpenAI-compatible chat completion endpoints
///
/// Without an API key it answers with a canned development response.
pub struct OpenAiCompatibleModel {
    config: LlmConfig,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: usize,
    temperature: f32,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

impl OpenAiCompatibleModel {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self { config, client })
    }

    fn mock_response(&self, prompt: &str) -> String {
        format!(
            "This is a development response generated without a language model ({} prompt characters). \
            Set llm.api_key to enable real answers.",
            prompt.chars().count()
        )
    }
}

#[async_trait]
impl LanguageModel for OpenAiCompatibleModel {
    async fn generate(&self, prompt: &str) -> Result<String> {
        if self.config.api_key.is_empty() {
            tracing::debug!("No language model API key configured, returning mock response");
            return Ok(self.mock_response(prompt));
        }

        let request = CompletionRequest {
            model: &self.config.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::LanguageModel {
                message: format!("request failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::LanguageModel {
                message: format!("API error {}: {}", status, body),
            });
        }

        let completion: CompletionResponse = response.json().await.map_err(|e| AppError::LanguageModel {
            message: format!("failed to parse response: {}", e),
        })?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| AppError::LanguageModel {
                message: "empty completion".to_string(),
            })
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

/// Test model that returns the prompt it was given
#[derive(Default)]
pub struct MockLanguageModel {
    prompts: Mutex<Vec<String>>,
    fail: bool,
}

impl MockLanguageModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// A model whose every call fails
    pub fn failing() -> Self {
        Self {
            prompts: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    /// Prompts received so far
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .map(|prompts| prompts.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl LanguageModel for MockLanguageModel {
    async fn generate(&self, prompt: &str) -> Result<String> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }

        if self.fail {
            return Err(AppError::LanguageModel {
                message: "mock failure".to_string(),
            });
        }
        Ok(prompt.to_string())
    }

    fn model_name(&self) -> &str {
        "mock-llm"
    }
}
