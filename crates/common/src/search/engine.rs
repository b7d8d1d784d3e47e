//! Search engine client
//!
//! Thin transport over an Elasticsearch-compatible `_search` endpoint.
//! Response bodies are returned raw; interpretation belongs to the
//! result mapper.

use crate::config::SearchEngineConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde_json::Value;

/// Executes query bodies against the chunk index
#[async_trait]
pub trait SearchEngine: Send + Sync {
    /// Run a query body, returning the raw response text
    async fn search(&self, body: &Value) -> Result<String>;

    /// Check that the engine is reachable
    async fn ping(&self) -> Result<()>;
}

/// HTTP client for Elasticsearch / OpenSearch
pub struct ElasticsearchEngine {
    client: reqwest::Client,
    base_url: String,
    search_url: String,
    username: Option<String>,
    password: Option<String>,
}

impl ElasticsearchEngine {
    pub fn new(config: &SearchEngineConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: config.base_url().to_string(),
            search_url: config.search_url(),
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.username {
            Some(user) => request.basic_auth(user, self.password.as_ref()),
            None => request,
        }
    }
}

/// Transport failures mean the engine is unreachable; anything else is a
/// client-side problem
fn transport_error(err: reqwest::Error) -> AppError {
    if err.is_connect() || err.is_timeout() {
        AppError::SearchEngineUnavailable {
            message: err.to_string(),
        }
    } else {
        AppError::HttpClient(err)
    }
}

#[async_trait]
impl SearchEngine for ElasticsearchEngine {
    async fn search(&self, body: &Value) -> Result<String> {
        let response = self
            .authorize(self.client.post(&self.search_url))
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let text = response.text().await.map_err(transport_error)?;

        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), url = %self.search_url, "Search engine rejected query");
            return Err(AppError::SearchEngine {
                status: status.as_u16(),
                message: text,
            });
        }

        Ok(text)
    }

    async fn ping(&self) -> Result<()> {
        let response = self
            .authorize(self.client.get(&self.base_url))
            .send()
            .await
            .map_err(transport_error)?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(AppError::SearchEngine {
                status: response.status().as_u16(),
                message: "health check failed".to_string(),
            })
        }
    }
}
