//! Configuration management for RagForge services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config.toml, config.yaml)
//! - Default values

use crate::context::QueryProcessorConfig;
use crate::search::ReconstructionConfig;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Search engine (Elasticsearch-compatible) configuration
    #[serde(default)]
    pub search_engine: SearchEngineConfig,

    /// Embedding service configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Language model configuration
    #[serde(default)]
    pub llm: LlmConfig,

    /// Result mapping and reconstruction
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Query classification policy
    #[serde(default)]
    pub query_processing: QueryProcessorConfig,

    /// Localized prompt strings
    #[serde(default)]
    pub localization: LocalizationConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchEngineConfig {
    /// Base URL of the engine
    #[serde(default = "default_search_url")]
    pub url: String,

    /// Index holding the document chunks
    #[serde(default = "default_index_name")]
    pub index_name: String,

    /// Basic auth username
    pub username: Option<String>,

    /// Basic auth password
    pub password: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,

    /// Use lexical + vector scoring when an embedder is available
    #[serde(default = "default_enabled")]
    pub hybrid_enabled: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    /// Embedding provider: openai, mock
    #[serde(default = "default_embedding_provider")]
    pub provider: String,

    /// API key for embedding service
    pub api_key: Option<String>,

    /// API base URL (for custom endpoints)
    pub api_base: Option<String>,

    /// Model to use
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Embedding dimension
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    /// Request timeout in seconds
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    /// Chat completions endpoint
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,

    /// API key; empty selects the offline mock answer
    #[serde(default)]
    pub api_key: String,

    /// Model name
    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum output tokens
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    /// Timeout in seconds
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrievalConfig {
    /// Merge several chunks of one file into a single result
    #[serde(default = "default_enabled")]
    pub reconstruct_documents: bool,

    /// Strip text repeated between adjacent chunks
    #[serde(default = "default_enabled")]
    pub remove_chunk_overlap: bool,

    /// Shortest prefix/suffix match treated as overlap
    #[serde(default = "default_min_overlap")]
    pub min_overlap_chars: usize,

    /// Longest prefix/suffix match examined
    #[serde(default = "default_max_overlap")]
    pub max_overlap_chars: usize,

    /// Highlights kept in reconstructed metadata
    #[serde(default = "default_max_highlights")]
    pub max_highlights: usize,

    /// Documents requested per chat turn
    #[serde(default = "default_chat_document_limit")]
    pub chat_document_limit: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LocalizationConfig {
    /// Language used when the requested one has no string
    #[serde(default = "default_language")]
    pub default_language: String,

    /// Languages accepted from clients
    #[serde(default = "default_supported_languages")]
    pub supported_languages: Vec<String>,

    /// Directory of `<lang>.json` files overriding the built-in strings
    pub resources_dir: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_request_timeout() -> u64 { 60 }
fn default_search_url() -> String { "http://localhost:9200".to_string() }
fn default_index_name() -> String { "rag-chunks".to_string() }
fn default_search_timeout() -> u64 { 30 }
fn default_embedding_provider() -> String { "mock".to_string() }
fn default_embedding_model() -> String { "text-embedding-3-small".to_string() }
fn default_embedding_dimension() -> usize { 768 }
fn default_embedding_timeout() -> u64 { 30 }
fn default_llm_endpoint() -> String { "https://api.openai.com/v1/chat/completions".to_string() }
fn default_llm_model() -> String { "gpt-4o-mini".to_string() }
fn default_temperature() -> f32 { 0.3 }
fn default_max_tokens() -> usize { 1000 }
fn default_llm_timeout() -> u64 { 120 }
fn default_min_overlap() -> usize { 10 }
fn default_max_overlap() -> usize { 200 }
fn default_max_highlights() -> usize { 5 }
fn default_chat_document_limit() -> usize { 3 }
fn default_language() -> String { "en".to_string() }
fn default_supported_languages() -> Vec<String> {
    ["pl", "en", "ro", "hu", "nl"].iter().map(|s| s.to_string()).collect()
}
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_port() -> u16 { 9090 }
fn default_service_name() -> String { "ragforge".to_string() }
fn default_enabled() -> bool { true }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for SearchEngineConfig {
    fn default() -> Self {
        Self {
            url: default_search_url(),
            index_name: default_index_name(),
            username: None,
            password: None,
            timeout_secs: default_search_timeout(),
            hybrid_enabled: default_enabled(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            api_key: None,
            api_base: None,
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            timeout_secs: default_embedding_timeout(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: default_llm_endpoint(),
            api_key: String::new(),
            model: default_llm_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_llm_timeout(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            reconstruct_documents: default_enabled(),
            remove_chunk_overlap: default_enabled(),
            min_overlap_chars: default_min_overlap(),
            max_overlap_chars: default_max_overlap(),
            max_highlights: default_max_highlights(),
            chat_document_limit: default_chat_document_limit(),
        }
    }
}

impl Default for LocalizationConfig {
    fn default() -> Self {
        Self {
            default_language: default_language(),
            supported_languages: default_supported_languages(),
            resources_dir: None,
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: default_metrics_port(),
            service_name: default_service_name(),
        }
    }
}

impl RetrievalConfig {
    /// Reconstruction settings derived from this section
    pub fn reconstruction(&self) -> ReconstructionConfig {
        ReconstructionConfig {
            enabled: self.reconstruct_documents,
            remove_overlap: self.remove_chunk_overlap,
            min_overlap_chars: self.min_overlap_chars,
            max_overlap_chars: self.max_overlap_chars,
            max_highlights: self.max_highlights,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__SEARCH_ENGINE__URL=http://es:9200
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )

            .build()?;

        config.try_deserialize()
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )
            .build()?;

        config.try_deserialize()
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Search endpoint for the configured index
    pub fn search_url(&self) -> String {
        self.search_engine.search_url()
    }
}

impl SearchEngineConfig {
    /// Engine root without a trailing slash
    pub fn base_url(&self) -> &str {
        self.url.trim_end_matches('/')
    }

    /// `_search` endpoint of the configured index
    pub fn search_url(&self) -> String {
        format!("{}/{}/_search", self.base_url(), self.index_name)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
