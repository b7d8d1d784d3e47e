//! Retrieval over the chunk index
//!
//! Query bodies for the search engine, mapping of ranked hits back into
//! documents, and the service tying both to the engine client.

pub mod engine;
pub mod query_builder;
pub mod reconstruction;
pub mod result_mapper;
pub mod service;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub use engine::{ElasticsearchEngine, SearchEngine};
pub use query_builder::SearchQueryBuilder;
pub use reconstruction::{ChunkReconstructor, DocumentReconstructor, ReconstructionConfig};
pub use result_mapper::{DocumentGroup, FileGroups, ResultMapper};
pub use service::SearchService;

/// One ranked hit from the chunk index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkInfo {
    pub id: String,
    pub score: f64,
    pub content: String,
    pub source_file: String,
    pub chunk_index: usize,
    pub total_chunks: usize,
    pub highlights: Vec<String>,
    pub file_extension: Option<String>,
    pub indexed_at: Option<DateTime<Utc>>,
}

/// A retrieved document; either a single chunk or several chunks of the
/// same source merged together
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: String,
    pub title: String,
    pub content: String,
    pub score: f64,
    pub source: String,
    pub content_type: String,
    pub file_name: Option<String>,
    pub metadata: BTreeMap<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SearchResult {
    /// Label used when citing this result in a prompt
    pub fn citation_label(&self) -> &str {
        self.file_name.as_deref().unwrap_or(&self.source)
    }
}

/// Search parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,

    #[serde(default = "default_limit")]
    pub limit: usize,

    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    10
}

impl SearchRequest {
    pub fn new(query: impl Into<String>, limit: usize, offset: usize) -> Self {
        Self {
            query: query.into(),
            limit,
            offset,
        }
    }
}

/// Mapped search results
///
/// `total` is the engine's chunk-level hit count and is generally larger
/// than `results.len()` once chunks are merged and the page is capped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    pub total: u64,
    pub query: String,
}

/// Base name of a path, accepting both separators
pub(crate) fn file_base_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Extension of a path without the dot, if any
pub(crate) fn file_extension(path: &str) -> Option<&str> {
    let name = file_base_name(path);
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => Some(ext),
        _ => None,
    }
}
