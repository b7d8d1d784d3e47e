//! Result Mapper - Turns raw engine responses into search results
//!
//! Hits are grouped by source file in first-seen order. Each group either
//! passes through as individual chunks or is merged by the configured
//! [`DocumentReconstructor`].

use super::reconstruction::DocumentReconstructor;
use super::{file_base_name, ChunkInfo, SearchRequest, SearchResponse, SearchResult};
use crate::errors::{AppError, Result};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// What to do with the chunks of one source file
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentGroup {
    /// Emit every chunk as its own result
    PassThrough(Vec<ChunkInfo>),
    /// Merge the chunks into one result
    Reconstruct {
        source_file: String,
        chunks: Vec<ChunkInfo>,
    },
}

/// Chunks grouped by source file, iterated in first-seen order
#[derive(Debug, Default)]
pub struct FileGroups {
    groups: Vec<(String, Vec<ChunkInfo>)>,
    index: HashMap<String, usize>,
}

impl FileGroups {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: ChunkInfo) {
        match self.index.get(&chunk.source_file) {
            Some(&slot) => self.groups[slot].1.push(chunk),
            None => {
                self.index.insert(chunk.source_file.clone(), self.groups.len());
                self.groups.push((chunk.source_file.clone(), vec![chunk]));
            }
        }
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[ChunkInfo])> {
        self.groups.iter().map(|(file, chunks)| (file.as_str(), chunks.as_slice()))
    }
}

impl FromIterator<ChunkInfo> for FileGroups {
    fn from_iter<I: IntoIterator<Item = ChunkInfo>>(iter: I) -> Self {
        let mut groups = Self::new();
        for chunk in iter {
            groups.push(chunk);
        }
        groups
    }
}

impl IntoIterator for FileGroups {
    type Item = (String, Vec<ChunkInfo>);
    type IntoIter = std::vec::IntoIter<(String, Vec<ChunkInfo>)>;

    fn into_iter(self) -> Self::IntoIter {
        self.groups.into_iter()
    }
}

/// Maps engine responses to [`SearchResponse`]s
pub struct ResultMapper {
    reconstructor: Arc<dyn DocumentReconstructor>,
}

impl ResultMapper {
    pub fn new(reconstructor: Arc<dyn DocumentReconstructor>) -> Self {
        Self { reconstructor }
    }

    /// Extract a chunk from one hit; absent fields take empty defaults
    pub fn map_chunk_info(hit: &Value) -> ChunkInfo {
        let source = &hit["_source"];
        let position = &source["position"];

        let id = match &hit["_id"] {
            Value::String(id) => id.clone(),
            Value::Number(id) => id.to_string(),
            _ => String::new(),
        };

        let highlights = hit["highlight"]["content"]
            .as_array()
            .map(|fragments| {
                fragments
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let indexed_at = source["indexedAt"]
            .as_str()
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|ts| ts.with_timezone(&Utc));

        ChunkInfo {
            id,
            score: hit["_score"].as_f64().unwrap_or(0.0),
            content: source["content"].as_str().unwrap_or_default().to_string(),
            source_file: source["sourceFile"].as_str().unwrap_or_default().to_string(),
            chunk_index: as_usize(&position["chunkIndex"]).unwrap_or(0),
            total_chunks: as_usize(&position["totalChunks"]).unwrap_or(1),
            highlights,
            file_extension: source["fileExtension"].as_str().map(str::to_string),
            indexed_at,
        }
    }

    /// Parse a raw engine response into at most `request.limit` results
    pub fn map_search_response(&self, raw: &str, request: &SearchRequest) -> Result<SearchResponse> {
        let body: Value = serde_json::from_str(raw).map_err(|e| AppError::MalformedSearchResponse {
            message: format!("response is not JSON: {}", e),
        })?;

        let hits = body
            .get("hits")
            .filter(|hits| hits.is_object())
            .ok_or_else(|| AppError::MalformedSearchResponse {
                message: "missing 'hits' object".to_string(),
            })?;

        let hit_list = hits
            .get("hits")
            .and_then(Value::as_array)
            .ok_or_else(|| AppError::MalformedSearchResponse {
                message: "missing 'hits.hits' array".to_string(),
            })?;

        let total = match hits.get("total") {
            Some(Value::Object(total)) => total.get("value").and_then(Value::as_u64),
            Some(total) => total.as_u64(),
            None => None,
        }
        .unwrap_or(hit_list.len() as u64);

        let groups: FileGroups = hit_list
            .iter()
            .map(Self::map_chunk_info)
            .filter(|chunk| {
                let usable = !chunk.content.trim().is_empty() && !chunk.source_file.is_empty();
                if !usable {
                    tracing::debug!(chunk_id = %chunk.id, "Skipping hit without content or source file");
                }
                usable
            })
            .collect();

        let mut results = Vec::new();
        for (source_file, chunks) in groups {
            if results.len() >= request.limit {
                break;
            }

            match self.classify_group(source_file, chunks) {
                DocumentGroup::Reconstruct { source_file, chunks } => {
                    results.push(
                        self.reconstructor
                            .reconstruct_document_from_chunks(&source_file, &chunks),
                    );
                }
                DocumentGroup::PassThrough(chunks) => {
                    let room = request.limit - results.len();
                    results.extend(chunks.into_iter().take(room).map(chunk_result));
                }
            }
        }

        tracing::debug!(
            query = %request.query,
            hits = hit_list.len(),
            total,
            results = results.len(),
            "Mapped search response"
        );

        Ok(SearchResponse {
            results,
            total,
            query: request.query.clone(),
        })
    }

    fn classify_group(&self, source_file: String, chunks: Vec<ChunkInfo>) -> DocumentGroup {
        if self.reconstructor.should_reconstruct_full_document(&chunks) {
            DocumentGroup::Reconstruct { source_file, chunks }
        } else {
            DocumentGroup::PassThrough(chunks)
        }
    }
}

fn as_usize(value: &Value) -> Option<usize> {
    value.as_u64().and_then(|v| usize::try_from(v).ok())
}

/// A single chunk as a result of its own
fn chunk_result(chunk: ChunkInfo) -> SearchResult {
    let now = Utc::now();
    let file_name = file_base_name(&chunk.source_file).to_string();

    let mut metadata: BTreeMap<String, Value> = BTreeMap::new();
    metadata.insert("chunkIndex".into(), json!(chunk.chunk_index));
    metadata.insert("totalChunks".into(), json!(chunk.total_chunks));
    metadata.insert("reconstructed".into(), json!(false));
    if !chunk.highlights.is_empty() {
        metadata.insert("highlights".into(), json!(chunk.highlights.join(" ... ")));
    }

    SearchResult {
        id: chunk.id,
        title: file_name.clone(),
        content: chunk.content,
        score: chunk.score,
        source: chunk.source_file,
        content_type: "chunk".to_string(),
        file_name: Some(file_name),
        metadata,
        created_at: chunk.indexed_at.unwrap_or(now),
        updated_at: chunk.indexed_at.unwrap_or(now),
    }
}
