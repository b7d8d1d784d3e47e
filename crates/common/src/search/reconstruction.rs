//! Document reconstruction from ranked chunks
//!
//! When several chunks of one source file come back from the engine they
//! are merged into a single result in reading order, so the prompt sees
//! coherent passages instead of fragments.

use super::{file_base_name, file_extension, ChunkInfo, SearchResult};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Reconstruction settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconstructionConfig {
    /// Merge multi-chunk files at all
    pub enabled: bool,

    /// Strip text repeated at chunk boundaries
    pub remove_overlap: bool,

    /// Shortest boundary repeat treated as overlap (characters)
    pub min_overlap_chars: usize,

    /// Longest boundary repeat searched for (characters)
    pub max_overlap_chars: usize,

    /// Highlight fragments kept in metadata
    pub max_highlights: usize,
}

impl Default for ReconstructionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            remove_overlap: true,
            min_overlap_chars: 10,
            max_overlap_chars: 200,
            max_highlights: 5,
        }
    }
}

/// Decides on and performs the merge of one file's chunks
pub trait DocumentReconstructor: Send + Sync {
    /// Whether the group should be merged into one result
    fn should_reconstruct_full_document(&self, chunks: &[ChunkInfo]) -> bool;

    /// Merge chunks of `source_file` into one result
    fn reconstruct_document_from_chunks(&self, source_file: &str, chunks: &[ChunkInfo]) -> SearchResult;
}

/// Default reconstructor: orders by chunk index and joins contents
#[derive(Debug, Clone, Default)]
pub struct ChunkReconstructor {
    config: ReconstructionConfig,
}

impl ChunkReconstructor {
    pub fn new(config: ReconstructionConfig) -> Self {
        Self { config }
    }

    /// Join chunk contents with single spaces, dropping boundary repeats
    /// between consecutive chunks
    fn merge_contents(&self, ordered: &[&ChunkInfo]) -> String {
        let mut merged = String::new();
        let mut previous: Option<(usize, &str)> = None;

        for chunk in ordered {
            let content = chunk.content.trim();
            if content.is_empty() {
                continue;
            }

            // Only neighbours from the splitter share text
            let continuation = match previous {
                Some((prev_index, prev)) if self.config.remove_overlap && chunk.chunk_index == prev_index + 1 => {
                    self.strip_overlap(prev, content)
                }
                _ => None,
            };

            match continuation {
                // Remainder continues the same source text, so no separator
                Some(rest) => merged.push_str(rest),
                None => {
                    if !merged.is_empty() {
                        merged.push(' ');
                    }
                    merged.push_str(content);
                }
            }
            previous = Some((chunk.chunk_index, content));
        }

        merged
    }

    /// Remainder of `next` after the longest prefix that repeats the end
    /// of `prev`, or `None` when no overlap is found
    fn strip_overlap<'a>(&self, prev: &str, next: &'a str) -> Option<&'a str> {
        let next_chars = next.chars().count();
        let upper = self
            .config
            .max_overlap_chars
            .min(next_chars)
            .min(prev.chars().count());

        if upper < self.config.min_overlap_chars {
            return None;
        }

        for len in (self.config.min_overlap_chars..=upper).rev() {
            let split = next
                .char_indices()
                .nth(len)
                .map(|(idx, _)| idx)
                .unwrap_or(next.len());

            if prev.ends_with(&next[..split]) {
                tracing::trace!(overlap_chars = len, "Removed chunk overlap");
                return Some(&next[split..]);
            }
        }

        None
    }
}

impl DocumentReconstructor for ChunkReconstructor {
    fn should_reconstruct_full_document(&self, chunks: &[ChunkInfo]) -> bool {
        self.config.enabled && chunks.len() > 1
    }

    fn reconstruct_document_from_chunks(&self, source_file: &str, chunks: &[ChunkInfo]) -> SearchResult {
        let mut ordered: Vec<&ChunkInfo> = chunks.iter().collect();
        ordered.sort_by_key(|c| c.chunk_index);

        let content = self.merge_contents(&ordered);
        let score = chunks
            .iter()
            .map(|c| c.score)
            .fold(f64::NEG_INFINITY, f64::max);
        let score = if score.is_finite() { score } else { 0.0 };

        let file_name = file_base_name(source_file).to_string();
        let extension = ordered
            .iter()
            .find_map(|c| c.file_extension.as_deref())
            .or_else(|| file_extension(source_file));
        let content_type = extension
            .map(|e| e.trim_start_matches('.').to_uppercase())
            .unwrap_or_else(|| "DOCUMENT".to_string());

        let total_chunks = chunks.iter().map(|c| c.total_chunks).max().unwrap_or(0);
        let chunk_indexes: Vec<usize> = ordered.iter().map(|c| c.chunk_index).collect();

        let mut metadata: BTreeMap<String, Value> = BTreeMap::new();
        metadata.insert("chunksFound".into(), json!(chunks.len()));
        metadata.insert("totalChunks".into(), json!(total_chunks));
        metadata.insert("chunkIndexes".into(), json!(chunk_indexes));
        metadata.insert("reconstructed".into(), json!(true));
        metadata.insert("score".into(), json!(score));

        let highlights: Vec<&str> = ordered
            .iter()
            .flat_map(|c| c.highlights.iter().map(String::as_str))
            .take(self.config.max_highlights)
            .collect();
        if !highlights.is_empty() {
            metadata.insert("highlights".into(), json!(highlights.join(" ... ")));
        }

        let now = Utc::now();
        let created_at = chunks.iter().filter_map(|c| c.indexed_at).min().unwrap_or(now);
        let updated_at = chunks.iter().filter_map(|c| c.indexed_at).max().unwrap_or(now);

        tracing::debug!(
            source_file = %source_file,
            chunks = chunks.len(),
            total_chunks,
            content_chars = content.len(),
            "Reconstructed document from chunks"
        );

        SearchResult {
            id: ordered.first().map(|c| c.id.clone()).unwrap_or_default(),
            title: file_name.clone(),
            content,
            score,
            source: format!("{} ({} chunks)", source_file, chunks.len()),
            content_type,
            file_name: Some(file_name),
            metadata,
            created_at,
            updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(index: usize, score: f64, content: &str) -> ChunkInfo {
        ChunkInfo {
            id: format!("doc-{}", index),
            score,
            content: content.to_string(),
            source_file: "docs/finance/report.pdf".to_string(),
            chunk_index: index,
            total_chunks: 4,
            highlights: Vec::new(),
            file_extension: None,
            indexed_at: None,
        }
    }

    #[test]
    fn test_should_reconstruct_only_groups() {
        let reconstructor = ChunkReconstructor::default();
        assert!(!reconstructor.should_reconstruct_full_document(&[chunk(0, 1.0, "a")]));
        assert!(reconstructor.should_reconstruct_full_document(&[chunk(0, 1.0, "a"), chunk(1, 1.0, "b")]));
    }

    #[test]
    fn test_disabled_never_reconstructs() {
        let reconstructor = ChunkReconstructor::new(ReconstructionConfig {
            enabled: false,
            ..ReconstructionConfig::default()
        });
        assert!(!reconstructor.should_reconstruct_full_document(&[chunk(0, 1.0, "a"), chunk(1, 1.0, "b")]));
    }

    #[test]
    fn test_orders_by_chunk_index_and_joins_with_spaces() {
        let chunks = vec![
            chunk(2, 0.5, "third part"),
            chunk(0, 0.9, "first part"),
            chunk(1, 0.7, "second part"),
        ];
        let result = ChunkReconstructor::default()
            .reconstruct_document_from_chunks("docs/finance/report.pdf", &chunks);

        assert_eq!(result.content, "first part second part third part");
        assert_eq!(result.id, "doc-0");
        assert_eq!(result.score, 0.9);
        assert_eq!(result.title, "report.pdf");
        assert_eq!(result.file_name.as_deref(), Some("report.pdf"));
        assert_eq!(result.source, "docs/finance/report.pdf (3 chunks)");
        assert_eq!(result.content_type, "PDF");
    }

    #[test]
    fn test_removes_boundary_overlap() {
        let chunks = vec![
            chunk(0, 1.0, "Alpha beta gamma delta epsilon"),
            chunk(1, 1.0, "gamma delta epsilon zeta eta"),
        ];
        let result = ChunkReconstructor::default()
            .reconstruct_document_from_chunks("report.pdf", &chunks);

        assert_eq!(result.content, "Alpha beta gamma delta epsilon zeta eta");
    }

    #[test]
    fn test_overlap_ending_mid_word_keeps_word_whole() {
        let chunks = vec![
            chunk(0, 1.0, "The document describes reconstruction"),
            chunk(1, 1.0, "reconstructions are merged in order"),
        ];
        let result = ChunkReconstructor::default()
            .reconstruct_document_from_chunks("report.pdf", &chunks);

        assert_eq!(result.content, "The document describes reconstructions are merged in order");
    }

    #[test]
    fn test_non_adjacent_chunks_keep_repeated_text() {
        let chunks = vec![
            chunk(0, 1.0, "Intro text. Payment terms summary"),
            chunk(7, 1.0, "Payment terms summary for 2024: net 30 days"),
        ];
        let result = ChunkReconstructor::default()
            .reconstruct_document_from_chunks("report.pdf", &chunks);

        assert_eq!(
            result.content,
            "Intro text. Payment terms summary Payment terms summary for 2024: net 30 days"
        );
    }

    #[test]
    fn test_blank_chunk_breaks_adjacency() {
        let chunks = vec![
            chunk(0, 1.0, "Alpha beta gamma delta epsilon"),
            chunk(1, 1.0, " "),
            chunk(2, 1.0, "gamma delta epsilon zeta eta"),
        ];
        let result = ChunkReconstructor::default()
            .reconstruct_document_from_chunks("report.pdf", &chunks);

        assert_eq!(result.content, "Alpha beta gamma delta epsilon gamma delta epsilon zeta eta");
    }

    #[test]
    fn test_short_repeat_is_not_overlap() {
        // "to be" is under the 10 character minimum
        let chunks = vec![chunk(0, 1.0, "what is to be"), chunk(1, 1.0, "to be done")];
        let result = ChunkReconstructor::default()
            .reconstruct_document_from_chunks("report.pdf", &chunks);

        assert_eq!(result.content, "what is to be to be done");
    }

    #[test]
    fn test_overlap_removal_can_be_disabled() {
        let reconstructor = ChunkReconstructor::new(ReconstructionConfig {
            remove_overlap: false,
            ..ReconstructionConfig::default()
        });
        let chunks = vec![
            chunk(0, 1.0, "Alpha beta gamma delta epsilon"),
            chunk(1, 1.0, "gamma delta epsilon zeta eta"),
        ];
        let result = reconstructor.reconstruct_document_from_chunks("report.pdf", &chunks);

        assert_eq!(result.content, "Alpha beta gamma delta epsilon gamma delta epsilon zeta eta");
    }

    #[test]
    fn test_blank_chunks_skipped() {
        let chunks = vec![chunk(0, 1.0, "start"), chunk(1, 1.0, "   "), chunk(2, 1.0, "end")];
        let result = ChunkReconstructor::default()
            .reconstruct_document_from_chunks("report.pdf", &chunks);

        assert_eq!(result.content, "start end");
    }

    #[test]
    fn test_overlap_on_multibyte_text() {
        let chunks = vec![
            chunk(0, 1.0, "Faktura zawiera należności główne"),
            chunk(1, 1.0, "należności główne oraz odsetki"),
        ];
        let result = ChunkReconstructor::default()
            .reconstruct_document_from_chunks("faktura.docx", &chunks);

        assert_eq!(result.content, "Faktura zawiera należności główne oraz odsetki");
        assert_eq!(result.content_type, "DOCX");
    }

    #[test]
    fn test_metadata() {
        let mut first = chunk(0, 0.4, "first");
        first.highlights = vec!["<em>one</em>".into(), "<em>two</em>".into()];
        let mut second = chunk(3, 0.8, "second");
        second.highlights = vec!["<em>three</em>".into()];

        let reconstructor = ChunkReconstructor::new(ReconstructionConfig {
            max_highlights: 2,
            ..ReconstructionConfig::default()
        });
        let result = reconstructor.reconstruct_document_from_chunks("notes", &[second, first]);

        assert_eq!(result.metadata["chunksFound"], json!(2));
        assert_eq!(result.metadata["totalChunks"], json!(4));
        assert_eq!(result.metadata["chunkIndexes"], json!([0, 3]));
        assert_eq!(result.metadata["reconstructed"], json!(true));
        assert_eq!(result.metadata["highlights"], json!("<em>one</em> ... <em>two</em>"));
        assert_eq!(result.content_type, "DOCUMENT");
    }
}
