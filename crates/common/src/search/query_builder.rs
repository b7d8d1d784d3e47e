//! Search Query Builder - Request bodies for the chunk index
//!
//! Two shapes are produced:
//! - BM25: a boolean `should` over phrase, term and fuzzy matches
//! - Hybrid: the same lexical clause rescored with a weighted cosine
//!   similarity against the query embedding

use crate::context::{QueryProcessingResult, QueryType};
use serde_json::{json, Value};

/// Candidates fetched per requested result in hybrid mode; chunks of the
/// same file collapse into one result during reconstruction
pub const HYBRID_OVERFETCH_FACTOR: usize = 3;

/// Builds Elasticsearch-compatible query bodies
#[derive(Debug, Clone)]
pub struct SearchQueryBuilder {
    content_field: String,
    title_field: String,
    vector_field: String,
}

impl Default for SearchQueryBuilder {
    fn default() -> Self {
        Self {
            content_field: "content".to_string(),
            title_field: "title".to_string(),
            vector_field: "embedding".to_string(),
        }
    }
}

impl SearchQueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lexical query with highlighting
    pub fn build_bm25_query(&self, query: &str, limit: usize, offset: usize) -> Value {
        let content = self.content_field.as_str();

        json!({
            "query": {
                "bool": {
                    "should": [
                        { "match_phrase": { content: { "query": query, "boost": 3.0 } } },
                        {
                            "match": {
                                content: {
                                    "query": query,
                                    "operator": "or",
                                    "minimum_should_match": "30%",
                                    "boost": 2.0
                                }
                            }
                        },
                        {
                            "match": {
                                content: { "query": query, "fuzziness": "AUTO", "boost": 1.0 }
                            }
                        },
                        { "match": { self.title_field.as_str(): { "query": query, "boost": 1.5 } } }
                    ],
                    "minimum_should_match": 1
                }
            },
            "size": limit,
            "from": offset,
            "highlight": self.highlight(200)
        })
    }

    /// Lexical clause rescored by weighted vector similarity
    ///
    /// Fetches `limit * 3` candidates from the top of the ranking; `offset`
    /// does not shift the window.
    pub fn build_hybrid_query(
        &self,
        query: &str,
        embedding: &[f32],
        processed: &QueryProcessingResult,
        limit: usize,
        offset: usize,
    ) -> Value {
        let content = self.content_field.as_str();
        let keywords = processed.query_type == QueryType::Keywords;
        let phrase_boost = if keywords { 3.0 } else { 2.0 };
        let minimum_match = if keywords { "50%" } else { "20%" };
        let size = limit.saturating_mul(HYBRID_OVERFETCH_FACTOR);

        tracing::debug!(
            query_type = processed.query_type.as_str(),
            keyword_weight = processed.keyword_weight,
            semantic_weight = processed.semantic_weight,
            size,
            ignored_offset = offset,
            "Building hybrid query"
        );

        // +1.0 keeps the similarity term non-negative
        let script = format!(
            "params.bm25_weight * _score + params.semantic_weight * (cosineSimilarity(params.query_vector, '{}') + 1.0) * 10.0",
            self.vector_field
        );

        json!({
            "size": size,
            "query": {
                "script_score": {
                    "query": {
                        "bool": {
                            "should": [
                                {
                                    "match_phrase": {
                                        content: { "query": query, "boost": phrase_boost }
                                    }
                                },
                                {
                                    "match": {
                                        content: {
                                            "query": query,
                                            "operator": "or",
                                            "minimum_should_match": minimum_match
                                        }
                                    }
                                },
                                { "match": { self.title_field.as_str(): { "query": query } } }
                            ],
                            "minimum_should_match": 1
                        }
                    },
                    "script": {
                        "source": script,
                        "params": {
                            "query_vector": embedding,
                            "bm25_weight": processed.keyword_weight,
                            "semantic_weight": processed.semantic_weight
                        }
                    }
                }
            },
            "_source": [content, "sourceFile", "position"],
            "highlight": self.highlight(150)
        })
    }

    fn highlight(&self, fragment_size: usize) -> Value {
        json!({
            "fields": {
                self.content_field.as_str(): {
                    "fragment_size": fragment_size,
                    "number_of_fragments": 3
                }
            },
            "pre_tags": ["<em>"],
            "post_tags": ["</em>"]
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::QueryProcessor;

    fn processed(query: &str) -> QueryProcessingResult {
        QueryProcessor::default().process_query(query)
    }

    #[test]
    fn test_bm25_paging_and_highlight() {
        let body = SearchQueryBuilder::new().build_bm25_query("faktura VAT", 10, 20);

        assert_eq!(body["size"], 10);
        assert_eq!(body["from"], 20);
        assert_eq!(body["highlight"]["pre_tags"][0], "<em>");
        assert_eq!(body["highlight"]["post_tags"][0], "</em>");
        assert!(body["highlight"]["fields"]["content"].is_object());
    }

    #[test]
    fn test_bm25_should_clause() {
        let body = SearchQueryBuilder::new().build_bm25_query("raport", 5, 0);
        let should = body["query"]["bool"]["should"].as_array().unwrap();

        assert_eq!(should.len(), 4);
        assert_eq!(should[0]["match_phrase"]["content"]["query"], "raport");
        assert_eq!(should[0]["match_phrase"]["content"]["boost"], 3.0);
        assert_eq!(should[2]["match"]["content"]["fuzziness"], "AUTO");
        assert!(should[3]["match"]["title"].is_object());
        assert_eq!(body["query"]["bool"]["minimum_should_match"], 1);
    }

    #[test]
    fn test_hybrid_size_is_three_times_limit() {
        let builder = SearchQueryBuilder::new();
        let qp = processed("dokument faktura VAT");

        for (limit, offset) in [(1, 0), (5, 10), (10, 3), (100, 0)] {
            let body = builder.build_hybrid_query("q", &[0.1, 0.2], &qp, limit, offset);
            assert_eq!(body["size"], limit * 3);
            assert!(body.get("from").is_none());
        }
    }

    #[test]
    fn test_hybrid_size_saturates() {
        let qp = processed("raport");
        let body = SearchQueryBuilder::new().build_hybrid_query("raport", &[], &qp, usize::MAX, 0);
        assert_eq!(body["size"].as_u64(), Some(usize::MAX as u64));
    }

    #[test]
    fn test_hybrid_script_params() {
        let qp = processed("Jak działa system?");
        let body = SearchQueryBuilder::new().build_hybrid_query("działa system", &[0.5, -0.5], &qp, 5, 0);
        let script = &body["query"]["script_score"]["script"];

        assert_eq!(script["params"]["bm25_weight"], 0.6);
        assert_eq!(script["params"]["semantic_weight"], 0.4);
        assert_eq!(script["params"]["query_vector"], json!([0.5, -0.5]));
        assert!(script["source"].as_str().unwrap().contains("cosineSimilarity"));
    }

    #[test]
    fn test_hybrid_phrase_boost_depends_on_type() {
        let builder = SearchQueryBuilder::new();
        let phrase_boost = |body: &Value| {
            body["query"]["script_score"]["query"]["bool"]["should"][0]["match_phrase"]["content"]["boost"]
                .as_f64()
        };

        let keywords = processed("dokument faktura VAT");
        let body = builder.build_hybrid_query("dokument faktura VAT", &[], &keywords, 5, 0);
        assert_eq!(phrase_boost(&body), Some(3.0));

        let question = processed("Jak działa system?");
        let body = builder.build_hybrid_query("działa system", &[], &question, 5, 0);
        assert_eq!(phrase_boost(&body), Some(2.0));
    }

    #[test]
    fn test_hybrid_source_filter() {
        let qp = processed("raport");
        let body = SearchQueryBuilder::new().build_hybrid_query("raport", &[], &qp, 5, 0);
        assert_eq!(body["_source"], json!(["content", "sourceFile", "position"]));
    }
}
