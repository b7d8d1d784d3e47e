//! Search orchestration
//!
//! Query classification, optional embedding, engine call and result
//! mapping for one request.

use super::engine::{ElasticsearchEngine, SearchEngine};
use super::query_builder::SearchQueryBuilder;
use super::reconstruction::ChunkReconstructor;
use super::result_mapper::ResultMapper;
use super::{SearchRequest, SearchResponse};
use crate::config::AppConfig;
use crate::context::QueryProcessor;
use crate::embeddings::{create_embedder, Embedder};
use crate::errors::Result;
use crate::metrics;
use std::sync::Arc;
use std::time::Instant;

/// Runs searches against the chunk index
pub struct SearchService {
    processor: QueryProcessor,
    builder: SearchQueryBuilder,
    mapper: ResultMapper,
    engine: Arc<dyn SearchEngine>,
    embedder: Option<Arc<dyn Embedder>>,
}

impl SearchService {
    /// Assemble from explicit collaborators; hybrid retrieval is used only
    /// when an embedder is given
    pub fn new(
        config: &AppConfig,
        engine: Arc<dyn SearchEngine>,
        embedder: Option<Arc<dyn Embedder>>,
    ) -> Self {
        let reconstructor = ChunkReconstructor::new(config.retrieval.reconstruction());

        Self {
            processor: QueryProcessor::new(config.query_processing.clone()),
            builder: SearchQueryBuilder::new(),
            mapper: ResultMapper::new(Arc::new(reconstructor)),
            engine,
            embedder,
        }
    }

    /// Build the engine client and embedder described by `config`
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let engine = Arc::new(ElasticsearchEngine::new(&config.search_engine)?);
        let embedder = if config.search_engine.hybrid_enabled {
            Some(create_embedder(&config.embedding)?)
        } else {
            None
        };

        Ok(Self::new(config, engine, embedder))
    }

    /// Search the index
    pub async fn search(&self, request: &SearchRequest) -> Result<SearchResponse> {
        let start = Instant::now();
        let processed = self.processor.process_query(&request.query);

        let query_vector = match &self.embedder {
            Some(embedder) => self.embed(embedder.as_ref(), &processed.processed_query).await,
            None => None,
        };

        let (mode, body) = match query_vector {
            Some(vector) => (
                "hybrid",
                self.builder.build_hybrid_query(
                    &processed.processed_query,
                    &vector,
                    &processed,
                    request.limit,
                    request.offset,
                ),
            ),
            None => (
                "bm25",
                self.builder
                    .build_bm25_query(&request.query, request.limit, request.offset),
            ),
        };

        let raw = self.engine.search(&body).await?;
        let response = self.mapper.map_search_response(&raw, request)?;

        let elapsed = start.elapsed();
        metrics::record_search(elapsed.as_secs_f64(), mode, response.results.len());

        tracing::info!(
            query = %request.query,
            mode,
            query_type = processed.query_type.as_str(),
            total = response.total,
            results = response.results.len(),
            latency_ms = elapsed.as_millis() as u64,
            "Search completed"
        );

        Ok(response)
    }

    /// Whether the search engine answers
    pub async fn engine_healthy(&self) -> bool {
        match self.engine.ping().await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Search engine health check failed");
                false
            }
        }
    }

    /// Embed the query; failures degrade to lexical search
    async fn embed(&self, embedder: &dyn Embedder, text: &str) -> Option<Vec<f32>> {
        let start = Instant::now();
        match embedder.embed(text).await {
            Ok(vector) => {
                metrics::record_embedding(start.elapsed().as_secs_f64(), embedder.model_name(), true);
                Some(vector)
            }
            Err(e) => {
                metrics::record_embedding(start.elapsed().as_secs_f64(), embedder.model_name(), false);
                tracing::warn!(error = %e, "Embedding failed, falling back to BM25");
                None
            }
        }
    }
}
