//! RagForge Common Library
//!
//! Retrieval and prompt assembly for the document chat service:
//! - Query classification and hybrid search query construction
//! - Mapping of engine hits and multi-chunk document reconstruction
//! - Localized prompt assembly and chat orchestration
//! - Error types, configuration and metrics

pub mod config;
pub mod context;
pub mod embeddings;
pub mod errors;
pub mod localization;
pub mod metrics;
pub mod search;

// Re-export commonly used types
pub use config::AppConfig;
pub use context::{ChatOrchestrator, QueryProcessor};
pub use embeddings::Embedder;
pub use errors::{AppError, Result};
pub use search::{SearchService, SearchResult};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
