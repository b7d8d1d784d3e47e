//! Conversation layer
//!
//! Provides:
//! - Query classification and weighting
//! - Prompt assembly with localized instructions
//! - Language model clients
//! - Chat turn orchestration

pub mod chat;
pub mod llm;
pub mod prompt_builder;
pub mod query_processor;

pub use chat::{ChatOrchestrator, ChatRequest, ChatResponse, ChatSource};
pub use llm::{LanguageModel, MockLanguageModel, OpenAiCompatibleModel};
pub use prompt_builder::{MessageContext, MessageRole, PromptBuilder, PromptContext};
pub use query_processor::{QueryProcessingResult, QueryProcessor, QueryProcessorConfig, QueryType};
