//! Chat handlers

use axum::{extract::State, Json};
use serde::Deserialize;
use validator::Validate;

use super::validation_error;
use crate::AppState;
use ragforge_common::{
    context::{ChatRequest as Turn, ChatResponse, MessageContext},
    errors::Result,
};

/// Chat request
#[derive(Debug, Deserialize, Validate)]
pub struct ChatRequest {
    #[validate(length(min = 1, max = 4000))]
    pub message: String,

    #[serde(default)]
    pub history: Vec<MessageContext>,

    /// Language the user writes in (detected when absent)
    #[serde(default)]
    pub language: Option<String>,

    /// Language of the answer (defaults to the user's)
    #[serde(default)]
    pub response_language: Option<String>,

    #[serde(default = "default_use_document_search")]
    pub use_document_search: bool,
}

fn default_use_document_search() -> bool { true }

impl From<ChatRequest> for Turn {
    fn from(request: ChatRequest) -> Self {
        Turn {
            message: request.message,
            history: request.history,
            language: request.language,
            response_language: request.response_language,
            use_document_search: request.use_document_search,
        }
    }
}

/// Answer one chat turn
pub async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>> {
    request.validate().map_err(validation_error)?;

    let response = state.chat.respond(&request.into()).await?;
    Ok(Json(response))
}
