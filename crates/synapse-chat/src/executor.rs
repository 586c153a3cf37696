//! The request/response boundary to a language model.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::registry::ToolSpec;
use crate::types::{ConversationTurn, ModelResponse};

/// The model could not be reached or did not answer in a usable form.
#[derive(Debug, Error)]
pub enum ModelExecutionError {
    #[error("model request failed: {0}")]
    Transport(String),

    #[error("model service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("could not decode model response: {0}")]
    Decode(String),

    #[error("model call timed out after {0:?}")]
    Timeout(Duration),

    #[error("model service error: {0}")]
    Service(String),
}

/// Sends one conversation to a model and returns its single response.
///
/// Implementations read the history but never change it, and never retry on
/// their own; a failed call is reported as a [`ModelExecutionError`].
#[async_trait]
pub trait PromptExecutor: Send + Sync {
    async fn execute(
        &self,
        system_prompt: &str,
        history: &[ConversationTurn],
        tools: &[ToolSpec],
    ) -> Result<ModelResponse, ModelExecutionError>;
}
