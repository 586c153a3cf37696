//! Append-only conversation history for a single orchestration call.

use std::collections::HashSet;

use thiserror::Error;

use crate::types::{ConversationTurn, CorrelationId, Role, ToolInvocationRequest, ToolResult};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HistoryError {
    #[error("tool request {0} is still waiting for its result")]
    RequestPending(CorrelationId),

    #[error("correlation id {0} was already used in this conversation")]
    DuplicateCorrelation(CorrelationId),

    #[error("tool result {0} does not answer a pending request")]
    UnexpectedResult(CorrelationId),
}

/// Ordered turns. Turns can be appended but never changed or removed.
///
/// A tool request opens a slot that must be closed by the result carrying
/// the same correlation id before anything else is appended.
#[derive(Debug, Clone, Default)]
pub struct History {
    turns: Vec<ConversationTurn>,
    pending: Option<CorrelationId>,
    seen: HashSet<CorrelationId>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn roles(&self) -> Vec<Role> {
        self.turns.iter().map(|t| t.role).collect()
    }

    /// Correlation id of a request still waiting for its result
    pub fn pending(&self) -> Option<&CorrelationId> {
        self.pending.as_ref()
    }

    pub fn push_user(&mut self, text: &str) -> Result<(), HistoryError> {
        self.ensure_idle()?;
        self.turns.push(ConversationTurn::user(text));
        Ok(())
    }

    pub fn push_model_text(&mut self, text: &str) -> Result<(), HistoryError> {
        self.ensure_idle()?;
        self.turns.push(ConversationTurn::model_text(text));
        Ok(())
    }

    pub fn push_tool_request(
        &mut self,
        text: Option<String>,
        request: ToolInvocationRequest,
    ) -> Result<(), HistoryError> {
        self.ensure_idle()?;
        if self.seen.contains(&request.correlation_id) {
            return Err(HistoryError::DuplicateCorrelation(
                request.correlation_id.clone(),
            ));
        }

        self.seen.insert(request.correlation_id.clone());
        self.pending = Some(request.correlation_id.clone());
        self.turns.push(ConversationTurn::model_tool_request(text, request));
        Ok(())
    }

    pub fn push_tool_result(&mut self, result: &ToolResult) -> Result<(), HistoryError> {
        if self.pending.as_ref() != Some(&result.correlation_id) {
            return Err(HistoryError::UnexpectedResult(result.correlation_id.clone()));
        }

        self.pending = None;
        self.turns.push(ConversationTurn::tool_result(result));
        Ok(())
    }

    fn ensure_idle(&self) -> Result<(), HistoryError> {
        match &self.pending {
            Some(id) => Err(HistoryError::RequestPending(id.clone())),
            None => Ok(()),
        }
    }
}
