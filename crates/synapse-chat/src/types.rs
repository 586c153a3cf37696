use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Links a tool invocation request to its result turn
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationId(pub String);

impl CorrelationId {
    pub fn new() -> Self {
        Self(format!("call_{}", uuid::Uuid::new_v4().simple()))
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CorrelationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Who produced a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
    Tool,
}

/// A model's request to run a tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocationRequest {
    pub tool_name: String,
    pub arguments: Value,
    pub correlation_id: CorrelationId,
}

impl ToolInvocationRequest {
    pub fn new(tool_name: impl Into<String>, arguments: Value, correlation_id: CorrelationId) -> Self {
        Self {
            tool_name: tool_name.into(),
            arguments,
            correlation_id,
        }
    }
}

/// Outcome class of a dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    Found,
    NotFound,
    /// Arguments or handler output failed schema validation
    Invalid,
}

impl ToolStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolStatus::Found => "found",
            ToolStatus::NotFound => "not_found",
            ToolStatus::Invalid => "invalid",
        }
    }
}

/// What a dispatch produced. Always a value, never an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub correlation_id: CorrelationId,
    pub status: ToolStatus,
    pub payload: Value,
}

impl ToolResult {
    pub fn found(correlation_id: CorrelationId, payload: Value) -> Self {
        Self {
            correlation_id,
            status: ToolStatus::Found,
            payload,
        }
    }

    pub fn not_found(correlation_id: CorrelationId, message: impl Into<String>) -> Self {
        Self {
            correlation_id,
            status: ToolStatus::NotFound,
            payload: serde_json::json!({ "message": message.into() }),
        }
    }

    pub fn invalid(correlation_id: CorrelationId, error: impl Into<String>, field: Option<&str>) -> Self {
        Self {
            correlation_id,
            status: ToolStatus::Invalid,
            payload: serde_json::json!({ "error": error.into(), "field": field }),
        }
    }

    /// Body handed back to the model: the status alongside the payload.
    pub fn to_model_content(&self) -> Value {
        serde_json::json!({
            "status": self.status.as_str(),
            "result": self.payload,
        })
    }
}

/// One entry in a conversation. Never mutated once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,

    /// Free text (user query, model reply)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Structured content (tool result body)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,

    /// The tool call a model turn asked for
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_request: Option<ToolInvocationRequest>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<CorrelationId>,

    pub created_at: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: Some(text.into()),
            payload: None,
            tool_request: None,
            correlation_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn model_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            text: Some(text.into()),
            payload: None,
            tool_request: None,
            correlation_id: None,
            created_at: Utc::now(),
        }
    }

    /// The model's requesting turn; any text it sent alongside is kept.
    pub fn model_tool_request(text: Option<String>, request: ToolInvocationRequest) -> Self {
        Self {
            role: Role::Model,
            text,
            payload: None,
            correlation_id: Some(request.correlation_id.clone()),
            tool_request: Some(request),
            created_at: Utc::now(),
        }
    }

    pub fn tool_result(result: &ToolResult) -> Self {
        Self {
            role: Role::Tool,
            text: None,
            payload: Some(result.to_model_content()),
            tool_request: None,
            correlation_id: Some(result.correlation_id.clone()),
            created_at: Utc::now(),
        }
    }
}

/// Why a model response ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    ToolCall,
    Empty,
}

/// Normalized answer from a prompt executor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelResponse {
    pub finish_reason: FinishReason,
    pub text: Option<String>,
    pub tool_request: Option<ToolInvocationRequest>,
}

impl ModelResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            finish_reason: FinishReason::Stop,
            text: Some(text.into()),
            tool_request: None,
        }
    }

    pub fn tool_call(request: ToolInvocationRequest) -> Self {
        Self {
            finish_reason: FinishReason::ToolCall,
            text: None,
            tool_request: Some(request),
        }
    }

    pub fn empty() -> Self {
        Self {
            finish_reason: FinishReason::Empty,
            text: None,
            tool_request: None,
        }
    }

    /// Text that is present and not just whitespace.
    pub fn usable_text(&self) -> Option<&str> {
        self.text.as_deref().filter(|t| !t.trim().is_empty())
    }
}
