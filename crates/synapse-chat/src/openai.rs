//! Prompt executor for OpenAI-compatible `/chat/completions` endpoints.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use synapseconf::ModelConfig;

use crate::executor::{ModelExecutionError, PromptExecutor};
use crate::registry::ToolSpec;
use crate::types::{
    ConversationTurn, CorrelationId, FinishReason, ModelResponse, Role, ToolInvocationRequest,
};

/// Chat message in OpenAI format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role: "system", "user", "assistant", "tool"
    pub role: String,

    /// Message content (may be None for tool_calls-only messages)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Tool calls from assistant
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ChatToolCall>>,

    /// Tool call ID this message is responding to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    fn new(role: &str, content: Option<String>) -> Self {
        Self {
            role: role.to_string(),
            content,
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

/// Tool call in a chat message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatToolCall {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default = "default_call_type")]
    pub call_type: String,
    pub function: ChatFunctionCall,
}

fn default_call_type() -> String {
    "function".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatFunctionCall {
    #[serde(default)]
    pub name: String,
    /// JSON-encoded arguments
    #[serde(default)]
    pub arguments: String,
}

/// OpenAI function definition format
#[derive(Debug, Clone, Serialize)]
pub struct OpenAiFunction {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub parameters: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct OpenAiTool {
    #[serde(rename = "type")]
    pub tool_type: &'static str,
    pub function: OpenAiFunction,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<OpenAiTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    /// Some backends report failures in a 200 body
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: Option<String>,
    #[serde(rename = "type", default)]
    kind: Option<String>,
}

impl ApiError {
    fn describe(&self) -> String {
        match (&self.kind, &self.message) {
            (Some(kind), Some(message)) => format!("{}: {}", kind, message),
            (None, Some(message)) => message.clone(),
            (Some(kind), None) => kind.clone(),
            (None, None) => "unspecified error".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ChatToolCall>>,
}

/// Convert tool specs to the OpenAI `tools` array
pub fn to_openai_tools(tools: &[ToolSpec]) -> Vec<OpenAiTool> {
    tools
        .iter()
        .map(|tool| OpenAiTool {
            tool_type: "function",
            function: OpenAiFunction {
                name: tool.name.clone(),
                description: Some(tool.description.clone()).filter(|d| !d.is_empty()),
                parameters: tool.parameters.clone(),
            },
        })
        .collect()
}

/// Render the system prompt and history as OpenAI chat messages.
pub fn to_chat_messages(system_prompt: &str, history: &[ConversationTurn]) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.push(ChatMessage::new("system", Some(system_prompt.to_string())));

    for turn in history {
        let message = match turn.role {
            Role::User => ChatMessage::new("user", turn.text.clone()),
            Role::Model => {
                let mut message = ChatMessage::new("assistant", turn.text.clone());
                if let Some(request) = &turn.tool_request {
                    message.tool_calls = Some(vec![ChatToolCall {
                        id: request.correlation_id.0.clone(),
                        call_type: default_call_type(),
                        function: ChatFunctionCall {
                            name: request.tool_name.clone(),
                            arguments: request.arguments.to_string(),
                        },
                    }]);
                }
                message
            }
            Role::Tool => {
                let content = turn
                    .payload
                    .as_ref()
                    .map(Value::to_string)
                    .or_else(|| turn.text.clone());
                let mut message = ChatMessage::new("tool", content);
                message.tool_call_id = turn.correlation_id.as_ref().map(|id| id.0.clone());
                message
            }
        };
        messages.push(message);
    }

    messages
}

/// Arguments as sent by the model. Text that is not JSON is kept as a JSON
/// string so that schema validation rejects it downstream.
fn parse_arguments(raw: &str) -> Value {
    if raw.trim().is_empty() {
        return Value::Object(Default::default());
    }
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Fold one completion choice into a [`ModelResponse`].
///
/// Usable text always yields `Stop`, keeping any tool call alongside it.
fn normalize(choice: Option<Choice>) -> ModelResponse {
    let Some(choice) = choice else {
        return ModelResponse::empty();
    };

    if let Some(reason) = choice.finish_reason.as_deref() {
        tracing::debug!(finish_reason = reason, "Model finished");
    }

    let mut calls = choice.message.tool_calls.unwrap_or_default().into_iter();
    let tool_request = calls.next().map(|call| {
        let correlation_id = if call.id.is_empty() {
            CorrelationId::new()
        } else {
            CorrelationId(call.id)
        };
        ToolInvocationRequest::new(
            call.function.name,
            parse_arguments(&call.function.arguments),
            correlation_id,
        )
    });
    let dropped = calls.count();
    if dropped > 0 {
        tracing::warn!(dropped, "Model requested several tools; only the first is used");
    }

    let text = choice.message.content.filter(|t| !t.trim().is_empty());
    let finish_reason = match (&text, &tool_request) {
        (Some(_), _) => FinishReason::Stop,
        (None, Some(_)) => FinishReason::ToolCall,
        (None, None) => FinishReason::Empty,
    };

    ModelResponse {
        finish_reason,
        text,
        tool_request,
    }
}

/// Talks to one OpenAI-compatible backend
pub struct OpenAiExecutor {
    endpoint: String,
    client: reqwest::Client,
    config: ModelConfig,
}

impl OpenAiExecutor {
    pub fn new(config: &ModelConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            client,
            config: config.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn map_send_error(&self, e: reqwest::Error) -> ModelExecutionError {
        if e.is_timeout() {
            ModelExecutionError::Timeout(self.config.request_timeout())
        } else {
            ModelExecutionError::Transport(e.to_string())
        }
    }
}

#[async_trait]
impl PromptExecutor for OpenAiExecutor {
    #[tracing::instrument(
        skip(self, system_prompt, history, tools),
        fields(
            model = %self.config.model,
            history.len = history.len(),
            tools.len = tools.len(),
        )
    )]
    async fn execute(
        &self,
        system_prompt: &str,
        history: &[ConversationTurn],
        tools: &[ToolSpec],
    ) -> Result<ModelResponse, ModelExecutionError> {
        let body = ChatCompletionRequest {
            model: &self.config.model,
            messages: to_chat_messages(system_prompt, history),
            tools: to_openai_tools(tools),
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ModelExecutionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ModelExecutionError::Decode(e.to_string()))?;

        if let Some(error) = completion.error {
            return Err(ModelExecutionError::Service(error.describe()));
        }

        Ok(normalize(completion.choices.into_iter().next()))
    }
}
