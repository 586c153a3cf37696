//! synapse-chat - answers project status questions with a tool-calling model
//!
//! One question goes in, one reply comes out. In between the orchestrator
//! may let the model call a single registered tool (`getProjectStatus`)
//! and feed the result back for a final answer.

pub mod executor;
pub mod history;
pub mod openai;
pub mod orchestrator;
pub mod projects;
pub mod registry;
pub mod schema;
pub mod server;
pub mod telemetry;
pub mod types;

pub use executor::{ModelExecutionError, PromptExecutor};
pub use history::{History, HistoryError};
pub use openai::OpenAiExecutor;
pub use orchestrator::{FallbackReason, Orchestrator, OrchestratorSettings, Outcome, Transcript};
pub use projects::{InMemoryProjects, ProjectEntry, ProjectRepository, ProjectStatusTool, PROJECT_STATUS_TOOL};
pub use registry::{HandlerOutcome, ToolDeclaration, ToolHandler, ToolRegistry, ToolSpec};
pub use schema::{validate, FieldKind, Schema, ValidationError};
pub use types::{
    ConversationTurn, CorrelationId, FinishReason, ModelResponse, Role, ToolInvocationRequest,
    ToolResult, ToolStatus,
};
