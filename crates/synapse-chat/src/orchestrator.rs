//! Turns one user question into one reply.
//!
//! The orchestrator runs a small bounded state machine around at most two
//! model calls and at most one tool dispatch:
//!
//! ```text
//! Start -> AwaitingModel -> TextReady ----------------------------> Done
//!                        \-> ToolRequested -> Dispatching
//!                                -> AwaitingFollowUp -> TextReady -> Done
//! any AwaitingModel state -> Failed   (ModelExecutionError)
//! anything unusable       -> Fallback -> Done
//! ```
//!
//! A response carrying usable text always ends the call, even if it also
//! asks for a tool. A second tool request is never honoured.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use synapseconf::SynapseConfig;

use crate::executor::{ModelExecutionError, PromptExecutor};
use crate::history::History;
use crate::registry::{ToolRegistry, ToolSpec};
use crate::types::{FinishReason, ModelResponse, ToolInvocationRequest};

/// Fixed wording and limits for every orchestration call
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub system_prompt: String,
    /// Reply when the first response is unusable
    pub fallback: String,
    /// Reply when the response after a tool round is unusable
    pub follow_up_fallback: String,
    /// Upper bound on each model call
    pub model_timeout: Duration,
}

impl OrchestratorSettings {
    pub fn from_config(config: &SynapseConfig) -> Self {
        Self {
            system_prompt: config.chat.system_prompt.clone(),
            fallback: config.chat.fallback_message.clone(),
            follow_up_fallback: config.chat.follow_up_fallback_message.clone(),
            model_timeout: config.model.request_timeout(),
        }
    }
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self::from_config(&SynapseConfig::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    /// First response had neither text nor a tool call
    EmptyResponse,
    /// A tool call arrived without a tool name
    MalformedToolCall,
    /// The model asked for a second tool after the first round
    RepeatedToolCall,
    /// Nothing usable came back after the tool round
    EmptyFollowUp,
    /// Turn ordering was violated; should not happen
    BrokenHistory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "reason", rename_all = "snake_case")]
pub enum Outcome {
    Answered,
    AnsweredAfterTool,
    Fallback(FallbackReason),
}

/// Everything one call produced
#[derive(Debug, Clone)]
pub struct Transcript {
    pub reply: String,
    pub outcome: Outcome,
    pub history: History,
    pub dispatches: usize,
    pub model_calls: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Round {
    First,
    FollowUp,
}

#[derive(Debug)]
enum Phase {
    Start,
    AwaitingModel(Round),
    TextReady { text: String, round: Round },
    ToolRequested { text: Option<String>, request: ToolInvocationRequest },
    Dispatching(ToolInvocationRequest),
    Fallback(FallbackReason),
}

impl Phase {
    fn name(&self) -> &'static str {
        match self {
            Phase::Start => "start",
            Phase::AwaitingModel(Round::First) => "awaiting_model",
            Phase::AwaitingModel(Round::FollowUp) => "awaiting_follow_up",
            Phase::TextReady { .. } => "text_ready",
            Phase::ToolRequested { .. } => "tool_requested",
            Phase::Dispatching(_) => "dispatching",
            Phase::Fallback(_) => "fallback",
        }
    }
}

/// Per-call state; dropped when the call returns
struct Run {
    history: History,
    dispatches: usize,
    model_calls: usize,
}

pub struct Orchestrator {
    executor: Arc<dyn PromptExecutor>,
    registry: Arc<ToolRegistry>,
    tools: Vec<ToolSpec>,
    settings: OrchestratorSettings,
}

impl Orchestrator {
    pub fn new(
        executor: Arc<dyn PromptExecutor>,
        registry: Arc<ToolRegistry>,
        settings: OrchestratorSettings,
    ) -> Self {
        let tools = registry.specs();
        Self {
            executor,
            registry,
            tools,
            settings,
        }
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Answer a question with a single reply string.
    pub async fn answer(&self, query: &str) -> Result<String, ModelExecutionError> {
        self.run(query).await.map(|t| t.reply)
    }

    /// Answer a question and keep the full record of how it went.
    #[tracing::instrument(
        skip(self, query),
        fields(
            query.len = query.len(),
            chat.outcome = tracing::field::Empty,
            chat.dispatches = tracing::field::Empty,
        )
    )]
    pub async fn run(&self, query: &str) -> Result<Transcript, ModelExecutionError> {
        let mut run = Run {
            history: History::new(),
            dispatches: 0,
            model_calls: 0,
        };
        let mut phase = Phase::Start;

        loop {
            tracing::debug!(phase = phase.name(), "Orchestrator step");

            phase = match phase {
                Phase::Start => match run.history.push_user(query) {
                    Ok(()) => Phase::AwaitingModel(Round::First),
                    Err(e) => {
                        tracing::warn!(error = %e, "Could not record query");
                        Phase::Fallback(FallbackReason::BrokenHistory)
                    }
                },

                Phase::AwaitingModel(round) => {
                    let response = self.call_model(&mut run).await?;
                    classify(response, round)
                }

                Phase::TextReady { text, round } => {
                    if let Err(e) = run.history.push_model_text(&text) {
                        tracing::warn!(error = %e, "Could not record reply");
                    }
                    let outcome = match round {
                        Round::First => Outcome::Answered,
                        Round::FollowUp => Outcome::AnsweredAfterTool,
                    };
                    return Ok(finish(run, text, outcome));
                }

                Phase::ToolRequested { text, request } => {
                    match run.history.push_tool_request(text, request.clone()) {
                        Ok(()) => Phase::Dispatching(request),
                        Err(e) => {
                            tracing::warn!(error = %e, "Could not record tool request");
                            Phase::Fallback(FallbackReason::BrokenHistory)
                        }
                    }
                }

                Phase::Dispatching(request) => {
                    tracing::info!(tool.name = %request.tool_name, "Dispatching tool call");
                    let result = self.registry.dispatch_request(&request).await;
                    run.dispatches += 1;

                    match run.history.push_tool_result(&result) {
                        Ok(()) => Phase::AwaitingModel(Round::FollowUp),
                        Err(e) => {
                            tracing::warn!(error = %e, "Could not record tool result");
                            Phase::Fallback(FallbackReason::BrokenHistory)
                        }
                    }
                }

                Phase::Fallback(reason) => {
                    tracing::warn!(reason = ?reason, "Replying with fallback");
                    let text = match reason {
                        FallbackReason::EmptyResponse | FallbackReason::MalformedToolCall => {
                            self.settings.fallback.clone()
                        }
                        FallbackReason::RepeatedToolCall
                        | FallbackReason::EmptyFollowUp
                        | FallbackReason::BrokenHistory => self.settings.follow_up_fallback.clone(),
                    };
                    // Refused only while a request is pending, and then history is already broken
                    let _ = run.history.push_model_text(&text);
                    return Ok(finish(run, text, Outcome::Fallback(reason)));
                }
            };
        }
    }

    async fn call_model(&self, run: &mut Run) -> Result<ModelResponse, ModelExecutionError> {
        run.model_calls += 1;
        let call = self.executor.execute(
            &self.settings.system_prompt,
            run.history.turns(),
            &self.tools,
        );

        let result = match tokio::time::timeout(self.settings.model_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(ModelExecutionError::Timeout(self.settings.model_timeout)),
        };

        if let Err(e) = &result {
            tracing::warn!(error = %e, model_calls = run.model_calls, "Model call failed");
        }
        result
    }
}

/// Decide where a model response leads.
fn classify(response: ModelResponse, round: Round) -> Phase {
    if response.finish_reason == FinishReason::Stop {
        if let Some(text) = response.usable_text() {
            if response.tool_request.is_some() {
                tracing::debug!("Response has text and a tool call; text wins");
            }
            return Phase::TextReady {
                text: text.to_string(),
                round,
            };
        }
    }

    match (response.finish_reason, round) {
        (FinishReason::ToolCall, Round::First) => match response.tool_request {
            Some(request) if !request.tool_name.trim().is_empty() => Phase::ToolRequested {
                text: response.text,
                request,
            },
            _ => Phase::Fallback(FallbackReason::MalformedToolCall),
        },
        (FinishReason::ToolCall, Round::FollowUp) => Phase::Fallback(FallbackReason::RepeatedToolCall),
        (_, Round::First) => Phase::Fallback(FallbackReason::EmptyResponse),
        (_, Round::FollowUp) => Phase::Fallback(FallbackReason::EmptyFollowUp),
    }
}

fn finish(run: Run, reply: String, outcome: Outcome) -> Transcript {
    let span = tracing::Span::current();
    span.record("chat.outcome", tracing::field::debug(&outcome));
    span.record("chat.dispatches", run.dispatches as u64);

    Transcript {
        reply,
        outcome,
        history: run.history,
        dispatches: run.dispatches,
        model_calls: run.model_calls,
    }
}
