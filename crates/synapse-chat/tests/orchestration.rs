//! End-to-end orchestration tests against a scripted model.
//!
//! The scripted executor pops one canned step per call and records the
//! history it was shown, so each test can check both the reply and what the
//! model saw along the way.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use synapse_chat::orchestrator::{FallbackReason, Orchestrator, OrchestratorSettings, Outcome};
use synapse_chat::projects::{InMemoryProjects, ProjectStatusTool, PROJECT_STATUS_TOOL};
use synapse_chat::registry::{ToolRegistry, ToolSpec};
use synapse_chat::types::{
    ConversationTurn, CorrelationId, FinishReason, ModelResponse, Role, ToolInvocationRequest,
};
use synapse_chat::{ModelExecutionError, PromptExecutor};

/// One canned model behaviour
enum Step {
    Reply(ModelResponse),
    /// Build a text reply from the last tool turn's payload
    SummarizeTool,
    Fail,
    Hang,
}

#[derive(Default)]
struct Scripted {
    steps: Mutex<VecDeque<Step>>,
    seen: Mutex<Vec<Vec<ConversationTurn>>>,
}

impl Scripted {
    fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into()),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    fn seen(&self, call: usize) -> Vec<ConversationTurn> {
        self.seen.lock().unwrap()[call].clone()
    }
}

#[async_trait]
impl PromptExecutor for Scripted {
    async fn execute(
        &self,
        _system_prompt: &str,
        history: &[ConversationTurn],
        tools: &[ToolSpec],
    ) -> Result<ModelResponse, ModelExecutionError> {
        assert!(tools.iter().any(|t| t.name == PROJECT_STATUS_TOOL));
        self.seen.lock().unwrap().push(history.to_vec());

        let step = self
            .steps
            .lock()
            .unwrap()
            .pop_front()
            .expect("model called more often than scripted");

        match step {
            Step::Reply(response) => Ok(response),
            Step::SummarizeTool => {
                let payload = history
                    .iter()
                    .rev()
                    .find(|t| t.role == Role::Tool)
                    .and_then(|t| t.payload.clone())
                    .unwrap_or(Value::Null);
                Ok(ModelResponse::text(summarize(&payload)))
            }
            Step::Fail => Err(ModelExecutionError::Status {
                status: 503,
                body: "overloaded".to_string(),
            }),
            Step::Hang => {
                std::future::pending::<()>().await;
                unreachable!()
            }
        }
    }
}

fn summarize(payload: &Value) -> String {
    match payload["status"].as_str() {
        Some("found") => format!(
            "{} is {} at {}%.",
            payload["result"]["name"].as_str().unwrap_or_default(),
            payload["result"]["status"].as_str().unwrap_or_default(),
            payload["result"]["progress"]
        ),
        Some("not_found") => payload["result"]["message"]
            .as_str()
            .unwrap_or_default()
            .to_string(),
        Some(other) => format!("tool said {}", other),
        None => "no tool result".to_string(),
    }
}

fn ask_for(project: &str) -> Step {
    Step::Reply(ModelResponse::tool_call(ToolInvocationRequest::new(
        PROJECT_STATUS_TOOL,
        json!({ "projectName": project }),
        CorrelationId::new(),
    )))
}

fn orchestrator(executor: Arc<Scripted>) -> Orchestrator {
    orchestrator_with(executor, OrchestratorSettings::default())
}

fn orchestrator_with(executor: Arc<Scripted>, settings: OrchestratorSettings) -> Orchestrator {
    let mut registry = ToolRegistry::new();
    registry
        .register(ProjectStatusTool::declaration(Arc::new(
            InMemoryProjects::seed(),
        )))
        .unwrap();
    Orchestrator::new(executor, Arc::new(registry), settings)
}

#[tokio::test]
async fn test_direct_answer_skips_tools() {
    let executor = Scripted::new(vec![Step::Reply(ModelResponse::text("Hi there!"))]);
    let orch = orchestrator(executor.clone());

    let transcript = orch.run("Hello").await.unwrap();

    assert_eq!(transcript.reply, "Hi there!");
    assert_eq!(transcript.outcome, Outcome::Answered);
    assert_eq!(transcript.dispatches, 0);
    assert_eq!(executor.calls(), 1);
    assert_eq!(transcript.history.roles(), vec![Role::User, Role::Model]);
}

#[tokio::test]
async fn test_tool_round_for_known_project() {
    let executor = Scripted::new(vec![ask_for("Project Phoenix"), Step::SummarizeTool]);
    let orch = orchestrator(executor.clone());

    let transcript = orch.run("What's the status of Project Phoenix?").await.unwrap();

    assert_eq!(transcript.reply, "Project Phoenix is On Track at 95%.");
    assert!(transcript.reply.contains("On Track"));
    assert!(transcript.reply.contains("95"));
    assert_eq!(transcript.outcome, Outcome::AnsweredAfterTool);
    assert_eq!(transcript.dispatches, 1);
    assert_eq!(transcript.model_calls, 2);
    assert_eq!(
        transcript.history.roles(),
        vec![Role::User, Role::Model, Role::Tool, Role::Model]
    );

    // The follow-up call saw the request and its result under one id
    let second = executor.seen(1);
    assert_eq!(second.len(), 3);
    let request_id = second[1].tool_request.as_ref().unwrap().correlation_id.clone();
    assert_eq!(second[1].correlation_id.as_ref(), Some(&request_id));
    assert_eq!(second[2].correlation_id.as_ref(), Some(&request_id));
    assert_eq!(second[2].payload.as_ref().unwrap()["status"], "found");
}

#[tokio::test]
async fn test_tool_round_for_unknown_project() {
    let executor = Scripted::new(vec![ask_for("Atlantis"), Step::SummarizeTool]);
    let orch = orchestrator(executor.clone());

    let transcript = orch.run("What's the status of Atlantis?").await.unwrap();

    assert_eq!(transcript.reply, "Project 'Atlantis' could not be found.");
    assert_eq!(transcript.dispatches, 1);
    assert_eq!(executor.seen(1)[2].payload.as_ref().unwrap()["status"], "not_found");
}

#[tokio::test]
async fn test_empty_first_response_falls_back() {
    let executor = Scripted::new(vec![Step::Reply(ModelResponse::empty())]);
    let orch = orchestrator(executor.clone());

    let transcript = orch.run("???").await.unwrap();

    assert_eq!(transcript.reply, orch.settings().fallback);
    assert_eq!(
        transcript.outcome,
        Outcome::Fallback(FallbackReason::EmptyResponse)
    );
    assert_eq!(transcript.dispatches, 0);
    assert_eq!(executor.calls(), 1);
    assert_eq!(transcript.history.roles(), vec![Role::User, Role::Model]);
}

#[tokio::test]
async fn test_blank_text_with_tool_request_falls_back() {
    let response = ModelResponse {
        finish_reason: FinishReason::Stop,
        text: Some("  ".to_string()),
        tool_request: Some(ToolInvocationRequest::new(
            PROJECT_STATUS_TOOL,
            json!({ "projectName": "Vega" }),
            CorrelationId::new(),
        )),
    };
    let executor = Scripted::new(vec![Step::Reply(response)]);
    let orch = orchestrator(executor.clone());

    let transcript = orch.run("How is Vega?").await.unwrap();

    assert_eq!(transcript.reply, orch.settings().fallback);
    assert_eq!(
        transcript.outcome,
        Outcome::Fallback(FallbackReason::EmptyResponse)
    );
    assert_eq!(transcript.dispatches, 0);
    assert_eq!(executor.calls(), 1);
    assert_eq!(transcript.history.roles(), vec![Role::User, Role::Model]);
}

#[tokio::test]
async fn test_tool_call_without_request_falls_back() {
    let missing = ModelResponse {
        finish_reason: FinishReason::ToolCall,
        text: None,
        tool_request: None,
    };
    let executor = Scripted::new(vec![Step::Reply(missing)]);
    let orch = orchestrator(executor.clone());

    let transcript = orch.run("How is Orion?").await.unwrap();

    assert_eq!(transcript.reply, orch.settings().fallback);
    assert_eq!(
        transcript.outcome,
        Outcome::Fallback(FallbackReason::MalformedToolCall)
    );
    assert_eq!(transcript.dispatches, 0);
    assert_eq!(executor.calls(), 1);
}

#[tokio::test]
async fn test_tool_call_without_name_falls_back() {
    let unnamed = ModelResponse::tool_call(ToolInvocationRequest::new(
        "",
        json!({ "projectName": "Orion" }),
        CorrelationId::new(),
    ));
    let executor = Scripted::new(vec![Step::Reply(unnamed)]);
    let orch = orchestrator(executor.clone());

    let transcript = orch.run("How is Orion?").await.unwrap();

    assert_eq!(
        transcript.outcome,
        Outcome::Fallback(FallbackReason::MalformedToolCall)
    );
    assert_eq!(transcript.dispatches, 0);
    assert_eq!(transcript.history.roles(), vec![Role::User, Role::Model]);
}

#[tokio::test]
async fn test_second_tool_call_is_not_honoured() {
    let executor = Scripted::new(vec![ask_for("Orion"), ask_for("Vega")]);
    let orch = orchestrator(executor.clone());

    let transcript = orch.run("How are Orion and Vega?").await.unwrap();

    assert_eq!(transcript.reply, orch.settings().follow_up_fallback);
    assert_eq!(
        transcript.outcome,
        Outcome::Fallback(FallbackReason::RepeatedToolCall)
    );
    assert_eq!(transcript.dispatches, 1);
    assert_eq!(executor.calls(), 2);
    assert_eq!(
        transcript.history.roles(),
        vec![Role::User, Role::Model, Role::Tool, Role::Model]
    );
}

#[tokio::test]
async fn test_blank_follow_up_falls_back() {
    let executor = Scripted::new(vec![
        ask_for("Helios"),
        Step::Reply(ModelResponse::text("   ")),
    ]);
    let orch = orchestrator(executor);

    let transcript = orch.run("How is Helios?").await.unwrap();

    assert_eq!(transcript.reply, orch.settings().follow_up_fallback);
    assert_eq!(
        transcript.outcome,
        Outcome::Fallback(FallbackReason::EmptyFollowUp)
    );
}

#[tokio::test]
async fn test_text_wins_over_tool_call() {
    let mut both = ModelResponse::text("Vega shipped last month.");
    both.tool_request = Some(ToolInvocationRequest::new(
        PROJECT_STATUS_TOOL,
        json!({ "projectName": "Vega" }),
        CorrelationId::new(),
    ));
    let executor = Scripted::new(vec![Step::Reply(both)]);
    let orch = orchestrator(executor.clone());

    let transcript = orch.run("How is Vega?").await.unwrap();

    assert_eq!(transcript.reply, "Vega shipped last month.");
    assert_eq!(transcript.dispatches, 0);
    assert_eq!(executor.calls(), 1);
}

#[tokio::test]
async fn test_bad_arguments_reach_the_model_as_invalid() {
    let executor = Scripted::new(vec![
        Step::Reply(ModelResponse::tool_call(ToolInvocationRequest::new(
            PROJECT_STATUS_TOOL,
            json!({ "project": "Orion" }),
            CorrelationId::new(),
        ))),
        Step::SummarizeTool,
    ]);
    let orch = orchestrator(executor.clone());

    let transcript = orch.run("How is Orion?").await.unwrap();

    assert_eq!(transcript.reply, "tool said invalid");
    assert_eq!(transcript.dispatches, 1);
    let tool_turn = &executor.seen(1)[2];
    assert_eq!(tool_turn.payload.as_ref().unwrap()["result"]["field"], "projectName");
}

#[tokio::test]
async fn test_unregistered_tool_is_not_found() {
    let executor = Scripted::new(vec![
        Step::Reply(ModelResponse::tool_call(ToolInvocationRequest::new(
            "deleteProject",
            json!({}),
            CorrelationId::new(),
        ))),
        Step::SummarizeTool,
    ]);
    let orch = orchestrator(executor);

    let transcript = orch.run("Delete Orion").await.unwrap();

    assert_eq!(transcript.reply, "Tool 'deleteProject' is not available.");
    assert_eq!(transcript.outcome, Outcome::AnsweredAfterTool);
}

#[tokio::test]
async fn test_model_failure_propagates() {
    let executor = Scripted::new(vec![Step::Fail]);
    let orch = orchestrator(executor.clone());

    let err = orch.answer("How is Orion?").await.unwrap_err();

    assert!(matches!(err, ModelExecutionError::Status { status: 503, .. }));
    assert_eq!(executor.calls(), 1);
}

#[tokio::test]
async fn test_follow_up_failure_propagates() {
    let executor = Scripted::new(vec![ask_for("Orion"), Step::Fail]);
    let orch = orchestrator(executor.clone());

    let err = orch.answer("How is Orion?").await.unwrap_err();

    assert!(matches!(err, ModelExecutionError::Status { .. }));
    assert_eq!(executor.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_hung_model_times_out() {
    let executor = Scripted::new(vec![Step::Hang]);
    let settings = OrchestratorSettings {
        model_timeout: Duration::from_secs(5),
        ..OrchestratorSettings::default()
    };
    let orch = orchestrator_with(executor, settings);

    let err = orch.answer("How is Orion?").await.unwrap_err();

    assert!(matches!(err, ModelExecutionError::Timeout(d) if d == Duration::from_secs(5)));
}

#[tokio::test]
async fn test_calls_do_not_share_history() {
    let executor = Scripted::new(vec![
        Step::Reply(ModelResponse::text("first")),
        Step::Reply(ModelResponse::text("second")),
    ]);
    let orch = orchestrator(executor.clone());

    orch.answer("one").await.unwrap();
    orch.answer("two").await.unwrap();

    let second = executor.seen(1);
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].text.as_deref(), Some("two"));
}

#[tokio::test]
async fn test_concurrent_calls() {
    let steps = (0..8)
        .map(|i| Step::Reply(ModelResponse::text(format!("reply {}", i))))
        .collect();
    let executor = Scripted::new(steps);
    let orch = Arc::new(orchestrator(executor.clone()));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let orch = orch.clone();
            tokio::spawn(async move { orch.run(&format!("question {}", i)).await })
        })
        .collect();

    for handle in handles {
        let transcript = handle.await.unwrap().unwrap();
        assert!(transcript.reply.starts_with("reply "));
        assert_eq!(transcript.history.len(), 2);
    }
    assert_eq!(executor.calls(), 8);
}
