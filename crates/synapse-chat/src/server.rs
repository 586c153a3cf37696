//! HTTP surface for chat front-ends.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::orchestrator::Orchestrator;
use crate::projects::{ProjectEntry, ProjectRepository};

/// Shared state for web handlers
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub projects: Arc<dyn ProjectRepository>,
    pub greeting: String,
    /// Shown to the user alongside a model failure
    pub error_reply: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub query: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub reply: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatErrorResponse {
    pub error: String,
    pub reply: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/chat", post(chat))
        .route("/api/chat/greeting", get(greeting))
        .route("/api/projects", get(list_projects))
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn greeting(State(state): State<AppState>) -> impl IntoResponse {
    Json(ChatResponse {
        reply: state.greeting.clone(),
    })
}

async fn list_projects(State(state): State<AppState>) -> Json<Vec<ProjectEntry>> {
    Json(state.projects.list())
}

async fn chat(State(state): State<AppState>, Json(request): Json<ChatRequest>) -> Response {
    let query = request.query.trim();
    if query.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "query must not be empty" })),
        )
            .into_response();
    }

    match state.orchestrator.answer(query).await {
        Ok(reply) => Json(ChatResponse { reply }).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Chat request failed");
            (
                StatusCode::BAD_GATEWAY,
                Json(ChatErrorResponse {
                    error: e.to_string(),
                    reply: state.error_reply.clone(),
                }),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{ModelExecutionError, PromptExecutor};
    use crate::orchestrator::OrchestratorSettings;
    use crate::projects::InMemoryProjects;
    use crate::registry::{ToolRegistry, ToolSpec};
    use crate::types::{ConversationTurn, ModelResponse};
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    /// Replies with fixed text, or fails when `fail` is set.
    struct Canned {
        fail: bool,
    }

    #[async_trait]
    impl PromptExecutor for Canned {
        async fn execute(
            &self,
            _system_prompt: &str,
            history: &[ConversationTurn],
            _tools: &[ToolSpec],
        ) -> Result<ModelResponse, ModelExecutionError> {
            if self.fail {
                return Err(ModelExecutionError::Service("backend down".to_string()));
            }
            let query = history[0].text.clone().unwrap_or_default();
            Ok(ModelResponse::text(format!("You asked: {}", query)))
        }
    }

    fn app(fail: bool) -> Router {
        let orchestrator = Orchestrator::new(
            Arc::new(Canned { fail }),
            Arc::new(ToolRegistry::new()),
            OrchestratorSettings::default(),
        );
        router(AppState {
            orchestrator: Arc::new(orchestrator),
            projects: Arc::new(InMemoryProjects::seed()),
            greeting: "hello".to_string(),
            error_reply: "Sorry, I ran into an error. Please try again.".to_string(),
        })
    }

    fn post_chat(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/chat")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_chat_replies() {
        let response = app(false)
            .oneshot(post_chat(r#"{"query": "  How is Vega? "}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: ChatResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(json.reply, "You asked: How is Vega?");
    }

    #[tokio::test]
    async fn test_blank_query_rejected() {
        let response = app(false)
            .oneshot(post_chat(r#"{"query": "   "}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_model_failure_is_bad_gateway() {
        let response = app(true)
            .oneshot(post_chat(r#"{"query": "How is Vega?"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: ChatErrorResponse = serde_json::from_slice(&body).unwrap();
        assert!(json.error.contains("backend down"));
        assert_eq!(json.reply, "Sorry, I ran into an error. Please try again.");
    }

    #[tokio::test]
    async fn test_projects_and_greeting() {
        let app = app(false);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/projects")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let projects: Vec<ProjectEntry> = serde_json::from_slice(&body).unwrap();
        assert_eq!(projects.len(), 6);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/chat/greeting")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: ChatResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(json.reply, "hello");
    }
}
