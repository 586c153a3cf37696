//! Tool declarations and the dispatcher that runs them by name.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::schema::{validate, Schema};
use crate::types::{CorrelationId, ToolInvocationRequest, ToolResult};

/// What a handler found.
#[derive(Debug, Clone, PartialEq)]
pub enum HandlerOutcome {
    Found(Value),
    /// The thing asked about does not exist; the message is shown to the model
    NotFound(String),
}

/// Executes a tool once its arguments have passed validation.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, arguments: &Value) -> HandlerOutcome;
}

/// A callable capability exposed to the model.
#[derive(Clone)]
pub struct ToolDeclaration {
    pub name: String,
    pub description: String,
    pub input_schema: Schema,
    pub output_schema: Schema,
    /// JSON Schema shown to the model; documentation only
    parameters_doc: Option<Value>,
    handler: Arc<dyn ToolHandler>,
}

impl ToolDeclaration {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        handler: Arc<dyn ToolHandler>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema: Schema::object(),
            output_schema: Schema::object(),
            parameters_doc: None,
            handler,
        }
    }

    pub fn with_input_schema(mut self, schema: Schema) -> Self {
        self.input_schema = schema;
        self
    }

    pub fn with_output_schema(mut self, schema: Schema) -> Self {
        self.output_schema = schema;
        self
    }

    /// Attach a documented JSON Schema (descriptions, examples) for the model.
    pub fn with_parameters_doc(mut self, doc: Value) -> Self {
        self.parameters_doc = Some(doc);
        self
    }

    /// Parameters as advertised to the model.
    pub fn parameters(&self) -> Value {
        self.parameters_doc
            .clone()
            .unwrap_or_else(|| self.input_schema.to_json_schema())
    }

    pub fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: self.parameters(),
        }
    }
}

impl std::fmt::Debug for ToolDeclaration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDeclaration")
            .field("name", &self.name)
            .field("input_schema", &self.input_schema)
            .field("output_schema", &self.output_schema)
            .finish_non_exhaustive()
    }
}

/// The model-facing view of a declaration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("tool '{0}' is already registered")]
    Duplicate(String),

    #[error("tool name must not be empty")]
    EmptyName,
}

/// Tools keyed by exact name. Populated at startup, then shared read-only
/// behind an `Arc`.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, ToolDeclaration>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, declaration: ToolDeclaration) -> Result<(), RegistryError> {
        if declaration.name.trim().is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if self.tools.contains_key(&declaration.name) {
            return Err(RegistryError::Duplicate(declaration.name));
        }

        tracing::debug!(tool.name = %declaration.name, "Registered tool");
        self.tools.insert(declaration.name.clone(), declaration);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Declarations in the form handed to a prompt executor
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools.values().map(ToolDeclaration::spec).collect()
    }

    /// Run a tool by name under a fresh correlation id.
    pub async fn dispatch(&self, name: &str, arguments: &Value) -> ToolResult {
        self.dispatch_with_id(name, arguments, CorrelationId::new())
            .await
    }

    /// Run the tool a model asked for; the result shares the request's id.
    pub async fn dispatch_request(&self, request: &ToolInvocationRequest) -> ToolResult {
        self.dispatch_with_id(
            &request.tool_name,
            &request.arguments,
            request.correlation_id.clone(),
        )
        .await
    }

    #[tracing::instrument(
        skip(self, arguments),
        fields(
            tool.name = %name,
            tool.correlation_id = %correlation_id,
            tool.status = tracing::field::Empty,
        )
    )]
    async fn dispatch_with_id(
        &self,
        name: &str,
        arguments: &Value,
        correlation_id: CorrelationId,
    ) -> ToolResult {
        let result = self.run(name, arguments, correlation_id).await;
        tracing::Span::current().record("tool.status", result.status.as_str());
        result
    }

    async fn run(&self, name: &str, arguments: &Value, correlation_id: CorrelationId) -> ToolResult {
        let Some(declaration) = self.tools.get(name) else {
            tracing::warn!("Model asked for an unregistered tool");
            return ToolResult::not_found(correlation_id, format!("Tool '{}' is not available.", name));
        };

        if let Err(e) = validate(arguments, &declaration.input_schema) {
            tracing::warn!(error = %e, "Tool arguments failed validation");
            return ToolResult::invalid(
                correlation_id,
                format!("Invalid arguments for '{}': {}", name, e),
                e.field(),
            );
        }

        match declaration.handler.call(arguments).await {
            HandlerOutcome::Found(output) => match validate(&output, &declaration.output_schema) {
                Ok(_) => {
                    tracing::info!("Tool call succeeded");
                    ToolResult::found(correlation_id, output)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Tool output failed validation");
                    ToolResult::invalid(
                        correlation_id,
                        format!("'{}' returned a malformed result: {}", name, e),
                        e.field(),
                    )
                }
            },
            HandlerOutcome::NotFound(message) => {
                tracing::info!(%message, "Tool found nothing");
                ToolResult::not_found(correlation_id, message)
            }
        }
    }
}
