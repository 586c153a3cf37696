//! Project status dataset and the `getProjectStatus` tool built on it.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::registry::{HandlerOutcome, ToolDeclaration, ToolHandler};
use crate::schema::{FieldKind, Schema};

pub const PROJECT_STATUS_TOOL: &str = "getProjectStatus";

/// One project's current standing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectEntry {
    pub name: String,
    pub status: String,
    pub summary: String,
    /// Percent complete, 0-100
    pub progress: u8,
}

impl ProjectEntry {
    pub fn new(name: &str, status: &str, summary: &str, progress: u8) -> Self {
        Self {
            name: name.to_string(),
            status: status.to_string(),
            summary: summary.to_string(),
            progress,
        }
    }
}

/// Read-only lookup of projects by name.
///
/// Matching is case-insensitive on the whole name.
pub trait ProjectRepository: Send + Sync {
    fn lookup(&self, name: &str) -> Option<ProjectEntry>;

    fn list(&self) -> Vec<ProjectEntry>;
}

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("Failed to read project dataset {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse project dataset {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Project '{0}' appears more than once")]
    Duplicate(String),

    #[error("Project '{name}' has progress {progress}, expected 0-100")]
    Progress { name: String, progress: u8 },
}

/// Projects held in memory, fixed once built.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProjects {
    by_key: BTreeMap<String, ProjectEntry>,
}

fn key(name: &str) -> String {
    name.trim().to_lowercase()
}

impl InMemoryProjects {
    pub fn new(entries: Vec<ProjectEntry>) -> Result<Self, DatasetError> {
        let mut by_key = BTreeMap::new();
        for entry in entries {
            if entry.progress > 100 {
                return Err(DatasetError::Progress {
                    name: entry.name,
                    progress: entry.progress,
                });
            }
            if by_key.insert(key(&entry.name), entry.clone()).is_some() {
                return Err(DatasetError::Duplicate(entry.name));
            }
        }
        Ok(Self { by_key })
    }

    /// The projects the dashboard ships with.
    pub fn seed() -> Self {
        let entries = vec![
            ProjectEntry::new(
                "Project Phoenix",
                "On Track",
                "The project is currently in the final stages of user acceptance testing. Deployment to staging is complete.",
                95,
            ),
            ProjectEntry::new(
                "QuantumLeap",
                "In Progress",
                "The team is actively working on user feedback from the last session and fixing critical bugs.",
                60,
            ),
            ProjectEntry::new(
                "Project Nova",
                "On Hold",
                "The project is currently on hold pending budget approval for the next phase.",
                30,
            ),
            ProjectEntry::new(
                "Orion",
                "At Risk",
                "Project Orion is facing some delays due to unforeseen technical challenges.",
                45,
            ),
            ProjectEntry::new(
                "Helios",
                "Delayed",
                "Helios is behind schedule. A revised timeline is being prepared.",
                50,
            ),
            ProjectEntry::new(
                "Vega",
                "Completed",
                "Project Vega was successfully completed last month.",
                100,
            ),
        ];

        let by_key = entries.into_iter().map(|e| (key(&e.name), e)).collect();
        Self { by_key }
    }

    /// Load a JSON array of projects.
    pub fn from_file(path: &Path) -> Result<Self, DatasetError> {
        let contents = std::fs::read_to_string(path).map_err(|e| DatasetError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        let entries: Vec<ProjectEntry> =
            serde_json::from_str(&contents).map_err(|e| DatasetError::Parse {
                path: path.to_path_buf(),
                source: e,
            })?;

        Self::new(entries)
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}

impl ProjectRepository for InMemoryProjects {
    fn lookup(&self, name: &str) -> Option<ProjectEntry> {
        self.by_key.get(&key(name)).cloned()
    }

    fn list(&self) -> Vec<ProjectEntry> {
        self.by_key.values().cloned().collect()
    }
}

/// Arguments for `getProjectStatus`, used for the model-facing documentation
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProjectStatusArgs {
    #[schemars(description = "The name of the project to get the status for.")]
    pub project_name: String,
}

pub struct ProjectStatusTool {
    projects: Arc<dyn ProjectRepository>,
}

impl ProjectStatusTool {
    pub fn new(projects: Arc<dyn ProjectRepository>) -> Self {
        Self { projects }
    }

    /// Declaration ready for registration.
    pub fn declaration(projects: Arc<dyn ProjectRepository>) -> ToolDeclaration {
        ToolDeclaration::new(
            PROJECT_STATUS_TOOL,
            "Returns the status and summary for a given project.",
            Arc::new(Self::new(projects)),
        )
        .with_input_schema(Schema::object().required("projectName", FieldKind::String))
        .with_output_schema(
            Schema::object()
                .required("status", FieldKind::String)
                .required("summary", FieldKind::String)
                .required("progress", FieldKind::Number),
        )
        .with_parameters_doc(parameters_doc::<ProjectStatusArgs>())
    }
}

#[async_trait]
impl ToolHandler for ProjectStatusTool {
    async fn call(&self, arguments: &Value) -> HandlerOutcome {
        let name = arguments
            .get("projectName")
            .and_then(Value::as_str)
            .unwrap_or_default();

        match self.projects.lookup(name) {
            Some(project) => HandlerOutcome::Found(serde_json::json!({
                "name": project.name,
                "status": project.status,
                "summary": project.summary,
                "progress": project.progress,
            })),
            None => HandlerOutcome::NotFound(format!("Project '{}' could not be found.", name)),
        }
    }
}

/// Inline draft-07 JSON Schema for `T`, trimmed to what a tool declaration needs.
fn parameters_doc<T: JsonSchema>() -> Value {
    let settings = schemars::generate::SchemaSettings::draft07().with(|s| {
        s.inline_subschemas = true;
    });
    let gen = settings.into_generator();
    let schema = gen.into_root_schema_for::<T>();
    let mut value = serde_json::to_value(&schema).unwrap_or_default();
    if let Some(map) = value.as_object_mut() {
        map.remove("$schema");
        map.remove("title");
    }
    value
}
