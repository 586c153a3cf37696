//! synapse-chat - project status assistant
//!
//! Subcommands:
//! - `synapse-chat ask <query>` - Answer one question and print the reply
//! - `synapse-chat serve` - Run the HTTP chat endpoint
//! - `synapse-chat projects` - List the loaded project dataset
//! - `synapse-chat config` - Print the effective configuration

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use synapse_chat::orchestrator::{Orchestrator, OrchestratorSettings};
use synapse_chat::projects::{InMemoryProjects, ProjectRepository, ProjectStatusTool};
use synapse_chat::registry::ToolRegistry;
use synapse_chat::server::{self, AppState};
use synapse_chat::{telemetry, OpenAiExecutor};
use synapseconf::SynapseConfig;

#[derive(Parser)]
#[command(name = "synapse-chat")]
#[command(about = "Answers project status questions with a tool-calling model")]
#[command(version)]
struct Cli {
    /// Config file used in place of ./synapse.toml
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer one question
    Ask {
        /// The question, e.g. "How is Project Phoenix doing?"
        query: String,

        /// Print the outcome and conversation as JSON after the reply
        #[arg(long)]
        verbose: bool,
    },

    /// Serve the chat API over HTTP
    Serve {
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// List known projects
    Projects,

    /// Show the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = SynapseConfig::load_from(cli.config.as_deref())
        .context("Failed to load configuration")?;

    telemetry::init(&config.telemetry.log_level).context("Failed to initialize logging")?;

    match cli.command {
        Commands::Ask { query, verbose } => ask(&config, &query, verbose).await,
        Commands::Serve { port } => serve(config, port).await,
        Commands::Projects => {
            let projects = load_projects(&config)?;
            for p in projects.list() {
                println!("{:<16} {:<12} {:>3}%  {}", p.name, p.status, p.progress, p.summary);
            }
            Ok(())
        }
        Commands::Config => {
            print!("{}", config.to_toml());
            Ok(())
        }
    }
}

fn load_projects(config: &SynapseConfig) -> Result<Arc<dyn ProjectRepository>> {
    let projects = match &config.dataset.path {
        Some(path) => InMemoryProjects::from_file(path)
            .with_context(|| format!("Failed to load dataset {}", path.display()))?,
        None => InMemoryProjects::seed(),
    };
    info!(projects = projects.len(), "Project dataset ready");
    Ok(Arc::new(projects))
}

fn build_orchestrator(
    config: &SynapseConfig,
    projects: Arc<dyn ProjectRepository>,
) -> Result<Orchestrator> {
    let mut registry = ToolRegistry::new();
    registry
        .register(ProjectStatusTool::declaration(projects))
        .context("Failed to register project status tool")?;

    let executor = OpenAiExecutor::new(&config.model)?;
    info!(endpoint = executor.endpoint(), model = %config.model.model, "Model backend");

    Ok(Orchestrator::new(
        Arc::new(executor),
        Arc::new(registry),
        OrchestratorSettings::from_config(config),
    ))
}

async fn ask(config: &SynapseConfig, query: &str, verbose: bool) -> Result<()> {
    let projects = load_projects(config)?;
    let orchestrator = build_orchestrator(config, projects)?;

    let transcript = orchestrator.run(query).await.context("Model call failed")?;
    println!("{}", transcript.reply);

    if verbose {
        let report = serde_json::json!({
            "outcome": transcript.outcome,
            "model_calls": transcript.model_calls,
            "dispatches": transcript.dispatches,
            "history": transcript.history.turns(),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(())
}

async fn serve(config: SynapseConfig, port: Option<u16>) -> Result<()> {
    let projects = load_projects(&config)?;
    let orchestrator = build_orchestrator(&config, projects.clone())?;

    let state = AppState {
        orchestrator: Arc::new(orchestrator),
        projects,
        greeting: config.chat.greeting.clone(),
        error_reply: config.chat.error_reply.clone(),
    };
    let app = server::router(state);

    let mut bind = config.bind.clone();
    if let Some(port) = port {
        bind.http_port = port;
    }
    let addr = bind.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("synapse-chat ready");
    info!("   Chat: POST http://{}/api/chat", addr);
    info!("   Health: GET http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received SIGINT, shutting down...");
        }
        _ = async {
            #[cfg(unix)]
            {
                use tokio::signal::unix::{signal, SignalKind};
                match signal(SignalKind::terminate()) {
                    Ok(mut sigterm) => {
                        sigterm.recv().await;
                    }
                    Err(_) => std::future::pending::<()>().await,
                }
            }
            #[cfg(not(unix))]
            {
                std::future::pending::<()>().await;
            }
        } => {
            info!("Received SIGTERM, shutting down...");
        }
    }
}
