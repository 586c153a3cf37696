//! Configuration loading for Synapse.
//!
//! Synapse answers free-text questions about project status. Everything the
//! process needs to know before it starts answering lives here: which model
//! backend to talk to, the wording of the system instruction and canned
//! replies, where the project dataset comes from, and where to listen.
//!
//! # Usage
//!
//! ```rust,no_run
//! use synapseconf::SynapseConfig;
//!
//! let config = SynapseConfig::load().expect("Failed to load config");
//! println!("model: {} at {}", config.model.model, config.model.base_url);
//! println!("listening on {}", config.bind.addr());
//! ```
//!
//! # Config File Locations
//!
//! Files are loaded in order (later wins):
//! 1. `/etc/synapse/config.toml` (system)
//! 2. `~/.config/synapse/config.toml` (user)
//! 3. `./synapse.toml` (local override, replaced by an explicit path)
//! 4. Environment variables (`SYNAPSE_*`)
//!
//! # Example Config
//!
//! ```toml
//! [model]
//! base_url = "http://127.0.0.1:11434/v1"
//! model = "llama3.1"
//! request_timeout_secs = 20
//!
//! [chat]
//! fallback_message = "Ask me about a project."
//!
//! [dataset]
//! path = "~/synapse/projects.json"
//!
//! [bind]
//! http_port = 8090
//!
//! [telemetry]
//! log_level = "debug"
//! ```

pub mod chat;
pub mod infra;
pub mod loader;
pub mod model;

pub use chat::ChatConfig;
pub use infra::{BindConfig, DatasetConfig, TelemetryConfig};
pub use loader::{discover_config_files_with_override, ConfigSources};
pub use model::ModelConfig;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Complete Synapse configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SynapseConfig {
    #[serde(default)]
    pub model: ModelConfig,

    #[serde(default)]
    pub chat: ChatConfig,

    #[serde(default)]
    pub dataset: DatasetConfig,

    #[serde(default)]
    pub bind: BindConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl SynapseConfig {
    /// Load configuration from all sources.
    pub fn load() -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(None)?;
        Ok(config)
    }

    /// Load configuration with an explicit file taking the place of `./synapse.toml`.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(config_path)?;
        Ok(config)
    }

    /// Load configuration and report which files and variables contributed.
    pub fn load_with_sources_from(
        config_path: Option<&Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        Self::load_with_vars(config_path, std::env::vars())
    }

    /// Same as [`load_with_sources_from`](Self::load_with_sources_from), with
    /// the environment given explicitly.
    pub fn load_with_vars<I>(
        config_path: Option<&Path>,
        vars: I,
    ) -> Result<(Self, ConfigSources), ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut sources = ConfigSources::default();
        let mut merged = toml::Table::new();

        for path in loader::discover_config_files_with_override(config_path) {
            let layer = loader::load_table(&path)?;
            loader::merge_tables(&mut merged, layer);
            sources.files.push(path);
        }

        let mut config = loader::from_table(merged)?;
        loader::apply_env_overrides_from(&mut config, &mut sources, vars);
        config.expand_paths();
        config.validate()?;

        Ok((config, sources))
    }

    /// Reject values that deserialize fine but cannot work.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "model.request_timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    fn expand_paths(&mut self) {
        if let Some(path) = self.dataset.path.take() {
            self.dataset.path = Some(loader::expand_path(&path.to_string_lossy()));
        }
    }

    /// Render the effective configuration as TOML. The API key is redacted.
    pub fn to_toml(&self) -> String {
        let quote = |s: &str| toml::Value::String(s.to_string()).to_string();
        let mut output = String::new();

        output.push_str("# Synapse Configuration\n\n");

        output.push_str("[model]\n");
        output.push_str(&format!("base_url = {}\n", quote(&self.model.base_url)));
        output.push_str(&format!("model = {}\n", quote(&self.model.model)));
        if self.model.api_key.is_some() {
            output.push_str("# api_key is set (redacted)\n");
        }
        if let Some(t) = self.model.temperature {
            output.push_str(&format!("temperature = {}\n", t));
        }
        if let Some(m) = self.model.max_tokens {
            output.push_str(&format!("max_tokens = {}\n", m));
        }
        output.push_str(&format!(
            "request_timeout_secs = {}\n",
            self.model.request_timeout_secs
        ));

        output.push_str("\n[chat]\n");
        output.push_str(&format!("system_prompt = {}\n", quote(&self.chat.system_prompt)));
        output.push_str(&format!(
            "fallback_message = {}\n",
            quote(&self.chat.fallback_message)
        ));
        output.push_str(&format!(
            "follow_up_fallback_message = {}\n",
            quote(&self.chat.follow_up_fallback_message)
        ));
        output.push_str(&format!("greeting = {}\n", quote(&self.chat.greeting)));
        output.push_str(&format!("error_reply = {}\n", quote(&self.chat.error_reply)));

        output.push_str("\n[dataset]\n");
        match &self.dataset.path {
            Some(path) => output.push_str(&format!("path = {}\n", quote(&path.to_string_lossy()))),
            None => output.push_str("# path unset: built-in projects\n"),
        }

        output.push_str("\n[bind]\n");
        output.push_str(&format!("host = {}\n", quote(&self.bind.host)));
        output.push_str(&format!("http_port = {}\n", self.bind.http_port));

        output.push_str("\n[telemetry]\n");
        output.push_str(&format!("log_level = {}\n", quote(&self.telemetry.log_level)));

        output
    }
}
