//! Language model backend configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// An OpenAI-compatible chat completions backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Base URL of the API, without the `/chat/completions` suffix.
    /// Default: https://api.openai.com/v1
    #[serde(default = "ModelConfig::default_base_url")]
    pub base_url: String,

    /// Model identifier sent with every request.
    /// Default: gpt-4o-mini
    #[serde(default = "ModelConfig::default_model")]
    pub model: String,

    /// Bearer token (optional for local servers)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Sampling temperature
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Maximum tokens per response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Upper bound on a single model call, in seconds.
    /// Default: 30
    #[serde(default = "ModelConfig::default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl ModelConfig {
    fn default_base_url() -> String {
        "https://api.openai.com/v1".to_string()
    }

    fn default_model() -> String {
        "gpt-4o-mini".to_string()
    }

    fn default_request_timeout_secs() -> u64 {
        30
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: Self::default_base_url(),
            model: Self::default_model(),
            api_key: None,
            temperature: None,
            max_tokens: None,
            request_timeout_secs: Self::default_request_timeout_secs(),
        }
    }
}
