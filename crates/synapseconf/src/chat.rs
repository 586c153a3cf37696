//! Conversation wording: the system instruction and the canned replies.

use serde::{Deserialize, Serialize};

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are SynapseAI, the cognitive nervous system for organizations.
Your role is to provide clear, concise, and accurate information about project status.
When a user asks about a project, use the getProjectStatus tool to fetch the latest information.
If the project is not found, inform the user politely.
Keep your answers brief and to the point.";

pub const DEFAULT_FALLBACK_MESSAGE: &str =
    "I'm not sure how to help with that. Can you ask about a project's status?";

pub const DEFAULT_FOLLOW_UP_FALLBACK_MESSAGE: &str = "I'm sorry, I couldn't process that request.";

pub const DEFAULT_GREETING: &str =
    "Hello! I'm AGENT X. How can I help you with your projects today?";

pub const DEFAULT_ERROR_REPLY: &str = "Sorry, I ran into an error. Please try again.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Instruction sent ahead of every conversation
    #[serde(default = "ChatConfig::default_system_prompt")]
    pub system_prompt: String,

    /// Reply when the first model response carries neither text nor a tool call
    #[serde(default = "ChatConfig::default_fallback_message")]
    pub fallback_message: String,

    /// Reply when the model produces nothing usable after a tool round trip
    #[serde(default = "ChatConfig::default_follow_up_fallback_message")]
    pub follow_up_fallback_message: String,

    /// First message shown by chat front-ends
    #[serde(default = "ChatConfig::default_greeting")]
    pub greeting: String,

    /// Reply paired with an error status when the model backend fails
    #[serde(default = "ChatConfig::default_error_reply")]
    pub error_reply: String,
}

impl ChatConfig {
    fn default_system_prompt() -> String {
        DEFAULT_SYSTEM_PROMPT.to_string()
    }

    fn default_fallback_message() -> String {
        DEFAULT_FALLBACK_MESSAGE.to_string()
    }

    fn default_follow_up_fallback_message() -> String {
        DEFAULT_FOLLOW_UP_FALLBACK_MESSAGE.to_string()
    }

    fn default_greeting() -> String {
        DEFAULT_GREETING.to_string()
    }

    fn default_error_reply() -> String {
        DEFAULT_ERROR_REPLY.to_string()
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            system_prompt: Self::default_system_prompt(),
            fallback_message: Self::default_fallback_message(),
            follow_up_fallback_message: Self::default_follow_up_fallback_message(),
            greeting: Self::default_greeting(),
            error_reply: Self::default_error_reply(),
        }
    }
}
