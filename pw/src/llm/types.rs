//! Model request/response types
//!
//! A request always carries exactly two messages, a system message and a user
//! message. Vendor-specific shapes beyond that are out of scope.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// A single chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

/// Everything needed for one model call
#[derive(Debug, Clone)]
pub struct ModelRequest {
    /// System message text
    pub system: String,

    /// User message text
    pub user: String,

    /// Per-call parameter overrides, merged over the entry defaults
    pub parameters: serde_json::Map<String, serde_json::Value>,
}

impl ModelRequest {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            parameters: serde_json::Map::new(),
        }
    }

    /// The two-entry message list sent on the wire
    pub fn messages(&self) -> [ChatMessage; 2] {
        [
            ChatMessage {
                role: Role::System,
                content: self.system.clone(),
            },
            ChatMessage {
                role: Role::User,
                content: self.user.clone(),
            },
        ]
    }

    /// Rough token estimate of the outgoing text
    pub fn token_estimate(&self) -> u64 {
        estimate_tokens(&self.system) + estimate_tokens(&self.user)
    }
}

/// A model's reply
#[derive(Debug, Clone, PartialEq)]
pub struct ModelReply {
    /// Text found at `choices[0].message.content`
    pub content: String,

    /// Token usage, when the endpoint reports it
    pub usage: TokenUsage,
}

impl ModelReply {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            usage: TokenUsage::default(),
        }
    }
}

/// Token usage statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

impl TokenUsage {
    pub fn total(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// Approximate token count (four characters per token)
pub fn estimate_tokens(text: &str) -> u64 {
    let chars = text.chars().count() as u64;
    let estimate = chars.div_ceil(4);
    debug!(chars, estimate, "estimate_tokens: called");
    estimate
}
