//! Conversation message types shared by the search engine and its oracles.

use serde::{Deserialize, Serialize};

/// The speaker of a single turn in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user.
    User,
    /// The assistant whose replies are being searched over.
    Assistant,
    /// A system/instruction message.
    System,
    /// A tool invocation or tool result.
    Tool,
}

/// A single turn of conversation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Who said it.
    pub role: Role,
    /// The text content of the turn.
    pub content: String,
}

impl Message {
    /// Construct a new message.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Shorthand for an assistant-authored message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Shorthand for a user-authored message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }
}
