//! Per-session conversation transcripts.
//!
//! A conversation is a thin ordered message log keyed by a caller-supplied
//! session id.  It also carries the session's nudge count so the one-nudge-
//! per-session cap survives across requests instead of being a parameter the
//! caller has to thread through correctly.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Conversations expire from the store after this long.
pub fn conversation_ttl() -> Duration {
    Duration::from_secs(24 * 60 * 60)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ConversationMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Conversation {
    pub messages: Vec<ConversationMessage>,
    /// Nudges delivered within this session.  The policy engine refuses to
    /// nudge once this reaches 1.
    pub nudge_count: u32,
}

impl Conversation {
    pub fn push_user(&mut self, content: impl Into<String>) {
        self.messages.push(ConversationMessage::user(content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.messages.push(ConversationMessage::assistant(content));
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
