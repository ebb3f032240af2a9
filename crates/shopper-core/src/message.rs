//! Chat message types and the history window sent to the backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::product::UiProduct;

/// Who a chat message came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Agent,
    /// An agent message carrying a clarifying question with selectable options.
    FollowUp,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Agent => "agent",
            Role::FollowUp => "follow_up",
        }
    }
}

/// A single message in the conversation.
///
/// Ids are monotonically increasing and allocated from a persisted counter,
/// so they never repeat even across restarts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: u64,
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    /// Backend-supplied reasoning trace, display-only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<String>,
    /// Result set attached to an agent message that concluded a search.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub products: Option<Vec<UiProduct>>,
    /// Selectable answers on a follow-up message.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

impl ChatMessage {
    /// Create a user message.
    pub fn user(id: u64, text: impl Into<String>) -> Self {
        Self {
            id,
            role: Role::User,
            text: text.into(),
            timestamp: Utc::now(),
            thinking: None,
            products: None,
            options: Vec::new(),
        }
    }

    /// Create a plain agent message.
    pub fn agent(id: u64, text: impl Into<String>) -> Self {
        Self {
            id,
            role: Role::Agent,
            text: text.into(),
            timestamp: Utc::now(),
            thinking: None,
            products: None,
            options: Vec::new(),
        }
    }

    /// Create a follow-up question message with its options.
    pub fn follow_up(id: u64, text: impl Into<String>, options: Vec<String>) -> Self {
        Self {
            id,
            role: Role::FollowUp,
            text: text.into(),
            timestamp: Utc::now(),
            thinking: None,
            products: None,
            options,
        }
    }
}

/// A message reduced to what the backend needs for conversational context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: String,
    pub content: String,
}

/// Reduce the conversation to the trailing window sent with a search.
///
/// Follow-up messages are dropped and each remaining message is reduced to
/// `{role, content}`. This bounds request size and avoids resending earlier
/// product payloads.
pub fn history_window(messages: &[ChatMessage], limit: usize) -> Vec<HistoryEntry> {
    let mut window: Vec<HistoryEntry> = messages
        .iter()
        .rev()
        .filter(|msg| msg.role != Role::FollowUp)
        .take(limit)
        .map(|msg| HistoryEntry {
            role: msg.role.as_str().to_string(),
            content: msg.text.clone(),
        })
        .collect();
    window.reverse();
    window
}
