//! Conversation state: transcript, streaming flags, and the outstanding task.

use confab_proto::{ConversationDetail, Role};

use crate::transcript::{Transcript, Turn};

const UNTITLED: &str = "New Conversation";
const TITLE_MAX: usize = 50;

/// In-memory state for the selected conversation
#[derive(Debug, Clone)]
pub struct ConversationState {
    /// Conversation identifier (the protocol's context id)
    pub id: String,
    pub title: String,
    pub transcript: Transcript,
    /// Whether a task is currently streaming into the transcript
    pub is_streaming: bool,
    /// Agent accepted the task but has produced no content yet
    pub is_thinking: bool,
    /// The outstanding task, if any
    pub active_task: Option<String>,
    /// Last surfaced error
    pub error: Option<String>,
}

impl ConversationState {
    /// Create empty state for a conversation id
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: UNTITLED.to_string(),
            transcript: Transcript::new(),
            is_streaming: false,
            is_thinking: false,
            active_task: None,
            error: None,
        }
    }

    /// Build state wholesale from fetched authoritative detail
    pub fn from_detail(detail: &ConversationDetail) -> Self {
        let mut transcript = Transcript::new();
        for message in &detail.messages {
            transcript.push_turn(Turn {
                role: message.role,
                parts: message.parts.clone(),
                ..Turn::new(message.role)
            });
        }

        let active_task = detail.live_task().map(|t| t.id.clone());

        Self {
            id: detail.context_id.clone(),
            title: derive_title(detail),
            transcript,
            is_streaming: detail.is_streaming,
            is_thinking: false,
            active_task,
            error: None,
        }
    }
}

/// First user message's leading text, truncated, or a placeholder
fn derive_title(detail: &ConversationDetail) -> String {
    let text = detail
        .messages
        .iter()
        .find(|m| m.role == Role::User)
        .and_then(|m| m.parts.first())
        .map(|p| p.plain_text())
        .unwrap_or_default();

    if text.is_empty() {
        UNTITLED.to_string()
    } else {
        text.chars().take(TITLE_MAX).collect()
    }
}
