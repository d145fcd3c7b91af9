//! Core wire types for the confab agent protocol
//!
//! Task and message objects use camelCase field names on the wire
//! (`contextId`, `messageId`); conversation objects use snake_case. The
//! serde renames below pin both shapes.

use serde::{Deserialize, Serialize};

/// Role of a message author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Agent,
}

/// One semantic unit of content within a message or artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Part {
    /// Plain text content
    Text { text: String },
    /// Structured data content
    Data { data: serde_json::Value },
    /// Part kind this client does not know; preserved verbatim
    #[serde(untagged)]
    Other(serde_json::Value),
}

impl Part {
    /// Create a text part
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text { text: text.into() }
    }

    /// Extract plain text from this part.
    ///
    /// Prefers an explicit `text` field; any other part is serialized to
    /// its canonical JSON string so no content is silently lost.
    pub fn plain_text(&self) -> String {
        match self {
            Part::Text { text } => text.clone(),
            Part::Data { .. } => serde_json::to_string(self).unwrap_or_default(),
            Part::Other(value) => value
                .get("text")
                .and_then(|t| t.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| value.to_string()),
        }
    }
}

/// A role-tagged message exchanged with the agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    pub role: Role,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Message {
    /// Create a user message with a freshly assigned message id
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            message_id: Some(new_message_id()),
            role: Role::User,
            parts: vec![Part::text(text)],
        }
    }

    /// Concatenated plain text of all parts
    pub fn plain_text(&self) -> String {
        self.parts.iter().map(|p| p.plain_text()).collect()
    }
}

/// Generate a message id in the server's `msg-<hex8>` format
pub fn new_message_id() -> String {
    let hex = uuid::Uuid::new_v4().simple().to_string();
    format!("msg-{}", &hex[..8])
}

/// Lifecycle state of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Submitted,
    Working,
    Completed,
    Failed,
    Canceled,
    Rejected,
}

impl TaskState {
    /// Check if this state is terminal (no further events will follow)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Failed | TaskState::Canceled | TaskState::Rejected
        )
    }
}

/// Current status of a task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStatus {
    pub state: TaskState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
}

/// A named artifact produced by the agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

/// One unit of agent work tied to a user message
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,
    pub status: TaskStatus,
    #[serde(default)]
    pub history: Vec<Message>,
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
}

impl Task {
    /// Check if this task has reached a terminal state
    pub fn is_terminal(&self) -> bool {
        self.status.state.is_terminal()
    }
}

/// Acknowledgement for a streamed message submission
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendAck {
    pub task: Task,
    pub stream_url: String,
}

/// Conversation list entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub context_id: String,
    pub agent_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub is_streaming: bool,
    #[serde(default)]
    pub task_count: u32,
}

/// One message flattened out of a conversation's task histories
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryMessage {
    pub task_id: String,
    pub role: Role,
    #[serde(default)]
    pub parts: Vec<Part>,
}

/// Full conversation state as fetched from storage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationDetail {
    pub context_id: String,
    pub agent_id: String,
    #[serde(default)]
    pub is_streaming: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_url: Option<String>,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub messages: Vec<HistoryMessage>,
}

impl ConversationDetail {
    /// The newest task that has not yet reached a terminal state, if any.
    /// Tasks arrive ordered newest-first.
    pub fn live_task(&self) -> Option<&Task> {
        self.tasks.iter().find(|t| !t.is_terminal())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_part_plain_text_prefers_text_field() {
        let part = Part::text("hello");
        assert_eq!(part.plain_text(), "hello");
    }

    #[test]
    fn test_part_plain_text_serializes_data() {
        let part = Part::Data {
            data: serde_json::json!({"summary": "done"}),
        };
        let text = part.plain_text();
        assert!(text.contains("\"summary\""), "got: {}", text);
        assert!(text.contains("\"type\":\"data\""), "got: {}", text);
    }

    #[test]
    fn test_part_unknown_kind_survives_decoding() {
        let raw = serde_json::json!({"type": "file", "text": "inline preview"});
        let part: Part = serde_json::from_value(raw).unwrap();
        assert!(matches!(part, Part::Other(_)));
        assert_eq!(part.plain_text(), "inline preview");
    }

    #[test]
    fn test_part_unknown_kind_without_text_serializes() {
        let raw = serde_json::json!({"type": "file", "uri": "file:///x"});
        let part: Part = serde_json::from_value(raw).unwrap();
        assert!(part.plain_text().contains("file:///x"));
    }

    #[test]
    fn test_message_user_assigns_prefixed_id() {
        let msg = Message::user("ping");
        let id = msg.message_id.unwrap();
        assert!(id.starts_with("msg-"), "got: {}", id);
        assert_eq!(id.len(), "msg-".len() + 8);
    }

    #[test]
    fn test_message_wire_shape_is_camel_case() {
        let msg = Message {
            message_id: Some("msg-abc12345".into()),
            role: Role::User,
            parts: vec![Part::text("hi")],
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["messageId"], "msg-abc12345");
        assert_eq!(json["role"], "user");
        assert_eq!(json["parts"][0]["type"], "text");
    }

    #[test]
    fn test_task_wire_shape_round_trip() {
        let raw = serde_json::json!({
            "id": "task-1",
            "contextId": "ctx-1",
            "status": {"state": "working"},
            "history": [
                {"messageId": "msg-1", "role": "user", "parts": [{"type": "text", "text": "ping"}]}
            ],
        });
        let task: Task = serde_json::from_value(raw).unwrap();
        assert_eq!(task.context_id.as_deref(), Some("ctx-1"));
        assert_eq!(task.status.state, TaskState::Working);
        assert!(!task.is_terminal());
        assert_eq!(task.history[0].plain_text(), "ping");
    }

    #[test]
    fn test_terminal_states() {
        assert!(TaskState::Completed.is_terminal());
        assert!(TaskState::Failed.is_terminal());
        assert!(TaskState::Canceled.is_terminal());
        assert!(TaskState::Rejected.is_terminal());
        assert!(!TaskState::Submitted.is_terminal());
        assert!(!TaskState::Working.is_terminal());
    }

    #[test]
    fn test_detail_live_task_picks_newest_non_terminal() {
        let detail: ConversationDetail = serde_json::from_value(serde_json::json!({
            "context_id": "ctx-1",
            "agent_id": "default",
            "is_streaming": true,
            "tasks": [
                {"id": "task-2", "status": {"state": "working"}},
                {"id": "task-1", "status": {"state": "completed"}},
            ],
        }))
        .unwrap();
        assert_eq!(detail.live_task().map(|t| t.id.as_str()), Some("task-2"));
    }
}
