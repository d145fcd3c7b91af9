//! Typed events delivered on a task's push channel
//!
//! Each SSE frame carries a named event label and a JSON body. The decoder
//! maps the closed set of known labels to [`TaskEvent`]; anything else
//! (unknown labels, bodies that are not valid JSON, bodies missing
//! required fields) yields `None` so the feed can log and keep going.

use serde::Deserialize;

use crate::types::{Artifact, Message, TaskState};

/// Events emitted while a task streams
#[derive(Debug, Clone, PartialEq)]
pub enum TaskEvent {
    /// Agent has started (or is about to start) processing
    Working,
    /// One or more parts to append onto the current agent turn
    Message { message: Message },
    /// Agent invoked a tool
    ToolCall {
        tool_name: String,
        input: serde_json::Value,
    },
    /// Result of the most recent unresolved tool call
    ToolCallResult { result: serde_json::Value },
    /// Agent produced a named artifact
    Artifact { artifact: Artifact },
    /// Terminal success
    Completed,
    /// Terminal failure
    Failed,
    /// Task was canceled before finishing
    Canceled,
    /// Agent rejected the task
    Rejected,
    /// The channel itself reported an error (e.g. unknown task)
    Error { message: String },
}

#[derive(Deserialize)]
struct MessagePayload {
    message: Message,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToolCallPayload {
    tool_name: String,
    #[serde(default)]
    input: serde_json::Value,
}

#[derive(Deserialize)]
struct ToolResultPayload {
    result: serde_json::Value,
}

#[derive(Deserialize)]
struct ArtifactPayload {
    artifact: Artifact,
}

#[derive(Deserialize)]
struct ErrorPayload {
    message: String,
}

impl TaskEvent {
    /// Decode a named push event into a typed event.
    ///
    /// Returns `None` for unknown labels and for bodies that fail
    /// structural parsing; both are treated identically and never tear
    /// down the feed.
    pub fn decode(label: &str, data: &str) -> Option<TaskEvent> {
        match label {
            // The stream opens by echoing the task's current non-terminal
            // state as `task.<state>`, so `task.submitted` arrives here too.
            "task.working" | "task.submitted" => with_valid_body(data, TaskEvent::Working),
            "task.message" => {
                let payload: MessagePayload = parse(data)?;
                Some(TaskEvent::Message {
                    message: payload.message,
                })
            }
            "tool-call" => {
                let payload: ToolCallPayload = parse(data)?;
                Some(TaskEvent::ToolCall {
                    tool_name: payload.tool_name,
                    input: payload.input,
                })
            }
            "tool-call-result" => {
                let payload: ToolResultPayload = parse(data)?;
                Some(TaskEvent::ToolCallResult {
                    result: payload.result,
                })
            }
            "task.artifact" => {
                let payload: ArtifactPayload = parse(data)?;
                Some(TaskEvent::Artifact {
                    artifact: payload.artifact,
                })
            }
            "task.completed" => with_valid_body(data, TaskEvent::Completed),
            "task.failed" => with_valid_body(data, TaskEvent::Failed),
            "task.canceled" => with_valid_body(data, TaskEvent::Canceled),
            "task.rejected" => with_valid_body(data, TaskEvent::Rejected),
            "error" => {
                let payload: ErrorPayload = parse(data)?;
                Some(TaskEvent::Error {
                    message: payload.message,
                })
            }
            _ => None,
        }
    }

    /// Check if this event ends the stream
    pub fn is_terminal(&self) -> bool {
        self.terminal_state().is_some() || matches!(self, TaskEvent::Error { .. })
    }

    /// Terminal task state signalled by this event, if any
    pub fn terminal_state(&self) -> Option<TaskState> {
        match self {
            TaskEvent::Completed => Some(TaskState::Completed),
            TaskEvent::Failed => Some(TaskState::Failed),
            TaskEvent::Canceled => Some(TaskState::Canceled),
            TaskEvent::Rejected => Some(TaskState::Rejected),
            _ => None,
        }
    }

    /// Short label for diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            TaskEvent::Working => "task.working",
            TaskEvent::Message { .. } => "task.message",
            TaskEvent::ToolCall { .. } => "tool-call",
            TaskEvent::ToolCallResult { .. } => "tool-call-result",
            TaskEvent::Artifact { .. } => "task.artifact",
            TaskEvent::Completed => "task.completed",
            TaskEvent::Failed => "task.failed",
            TaskEvent::Canceled => "task.canceled",
            TaskEvent::Rejected => "task.rejected",
            TaskEvent::Error { .. } => "error",
        }
    }
}

fn parse<'a, T: Deserialize<'a>>(data: &'a str) -> Option<T> {
    serde_json::from_str(data).ok()
}

/// Events with no required payload fields still must carry a structured body
fn with_valid_body(data: &str, event: TaskEvent) -> Option<TaskEvent> {
    parse::<serde_json::Value>(data).map(|_| event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Part, Role};

    #[test]
    fn test_decode_working() {
        let ev = TaskEvent::decode("task.working", r#"{"type":"task.working","taskId":"t1"}"#);
        assert_eq!(ev, Some(TaskEvent::Working));
    }

    #[test]
    fn test_decode_submitted_maps_to_working() {
        let ev = TaskEvent::decode("task.submitted", r#"{"type":"task.submitted"}"#);
        assert_eq!(ev, Some(TaskEvent::Working));
    }

    #[test]
    fn test_decode_message() {
        let data = r#"{"type":"task.message","taskId":"t1",
            "message":{"role":"agent","parts":[{"type":"text","text":"pong"}]}}"#;
        match TaskEvent::decode("task.message", data) {
            Some(TaskEvent::Message { message }) => {
                assert_eq!(message.role, Role::Agent);
                assert_eq!(message.parts, vec![Part::text("pong")]);
            }
            other => panic!("unexpected decode result: {:?}", other),
        }
    }

    #[test]
    fn test_decode_tool_call() {
        let data = r#"{"type":"tool-call","toolName":"search","input":{"q":"x"}}"#;
        match TaskEvent::decode("tool-call", data) {
            Some(TaskEvent::ToolCall { tool_name, input }) => {
                assert_eq!(tool_name, "search");
                assert_eq!(input, serde_json::json!({"q": "x"}));
            }
            other => panic!("unexpected decode result: {:?}", other),
        }
    }

    #[test]
    fn test_decode_tool_call_missing_name_is_malformed() {
        let data = r#"{"type":"tool-call","input":{"q":"x"}}"#;
        assert_eq!(TaskEvent::decode("tool-call", data), None);
    }

    #[test]
    fn test_decode_tool_call_result() {
        let data = r#"{"type":"tool-call-result","result":{"hits":3}}"#;
        assert_eq!(
            TaskEvent::decode("tool-call-result", data),
            Some(TaskEvent::ToolCallResult {
                result: serde_json::json!({"hits": 3})
            })
        );
    }

    #[test]
    fn test_decode_artifact() {
        let data = r#"{"type":"task.artifact",
            "artifact":{"name":"report","parts":[{"type":"data","data":{"items":[1,2]}}]}}"#;
        match TaskEvent::decode("task.artifact", data) {
            Some(TaskEvent::Artifact { artifact }) => {
                assert_eq!(artifact.name.as_deref(), Some("report"));
                assert_eq!(artifact.parts.len(), 1);
            }
            other => panic!("unexpected decode result: {:?}", other),
        }
    }

    #[test]
    fn test_decode_terminal_events() {
        let body = r#"{"type":"x"}"#;
        assert_eq!(
            TaskEvent::decode("task.completed", body),
            Some(TaskEvent::Completed)
        );
        assert_eq!(TaskEvent::decode("task.failed", body), Some(TaskEvent::Failed));
        assert_eq!(
            TaskEvent::decode("task.canceled", body),
            Some(TaskEvent::Canceled)
        );
        assert_eq!(
            TaskEvent::decode("task.rejected", body),
            Some(TaskEvent::Rejected)
        );
    }

    #[test]
    fn test_decode_stream_error() {
        let data = r#"{"type":"error","code":"TASK_NOT_FOUND","message":"Task t9 not found"}"#;
        assert_eq!(
            TaskEvent::decode("error", data),
            Some(TaskEvent::Error {
                message: "Task t9 not found".into()
            })
        );
    }

    #[test]
    fn test_decode_unknown_label_is_none() {
        assert_eq!(TaskEvent::decode("task.paused", r#"{"type":"task.paused"}"#), None);
        assert_eq!(TaskEvent::decode("", "{}"), None);
    }

    #[test]
    fn test_decode_malformed_body_is_none() {
        assert_eq!(TaskEvent::decode("task.message", "not json"), None);
        assert_eq!(TaskEvent::decode("task.completed", ""), None);
        assert_eq!(TaskEvent::decode("tool-call", "[1,2,3]"), None);
    }

    #[test]
    fn test_terminal_classification() {
        assert!(TaskEvent::Completed.is_terminal());
        assert!(TaskEvent::Failed.is_terminal());
        assert!(TaskEvent::Canceled.is_terminal());
        assert!(TaskEvent::Rejected.is_terminal());
        assert!(TaskEvent::Error { message: "x".into() }.is_terminal());
        assert!(!TaskEvent::Working.is_terminal());
        assert_eq!(TaskEvent::Completed.terminal_state(), Some(TaskState::Completed));
        assert_eq!(TaskEvent::Error { message: "x".into() }.terminal_state(), None);
    }
}
