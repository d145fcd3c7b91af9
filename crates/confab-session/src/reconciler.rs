//! Event → transcript state machine
//!
//! The reconciler decides, for each decoded event, how the transcript and
//! the streaming flags must change. It tolerates out-of-order delivery and
//! drops anything that references state that does not exist: a result with
//! no unresolved call, content for a conversation that is not streaming.
//! Events after the terminal marker are discarded; task lifecycle is
//! authoritative and terminal is final.

use confab_proto::{Role, TaskEvent, TaskState};

use crate::conversation::ConversationState;
use crate::transcript::Turn;

/// Outcome of applying one event to conversation state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The transcript changed
    Transcript,
    /// Only presentation flags changed (thinking indicator)
    Indicator,
    /// The event referenced state that does not exist; nothing changed
    Dropped,
    /// The stream reached a terminal state
    Terminal(TaskState),
}

/// Maps incoming task events to transcript mutations
#[derive(Debug, Default)]
pub struct Reconciler {
    /// Index of the agent turn owned by the active stream.
    ///
    /// Kept explicitly so the "current agent turn" lookup is O(1) and
    /// unambiguous; re-validated against the transcript tail before every
    /// use in case a user turn was appended mid-stream.
    streaming_turn: Option<usize>,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget the previous stream's turn before a new task starts
    pub fn begin_stream(&mut self) {
        self.streaming_turn = None;
    }

    /// Apply one event, mutating `state` as the event dictates
    pub fn apply(&mut self, state: &mut ConversationState, event: TaskEvent) -> Outcome {
        if !state.is_streaming {
            tracing::debug!(kind = event.kind(), "event without an active stream, dropping");
            return Outcome::Dropped;
        }

        match event {
            TaskEvent::Working => {
                // Turn creation is deferred to the first content-bearing
                // event; only the loading indicator is observable here.
                state.is_thinking = true;
                Outcome::Indicator
            }

            TaskEvent::Message { message } => {
                let text: String = message.parts.iter().map(|p| p.plain_text()).collect();
                let idx = self.ensure_agent_turn(state);
                if let Some(turn) = state.transcript.turn_mut(idx) {
                    turn.append_text(&text);
                }
                state.is_thinking = false;
                Outcome::Transcript
            }

            TaskEvent::ToolCall { tool_name, input } => {
                let idx = self.ensure_agent_turn(state);
                if let Some(turn) = state.transcript.turn_mut(idx) {
                    turn.push_tool_call(tool_name, input);
                }
                Outcome::Transcript
            }

            TaskEvent::ToolCallResult { result } => {
                let resolved = self
                    .current_agent_turn(state)
                    .and_then(|idx| state.transcript.turn_mut(idx))
                    .is_some_and(|turn| turn.resolve_last_tool_call(result));
                if resolved {
                    Outcome::Transcript
                } else {
                    tracing::warn!("tool result with no unresolved tool call, dropping");
                    Outcome::Dropped
                }
            }

            TaskEvent::Artifact { artifact } => {
                let idx = self.ensure_agent_turn(state);
                if let Some(turn) = state.transcript.turn_mut(idx) {
                    turn.push_artifact(artifact);
                }
                Outcome::Transcript
            }

            TaskEvent::Completed => self.finish(state, TaskState::Completed),
            TaskEvent::Failed => self.finish(state, TaskState::Failed),
            TaskEvent::Canceled => self.finish(state, TaskState::Canceled),
            TaskEvent::Rejected => self.finish(state, TaskState::Rejected),

            TaskEvent::Error { message } => {
                // Channel-level error: the stream is failed from this
                // client's perspective; authoritative state is fetchable.
                state.error = Some(message);
                self.finish(state, TaskState::Failed)
            }
        }
    }

    /// The agent turn owned by the active stream, if it is still the
    /// transcript tail
    fn current_agent_turn(&self, state: &ConversationState) -> Option<usize> {
        let idx = self.streaming_turn?;
        let valid = idx + 1 == state.transcript.len()
            && state.transcript.turn(idx).is_some_and(|t| t.role == Role::Agent);
        valid.then_some(idx)
    }

    /// Index of the mutable agent turn for this stream, creating one when
    /// the transcript tail is a user turn (or the transcript is empty)
    fn ensure_agent_turn(&mut self, state: &mut ConversationState) -> usize {
        if let Some(idx) = self.current_agent_turn(state) {
            return idx;
        }
        let idx = match state.transcript.last_turn() {
            Some(turn) if turn.role == Role::Agent => state.transcript.len() - 1,
            _ => state.transcript.push_turn(Turn::agent()),
        };
        self.streaming_turn = Some(idx);
        idx
    }

    fn finish(&mut self, state: &mut ConversationState, terminal: TaskState) -> Outcome {
        state.is_streaming = false;
        state.is_thinking = false;
        state.active_task = None;
        self.streaming_turn = None;
        Outcome::Terminal(terminal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use confab_proto::{Artifact, Message, Part};

    fn streaming_state() -> ConversationState {
        let mut state = ConversationState::new("ctx-1");
        state.is_streaming = true;
        state.active_task = Some("task-1".into());
        state
    }

    fn message_event(text: &str) -> TaskEvent {
        TaskEvent::Message {
            message: Message {
                message_id: None,
                role: Role::Agent,
                parts: vec![Part::text(text)],
            },
        }
    }

    #[test]
    fn test_working_only_sets_indicator() {
        let mut state = streaming_state();
        let mut reconciler = Reconciler::new();

        assert_eq!(reconciler.apply(&mut state, TaskEvent::Working), Outcome::Indicator);
        assert!(state.is_thinking);
        assert!(state.transcript.is_empty(), "no turn until content arrives");
    }

    #[test]
    fn test_messages_concatenate_in_delivery_order() {
        let mut state = streaming_state();
        let mut reconciler = Reconciler::new();

        reconciler.apply(&mut state, TaskEvent::Working);
        for chunk in ["Hel", "lo, ", "world"] {
            assert_eq!(
                reconciler.apply(&mut state, message_event(chunk)),
                Outcome::Transcript
            );
        }

        assert_eq!(state.transcript.len(), 1);
        let turn = state.transcript.turn(0).unwrap();
        assert_eq!(turn.role, Role::Agent);
        assert_eq!(turn.parts.len(), 1);
        assert_eq!(turn.plain_text(), "Hello, world");
        assert!(!state.is_thinking, "first content clears the indicator");
    }

    #[test]
    fn test_message_without_active_stream_is_dropped() {
        let mut state = ConversationState::new("ctx-1");
        let mut reconciler = Reconciler::new();

        assert_eq!(reconciler.apply(&mut state, message_event("late")), Outcome::Dropped);
        assert!(state.transcript.is_empty(), "no turn is retroactively created");
    }

    #[test]
    fn test_tool_call_then_result_pairs_up() {
        let mut state = streaming_state();
        let mut reconciler = Reconciler::new();

        reconciler.apply(
            &mut state,
            TaskEvent::ToolCall {
                tool_name: "search".into(),
                input: serde_json::json!({"q": "x"}),
            },
        );
        reconciler.apply(
            &mut state,
            TaskEvent::ToolCallResult {
                result: serde_json::json!({"hits": 3}),
            },
        );
        let outcome = reconciler.apply(&mut state, TaskEvent::Completed);
        assert_eq!(outcome, Outcome::Terminal(TaskState::Completed));

        let turn = state.transcript.turn(0).unwrap();
        assert_eq!(turn.tools.len(), 1);
        assert_eq!(turn.tools[0].name, "search");
        assert_eq!(turn.tools[0].input, serde_json::json!({"q": "x"}));
        assert_eq!(turn.tools[0].result, Some(serde_json::json!({"hits": 3})));
    }

    #[test]
    fn test_result_without_call_never_mutates() {
        let mut state = streaming_state();
        let mut reconciler = Reconciler::new();

        let outcome = reconciler.apply(
            &mut state,
            TaskEvent::ToolCallResult {
                result: serde_json::json!({"hits": 0}),
            },
        );
        assert_eq!(outcome, Outcome::Dropped);
        assert!(state.transcript.is_empty());
    }

    #[test]
    fn test_result_matches_most_recent_unresolved_call() {
        let mut state = streaming_state();
        let mut reconciler = Reconciler::new();

        for name in ["first", "second"] {
            reconciler.apply(
                &mut state,
                TaskEvent::ToolCall {
                    tool_name: name.into(),
                    input: serde_json::json!({}),
                },
            );
        }
        reconciler.apply(
            &mut state,
            TaskEvent::ToolCallResult {
                result: serde_json::json!("r"),
            },
        );

        let turn = state.transcript.turn(0).unwrap();
        assert!(!turn.tools[0].is_resolved());
        assert_eq!(turn.tools[1].result, Some(serde_json::json!("r")));
    }

    #[test]
    fn test_artifact_alone_creates_agent_turn() {
        let mut state = streaming_state();
        let mut reconciler = Reconciler::new();

        let outcome = reconciler.apply(
            &mut state,
            TaskEvent::Artifact {
                artifact: Artifact {
                    name: Some("report".into()),
                    parts: vec![Part::Data {
                        data: serde_json::json!({"items": [1, 2, 3]}),
                    }],
                },
            },
        );
        assert_eq!(outcome, Outcome::Transcript);

        let turn = state.transcript.turn(0).unwrap();
        assert_eq!(turn.role, Role::Agent);
        assert!(turn.parts.is_empty(), "artifact-only turn has zero text parts");
        assert_eq!(turn.artifacts.len(), 1);
        assert_eq!(turn.artifacts[0].name.as_deref(), Some("report"));
    }

    #[test]
    fn test_terminal_clears_streaming_state() {
        let mut state = streaming_state();
        let mut reconciler = Reconciler::new();

        reconciler.apply(&mut state, TaskEvent::Working);
        reconciler.apply(&mut state, message_event("done"));
        assert_eq!(
            reconciler.apply(&mut state, TaskEvent::Completed),
            Outcome::Terminal(TaskState::Completed)
        );
        assert!(!state.is_streaming);
        assert!(!state.is_thinking);
        assert_eq!(state.active_task, None);
    }

    #[test]
    fn test_events_after_terminal_are_discarded() {
        let mut state = streaming_state();
        let mut reconciler = Reconciler::new();

        reconciler.apply(&mut state, message_event("pong"));
        reconciler.apply(&mut state, TaskEvent::Completed);

        assert_eq!(reconciler.apply(&mut state, message_event("late")), Outcome::Dropped);
        assert_eq!(reconciler.apply(&mut state, TaskEvent::Completed), Outcome::Dropped);
        assert_eq!(state.transcript.turn(0).unwrap().plain_text(), "pong");
    }

    #[test]
    fn test_user_turn_appended_mid_stream_forces_fresh_agent_turn() {
        let mut state = streaming_state();
        let mut reconciler = Reconciler::new();

        reconciler.apply(&mut state, message_event("partial"));
        // A new user message lands while the stream is still open.
        state
            .transcript
            .push_turn(Turn::user(vec![Part::text("and another thing")]));

        reconciler.apply(&mut state, message_event("fresh"));

        assert_eq!(state.transcript.len(), 3);
        assert_eq!(state.transcript.turn(0).unwrap().plain_text(), "partial");
        assert_eq!(state.transcript.turn(2).unwrap().role, Role::Agent);
        assert_eq!(state.transcript.turn(2).unwrap().plain_text(), "fresh");
    }

    #[test]
    fn test_reuses_trailing_agent_turn_after_index_reset() {
        // A reattached stream (fresh reconciler) continues the trailing
        // agent turn instead of opening a parallel one.
        let mut state = streaming_state();
        state.transcript.push_turn(Turn::user(vec![Part::text("ping")]));
        let mut turn = Turn::agent();
        turn.append_text("par");
        state.transcript.push_turn(turn);

        let mut reconciler = Reconciler::new();
        reconciler.apply(&mut state, message_event("tial"));

        assert_eq!(state.transcript.len(), 2);
        assert_eq!(state.transcript.turn(1).unwrap().plain_text(), "partial");
    }

    #[test]
    fn test_channel_error_fails_the_stream() {
        let mut state = streaming_state();
        let mut reconciler = Reconciler::new();

        let outcome = reconciler.apply(
            &mut state,
            TaskEvent::Error {
                message: "Task task-1 not found".into(),
            },
        );
        assert_eq!(outcome, Outcome::Terminal(TaskState::Failed));
        assert!(!state.is_streaming);
        assert_eq!(state.error.as_deref(), Some("Task task-1 not found"));
    }

    #[test]
    fn test_mixed_part_kinds_extract_text() {
        let mut state = streaming_state();
        let mut reconciler = Reconciler::new();

        reconciler.apply(
            &mut state,
            TaskEvent::Message {
                message: Message {
                    message_id: None,
                    role: Role::Agent,
                    parts: vec![
                        Part::text("answer: "),
                        Part::Data {
                            data: serde_json::json!({"n": 1}),
                        },
                    ],
                },
            },
        );

        let text = state.transcript.turn(0).unwrap().plain_text();
        assert!(text.starts_with("answer: "));
        assert!(text.contains("\"n\":1"), "data part serialized into text: {}", text);
    }
}
