//! Session events broadcast to the presentation layer

use confab_proto::TaskState;

/// Events emitted while the directory and feed sessions mutate state.
///
/// These carry no transcript data; observers read the current state back
/// through [`crate::SessionDirectory`] snapshot accessors.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A conversation was fetched and installed wholesale
    ConversationLoaded { id: String },

    /// The selected conversation was deleted; nothing is selected now
    SelectionCleared,

    /// The selected conversation's transcript changed
    TranscriptUpdated,

    /// The thinking indicator toggled
    Thinking { active: bool },

    /// A feed session was opened for a task
    StreamOpened { task_id: String },

    /// The active feed session closed; `state` is the terminal task state
    /// when one was observed, `None` on transport-level failure
    StreamClosed { state: Option<TaskState> },

    /// A collaborator or stream error surfaced
    Error { message: String },
}
