//! In-memory transcript store
//!
//! A transcript is an ordered list of turns; a turn is a role plus ordered
//! content parts, with tool interactions and artifacts kept in their own
//! ordered sub-collections. User turns are immutable once appended; the
//! trailing agent turn is mutable while its task streams.

use confab_proto::{Artifact, Part, Role};

/// One tool invocation and, once resolved, its result.
///
/// Storing the result on the call keeps every result adjacent to its
/// matching invocation regardless of render order.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInteraction {
    pub name: String,
    pub input: serde_json::Value,
    /// `None` while the call is unresolved
    pub result: Option<serde_json::Value>,
}

impl ToolInteraction {
    pub fn is_resolved(&self) -> bool {
        self.result.is_some()
    }
}

/// One role-tagged entry in a conversation transcript
#[derive(Debug, Clone)]
pub struct Turn {
    pub role: Role,
    /// Content parts in append order
    pub parts: Vec<Part>,
    /// Tool interactions in invocation order
    pub tools: Vec<ToolInteraction>,
    /// Artifacts produced during this turn, in arrival order
    pub artifacts: Vec<Artifact>,
    /// Millisecond timestamp of when the turn was appended
    pub timestamp: i64,
}

impl Turn {
    /// Create an empty turn for a role
    pub fn new(role: Role) -> Self {
        Self {
            role,
            parts: Vec::new(),
            tools: Vec::new(),
            artifacts: Vec::new(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Create a user turn from content parts
    pub fn user(parts: Vec<Part>) -> Self {
        Self {
            parts,
            ..Self::new(Role::User)
        }
    }

    /// Create an empty agent turn
    pub fn agent() -> Self {
        Self::new(Role::Agent)
    }

    /// Concatenate `text` onto the trailing text part, or start a new text
    /// part if the trailing part is not text
    pub fn append_text(&mut self, text: &str) {
        if let Some(Part::Text { text: trailing }) = self.parts.last_mut() {
            trailing.push_str(text);
        } else {
            self.parts.push(Part::text(text));
        }
    }

    /// Record an unresolved tool call
    pub fn push_tool_call(&mut self, name: impl Into<String>, input: serde_json::Value) {
        self.tools.push(ToolInteraction {
            name: name.into(),
            input,
            result: None,
        });
    }

    /// Attach `result` to the most recently appended unresolved tool call.
    ///
    /// Matching is by recency, not id: the stream carries no correlation
    /// ids, and at most one call is outstanding at a time. Returns `false`
    /// when no unresolved call exists.
    pub fn resolve_last_tool_call(&mut self, result: serde_json::Value) -> bool {
        match self.tools.iter_mut().rev().find(|t| !t.is_resolved()) {
            Some(interaction) => {
                interaction.result = Some(result);
                true
            }
            None => false,
        }
    }

    /// Record an artifact
    pub fn push_artifact(&mut self, artifact: Artifact) {
        self.artifacts.push(artifact);
    }

    /// Concatenated plain text of all content parts
    pub fn plain_text(&self) -> String {
        self.parts.iter().map(|p| p.plain_text()).collect()
    }
}

/// Ordered list of turns for one conversation
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Append a turn, returning its index
    pub fn push_turn(&mut self, turn: Turn) -> usize {
        self.turns.push(turn);
        self.turns.len() - 1
    }

    pub fn turn(&self, index: usize) -> Option<&Turn> {
        self.turns.get(index)
    }

    pub fn turn_mut(&mut self, index: usize) -> Option<&mut Turn> {
        self.turns.get_mut(index)
    }

    pub fn last_turn(&self) -> Option<&Turn> {
        self.turns.last()
    }
}
