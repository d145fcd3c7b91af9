//! confab-session: streaming-session reconciliation engine
//!
//! This crate owns a conversation's evolving transcript while a task
//! streams: it attaches one live feed session per outstanding task,
//! applies idempotent transcript mutations as decoded events arrive, and
//! recovers cleanly when the feed drops mid-stream.

pub mod backend;
pub mod conversation;
pub mod directory;
pub mod error;
pub mod events;
pub mod feed;
pub mod reconciler;
pub mod transcript;

pub use backend::{Backend, HttpBackend};
pub use conversation::ConversationState;
pub use directory::SessionDirectory;
pub use error::{Error, Result};
pub use events::SessionEvent;
pub use feed::FeedSession;
pub use reconciler::{Outcome, Reconciler};
pub use transcript::{ToolInteraction, Transcript, Turn};
