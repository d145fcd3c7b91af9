//! confab-proto: wire protocol layer for the confab agent client
//!
//! This crate provides the typed data model for conversations and tasks,
//! the decoder for named push-channel events, the HTTP/JSON-RPC client for
//! the storage/agent collaborator, and the SSE feed that streams a single
//! task's events.

pub mod client;
pub mod error;
pub mod event;
pub mod feed;
pub mod types;

pub use client::Client;
pub use error::{Error, Result};
pub use event::TaskEvent;
pub use feed::{FeedFrame, TaskFeed};
pub use types::*;
