//! SSE task feed: raw push channel frames decoded into typed events
//!
//! The channel delivers named events with an optional `id:` delivery
//! marker. Frames that fail to decode are dropped with a diagnostic and
//! the feed keeps going; transport errors surface as a single `Err` item
//! and end the stream. There is no automatic reconnection here: a broken
//! feed is terminal for its session, and the caller decides whether to
//! re-sync from authoritative state.

use std::pin::Pin;

use async_stream::stream;
use futures::StreamExt;
use reqwest_eventsource::{Event, EventSource};
use tokio_stream::Stream;

use crate::error::{Error, Result};
use crate::event::TaskEvent;

/// One decoded frame from a task's push channel
#[derive(Debug, Clone, PartialEq)]
pub struct FeedFrame {
    /// Delivery marker assigned by the server, when present
    pub marker: Option<String>,
    pub event: TaskEvent,
}

/// A stream of decoded task events
pub type TaskFeed = Pin<Box<dyn Stream<Item = Result<FeedFrame>> + Send>>;

/// Open a task feed from a prepared request builder.
///
/// The request must target the task's stream URL; pass `last_event_id` to
/// ask the server to replay only events after that marker.
pub fn open(
    request: reqwest::RequestBuilder,
    last_event_id: Option<&str>,
) -> Result<TaskFeed> {
    let request = match last_event_id {
        Some(id) => request.header("Last-Event-ID", id),
        None => request,
    };
    let event_source = EventSource::new(request)
        .map_err(|e| Error::Sse(format!("failed to open event source: {}", e)))?;
    Ok(Box::pin(decode_stream(event_source)))
}

/// Decode an event source into typed frames
fn decode_stream(mut event_source: EventSource) -> impl Stream<Item = Result<FeedFrame>> {
    stream! {
        while let Some(item) = event_source.next().await {
            match item {
                Ok(Event::Open) => {}
                Ok(Event::Message(message)) => {
                    let Some(event) = TaskEvent::decode(&message.event, &message.data) else {
                        tracing::debug!(
                            label = %message.event,
                            "dropping undecodable push event"
                        );
                        continue;
                    };
                    let marker = if message.id.is_empty() {
                        None
                    } else {
                        Some(message.id.clone())
                    };
                    let terminal = event.is_terminal();
                    yield Ok(FeedFrame { marker, event });
                    if terminal {
                        break;
                    }
                }
                Err(reqwest_eventsource::Error::StreamEnded) => break,
                Err(e) => {
                    yield Err(Error::Sse(e.to_string()));
                    break;
                }
            }
        }
        event_source.close();
    }
}
