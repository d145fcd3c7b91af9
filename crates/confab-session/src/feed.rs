//! Feed session lifecycle
//!
//! A feed session owns the push-channel handle for exactly one task. It
//! drives the decoded frame stream on a spawned task, records the last
//! delivery marker, and tears itself down on the first terminal condition:
//! a terminal event, a transport error, or the channel simply ending.
//! Closing is the only cancellation primitive and is idempotent.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::StreamExt;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use confab_proto::{FeedFrame, TaskFeed};

/// A live subscription to one task's event feed
pub struct FeedSession {
    task_id: String,
    generation: u64,
    cancel: CancellationToken,
    terminated: Arc<AtomicBool>,
    last_event_id: Arc<Mutex<Option<String>>>,
}

impl FeedSession {
    /// Spawn a session driving `feed`.
    ///
    /// `on_event` fires for every decoded frame in delivery order;
    /// `on_terminal` fires exactly once when the stream reaches a terminal
    /// event, errors at the transport level, or ends. Neither is invoked
    /// for frames arriving after [`close`](Self::close).
    pub fn open<OnTerminal>(
        task_id: impl Into<String>,
        generation: u64,
        mut feed: TaskFeed,
        on_event: impl Fn(&FeedFrame) + Send + 'static,
        on_terminal: OnTerminal,
    ) -> Self
    where
        OnTerminal: FnOnce() + Send + 'static,
    {
        let session = Self {
            task_id: task_id.into(),
            generation,
            cancel: CancellationToken::new(),
            terminated: Arc::new(AtomicBool::new(false)),
            last_event_id: Arc::new(Mutex::new(None)),
        };

        let task_id = session.task_id.clone();
        let cancel = session.cancel.clone();
        let terminated = Arc::clone(&session.terminated);
        let last_event_id = Arc::clone(&session.last_event_id);

        tokio::spawn(async move {
            let mut on_terminal = Some(on_terminal);
            let fire_terminal = |cb: &mut Option<OnTerminal>| {
                if !terminated.swap(true, Ordering::AcqRel) {
                    if let Some(cb) = cb.take() {
                        cb();
                    }
                }
            };

            loop {
                let item = tokio::select! {
                    _ = cancel.cancelled() => break,
                    item = feed.next() => item,
                };

                match item {
                    Some(Ok(frame)) => {
                        if let Some(marker) = &frame.marker {
                            *last_event_id.lock() = Some(marker.clone());
                        }
                        let terminal = frame.event.is_terminal();
                        on_event(&frame);
                        if terminal {
                            fire_terminal(&mut on_terminal);
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        tracing::warn!(task_id = %task_id, error = %e, "task feed transport error");
                        fire_terminal(&mut on_terminal);
                        break;
                    }
                    None => {
                        // Channel closed with no terminal event: terminal
                        // for this session; the caller re-syncs from
                        // authoritative state if it wants to continue.
                        fire_terminal(&mut on_terminal);
                        break;
                    }
                }
            }
        });

        session
    }

    /// The task this session streams
    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    /// Generation stamp issued by the session directory
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Highest delivery marker applied so far
    pub fn last_event_id(&self) -> Option<String> {
        self.last_event_id.lock().clone()
    }

    /// Whether the terminal callback has fired
    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::Acquire)
    }

    /// Release the channel handle. Safe to call multiple times; no new
    /// callbacks are initiated after this returns.
    pub fn close(&self) {
        self.cancel.cancel();
    }
}

impl Drop for FeedSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
