//! Session directory: process-wide owner of the selected conversation
//!
//! The directory is the sole owner of the active feed session and the only
//! place transcript state is mutated. All mutation funnels through one
//! mutex; feed callbacks carry a generation stamp and are ignored once a
//! newer session (or no session) is active, so a close + reopen can never
//! let stale events write into the wrong transcript.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;

use confab_proto::{ConversationSummary, FeedFrame, Message, Task, TaskState};

use crate::backend::Backend;
use crate::conversation::ConversationState;
use crate::error::{Error, Result};
use crate::events::SessionEvent;
use crate::feed::FeedSession;
use crate::reconciler::{Outcome, Reconciler};
use crate::transcript::Turn;

/// Cloneable handle to the session directory
#[derive(Clone)]
pub struct SessionDirectory {
    inner: Arc<Inner>,
}

struct Inner {
    backend: Arc<dyn Backend>,
    state: Mutex<DirectoryState>,
    events: broadcast::Sender<SessionEvent>,
}

#[derive(Default)]
struct DirectoryState {
    /// Selected conversation; `None` before the first selection
    conversation: Option<ConversationState>,
    reconciler: Reconciler,
    /// The at-most-one active feed session
    active: Option<FeedSession>,
    /// Bumped on every selection change; in-flight async work compares
    /// epochs before touching state
    epoch: u64,
    /// Generation stamps handed to feed sessions
    next_generation: u64,
    /// Last delivery marker applied, tagged by task id
    last_marker: Option<(String, String)>,
}

impl DirectoryState {
    fn close_active(&mut self) {
        if let Some(session) = self.active.take() {
            session.close();
        }
    }

    fn active_generation(&self) -> Option<u64> {
        self.active.as_ref().map(|s| s.generation())
    }
}

impl SessionDirectory {
    /// Create a directory over a backend
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            inner: Arc::new(Inner {
                backend,
                state: Mutex::new(DirectoryState::default()),
                events,
            }),
        }
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    /// Identifier of the selected conversation
    pub fn selected(&self) -> Option<String> {
        self.inner
            .state
            .lock()
            .conversation
            .as_ref()
            .map(|c| c.id.clone())
    }

    /// Whether the selected conversation is currently streaming
    pub fn is_streaming(&self) -> bool {
        self.inner
            .state
            .lock()
            .conversation
            .as_ref()
            .is_some_and(|c| c.is_streaming)
    }

    /// Run a closure against the selected conversation's state
    pub fn with_conversation<R>(&self, f: impl FnOnce(&ConversationState) -> R) -> Option<R> {
        self.inner.state.lock().conversation.as_ref().map(f)
    }

    /// List conversations from storage
    pub async fn list_conversations(&self) -> Result<Vec<ConversationSummary>> {
        Ok(self.inner.backend.list_conversations().await?)
    }

    /// Create a conversation and select it
    pub async fn new_conversation(&self) -> Result<ConversationSummary> {
        let summary = self.inner.backend.create_conversation().await?;
        self.select_conversation(&summary.context_id).await?;
        Ok(summary)
    }

    /// Select a conversation.
    ///
    /// Closes the previous feed session unconditionally, replaces the
    /// in-memory transcript wholesale with fetched authoritative state,
    /// and reattaches to the live task if one is streaming. A select that
    /// gets superseded before its fetch resolves discards its own result.
    pub async fn select_conversation(&self, id: &str) -> Result<()> {
        let epoch = self.begin_switch();
        let detail = self.inner.backend.fetch_conversation(id).await?;

        let reattach = {
            let mut st = self.inner.state.lock();
            if st.epoch != epoch {
                tracing::debug!(id, "select superseded before fetch resolved");
                return Ok(());
            }
            let conversation = ConversationState::from_detail(&detail);
            let reattach = if conversation.is_streaming {
                conversation
                    .active_task
                    .clone()
                    .map(|task_id| (task_id, detail.stream_url.clone()))
            } else {
                None
            };
            st.conversation = Some(conversation);
            st.reconciler = Reconciler::new();
            let _ = self.inner.events.send(SessionEvent::ConversationLoaded {
                id: id.to_string(),
            });
            reattach
        };

        if let Some((task_id, stream_url)) = reattach {
            let stream_url = match stream_url {
                Some(url) => url,
                None => self.inner.backend.resubscribe(&task_id).await?.stream_url,
            };
            self.attach_feed(epoch, task_id, stream_url).await?;
        }
        Ok(())
    }

    /// Delete a conversation.
    ///
    /// Closes any active feed session first, then requests deletion; if
    /// the deleted conversation was selected, the selection is cleared.
    pub async fn delete_conversation(&self, id: &str) -> Result<()> {
        let (was_selected, epoch) = {
            let mut st = self.inner.state.lock();
            st.close_active();
            st.epoch += 1;
            (
                st.conversation.as_ref().is_some_and(|c| c.id == id),
                st.epoch,
            )
        };

        self.inner.backend.delete_conversation(id).await?;

        if was_selected {
            let mut st = self.inner.state.lock();
            if st.epoch == epoch {
                st.conversation = None;
                st.reconciler = Reconciler::new();
                st.last_marker = None;
                let _ = self.inner.events.send(SessionEvent::SelectionCleared);
            }
        }
        Ok(())
    }

    /// Submit a message on the selected conversation and stream the reply.
    ///
    /// The user turn and thinking indicator are applied optimistically; a
    /// collaborator failure removes the indicator and leaves the
    /// transcript otherwise unchanged.
    pub async fn send_message(&self, text: &str) -> Result<()> {
        let message = Message::user(text);
        let (context_id, epoch) = {
            let mut st = self.inner.state.lock();
            let epoch = st.epoch;
            let conv = st.conversation.as_mut().ok_or(Error::NoSelection)?;
            conv.transcript.push_turn(Turn::user(message.parts.clone()));
            conv.is_thinking = true;
            conv.error = None;
            let id = conv.id.clone();
            let _ = self.inner.events.send(SessionEvent::TranscriptUpdated);
            let _ = self.inner.events.send(SessionEvent::Thinking { active: true });
            (id, epoch)
        };

        let ack = match self.inner.backend.send_message(&context_id, &message).await {
            Ok(ack) => ack,
            Err(e) => {
                let mut st = self.inner.state.lock();
                if st.epoch == epoch {
                    if let Some(conv) = st.conversation.as_mut() {
                        conv.is_thinking = false;
                        conv.error = Some(e.to_string());
                    }
                    let _ = self.inner.events.send(SessionEvent::Error {
                        message: e.to_string(),
                    });
                }
                return Err(e.into());
            }
        };

        {
            let mut st = self.inner.state.lock();
            if st.epoch != epoch {
                // Switched away mid-send; the task keeps running server-side
                // and re-selecting the conversation will reattach to it.
                return Ok(());
            }
            st.reconciler.begin_stream();
            if let Some(conv) = st.conversation.as_mut() {
                conv.is_streaming = true;
                conv.active_task = Some(ack.task.id.clone());
            }
        }
        self.attach_feed(epoch, ack.task.id, ack.stream_url).await
    }

    /// Cancel the outstanding task on the selected conversation
    pub async fn cancel_task(&self) -> Result<Task> {
        let task_id = self
            .inner
            .state
            .lock()
            .conversation
            .as_ref()
            .and_then(|c| c.active_task.clone())
            .ok_or(Error::NoActiveTask)?;

        let task = self.inner.backend.cancel_task(&task_id).await?;

        let mut st = self.inner.state.lock();
        if st
            .active
            .as_ref()
            .is_some_and(|s| s.task_id() == task_id)
        {
            st.close_active();
        }
        if let Some(conv) = st.conversation.as_mut() {
            if conv.active_task.as_deref() == Some(task_id.as_str()) {
                conv.is_streaming = false;
                conv.is_thinking = false;
                conv.active_task = None;
                let _ = self.inner.events.send(SessionEvent::StreamClosed {
                    state: Some(TaskState::Canceled),
                });
            }
        }
        Ok(task)
    }

    /// Reattach to the selected conversation's outstanding task after the
    /// feed dropped, replaying only events past the last applied marker
    pub async fn resubscribe(&self) -> Result<()> {
        let (task_id, epoch) = {
            let mut st = self.inner.state.lock();
            let task_id = st
                .conversation
                .as_ref()
                .and_then(|c| c.active_task.clone())
                .ok_or(Error::NoActiveTask)?;
            st.close_active();
            (task_id, st.epoch)
        };

        let ack = self.inner.backend.resubscribe(&task_id).await?;

        {
            let mut st = self.inner.state.lock();
            if st.epoch != epoch {
                return Ok(());
            }
            if let Some(conv) = st.conversation.as_mut() {
                conv.is_streaming = true;
                conv.error = None;
            }
        }
        self.attach_feed(epoch, task_id, ack.stream_url).await
    }

    fn begin_switch(&self) -> u64 {
        let mut st = self.inner.state.lock();
        st.close_active();
        st.epoch += 1;
        st.epoch
    }

    /// Open the push channel and install a feed session for `task_id`,
    /// closing whatever session is still active first
    async fn attach_feed(&self, epoch: u64, task_id: String, stream_url: String) -> Result<()> {
        match self.try_attach(epoch, task_id, stream_url).await {
            Ok(()) => Ok(()),
            Err(e) => {
                let mut st = self.inner.state.lock();
                if st.epoch == epoch {
                    if let Some(conv) = st.conversation.as_mut() {
                        conv.is_streaming = false;
                        conv.is_thinking = false;
                        conv.error = Some(e.to_string());
                    }
                }
                Err(e)
            }
        }
    }

    async fn try_attach(&self, epoch: u64, task_id: String, stream_url: String) -> Result<()> {
        let last_event_id = {
            let st = self.inner.state.lock();
            if st.epoch != epoch {
                return Ok(());
            }
            st.last_marker
                .as_ref()
                .filter(|(task, _)| *task == task_id)
                .map(|(_, marker)| marker.clone())
        };

        let feed = self
            .inner
            .backend
            .open_feed(&stream_url, last_event_id.as_deref())
            .await?;

        let mut st = self.inner.state.lock();
        if st.epoch != epoch {
            // Superseded while the channel opened; the unused feed closes
            // on drop.
            return Ok(());
        }
        st.close_active();
        st.next_generation += 1;
        let generation = st.next_generation;

        let on_event = {
            let inner = Arc::clone(&self.inner);
            move |frame: &FeedFrame| Inner::handle_frame(&inner, generation, frame)
        };
        let on_terminal = {
            let inner = Arc::clone(&self.inner);
            move || Inner::handle_stream_end(&inner, generation)
        };

        let session = FeedSession::open(task_id.clone(), generation, feed, on_event, on_terminal);
        st.active = Some(session);
        let _ = self.inner.events.send(SessionEvent::StreamOpened { task_id });
        Ok(())
    }
}

impl Inner {
    /// Apply one decoded frame from the feed session with `generation`
    fn handle_frame(inner: &Arc<Inner>, generation: u64, frame: &FeedFrame) {
        let mut st = inner.state.lock();
        if st.active_generation() != Some(generation) {
            tracing::debug!(kind = frame.event.kind(), "dropping event from stale feed session");
            return;
        }

        if let Some(marker) = &frame.marker {
            let task_id = st.active.as_ref().map(|s| s.task_id().to_string());
            if let Some(task_id) = task_id {
                st.last_marker = Some((task_id, marker.clone()));
            }
        }

        let DirectoryState {
            conversation,
            reconciler,
            ..
        } = &mut *st;
        let Some(conv) = conversation.as_mut() else {
            return;
        };

        match reconciler.apply(conv, frame.event.clone()) {
            Outcome::Transcript => {
                let _ = inner.events.send(SessionEvent::TranscriptUpdated);
            }
            Outcome::Indicator => {
                let active = conv.is_thinking;
                let _ = inner.events.send(SessionEvent::Thinking { active });
            }
            Outcome::Dropped => {}
            Outcome::Terminal(state) => {
                let _ = inner.events.send(SessionEvent::StreamClosed { state: Some(state) });
            }
        }
    }

    /// The feed session's terminal callback: release the handle and, when
    /// the stream died without a terminal event, mark the conversation as
    /// no longer streaming
    fn handle_stream_end(inner: &Arc<Inner>, generation: u64) {
        let mut st = inner.state.lock();
        if st.active_generation() != Some(generation) {
            return;
        }
        st.close_active();
        if let Some(conv) = st.conversation.as_mut() {
            if conv.is_streaming {
                conv.is_streaming = false;
                conv.is_thinking = false;
                let _ = inner.events.send(SessionEvent::StreamClosed { state: None });
            }
        }
    }
}
