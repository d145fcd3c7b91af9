//! Backend abstraction over the storage/agent collaborator
//!
//! The session directory never talks HTTP directly; everything it needs
//! from the outside world goes through this trait so tests can substitute
//! scripted backends.

use async_trait::async_trait;

use confab_proto::{
    Client, ConversationDetail, ConversationSummary, Message, Result, SendAck, Task, TaskFeed,
};

/// The external storage/agent collaborator
#[async_trait]
pub trait Backend: Send + Sync {
    /// List conversations, newest first
    async fn list_conversations(&self) -> Result<Vec<ConversationSummary>>;

    /// Create a new conversation
    async fn create_conversation(&self) -> Result<ConversationSummary>;

    /// Fetch authoritative conversation state
    async fn fetch_conversation(&self, id: &str) -> Result<ConversationDetail>;

    /// Delete a conversation; repeated deletion succeeds
    async fn delete_conversation(&self, id: &str) -> Result<()>;

    /// Submit a message, receiving a task reference to stream from
    async fn send_message(&self, context_id: &str, message: &Message) -> Result<SendAck>;

    /// Fetch a task snapshot (polling fallback)
    async fn fetch_task(&self, task_id: &str) -> Result<Task>;

    /// Cancel a non-terminal task
    async fn cancel_task(&self, task_id: &str) -> Result<Task>;

    /// Re-obtain a stream URL for an existing task
    async fn resubscribe(&self, task_id: &str) -> Result<SendAck>;

    /// Open the push channel behind a stream URL
    async fn open_feed(&self, stream_url: &str, last_event_id: Option<&str>) -> Result<TaskFeed>;
}

/// Production backend over the HTTP + SSE protocol client
pub struct HttpBackend {
    client: Client,
}

impl HttpBackend {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Connect to a server base URL
    pub fn connect(base_url: &str) -> Result<Self> {
        Ok(Self::new(Client::new(base_url)?))
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn list_conversations(&self) -> Result<Vec<ConversationSummary>> {
        self.client.list_conversations().await
    }

    async fn create_conversation(&self) -> Result<ConversationSummary> {
        self.client.create_conversation().await
    }

    async fn fetch_conversation(&self, id: &str) -> Result<ConversationDetail> {
        self.client.get_conversation(id).await
    }

    async fn delete_conversation(&self, id: &str) -> Result<()> {
        self.client.delete_conversation(id).await
    }

    async fn send_message(&self, context_id: &str, message: &Message) -> Result<SendAck> {
        self.client.send_message(context_id, message).await
    }

    async fn fetch_task(&self, task_id: &str) -> Result<Task> {
        self.client.get_task(task_id).await
    }

    async fn cancel_task(&self, task_id: &str) -> Result<Task> {
        self.client.cancel_task(task_id).await
    }

    async fn resubscribe(&self, task_id: &str) -> Result<SendAck> {
        self.client.resubscribe(task_id).await
    }

    async fn open_feed(&self, stream_url: &str, last_event_id: Option<&str>) -> Result<TaskFeed> {
        self.client.open_feed(stream_url, last_event_id)
    }
}
