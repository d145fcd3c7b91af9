//! HTTP + JSON-RPC client for the storage/agent collaborator
//!
//! Conversations are plain REST resources; task operations go through the
//! JSON-RPC endpoint (`message/stream`, `tasks/get`, `tasks/cancel`,
//! `tasks/resubscribe`). The stream URL returned by the server is joined
//! against the configured base URL before the feed is opened.

use std::sync::atomic::{AtomicU64, Ordering};

use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::error::{Error, Result};
use crate::feed::{self, TaskFeed};
use crate::types::{ConversationDetail, ConversationSummary, Message, SendAck, Task};

/// Client for the confab agent server
pub struct Client {
    http: reqwest::Client,
    base_url: Url,
    next_rpc_id: AtomicU64,
}

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: serde_json::Value,
    id: u64,
}

#[derive(Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Serialize)]
struct CreateConversationBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    context_id: Option<&'a str>,
    agent_id: &'a str,
}

impl Client {
    /// Create a client for a server base URL (e.g. `http://localhost:8000/agent`)
    pub fn new(base_url: &str) -> Result<Self> {
        // A trailing slash makes relative joins land under the base path.
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };
        let base_url =
            Url::parse(&normalized).map_err(|e| Error::InvalidUrl(format!("{}: {}", base_url, e)))?;
        Ok(Self {
            http: reqwest::Client::new(),
            base_url,
            next_rpc_id: AtomicU64::new(1),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| Error::InvalidUrl(format!("{}: {}", path, e)))
    }

    /// Resolve a server-provided stream URL, which may be origin-relative
    pub fn resolve_stream_url(&self, stream_url: &str) -> Result<Url> {
        self.endpoint(stream_url)
    }

    /// List all conversations, newest first
    pub async fn list_conversations(&self) -> Result<Vec<ConversationSummary>> {
        let url = self.endpoint("conversations/")?;
        let resp = self.http.get(url).send().await?.error_for_status()?;
        Ok(resp.json().await?)
    }

    /// Create a new conversation
    pub async fn create_conversation(&self) -> Result<ConversationSummary> {
        let url = self.endpoint("conversations/")?;
        let body = CreateConversationBody {
            context_id: None,
            agent_id: "default",
        };
        let resp = self
            .http
            .post(url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        Ok(resp.json().await?)
    }

    /// Fetch a conversation with its full history and stream indicator
    pub async fn get_conversation(&self, context_id: &str) -> Result<ConversationDetail> {
        let url = self.endpoint(&format!("conversations/{}/", context_id))?;
        let resp = self.http.get(url).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Err(Error::NotFound(format!("conversation {}", context_id)));
        }
        Ok(resp.error_for_status()?.json().await?)
    }

    /// Delete a conversation and its tasks; deleting a conversation that
    /// is already gone succeeds
    pub async fn delete_conversation(&self, context_id: &str) -> Result<()> {
        let url = self.endpoint(&format!("conversations/{}/", context_id))?;
        let resp = self.http.delete(url).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        resp.error_for_status()?;
        Ok(())
    }

    /// Submit a message and receive a task reference to stream from
    pub async fn send_message(&self, context_id: &str, message: &Message) -> Result<SendAck> {
        self.rpc(
            "message/stream",
            serde_json::json!({
                "contextId": context_id,
                "message": message,
            }),
        )
        .await
    }

    /// Fetch a snapshot of a task (polling fallback; not needed on the
    /// streaming path)
    pub async fn get_task(&self, task_id: &str) -> Result<Task> {
        self.rpc("tasks/get", serde_json::json!({ "id": task_id })).await
    }

    /// Cancel a non-terminal task
    pub async fn cancel_task(&self, task_id: &str) -> Result<Task> {
        self.rpc("tasks/cancel", serde_json::json!({ "id": task_id }))
            .await
    }

    /// Re-obtain a stream URL for an existing task
    pub async fn resubscribe(&self, task_id: &str) -> Result<SendAck> {
        self.rpc("tasks/resubscribe", serde_json::json!({ "id": task_id }))
            .await
    }

    /// Open the push channel behind a stream URL
    pub fn open_feed(&self, stream_url: &str, last_event_id: Option<&str>) -> Result<TaskFeed> {
        let url = self.resolve_stream_url(stream_url)?;
        feed::open(self.http.get(url), last_event_id)
    }

    async fn rpc<T: DeserializeOwned>(&self, method: &str, params: serde_json::Value) -> Result<T> {
        let url = self.endpoint("rpc/")?;
        let request = RpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id: self.next_rpc_id.fetch_add(1, Ordering::Relaxed),
        };
        let resp: RpcResponse = self
            .http
            .post(url)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(err) = resp.error {
            return Err(Error::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        let result = resp
            .result
            .ok_or_else(|| Error::UnexpectedResponse(format!("{}: empty result", method)))?;
        Ok(serde_json::from_value(result)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let client = Client::new("http://localhost:8000/agent").unwrap();
        let url = client.endpoint("conversations/").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/agent/conversations/");
    }

    #[test]
    fn test_resolve_stream_url_origin_relative() {
        let client = Client::new("http://localhost:8000/agent/").unwrap();
        let url = client
            .resolve_stream_url("/agent/rpc/task-1/stream/")
            .unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/agent/rpc/task-1/stream/");
    }

    #[test]
    fn test_resolve_stream_url_absolute() {
        let client = Client::new("http://localhost:8000/agent").unwrap();
        let url = client
            .resolve_stream_url("http://other:9000/agent/rpc/t/stream/")
            .unwrap();
        assert_eq!(url.as_str(), "http://other:9000/agent/rpc/t/stream/");
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        assert!(matches!(Client::new("not a url"), Err(Error::InvalidUrl(_))));
    }

    #[test]
    fn test_rpc_request_wire_shape() {
        let request = RpcRequest {
            jsonrpc: "2.0",
            method: "message/stream",
            params: serde_json::json!({"contextId": "ctx-1"}),
            id: 7,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["jsonrpc"], "2.0");
        assert_eq!(json["method"], "message/stream");
        assert_eq!(json["params"]["contextId"], "ctx-1");
        assert_eq!(json["id"], 7);
    }

    #[test]
    fn test_rpc_response_error_decodes() {
        let resp: RpcResponse = serde_json::from_str(
            r#"{"jsonrpc":"2.0","error":{"code":-32601,"message":"Method not found"},"id":1}"#,
        )
        .unwrap();
        let err = resp.error.unwrap();
        assert_eq!(err.code, -32601);
        assert!(err.message.contains("not found"));
    }
}
