pub mod http;
pub mod mock;
pub mod task;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RemoteError;

pub use task::{Part, Task};

/// The three calls the core makes against a remote agent.
///
/// Implementations return the decoded JSON body untouched; shaping it into
/// cards and tasks is the caller's job, so a malformed body and a transport
/// failure stay distinguishable.
#[async_trait]
pub trait RemoteAgent: Send + Sync {
    /// `GET <card_url>`
    async fn fetch_card(&self, card_url: &str) -> Result<Value, RemoteError>;

    /// `POST {endpoint_base}/message:send`
    async fn send_message(
        &self,
        endpoint_base: &str,
        request: &SendMessageRequest,
    ) -> Result<Value, RemoteError>;

    /// `GET {endpoint_base}/tasks/{task_id}`
    async fn get_task(&self, endpoint_base: &str, task_id: &str) -> Result<Value, RemoteError>;
}

/// Discovery document published by the agent.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentCard {
    #[serde(default)]
    pub additional_interfaces: Vec<AgentInterface>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgentInterface {
    #[serde(default)]
    pub transport: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

impl AgentCard {
    /// URL of the first interface speaking `transport`, trailing slashes stripped.
    /// `None` when there is no such interface or its URL is blank.
    pub fn endpoint_for(&self, transport: &str) -> Option<String> {
        self.additional_interfaces
            .iter()
            .filter(|i| i.transport.as_deref() == Some(transport))
            .find_map(|i| i.url.as_deref())
            .map(|url| url.trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty())
    }
}

/// Body of `message:send`.
#[derive(Debug, Clone, Serialize)]
pub struct SendMessageRequest {
    pub message: OutboundMessage,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundMessage {
    pub kind: &'static str,
    pub message_id: String,
    pub role: &'static str,
    pub parts: Vec<OutboundPart>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OutboundPart {
    pub kind: &'static str,
    pub text: String,
}

impl SendMessageRequest {
    /// A user message carrying `text` as its only segment, with a fresh message id.
    pub fn user_text(text: &str) -> Self {
        Self {
            message: OutboundMessage {
                kind: "message",
                message_id: format!("msg-{}", uuid::Uuid::new_v4()),
                role: "user",
                parts: vec![OutboundPart {
                    kind: "text",
                    text: text.to_string(),
                }],
            },
        }
    }

    /// The text of the first segment.
    pub fn text(&self) -> &str {
        self.message
            .parts
            .first()
            .map(|p| p.text.as_str())
            .unwrap_or("")
    }
}
