use std::time::Instant;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde_json::Value;
use tracing::{debug, info};

use crate::consts::API_KEY_HEADER;
use crate::error::RemoteError;

use super::{RemoteAgent, SendMessageRequest};

/// A remote agent reached over HTTP+JSON with a static API key.
pub struct HttpAgent {
    client: reqwest::Client,
    api_key: String,
    api_prefix: String,
}

impl HttpAgent {
    /// `api_prefix` is inserted between the endpoint base and the operation
    /// path (e.g. `/v1`); pass an empty string for none.
    pub fn new(api_key: impl Into<String>, api_prefix: impl Into<String>) -> Self {
        let api_prefix = api_prefix.into();
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            api_prefix: api_prefix.trim_end_matches('/').to_string(),
        }
    }

    fn operation_url(&self, endpoint_base: &str, path: &str) -> String {
        format!("{}{}{}", endpoint_base, self.api_prefix, path)
    }

    async fn call(&self, label: &str, req: reqwest::RequestBuilder) -> Result<Value, RemoteError> {
        let started = Instant::now();
        let resp = req
            .header(CONTENT_TYPE, "application/json")
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        let status = resp.status();
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let body = resp.text().await.unwrap_or_default();

        debug!(
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            content_type = %content_type,
            "{label} <-"
        );

        if !status.is_success() {
            return Err(RemoteError::Status {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| RemoteError::Decode(e.to_string()))
    }
}

#[async_trait]
impl RemoteAgent for HttpAgent {
    async fn fetch_card(&self, card_url: &str) -> Result<Value, RemoteError> {
        info!(url = %card_url, "agent-card -> GET");
        self.call("agent-card", self.client.get(card_url)).await
    }

    async fn send_message(
        &self,
        endpoint_base: &str,
        request: &SendMessageRequest,
    ) -> Result<Value, RemoteError> {
        let url = self.operation_url(endpoint_base, "/message:send");
        info!(url = %url, "message:send -> POST");
        self.call("message:send", self.client.post(&url).json(request))
            .await
    }

    async fn get_task(&self, endpoint_base: &str, task_id: &str) -> Result<Value, RemoteError> {
        let url = self.operation_url(endpoint_base, &format!("/tasks/{task_id}"));
        debug!(url = %url, "task:get -> GET");
        self.call("task:get", self.client.get(&url)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_url_without_prefix() {
        let agent = HttpAgent::new("key", "");
        assert_eq!(
            agent.operation_url("https://agent.example", "/tasks/t1"),
            "https://agent.example/tasks/t1"
        );
    }

    #[test]
    fn operation_url_with_prefix() {
        let agent = HttpAgent::new("key", "/v1/");
        assert_eq!(
            agent.operation_url("https://agent.example", "/message:send"),
            "https://agent.example/v1/message:send"
        );
    }

    #[tokio::test]
    async fn unreachable_host_is_transport_error() {
        let agent = HttpAgent::new("key", "");
        let err = agent
            .get_task("http://127.0.0.1:1", "t1")
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::Transport(_)));
    }
}
