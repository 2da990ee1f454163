use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use super::{RemoteAgent, SendMessageRequest};
use crate::error::RemoteError;

/// A scripted agent for tests. Task replies are handed out in order; once
/// the script runs dry every further poll fails.
pub struct MockAgent {
    card: Mutex<Result<Value, RemoteError>>,
    send_reply: Mutex<Result<Value, RemoteError>>,
    task_replies: Mutex<VecDeque<Result<Value, RemoteError>>>,
    poll_delay: Option<Duration>,
    send_delay: Option<Duration>,
    card_fetches: AtomicUsize,
    sends: AtomicUsize,
    polls: AtomicUsize,
    sent_texts: Mutex<Vec<String>>,
}

impl MockAgent {
    /// An agent with an `HTTP+JSON` interface at `endpoint` that accepts
    /// every message as task `task_id`.
    pub fn new(endpoint: &str, task_id: &str) -> Self {
        Self {
            card: Mutex::new(Ok(Self::card_for(endpoint))),
            send_reply: Mutex::new(Ok(json!({
                "id": task_id,
                "status": { "state": "submitted" }
            }))),
            task_replies: Mutex::new(VecDeque::new()),
            poll_delay: None,
            send_delay: None,
            card_fetches: AtomicUsize::new(0),
            sends: AtomicUsize::new(0),
            polls: AtomicUsize::new(0),
            sent_texts: Mutex::new(Vec::new()),
        }
    }

    /// An agent card exposing a single `HTTP+JSON` interface.
    pub fn card_for(endpoint: &str) -> Value {
        json!({
            "name": "mock-agent",
            "additionalInterfaces": [
                { "transport": "JSONRPC", "url": format!("{endpoint}/rpc") },
                { "transport": "HTTP+JSON", "url": endpoint }
            ]
        })
    }

    /// A task status body with the given state and text segments.
    pub fn task_reply(task_id: &str, state: &str, texts: &[&str]) -> Value {
        let parts: Vec<Value> = texts
            .iter()
            .map(|t| json!({ "kind": "text", "text": t }))
            .collect();
        json!({
            "id": task_id,
            "status": {
                "state": state,
                "message": { "role": "agent", "parts": parts }
            }
        })
    }

    pub fn with_card(self, card: Result<Value, RemoteError>) -> Self {
        *self.card.lock().unwrap() = card;
        self
    }

    pub fn with_send_reply(self, reply: Result<Value, RemoteError>) -> Self {
        *self.send_reply.lock().unwrap() = reply;
        self
    }

    pub fn with_task_replies(self, replies: Vec<Result<Value, RemoteError>>) -> Self {
        self.task_replies.lock().unwrap().extend(replies);
        self
    }

    /// Make every poll take `delay` before answering.
    pub fn with_poll_delay(mut self, delay: Duration) -> Self {
        self.poll_delay = Some(delay);
        self
    }

    /// Make every send take `delay` before answering.
    pub fn with_send_delay(mut self, delay: Duration) -> Self {
        self.send_delay = Some(delay);
        self
    }

    pub fn card_fetches(&self) -> usize {
        self.card_fetches.load(Ordering::SeqCst)
    }

    pub fn sends(&self) -> usize {
        self.sends.load(Ordering::SeqCst)
    }

    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.sent_texts.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteAgent for MockAgent {
    async fn fetch_card(&self, _card_url: &str) -> Result<Value, RemoteError> {
        self.card_fetches.fetch_add(1, Ordering::SeqCst);
        self.card.lock().unwrap().clone()
    }

    async fn send_message(
        &self,
        _endpoint_base: &str,
        request: &SendMessageRequest,
    ) -> Result<Value, RemoteError> {
        self.sends.fetch_add(1, Ordering::SeqCst);
        self.sent_texts
            .lock()
            .unwrap()
            .push(request.text().to_string());
        if let Some(delay) = self.send_delay {
            tokio::time::sleep(delay).await;
        }
        self.send_reply.lock().unwrap().clone()
    }

    async fn get_task(&self, _endpoint_base: &str, _task_id: &str) -> Result<Value, RemoteError> {
        let i = self.polls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.poll_delay {
            tokio::time::sleep(delay).await;
        }
        self.task_replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(RemoteError::Transport(format!(
                    "MockAgent: no more task replies (called {} times)",
                    i + 1
                )))
            })
    }
}
