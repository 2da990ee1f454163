//! The run record and its lifecycle state.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle state of a remote task as reported by the agent.
///
/// Provider states we don't know are carried through as [`RunState::Other`]
/// and treated as non-terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RunState {
    Submitted,
    Working,
    Completed,
    Failed,
    Canceled,
    Other(String),
}

impl RunState {
    pub fn parse(s: &str) -> Self {
        match s {
            "submitted" => Self::Submitted,
            "working" => Self::Working,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            "canceled" => Self::Canceled,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Submitted => "submitted",
            Self::Working => "working",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
            Self::Other(s) => s.as_str(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Canceled)
    }

    /// States only move forward: nothing leaves a terminal state and nothing
    /// goes back to `submitted`.
    pub fn can_transition_to(&self, next: &RunState) -> bool {
        if self.is_terminal() {
            return false;
        }
        !(matches!(next, Self::Submitted) && !matches!(self, Self::Submitted))
    }
}

impl From<String> for RunState {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<RunState> for String {
    fn from(state: RunState) -> Self {
        state.as_str().to_string()
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One dispatched task and everything we last learned about it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Run {
    pub request_id: String,
    pub remote_task_id: String,
    pub endpoint_base: String,
    /// Milliseconds since the Unix epoch, like every timestamp on a run.
    pub created_at: u64,
    pub last_polled_at: Option<u64>,
    pub completed_at: Option<u64>,
    pub poll_count: u64,
    pub state: RunState,
    /// Length in characters of the submitted text.
    pub content_len: usize,
    pub last_reply_text: String,
    pub last_parts_text: String,
    pub last_raw_payload: Value,
    pub last_error: Option<String>,
}

impl Run {
    /// A run fresh off a successful submission. A submission that already
    /// reports a terminal state counts as completed at creation.
    pub fn new(
        request_id: impl Into<String>,
        remote_task_id: impl Into<String>,
        endpoint_base: impl Into<String>,
        state: RunState,
        content_len: usize,
        raw: Value,
        now_ms: u64,
    ) -> Self {
        let completed_at = state.is_terminal().then_some(now_ms);
        Self {
            request_id: request_id.into(),
            remote_task_id: remote_task_id.into(),
            endpoint_base: endpoint_base.into(),
            created_at: now_ms,
            last_polled_at: None,
            completed_at,
            poll_count: 0,
            state,
            content_len,
            last_reply_text: String::new(),
            last_parts_text: String::new(),
            last_raw_payload: raw,
            last_error: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Move to `next` if the state machine allows it. Stamps `completed_at`
    /// the first time a terminal state is reached. Returns whether the
    /// state changed.
    pub fn advance(&mut self, next: RunState, now_ms: u64) -> bool {
        if self.state == next || !self.state.can_transition_to(&next) {
            return false;
        }
        self.state = next;
        if self.state.is_terminal() && self.completed_at.is_none() {
            self.completed_at = Some(now_ms);
        }
        true
    }

    /// Milliseconds since the run finished, if it has.
    pub fn finished_for(&self, now_ms: u64) -> Option<u64> {
        self.completed_at.map(|at| now_ms.saturating_sub(at))
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            req_id: self.request_id.clone(),
            task_id: self.remote_task_id.clone(),
            state: self.state.clone(),
            created_at: self.created_at,
            last_polled_at: self.last_polled_at,
            completed_at: self.completed_at,
            poll_count: self.poll_count,
            text_len: self.content_len,
            last_error: self.last_error.clone(),
        }
    }
}

/// Read-only projection of a run for listings. Leaves out the text bodies
/// and the raw payload to keep pages small.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub req_id: String,
    pub task_id: String,
    pub state: RunState,
    pub created_at: u64,
    pub last_polled_at: Option<u64>,
    pub completed_at: Option<u64>,
    pub poll_count: u64,
    pub text_len: usize,
    pub last_error: Option<String>,
}
