//! Error taxonomy for the run-tracking core.
//!
//! Only [`RelayError`] ever reaches a caller. Poll failures are absorbed into
//! the run record as text and never propagate.

use crate::scheduler::ScheduleError;

/// Failure talking to the remote agent.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    /// The request never produced a response (DNS, connect, reset, ...).
    #[error("transport error: {0}")]
    Transport(String),

    /// The agent answered with a non-success status.
    #[error("{status} {body}")]
    Status { status: u16, body: String },

    /// The body was not JSON.
    #[error("JSON parse failed: {0}")]
    Decode(String),
}

/// The operational endpoint could not be resolved from the agent card.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DiscoveryError {
    #[error("agent-card failed: {0}")]
    Fetch(RemoteError),

    #[error("agent-card is not a valid card: {0}")]
    Malformed(String),

    #[error("agent-card at {url} has no HTTP+JSON interface URL (additionalInterfaces[].transport)")]
    MissingInterface { url: String },
}

/// The agent did not accept the submitted message.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SubmissionError {
    #[error("message:send failed: {0}")]
    Rejected(RemoteError),

    #[error("message:send returned no task id: {body}")]
    MissingTaskId { body: String },
}

/// A single status query failed. Recorded on the run, retried next tick.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PollTransportError {
    #[error("get task failed: {0}")]
    Remote(#[from] RemoteError),

    #[error("get task: response is not a task: {0}")]
    Malformed(String),
}

/// Errors returned by the caller-facing operations.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error(transparent)]
    Submission(#[from] SubmissionError),

    #[error("Unknown reqId: {0}")]
    NotFound(String),

    #[error("reqId already in use: {0}")]
    DuplicateRequest(String),

    #[error("Missing text")]
    EmptyContent,

    #[error("cannot poll run: {0}")]
    Schedule(#[from] ScheduleError),
}

impl RelayError {
    /// True when the failure came from the remote agent rather than the caller.
    pub fn is_upstream(&self) -> bool {
        matches!(self, Self::Discovery(_) | Self::Submission(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_error_shows_code_and_body() {
        let err = PollTransportError::from(RemoteError::Status {
            status: 500,
            body: "boom".to_string(),
        });
        assert_eq!(err.to_string(), "get task failed: 500 boom");
    }

    #[test]
    fn discovery_error_is_upstream() {
        let err = RelayError::from(DiscoveryError::MissingInterface {
            url: "https://x/card".to_string(),
        });
        assert!(err.is_upstream());
        assert!(err.to_string().contains("HTTP+JSON"));
    }

    #[test]
    fn caller_errors_are_not_upstream() {
        assert!(!RelayError::NotFound("req_1".to_string()).is_upstream());
        assert!(!RelayError::EmptyContent.is_upstream());
    }
}
