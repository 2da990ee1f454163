//! One poll of a run: fetch the remote task, then fold the outcome into the
//! run record.
//!
//! The fold ([`apply_outcome`]) is a plain function over `&mut Run` so the
//! state machine can be exercised without timers or a network.

use serde_json::Value;

use crate::error::PollTransportError;
use crate::remote::{RemoteAgent, Task};
use crate::run::{Run, RunState};

/// Result of one status query.
#[derive(Debug, Clone)]
pub enum PollOutcome {
    /// The agent answered with a task body.
    Fetched { raw: Value, task: Task },
    /// Transport, status, or decode failure. Retried on the next tick.
    Failed(PollTransportError),
}

/// Whether the run still needs polling after an outcome was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Pending,
    Finished,
}

/// Query `{endpoint_base}/tasks/{task_id}`. Never fails; errors come back as
/// [`PollOutcome::Failed`].
pub async fn fetch_status(
    remote: &dyn RemoteAgent,
    endpoint_base: &str,
    task_id: &str,
) -> PollOutcome {
    let raw = match remote.get_task(endpoint_base, task_id).await {
        Ok(raw) => raw,
        Err(e) => return PollOutcome::Failed(e.into()),
    };
    match Task::from_value(&raw) {
        Ok(task) => PollOutcome::Fetched { raw, task },
        Err(e) => PollOutcome::Failed(PollTransportError::Malformed(e.to_string())),
    }
}

/// Fold a poll outcome into `run`. Every outcome counts as one poll.
pub fn apply_outcome(run: &mut Run, outcome: PollOutcome, now_ms: u64) -> Verdict {
    run.poll_count += 1;
    run.last_polled_at = Some(now_ms);

    match outcome {
        PollOutcome::Failed(err) => {
            run.last_error = Some(err.to_string());
        }
        PollOutcome::Fetched { raw, task } => {
            let state = RunState::parse(task.state().unwrap_or("unknown"));
            run.advance(state, now_ms);
            run.last_reply_text = task.reply_text();
            run.last_parts_text = task.parts_text();
            run.last_raw_payload = raw;
            run.last_error = None;
        }
    }

    if run.is_terminal() {
        Verdict::Finished
    } else {
        Verdict::Pending
    }
}
