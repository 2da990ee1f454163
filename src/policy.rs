use crate::run::Run;

/// Decides whether a run that is still pending after a poll gets another one.
///
/// Terminal runs always stop; the policy is only asked about the rest.
pub trait PollPolicy: Send + Sync {
    fn keep_polling(&self, run: &Run) -> bool;
}

/// Poll until the agent reports a terminal state, however long that takes.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetryForever;

impl PollPolicy for RetryForever {
    fn keep_polling(&self, _run: &Run) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run::RunState;
    use serde_json::json;

    #[test]
    fn retry_forever_never_gives_up() {
        let mut run = Run::new("r", "t", "https://a", RunState::Working, 0, json!({}), 0);
        run.poll_count = u64::MAX - 1;
        run.last_error = Some("get task failed: 502 bad gateway".to_string());
        assert!(RetryForever.keep_polling(&run));
    }
}
