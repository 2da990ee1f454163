//! Time source for run timestamps.
//!
//! Every timestamp on a run, and every retention check against one, goes
//! through a [`Clock`] so the whole lifecycle can be driven by tokio's paused
//! time in tests.

use tokio::time::Instant;

use crate::consts::now_ms;

/// Milliseconds since the Unix epoch.
pub trait Clock: Send + Sync + 'static {
    fn now_ms(&self) -> u64;
}

/// The system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        now_ms()
    }
}

/// Wall clock read once at construction, then advanced by tokio's
/// monotonic clock. Under `start_paused` it moves only when tokio time does.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    wall_ms: u64,
    origin: Instant,
}

impl TokioClock {
    pub fn new() -> Self {
        Self {
            wall_ms: now_ms(),
            origin: Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn now_ms(&self) -> u64 {
        self.wall_ms + self.origin.elapsed().as_millis() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn system_clock_is_epoch_millis() {
        assert!(SystemClock.now_ms() > 1_577_836_800_000);
    }

    #[tokio::test(start_paused = true)]
    async fn tokio_clock_follows_paused_time() {
        let clock = TokioClock::new();
        let start = clock.now_ms();

        tokio::time::advance(Duration::from_secs(90)).await;
        assert_eq!(clock.now_ms(), start + 90_000);
    }
}
