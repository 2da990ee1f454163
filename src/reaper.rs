//! Eviction of finished runs.
//!
//! Finished runs stay queryable for the retention window, then a periodic
//! sweep drops them. Runs still in flight are never touched.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::events::{Event, EventBus};
use crate::registry::RunRegistry;
use crate::tracker::RunTracker;

pub struct Reaper {
    registry: Arc<RunRegistry>,
    tracker: RunTracker,
    events: Arc<EventBus>,
    clock: Arc<dyn Clock>,
    retention: Duration,
    interval: Duration,
}

impl Reaper {
    pub fn new(
        registry: Arc<RunRegistry>,
        tracker: RunTracker,
        events: Arc<EventBus>,
        clock: Arc<dyn Clock>,
        retention: Duration,
        interval: Duration,
    ) -> Self {
        Self {
            registry,
            tracker,
            events,
            clock,
            retention,
            interval,
        }
    }

    /// Delete every run that finished more than the retention window before
    /// `now_ms`. Returns the evicted request ids.
    pub async fn sweep_at(&self, now_ms: u64) -> Vec<String> {
        let retention_ms = self.retention.as_millis() as u64;
        let reaped = self
            .registry
            .remove_where(|run| {
                run.finished_for(now_ms)
                    .is_some_and(|age| age > retention_ms)
            })
            .await;

        for request_id in &reaped {
            // Its poller stopped when it finished; this is a no-op unless
            // something rescheduled it.
            self.tracker.untrack(request_id);
            self.events.emit(Event::RunReaped {
                request_id: request_id.clone(),
            });
        }
        reaped
    }

    /// Sweep every interval until cancelled.
    pub async fn run(self, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {}
            }

            let reaped = self.sweep_at(self.clock.now_ms()).await;
            if reaped.is_empty() {
                debug!("reaper: nothing to evict");
            } else {
                info!(count = reaped.len(), "reaper evicted finished runs");
            }
        }
    }
}
