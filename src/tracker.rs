//! Binds the poller to the scheduler: one repeating poll per run, keyed by
//! request id, that stops itself once the run is finished.

use std::sync::Arc;
use std::time::Duration;

use tracing::{Instrument, debug, info, info_span, warn};

use crate::clock::Clock;
use crate::events::{Event, EventBus};
use crate::policy::PollPolicy;
use crate::poller::{Verdict, apply_outcome, fetch_status};
use crate::registry::RunRegistry;
use crate::remote::RemoteAgent;
use crate::run::RunState;
use crate::scheduler::{ScheduleError, Scheduler, Tick};

struct PollContext {
    registry: Arc<RunRegistry>,
    remote: Arc<dyn RemoteAgent>,
    policy: Arc<dyn PollPolicy>,
    events: Arc<EventBus>,
    clock: Arc<dyn Clock>,
}

/// What a tick left behind, copied out of the registry lock for logging.
struct PollReport {
    verdict: Verdict,
    keep_polling: bool,
    poll_count: u64,
    state: RunState,
    error: Option<String>,
    age_ms: u64,
}

impl PollContext {
    async fn tick(&self, request_id: &str) -> Tick {
        let target = self
            .registry
            .inspect(request_id, |run| {
                (run.endpoint_base.clone(), run.remote_task_id.clone())
            })
            .await;
        let Some((endpoint_base, task_id)) = target else {
            debug!("run is gone, stopping");
            return Tick::Stop;
        };

        let outcome = fetch_status(self.remote.as_ref(), &endpoint_base, &task_id).await;

        let now = self.clock.now_ms();
        let report = self
            .registry
            .update(request_id, |run| {
                let verdict = apply_outcome(run, outcome, now);
                PollReport {
                    verdict,
                    keep_polling: verdict == Verdict::Pending && self.policy.keep_polling(run),
                    poll_count: run.poll_count,
                    state: run.state.clone(),
                    error: run.last_error.clone(),
                    age_ms: now.saturating_sub(run.created_at),
                }
            })
            .await;
        // Reaped while the request was in flight.
        let Some(report) = report else {
            debug!("run deleted mid-poll, discarding result");
            return Tick::Stop;
        };

        match &report.error {
            Some(err) => warn!(poll = report.poll_count, error = %err, "poll failed"),
            None => info!(
                poll = report.poll_count,
                state = %report.state,
                elapsed_ms = report.age_ms,
                "polled"
            ),
        }
        self.events.emit(Event::RunPolled {
            request_id: request_id.to_string(),
            poll_count: report.poll_count,
            state: report.state.clone(),
            error: report.error.clone(),
        });

        match report.verdict {
            Verdict::Finished => {
                info!(
                    state = %report.state,
                    total_ms = report.age_ms,
                    task_id = %task_id,
                    "DONE"
                );
                self.events.emit(Event::RunFinished {
                    request_id: request_id.to_string(),
                    state: report.state,
                });
                Tick::Stop
            }
            Verdict::Pending if !report.keep_polling => {
                warn!(poll = report.poll_count, "poll policy gave up on run");
                Tick::Stop
            }
            Verdict::Pending => Tick::Continue,
        }
    }
}

/// Keeps every live run polled until it finishes.
#[derive(Clone)]
pub struct RunTracker {
    ctx: Arc<PollContext>,
    scheduler: Scheduler,
    interval: Duration,
}

impl RunTracker {
    pub fn new(
        registry: Arc<RunRegistry>,
        remote: Arc<dyn RemoteAgent>,
        policy: Arc<dyn PollPolicy>,
        events: Arc<EventBus>,
        clock: Arc<dyn Clock>,
        scheduler: Scheduler,
        interval: Duration,
    ) -> Self {
        Self {
            ctx: Arc::new(PollContext {
                registry,
                remote,
                policy,
                events,
                clock,
            }),
            scheduler,
            interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start polling `request_id`: once right away, then every interval.
    pub fn track(&self, request_id: &str) -> Result<(), ScheduleError> {
        let ctx = Arc::clone(&self.ctx);
        let id = request_id.to_string();
        self.scheduler
            .schedule_repeating(request_id, self.interval, move || {
                let ctx = Arc::clone(&ctx);
                let id = id.clone();
                let span = info_span!("poll", request_id = %id);
                async move { ctx.tick(&id).await }.instrument(span)
            })
    }

    pub fn is_tracking(&self, request_id: &str) -> bool {
        self.scheduler.is_scheduled(request_id)
    }

    /// Stop polling `request_id`. Harmless if it already stopped.
    pub fn untrack(&self, request_id: &str) -> bool {
        self.scheduler.cancel(request_id)
    }

    /// Stop every schedule, letting in-flight polls finish.
    pub async fn shutdown(&self) {
        self.scheduler.shutdown().await;
    }
}
