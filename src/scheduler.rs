//! Keyed repeating jobs.
//!
//! Each schedule is one spawned task that waits for a tick, runs the job to
//! completion, then waits for the next tick. A job therefore never overlaps
//! itself: a slow run pushes the following tick back instead of doubling up.
//! Cancelling takes effect between ticks; a job already running finishes.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    #[error("schedule period must be greater than zero")]
    ZeroPeriod,
}

/// What a job wants after it ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Continue,
    Stop,
}

struct Slot {
    generation: u64,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct Inner {
    slots: Mutex<HashMap<String, Slot>>,
    next_generation: AtomicU64,
}

impl Inner {
    fn slots(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Drop the slot for `key` only if it still belongs to `generation`;
    /// the key may have been rescheduled since.
    fn release(&self, key: &str, generation: u64) {
        let mut slots = self.slots();
        if slots.get(key).is_some_and(|s| s.generation == generation) {
            slots.remove(key);
        }
    }
}

/// Repeating jobs bound to a key, cancelable by key.
#[derive(Clone, Default)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `job` now and then every `period` until it returns
    /// [`Tick::Stop`] or the key is cancelled. Scheduling a key that is
    /// already live cancels the previous schedule first. A zero `period` is
    /// rejected and leaves any existing schedule for `key` untouched.
    pub fn schedule_repeating<F, Fut>(
        &self,
        key: impl Into<String>,
        period: Duration,
        mut job: F,
    ) -> Result<(), ScheduleError>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Tick> + Send + 'static,
    {
        if period.is_zero() {
            return Err(ScheduleError::ZeroPeriod);
        }
        let key = key.into();
        let generation = self.inner.next_generation.fetch_add(1, Ordering::SeqCst);
        let token = CancellationToken::new();

        // Held across the spawn so the task can't release its slot before
        // it has been inserted.
        let mut slots = self.inner.slots();
        if let Some(previous) = slots.remove(&key) {
            previous.token.cancel();
        }

        let inner = Arc::clone(&self.inner);
        let task_token = token.clone();
        let task_key = key.clone();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = task_token.cancelled() => break,
                    _ = interval.tick() => {}
                }

                if job().await == Tick::Stop {
                    break;
                }
            }

            debug!(key = %task_key, "schedule finished");
            inner.release(&task_key, generation);
        });

        slots.insert(
            key,
            Slot {
                generation,
                token,
                handle,
            },
        );
        Ok(())
    }

    /// Stop the schedule for `key`. Returns false if nothing was scheduled.
    pub fn cancel(&self, key: &str) -> bool {
        match self.inner.slots().remove(key) {
            Some(slot) => {
                slot.token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_scheduled(&self, key: &str) -> bool {
        self.inner.slots().contains_key(key)
    }

    /// Number of live schedules.
    pub fn active(&self) -> usize {
        self.inner.slots().len()
    }

    /// Cancel everything and wait for jobs that are mid-run to finish.
    pub async fn shutdown(&self) {
        let slots: Vec<Slot> = self.inner.slots().drain().map(|(_, slot)| slot).collect();
        let handles: Vec<JoinHandle<()>> = slots
            .into_iter()
            .map(|slot| {
                slot.token.cancel();
                slot.handle
            })
            .collect();
        futures::future::join_all(handles).await;
    }
}
