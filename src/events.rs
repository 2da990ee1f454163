//! Run lifecycle notifications.
//!
//! The tracker, dispatcher and reaper emit via [`EventBus::emit`]; anyone
//! interested subscribes via [`EventBus::subscribe`]. Built on
//! [`tokio::sync::broadcast`] so listeners react independently and a slow
//! one only ever lags itself.

use tokio::sync::broadcast;

use crate::run::RunState;

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A submission was accepted and its run registered.
    RunCreated {
        request_id: String,
        remote_task_id: String,
    },
    /// A poll attempt finished, successfully or not.
    RunPolled {
        request_id: String,
        poll_count: u64,
        state: RunState,
        error: Option<String>,
    },
    /// The run reached a terminal state; no more polls follow.
    RunFinished { request_id: String, state: RunState },
    /// The reaper evicted the run.
    RunReaped { request_id: String },
}

impl Event {
    pub fn request_id(&self) -> &str {
        match self {
            Event::RunCreated { request_id, .. }
            | Event::RunPolled { request_id, .. }
            | Event::RunFinished { request_id, .. }
            | Event::RunReaped { request_id } => request_id,
        }
    }
}

#[derive(Debug)]
pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Returns the number of receivers that will see the event.
    pub fn emit(&self, event: Event) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    /// Future events only; nothing is replayed.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
