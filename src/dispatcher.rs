use std::sync::Arc;

use rand::RngExt;
use tracing::info;

use crate::clock::Clock;
use crate::consts::now_ms;
use crate::discovery::DiscoveryCache;
use crate::error::{RelayError, SubmissionError};
use crate::events::{Event, EventBus};
use crate::registry::RunRegistry;
use crate::remote::{RemoteAgent, SendMessageRequest, Task};
use crate::run::{Run, RunState};
use crate::tracker::RunTracker;

/// A fresh request id: `req_<epoch millis>_<16 hex chars>`.
pub fn new_request_id() -> String {
    let bytes: [u8; 8] = rand::rng().random();
    let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
    format!("req_{}_{}", now_ms(), hex)
}

/// Turns caller content into a tracked run: resolve the endpoint, submit,
/// register, start polling. Nothing here is retried.
pub struct Dispatcher {
    discovery: Arc<DiscoveryCache>,
    remote: Arc<dyn RemoteAgent>,
    registry: Arc<RunRegistry>,
    tracker: RunTracker,
    events: Arc<EventBus>,
    clock: Arc<dyn Clock>,
    discovery_url: String,
}

impl Dispatcher {
    pub fn new(
        discovery: Arc<DiscoveryCache>,
        remote: Arc<dyn RemoteAgent>,
        registry: Arc<RunRegistry>,
        tracker: RunTracker,
        events: Arc<EventBus>,
        clock: Arc<dyn Clock>,
        discovery_url: impl Into<String>,
    ) -> Self {
        Self {
            discovery,
            remote,
            registry,
            tracker,
            events,
            clock,
            discovery_url: discovery_url.into(),
        }
    }

    /// Submit `content` as request `request_id` and return the registered run.
    pub async fn submit(&self, request_id: &str, content: &str) -> Result<Run, RelayError> {
        // Held until the run is registered so a concurrent submit with the
        // same id is refused before it reaches the agent.
        let _claim = self.registry.reserve(request_id).await?;

        let endpoint_base = self.discovery.resolve_endpoint(&self.discovery_url).await?;

        let envelope = SendMessageRequest::user_text(content);
        let raw = self
            .remote
            .send_message(&endpoint_base, &envelope)
            .await
            .map_err(SubmissionError::Rejected)?;

        let task = Task::from_value(&raw).unwrap_or_default();
        let Some(task_id) = task.task_id() else {
            return Err(SubmissionError::MissingTaskId {
                body: raw.to_string(),
            }
            .into());
        };
        let state = task
            .state()
            .map(RunState::parse)
            .unwrap_or(RunState::Submitted);

        let run = Run::new(
            request_id,
            task_id,
            endpoint_base,
            state,
            content.chars().count(),
            raw,
            self.clock.now_ms(),
        );
        self.registry.create(run.clone()).await?;
        info!(task_id = %run.remote_task_id, state = %run.state, "task submitted");

        self.events.emit(Event::RunCreated {
            request_id: run.request_id.clone(),
            remote_task_id: run.remote_task_id.clone(),
        });
        if let Err(e) = self.tracker.track(request_id) {
            // An untracked run would sit in `submitted` forever.
            self.registry.delete(request_id).await;
            return Err(e.into());
        }

        Ok(run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_id_shape() {
        let id = new_request_id();
        let mut pieces = id.splitn(3, '_');
        assert_eq!(pieces.next(), Some("req"));
        assert!(pieces.next().unwrap().parse::<u64>().is_ok());
        let hex = pieces.next().unwrap();
        assert_eq!(hex.len(), 16);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn request_ids_are_distinct() {
        assert_ne!(new_request_id(), new_request_id());
    }
}
