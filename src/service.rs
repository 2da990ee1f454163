//! The caller-facing surface: create a run, read its status, list runs.
//!
//! [`Relay`] wires the core together once and is shared (behind an `Arc`) by
//! the HTTP layer and the CLI.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, info, info_span};

use crate::clock::{Clock, SystemClock};
use crate::config::{ConfigError, RelayConfig};
use crate::discovery::DiscoveryCache;
use crate::dispatcher::{Dispatcher, new_request_id};
use crate::error::RelayError;
use crate::events::{Event, EventBus};
use crate::policy::{PollPolicy, RetryForever};
use crate::reaper::Reaper;
use crate::registry::RunRegistry;
use crate::remote::RemoteAgent;
use crate::run::{RunState, RunSummary};
use crate::scheduler::Scheduler;
use crate::tracker::RunTracker;

/// Returned by create-run: enough to start polling for status.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunTicket {
    pub req_id: String,
    pub task_id: String,
    pub state: RunState,
    pub poll_every_ms: u64,
    pub created_at: u64,
}

/// Full view of one run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStatus {
    pub req_id: String,
    pub task_id: String,
    pub state: RunState,
    pub poll_every_ms: u64,
    pub poll_count: u64,
    pub created_at: u64,
    pub last_polled_at: Option<u64>,
    pub completed_at: Option<u64>,
    pub reply: String,
    pub parts_text: String,
    pub raw: Option<Value>,
    pub last_error: Option<String>,
    /// Whether a poll schedule is still live for this run.
    pub polling: bool,
    pub debug: StatusDebug,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusDebug {
    pub req_id: String,
    pub total_ms: u64,
}

pub struct Relay {
    config: RelayConfig,
    registry: Arc<RunRegistry>,
    discovery: Arc<DiscoveryCache>,
    dispatcher: Dispatcher,
    tracker: RunTracker,
    events: Arc<EventBus>,
    clock: Arc<dyn Clock>,
    shutdown: CancellationToken,
}

impl Relay {
    pub fn new(config: RelayConfig, remote: Arc<dyn RemoteAgent>) -> Result<Self, ConfigError> {
        Self::with_policy(config, remote, Arc::new(RetryForever))
    }

    pub fn with_policy(
        config: RelayConfig,
        remote: Arc<dyn RemoteAgent>,
        policy: Arc<dyn PollPolicy>,
    ) -> Result<Self, ConfigError> {
        Self::with_clock(config, remote, policy, Arc::new(SystemClock))
    }

    /// Fully specified constructor. Fails if `config` does not validate;
    /// nothing is spawned in that case.
    pub fn with_clock(
        config: RelayConfig,
        remote: Arc<dyn RemoteAgent>,
        policy: Arc<dyn PollPolicy>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let registry = Arc::new(RunRegistry::new());
        let events = Arc::new(EventBus::default());
        let discovery = Arc::new(DiscoveryCache::new(
            Arc::clone(&remote),
            config.discovery_ttl,
        ));
        let tracker = RunTracker::new(
            Arc::clone(&registry),
            Arc::clone(&remote),
            policy,
            Arc::clone(&events),
            Arc::clone(&clock),
            Scheduler::new(),
            config.poll_interval,
        );
        let dispatcher = Dispatcher::new(
            Arc::clone(&discovery),
            remote,
            Arc::clone(&registry),
            tracker.clone(),
            Arc::clone(&events),
            Arc::clone(&clock),
            config.card_url.clone(),
        );

        Ok(Self {
            config,
            registry,
            discovery,
            dispatcher,
            tracker,
            events,
            clock,
            shutdown: CancellationToken::new(),
        })
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    fn poll_every_ms(&self) -> u64 {
        self.tracker.interval().as_millis() as u64
    }

    /// Submit `content` and start tracking it. Returns as soon as the agent
    /// accepted the task; the first poll is already under way.
    pub async fn create_run(
        &self,
        request_id: Option<String>,
        content: &str,
    ) -> Result<RunTicket, RelayError> {
        let request_id = request_id.unwrap_or_else(new_request_id);
        let content = content.trim();
        if content.is_empty() {
            return Err(RelayError::EmptyContent);
        }

        let span = info_span!("chat", request_id = %request_id);
        async {
            info!(text_len = content.chars().count(), "create-run");
            let run = self.dispatcher.submit(&request_id, content).await?;
            Ok::<_, RelayError>(RunTicket {
                req_id: run.request_id,
                task_id: run.remote_task_id,
                state: run.state,
                poll_every_ms: self.poll_every_ms(),
                created_at: run.created_at,
            })
        }
        .instrument(span)
        .await
    }

    /// Current view of a run. `include_raw` controls whether the last raw
    /// payload is attached.
    pub async fn get_status(
        &self,
        request_id: &str,
        include_raw: bool,
    ) -> Result<RunStatus, RelayError> {
        let run = self
            .registry
            .get(request_id)
            .await
            .ok_or_else(|| RelayError::NotFound(request_id.to_string()))?;

        Ok(RunStatus {
            polling: self.tracker.is_tracking(request_id),
            poll_every_ms: self.poll_every_ms(),
            debug: StatusDebug {
                req_id: run.request_id.clone(),
                total_ms: self.clock.now_ms().saturating_sub(run.created_at),
            },
            req_id: run.request_id,
            task_id: run.remote_task_id,
            state: run.state,
            poll_count: run.poll_count,
            created_at: run.created_at,
            last_polled_at: run.last_polled_at,
            completed_at: run.completed_at,
            reply: run.last_reply_text,
            parts_text: run.last_parts_text,
            raw: include_raw.then_some(run.last_raw_payload),
            last_error: run.last_error,
        })
    }

    /// Most recent runs first, at most `limit` (clamped).
    pub async fn list_runs(&self, limit: usize) -> Vec<RunSummary> {
        self.registry.list(limit).await
    }

    /// Resolve the agent's operational endpoint, through the cache.
    pub async fn resolve_endpoint(&self) -> Result<String, RelayError> {
        Ok(self
            .discovery
            .resolve_endpoint(&self.config.card_url)
            .await?)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    fn reaper(&self) -> Reaper {
        Reaper::new(
            Arc::clone(&self.registry),
            self.tracker.clone(),
            Arc::clone(&self.events),
            Arc::clone(&self.clock),
            self.config.run_retention,
            self.config.reap_interval,
        )
    }

    /// Evict runs that finished more than the retention window before `now_ms`.
    pub async fn reap_expired(&self, now_ms: u64) -> Vec<String> {
        self.reaper().sweep_at(now_ms).await
    }

    /// Start the periodic reaper. It stops on [`Relay::shutdown`].
    pub fn spawn_reaper(&self) -> JoinHandle<()> {
        tokio::spawn(self.reaper().run(self.shutdown.child_token()))
    }

    /// Stop the reaper and every poll schedule; in-flight polls complete.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        self.tracker.shutdown().await;
        info!("relay stopped");
    }
}
