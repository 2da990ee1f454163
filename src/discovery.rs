//! Agent-card discovery with a single-slot, time-boxed cache.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::consts::HTTP_JSON_TRANSPORT;
use crate::error::DiscoveryError;
use crate::remote::{AgentCard, RemoteAgent};

/// The last successful resolution. Replaced wholesale, never patched.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub resolved_at: Instant,
    pub discovery_url: String,
    pub endpoint_base: String,
}

pub struct DiscoveryCache {
    remote: Arc<dyn RemoteAgent>,
    freshness: Duration,
    slot: RwLock<Option<CacheEntry>>,
}

impl DiscoveryCache {
    pub fn new(remote: Arc<dyn RemoteAgent>, freshness: Duration) -> Self {
        Self {
            remote,
            freshness,
            slot: RwLock::new(None),
        }
    }

    /// The operational endpoint for the agent described at `discovery_url`.
    ///
    /// Served from the cache when the slot holds the same URL and is younger
    /// than the freshness window; otherwise the card is fetched again. A card
    /// without an `HTTP+JSON` interface is an error and leaves the slot alone.
    pub async fn resolve_endpoint(&self, discovery_url: &str) -> Result<String, DiscoveryError> {
        if let Some(hit) = self.fresh(discovery_url).await {
            debug!(endpoint = %hit, "endpoint cache hit");
            return Ok(hit);
        }

        let raw = self
            .remote
            .fetch_card(discovery_url)
            .await
            .map_err(DiscoveryError::Fetch)?;
        let card: AgentCard =
            serde_json::from_value(raw).map_err(|e| DiscoveryError::Malformed(e.to_string()))?;
        let endpoint_base = card.endpoint_for(HTTP_JSON_TRANSPORT).ok_or_else(|| {
            DiscoveryError::MissingInterface {
                url: discovery_url.to_string(),
            }
        })?;

        *self.slot.write().await = Some(CacheEntry {
            resolved_at: Instant::now(),
            discovery_url: discovery_url.to_string(),
            endpoint_base: endpoint_base.clone(),
        });
        info!(endpoint = %endpoint_base, "resolved HTTP+JSON endpoint");

        Ok(endpoint_base)
    }

    /// Current slot contents, fresh or not.
    pub async fn cached(&self) -> Option<CacheEntry> {
        self.slot.read().await.clone()
    }

    async fn fresh(&self, discovery_url: &str) -> Option<String> {
        let slot = self.slot.read().await;
        let entry = slot.as_ref()?;
        (entry.discovery_url == discovery_url && entry.resolved_at.elapsed() < self.freshness)
            .then(|| entry.endpoint_base.clone())
    }
}
