use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use tokio::sync::RwLock;

use crate::consts::MAX_LIST_LIMIT;
use crate::error::RelayError;
use crate::run::{Run, RunSummary};

/// Owns every run record. RwLock allows concurrent status reads while
/// pollers write; no lock is held across a remote call.
pub struct RunRegistry {
    runs: RwLock<HashMap<String, Run>>,
    /// Ids claimed by a submission that has not registered its run yet.
    pending: Mutex<HashSet<String>>,
}

/// Claim on a request id, held from the duplicate check until the run is
/// created. Dropping it frees the id.
#[must_use = "the id is released as soon as the reservation is dropped"]
pub struct Reservation<'a> {
    registry: &'a RunRegistry,
    request_id: String,
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        self.registry.pending().remove(&self.request_id);
    }
}

impl Default for RunRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RunRegistry {
    pub fn new() -> Self {
        Self {
            runs: RwLock::new(HashMap::new()),
            pending: Mutex::new(HashSet::new()),
        }
    }

    fn pending(&self) -> MutexGuard<'_, HashSet<String>> {
        self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Claim `request_id` for a submission in progress. Fails if a live run
    /// or another submission already holds it.
    pub async fn reserve(&self, request_id: &str) -> Result<Reservation<'_>, RelayError> {
        // The read guard keeps `create` out while both sets are checked.
        let runs = self.runs.read().await;
        let claimed = !runs.contains_key(request_id)
            && self.pending().insert(request_id.to_string());
        drop(runs);

        if !claimed {
            return Err(RelayError::DuplicateRequest(request_id.to_string()));
        }
        Ok(Reservation {
            registry: self,
            request_id: request_id.to_string(),
        })
    }

    /// Insert a fully built run. Fails if the request id is already live.
    pub async fn create(&self, run: Run) -> Result<(), RelayError> {
        let mut runs = self.runs.write().await;
        if runs.contains_key(&run.request_id) {
            return Err(RelayError::DuplicateRequest(run.request_id));
        }
        runs.insert(run.request_id.clone(), run);
        Ok(())
    }

    pub async fn contains(&self, request_id: &str) -> bool {
        self.runs.read().await.contains_key(request_id)
    }

    /// Snapshot of a run.
    pub async fn get(&self, request_id: &str) -> Option<Run> {
        self.runs.read().await.get(request_id).cloned()
    }

    /// Read part of a run without cloning the whole record.
    pub async fn inspect<R>(&self, request_id: &str, f: impl FnOnce(&Run) -> R) -> Option<R> {
        self.runs.read().await.get(request_id).map(f)
    }

    /// Most recent runs first, at most `limit` of them (clamped to
    /// `1..=MAX_LIST_LIMIT`).
    pub async fn list(&self, limit: usize) -> Vec<RunSummary> {
        let limit = limit.clamp(1, MAX_LIST_LIMIT);
        let runs = self.runs.read().await;
        let mut all: Vec<&Run> = runs.values().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        all.into_iter().take(limit).map(Run::summary).collect()
    }

    /// Apply `f` to a run in place. `None` when the run no longer exists,
    /// which callers treat as a no-op.
    pub async fn update<R>(&self, request_id: &str, f: impl FnOnce(&mut Run) -> R) -> Option<R> {
        self.runs.write().await.get_mut(request_id).map(f)
    }

    pub async fn delete(&self, request_id: &str) -> Option<Run> {
        self.runs.write().await.remove(request_id)
    }

    /// Remove every run matching `pred`, returning their ids.
    pub async fn remove_where(&self, mut pred: impl FnMut(&Run) -> bool) -> Vec<String> {
        let mut runs = self.runs.write().await;
        let doomed: Vec<String> = runs
            .values()
            .filter(|r| pred(r))
            .map(|r| r.request_id.clone())
            .collect();
        for id in &doomed {
            runs.remove(id);
        }
        doomed
    }

    pub async fn len(&self) -> usize {
        self.runs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.runs.read().await.is_empty()
    }
}
