//! Worker roster - owns worker records and validates state transitions.

use foreman_core::{
    ContractId, CoordinationError, Result, TransitionRecord, Worker, WorkerId, WorkerState,
};
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::debug;

/// In-memory store of workers, their states, and the transition trail.
///
/// `transition` is the only validated mutating entry point; every state
/// change (validated or fail-safe) appends an immutable
/// [`TransitionRecord`].
pub struct WorkerRoster {
    inner: Mutex<RosterInner>,
}

struct RosterInner {
    workers: HashMap<WorkerId, Worker>,
    /// Registration order, for deterministic snapshots and tick sweeps.
    order: Vec<WorkerId>,
    history: Vec<TransitionRecord>,
}

impl WorkerRoster {
    /// Create an empty roster.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(RosterInner {
                workers: HashMap::new(),
                order: Vec::new(),
                history: Vec::new(),
            }),
        }
    }

    /// Register a worker. Re-registering an existing ID is a no-op:
    /// workers come from a fixed identity pool and are never replaced.
    pub async fn register(&self, worker: Worker) {
        let mut inner = self.inner.lock().await;
        if inner.workers.contains_key(&worker.id) {
            return;
        }
        inner.order.push(worker.id.clone());
        inner.workers.insert(worker.id.clone(), worker);
    }

    /// Look up a worker.
    pub async fn get(&self, id: &WorkerId) -> Result<Worker> {
        self.inner
            .lock()
            .await
            .workers
            .get(id)
            .cloned()
            .ok_or_else(|| CoordinationError::WorkerNotFound(id.clone()))
    }

    /// Worker IDs in registration order.
    pub async fn worker_ids(&self) -> Vec<WorkerId> {
        self.inner.lock().await.order.clone()
    }

    /// Snapshot of every worker, in registration order.
    pub async fn snapshot(&self) -> Vec<Worker> {
        let inner = self.inner.lock().await;
        inner
            .order
            .iter()
            .filter_map(|id| inner.workers.get(id))
            .cloned()
            .collect()
    }

    /// Request a transition to `target`, validated against the edge table.
    ///
    /// On an edge that is not in the table the worker is left unchanged
    /// and `InvalidTransition` is returned.
    pub async fn transition(
        &self,
        id: &WorkerId,
        target: WorkerState,
        reason: &str,
    ) -> Result<Worker> {
        let updated = {
            let mut inner = self.inner.lock().await;
            let worker = inner
                .workers
                .get_mut(id)
                .ok_or_else(|| CoordinationError::WorkerNotFound(id.clone()))?;

            let from = worker.state;
            if !from.can_transition_to(target) {
                return Err(CoordinationError::InvalidTransition {
                    worker: id.clone(),
                    from,
                    to: target,
                });
            }

            worker.state = target;
            worker.last_activity = chrono::Utc::now();
            let snapshot = worker.clone();
            inner
                .history
                .push(TransitionRecord::new(id.clone(), from, target, reason));
            snapshot
        };

        debug!(worker = %id, to = %target, reason, "worker transitioned");
        Ok(updated)
    }

    /// Fail-safe: force a worker into `Error` regardless of its state.
    ///
    /// The one edge that bypasses the transition table. Recovery is the
    /// validated `Error -> Idle` edge on a later tick. The worker's
    /// contract reference is dropped; the contract itself stays claimed
    /// in the registry for audit.
    pub async fn force_error(&self, id: &WorkerId, reason: &str) -> Result<Worker> {
        let updated = {
            let mut inner = self.inner.lock().await;
            let worker = inner
                .workers
                .get_mut(id)
                .ok_or_else(|| CoordinationError::WorkerNotFound(id.clone()))?;

            let from = worker.state;
            if from == WorkerState::Error {
                return Ok(worker.clone());
            }

            worker.state = WorkerState::Error;
            worker.current_contract = None;
            worker.last_activity = chrono::Utc::now();
            let snapshot = worker.clone();
            inner.history.push(TransitionRecord::new(
                id.clone(),
                from,
                WorkerState::Error,
                reason,
            ));
            snapshot
        };

        debug!(worker = %id, reason, "worker forced into error state");
        Ok(updated)
    }

    /// Point a worker's lookup reference at the contract it just claimed.
    pub async fn bind_contract(&self, id: &WorkerId, contract: &ContractId) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let worker = inner
            .workers
            .get_mut(id)
            .ok_or_else(|| CoordinationError::WorkerNotFound(id.clone()))?;
        worker.current_contract = Some(contract.clone());
        Ok(())
    }

    /// Record a completion: validated `InProgress -> Completed` plus the
    /// counter updates, in one critical section.
    ///
    /// The contract reference is retained until the next assignment so a
    /// late repeat completion can still be resolved (and rejected)
    /// against the registry.
    pub async fn finish(&self, id: &WorkerId, reward: u64, reason: &str) -> Result<Worker> {
        let updated = {
            let mut inner = self.inner.lock().await;
            let worker = inner
                .workers
                .get_mut(id)
                .ok_or_else(|| CoordinationError::WorkerNotFound(id.clone()))?;

            let from = worker.state;
            if !from.can_transition_to(WorkerState::Completed) {
                return Err(CoordinationError::InvalidTransition {
                    worker: id.clone(),
                    from,
                    to: WorkerState::Completed,
                });
            }

            worker.state = WorkerState::Completed;
            worker.contracts_completed += 1;
            worker.total_reward += reward;
            worker.last_activity = chrono::Utc::now();
            let snapshot = worker.clone();
            inner.history.push(TransitionRecord::new(
                id.clone(),
                from,
                WorkerState::Completed,
                reason,
            ));
            snapshot
        };

        debug!(worker = %id, reward, "worker completed contract");
        Ok(updated)
    }

    /// The transition trail, oldest first.
    pub async fn history(&self) -> Vec<TransitionRecord> {
        self.inner.lock().await.history.clone()
    }
}

impl Default for WorkerRoster {
    fn default() -> Self {
        Self::new()
    }
}
