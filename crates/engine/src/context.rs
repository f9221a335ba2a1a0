//! Coordination context - the owned composition root.
//!
//! One explicitly constructed object owns the registry, the roster, the
//! assignment policy, the work driver, and the action log. It is built
//! once at start-up and shared (via `Arc`) by the scheduler loop and the
//! control API; there is no ambient global state.

use crate::driver::{TimedWorkDriver, WorkDriver, WorkHandle};
use crate::policy::{AssignmentPolicy, FifoPolicy};
use crate::registry::ContractRegistry;
use crate::roster::WorkerRoster;
use crate::seed::Seed;
use foreman_core::{
    ActionEntry, Contract, ContractId, CoordinationError, Result, SchedulerConfig, Worker,
    WorkerId, WorkerState,
};
use std::collections::{HashMap, VecDeque};
use tokio::sync::Mutex;
use tracing::warn;

/// Owns all coordination state and composes the per-operation flows
/// shared by the scheduler loop and the manual control API.
pub struct CoordinationContext {
    config: SchedulerConfig,
    registry: ContractRegistry,
    roster: WorkerRoster,
    policy: Box<dyn AssignmentPolicy>,
    driver: Box<dyn WorkDriver>,
    handles: Mutex<HashMap<WorkerId, WorkHandle>>,
    actions: Mutex<ActionLog>,
}

impl CoordinationContext {
    /// Create an empty context with the FIFO policy and the timed
    /// placeholder driver.
    pub fn new(config: SchedulerConfig) -> Self {
        let driver = TimedWorkDriver::new(config.work_duration);
        let capacity = config.action_log_capacity;
        Self {
            config,
            registry: ContractRegistry::new(),
            roster: WorkerRoster::new(),
            policy: Box::new(FifoPolicy::new()),
            driver: Box::new(driver),
            handles: Mutex::new(HashMap::new()),
            actions: Mutex::new(ActionLog::new(capacity)),
        }
    }

    /// Create a context and register the seed's contracts and workers.
    pub async fn from_seed(seed: &Seed, config: SchedulerConfig) -> Self {
        let ctx = Self::new(config);
        for contract in seed.contracts() {
            if let Err(err) = ctx.registry.register(contract).await {
                warn!(error = %err, "skipping seed contract");
            }
        }
        for worker in seed.workers() {
            ctx.roster.register(worker).await;
        }
        ctx
    }

    /// Swap the assignment policy.
    pub fn with_policy(mut self, policy: Box<dyn AssignmentPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Swap the work driver.
    pub fn with_driver(mut self, driver: Box<dyn WorkDriver>) -> Self {
        self.driver = driver;
        self
    }

    /// Engine configuration.
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// The contract registry.
    pub fn registry(&self) -> &ContractRegistry {
        &self.registry
    }

    /// The worker roster.
    pub fn roster(&self) -> &WorkerRoster {
        &self.roster
    }

    /// The contract the policy would hand out next, without claiming it.
    pub async fn peek_next(&self) -> Option<Contract> {
        let available = self.registry.list_available().await;
        self.policy.select(&available).cloned()
    }

    /// Assign the next available contract to a worker: list, select,
    /// claim, transition to `Claimed`.
    ///
    /// Returns `NoContractAvailable` on an empty queue; a lost claim
    /// race surfaces as `ContractNotAvailable` and is not retried here.
    pub async fn assign(&self, id: &WorkerId) -> Result<Contract> {
        let worker = self.roster.get(id).await?;
        // Claiming from a state that cannot accept a contract would
        // strand the claim, so the edge is checked up front.
        if !worker.state.can_transition_to(WorkerState::Claimed) {
            return Err(CoordinationError::InvalidTransition {
                worker: id.clone(),
                from: worker.state,
                to: WorkerState::Claimed,
            });
        }

        let available = self.registry.list_available().await;
        let selected = self
            .policy
            .select(&available)
            .cloned()
            .ok_or(CoordinationError::NoContractAvailable)?;

        self.claim_and_bind(id, &selected.id).await
    }

    /// Claim a specific contract for a worker (the manual path).
    pub async fn claim_contract(&self, id: &WorkerId, contract: &ContractId) -> Result<Contract> {
        let worker = self.roster.get(id).await?;
        if !worker.state.can_transition_to(WorkerState::Claimed) {
            return Err(CoordinationError::InvalidTransition {
                worker: id.clone(),
                from: worker.state,
                to: WorkerState::Claimed,
            });
        }

        self.claim_and_bind(id, contract).await
    }

    /// Shared tail of both claim paths: registry claim, then the
    /// `-> Claimed` transition, then the lookup reference.
    async fn claim_and_bind(&self, id: &WorkerId, contract: &ContractId) -> Result<Contract> {
        let claimed = self.registry.claim(contract, id).await?;

        if let Err(err) = self
            .roster
            .transition(id, WorkerState::Claimed, &format!("claimed {contract}"))
            .await
        {
            // The claim landed but the worker moved under us; the
            // contract stays claimed in the registry for audit.
            warn!(worker = %id, contract = %contract, error = %err, "claim stranded");
            return Err(err);
        }
        self.roster.bind_contract(id, contract).await?;

        Ok(claimed)
    }

    /// Start work on the claimed contract: transition to `InProgress`
    /// and hand the contract to the work driver.
    pub async fn start_work(&self, id: &WorkerId) -> Result<Contract> {
        let worker = self.roster.get(id).await?;
        let contract_id = worker.current_contract.clone().ok_or_else(|| {
            CoordinationError::InvalidTransition {
                worker: id.clone(),
                from: worker.state,
                to: WorkerState::InProgress,
            }
        })?;
        let contract = self
            .registry
            .get(&contract_id)
            .await
            .ok_or_else(|| CoordinationError::ContractNotAvailable(contract_id.clone()))?;

        self.roster
            .transition(id, WorkerState::InProgress, &format!("started {contract_id}"))
            .await?;

        let handle = self.driver.begin(&contract).await;
        self.handles.lock().await.insert(id.clone(), handle);

        Ok(contract)
    }

    /// Whether the worker's in-flight work has finished.
    pub async fn work_done(&self, id: &WorkerId) -> Result<bool> {
        let handle = self.handles.lock().await.get(id).copied();
        match handle {
            Some(handle) => Ok(self.driver.poll(&handle).await),
            None => {
                // No handle on record (e.g. the driver was swapped while
                // work was in flight): re-arm and report not done.
                let worker = self.roster.get(id).await?;
                let contract_id = worker.current_contract.clone().ok_or_else(|| {
                    CoordinationError::InvalidTransition {
                        worker: id.clone(),
                        from: worker.state,
                        to: WorkerState::Completed,
                    }
                })?;
                let contract = self
                    .registry
                    .get(&contract_id)
                    .await
                    .ok_or_else(|| CoordinationError::ContractNotAvailable(contract_id))?;
                let handle = self.driver.begin(&contract).await;
                self.handles.lock().await.insert(id.clone(), handle);
                Ok(false)
            }
        }
    }

    /// Complete the worker's contract: registry completion first (the
    /// idempotence check), then the `-> Completed` transition with the
    /// counter updates.
    pub async fn complete(&self, id: &WorkerId) -> Result<(Contract, Worker)> {
        let worker = self.roster.get(id).await?;
        let contract_id = worker.current_contract.clone().ok_or_else(|| {
            CoordinationError::InvalidTransition {
                worker: id.clone(),
                from: worker.state,
                to: WorkerState::Completed,
            }
        })?;
        // Completion requires started work; a merely claimed contract
        // cannot complete.
        if worker.state == WorkerState::Claimed {
            return Err(CoordinationError::InvalidTransition {
                worker: id.clone(),
                from: worker.state,
                to: WorkerState::Completed,
            });
        }

        let contract = self.registry.complete(&contract_id, id).await?;
        let worker = self
            .roster
            .finish(id, contract.reward, &format!("completed {contract_id}"))
            .await?;

        if let Some(handle) = self.handles.lock().await.remove(id) {
            self.driver.finish(&handle).await;
        }

        Ok((contract, worker))
    }

    /// Fail-safe: force a worker into `Error` and drop its work handle.
    pub async fn force_error(&self, id: &WorkerId, reason: &str) -> Result<Worker> {
        let worker = self.roster.force_error(id, reason).await?;
        if let Some(handle) = self.handles.lock().await.remove(id) {
            self.driver.finish(&handle).await;
        }
        Ok(worker)
    }

    /// Append an entry to the rolling action log.
    pub async fn record_action(&self, entry: ActionEntry) {
        self.actions.lock().await.record(entry);
    }

    /// The rolling action log, oldest first.
    pub async fn actions(&self) -> Vec<ActionEntry> {
        self.actions.lock().await.entries()
    }
}

/// Bounded ring of action entries; the oldest entry is dropped first.
struct ActionLog {
    entries: VecDeque<ActionEntry>,
    capacity: usize,
}

impl ActionLog {
    fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(64)),
            capacity: capacity.max(1),
        }
    }

    fn record(&mut self, entry: ActionEntry) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    fn entries(&self) -> Vec<ActionEntry> {
        self.entries.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use foreman_core::{Contract, Difficulty, Worker};

    fn contract(id: &str, reward: u64) -> Contract {
        Contract::new(id, format!("contract {id}"), Difficulty::Medium, 30, reward)
    }

    async fn context_with(contracts: &[&str], workers: &[&str]) -> CoordinationContext {
        let ctx = CoordinationContext::new(SchedulerConfig::default());
        for id in contracts {
            ctx.registry().register(contract(id, 100)).await.unwrap();
        }
        for id in workers {
            ctx.roster().register(Worker::new(*id, "crew")).await;
        }
        ctx
    }

    #[tokio::test]
    async fn assignment_is_fifo_fair() {
        let ctx = context_with(&["A", "B", "C"], &["W1", "W2", "W3"]).await;

        for (worker, expected) in [("W1", "A"), ("W2", "B"), ("W3", "C")] {
            let claimed = ctx.assign(&worker.into()).await.unwrap();
            assert_eq!(claimed.id.as_str(), expected, "worker {worker}");
        }
    }

    #[tokio::test]
    async fn assign_reports_an_empty_queue() {
        let ctx = context_with(&[], &["W1"]).await;
        let err = ctx.assign(&"W1".into()).await.unwrap_err();
        assert_eq!(err, CoordinationError::NoContractAvailable);
    }

    #[tokio::test]
    async fn assign_binds_the_contract_reference() {
        let ctx = context_with(&["A"], &["W1"]).await;
        ctx.assign(&"W1".into()).await.unwrap();

        let worker = ctx.roster().get(&"W1".into()).await.unwrap();
        assert_eq!(worker.state, WorkerState::Claimed);
        assert_eq!(worker.current_contract, Some("A".into()));
    }

    #[tokio::test]
    async fn assign_to_a_busy_worker_is_rejected() {
        let ctx = context_with(&["A", "B"], &["W1"]).await;
        ctx.assign(&"W1".into()).await.unwrap();

        let err = ctx.assign(&"W1".into()).await.unwrap_err();
        assert!(matches!(err, CoordinationError::InvalidTransition { .. }));

        // The second contract was not stranded by the rejected assign.
        let b = ctx.registry().get(&"B".into()).await.unwrap();
        assert_eq!(b.status, foreman_core::ContractStatus::Available);
    }

    #[tokio::test]
    async fn manual_claim_loses_races_without_retry() {
        let ctx = context_with(&["A"], &["W1", "W2"]).await;
        ctx.claim_contract(&"W1".into(), &"A".into()).await.unwrap();

        let err = ctx
            .claim_contract(&"W2".into(), &"A".into())
            .await
            .unwrap_err();
        assert_eq!(err, CoordinationError::ContractNotAvailable("A".into()));

        // The loser stays idle and claimable.
        let w2 = ctx.roster().get(&"W2".into()).await.unwrap();
        assert_eq!(w2.state, WorkerState::Idle);
    }

    #[tokio::test]
    async fn completion_flow_pays_the_reward() {
        let ctx = context_with(&["A"], &["W1"]).await;
        ctx.assign(&"W1".into()).await.unwrap();
        ctx.start_work(&"W1".into()).await.unwrap();

        let (contract, worker) = ctx.complete(&"W1".into()).await.unwrap();
        assert_eq!(contract.reward, 100);
        assert_eq!(worker.state, WorkerState::Completed);
        assert_eq!(worker.total_reward, 100);
        assert_eq!(worker.contracts_completed, 1);
    }

    #[tokio::test]
    async fn completing_twice_fails_ownership_mismatch() {
        let ctx = context_with(&["A"], &["W1"]).await;
        ctx.assign(&"W1".into()).await.unwrap();
        ctx.start_work(&"W1".into()).await.unwrap();
        ctx.complete(&"W1".into()).await.unwrap();

        let err = ctx.complete(&"W1".into()).await.unwrap_err();
        assert_eq!(
            err,
            CoordinationError::OwnershipMismatch {
                contract: "A".into(),
                worker: "W1".into(),
            }
        );
    }

    #[tokio::test]
    async fn completing_before_starting_is_rejected() {
        let ctx = context_with(&["A"], &["W1"]).await;
        ctx.assign(&"W1".into()).await.unwrap();

        let err = ctx.complete(&"W1".into()).await.unwrap_err();
        assert!(matches!(err, CoordinationError::InvalidTransition { .. }));

        // The contract is still merely claimed.
        let a = ctx.registry().get(&"A".into()).await.unwrap();
        assert_eq!(a.status, foreman_core::ContractStatus::Claimed);
    }

    #[tokio::test]
    async fn action_log_is_bounded() {
        let config = SchedulerConfig::default().with_action_log_capacity(2);
        let ctx = CoordinationContext::new(config);

        for n in 0..3 {
            ctx.record_action(ActionEntry::new(
                "W1".into(),
                format!("action-{n}"),
                None,
                "ok",
            ))
            .await;
        }

        let actions = ctx.actions().await;
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0].action, "action-1");
        assert_eq!(actions[1].action, "action-2");
    }
}
