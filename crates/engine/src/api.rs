//! Control API - the manual surface over the coordination context.
//!
//! Consumed by the CLI and other external callers. Every operation here
//! forces the same registry/roster flows the scheduler loop drives
//! automatically, serialized through the same locks, and records an
//! entry in the rolling action log.

use crate::context::CoordinationContext;
use crate::scheduler::{Scheduler, SchedulerHandle};
use foreman_core::{
    ActionEntry, Contract, ContractId, Result, TransitionRecord, Worker, WorkerId,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

/// Status string: a contract was found for the worker.
pub const TASK_FOUND: &str = "task_found";
/// Status string: the queue is empty.
pub const NO_TASKS_AVAILABLE: &str = "no_tasks_available";
/// Status string: the claim succeeded.
pub const CONTRACT_CLAIMED: &str = "contract_claimed";
/// Status string: the claim was rejected or lost a race.
pub const CLAIM_FAILED: &str = "claim_failed";
/// Status string: work started.
pub const WORK_STARTED: &str = "work_started";
/// Status string: work could not start.
pub const WORK_START_FAILED: &str = "work_start_failed";
/// Status string: the contract completed.
pub const CONTRACT_COMPLETED: &str = "contract_completed";
/// Status string: the completion was rejected.
pub const COMPLETE_FAILED: &str = "complete_failed";

/// Response to `get_next_task`.
#[derive(Debug, Clone, Serialize)]
pub struct NextTaskResponse {
    /// `task_found` or `no_tasks_available`
    pub status: String,
    /// The contract the policy would hand out next
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contract: Option<Contract>,
}

/// Response to `claim_contract`.
#[derive(Debug, Clone, Serialize)]
pub struct ClaimResponse {
    /// `contract_claimed`
    pub status: String,
    /// The claimed contract
    pub contract: Contract,
}

/// Response to `start_work`.
#[derive(Debug, Clone, Serialize)]
pub struct StartWorkResponse {
    /// `work_started`
    pub status: String,
    /// The contract being worked
    pub contract_id: ContractId,
}

/// Response to `complete_contract`.
#[derive(Debug, Clone, Serialize)]
pub struct CompleteResponse {
    /// `contract_completed`
    pub status: String,
    /// The completed contract
    pub contract_id: ContractId,
    /// Reward for this contract
    pub reward_earned: u64,
    /// Worker's cumulative reward
    pub total_reward: u64,
}

/// Response to `get_status`.
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    /// Every worker, in registration order
    pub workers: Vec<Worker>,
    /// Every contract, in registration order
    pub contracts: Vec<Contract>,
    /// Aggregate counts
    pub totals: StatusTotals,
}

/// Aggregate counts for `get_status`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StatusTotals {
    /// Contracts still available
    pub contracts_available: usize,
    /// Contracts currently claimed
    pub contracts_claimed: usize,
    /// Contracts completed
    pub contracts_completed: usize,
    /// Completions summed over all workers
    pub completions: u64,
    /// Reward paid out over all workers
    pub reward_distributed: u64,
}

/// Response to `start_loop` / `stop_loop`.
#[derive(Debug, Clone, Serialize)]
pub struct LoopResponse {
    /// `workflow_started`, `workflow_already_running`,
    /// `workflow_stopped`, or `no_active_workflow`
    pub status: String,
    /// Ticks the loop ran (set by `stop_loop`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticks: Option<usize>,
}

/// Manual control surface over a shared [`CoordinationContext`].
pub struct ControlApi {
    ctx: Arc<CoordinationContext>,
    loop_handle: Mutex<Option<SchedulerHandle>>,
}

impl ControlApi {
    /// Create the API over a shared context.
    pub fn new(ctx: Arc<CoordinationContext>) -> Self {
        Self {
            ctx,
            loop_handle: Mutex::new(None),
        }
    }

    /// The underlying context.
    pub fn context(&self) -> &Arc<CoordinationContext> {
        &self.ctx
    }

    /// Peek at the contract the worker would be handed next. Does not
    /// claim; the caller follows up with `claim_contract`.
    pub async fn get_next_task(&self, worker_id: &WorkerId) -> Result<NextTaskResponse> {
        self.ctx.roster().get(worker_id).await?;

        let contract = self.ctx.peek_next().await;
        let (status, contract_id) = match &contract {
            Some(c) => (TASK_FOUND, Some(c.id.clone())),
            None => (NO_TASKS_AVAILABLE, None),
        };
        self.record(worker_id, "get_next_task", contract_id, status)
            .await;

        Ok(NextTaskResponse {
            status: status.to_string(),
            contract,
        })
    }

    /// Claim a specific contract for a worker.
    pub async fn claim_contract(
        &self,
        worker_id: &WorkerId,
        contract_id: &ContractId,
    ) -> Result<ClaimResponse> {
        match self.ctx.claim_contract(worker_id, contract_id).await {
            Ok(contract) => {
                self.record(
                    worker_id,
                    "claim_contract",
                    Some(contract_id.clone()),
                    CONTRACT_CLAIMED,
                )
                .await;
                Ok(ClaimResponse {
                    status: CONTRACT_CLAIMED.to_string(),
                    contract,
                })
            }
            Err(err) => {
                self.record(
                    worker_id,
                    "claim_contract",
                    Some(contract_id.clone()),
                    CLAIM_FAILED,
                )
                .await;
                Err(err)
            }
        }
    }

    /// Start work on the worker's claimed contract.
    pub async fn start_work(&self, worker_id: &WorkerId) -> Result<StartWorkResponse> {
        match self.ctx.start_work(worker_id).await {
            Ok(contract) => {
                self.record(worker_id, "start_work", Some(contract.id.clone()), WORK_STARTED)
                    .await;
                Ok(StartWorkResponse {
                    status: WORK_STARTED.to_string(),
                    contract_id: contract.id,
                })
            }
            Err(err) => {
                self.record(worker_id, "start_work", None, WORK_START_FAILED)
                    .await;
                Err(err)
            }
        }
    }

    /// Complete the worker's contract and credit the reward.
    pub async fn complete_contract(&self, worker_id: &WorkerId) -> Result<CompleteResponse> {
        match self.ctx.complete(worker_id).await {
            Ok((contract, worker)) => {
                self.record(
                    worker_id,
                    "complete_contract",
                    Some(contract.id.clone()),
                    CONTRACT_COMPLETED,
                )
                .await;
                Ok(CompleteResponse {
                    status: CONTRACT_COMPLETED.to_string(),
                    contract_id: contract.id,
                    reward_earned: contract.reward,
                    total_reward: worker.total_reward,
                })
            }
            Err(err) => {
                self.record(worker_id, "complete_contract", None, COMPLETE_FAILED)
                    .await;
                Err(err)
            }
        }
    }

    /// Per-worker state, per-contract status, and the aggregate totals.
    pub async fn get_status(&self) -> StatusResponse {
        let workers = self.ctx.roster().snapshot().await;
        let contracts = self.ctx.registry().snapshot().await;

        let mut totals = StatusTotals::default();
        for contract in &contracts {
            match contract.status {
                foreman_core::ContractStatus::Available => totals.contracts_available += 1,
                foreman_core::ContractStatus::Claimed => totals.contracts_claimed += 1,
                foreman_core::ContractStatus::Completed => totals.contracts_completed += 1,
            }
        }
        for worker in &workers {
            totals.completions += worker.contracts_completed;
            totals.reward_distributed += worker.total_reward;
        }

        StatusResponse {
            workers,
            contracts,
            totals,
        }
    }

    /// Start the scheduler loop, if it is not already running.
    pub async fn start_loop(&self) -> LoopResponse {
        let mut slot = self.loop_handle.lock().await;
        if let Some(handle) = slot.as_ref() {
            if !handle.is_finished() {
                return LoopResponse {
                    status: "workflow_already_running".to_string(),
                    ticks: None,
                };
            }
        }

        info!("starting scheduler loop");
        *slot = Some(Scheduler::new(self.ctx.clone()).start());
        LoopResponse {
            status: "workflow_started".to_string(),
            ticks: None,
        }
    }

    /// Stop the scheduler loop after its in-flight tick, if one is
    /// running.
    pub async fn stop_loop(&self) -> LoopResponse {
        let handle = self.loop_handle.lock().await.take();
        match handle {
            Some(handle) => {
                let ticks = handle.stop().await;
                info!(ticks, "scheduler loop stopped");
                LoopResponse {
                    status: "workflow_stopped".to_string(),
                    ticks: Some(ticks),
                }
            }
            None => LoopResponse {
                status: "no_active_workflow".to_string(),
                ticks: None,
            },
        }
    }

    /// The transition trail, oldest first.
    pub async fn history(&self) -> Vec<TransitionRecord> {
        self.ctx.roster().history().await
    }

    /// The rolling action log, oldest first.
    pub async fn actions(&self) -> Vec<ActionEntry> {
        self.ctx.actions().await
    }

    async fn record(
        &self,
        worker_id: &WorkerId,
        action: &str,
        contract_id: Option<ContractId>,
        outcome: &str,
    ) {
        self.ctx
            .record_action(ActionEntry::new(
                worker_id.clone(),
                action,
                contract_id,
                outcome,
            ))
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::Scheduler;
    use foreman_core::{
        Contract, ContractStatus, CoordinationError, Difficulty, SchedulerConfig, Worker,
        WorkerState,
    };
    use std::time::Duration;

    async fn api_with(contracts: &[(&str, u64)], workers: &[&str]) -> ControlApi {
        let config = SchedulerConfig::default()
            .with_tick_interval(Duration::from_millis(100))
            .with_work_duration(Duration::from_secs(3));
        let ctx = CoordinationContext::new(config);
        for (id, reward) in contracts {
            ctx.registry()
                .register(Contract::new(
                    *id,
                    format!("contract {id}"),
                    Difficulty::Medium,
                    30,
                    *reward,
                ))
                .await
                .unwrap();
        }
        for id in workers {
            ctx.roster().register(Worker::new(*id, "crew")).await;
        }
        ControlApi::new(Arc::new(ctx))
    }

    #[tokio::test(start_paused = true)]
    async fn the_coordination_scenario_end_to_end() {
        let api = api_with(&[("COORD-001", 150)], &["W7"]).await;
        let w7: WorkerId = "W7".into();

        // The idle worker asks for work and is offered COORD-001.
        let next = api.get_next_task(&w7).await.unwrap();
        assert_eq!(next.status, TASK_FOUND);
        assert_eq!(next.contract.unwrap().id.as_str(), "COORD-001");

        // Claiming moves the contract and the worker together.
        let claim = api.claim_contract(&w7, &"COORD-001".into()).await.unwrap();
        assert_eq!(claim.status, CONTRACT_CLAIMED);
        assert_eq!(claim.contract.status, ContractStatus::Claimed);
        assert_eq!(
            api.context().roster().get(&w7).await.unwrap().state,
            WorkerState::Claimed
        );

        let started = api.start_work(&w7).await.unwrap();
        assert_eq!(started.status, WORK_STARTED);
        assert_eq!(
            api.context().roster().get(&w7).await.unwrap().state,
            WorkerState::InProgress
        );

        // After the configured duration a tick auto-drives the worker
        // through COMPLETED.
        tokio::time::advance(Duration::from_secs(3)).await;
        let mut scheduler = Scheduler::new(api.context().clone());
        let summary = scheduler.tick().await;
        assert_eq!(summary.completed, 1);

        let status = api.get_status().await;
        assert_eq!(status.totals.contracts_completed, 1);
        assert_eq!(status.totals.reward_distributed, 150);
        assert_eq!(status.workers[0].total_reward, 150);

        // A repeat completion is rejected: the contract is no longer
        // held in CLAIMED status by anyone.
        let err = api.complete_contract(&w7).await.unwrap_err();
        assert_eq!(
            err,
            CoordinationError::OwnershipMismatch {
                contract: "COORD-001".into(),
                worker: w7.clone(),
            }
        );
    }

    #[tokio::test]
    async fn manual_completion_reports_the_reward() {
        let api = api_with(&[("C-1", 150)], &["W1"]).await;
        let w1: WorkerId = "W1".into();

        api.claim_contract(&w1, &"C-1".into()).await.unwrap();
        api.start_work(&w1).await.unwrap();

        let done = api.complete_contract(&w1).await.unwrap();
        assert_eq!(done.status, CONTRACT_COMPLETED);
        assert_eq!(done.reward_earned, 150);
        assert_eq!(done.total_reward, 150);
    }

    #[tokio::test]
    async fn get_next_task_on_an_empty_queue() {
        let api = api_with(&[], &["W1"]).await;

        let next = api.get_next_task(&"W1".into()).await.unwrap();
        assert_eq!(next.status, NO_TASKS_AVAILABLE);
        assert!(next.contract.is_none());
    }

    #[tokio::test]
    async fn unknown_workers_are_rejected() {
        let api = api_with(&[("C-1", 100)], &[]).await;

        let err = api.get_next_task(&"W9".into()).await.unwrap_err();
        assert_eq!(err, CoordinationError::WorkerNotFound("W9".into()));
    }

    #[tokio::test]
    async fn actions_are_logged_with_outcomes() {
        let api = api_with(&[("C-1", 100)], &["W1", "W2"]).await;

        api.claim_contract(&"W1".into(), &"C-1".into()).await.unwrap();
        let _ = api.claim_contract(&"W2".into(), &"C-1".into()).await;

        let actions = api.actions().await;
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0].outcome, CONTRACT_CLAIMED);
        assert_eq!(actions[1].outcome, CLAIM_FAILED);
        assert_eq!(actions[1].worker_id, "W2".into());
    }

    #[tokio::test(start_paused = true)]
    async fn the_loop_can_be_started_and_stopped() {
        let api = api_with(&[("C-1", 100)], &["W1"]).await;

        let started = api.start_loop().await;
        assert_eq!(started.status, "workflow_started");

        let again = api.start_loop().await;
        assert_eq!(again.status, "workflow_already_running");

        tokio::time::advance(Duration::from_millis(250)).await;
        let stopped = api.stop_loop().await;
        assert_eq!(stopped.status, "workflow_stopped");
        assert!(stopped.ticks.unwrap_or(0) >= 1);

        let idle = api.stop_loop().await;
        assert_eq!(idle.status, "no_active_workflow");
    }
}
