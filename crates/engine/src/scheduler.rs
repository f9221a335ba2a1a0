//! Scheduler loop - the one component that owns a thread of control.
//!
//! On a fixed tick interval the loop snapshots the worker set and
//! dispatches each worker purely on its current state. Errors while
//! handling one worker never abort the tick for the others; the failed
//! worker is forced into `Error` and self-heals on a later tick.

use crate::context::CoordinationContext;
use foreman_core::{CoordinationError, Result, SchedulerConfig, WorkerId, WorkerState};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Drives the coordination context forward, one tick at a time.
pub struct Scheduler {
    ctx: Arc<CoordinationContext>,
    config: SchedulerConfig,
    ticks_run: usize,
}

impl Scheduler {
    /// Create a scheduler over a shared context, using the context's
    /// configuration.
    pub fn new(ctx: Arc<CoordinationContext>) -> Self {
        let config = ctx.config().clone();
        Self {
            ctx,
            config,
            ticks_run: 0,
        }
    }

    /// Override the configuration (tick interval, max ticks).
    pub fn with_config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    /// Ticks run so far.
    pub fn ticks(&self) -> usize {
        self.ticks_run
    }

    /// Run a single tick: process every worker once, sequentially, in
    /// registration order.
    pub async fn tick(&mut self) -> TickSummary {
        self.ticks_run += 1;
        debug!(tick = self.ticks_run, "tick started");

        let mut summary = TickSummary::default();
        let ids = self.ctx.roster().worker_ids().await;
        for id in ids {
            match process_worker(&self.ctx, &id).await {
                Ok(outcome) => summary.absorb(outcome),
                Err(err) => {
                    warn!(worker = %id, error = %err, "worker processing failed");
                    if let Err(err) = self.ctx.force_error(&id, &err.to_string()).await {
                        // Only reachable for an unknown worker id.
                        warn!(worker = %id, error = %err, "could not mark worker errored");
                    }
                    summary.errored += 1;
                }
            }
        }

        debug!(tick = self.ticks_run, ?summary, "tick finished");
        summary
    }

    /// Run the loop until stopped, the tick bound is reached, or every
    /// wakeup source is gone.
    ///
    /// The stop flag is observed at the top of each tick; an in-flight
    /// tick always completes. The between-tick sleep is cancellable, so
    /// a stop request does not wait out the interval.
    pub async fn run(mut self, mut stop: watch::Receiver<bool>) -> usize {
        info!(
            tick_interval_ms = self.config.tick_interval.as_millis() as u64,
            "scheduler loop started"
        );

        loop {
            if *stop.borrow() {
                break;
            }
            if let Some(max) = self.config.max_ticks {
                if self.ticks_run >= max {
                    info!(max, "reached tick bound");
                    break;
                }
            }

            self.tick().await;

            tokio::select! {
                _ = tokio::time::sleep(self.config.tick_interval) => {}
                _ = stop.changed() => {}
            }
        }

        info!(ticks = self.ticks_run, "scheduler loop stopped");
        self.ticks_run
    }

    /// Spawn the loop on the runtime and return a stop handle.
    pub fn start(self) -> SchedulerHandle {
        let (stop_tx, stop_rx) = watch::channel(false);
        let join = tokio::spawn(self.run(stop_rx));
        SchedulerHandle {
            stop: stop_tx,
            join,
        }
    }
}

/// Handle to a running scheduler loop.
pub struct SchedulerHandle {
    stop: watch::Sender<bool>,
    join: JoinHandle<usize>,
}

impl SchedulerHandle {
    /// Signal the loop to stop and wait for the in-flight tick to
    /// finish. Returns the number of ticks run.
    pub async fn stop(self) -> usize {
        let _ = self.stop.send(true);
        self.join.await.unwrap_or(0)
    }

    /// Whether the loop has already exited (stopped or tick bound hit).
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

/// What one tick did, per dispatch category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    /// Workers handed a contract
    pub assigned: usize,
    /// Workers that started work
    pub started: usize,
    /// Workers whose contract completed
    pub completed: usize,
    /// Workers that went back to idle for lack of contracts
    pub parked: usize,
    /// Workers forced into the error state
    pub errored: usize,
    /// Workers recovered from the error state
    pub recovered: usize,
}

impl TickSummary {
    fn absorb(&mut self, other: TickSummary) {
        self.assigned += other.assigned;
        self.started += other.started;
        self.completed += other.completed;
        self.parked += other.parked;
        self.errored += other.errored;
        self.recovered += other.recovered;
    }
}

/// Dispatch one worker on its current state.
///
/// `NoContractAvailable` is a normal outcome here, never an error; any
/// error that escapes this function sends the worker to `Error`.
async fn process_worker(ctx: &CoordinationContext, id: &WorkerId) -> Result<TickSummary> {
    let mut summary = TickSummary::default();
    let worker = ctx.roster().get(id).await?;

    match worker.state {
        WorkerState::Idle => match ctx.assign(id).await {
            Ok(contract) => {
                debug!(worker = %id, contract = %contract.id, "assigned");
                summary.assigned += 1;
            }
            Err(CoordinationError::NoContractAvailable) => {}
            Err(err) => return Err(err),
        },
        WorkerState::Claimed => {
            let contract = ctx.start_work(id).await?;
            debug!(worker = %id, contract = %contract.id, "work started");
            summary.started += 1;
        }
        WorkerState::InProgress => {
            if ctx.work_done(id).await? {
                let (contract, worker) = ctx.complete(id).await?;
                info!(
                    worker = %id,
                    contract = %contract.id,
                    reward = contract.reward,
                    total_reward = worker.total_reward,
                    "contract completed"
                );
                summary.completed += 1;
            }
        }
        WorkerState::Completed => {
            ctx.roster()
                .transition(id, WorkerState::ClaimingNext, "seeking next contract")
                .await?;
            summary.absorb(claim_next(ctx, id).await?);
        }
        WorkerState::ClaimingNext => {
            // Normally transient within a tick; seen here only if a
            // previous assignment attempt was interrupted.
            summary.absorb(claim_next(ctx, id).await?);
        }
        WorkerState::Error => {
            ctx.roster()
                .transition(id, WorkerState::Idle, "recovered from error")
                .await?;
            summary.recovered += 1;
        }
    }

    Ok(summary)
}

/// From `ClaimingNext`: take the next contract, or park back to idle.
async fn claim_next(ctx: &CoordinationContext, id: &WorkerId) -> Result<TickSummary> {
    let mut summary = TickSummary::default();
    match ctx.assign(id).await {
        Ok(contract) => {
            debug!(worker = %id, contract = %contract.id, "assigned next");
            summary.assigned += 1;
        }
        Err(CoordinationError::NoContractAvailable) => {
            ctx.roster()
                .transition(id, WorkerState::Idle, "no contract available")
                .await?;
            summary.parked += 1;
        }
        Err(err) => return Err(err),
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use foreman_core::{Contract, ContractStatus, Difficulty, Worker};
    use std::time::Duration;

    fn config() -> SchedulerConfig {
        SchedulerConfig::default()
            .with_tick_interval(Duration::from_millis(100))
            .with_work_duration(Duration::from_secs(3))
    }

    async fn seeded_context(contracts: &[(&str, u64)], workers: &[&str]) -> Arc<CoordinationContext> {
        let ctx = CoordinationContext::new(config());
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
        Arc::new(ctx)
    }

    #[tokio::test(start_paused = true)]
    async fn a_worker_is_driven_through_the_full_cycle() {
        let ctx = seeded_context(&[("C-1", 150)], &["W1"]).await;
        let mut scheduler = Scheduler::new(ctx.clone());

        // Tick 1: idle -> claimed.
        scheduler.tick().await;
        assert_eq!(
            ctx.roster().get(&"W1".into()).await.unwrap().state,
            WorkerState::Claimed
        );

        // Tick 2: claimed -> in progress.
        scheduler.tick().await;
        assert_eq!(
            ctx.roster().get(&"W1".into()).await.unwrap().state,
            WorkerState::InProgress
        );

        // Work not yet done: the worker stays in progress.
        scheduler.tick().await;
        assert_eq!(
            ctx.roster().get(&"W1".into()).await.unwrap().state,
            WorkerState::InProgress
        );

        // After the configured duration the tick completes the contract
        // and, with no more work, parks the worker back to idle on the
        // following tick.
        tokio::time::advance(Duration::from_secs(3)).await;
        let summary = scheduler.tick().await;
        assert_eq!(summary.completed, 1);

        let worker = ctx.roster().get(&"W1".into()).await.unwrap();
        assert_eq!(worker.state, WorkerState::Completed);
        assert_eq!(worker.total_reward, 150);

        let summary = scheduler.tick().await;
        assert_eq!(summary.parked, 1);
        assert_eq!(
            ctx.roster().get(&"W1".into()).await.unwrap().state,
            WorkerState::Idle
        );

        let contract = ctx.registry().get(&"C-1".into()).await.unwrap();
        assert_eq!(contract.status, ContractStatus::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn completed_workers_chain_into_the_next_contract() {
        let ctx = seeded_context(&[("C-1", 100), ("C-2", 100)], &["W1"]).await;
        let mut scheduler = Scheduler::new(ctx.clone());

        scheduler.tick().await; // claimed C-1
        scheduler.tick().await; // in progress
        tokio::time::advance(Duration::from_secs(3)).await;
        scheduler.tick().await; // completed C-1

        // The next tick moves through CLAIMING_NEXT straight into the
        // second contract.
        let summary = scheduler.tick().await;
        assert_eq!(summary.assigned, 1);

        let worker = ctx.roster().get(&"W1".into()).await.unwrap();
        assert_eq!(worker.state, WorkerState::Claimed);
        assert_eq!(worker.current_contract, Some("C-2".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn fifo_fairness_across_the_crew() {
        let ctx = seeded_context(&[("A", 10), ("B", 10), ("C", 10)], &["W1", "W2", "W3"]).await;
        let mut scheduler = Scheduler::new(ctx.clone());

        let summary = scheduler.tick().await;
        assert_eq!(summary.assigned, 3);

        for (worker, expected) in [("W1", "A"), ("W2", "B"), ("W3", "C")] {
            let held = ctx
                .roster()
                .get(&worker.into())
                .await
                .unwrap()
                .current_contract;
            assert_eq!(held, Some(expected.into()), "worker {worker}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn an_errored_worker_heals_within_one_tick() {
        let ctx = seeded_context(&[], &["W1"]).await;
        ctx.force_error(&"W1".into(), "induced fault").await.unwrap();

        let mut scheduler = Scheduler::new(ctx.clone());
        let summary = scheduler.tick().await;
        assert_eq!(summary.recovered, 1);
        assert_eq!(
            ctx.roster().get(&"W1".into()).await.unwrap().state,
            WorkerState::Idle
        );
    }

    #[tokio::test(start_paused = true)]
    async fn one_bad_worker_does_not_abort_the_tick() {
        let ctx = seeded_context(&[("A", 10)], &["W1", "W2"]).await;

        // Wedge W1: claimed per the roster, but its contract reference
        // points at nothing the registry knows about.
        ctx.roster()
            .bind_contract(&"W1".into(), &"MISSING".into())
            .await
            .unwrap();
        ctx.roster()
            .transition(&"W1".into(), WorkerState::Claimed, "test setup")
            .await
            .unwrap();

        let mut scheduler = Scheduler::new(ctx.clone());
        let summary = scheduler.tick().await;

        // W1 fell into ERROR; W2 still got its assignment.
        assert_eq!(summary.errored, 1);
        assert_eq!(summary.assigned, 1);
        assert_eq!(
            ctx.roster().get(&"W1".into()).await.unwrap().state,
            WorkerState::Error
        );
        assert_eq!(
            ctx.roster().get(&"W2".into()).await.unwrap().state,
            WorkerState::Claimed
        );
    }

    #[tokio::test(start_paused = true)]
    async fn the_loop_honors_its_tick_bound() {
        let ctx = seeded_context(&[], &["W1"]).await;
        let scheduler =
            Scheduler::new(ctx.clone()).with_config(config().with_max_ticks(3));

        let (_tx, rx) = watch::channel(false);
        let ticks = scheduler.run(rx).await;
        assert_eq!(ticks, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_observed_between_ticks() {
        let ctx = seeded_context(&[], &["W1"]).await;
        let handle = Scheduler::new(ctx.clone()).start();

        // Let the loop get going, then stop it.
        tokio::time::advance(Duration::from_millis(250)).await;
        let ticks = handle.stop().await;
        assert!(ticks >= 1);
    }
}
