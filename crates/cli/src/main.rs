//! Foreman CLI - manual control surface over the coordination engine.
//!
//! Each invocation builds the engine from the seed file (or the default
//! pool), performs exactly one operation, prints the JSON payload, and
//! exits 0 on success or 1 on a reported error.

use anyhow::Result;
use clap::{ArgGroup, Parser};
use foreman_core::{CoordinationError, SchedulerConfig, WorkerId};
use foreman_engine::{ControlApi, CoordinationContext, Scheduler, Seed};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "foreman")]
#[command(about = "Contract coordination engine", long_about = None)]
#[command(group(
    ArgGroup::new("action")
        .required(true)
        .args([
            "get_next_task",
            "claim_contract",
            "start_work",
            "complete_contract",
            "contract_status",
            "start_auto_workflow",
            "stop_auto_workflow",
        ]),
))]
struct Cli {
    /// Worker identity for worker-scoped operations
    #[arg(long, value_name = "WORKER_ID")]
    agent: Option<String>,

    /// Seed file with contracts and worker identities
    #[arg(long, default_value = "foreman.seed.json")]
    seed: PathBuf,

    /// Show the next contract the agent would be handed
    #[arg(long)]
    get_next_task: bool,

    /// Claim a specific contract for the agent
    #[arg(long, value_name = "CONTRACT_ID")]
    claim_contract: Option<String>,

    /// Start work on the agent's claimed contract
    #[arg(long)]
    start_work: bool,

    /// Complete the agent's contract and credit the reward
    #[arg(long)]
    complete_contract: bool,

    /// Print per-worker state, per-contract status, and totals
    #[arg(long)]
    contract_status: bool,

    /// Run the scheduler loop in this process
    #[arg(long)]
    start_auto_workflow: bool,

    /// Bound the auto workflow to N ticks (0 = run until ctrl-c)
    #[arg(long, default_value = "0", value_name = "N")]
    ticks: usize,

    /// Stop a running scheduler loop
    #[arg(long)]
    stop_auto_workflow: bool,
}

/// What a single command produced: a payload for stdout, plus whether
/// it counts as a reported error for the exit code.
enum Outcome {
    Ok(Value),
    Failed(Value),
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let seed = Seed::load_or_default(&cli.seed)?;
    let ctx = Arc::new(CoordinationContext::from_seed(&seed, SchedulerConfig::default()).await);
    let api = ControlApi::new(ctx);

    match dispatch(&cli, &api).await? {
        Outcome::Ok(payload) => {
            println!("{}", serde_json::to_string_pretty(&payload)?);
            Ok(())
        }
        Outcome::Failed(payload) => {
            println!("{}", serde_json::to_string_pretty(&payload)?);
            std::process::exit(1);
        }
    }
}

async fn dispatch(cli: &Cli, api: &ControlApi) -> Result<Outcome> {
    if cli.get_next_task {
        let worker = require_agent(cli)?;
        return command(api.get_next_task(&worker).await, "error");
    }

    if let Some(contract_id) = &cli.claim_contract {
        let worker = require_agent(cli)?;
        return command(
            api.claim_contract(&worker, &contract_id.as_str().into()).await,
            foreman_engine::api::CLAIM_FAILED,
        );
    }

    if cli.start_work {
        let worker = require_agent(cli)?;
        return command(
            api.start_work(&worker).await,
            foreman_engine::api::WORK_START_FAILED,
        );
    }

    if cli.complete_contract {
        let worker = require_agent(cli)?;
        return command(
            api.complete_contract(&worker).await,
            foreman_engine::api::COMPLETE_FAILED,
        );
    }

    if cli.contract_status {
        let status = api.get_status().await;
        return Ok(Outcome::Ok(serde_json::to_value(status)?));
    }

    if cli.start_auto_workflow {
        return run_auto_workflow(cli, api).await;
    }

    // --stop-auto-workflow: state is in-memory and per-process, so a
    // fresh invocation can only report that nothing is running here.
    let stopped = api.stop_loop().await;
    Ok(Outcome::Ok(serde_json::to_value(stopped)?))
}

async fn run_auto_workflow(cli: &Cli, api: &ControlApi) -> Result<Outcome> {
    if cli.ticks > 0 {
        let config = api.context().config().clone().with_max_ticks(cli.ticks);
        let scheduler = Scheduler::new(api.context().clone()).with_config(config);
        let (_stop, rx) = watch::channel(false);
        let ticks = scheduler.run(rx).await;

        let status = api.get_status().await;
        return Ok(Outcome::Ok(json!({
            "status": "workflow_finished",
            "ticks": ticks,
            "totals": serde_json::to_value(status.totals)?,
        })));
    }

    api.start_loop().await;
    info!("auto workflow running; press ctrl-c to stop");
    tokio::signal::ctrl_c().await?;

    let stopped = api.stop_loop().await;
    Ok(Outcome::Ok(serde_json::to_value(stopped)?))
}

/// Wrap an API result: success payloads pass through, coordination
/// errors become a structured failure payload and exit code 1.
fn command<T: serde::Serialize>(
    result: std::result::Result<T, CoordinationError>,
    fail_status: &str,
) -> Result<Outcome> {
    match result {
        Ok(payload) => Ok(Outcome::Ok(serde_json::to_value(payload)?)),
        Err(err) => Ok(Outcome::Failed(json!({
            "status": fail_status,
            "error": err.to_string(),
        }))),
    }
}

fn require_agent(cli: &Cli) -> Result<WorkerId> {
    cli.agent
        .as_deref()
        .map(WorkerId::new)
        .ok_or_else(|| anyhow::anyhow!("--agent <WORKER_ID> is required for this operation"))
}
