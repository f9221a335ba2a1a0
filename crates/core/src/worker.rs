//! Worker model and the state machine governing its life cycle.

use crate::id::{ContractId, WorkerId};
use crate::Time;
use serde::{Deserialize, Serialize};

/// A cooperating actor that claims, executes, and completes contracts.
///
/// Workers are registered once at start-up and never removed; a failed
/// worker is reset to idle rather than discarded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Worker {
    /// Unique identifier
    pub id: WorkerId,

    /// Role label (informational)
    pub role: String,

    /// Current life-cycle state
    pub state: WorkerState,

    /// Contract the worker holds, retained after completion until the
    /// next assignment overwrites it (lookup-only, never ownership)
    pub current_contract: Option<ContractId>,

    /// Contracts completed so far
    pub contracts_completed: u64,

    /// Reward earned so far
    pub total_reward: u64,

    /// Last state change or work stamp, used to compute elapsed time
    /// on the active contract
    pub last_activity: Time,
}

impl Worker {
    /// Register a new idle worker.
    pub fn new(id: impl Into<WorkerId>, role: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: role.into(),
            state: WorkerState::Idle,
            current_contract: None,
            contracts_completed: 0,
            total_reward: 0,
            last_activity: chrono::Utc::now(),
        }
    }
}

/// Finite states of a worker's life cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    /// No contract held, ready for assignment
    Idle,
    /// Contract claimed, work not yet started
    Claimed,
    /// Actively working on the claimed contract
    InProgress,
    /// Work finished, completion recorded
    Completed,
    /// Looking for the next contract after a completion
    ClaimingNext,
    /// Processing failed; recovers to idle on the next tick
    Error,
}

impl WorkerState {
    /// Whether the edge from `self` to `target` is in the transition table.
    ///
    /// The table is the single source of truth for validated transitions;
    /// the only bypass is the internal fail-safe that forces a worker into
    /// `Error` when processing it fails.
    pub fn can_transition_to(self, target: WorkerState) -> bool {
        use WorkerState::*;
        matches!(
            (self, target),
            (Idle, Claimed)
                | (Claimed, InProgress)
                | (InProgress, Completed)
                | (InProgress, Error)
                | (Completed, ClaimingNext)
                | (ClaimingNext, Claimed)
                | (ClaimingNext, Idle)
                | (Error, Idle)
        )
    }

    /// Uppercase display name.
    pub fn as_str(self) -> &'static str {
        match self {
            WorkerState::Idle => "IDLE",
            WorkerState::Claimed => "CLAIMED",
            WorkerState::InProgress => "IN_PROGRESS",
            WorkerState::Completed => "COMPLETED",
            WorkerState::ClaimingNext => "CLAIMING_NEXT",
            WorkerState::Error => "ERROR",
        }
    }

    /// All states, in a fixed order (used for status summaries and tests).
    pub fn all() -> [WorkerState; 6] {
        [
            WorkerState::Idle,
            WorkerState::Claimed,
            WorkerState::InProgress,
            WorkerState::Completed,
            WorkerState::ClaimingNext,
            WorkerState::Error,
        ]
    }
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
