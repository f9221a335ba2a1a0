//! Audit records - the transition trail and the rolling action log.

use crate::id::{ContractId, RecordId, WorkerId};
use crate::worker::WorkerState;
use crate::Time;
use serde::{Deserialize, Serialize};

/// Immutable record of a single worker state change.
///
/// Appended on every transition (validated or fail-safe); the stream of
/// these records is the audit trail behind the fairness and liveness
/// properties of the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRecord {
    /// Unique identifier
    pub id: RecordId,

    /// Worker that changed state
    pub worker_id: WorkerId,

    /// State before the change
    pub from: WorkerState,

    /// State after the change
    pub to: WorkerState,

    /// When the change happened
    pub timestamp: Time,

    /// Why the change happened
    pub reason: String,
}

impl TransitionRecord {
    /// Create a new transition record stamped with the current time.
    pub fn new(
        worker_id: WorkerId,
        from: WorkerState,
        to: WorkerState,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            id: RecordId::new(),
            worker_id,
            from,
            to,
            timestamp: chrono::Utc::now(),
            reason: reason.into(),
        }
    }
}

/// One entry in the rolling action log.
///
/// Records every control-API and scheduler action with its outcome;
/// consumable by reporting, not required by the engine itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionEntry {
    /// Unique identifier
    pub id: RecordId,

    /// Worker the action concerned
    pub worker_id: WorkerId,

    /// Action name (e.g. `claim_contract`)
    pub action: String,

    /// Contract involved, if any
    pub contract_id: Option<ContractId>,

    /// When the action was taken
    pub timestamp: Time,

    /// Outcome status (e.g. `contract_claimed`, `claim_failed`)
    pub outcome: String,
}

impl ActionEntry {
    /// Create a new action entry stamped with the current time.
    pub fn new(
        worker_id: WorkerId,
        action: impl Into<String>,
        contract_id: Option<ContractId>,
        outcome: impl Into<String>,
    ) -> Self {
        Self {
            id: RecordId::new(),
            worker_id,
            action: action.into(),
            contract_id,
            timestamp: chrono::Utc::now(),
            outcome: outcome.into(),
        }
    }
}
