//! Error taxonomy for coordination operations.

use crate::id::{ContractId, WorkerId};
use crate::worker::WorkerState;

/// Result type for coordination operations.
pub type Result<T> = std::result::Result<T, CoordinationError>;

/// Errors returned by the registry, the worker roster, and the
/// assignment path.
///
/// Nothing here is fatal to the process: manual callers receive these as
/// typed results, while the scheduler converts them into an `Error`
/// transition for the affected worker and carries on with the tick.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoordinationError {
    /// A contract with the same ID is already registered.
    #[error("contract {0} is already registered")]
    DuplicateContract(ContractId),

    /// The contract is not available to claim (already claimed or
    /// completed, or unknown). Also reported on a lost claim race.
    #[error("contract {0} is not available")]
    ContractNotAvailable(ContractId),

    /// Completion attempted on a contract the worker does not hold in
    /// `Claimed` status.
    #[error("contract {contract} is not held by worker {worker}")]
    OwnershipMismatch {
        /// Contract whose ownership was checked
        contract: ContractId,
        /// Worker that attempted the completion
        worker: WorkerId,
    },

    /// The requested edge is not in the worker transition table. The
    /// worker's state is left unchanged.
    #[error("worker {worker}: invalid transition {from} -> {to}")]
    InvalidTransition {
        /// Worker the transition was requested for
        worker: WorkerId,
        /// State the worker is in
        from: WorkerState,
        /// State that was requested
        to: WorkerState,
    },

    /// No contract is currently available. This is the normal
    /// empty-queue outcome, not a fault.
    #[error("no contract available")]
    NoContractAvailable,

    /// Unknown worker ID.
    #[error("worker {0} is not registered")]
    WorkerNotFound(WorkerId),
}
