//! Contract model - the unit of assignable work.

use crate::id::{ContractId, WorkerId};
use crate::Time;
use serde::{Deserialize, Serialize};

/// A contract is a discrete unit of work that a worker can claim,
/// execute, and complete.
///
/// Contracts are never deleted; they only move forward through their
/// lifecycle, keeping their timestamps for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contract {
    /// Unique identifier
    pub id: ContractId,

    /// Human-readable title
    pub title: String,

    /// Difficulty tier (informational, does not affect assignment)
    pub difficulty: Difficulty,

    /// Estimated effort in minutes
    pub estimated_minutes: u64,

    /// Reward credited to the worker on completion
    pub reward: u64,

    /// Lifecycle status
    pub status: ContractStatus,

    /// Worker holding the contract (set while claimed or completed)
    pub owner: Option<WorkerId>,

    /// When the contract was claimed
    pub claimed_at: Option<Time>,

    /// When the contract was completed
    pub completed_at: Option<Time>,
}

impl Contract {
    /// Create a new, unowned contract in `Available` status.
    pub fn new(
        id: impl Into<ContractId>,
        title: impl Into<String>,
        difficulty: Difficulty,
        estimated_minutes: u64,
        reward: u64,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            difficulty,
            estimated_minutes,
            reward,
            status: ContractStatus::Available,
            owner: None,
            claimed_at: None,
            completed_at: None,
        }
    }
}

/// Lifecycle status of a contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractStatus {
    /// Registered and waiting for a worker
    Available,
    /// Held by exactly one worker
    Claimed,
    /// Finished by its owner
    Completed,
}

impl ContractStatus {
    /// Uppercase display name.
    pub fn as_str(self) -> &'static str {
        match self {
            ContractStatus::Available => "AVAILABLE",
            ContractStatus::Claimed => "CLAIMED",
            ContractStatus::Completed => "COMPLETED",
        }
    }
}

impl std::fmt::Display for ContractStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Difficulty tier of a contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    /// Routine work
    Easy,
    /// Standard work
    Medium,
    /// Demanding work
    Hard,
    /// Specialist work
    Expert,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_contract_is_available_and_unowned() {
        let contract = Contract::new("COORD-001", "Wire up intake", Difficulty::Medium, 30, 150);
        assert_eq!(contract.status, ContractStatus::Available);
        assert!(contract.owner.is_none());
        assert!(contract.claimed_at.is_none());
        assert!(contract.completed_at.is_none());
        assert_eq!(contract.reward, 150);
    }
}
