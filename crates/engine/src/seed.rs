//! Seed configuration - contracts and worker identities.
//!
//! The seed source is owned externally; the engine only reads it. When
//! no seed file exists, a default pool is synthesized so the system can
//! run out of the box.

use foreman_core::{Contract, ContractStatus, Difficulty, Worker};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Errors loading a seed file.
#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Seed definitions for the contract pool and the worker identity pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Seed {
    /// Contracts to register at start-up
    pub contracts: Vec<ContractSeed>,

    /// Worker identities with role labels
    pub workers: Vec<WorkerSeed>,
}

/// One contract record in the seed source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractSeed {
    /// Stable contract ID
    pub id: String,

    /// Title
    pub title: String,

    /// Difficulty tier
    #[serde(default = "default_difficulty")]
    pub difficulty: Difficulty,

    /// Estimated effort in minutes
    #[serde(default = "default_estimated_minutes")]
    pub estimated_minutes: u64,

    /// Reward on completion
    pub reward: u64,

    /// Status carried by the source; registration always starts
    /// contracts as available
    #[serde(default = "default_status")]
    pub status: ContractStatus,
}

/// One worker identity in the seed source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerSeed {
    /// Stable worker ID
    pub id: String,

    /// Role label (informational)
    pub role: String,
}

fn default_difficulty() -> Difficulty {
    Difficulty::Medium
}

fn default_estimated_minutes() -> u64 {
    30
}

fn default_status() -> ContractStatus {
    ContractStatus::Available
}

impl Seed {
    /// Load a seed file.
    pub fn load(path: &Path) -> Result<Self, SeedError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Load a seed file, synthesizing the default pool when the file is
    /// absent.
    pub fn load_or_default(path: &Path) -> Result<Self, SeedError> {
        if path.exists() {
            Self::load(path)
        } else {
            info!(path = %path.display(), "no seed file, using the default pool");
            Ok(Self::default_pool())
        }
    }

    /// The built-in pool: a handful of contracts and a three-worker crew.
    pub fn default_pool() -> Self {
        Self {
            contracts: vec![
                ContractSeed {
                    id: "COORD-001".to_string(),
                    title: "Wire the intake pipeline".to_string(),
                    difficulty: Difficulty::Medium,
                    estimated_minutes: 30,
                    reward: 150,
                    status: ContractStatus::Available,
                },
                ContractSeed {
                    id: "COORD-002".to_string(),
                    title: "Backfill the ledger index".to_string(),
                    difficulty: Difficulty::Easy,
                    estimated_minutes: 15,
                    reward: 75,
                    status: ContractStatus::Available,
                },
                ContractSeed {
                    id: "COORD-003".to_string(),
                    title: "Harden the export path".to_string(),
                    difficulty: Difficulty::Hard,
                    estimated_minutes: 60,
                    reward: 300,
                    status: ContractStatus::Available,
                },
                ContractSeed {
                    id: "COORD-004".to_string(),
                    title: "Rotate the relay credentials".to_string(),
                    difficulty: Difficulty::Medium,
                    estimated_minutes: 20,
                    reward: 100,
                    status: ContractStatus::Available,
                },
                ContractSeed {
                    id: "COORD-005".to_string(),
                    title: "Profile the merge hot path".to_string(),
                    difficulty: Difficulty::Expert,
                    estimated_minutes: 90,
                    reward: 450,
                    status: ContractStatus::Available,
                },
            ],
            workers: vec![
                WorkerSeed {
                    id: "W1".to_string(),
                    role: "builder".to_string(),
                },
                WorkerSeed {
                    id: "W2".to_string(),
                    role: "reviewer".to_string(),
                },
                WorkerSeed {
                    id: "W3".to_string(),
                    role: "integrator".to_string(),
                },
            ],
        }
    }

    /// Materialize the contract records.
    pub fn contracts(&self) -> Vec<Contract> {
        self.contracts
            .iter()
            .map(|seed| {
                Contract::new(
                    seed.id.clone(),
                    seed.title.clone(),
                    seed.difficulty,
                    seed.estimated_minutes,
                    seed.reward,
                )
            })
            .collect()
    }

    /// Materialize the worker records.
    pub fn workers(&self) -> Vec<Worker> {
        self.workers
            .iter()
            .map(|seed| Worker::new(seed.id.clone(), seed.role.clone()))
            .collect()
    }
}
