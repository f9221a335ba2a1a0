//! Contract registry - canonical owner of contract records.

use foreman_core::{
    Contract, ContractId, ContractStatus, CoordinationError, Result, WorkerId,
};
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::debug;

/// Canonical, in-memory store of contracts and their lifecycle status.
///
/// `claim` is the single serialization point for the one-owner
/// invariant: a check-then-set under the registry lock. Critical
/// sections never span logging or external calls.
pub struct ContractRegistry {
    inner: Mutex<RegistryInner>,
}

struct RegistryInner {
    contracts: HashMap<ContractId, Contract>,
    /// Registration order, the FIFO tie-break for assignment.
    order: Vec<ContractId>,
}

impl ContractRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(RegistryInner {
                contracts: HashMap::new(),
                order: Vec::new(),
            }),
        }
    }

    /// Insert a new contract.
    ///
    /// Registered contracts always start `Available` and unowned,
    /// whatever the caller put in those fields.
    pub async fn register(&self, mut contract: Contract) -> Result<()> {
        contract.status = ContractStatus::Available;
        contract.owner = None;
        contract.claimed_at = None;
        contract.completed_at = None;

        let id = contract.id.clone();
        {
            let mut inner = self.inner.lock().await;
            if inner.contracts.contains_key(&id) {
                return Err(CoordinationError::DuplicateContract(id));
            }
            inner.order.push(id.clone());
            inner.contracts.insert(id.clone(), contract);
        }

        debug!(contract = %id, "contract registered");
        Ok(())
    }

    /// Contracts still available, in registration order.
    pub async fn list_available(&self) -> Vec<Contract> {
        let inner = self.inner.lock().await;
        inner
            .order
            .iter()
            .filter_map(|id| inner.contracts.get(id))
            .filter(|c| c.status == ContractStatus::Available)
            .cloned()
            .collect()
    }

    /// Look up a single contract.
    pub async fn get(&self, id: &ContractId) -> Option<Contract> {
        self.inner.lock().await.contracts.get(id).cloned()
    }

    /// Atomically claim an available contract for a worker.
    ///
    /// Fails `ContractNotAvailable` if the contract is unknown, already
    /// claimed, or completed - including when another worker won the
    /// race for it.
    pub async fn claim(&self, id: &ContractId, worker: &WorkerId) -> Result<Contract> {
        let claimed = {
            let mut inner = self.inner.lock().await;
            let contract = inner
                .contracts
                .get_mut(id)
                .filter(|c| c.status == ContractStatus::Available)
                .ok_or_else(|| CoordinationError::ContractNotAvailable(id.clone()))?;

            contract.status = ContractStatus::Claimed;
            contract.owner = Some(worker.clone());
            contract.claimed_at = Some(chrono::Utc::now());
            contract.clone()
        };

        debug!(contract = %id, worker = %worker, "contract claimed");
        Ok(claimed)
    }

    /// Complete a claimed contract owned by `worker`.
    ///
    /// Fails `OwnershipMismatch` unless the contract is in `Claimed`
    /// status with `worker` as its owner.
    pub async fn complete(&self, id: &ContractId, worker: &WorkerId) -> Result<Contract> {
        let completed = {
            let mut inner = self.inner.lock().await;
            let contract = inner
                .contracts
                .get_mut(id)
                .filter(|c| {
                    c.status == ContractStatus::Claimed && c.owner.as_ref() == Some(worker)
                })
                .ok_or_else(|| CoordinationError::OwnershipMismatch {
                    contract: id.clone(),
                    worker: worker.clone(),
                })?;

            contract.status = ContractStatus::Completed;
            contract.completed_at = Some(chrono::Utc::now());
            contract.clone()
        };

        debug!(contract = %id, worker = %worker, "contract completed");
        Ok(completed)
    }

    /// Snapshot of every contract, in registration order.
    pub async fn snapshot(&self) -> Vec<Contract> {
        let inner = self.inner.lock().await;
        inner
            .order
            .iter()
            .filter_map(|id| inner.contracts.get(id))
            .cloned()
            .collect()
    }
}

impl Default for ContractRegistry {
    fn default() -> Self {
        Self::new()
    }
}
