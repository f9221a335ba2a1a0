//! Assignment policy - decides which available contract a worker gets.

use foreman_core::Contract;

/// Strategy for picking a contract from the available set.
///
/// The slice is always in registration order; a policy is a pure
/// selection over it. FIFO is the only policy the system defines, but
/// the seam is here for priority or role-targeted selection later.
pub trait AssignmentPolicy: Send + Sync {
    /// Pick a contract, or `None` when the set is empty.
    fn select<'a>(&self, available: &'a [Contract]) -> Option<&'a Contract>;
}

/// First-available-first-served: the first contract in registration
/// order. This is the complete, deterministic tie-break rule.
#[derive(Debug, Clone, Copy, Default)]
pub struct FifoPolicy;

impl FifoPolicy {
    /// Create the FIFO policy.
    pub fn new() -> Self {
        Self
    }
}

impl AssignmentPolicy for FifoPolicy {
    fn select<'a>(&self, available: &'a [Contract]) -> Option<&'a Contract> {
        available.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use foreman_core::Difficulty;

    fn contracts(ids: &[&str]) -> Vec<Contract> {
        ids.iter()
            .map(|id| Contract::new(*id, format!("contract {id}"), Difficulty::Easy, 10, 50))
            .collect()
    }

    #[test]
    fn fifo_picks_the_first_in_registration_order() {
        let policy = FifoPolicy::new();
        let available = contracts(&["C-1", "C-2", "C-3"]);

        let picked = policy.select(&available).unwrap();
        assert_eq!(picked.id.as_str(), "C-1");
    }

    #[test]
    fn empty_set_yields_none() {
        let policy = FifoPolicy::new();
        assert!(policy.select(&[]).is_none());
    }
}
