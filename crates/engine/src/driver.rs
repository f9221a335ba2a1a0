//! Work driver - pluggable execution of a claimed contract.

use async_trait::async_trait;
use foreman_core::Contract;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use ulid::Ulid;

/// Opaque token for an in-flight unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkHandle(Ulid);

impl WorkHandle {
    fn new() -> Self {
        Self(Ulid::new())
    }
}

impl std::fmt::Display for WorkHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Capability that actually executes contract work.
///
/// The scheduler and state machine only see `begin`/`poll`/`finish`, so
/// real asynchronous execution can replace the wall-clock placeholder
/// without touching either.
#[async_trait]
pub trait WorkDriver: Send + Sync {
    /// Begin executing a contract; returns a handle to poll.
    async fn begin(&self, contract: &Contract) -> WorkHandle;

    /// Whether the work behind `handle` has finished.
    async fn poll(&self, handle: &WorkHandle) -> bool;

    /// Release any state held for `handle`.
    async fn finish(&self, handle: &WorkHandle);
}

/// Placeholder driver that simulates work via elapsed wall-clock time.
///
/// A unit of work is "done" once the configured duration has passed
/// since `begin`. Uses `tokio::time::Instant`, so paused-time tests can
/// advance it deterministically.
pub struct TimedWorkDriver {
    duration: Duration,
    started: Mutex<HashMap<WorkHandle, tokio::time::Instant>>,
}

impl TimedWorkDriver {
    /// Create a driver that finishes work after `duration`.
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            started: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl WorkDriver for TimedWorkDriver {
    async fn begin(&self, _contract: &Contract) -> WorkHandle {
        let handle = WorkHandle::new();
        self.started
            .lock()
            .await
            .insert(handle, tokio::time::Instant::now());
        handle
    }

    async fn poll(&self, handle: &WorkHandle) -> bool {
        // Unknown handles count as finished so a lost entry cannot wedge
        // a worker in IN_PROGRESS forever.
        self.started
            .lock()
            .await
            .get(handle)
            .map(|started| started.elapsed() >= self.duration)
            .unwrap_or(true)
    }

    async fn finish(&self, handle: &WorkHandle) {
        self.started.lock().await.remove(handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use foreman_core::Difficulty;

    fn contract() -> Contract {
        Contract::new("C-1", "contract C-1", Difficulty::Easy, 10, 50)
    }

    #[tokio::test(start_paused = true)]
    async fn work_finishes_after_the_configured_duration() {
        let driver = TimedWorkDriver::new(Duration::from_secs(3));
        let handle = driver.begin(&contract()).await;

        assert!(!driver.poll(&handle).await);

        tokio::time::advance(Duration::from_secs(3)).await;
        assert!(driver.poll(&handle).await);
    }

    #[tokio::test(start_paused = true)]
    async fn handles_are_independent() {
        let driver = TimedWorkDriver::new(Duration::from_secs(3));
        let first = driver.begin(&contract()).await;

        tokio::time::advance(Duration::from_secs(2)).await;
        let second = driver.begin(&contract()).await;

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(driver.poll(&first).await);
        assert!(!driver.poll(&second).await);
    }

    #[tokio::test]
    async fn unknown_handles_count_as_finished() {
        let driver = TimedWorkDriver::new(Duration::from_secs(3));
        let handle = driver.begin(&contract()).await;
        driver.finish(&handle).await;

        assert!(driver.poll(&handle).await);
    }
}
