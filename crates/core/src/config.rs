//! Engine configuration.

use std::time::Duration;

/// Configuration for the scheduler loop and its collaborators.
///
/// The tick interval and work duration were once magic constants; they
/// are configuration here so deployments and tests can tune them.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Interval between scheduler ticks
    pub tick_interval: Duration,

    /// Wall-clock duration the placeholder work driver treats as a
    /// finished unit of work
    pub work_duration: Duration,

    /// Max ticks before the loop stops on its own (None = run until
    /// stopped)
    pub max_ticks: Option<usize>,

    /// Capacity of the rolling action log
    pub action_log_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(500),
            work_duration: Duration::from_secs(3),
            max_ticks: None,
            action_log_capacity: 256,
        }
    }
}

impl SchedulerConfig {
    /// Create a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the tick interval.
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    /// Set the simulated work duration.
    pub fn with_work_duration(mut self, duration: Duration) -> Self {
        self.work_duration = duration;
        self
    }

    /// Bound the loop to a number of ticks.
    pub fn with_max_ticks(mut self, max: usize) -> Self {
        self.max_ticks = Some(max);
        self
    }

    /// Set the action log capacity.
    pub fn with_action_log_capacity(mut self, capacity: usize) -> Self {
        self.action_log_capacity = capacity;
        self
    }
}
