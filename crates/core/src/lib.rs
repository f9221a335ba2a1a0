//! Foreman core data models.
//!
//! This crate defines the fundamental data structures shared by the
//! contract coordination engine: contracts, workers, the worker state
//! machine table, audit records, and the error taxonomy.

#![warn(missing_docs)]

// Core identities
mod id;

// Work units and actors
mod contract;
mod worker;

// Audit trail
mod record;

// Errors and configuration
mod config;
mod error;

// Re-exports
pub use id::*;

pub use contract::{Contract, ContractStatus, Difficulty};
pub use worker::{Worker, WorkerState};

pub use record::{ActionEntry, TransitionRecord};

pub use config::SchedulerConfig;
pub use error::{CoordinationError, Result};

/// Timestamp type
pub type Time = chrono::DateTime<chrono::Utc>;
