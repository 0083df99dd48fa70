//! qwatch Runner
//!
//! Waits for remote batch-queue jobs to finish.
//!
//! Architecture:
//! - Configuration: explicit per-poller settings, loadable from the environment
//! - Query: status-query command templates
//! - Scheduler: the poller state machine, its polling loop and the
//!   concurrent watch host
//!
//! A poller borrows a [`qwatch_client::RemoteQueryChannel`] for each attempt,
//! so the caller decides how commands reach the batch system.

pub mod config;
pub mod query;
pub mod scheduler;

pub use config::{ConfigError, PollerConfig, RunnerConfig};
pub use query::QueryCommands;
pub use scheduler::{JobPoller, WatchSummary, watch_all};
