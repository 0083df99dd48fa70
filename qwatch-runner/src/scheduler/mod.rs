//! Scheduler layer for the runner
//!
//! This layer owns the polling loop: a [`JobPoller`] waits for one remote
//! job, and [`watch_all`] runs one poller per job concurrently.

pub mod poller;
pub mod watch;

#[cfg(test)]
mod testing;

pub use poller::JobPoller;
pub use watch::{WatchSummary, watch_all};
