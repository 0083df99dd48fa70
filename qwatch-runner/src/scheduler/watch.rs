//! Concurrent watching of several jobs
//!
//! Each job gets its own poller on its own task. Pollers share the channel
//! (which is stateless per call) and nothing else.

use anyhow::{Context, Result};
use qwatch_client::RemoteQueryChannel;
use qwatch_core::domain::job::JobHandle;
use qwatch_core::domain::poll::{PollerState, WaitOutcome};
use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::config::PollerConfig;
use crate::scheduler::poller::JobPoller;

/// Waits for every job in `handles`
///
/// Outcomes are returned in the same order as `handles`. If a poller task
/// panics the remaining pollers are aborted.
pub async fn watch_all(
    handles: Vec<JobHandle>,
    channel: Arc<dyn RemoteQueryChannel>,
    config: PollerConfig,
) -> Result<Vec<WaitOutcome>> {
    info!(
        "Watching {} job(s) via {}",
        handles.len(),
        channel.describe()
    );

    let mut tasks = JoinSet::new();
    let total = handles.len();

    for (index, handle) in handles.into_iter().enumerate() {
        let channel = Arc::clone(&channel);
        let mut poller = JobPoller::new(handle, config.clone());

        tasks.spawn(async move { (index, poller.wait(channel.as_ref()).await) });
    }

    let mut slots: Vec<Option<WaitOutcome>> = vec![None; total];

    // Dropping the set on error aborts the pollers still running
    while let Some(joined) = tasks.join_next().await {
        let (index, outcome) = joined.context("Poller task panicked")?;
        log_outcome(&outcome);
        slots[index] = Some(outcome);
    }

    Ok(slots.into_iter().flatten().collect())
}

fn log_outcome(outcome: &WaitOutcome) {
    match &outcome.state {
        PollerState::Succeeded => info!(
            "Job {} succeeded after {} poll(s) in {:?}",
            outcome.handle, outcome.polls, outcome.elapsed
        ),
        PollerState::Failed { reason } => error!(
            "Job {} failed after {} poll(s): {}",
            outcome.handle, outcome.polls, reason
        ),
        PollerState::TimedOut { waited } => warn!(
            "Job {} still unresolved after {:?} ({} poll(s))",
            outcome.handle, waited, outcome.polls
        ),
        state => warn!("Job {} ended in non-terminal state {}", outcome.handle, state),
    }
}

/// Tally of a batch of outcomes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WatchSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub timed_out: usize,
}

impl WatchSummary {
    pub fn from_outcomes(outcomes: &[WaitOutcome]) -> Self {
        outcomes.iter().fold(Self::default(), |mut summary, outcome| {
            match outcome.state {
                PollerState::Succeeded => summary.succeeded += 1,
                PollerState::TimedOut { .. } => summary.timed_out += 1,
                _ => summary.failed += 1,
            }
            summary
        })
    }

    /// Process exit code for hosts that read one
    ///
    /// `0` when every job succeeded, `1` when any job failed, otherwise `2`
    /// when at least one poller timed out.
    pub fn exit_code(&self) -> i32 {
        if self.failed > 0 {
            1
        } else if self.timed_out > 0 {
            2
        } else {
            0
        }
    }
}
