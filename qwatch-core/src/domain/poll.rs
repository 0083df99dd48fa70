//! Poll result and poller state types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::domain::job::JobHandle;

/// Outcome of a single poll attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", content = "detail", rename_all = "snake_case")]
pub enum PollResult {
    /// Job is still listed as queued, running or otherwise active
    Running,
    /// Job left the queue with a zero exit status
    Succeeded,
    /// Job left the queue and reported a failure
    Failed(FailureReason),
    /// Response could not be interpreted; the attempt should be retried
    Unknown(String),
}

impl PollResult {
    /// Whether this result ends the polling operation
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed(_))
    }
}

impl fmt::Display for PollResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed(reason) => write!(f, "failed: {}", reason),
            Self::Unknown(detail) => write!(f, "unknown: {}", detail),
        }
    }
}

/// Why a job ended unsuccessfully
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    /// Job script exited with a non-zero status
    ExitStatus { code: i32 },
    /// Job was killed by a signal (PBS reports `256 + signal`)
    Signal { signal: i32 },
    /// Batch system could not run the job (negative PBS exit codes)
    Scheduler { code: i32 },
    /// Failure marker reported by the batch system without an exit code
    Reported { message: String },
    /// The poller gave up before the job reached a terminal state
    TimedOut {
        #[serde(with = "duration_secs")]
        waited: Duration,
    },
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExitStatus { code } => write!(f, "job exited with status {}", code),
            Self::Signal { signal } => write!(f, "job killed by signal {}", signal),
            Self::Scheduler { code } => {
                write!(f, "batch system failed to run job (exit status {})", code)
            }
            Self::Reported { message } => write!(f, "{}", message),
            Self::TimedOut { waited } => {
                write!(f, "timed out after {}s waiting for job", waited.as_secs())
            }
        }
    }
}

/// Lifecycle state of a poller
///
/// `Pending -> Running -> {Succeeded, Failed, TimedOut}`. A poller may also
/// move from `Pending` straight to a terminal state. Terminal states are final.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PollerState {
    Pending,
    Running,
    Succeeded,
    Failed { reason: FailureReason },
    TimedOut {
        #[serde(with = "duration_secs")]
        waited: Duration,
    },
}

impl PollerState {
    /// Whether no further transitions are possible
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::Failed { .. } | Self::TimedOut { .. }
        )
    }

    /// Applies a poll result, returning the next state
    ///
    /// `Unknown` leaves the state unchanged. Terminal states ignore all input.
    pub fn advance(self, result: &PollResult) -> Self {
        if self.is_terminal() {
            return self;
        }

        match result {
            PollResult::Running => Self::Running,
            PollResult::Succeeded => Self::Succeeded,
            PollResult::Failed(reason) => Self::Failed {
                reason: reason.clone(),
            },
            PollResult::Unknown(_) => self,
        }
    }

    /// Resolves a non-terminal state to `TimedOut`
    pub fn time_out(self, waited: Duration) -> Self {
        if self.is_terminal() {
            return self;
        }
        Self::TimedOut { waited }
    }

    /// Terminal poll result equivalent of this state, if any
    ///
    /// A timeout is reported as a failure with a distinct reason.
    pub fn terminal_result(&self) -> Option<PollResult> {
        match self {
            Self::Succeeded => Some(PollResult::Succeeded),
            Self::Failed { reason } => Some(PollResult::Failed(reason.clone())),
            Self::TimedOut { waited } => Some(PollResult::Failed(FailureReason::TimedOut {
                waited: *waited,
            })),
            Self::Pending | Self::Running => None,
        }
    }
}

impl fmt::Display for PollerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed { reason } => write!(f, "failed ({})", reason),
            Self::TimedOut { waited } => write!(f, "timed out after {}s", waited.as_secs()),
        }
    }
}

/// Final report of a whole polling operation
///
/// Handed to the host scheduler so it can mark the calling workflow step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaitOutcome {
    pub handle: JobHandle,
    pub state: PollerState,
    pub polls: u32,
    #[serde(with = "duration_secs")]
    pub elapsed: Duration,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub finished_at: chrono::DateTime<chrono::Utc>,
}

impl WaitOutcome {
    pub fn succeeded(&self) -> bool {
        matches!(self.state, PollerState::Succeeded)
    }

    pub fn timed_out(&self) -> bool {
        matches!(self.state, PollerState::TimedOut { .. })
    }

    pub fn failed(&self) -> bool {
        matches!(self.state, PollerState::Failed { .. })
    }
}

/// Serializes durations as whole seconds
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
