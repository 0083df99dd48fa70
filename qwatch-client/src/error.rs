//! Error types for remote query channels

use std::time::Duration;
use thiserror::Error;

/// Result type alias for channel operations
pub type Result<T> = std::result::Result<T, ChannelError>;

/// Errors that can occur when running a remote query
///
/// Every variant is transient from the poller's point of view: the query is
/// retried on the next poll interval.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The local process (ssh, sh) could not be started
    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The remote host could not be reached
    #[error("Remote host {host} unreachable: {detail}")]
    Unreachable {
        /// Destination host
        host: String,
        /// Diagnostic printed by the transport
        detail: String,
    },

    /// The query did not finish in time
    #[error("Query timed out after {0:?}")]
    Timeout(Duration),

    /// The command ran but exited non-zero
    #[error("Command failed (exit {code}): {stderr}")]
    CommandFailed {
        /// Exit code of the remote command
        code: i32,
        /// Captured standard error
        stderr: String,
    },

    /// Invalid channel configuration
    #[error("Invalid target: {0}")]
    InvalidTarget(String),
}
