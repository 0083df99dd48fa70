//! Remote query channel boundary

use async_trait::async_trait;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use crate::error::{ChannelError, Result};

/// Captured result of one command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecCapture {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub exit_code: i32,
}

impl ExecCapture {
    /// Successful capture with the given standard output
    pub fn ok(stdout: impl Into<Vec<u8>>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: Vec::new(),
            exit_code: 0,
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Standard error as lossy text
    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).trim().to_string()
    }

    /// Converts a non-zero exit into [`ChannelError::CommandFailed`]
    pub fn into_success(self) -> Result<Self> {
        if self.success() {
            Ok(self)
        } else {
            Err(ChannelError::CommandFailed {
                code: self.exit_code,
                stderr: self.stderr_text(),
            })
        }
    }
}

/// Runs a command on the host that owns the batch queue
///
/// One request per call; implementations hold no session state between
/// calls. A non-zero exit of the command itself is returned in the capture,
/// not as an error, so callers can inspect the batch system's diagnostics.
#[async_trait]
pub trait RemoteQueryChannel: Send + Sync {
    /// Executes `command` and captures its output
    async fn execute(&self, command: &str) -> Result<ExecCapture>;

    /// Short description used in logs (e.g. `ssh://lpgs@gadi`)
    fn describe(&self) -> String;
}

/// Runs a prepared process to completion within `timeout`
///
/// The child is killed if the timeout elapses or the future is dropped.
pub(crate) async fn run_captured(
    mut command: Command,
    program: &str,
    timeout: Duration,
) -> Result<ExecCapture> {
    command.kill_on_drop(true);

    let child = command.output();
    let output = tokio::time::timeout(timeout, child)
        .await
        .map_err(|_| ChannelError::Timeout(timeout))?
        .map_err(|source| ChannelError::Spawn {
            program: program.to_string(),
            source,
        })?;

    // Killed by a signal: no exit code
    let exit_code = output.status.code().unwrap_or(-1);

    debug!(
        "{} exited with {} ({} bytes stdout, {} bytes stderr)",
        program,
        exit_code,
        output.stdout.len(),
        output.stderr.len()
    );

    Ok(ExecCapture {
        stdout: output.stdout,
        stderr: output.stderr,
        exit_code,
    })
}
