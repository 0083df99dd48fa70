//! Local shell channel
//!
//! Used when the poller itself runs on a host with direct access to the
//! batch system (e.g. a cluster login node).

use async_trait::async_trait;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use crate::channel::{ExecCapture, RemoteQueryChannel, run_captured};
use crate::error::Result;

/// Runs queries through `sh -c` on the local host
#[derive(Debug, Clone)]
pub struct LocalChannel {
    shell: String,
    timeout: Duration,
}

impl LocalChannel {
    /// Creates a channel using `/bin/sh` and a 60 second query timeout
    pub fn new() -> Self {
        Self {
            shell: "/bin/sh".to_string(),
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for LocalChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteQueryChannel for LocalChannel {
    async fn execute(&self, command: &str) -> Result<ExecCapture> {
        debug!("Running locally: {}", command);

        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c").arg(command);

        run_captured(cmd, &self.shell, self.timeout).await
    }

    fn describe(&self) -> String {
        format!("local:{}", self.shell)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChannelError;

    #[tokio::test]
    async fn test_captures_stdout() {
        let channel = LocalChannel::new();
        let output = channel.execute("echo 12345.gadi-pbs").await.unwrap();

        assert!(output.success());
        assert_eq!(output.stdout, b"12345.gadi-pbs\n");
    }

    #[tokio::test]
    async fn test_captures_exit_code_and_stderr() {
        let channel = LocalChannel::new();
        let output = channel
            .execute("echo 'qstat: Unknown Job Id 1.gadi-pbs' >&2; exit 153")
            .await
            .unwrap();

        assert_eq!(output.exit_code, 153);
        assert_eq!(output.stderr_text(), "qstat: Unknown Job Id 1.gadi-pbs");
    }

    #[tokio::test]
    async fn test_query_timeout() {
        let channel = LocalChannel::new().with_timeout(Duration::from_millis(50));
        let err = channel.execute("sleep 5").await.unwrap_err();

        assert!(matches!(err, ChannelError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_missing_shell() {
        let channel = LocalChannel {
            shell: "/nonexistent/shell".to_string(),
            ..LocalChannel::new()
        };
        let err = channel.execute("true").await.unwrap_err();

        assert!(matches!(err, ChannelError::Spawn { .. }));
    }
}
