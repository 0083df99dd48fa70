//! SSH channel
//!
//! Runs each query through the system `ssh` client in batch mode. No
//! connection is held between queries; connection reuse, if wanted, is left
//! to the user's ssh configuration (`ControlMaster`).

use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::channel::{ExecCapture, RemoteQueryChannel, run_captured};
use crate::error::{ChannelError, Result};

/// Exit code ssh uses for its own failures
const SSH_FAILURE: i32 = 255;

/// SSH destination in `[user@]host[:port]` form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshTarget {
    pub user: Option<String>,
    pub host: String,
    pub port: Option<u16>,
}

impl FromStr for SshTarget {
    type Err = ChannelError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let s = s.strip_prefix("ssh://").unwrap_or(s);

        let (user, rest) = match s.split_once('@') {
            Some((user, rest)) if !user.is_empty() => (Some(user.to_string()), rest),
            Some(_) => return Err(ChannelError::InvalidTarget(format!("empty user in '{}'", s))),
            None => (None, s),
        };

        let (host, port) = match rest.rsplit_once(':') {
            Some((host, port)) => {
                let port = port.parse::<u16>().map_err(|_| {
                    ChannelError::InvalidTarget(format!("invalid port '{}' in '{}'", port, s))
                })?;
                (host, Some(port))
            }
            None => (rest, None),
        };

        if host.is_empty() || host.chars().any(|c| c.is_whitespace() || c == '/') {
            return Err(ChannelError::InvalidTarget(format!("invalid host in '{}'", s)));
        }

        Ok(Self {
            user,
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Display for SshTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(user) = &self.user {
            write!(f, "{}@", user)?;
        }
        write!(f, "{}", self.host)?;
        if let Some(port) = self.port {
            write!(f, ":{}", port)?;
        }
        Ok(())
    }
}

/// Runs queries on a remote host over ssh
#[derive(Debug, Clone)]
pub struct SshChannel {
    target: SshTarget,
    identity_file: Option<PathBuf>,
    connect_timeout: Duration,
    query_timeout: Duration,
    options: Vec<String>,
}

impl SshChannel {
    /// Creates a channel with a 30 second connect timeout and a 120 second query timeout
    pub fn new(target: SshTarget) -> Self {
        Self {
            target,
            identity_file: None,
            connect_timeout: Duration::from_secs(30),
            query_timeout: Duration::from_secs(120),
            options: Vec::new(),
        }
    }

    pub fn with_identity_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.identity_file = Some(path.into());
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    /// Adds `-o key=value` options
    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options.extend(options.into_iter().map(Into::into));
        self
    }

    /// Arguments passed to `ssh` for one query
    fn ssh_args(&self, command: &str) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.connect_timeout.as_secs().max(1)),
        ];

        for option in &self.options {
            args.push("-o".to_string());
            args.push(option.clone());
        }

        if let Some(identity) = &self.identity_file {
            args.push("-i".to_string());
            args.push(identity.to_string_lossy().to_string());
        }

        if let Some(port) = self.target.port {
            args.push("-p".to_string());
            args.push(port.to_string());
        }

        if let Some(user) = &self.target.user {
            args.push("-l".to_string());
            args.push(user.clone());
        }

        args.push(self.target.host.clone());
        args.push("--".to_string());
        args.push(command.to_string());
        args
    }
}

#[async_trait]
impl RemoteQueryChannel for SshChannel {
    async fn execute(&self, command: &str) -> Result<ExecCapture> {
        debug!("Running on {}: {}", self.target, command);

        let mut cmd = Command::new("ssh");
        cmd.args(self.ssh_args(command));

        let capture = run_captured(cmd, "ssh", self.query_timeout).await?;

        if capture.exit_code == SSH_FAILURE {
            let detail = capture.stderr_text();
            warn!("ssh to {} failed: {}", self.target, detail);
            return Err(ChannelError::Unreachable {
                host: self.target.host.clone(),
                detail,
            });
        }

        Ok(capture)
    }

    fn describe(&self) -> String {
        format!("ssh://{}", self.target)
    }
}
