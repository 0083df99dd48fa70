//! Poller and runner configuration
//!
//! Every poller receives its settings explicitly. Nothing here is read from
//! module-level state, so workflows watching different clusters or queues
//! never share hidden defaults.

use qwatch_client::{ChannelSettings, SshTarget};
use qwatch_core::domain::job::JobHandle;
use qwatch_core::encoding::ResponseEncoding;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::query::QueryCommands;

/// Default wait between polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Default total wait: seven days
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60 * 60 * 24 * 7);

/// Errors raised while loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} environment variable not set")]
    Missing(&'static str),

    #[error("invalid value '{value}' for {var}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("{0}")]
    Validation(String),
}

/// Settings for one polling operation
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Wait between poll attempts
    pub poll_interval: Duration,

    /// Total wall-clock budget, measured from poller creation
    pub timeout: Duration,

    /// Transport encoding of remote responses
    pub encoding: ResponseEncoding,

    /// Commands issued against the batch system
    pub commands: QueryCommands,
}

impl PollerConfig {
    /// Creates a configuration with the given interval and timeout
    pub fn new(poll_interval: Duration, timeout: Duration) -> Self {
        Self {
            poll_interval,
            timeout,
            encoding: ResponseEncoding::default(),
            commands: QueryCommands::default(),
        }
    }

    pub fn with_encoding(mut self, encoding: ResponseEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_commands(mut self, commands: QueryCommands) -> Self {
        self.commands = commands;
        self
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables (all optional):
    /// - QWATCH_POLL_INTERVAL (seconds, default: 60)
    /// - QWATCH_TIMEOUT (seconds, default: 604800)
    /// - QWATCH_ENCODING (auto | base64 | plain, default: auto)
    /// - QWATCH_STATUS_COMMAND (default: `qstat -xf -F json {job_id}`)
    /// - QWATCH_EXIT_STATUS_COMMAND (default: none)
    pub fn from_env() -> Result<Self, ConfigError> {
        let poll_interval = env_parsed("QWATCH_POLL_INTERVAL")?
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_POLL_INTERVAL);

        let timeout = env_parsed("QWATCH_TIMEOUT")?
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TIMEOUT);

        let encoding = env_parsed("QWATCH_ENCODING")?.unwrap_or_default();

        let mut commands = env_var("QWATCH_STATUS_COMMAND")
            .map(QueryCommands::new)
            .unwrap_or_default();

        if let Some(exit) = env_var("QWATCH_EXIT_STATUS_COMMAND") {
            commands = commands.with_exit_status(exit);
        }

        Ok(Self {
            poll_interval,
            timeout,
            encoding,
            commands,
        })
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval.is_zero() {
            return Err(ConfigError::Validation(
                "poll_interval must be greater than 0".to_string(),
            ));
        }

        if self.timeout.is_zero() {
            return Err(ConfigError::Validation(
                "timeout must be greater than 0".to_string(),
            ));
        }

        self.commands.validate().map_err(ConfigError::Validation)
    }
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL, DEFAULT_TIMEOUT)
    }
}

/// Configuration of the `qwatch-runner` daemon
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Jobs to wait for
    pub handles: Vec<JobHandle>,

    /// How queries reach the batch system
    pub channel: ChannelSettings,

    pub poller: PollerConfig,
}

impl RunnerConfig {
    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - QWATCH_HANDLES (required, comma separated job handles)
    /// - QWATCH_HOST (optional, `[user@]host[:port]`)
    /// - QWATCH_IDENTITY_FILE (optional)
    /// - QWATCH_QUERY_TIMEOUT (optional, seconds, default: 120)
    /// - QWATCH_CONNECT_TIMEOUT (optional, seconds, default: 30)
    /// - QWATCH_SSH_OPTIONS (optional, comma separated `key=value` ssh options)
    /// - plus everything read by [`PollerConfig::from_env`]
    pub fn from_env() -> Result<Self, ConfigError> {
        let raw = env_var("QWATCH_HANDLES").ok_or(ConfigError::Missing("QWATCH_HANDLES"))?;
        let handles = parse_handles(&raw)?;

        let defaults = ChannelSettings::default();

        let channel = ChannelSettings {
            host: env_parsed::<SshTarget>("QWATCH_HOST")?,
            identity_file: env_var("QWATCH_IDENTITY_FILE").map(PathBuf::from),
            connect_timeout: env_parsed("QWATCH_CONNECT_TIMEOUT")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.connect_timeout),
            query_timeout: env_parsed("QWATCH_QUERY_TIMEOUT")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.query_timeout),
            ssh_options: env_var("QWATCH_SSH_OPTIONS")
                .map(|raw| parse_list(&raw))
                .unwrap_or_default(),
        };

        Ok(Self {
            handles,
            channel,
            poller: PollerConfig::from_env()?,
        })
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.handles.is_empty() {
            return Err(ConfigError::Validation(
                "at least one job handle is required".to_string(),
            ));
        }

        if self.channel.query_timeout.is_zero() {
            return Err(ConfigError::Validation(
                "query_timeout must be greater than 0".to_string(),
            ));
        }

        if self.channel.connect_timeout.is_zero() {
            return Err(ConfigError::Validation(
                "connect_timeout must be greater than 0".to_string(),
            ));
        }

        self.poller.validate()
    }
}

/// Parses a comma separated list of job handles
pub fn parse_handles(raw: &str) -> Result<Vec<JobHandle>, ConfigError> {
    parse_list(raw)
        .into_iter()
        .map(|s| {
            JobHandle::new(s.as_str()).map_err(|e| ConfigError::Invalid {
                var: "QWATCH_HANDLES",
                value: s.clone(),
                reason: e.to_string(),
            })
        })
        .collect()
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn env_var(name: &'static str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parsed<T>(name: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_var(name) {
        Some(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::Invalid {
                var: name,
                value,
                reason: e.to_string(),
            }),
        None => Ok(None),
    }
}
