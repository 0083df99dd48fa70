//! qwatch Client
//!
//! Remote command channels used to query a batch system for job status.
//!
//! A channel runs one command per call and returns its captured output. It
//! owns no connection state between calls, so a single channel can be shared
//! by any number of concurrent pollers.
//!
//! # Example
//!
//! ```no_run
//! use qwatch_client::{RemoteQueryChannel, SshChannel, SshTarget};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let target: SshTarget = "lpgs@gadi.nci.org.au".parse()?;
//!     let channel = SshChannel::new(target);
//!
//!     let output = channel.execute("qstat -xf -F json 12345.gadi-pbs").await?;
//!     println!("{}", String::from_utf8_lossy(&output.stdout));
//!     Ok(())
//! }
//! ```

mod channel;
pub mod error;
mod local;
mod ssh;

// Re-export commonly used types
pub use channel::{ExecCapture, RemoteQueryChannel};
pub use error::{ChannelError, Result};
pub use local::LocalChannel;
pub use ssh::{SshChannel, SshTarget};

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// How to reach the batch system
#[derive(Debug, Clone)]
pub struct ChannelSettings {
    /// Remote host; queries run through the local shell when unset
    pub host: Option<SshTarget>,

    /// Private key for the ssh connection
    pub identity_file: Option<PathBuf>,

    /// Upper bound on establishing the ssh connection
    pub connect_timeout: Duration,

    /// Upper bound on a single query
    pub query_timeout: Duration,

    /// Extra `-o key=value` options passed to ssh
    pub ssh_options: Vec<String>,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            host: None,
            identity_file: None,
            connect_timeout: Duration::from_secs(30),
            query_timeout: Duration::from_secs(120),
            ssh_options: Vec::new(),
        }
    }
}

/// Builds the channel described by `settings`
///
/// Queries go over ssh when a host is set, otherwise through the local shell.
pub fn channel_for(settings: &ChannelSettings) -> Arc<dyn RemoteQueryChannel> {
    match &settings.host {
        Some(target) => {
            let mut channel = SshChannel::new(target.clone())
                .with_connect_timeout(settings.connect_timeout)
                .with_query_timeout(settings.query_timeout)
                .with_options(settings.ssh_options.iter().cloned());
            if let Some(identity) = &settings.identity_file {
                channel = channel.with_identity_file(identity.clone());
            }
            Arc::new(channel)
        }
        None => Arc::new(LocalChannel::new().with_timeout(settings.query_timeout)),
    }
}
