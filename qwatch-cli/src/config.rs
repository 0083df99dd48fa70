//! Configuration module
//!
//! Handles how the CLI reaches the batch system.

use qwatch_client::{ChannelSettings, RemoteQueryChannel, channel_for};
use std::sync::Arc;

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Destination and timeouts for status queries
    pub channel: ChannelSettings,
}

impl Config {
    /// Builds the query channel described by this configuration
    pub fn channel(&self) -> Arc<dyn RemoteQueryChannel> {
        channel_for(&self.channel)
    }
}
