//! Connection manager configuration

use std::time::Duration;

use tracing::debug;

use crate::config::HubConfig;

/// Connection manager configuration
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Delay before each reconnect attempt; when exhausted the manager gives up
    pub retry_delays: Vec<Duration>,

    /// Hub methods invoked without arguments after every successful handshake
    pub join_commands: Vec<String>,

    /// Channel buffer size for manager commands
    pub channel_buffer: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        debug!("ConnectionConfig::default: called");
        Self::from(&HubConfig::default())
    }
}

impl From<&HubConfig> for ConnectionConfig {
    fn from(hub: &HubConfig) -> Self {
        Self {
            retry_delays: hub.retry_delays(),
            join_commands: hub.join_commands.clone(),
            channel_buffer: 256,
        }
    }
}

impl ConnectionConfig {
    /// Set the retry delays
    pub fn with_retry_delays(mut self, delays: Vec<Duration>) -> Self {
        self.retry_delays = delays;
        self
    }

    /// Set the join commands
    pub fn with_join_commands(mut self, commands: Vec<String>) -> Self {
        self.join_commands = commands;
        self
    }

    /// Delay before the given (zero-based) retry, or None when retries are exhausted
    pub fn retry_delay(&self, retry: usize) -> Option<Duration> {
        self.retry_delays.get(retry).copied()
    }
}
