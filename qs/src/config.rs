//! questionsync configuration types and loading

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Main questionsync configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Push channel (hub) configuration
    pub hub: HubConfig,

    /// REST API used for history backfill
    pub api: ApiConfig,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level", skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .questionsync.yml
        let local_config = PathBuf::from(".questionsync.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/questionsync/questionsync.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("questionsync").join("questionsync.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read only the log level, before logging is set up
    ///
    /// Errors are swallowed: the full load reports them once logging works.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        Self::load(config_path).ok().and_then(|c| c.log_level)
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Render as YAML
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize config")
    }
}

/// Push channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Hub endpoint URL (http/https; the WebSocket URL is derived from it)
    pub url: String,

    /// Environment variable holding a bearer token, if the hub requires one
    #[serde(rename = "access-token-env", skip_serializing_if = "Option::is_none")]
    pub access_token_env: Option<String>,

    /// Delays before each reconnect attempt; reconnecting stops when exhausted
    #[serde(rename = "retry-delays-ms")]
    pub retry_delays_ms: Vec<u64>,

    /// Interval between client keep-alive pings
    #[serde(rename = "keep-alive-ms")]
    pub keep_alive_ms: u64,

    /// Drop the link if the hub sends nothing for this long
    #[serde(rename = "server-timeout-ms")]
    pub server_timeout_ms: u64,

    /// Upper bound on negotiate + handshake
    #[serde(rename = "handshake-timeout-ms")]
    pub handshake_timeout_ms: u64,

    /// Hub methods invoked (without arguments) after every successful handshake
    #[serde(rename = "join-commands")]
    pub join_commands: Vec<String>,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            url: "https://localhost:7000/questionHub".to_string(),
            access_token_env: None,
            retry_delays_ms: vec![0, 2_000, 10_000, 30_000],
            keep_alive_ms: 15_000,
            server_timeout_ms: 30_000,
            handshake_timeout_ms: 15_000,
            join_commands: vec!["JoinAdmin".to_string()],
        }
    }
}

impl HubConfig {
    /// Bearer token from the configured environment variable
    pub fn access_token(&self) -> Option<String> {
        let var = self.access_token_env.as_ref()?;
        debug!(%var, "HubConfig::access_token: called");
        std::env::var(var).ok().filter(|t| !t.is_empty())
    }

    pub fn retry_delays(&self) -> Vec<Duration> {
        self.retry_delays_ms.iter().copied().map(Duration::from_millis).collect()
    }

    pub fn keep_alive_interval(&self) -> Duration {
        Duration::from_millis(self.keep_alive_ms)
    }

    pub fn server_timeout(&self) -> Duration {
        Duration::from_millis(self.server_timeout_ms)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }
}

/// REST API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// API base URL (with trailing slash)
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://localhost:7000/api/v1/".to_string(),
            timeout_ms: 30_000,
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
