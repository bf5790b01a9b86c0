//! Process configuration, loaded once at startup from YAML.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, time::Duration};

use crate::coord::Timeouts;
use crate::error::Error;
use crate::snowflake::{MAX_DATA_CENTER_ID, MAX_WORKER_ID};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub coordination: CoordinationCfg,
    #[serde(default)]
    pub allocator: AllocatorCfg,
    #[serde(default)]
    pub data_center_id: u8,
    #[serde(default)]
    pub logging: LoggingCfg,
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let s = fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        let cfg: AppConfig = serde_yaml::from_str(&s).context("parsing YAML config")?;
        Ok(cfg)
    }

    /// Startup validation; failures here are fatal before any claim is
    /// attempted.
    pub fn validate(&self) -> Result<(), Error> {
        if self.coordination.servers.is_empty() {
            return Err(Error::NoServers);
        }
        if self.data_center_id > MAX_DATA_CENTER_ID {
            return Err(Error::DataCenterIdOutOfRange(self.data_center_id));
        }
        Ok(())
    }
}

/// Connection parameters for the coordination service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinationCfg {
    pub servers: Vec<String>,
    #[serde(default = "default_session_timeout_ms")]
    pub session_timeout_ms: u64,
    #[serde(default = "default_op_timeout_ms")]
    pub read_timeout_ms: u64,
    #[serde(default = "default_op_timeout_ms")]
    pub write_timeout_ms: u64,
}

impl CoordinationCfg {
    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            session: Duration::from_millis(self.session_timeout_ms),
            read: Duration::from_millis(self.read_timeout_ms),
            write: Duration::from_millis(self.write_timeout_ms),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocatorCfg {
    /// Attempt budget for the random-probe claim loop.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
    /// Pause between failed claim attempts.
    #[serde(default)]
    pub retry_backoff_ms: u64,
}

impl AllocatorCfg {
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

impl Default for AllocatorCfg {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_backoff_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingCfg {
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LoggingCfg {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

fn default_session_timeout_ms() -> u64 {
    10_000
}

fn default_op_timeout_ms() -> u64 {
    3_000
}

fn default_max_attempts() -> usize {
    (MAX_WORKER_ID as usize + 1) / 2
}

fn default_level() -> String {
    "info".to_string()
}
