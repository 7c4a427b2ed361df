// src/config.rs

//! Manages server configuration: loading, applying command-line overrides,
//! and validation.

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

use crate::core::protocol::DEFAULT_MAX_BUFFERED_BYTES;

/// Longest socket path the kernel accepts (`sun_path` minus the trailing NUL).
const MAX_SOCKET_PATH_LEN: usize = 107;

/// Defines when the mutation log is synced to disk.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFsync {
    /// `fsync` after every committed mutation.
    #[default]
    Always,
    /// Leave syncing to the operating system; the log is still synced on close.
    No,
}

/// Per-session resource limits.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LimitsConfig {
    /// Undecoded bytes a session may buffer before it is disconnected.
    #[serde(default = "default_max_buffered_bytes")]
    pub max_buffered_bytes: usize,
    /// Closes sessions that send nothing for this long. Disabled when unset.
    #[serde(with = "humantime_serde", default)]
    pub idle_timeout: Option<Duration>,
    /// Upper bound on writing one response.
    #[serde(with = "humantime_serde", default = "default_write_timeout")]
    pub write_timeout: Duration,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_buffered_bytes: default_max_buffered_bytes(),
            idle_timeout: None,
            write_timeout: default_write_timeout(),
        }
    }
}

/// Timeouts for graceful shutdown.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ShutdownConfig {
    /// How long sessions get to finish after the shutdown broadcast.
    #[serde(with = "humantime_serde", default = "default_grace_period")]
    pub grace_period: Duration,
    /// How long to wait for the gate and the instance close.
    #[serde(with = "humantime_serde", default = "default_close_timeout")]
    pub close_timeout: Duration,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            grace_period: default_grace_period(),
            close_timeout: default_close_timeout(),
        }
    }
}

fn default_socket_path() -> PathBuf {
    PathBuf::from("sigma.sock")
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_max_buffered_bytes() -> usize {
    DEFAULT_MAX_BUFFERED_BYTES
}
fn default_write_timeout() -> Duration {
    Duration::from_secs(30)
}
fn default_grace_period() -> Duration {
    Duration::from_secs(5)
}
fn default_close_timeout() -> Duration {
    Duration::from_secs(10)
}

/// The validated configuration used by the server and the console.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    pub socket_path: PathBuf,
    /// Mutation log backing the instance. `None` keeps everything in memory.
    pub log_file: Option<PathBuf>,
    pub log_level: String,
    pub log_fsync: LogFsync,
    pub limits: LimitsConfig,
    pub shutdown: ShutdownConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            log_file: None,
            log_level: default_log_level(),
            log_fsync: LogFsync::default(),
            limits: LimitsConfig::default(),
            shutdown: ShutdownConfig::default(),
        }
    }
}

/// The configuration file as written on disk, before validation.
#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default = "default_socket_path")]
    socket_path: PathBuf,
    #[serde(default)]
    log_file: Option<PathBuf>,
    #[serde(default = "default_log_level")]
    log_level: String,
    #[serde(default)]
    log_fsync: LogFsync,
    #[serde(default)]
    limits: LimitsConfig,
    #[serde(default)]
    shutdown: ShutdownConfig,
}

impl Config {
    /// Loads and validates a TOML configuration file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at '{}'", path.display()))?;
        Self::from_toml(&contents)
            .with_context(|| format!("Invalid config file '{}'", path.display()))
    }

    /// Parses and validates configuration from TOML text.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let raw: RawConfig = toml::from_str(contents).context("Failed to parse TOML")?;
        let config = Config {
            socket_path: raw.socket_path,
            log_file: raw.log_file,
            log_level: raw.log_level,
            log_fsync: raw.log_fsync,
            limits: raw.limits,
            shutdown: raw.shutdown,
        };
        config.validate()?;
        Ok(config)
    }

    /// Applies command-line flags on top of file values and re-validates.
    pub fn with_overrides(
        mut self,
        socket: Option<PathBuf>,
        log_file: Option<PathBuf>,
    ) -> Result<Self> {
        if let Some(socket) = socket {
            self.socket_path = socket;
        }
        if let Some(log_file) = log_file {
            self.log_file = Some(log_file);
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.socket_path.as_os_str().is_empty() {
            return Err(anyhow!("socket_path cannot be empty"));
        }
        if self.socket_path.as_os_str().len() > MAX_SOCKET_PATH_LEN {
            return Err(anyhow!(
                "socket_path '{}' is longer than {} bytes",
                self.socket_path.display(),
                MAX_SOCKET_PATH_LEN
            ));
        }
        if let Some(log_file) = &self.log_file
            && log_file.as_os_str().is_empty()
        {
            return Err(anyhow!("log_file cannot be empty"));
        }
        if self.log_level.trim().is_empty() {
            return Err(anyhow!("log_level cannot be empty"));
        }
        if self.limits.max_buffered_bytes == 0 {
            return Err(anyhow!("limits.max_buffered_bytes cannot be 0"));
        }
        if self.limits.idle_timeout == Some(Duration::ZERO) {
            return Err(anyhow!(
                "limits.idle_timeout cannot be 0; omit it to disable the timeout"
            ));
        }
        if self.limits.write_timeout.is_zero() {
            return Err(anyhow!("limits.write_timeout cannot be 0"));
        }
        if self.shutdown.close_timeout.is_zero() {
            return Err(anyhow!("shutdown.close_timeout cannot be 0"));
        }
        if self.limits.max_buffered_bytes < 1024 {
            warn!(
                "low limits.max_buffered_bytes: {} bytes. Long statements will be rejected.",
                self.limits.max_buffered_bytes
            );
        }
        if self.log_file.is_some() && self.log_fsync == LogFsync::No {
            warn!("log_fsync is 'no': recent mutations may be lost on power failure.");
        }
        Ok(())
    }
}
