//! Configuration types for the farming daemon.
//!
//! Everything has a sensible default; a TOML file can override any subset.
//! The upstream endpoints are fixed in production — the base URLs are only
//! overridable so tests can point the client at a mock server.

use crate::error::{FarmError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration for the daemon.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Upstream API client settings.
    pub api: ApiConfig,
    /// Worker-loop timing settings.
    pub timings: JobTimings,
    /// Optional log file path (stdout/stderr logging is always on).
    pub log_file: Option<PathBuf>,
}

/// Upstream TeaBank API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the API host.
    pub base_url: String,
    /// Origin of the web application front end the API expects.
    pub app_origin: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Total attempts per request (first try + retries).
    pub retry_attempts: u32,
    /// Linear backoff unit between attempts, in seconds.
    pub retry_backoff_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.teabank.io".to_owned(),
            app_origin: "https://app.teabank.io".to_owned(),
            timeout_secs: 10,
            retry_attempts: 3,
            retry_backoff_secs: 1,
        }
    }
}

/// Timing constants for the three worker loops.
///
/// Defaults are the canonical production values; integration tests shrink
/// them to milliseconds to exercise the real loops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobTimings {
    /// Wait between successful farming calls (default 3 hours).
    pub farm_interval: Duration,
    /// Wait between task sweeps (default 30 minutes).
    pub sweep_interval: Duration,
    /// Pause between individual task-completion calls within a sweep.
    pub task_pause: Duration,
    /// Wait between ad-watch attempts.
    pub ad_interval: Duration,
    /// Recheck interval while tasks are paused behind a live ads job.
    pub ads_block_recheck: Duration,
    /// Cooldown after a transport failure inside any loop (default 5 minutes).
    pub error_cooldown: Duration,
    /// Number of successful ad watches after which the ads job terminates.
    pub ads_target: u32,
}

impl Default for JobTimings {
    fn default() -> Self {
        Self {
            farm_interval: Duration::from_secs(10_800),
            sweep_interval: Duration::from_secs(1_800),
            task_pause: Duration::from_secs(1),
            ad_interval: Duration::from_secs(60),
            ads_block_recheck: Duration::from_secs(60),
            error_cooldown: Duration::from_secs(300),
            ads_target: 10,
        }
    }
}

impl BotConfig {
    /// Load configuration from a TOML file.
    ///
    /// A missing file yields the defaults; an unreadable or invalid file is
    /// an error so typos do not silently fall back.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(FarmError::Config(format!(
                    "failed to read config {}: {e}",
                    path.display()
                )));
            }
        };

        toml::from_str(&raw).map_err(|e| {
            FarmError::Config(format!("invalid config {}: {e}", path.display()))
        })
    }

    /// Default config path (`~/.config/teafarm/config.toml`).
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("teafarm").join("config.toml"))
    }
}
