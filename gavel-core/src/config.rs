//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/gavel/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/gavel/` (~/.config/gavel/)
//! - State/Logs: `$XDG_STATE_HOME/gavel/` (~/.local/state/gavel/)
//!
//! Every knob has a default so the console runs with no config file at all.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Pipeline API endpoint configuration
    #[serde(default)]
    pub console: ConsoleConfig,

    /// Judge-agreement weighting
    #[serde(default)]
    pub judging: JudgingConfig,

    /// Playback and stage-progression pacing
    #[serde(default)]
    pub playback: PlaybackConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Connection settings for the pipeline API the adapter is constructed with.
#[derive(Debug, Deserialize, Clone)]
pub struct ConsoleConfig {
    /// Base URL of the timeline API
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// HTTP request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Poll interval hint forwarded to the push channel, in seconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: f64,

    /// Actor name recorded with reveal audit entries
    #[serde(default = "default_actor")]
    pub actor: String,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout_secs: default_timeout_secs(),
            poll_interval_secs: default_poll_interval(),
            actor: default_actor(),
        }
    }
}

impl ConsoleConfig {
    /// Validate configuration, returning an error message if invalid
    pub fn validate(&self) -> Result<()> {
        if self.endpoint.trim().is_empty() {
            return Err(Error::Config("console.endpoint must not be empty".to_string()));
        }
        if !(self.poll_interval_secs >= 0.1 && self.poll_interval_secs <= 5.0) {
            return Err(Error::Config(
                "console.poll_interval_secs must be between 0.1 and 5.0".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_endpoint() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_poll_interval() -> f64 {
    0.5
}

fn default_actor() -> String {
    "gavel-tui".to_string()
}

/// Weights applied to verdicts when computing the agreement percentage.
///
/// The weighting is a policy choice, so it is configuration rather than a
/// hardcoded constant.
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct JudgingConfig {
    #[serde(default = "default_allow_weight")]
    pub allow_weight: f64,
    #[serde(default = "default_warn_weight")]
    pub warn_weight: f64,
    #[serde(default = "default_block_weight")]
    pub block_weight: f64,
}

impl Default for JudgingConfig {
    fn default() -> Self {
        Self {
            allow_weight: default_allow_weight(),
            warn_weight: default_warn_weight(),
            block_weight: default_block_weight(),
        }
    }
}

fn default_allow_weight() -> f64 {
    1.0
}

fn default_warn_weight() -> f64 {
    0.4
}

fn default_block_weight() -> f64 {
    0.0
}

/// Pacing for live-run stage progression.
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct PlaybackConfig {
    /// Base delay before a stage transition becomes due, in milliseconds
    #[serde(default = "default_stage_base_delay_ms")]
    pub stage_base_delay_ms: u64,

    /// Additional per-position offset so exchanges cascade, in milliseconds
    #[serde(default = "default_stage_step_ms")]
    pub stage_step_ms: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            stage_base_delay_ms: default_stage_base_delay_ms(),
            stage_step_ms: default_stage_step_ms(),
        }
    }
}

fn default_stage_base_delay_ms() -> u64 {
    400
}

fn default_stage_step_ms() -> u64 {
    150
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.console.validate()?;
        Ok(config)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/gavel/config.toml` (~/.config/gavel/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("gavel").join("config.toml")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/gavel/` (~/.local/state/gavel/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("gavel")
    }

    /// Returns the log file path
    ///
    /// `$XDG_STATE_HOME/gavel/gavel.log` (~/.local/state/gavel/gavel.log)
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("gavel.log")
    }
}
