//! Configuration management for the batch scheduler
//!
//! Configuration comes from a TOML file, environment variables, or both
//! (environment wins). Every section has defaults, so a file only needs the
//! keys it changes.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::allocator::KeepFreePolicy;
use crate::host::PollConfig;
use crate::models::{RamMb, ScriptCosts};
use crate::planner::PlannerConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Batch planning and resynchronization
    #[serde(default)]
    pub batch: BatchConfig,

    /// Spacing, backoff and polling intervals
    #[serde(default)]
    pub timing: TimingConfig,

    /// Host pool and keep-free margins
    #[serde(default)]
    pub capacity: CapacityConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Batch planning configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Highest extraction percentage the planner tries
    pub max_extract_percent: u32,

    /// Weaken threads added on top of the rounded-up requirement
    pub weaken_margin_threads: u32,

    /// Successful launches before a forced prep pass
    pub resync_after_batches: u32,

    /// Lower bound on the consecutive-failure threshold
    pub min_failure_threshold: u32,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_extract_percent: 50,
            weaken_margin_threads: 1,
            resync_after_batches: 100,
            min_failure_threshold: 5,
        }
    }
}

/// Timing configuration, all values in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Gap between consecutive completions inside one batch
    pub spacing_ms: u64,

    /// Pause between successful batch launches
    pub launch_interval_ms: u64,

    /// Pause after a failed launch or prep round
    pub backoff_ms: u64,

    /// Poll interval while waiting for prep operations
    pub poll_interval_ms: u64,

    /// Upper bound on one prep wait; unbounded when absent
    pub prep_max_wait_ms: Option<u64>,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            spacing_ms: 50,
            launch_interval_ms: 200,
            backoff_ms: 1000,
            poll_interval_ms: 1000,
            prep_max_wait_ms: None,
        }
    }
}

/// Host pool configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CapacityConfig {
    /// Extra hosts sharing the work with the acting host
    pub pool: Vec<String>,

    /// Keep-free margin for hosts without an override, in MB
    pub keep_free_mb: u64,

    /// Keep-free margin as a fraction of host RAM
    pub keep_free_fraction: f64,

    /// Per-host keep-free margins in MB
    pub keep_free_overrides: HashMap<String, u64>,

    /// Per-thread script RAM
    pub script_costs: ScriptCosts,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}

impl Config {
    /// Defaults overridden by environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self::default().with_env_overrides())
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// File (if any) then environment, validated
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        }
        .with_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply `HWGW_*` environment variables on top of this configuration
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(v) = env_parse("HWGW_MAX_EXTRACT_PERCENT") {
            self.batch.max_extract_percent = v;
        }
        if let Some(v) = env_parse("HWGW_WEAKEN_MARGIN_THREADS") {
            self.batch.weaken_margin_threads = v;
        }
        if let Some(v) = env_parse("HWGW_RESYNC_AFTER_BATCHES") {
            self.batch.resync_after_batches = v;
        }
        if let Some(v) = env_parse("HWGW_SPACING_MS") {
            self.timing.spacing_ms = v;
        }
        if let Some(v) = env_parse("HWGW_LAUNCH_INTERVAL_MS") {
            self.timing.launch_interval_ms = v;
        }
        if let Some(v) = env_parse("HWGW_BACKOFF_MS") {
            self.timing.backoff_ms = v;
        }
        if let Some(v) = env_parse("HWGW_KEEP_FREE_MB") {
            self.capacity.keep_free_mb = v;
        }
        if let Ok(v) = std::env::var("HWGW_LOG_LEVEL") {
            self.logging.level = v;
        }
        if let Ok(v) = std::env::var("HWGW_LOG_FORMAT") {
            self.logging.format = v;
        }
        self
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if !(1..=100).contains(&self.batch.max_extract_percent) {
            anyhow::bail!("max_extract_percent must be within 1..=100");
        }

        if self.batch.resync_after_batches == 0 {
            anyhow::bail!("resync_after_batches must be greater than 0");
        }

        if self.timing.spacing_ms == 0 {
            anyhow::bail!("spacing_ms must be greater than 0");
        }

        if self.timing.backoff_ms == 0 || self.timing.poll_interval_ms == 0 {
            anyhow::bail!("backoff_ms and poll_interval_ms must be greater than 0");
        }

        if !(0.0..=1.0).contains(&self.capacity.keep_free_fraction) {
            anyhow::bail!("keep_free_fraction must be within 0.0..=1.0");
        }

        let costs = &self.capacity.script_costs;
        if [costs.hack, costs.grow, costs.weaken].contains(&RamMb::ZERO) {
            anyhow::bail!("script costs must be greater than 0");
        }

        if !matches!(self.logging.format.as_str(), "text" | "json") {
            anyhow::bail!("log format must be 'text' or 'json'");
        }

        Ok(())
    }

    #[must_use]
    pub fn spacing(&self) -> Duration {
        Duration::from_millis(self.timing.spacing_ms)
    }

    #[must_use]
    pub fn launch_interval(&self) -> Duration {
        Duration::from_millis(self.timing.launch_interval_ms)
    }

    #[must_use]
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.timing.backoff_ms)
    }

    pub fn prep_poll(&self) -> PollConfig {
        let poll = PollConfig::new(Duration::from_millis(self.timing.poll_interval_ms));
        match self.timing.prep_max_wait_ms {
            Some(ms) => poll.with_max_wait(Duration::from_millis(ms)),
            None => poll,
        }
    }

    pub fn planner(&self) -> PlannerConfig {
        PlannerConfig {
            max_extract_percent: self.batch.max_extract_percent,
            weaken_margin_threads: self.batch.weaken_margin_threads,
            costs: self.capacity.script_costs,
        }
    }

    pub fn keep_free(&self) -> KeepFreePolicy {
        KeepFreePolicy {
            default_mb: RamMb(self.capacity.keep_free_mb),
            overrides: self
                .capacity
                .keep_free_overrides
                .iter()
                .map(|(host, mb)| (host.clone(), RamMb(*mb)))
                .collect(),
            fraction: self.capacity.keep_free_fraction,
        }
    }
}
