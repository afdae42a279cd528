//! Configuration management for slidegate.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::error::{Result, SlidegateError};
use crate::ratelimit::{AdmissionControl, Clock, ShardedLimiter, SharedLimiter, SystemClock};

/// Prefix for environment variable overrides, e.g. `SLIDEGATE_MAX_REQUESTS`.
const ENV_PREFIX: &str = "SLIDEGATE";

/// How a thread-safe limiter guards its key windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockingStrategy {
    /// One mutex around the whole mapping
    #[default]
    Single,
    /// Per-key locking through a sharded map
    Sharded,
}

/// Limiter configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimiterConfig {
    /// Length of the trailing window in milliseconds
    #[serde(default = "default_window_size_ms")]
    pub window_size_ms: u64,

    /// Admissions allowed per key within one window
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,

    /// Locking strategy for shared limiters
    #[serde(default)]
    pub strategy: LockingStrategy,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            window_size_ms: default_window_size_ms(),
            max_requests: default_max_requests(),
            strategy: LockingStrategy::default(),
        }
    }
}

fn default_window_size_ms() -> u64 {
    10_000
}

fn default_max_requests() -> u32 {
    1
}

impl LimiterConfig {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading limiter configuration");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| SlidegateError::Config(format!("Failed to parse limiter config: {}", e)))
    }

    /// Load configuration from an optional YAML file layered under
    /// `SLIDEGATE_*` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            info!(path = %path.display(), "Loading limiter configuration");
            builder = builder.add_source(
                ::config::File::from(path).format(::config::FileFormat::Yaml),
            );
        }

        let config: LimiterConfig = builder
            .add_source(::config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .and_then(|settings| settings.try_deserialize())
            .map_err(|e| SlidegateError::Config(e.to_string()))?;

        info!(
            window_size_ms = config.window_size_ms,
            max_requests = config.max_requests,
            strategy = ?config.strategy,
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Length of the trailing window.
    pub fn window_size(&self) -> Duration {
        Duration::from_millis(self.window_size_ms)
    }

    /// Check that the configured limits can admit requests.
    pub fn validate(&self) -> Result<()> {
        crate::ratelimit::validate_limits(self.window_size(), self.max_requests)
    }

    /// Build a thread-safe limiter reading the system clock.
    pub fn build(&self) -> Result<Box<dyn AdmissionControl>> {
        self.build_with_clock(SystemClock)
    }

    /// Build a thread-safe limiter reading time from `clock`.
    pub fn build_with_clock<C: Clock + 'static>(
        &self,
        clock: C,
    ) -> Result<Box<dyn AdmissionControl>> {
        let window_size = self.window_size();
        Ok(match self.strategy {
            LockingStrategy::Single => Box::new(SharedLimiter::with_clock(
                window_size,
                self.max_requests,
                clock,
            )?),
            LockingStrategy::Sharded => Box::new(ShardedLimiter::with_clock(
                window_size,
                self.max_requests,
                clock,
            )?),
        })
    }
}
