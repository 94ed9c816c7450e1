//! Configuration management for Bouncer.
//!
//! Configuration is layered: an optional YAML file, then `BOUNCER__*`
//! environment variables (for example
//! `BOUNCER__LIMITS__DEFAULT__REQUESTS_PER_MINUTE=120`).

use serde::{Deserialize, Serialize};

use crate::error::{BouncerError, Result};
use crate::ratelimit::{FailureMode, LimitPolicy, LimitType};

/// Main configuration for the limiter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BouncerConfig {
    /// Default and per-identifier limits
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Violation history
    #[serde(default)]
    pub violations: ViolationsConfig,

    /// Abuse detection and automatic blocking
    #[serde(default)]
    pub abuse: AbuseConfig,

    /// Periodic cleanup of stale data
    #[serde(default)]
    pub retention: RetentionConfig,

    /// Analytics report sizes
    #[serde(default)]
    pub analytics: AnalyticsConfig,

    /// Behaviour when the limiter itself fails
    #[serde(default)]
    pub failure_mode: FailureMode,
}

/// Limit configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Policy applied when no override matches
    #[serde(default)]
    pub default: LimitPolicy,

    /// Overrides installed at startup
    #[serde(default)]
    pub overrides: Vec<OverrideConfig>,
}

/// A per-identifier override.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverrideConfig {
    pub identifier: String,
    pub limit_type: LimitType,
    pub policy: LimitPolicy,
}

/// Violation log configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViolationsConfig {
    /// Maximum violations retained
    #[serde(default = "default_violation_capacity")]
    pub capacity: usize,
}

impl Default for ViolationsConfig {
    fn default() -> Self {
        Self {
            capacity: default_violation_capacity(),
        }
    }
}

fn default_violation_capacity() -> usize {
    crate::ratelimit::violations::DEFAULT_CAPACITY
}

/// Abuse detection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbuseConfig {
    /// How many times over a tier's limit counts as abuse
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Minimum score for automatic blocking
    #[serde(default = "default_auto_block_threshold")]
    pub auto_block_threshold: u32,

    /// Lifetime of automatic blocks in seconds; unset means they never expire
    #[serde(default)]
    pub auto_block_ttl_secs: Option<u64>,
}

impl Default for AbuseConfig {
    fn default() -> Self {
        Self {
            multiplier: default_multiplier(),
            auto_block_threshold: default_auto_block_threshold(),
            auto_block_ttl_secs: None,
        }
    }
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_auto_block_threshold() -> u32 {
    5
}

/// Retention sweeper configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Sweep interval in seconds
    #[serde(default = "default_sweep_interval")]
    pub interval_secs: u64,

    /// Age after which events and violations are dropped
    #[serde(default = "default_older_than_days")]
    pub older_than_days: u32,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_sweep_interval(),
            older_than_days: default_older_than_days(),
        }
    }
}

fn default_sweep_interval() -> u64 {
    3_600
}

fn default_older_than_days() -> u32 {
    7
}

/// Analytics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    /// Entries in the top-talkers list
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    /// Suspects included in the abuse summary
    #[serde(default = "default_top_suspects")]
    pub top_suspects: usize,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            top_n: default_top_n(),
            top_suspects: default_top_suspects(),
        }
    }
}

fn default_top_n() -> usize {
    10
}

fn default_top_suspects() -> usize {
    5
}

impl BouncerConfig {
    /// Load configuration from an optional YAML file and the environment.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(
                ::config::File::new(path, ::config::FileFormat::Yaml).required(true),
            );
        }
        builder = builder.add_source(
            ::config::Environment::with_prefix("BOUNCER")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: BouncerConfig = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| BouncerError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Parse and validate configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: BouncerConfig = serde_yaml::from_str(yaml)
            .map_err(|e| BouncerError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the limiter cannot run with.
    pub fn validate(&self) -> Result<()> {
        self.limits.default.validate()?;
        for o in &self.limits.overrides {
            if o.identifier.is_empty() {
                return Err(BouncerError::Config(
                    "limit override with empty identifier".to_string(),
                ));
            }
            o.policy.validate()?;
        }

        if !(self.abuse.multiplier.is_finite() && self.abuse.multiplier > 0.0) {
            return Err(BouncerError::Config(format!(
                "abuse.multiplier must be positive, got {}",
                self.abuse.multiplier
            )));
        }
        if self.violations.capacity == 0 {
            return Err(BouncerError::Config(
                "violations.capacity must be positive".to_string(),
            ));
        }
        if self.retention.interval_secs == 0 {
            return Err(BouncerError::Config(
                "retention.interval_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
