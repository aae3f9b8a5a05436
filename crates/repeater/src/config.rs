//! Retry policy configuration
//!
//! Policies are read from YAML, for example:
//!
//! ```yaml
//! default:
//!   max-attempts: 3
//!   strategy:
//!     type: fixed
//!     delay-ms: 500
//! operations:
//!   download:
//!     max-attempts: 5
//!     strategy:
//!       type: backoff
//!       initial-delay-ms: 100
//!       kind: exponential
//!       max-delay-ms: 10000
//!       jitter: 0.2
//! ```
//!
//! Environment variables (`REPEATER_*` prefix) override file values.

use crate::error::{Error, Result};
use crate::retry::{
    Backoff, BackoffType, FixedDelay, Repeater, Strategy, TracingObserver, DEFAULT_JITTER,
    DEFAULT_MULTIPLIER,
};
use camino::Utf8Path;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::sync::Arc;
use std::time::Duration;

/// Delay strategy section of a policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum StrategyConfig {
    /// Same delay before every retry
    #[serde(rename_all = "kebab-case")]
    Fixed {
        #[serde(default = "default_delay_ms")]
        delay_ms: u64,
    },

    /// Growing delay with cap and jitter
    #[serde(rename_all = "kebab-case")]
    Backoff {
        #[serde(default = "default_delay_ms")]
        initial_delay_ms: u64,

        #[serde(default)]
        kind: BackoffType,

        /// `0` disables the cap
        #[serde(default = "default_max_delay_ms")]
        max_delay_ms: u64,

        #[serde(default = "default_jitter")]
        jitter: f64,

        #[serde(default = "default_multiplier")]
        multiplier: f64,
    },
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self::Fixed {
            delay_ms: default_delay_ms(),
        }
    }
}

/// Retry policy for one operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RetryConfig {
    /// Maximum number of operation calls
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default)]
    pub strategy: StrategyConfig,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            strategy: StrategyConfig::default(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}
fn default_delay_ms() -> u64 {
    1000
}
fn default_max_delay_ms() -> u64 {
    30_000
}
fn default_jitter() -> f64 {
    DEFAULT_JITTER
}
fn default_multiplier() -> f64 {
    DEFAULT_MULTIPLIER
}

impl RetryConfig {
    /// Apply `REPEATER_*` environment variable overrides
    ///
    /// `REPEATER_DELAY_MS` sets the fixed delay or the initial backoff delay;
    /// `REPEATER_MAX_DELAY_MS` and `REPEATER_JITTER` only apply to backoff.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(val) = env::var("REPEATER_MAX_ATTEMPTS") {
            self.max_attempts = val.parse().map_err(|_| {
                Error::invalid_config("REPEATER_MAX_ATTEMPTS must be a valid number")
            })?;
        }

        if let Ok(val) = env::var("REPEATER_DELAY_MS") {
            let delay: u64 = val
                .parse()
                .map_err(|_| Error::invalid_config("REPEATER_DELAY_MS must be a valid number"))?;
            match &mut self.strategy {
                StrategyConfig::Fixed { delay_ms } => *delay_ms = delay,
                StrategyConfig::Backoff {
                    initial_delay_ms, ..
                } => *initial_delay_ms = delay,
            }
        }

        if let StrategyConfig::Backoff {
            max_delay_ms,
            jitter,
            ..
        } = &mut self.strategy
        {
            if let Ok(val) = env::var("REPEATER_MAX_DELAY_MS") {
                *max_delay_ms = val.parse().map_err(|_| {
                    Error::invalid_config("REPEATER_MAX_DELAY_MS must be a valid number")
                })?;
            }

            if let Ok(val) = env::var("REPEATER_JITTER") {
                *jitter = val
                    .parse()
                    .map_err(|_| Error::invalid_config("REPEATER_JITTER must be a valid number"))?;
            }
        }

        Ok(())
    }

    /// Reject values the strategies would otherwise silently clamp
    pub fn validate(&self) -> Result<()> {
        if let StrategyConfig::Backoff {
            jitter, multiplier, ..
        } = self.strategy
        {
            if !(0.0..=1.0).contains(&jitter) {
                return Err(Error::invalid_config(format!(
                    "jitter must be between 0.0 and 1.0, got {}",
                    jitter
                )));
            }
            if !multiplier.is_finite() || multiplier < 1.0 {
                return Err(Error::invalid_config(format!(
                    "multiplier must be a finite number of at least 1.0, got {}",
                    multiplier
                )));
            }
        }
        Ok(())
    }

    pub fn build_strategy(&self) -> Arc<dyn Strategy> {
        match self.strategy {
            StrategyConfig::Fixed { delay_ms } => {
                Arc::new(FixedDelay::new(Duration::from_millis(delay_ms)))
            }
            StrategyConfig::Backoff {
                initial_delay_ms,
                kind,
                max_delay_ms,
                jitter,
                multiplier,
            } => Arc::new(
                Backoff::new(Duration::from_millis(initial_delay_ms))
                    .with_type(kind)
                    .with_max_delay(Duration::from_millis(max_delay_ms))
                    .with_jitter(jitter)
                    .with_multiplier(multiplier),
            ),
        }
    }

    /// Validate and build a repeater with the default observer
    pub fn build(&self) -> Result<Repeater> {
        self.validate()?;
        Ok(Repeater::with_shared_strategy(
            self.max_attempts,
            self.build_strategy(),
        ))
    }
}

/// Named retry policies with a fallback default
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RetryPoliciesConfig {
    /// Policy for operations without their own entry
    #[serde(default)]
    pub default: RetryConfig,

    /// Per-operation policies
    #[serde(default)]
    pub operations: HashMap<String, RetryConfig>,
}

impl RetryPoliciesConfig {
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        Ok(serde_yaml_ng::from_str(content)?)
    }

    /// Load policies from a YAML file
    pub fn load(path: &Utf8Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::config_not_found(path.as_str())
            } else {
                Error::Io(e)
            }
        })?;

        tracing::debug!(path = %path, "loading retry policies");
        Self::from_yaml_str(&content)
    }

    /// Load, apply environment overrides and validate
    pub fn load_and_validate(path: &Utf8Path) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `REPEATER_*` overrides to the default and every named policy
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.default.apply_env_overrides()?;
        for policy in self.operations.values_mut() {
            policy.apply_env_overrides()?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.default
            .validate()
            .map_err(|e| Error::invalid_config(format!("default policy: {}", e)))?;

        for (name, policy) in &self.operations {
            policy
                .validate()
                .map_err(|e| Error::invalid_config(format!("operation '{}': {}", name, e)))?;
        }
        Ok(())
    }

    /// Policy for `operation`, falling back to the default
    pub fn for_operation(&self, operation: &str) -> &RetryConfig {
        self.operations.get(operation).unwrap_or(&self.default)
    }

    /// Repeater for `operation`, logging under the operation's name
    pub fn repeater_for(&self, operation: &str) -> Result<Repeater> {
        Ok(self
            .for_operation(operation)
            .build()?
            .with_observer(TracingObserver::new(operation)))
    }
}
