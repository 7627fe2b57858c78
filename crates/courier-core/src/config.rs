//! Runtime configuration.
//!
//! Every field has a default, so an empty JSON object is a valid config:
//!
//! ```json
//! {
//!   "default_policy": "replace",
//!   "max_cycles_per_run": 16,
//!   "default_channel": 0,
//!   "driver": { "tick_interval_ms": 16, "drain_fully": true }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::app::handlers::SubscriptionPolicy;
use crate::domain::channel::CHANNEL_COUNT;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config parse: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Policy used by `RuntimeState::on` when none is given.
    pub default_policy: SubscriptionPolicy,
    /// Upper bound on snapshot cycles in one `run(true)` call.
    pub max_cycles_per_run: usize,
    /// Channel used for remote activations.
    pub default_channel: u8,
    pub driver: DriverConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            default_policy: SubscriptionPolicy::Replace,
            max_cycles_per_run: 16,
            default_channel: 0,
            driver: DriverConfig::default(),
        }
    }
}

impl RuntimeConfig {
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_cycles_per_run == 0 {
            return Err(ConfigError::Invalid(
                "max_cycles_per_run must be at least 1".into(),
            ));
        }
        if usize::from(self.default_channel) >= CHANNEL_COUNT {
            return Err(ConfigError::Invalid(format!(
                "default_channel {} is out of range (0..=15)",
                self.default_channel
            )));
        }
        self.driver.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    pub tick_interval_ms: u64,
    pub drain_fully: bool,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 16,
            drain_fully: true,
        }
    }
}

impl DriverConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "driver.tick_interval_ms must be positive".into(),
            ));
        }
        Ok(())
    }
}
