//! Player configuration (serde, JSON on disk).

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::status::CachingStrategy;

/// Upper bound for the start debounce.
pub const MAX_DEBOUNCE_MS: u64 = 1000;

/// Process-wide player settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Caching policy applied to every subsequent load.
    pub caching_strategy: CachingStrategy,
    /// Delay before the animation loop starts consuming frames.
    pub debounce_ms: u64,
    /// Lower bound for non-negative frame delays (0 = use declared delays).
    pub min_frame_delay_ms: u64,
    /// Prefix for the names of spawned worker threads.
    pub thread_name_prefix: String,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            caching_strategy: CachingStrategy::Disabled,
            debounce_ms: 5,
            min_frame_delay_ms: 0,
            thread_name_prefix: "gifplay".to_string(),
        }
    }
}

impl PlayerConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a JSON config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.debounce_ms > MAX_DEBOUNCE_MS {
            return Err(ConfigError::Invalid {
                reason: format!(
                    "debounce_ms must be <= {MAX_DEBOUNCE_MS}, got {}",
                    self.debounce_ms
                ),
            });
        }
        if self.thread_name_prefix.trim().is_empty() {
            return Err(ConfigError::Invalid {
                reason: "thread_name_prefix must not be empty".to_string(),
            });
        }
        Ok(())
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Sleep duration for a frame with the given declared delay.
    ///
    /// Returns `None` for negative (terminal) delays.
    pub fn frame_delay(&self, declared_ms: i32) -> Option<Duration> {
        if declared_ms < 0 {
            return None;
        }
        Some(Duration::from_millis(
            (declared_ms as u64).max(self.min_frame_delay_ms),
        ))
    }

    pub fn thread_name(&self, role: &str) -> String {
        format!("{}-{role}", self.thread_name_prefix)
    }
}
