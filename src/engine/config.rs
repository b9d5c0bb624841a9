// SPDX-License-Identifier: MIT

//! Engine configuration

use std::env;
use std::time::Duration;

use super::error::FlowError;

pub const DEFAULT_PACING: Duration = Duration::from_millis(1000);
pub const DEFAULT_MESSAGE: &str = "This is a sample message generated by the flow execution.";

/// Knobs for how runs are paced and what chat nodes send by default
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Delay between the end of one node and the start of the next
    pub pacing: Duration,
    /// Chat payload when no upstream action produced output
    pub default_message: String,
}

impl EngineConfig {
    /// Read `FLOWLINE_PACING_MS` and `FLOWLINE_DEFAULT_MESSAGE`, falling back
    /// to the defaults for unset variables
    pub fn from_env() -> Result<Self, FlowError> {
        let mut config = Self::default();

        if let Ok(raw) = env::var("FLOWLINE_PACING_MS") {
            let millis: u64 = raw.trim().parse().map_err(|_| {
                FlowError::config(format!("FLOWLINE_PACING_MS must be an integer, got '{}'", raw))
            })?;
            config.pacing = Duration::from_millis(millis);
        }

        if let Ok(message) = env::var("FLOWLINE_DEFAULT_MESSAGE") {
            if !message.trim().is_empty() {
                config.default_message = message;
            }
        }

        Ok(config)
    }

    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn with_default_message(mut self, message: impl Into<String>) -> Self {
        self.default_message = message.into();
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pacing: DEFAULT_PACING,
            default_message: DEFAULT_MESSAGE.to_string(),
        }
    }
}
