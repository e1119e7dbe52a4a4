//! Controller configuration.
//!
//! Every field has a default, so an empty JSON object (or no file at all) is a
//! valid configuration. Monitor limits are given in milliseconds and turned
//! into poll counts by `ControllerConfig::monitor_config`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// What the monitor does with a poll that finds no new task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyPollPolicy {
    /// Count the poll against the budget and keep polling.
    #[default]
    Continue,
    /// Stop monitoring and report `LifecycleError::NoNewTasks`.
    Stop,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("pollIntervalMs must be greater than zero")]
    ZeroPollInterval,

    #[error("invalid controller config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ControllerConfig {
    pub poll_interval_ms: u64,

    /// Extra observation after the first running task; divided by the poll
    /// interval to get the number of settle polls.
    pub monitor_window_ms: u64,

    /// Upper bound on waiting for a running task; divided by the poll
    /// interval to get the poll budget.
    pub max_wait_ms: u64,

    pub empty_poll: EmptyPollPolicy,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2000,
            monitor_window_ms: 3000,
            max_wait_ms: 60000,
            empty_poll: EmptyPollPolicy::Continue,
        }
    }
}

/// Poll-count view of `ControllerConfig` consumed by the convergence monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorConfig {
    pub poll_interval: Duration,
    /// Polls allowed before giving up when nothing is running.
    pub max_polls: u32,
    /// Polls to keep observing once a new task is running (extended mode).
    pub settle_polls: u32,
    pub empty_poll: EmptyPollPolicy,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        ControllerConfig::default().monitor_config()
    }
}

impl ControllerConfig {
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::ZeroPollInterval);
        }
        Ok(())
    }

    /// Callers must `validate()` first; a zero interval is treated as 1ms.
    pub fn monitor_config(&self) -> MonitorConfig {
        let interval = self.poll_interval_ms.max(1);
        MonitorConfig {
            poll_interval: Duration::from_millis(interval),
            max_polls: saturate(self.max_wait_ms / interval).max(1),
            settle_polls: saturate(self.monitor_window_ms / interval),
            empty_poll: self.empty_poll,
        }
    }
}

fn saturate(n: u64) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_derive_poll_counts() {
        let monitor = ControllerConfig::default().monitor_config();
        assert_eq!(monitor.poll_interval, Duration::from_millis(2000));
        assert_eq!(monitor.max_polls, 30);
        // 3000 / 2000 (integer division)
        assert_eq!(monitor.settle_polls, 1);
        assert_eq!(monitor.empty_poll, EmptyPollPolicy::Continue);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = ControllerConfig::from_json_str(r#"{ "pollIntervalMs": 500, "emptyPoll": "stop" }"#)
            .unwrap();
        assert_eq!(config.poll_interval_ms, 500);
        assert_eq!(config.max_wait_ms, 60000);
        assert_eq!(config.empty_poll, EmptyPollPolicy::Stop);

        let monitor = config.monitor_config();
        assert_eq!(monitor.max_polls, 120);
        assert_eq!(monitor.settle_polls, 6);
    }

    #[test]
    fn zero_interval_is_rejected() {
        let err = ControllerConfig::from_json_str(r#"{ "pollIntervalMs": 0 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::ZeroPollInterval));
    }

    #[test]
    fn short_max_wait_still_allows_one_poll() {
        let config = ControllerConfig {
            max_wait_ms: 10,
            ..ControllerConfig::default()
        };
        assert_eq!(config.monitor_config().max_polls, 1);
    }
}
