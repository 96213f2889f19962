use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Connection worker configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Channel name attached to log lines and the thread name.
    pub name: String,
    /// Delay before reconnecting, in milliseconds. Any negative value selects
    /// manual mode, which disables automatic reconnects.
    pub reconnect_interval_ms: i64,
    /// Connect timeout for reconnect attempts.
    pub reconnect_timeout_ms: u64,
    /// Readiness wait per receive poll.
    pub poll_timeout_ms: u64,
}

impl WorkerConfig {
    /// Default config with the given channel name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Parse a config from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reconnect delay, or `None` in manual mode.
    pub fn reconnect_interval(&self) -> Option<Duration> {
        u64::try_from(self.reconnect_interval_ms)
            .ok()
            .map(Duration::from_millis)
    }

    /// Reconnect connect timeout as a `Duration`.
    pub fn reconnect_timeout(&self) -> Duration {
        Duration::from_millis(self.reconnect_timeout_ms)
    }

    /// Receive poll timeout as a `Duration`.
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            name: "worker".to_string(),
            reconnect_interval_ms: 3000,
            reconnect_timeout_ms: 1000,
            poll_timeout_ms: 1000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_json_fills_defaults() {
        let config = WorkerConfig::from_json(r#"{"name": "TM_SVR", "reconnect_interval_ms": -1}"#).unwrap();
        assert_eq!(config.name, "TM_SVR");
        assert_eq!(config.reconnect_interval_ms, -1);
        assert_eq!(config.reconnect_interval(), None);
        assert_eq!(config.reconnect_timeout_ms, 1000);
        assert_eq!(config.poll_timeout(), Duration::from_secs(1));
    }

    #[test]
    fn default_interval_is_three_seconds() {
        assert_eq!(
            WorkerConfig::default().reconnect_interval(),
            Some(Duration::from_secs(3))
        );
    }

    #[test]
    fn from_json_rejects_bad_types() {
        assert!(WorkerConfig::from_json(r#"{"poll_timeout_ms": "soon"}"#).is_err());
    }
}
