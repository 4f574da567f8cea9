#![forbid(unsafe_code)]

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Pause between periodic refreshes while watching.
    pub refresh_interval: Duration,
    /// Deadline for a single listing call.
    pub fetch_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { refresh_interval: DEFAULT_REFRESH_INTERVAL, fetch_timeout: DEFAULT_FETCH_TIMEOUT }
    }
}

impl EngineConfig {
    pub fn with_refresh_interval(mut self, every: Duration) -> Self {
        self.refresh_interval = every;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn normalized(self) -> Self {
        Self {
            refresh_interval: if self.refresh_interval.is_zero() { DEFAULT_REFRESH_INTERVAL } else { self.refresh_interval },
            fetch_timeout: if self.fetch_timeout.is_zero() { DEFAULT_FETCH_TIMEOUT } else { self.fetch_timeout },
        }
    }

    /// Defaults overridden by `CUMULUS_REFRESH_SECS` and `CUMULUS_FETCH_TIMEOUT_SECS`.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Some(d) = env_secs("CUMULUS_REFRESH_SECS") {
            cfg.refresh_interval = d;
        }
        if let Some(d) = env_secs("CUMULUS_FETCH_TIMEOUT_SECS") {
            cfg.fetch_timeout = d;
        }
        cfg.normalized()
    }
}

fn env_secs(key: &str) -> Option<Duration> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse::<f64>().ok().and_then(|s| Duration::try_from_secs_f64(s).ok()) {
        Some(d) => Some(d),
        None => {
            warn!(key, value = %raw, "ignoring unparseable duration");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_values_fall_back() {
        let cfg = EngineConfig { refresh_interval: Duration::ZERO, fetch_timeout: Duration::ZERO }.normalized();
        assert_eq!(cfg, EngineConfig::default());
    }

    #[test]
    fn deserializes_partial() {
        let cfg: EngineConfig =
            serde_json::from_value(serde_json::json!({ "refresh_interval": { "secs": 2, "nanos": 0 } })).unwrap();
        assert_eq!(cfg.refresh_interval, Duration::from_secs(2));
        assert_eq!(cfg.fetch_timeout, DEFAULT_FETCH_TIMEOUT);
    }
}
