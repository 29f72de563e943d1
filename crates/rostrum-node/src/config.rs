//! Node configuration.

use rostrum_store::SettleConfig;
use std::time::Duration;

/// Configuration for a Rostrum node.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Settle window used when collecting snapshots before counting.
    /// A heuristic for store propagation latency, not a guarantee.
    pub settle: SettleConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl NodeConfig {
    /// Create config from environment variables with sensible defaults.
    ///
    /// - `ROSTRUM_SETTLE_MS` - quiet window in milliseconds (default 200)
    /// - `ROSTRUM_SETTLE_DEADLINE_MS` - collection cap in milliseconds
    ///   (default 2000)
    pub fn from_env() -> Self {
        let defaults = SettleConfig::default();
        let quiet = env_millis("ROSTRUM_SETTLE_MS").unwrap_or(defaults.quiet);
        let deadline = env_millis("ROSTRUM_SETTLE_DEADLINE_MS").unwrap_or(defaults.deadline);
        Self {
            settle: SettleConfig { quiet, deadline },
        }
    }

    /// Config with no settle delay, for tests.
    pub fn immediate() -> Self {
        Self {
            settle: SettleConfig::immediate(),
        }
    }
}

fn env_millis(key: &str) -> Option<Duration> {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.parse::<u64>().ok())
        .map(Duration::from_millis)
}
