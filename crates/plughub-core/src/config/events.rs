//! Event bus configuration.

use serde::{Deserialize, Serialize};

/// Event bus configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsConfig {
    /// Maximum number of records kept in the emission history ring buffer.
    #[serde(default = "default_history_size")]
    pub history_size: usize,
    /// Per-listener budget for concurrent emissions, in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            history_size: default_history_size(),
            default_timeout_ms: default_timeout_ms(),
        }
    }
}

fn default_history_size() -> usize {
    1000
}

fn default_timeout_ms() -> u64 {
    5000
}
