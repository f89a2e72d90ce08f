//! Plugin lifecycle configuration.

use serde::{Deserialize, Serialize};

/// Plugin lifecycle configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// Maximum number of plugins initialized concurrently in one batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Environment name matched against lazy-plugin conditions.
    #[serde(default = "default_environment")]
    pub environment: String,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            environment: default_environment(),
        }
    }
}

fn default_batch_size() -> usize {
    5
}

fn default_environment() -> String {
    "development".to_string()
}
