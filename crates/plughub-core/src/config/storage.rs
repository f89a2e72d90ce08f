//! Shared storage configuration.

use serde::{Deserialize, Serialize};

/// Shared key/value storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Namespace used when a caller does not name one.
    #[serde(default = "default_namespace")]
    pub default_namespace: String,
    /// Namespace reserved for intentionally shared state.
    #[serde(default = "default_global_namespace")]
    pub global_namespace: String,
    /// Whether to schedule a timer that deletes entries at TTL expiry.
    #[serde(default = "default_true")]
    pub eager_expiry: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            default_namespace: default_namespace(),
            global_namespace: default_global_namespace(),
            eager_expiry: true,
        }
    }
}

fn default_namespace() -> String {
    "default".to_string()
}

fn default_global_namespace() -> String {
    "global".to_string()
}

fn default_true() -> bool {
    true
}
