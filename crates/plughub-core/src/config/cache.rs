//! Lazy-plugin instance cache configuration.

use serde::{Deserialize, Serialize};

/// Instance cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of cached instances before LRU eviction.
    #[serde(default = "default_max_size")]
    pub max_size: usize,
    /// Lifetime of a cached instance in seconds.
    #[serde(default = "default_ttl")]
    pub ttl_seconds: u64,
    /// Interval of the background cleanup task in seconds.
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: default_max_size(),
            ttl_seconds: default_ttl(),
            cleanup_interval_seconds: default_cleanup_interval(),
        }
    }
}

fn default_max_size() -> usize {
    50
}

fn default_ttl() -> u64 {
    3600
}

fn default_cleanup_interval() -> u64 {
    300
}
