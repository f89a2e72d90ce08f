//! Kernel configuration schemas.
//!
//! All configuration structs are deserialized via the `config` crate. Each
//! sub-module represents a logical configuration section, and every field
//! carries a serde default so an empty source still yields a usable kernel.

pub mod cache;
pub mod events;
pub mod lifecycle;
pub mod logging;
pub mod messages;
pub mod storage;

use serde::{Deserialize, Serialize};

use self::cache::CacheConfig;
use self::events::EventsConfig;
use self::lifecycle::LifecycleConfig;
use self::logging::LoggingConfig;
use self::messages::MessagesConfig;
use self::storage::StorageConfig;

use crate::error::KernelError;

/// Root kernel configuration.
///
/// This struct is the top-level deserialization target for the merged
/// configuration files (default + environment overlay) and environment
/// variables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KernelConfig {
    /// Event bus settings.
    #[serde(default)]
    pub events: EventsConfig,
    /// Shared storage settings.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Plugin lifecycle settings.
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
    /// Plugin mailbox settings.
    #[serde(default)]
    pub messages: MessagesConfig,
    /// Lazy-plugin instance cache settings.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl KernelConfig {
    /// Load configuration from files and the environment.
    ///
    /// Merges `config/default` with an environment-specific overlay
    /// `config/{env}` (both optional, any format the `config` crate
    /// understands) and environment variables prefixed with `PLUGHUB__`.
    pub fn load(env: &str) -> Result<Self, KernelError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("PLUGHUB")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| KernelError::Configuration(format!("Failed to build config: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| KernelError::Configuration(format!("Failed to deserialize config: {e}")))
    }

    /// Parse configuration from a TOML string, filling unspecified fields
    /// with their defaults.
    pub fn from_toml_str(source: &str) -> Result<Self, KernelError> {
        config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()?
            .try_deserialize()
            .map_err(KernelError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = KernelConfig::default();
        assert_eq!(config.events.history_size, 1000);
        assert_eq!(config.events.default_timeout_ms, 5000);
        assert_eq!(config.storage.default_namespace, "default");
        assert_eq!(config.storage.global_namespace, "global");
        assert_eq!(config.lifecycle.batch_size, 5);
        assert_eq!(config.cache.max_size, 50);
        assert_eq!(config.messages.mailbox_capacity, 1000);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = KernelConfig::from_toml_str(
            r#"
            [events]
            history_size = 10

            [cache]
            max_size = 2
            "#,
        )
        .unwrap();
        assert_eq!(config.events.history_size, 10);
        assert_eq!(config.events.default_timeout_ms, 5000);
        assert_eq!(config.cache.max_size, 2);
        assert_eq!(config.cache.ttl_seconds, 3600);
        assert!(config.storage.eager_expiry);
    }

    #[test]
    fn test_invalid_toml_is_configuration_error() {
        let err = KernelConfig::from_toml_str("[events]\nhistory_size = \"many\"").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Configuration);
    }
}
