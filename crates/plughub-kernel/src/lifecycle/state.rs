//! Plugin lifecycle states and records.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a plugin.
///
/// `Registered → Initialized → Enabled ⇄ Disabled → Destroyed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginState {
    /// Known to the manager; no plugin code has run.
    Registered,
    /// `init` succeeded.
    Initialized,
    /// `enable` succeeded.
    Enabled,
    /// `disable` succeeded; may be re-enabled.
    Disabled,
    /// `destroy` ran. Terminal.
    Destroyed,
}

impl PluginState {
    /// Whether the plugin has completed `init` and not been destroyed.
    pub fn is_ready(self) -> bool {
        matches!(self, Self::Initialized | Self::Enabled | Self::Disabled)
    }

    /// Whether `enable` is a legal transition from this state.
    pub fn can_enable(self) -> bool {
        matches!(self, Self::Initialized | Self::Disabled)
    }

    /// Returns the state as a string slice.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Registered => "registered",
            Self::Initialized => "initialized",
            Self::Enabled => "enabled",
            Self::Disabled => "disabled",
            Self::Destroyed => "destroyed",
        }
    }
}

impl fmt::Display for PluginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata the manager keeps about a plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginRecord {
    /// Unique plugin name.
    pub name: String,
    /// Plugin version string.
    pub version: String,
    /// Current lifecycle state.
    pub state: PluginState,
    /// Names of plugins this one depends on.
    pub dependencies: Vec<String>,
    /// Registration sequence number.
    pub seq: u64,
    /// Registration time.
    pub registered_at: DateTime<Utc>,
    /// When `init` last succeeded.
    pub initialized_at: Option<DateTime<Utc>>,
    /// When `enable` last succeeded.
    pub enabled_at: Option<DateTime<Utc>>,
    /// Most recent lifecycle failure.
    pub last_error: Option<String>,
}
