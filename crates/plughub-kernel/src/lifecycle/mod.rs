//! Plugin lifecycle: the plugin trait, its state machine, and the manager
//! that drives plugins through it in dependency order.

pub mod manager;
pub(crate) mod order;
pub mod plugin;
pub mod registry;
pub mod state;

pub use manager::{InitReport, LifecycleReport, PluginFailure, PluginManager, SystemStatus};
pub use plugin::Plugin;
pub use registry::PluginRegistry;
pub use state::{PluginRecord, PluginState};
