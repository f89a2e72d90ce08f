//! Plugin context: the scoped view of the kernel handed to `Plugin::init`.
//!
//! Everything a plugin registers through its context is tagged with the
//! plugin's name, so unloading the plugin removes it again.

use std::sync::{Arc, Weak};

use serde_json::Value;
use tracing::{Level, debug, error, info, trace, warn};

use plughub_core::error::KernelError;
use plughub_core::result::KernelResult;

use super::events::ContextEvents;
use super::hooks::ContextHooks;
use super::messages::ContextMessages;
use super::services::ContextServices;
use super::storage::ContextStorage;
use crate::components::Components;
use crate::lifecycle::registry::PluginRegistry;

/// Context passed to a plugin's `init`.
///
/// Cloning is cheap; a plugin may keep a clone for use in its callbacks.
#[derive(Clone)]
pub struct PluginContext {
    /// Owning plugin, also its namespace.
    plugin: Arc<str>,
    /// Shared kernel components.
    components: Components,
    /// Used for direct calls.
    plugins: Weak<PluginRegistry>,
}

impl PluginContext {
    pub(crate) fn new(plugin: &str, components: Components, plugins: Weak<PluginRegistry>) -> Self {
        Self {
            plugin: Arc::from(plugin),
            components,
            plugins,
        }
    }

    /// Name of the owning plugin.
    pub fn plugin_name(&self) -> &str {
        &self.plugin
    }

    /// Hook access.
    pub fn hooks(&self) -> ContextHooks<'_> {
        ContextHooks::new(&self.plugin, &self.components.hooks)
    }

    /// Event access. Listeners are tagged with the plugin's namespace and
    /// emissions are sourced from the plugin.
    pub fn events(&self) -> ContextEvents<'_> {
        ContextEvents::new(&self.plugin, &self.components.events)
    }

    /// Service access. Registrations land under `plugin.name`.
    pub fn services(&self) -> ContextServices<'_> {
        ContextServices::new(&self.plugin, &self.components.services)
    }

    /// Storage scoped to the plugin's namespace.
    pub fn storage(&self) -> ContextStorage<'_> {
        ContextStorage::new(&self.plugin, &self.components.storage)
    }

    /// Mailbox access.
    pub fn messages(&self) -> ContextMessages<'_> {
        ContextMessages::new(&self.plugin, &self.components.messages)
    }

    /// Calls `method` on another plugin.
    pub async fn call(&self, plugin: &str, method: &str, args: Vec<Value>) -> KernelResult<Value> {
        let registry = self
            .plugins
            .upgrade()
            .ok_or_else(|| KernelError::UnknownPlugin(plugin.to_string()))?;
        registry.call(&self.plugin, plugin, method, args).await
    }

    /// Logs a message tagged with the plugin's name.
    pub fn log(&self, level: Level, message: &str) {
        let plugin = &*self.plugin;
        match level {
            Level::ERROR => error!(plugin = %plugin, "{message}"),
            Level::WARN => warn!(plugin = %plugin, "{message}"),
            Level::INFO => info!(plugin = %plugin, "{message}"),
            Level::DEBUG => debug!(plugin = %plugin, "{message}"),
            _ => trace!(plugin = %plugin, "{message}"),
        }
    }
}

impl std::fmt::Debug for PluginContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginContext")
            .field("plugin", &self.plugin)
            .finish_non_exhaustive()
    }
}
