//! Handles to the shared kernel components.

use std::sync::Arc;

use plughub_core::config::KernelConfig;

use crate::events::EventBus;
use crate::hooks::{HookDispatcher, HookRegistry};
use crate::messages::MessageBus;
use crate::services::ServiceRegistry;
use crate::storage::SharedStorage;

/// The communication components a kernel owns. Cloning shares them.
#[derive(Debug, Clone)]
pub struct Components {
    /// Hook dispatcher; its registry holds the hooks.
    pub hooks: Arc<HookDispatcher>,
    /// Event bus.
    pub events: Arc<EventBus>,
    /// Service registry.
    pub services: Arc<ServiceRegistry>,
    /// Shared storage.
    pub storage: Arc<SharedStorage>,
    /// Plugin mailboxes.
    pub messages: Arc<MessageBus>,
}

impl Components {
    /// Builds fresh components from configuration.
    pub fn new(config: &KernelConfig) -> Self {
        Self {
            hooks: Arc::new(HookDispatcher::new(Arc::new(HookRegistry::new()))),
            events: Arc::new(EventBus::new(&config.events)),
            services: Arc::new(ServiceRegistry::new()),
            storage: Arc::new(SharedStorage::new(config.storage.clone())),
            messages: Arc::new(MessageBus::new(&config.messages)),
        }
    }

    /// The hook registry behind the dispatcher.
    pub fn hook_registry(&self) -> &Arc<HookRegistry> {
        self.hooks.registry()
    }

    /// Removes everything a plugin registered through its context.
    ///
    /// Returns `(taps, listeners, services, storage_entries)` removed.
    pub(crate) fn release_namespace(&self, plugin: &str) -> (usize, usize, usize, usize) {
        (
            self.hook_registry().untap_plugin(plugin),
            self.events.off_namespace(plugin),
            self.services.unregister_namespace(plugin),
            self.storage.clear_namespace(plugin),
        )
    }
}

impl Default for Components {
    fn default() -> Self {
        Self::new(&KernelConfig::default())
    }
}
