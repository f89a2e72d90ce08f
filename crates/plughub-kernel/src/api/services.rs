//! Service access for plugins.

use std::any::Any;
use std::sync::Arc;

use plughub_core::result::KernelResult;

use crate::services::{ServiceFactory, ServiceInstance, ServiceOptions, ServiceRegistry};

/// Service view scoped to one plugin.
#[derive(Debug, Clone, Copy)]
pub struct ContextServices<'a> {
    plugin: &'a str,
    registry: &'a ServiceRegistry,
}

impl<'a> ContextServices<'a> {
    pub(crate) fn new(plugin: &'a str, registry: &'a ServiceRegistry) -> Self {
        Self { plugin, registry }
    }

    fn qualified(&self, name: &str) -> String {
        format!("{}.{name}", self.plugin)
    }

    /// Looks in the plugin's namespace first, then takes `name` as given.
    fn lookup_name(&self, name: &str) -> String {
        let own = self.qualified(name);
        if self.registry.has(&own) {
            own
        } else {
            name.to_string()
        }
    }

    /// Registers `plugin.name`. Returns the qualified name.
    pub async fn register(
        &self,
        name: &str,
        factory: ServiceFactory,
        options: ServiceOptions,
    ) -> KernelResult<String> {
        let qualified = self.qualified(name);
        self.registry.register(&qualified, factory, options).await?;
        Ok(qualified)
    }

    /// Resolves a service.
    pub async fn get(&self, name: &str) -> KernelResult<ServiceInstance> {
        self.registry.get(&self.lookup_name(name)).await
    }

    /// Resolves a service as `T`.
    pub async fn get_as<T: Any + Send + Sync>(&self, name: &str) -> KernelResult<Arc<T>> {
        self.registry.get_as::<T>(&self.lookup_name(name)).await
    }

    /// Whether the service resolves from this plugin.
    pub fn has(&self, name: &str) -> bool {
        self.registry.has(&self.lookup_name(name))
    }

    /// Unregisters one of the plugin's own services.
    pub fn unregister(&self, name: &str) -> KernelResult<()> {
        self.registry.unregister(&self.qualified(name))
    }
}
