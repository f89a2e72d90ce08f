//! The kernel: owns every registry and exposes the host-facing API.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::FutureExt;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use plughub_core::config::KernelConfig;
use plughub_core::result::KernelResult;

use crate::components::Components;
use crate::events::{EventBus, EventBusStats};
use crate::hooks::{HookDispatcher, HookRegistry};
use crate::lazy::{CacheStats, InstanceCache, LazyConditions, LazyLoader, LoadContext, PluginLoader};
use crate::lifecycle::{
    InitReport, LifecycleReport, Plugin, PluginManager, PluginState, SystemStatus,
};
use crate::messages::{MessageBus, MessageStats};
use crate::services::{ServiceRegistry, ServiceStats};
use crate::storage::{SharedStorage, StorageStats};

/// How [`Kernel::register`] treats a plugin.
#[derive(Debug, Clone, Default)]
pub struct RegisterOptions {
    /// Defer the plugin until [`Kernel::check_and_load`] activates it.
    pub lazy: bool,
    /// Conditions for a lazy plugin.
    pub lazy_conditions: LazyConditions,
    /// Unload an existing plugin of the same name first.
    pub force_reload: bool,
}

impl RegisterOptions {
    /// Lazy registration gated by `conditions`.
    pub fn lazy(conditions: LazyConditions) -> Self {
        Self {
            lazy: true,
            lazy_conditions: conditions,
            ..Self::default()
        }
    }

    /// Replace any plugin already registered under the same name.
    pub fn force_reload() -> Self {
        Self {
            force_reload: true,
            ..Self::default()
        }
    }
}

/// Counters from every communication component.
#[derive(Debug, Clone, Serialize)]
pub struct CommunicationStats {
    /// Event bus.
    pub events: EventBusStats,
    /// Mailboxes.
    pub messages: MessageStats,
    /// Service registry.
    pub services: ServiceStats,
    /// Shared storage.
    pub storage: StorageStats,
    /// Hooks created.
    pub hooks: usize,
    /// Taps across all hooks.
    pub taps: usize,
    /// Direct plugin calls dispatched.
    pub plugin_calls: u64,
    /// Lazy instance cache.
    pub cache: CacheStats,
}

/// A plugin kernel. Each instance is fully isolated from every other.
pub struct Kernel {
    config: KernelConfig,
    manager: PluginManager,
    lazy: LazyLoader,
    /// Set once `init_all` has run; later activations init and enable.
    started: AtomicBool,
    /// Serializes lazy activation.
    activation: tokio::sync::Mutex<()>,
    cleanup: Mutex<Option<JoinHandle<()>>>,
}

impl Kernel {
    /// Creates a kernel with fresh components.
    pub fn new(config: KernelConfig) -> Self {
        let components = Components::new(&config);
        info!(
            history_size = config.events.history_size,
            batch_size = config.lifecycle.batch_size,
            environment = %config.lifecycle.environment,
            "Kernel created"
        );
        Self {
            manager: PluginManager::new(components, config.lifecycle.clone()),
            lazy: LazyLoader::new(&config.cache),
            started: AtomicBool::new(false),
            activation: tokio::sync::Mutex::new(()),
            cleanup: Mutex::new(None),
            config,
        }
    }

    /// Registers a plugin, eagerly or lazily.
    pub async fn register(&self, plugin: Arc<dyn Plugin>, options: RegisterOptions) -> KernelResult<()> {
        let name = plugin.name().to_string();

        if options.force_reload {
            if self.manager.plugin_registry().contains(&name) {
                info!(plugin = %name, "Force reload, unloading existing plugin");
                self.manager.unload_plugin(&name).await?;
            }
            if self.lazy.forget(&name) {
                info!(plugin = %name, "Force reload, dropped lazy registration");
            }
        }

        if options.lazy {
            let loader: PluginLoader = Arc::new(move || {
                let plugin = plugin.clone();
                async move { Ok::<_, anyhow::Error>(plugin) }.boxed()
            });
            return self.lazy.register_loader(&name, loader, options.lazy_conditions);
        }

        self.manager.register(plugin)?;
        Ok(())
    }

    /// Registers a plugin built on first activation by `loader`.
    pub fn register_lazy<F, Fut>(
        &self,
        name: &str,
        loader: F,
        conditions: LazyConditions,
    ) -> KernelResult<()>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Arc<dyn Plugin>>> + Send + 'static,
    {
        self.lazy.register_lazy(name, loader, conditions)
    }

    /// Activates a lazy plugin if its conditions hold.
    ///
    /// The loaded plugin is registered like an eager one. If the kernel has
    /// already started it is also initialized and enabled. Returns whether
    /// the plugin is now registered.
    pub async fn check_and_load(&self, name: &str, context: &LoadContext) -> KernelResult<bool> {
        let _guard = self.activation.lock().await;

        let Some(plugin) = self.lazy.check_and_load(name, context).await? else {
            return Ok(false);
        };
        let plugin_name = plugin.name().to_string();
        let registry = self.manager.plugin_registry();

        if !registry.contains(&plugin_name) {
            self.manager.register(plugin)?;
            info!(plugin = %plugin_name, "Lazy plugin activated");
        }

        if self.started.load(Ordering::Acquire) {
            if registry.state(&plugin_name) == Some(PluginState::Registered) {
                self.manager.init_plugin(&plugin_name).await?;
            }
            if registry
                .state(&plugin_name)
                .is_some_and(PluginState::can_enable)
            {
                self.manager.enable_plugin(&plugin_name).await?;
            }
        }
        Ok(true)
    }

    /// A load context for the configured environment.
    pub fn load_context(&self) -> LoadContext {
        LoadContext::new(self.config.lifecycle.environment.clone())
    }

    /// Initializes every registered plugin in dependency order.
    pub async fn init_all(&self) -> KernelResult<InitReport> {
        let report = self.manager.init_all().await?;
        self.started.store(true, Ordering::Release);
        Ok(report)
    }

    /// Enables every initialized plugin.
    pub async fn enable_all(&self) -> LifecycleReport {
        self.manager.enable_all().await
    }

    /// Disables every enabled plugin.
    pub async fn disable_all(&self) -> LifecycleReport {
        self.manager.disable_all().await
    }

    /// Unloads a plugin and forgets any lazy registration of it.
    pub async fn unload_plugin(&self, name: &str) -> KernelResult<()> {
        self.lazy.forget(name);
        self.manager.unload_plugin(name).await
    }

    /// Unloads every plugin and stops background tasks.
    pub async fn shutdown(&self) {
        self.stop_cache_cleanup();
        self.manager.unload_all().await;
        self.lazy.cache().clear();
        self.started.store(false, Ordering::Release);
        info!("Kernel shut down");
    }

    /// Plugin counts by state.
    pub fn get_system_status(&self) -> SystemStatus {
        self.manager.status()
    }

    /// Counters from every communication component.
    pub fn get_communication_stats(&self) -> CommunicationStats {
        let components = self.manager.components();
        let hooks = components.hook_registry();
        CommunicationStats {
            events: components.events.stats(),
            messages: components.messages.stats(),
            services: components.services.stats(),
            storage: components.storage.stats(),
            hooks: hooks.hook_names().len(),
            taps: hooks.total_taps(),
            plugin_calls: self.manager.plugin_registry().call_count(),
            cache: self.lazy.cache().stats(),
        }
    }

    /// Starts periodic purging of the lazy instance cache, using the
    /// configured interval. Replaces a running cleanup task.
    pub fn start_cache_cleanup(&self) {
        let interval = Duration::from_secs(self.config.cache.cleanup_interval_seconds.max(1));
        let handle = InstanceCache::spawn_cleanup(self.lazy.cache(), interval);
        let mut cleanup = self.cleanup.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = cleanup.replace(handle) {
            warn!("Replacing running cache cleanup task");
            previous.abort();
        }
    }

    fn stop_cache_cleanup(&self) {
        let mut cleanup = self.cleanup.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(handle) = cleanup.take() {
            handle.abort();
        }
    }

    /// The lifecycle manager.
    pub fn plugins(&self) -> &PluginManager {
        &self.manager
    }

    /// The lazy loader.
    pub fn lazy_loader(&self) -> &LazyLoader {
        &self.lazy
    }

    /// The shared components.
    pub fn components(&self) -> &Components {
        self.manager.components()
    }

    /// The hook dispatcher.
    pub fn hooks(&self) -> &Arc<HookDispatcher> {
        &self.components().hooks
    }

    /// The hook registry.
    pub fn hook_registry(&self) -> &Arc<HookRegistry> {
        self.components().hook_registry()
    }

    /// The event bus.
    pub fn events(&self) -> &Arc<EventBus> {
        &self.components().events
    }

    /// The service registry.
    pub fn services(&self) -> &Arc<ServiceRegistry> {
        &self.components().services
    }

    /// Shared storage.
    pub fn storage(&self) -> &Arc<SharedStorage> {
        &self.components().storage
    }

    /// Plugin mailboxes.
    pub fn messages(&self) -> &Arc<MessageBus> {
        &self.components().messages
    }

    /// The configuration the kernel was built from.
    pub fn config(&self) -> &KernelConfig {
        &self.config
    }
}

impl Default for Kernel {
    fn default() -> Self {
        Self::new(KernelConfig::default())
    }
}

impl Drop for Kernel {
    fn drop(&mut self) {
        self.stop_cache_cleanup();
    }
}

impl std::fmt::Debug for Kernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Kernel")
            .field("manager", &self.manager)
            .field("lazy", &self.lazy)
            .field("started", &self.started.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
