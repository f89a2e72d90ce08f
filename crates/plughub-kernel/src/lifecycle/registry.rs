//! Plugin registry: stores plugin instances and their lifecycle records.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info};

use plughub_core::error::KernelError;
use plughub_core::result::KernelResult;

use super::plugin::Plugin;
use super::state::{PluginRecord, PluginState};
use crate::guard::guarded;

struct PluginSlot {
    plugin: Arc<dyn Plugin>,
    record: PluginRecord,
    /// A lifecycle step is running.
    busy: bool,
}

/// A claimed lifecycle step. Dropping it releases the claim.
pub(crate) struct Transition<'a> {
    registry: &'a PluginRegistry,
    /// The plugin being transitioned.
    pub(crate) plugin: Arc<dyn Plugin>,
    /// Its record at the time of the claim.
    pub(crate) record: PluginRecord,
}

impl Drop for Transition<'_> {
    fn drop(&mut self) {
        let mut plugins = self.registry.plugins.write().unwrap_or_else(|e| e.into_inner());
        if let Some(slot) = plugins.get_mut(&self.record.name) {
            slot.busy = false;
        }
    }
}

/// Registry of all known plugins.
#[derive(Default)]
pub struct PluginRegistry {
    /// Plugin name → instance and record.
    plugins: RwLock<HashMap<String, PluginSlot>>,
    /// Registration sequence.
    next_seq: AtomicU64,
    /// Direct calls dispatched.
    calls: AtomicU64,
}

impl PluginRegistry {
    /// Creates a new empty plugin registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a plugin in the `Registered` state. Only the plugin's name,
    /// version and dependencies are read.
    pub fn register(&self, plugin: Arc<dyn Plugin>) -> KernelResult<PluginRecord> {
        let name = plugin.name().to_string();
        let mut plugins = self.plugins.write().unwrap_or_else(|e| e.into_inner());

        if plugins.contains_key(&name) {
            return Err(KernelError::DuplicatePlugin(name));
        }

        let record = PluginRecord {
            name: name.clone(),
            version: plugin.version().to_string(),
            state: PluginState::Registered,
            dependencies: plugin.dependencies(),
            seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
            registered_at: Utc::now(),
            initialized_at: None,
            enabled_at: None,
            last_error: None,
        };

        info!(
            plugin = %name,
            version = %record.version,
            dependencies = ?record.dependencies,
            "Registering plugin"
        );

        plugins.insert(
            name,
            PluginSlot {
                plugin,
                record: record.clone(),
                busy: false,
            },
        );
        Ok(record)
    }

    /// Removes a plugin.
    pub fn unregister(&self, name: &str) -> KernelResult<Arc<dyn Plugin>> {
        let mut plugins = self.plugins.write().unwrap_or_else(|e| e.into_inner());
        let slot = plugins
            .remove(name)
            .ok_or_else(|| KernelError::UnknownPlugin(name.to_string()))?;

        info!(plugin = %name, "Plugin unregistered");
        Ok(slot.plugin)
    }

    /// Gets a plugin instance by name.
    pub fn get(&self, name: &str) -> KernelResult<Arc<dyn Plugin>> {
        let plugins = self.plugins.read().unwrap_or_else(|e| e.into_inner());
        plugins
            .get(name)
            .map(|slot| slot.plugin.clone())
            .ok_or_else(|| KernelError::UnknownPlugin(name.to_string()))
    }

    /// Gets a plugin's record by name.
    pub fn record(&self, name: &str) -> Option<PluginRecord> {
        let plugins = self.plugins.read().unwrap_or_else(|e| e.into_inner());
        plugins.get(name).map(|slot| slot.record.clone())
    }

    /// Current state of a plugin.
    pub fn state(&self, name: &str) -> Option<PluginState> {
        let plugins = self.plugins.read().unwrap_or_else(|e| e.into_inner());
        plugins.get(name).map(|slot| slot.record.state)
    }

    /// All records in registration order.
    pub fn records(&self) -> Vec<PluginRecord> {
        let plugins = self.plugins.read().unwrap_or_else(|e| e.into_inner());
        let mut records: Vec<PluginRecord> =
            plugins.values().map(|slot| slot.record.clone()).collect();
        records.sort_by_key(|record| record.seq);
        records
    }

    /// Checks whether a plugin is registered.
    pub fn contains(&self, name: &str) -> bool {
        let plugins = self.plugins.read().unwrap_or_else(|e| e.into_inner());
        plugins.contains_key(name)
    }

    /// Returns plugin count.
    pub fn count(&self) -> usize {
        let plugins = self.plugins.read().unwrap_or_else(|e| e.into_inner());
        plugins.len()
    }

    /// Applies `update` to a plugin's record.
    pub(crate) fn update(&self, name: &str, update: impl FnOnce(&mut PluginRecord)) {
        let mut plugins = self.plugins.write().unwrap_or_else(|e| e.into_inner());
        if let Some(slot) = plugins.get_mut(name) {
            update(&mut slot.record);
        }
    }

    /// Claims a lifecycle step on `name`.
    ///
    /// Fails if another step is still running or if `allowed` rejects the
    /// current state. Check and claim happen under one write lock, so two
    /// overlapping calls never both run plugin code.
    pub(crate) fn begin_transition(
        &self,
        name: &str,
        action: &str,
        allowed: impl FnOnce(PluginState) -> bool,
    ) -> KernelResult<Transition<'_>> {
        let mut plugins = self.plugins.write().unwrap_or_else(|e| e.into_inner());
        let slot = plugins
            .get_mut(name)
            .ok_or_else(|| KernelError::UnknownPlugin(name.to_string()))?;

        if slot.busy {
            return Err(KernelError::TransitionInProgress {
                plugin: name.to_string(),
                action: action.to_string(),
            });
        }
        if !allowed(slot.record.state) {
            return Err(KernelError::invalid_transition(name, slot.record.state, action));
        }

        slot.busy = true;
        Ok(Transition {
            registry: self,
            plugin: slot.plugin.clone(),
            record: slot.record.clone(),
        })
    }

    /// Calls `method` on `target`. The target must have completed `init`.
    pub async fn call(
        &self,
        caller: &str,
        target: &str,
        method: &str,
        args: Vec<Value>,
    ) -> KernelResult<Value> {
        let (plugin, state) = {
            let plugins = self.plugins.read().unwrap_or_else(|e| e.into_inner());
            let slot = plugins
                .get(target)
                .ok_or_else(|| KernelError::UnknownPlugin(target.to_string()))?;
            (slot.plugin.clone(), slot.record.state)
        };

        if !state.is_ready() {
            return Err(KernelError::DependencyNotReady {
                plugin: caller.to_string(),
                dependency: target.to_string(),
            });
        }

        self.calls.fetch_add(1, Ordering::Relaxed);
        debug!(caller = %caller, target = %target, method = %method, "Plugin call");

        guarded(plugin.handle_call(method, args))
            .await
            .map_err(|e| match e.downcast::<KernelError>() {
                Ok(inner @ KernelError::MethodNotFound { .. }) => inner,
                Ok(inner) => KernelError::PluginCall {
                    plugin: target.to_string(),
                    method: method.to_string(),
                    source: inner.into(),
                },
                Err(e) => KernelError::PluginCall {
                    plugin: target.to_string(),
                    method: method.to_string(),
                    source: e.into(),
                },
            })
    }

    /// Number of direct calls dispatched.
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("plugins", &self.count())
            .finish_non_exhaustive()
    }
}
