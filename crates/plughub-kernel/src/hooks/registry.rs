//! Hook registry: hosts create hooks, plugins tap them with priority ordering.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tracing::info;

use plughub_core::error::KernelError;
use plughub_core::result::KernelResult;

use super::definitions::{HookDefinition, HookKind, Tap, TapHandler, TapOptions};

/// A hook together with its ordered taps.
#[derive(Debug)]
struct HookEntry {
    definition: HookDefinition,
    /// Shared with every `HookArgs` built for this hook.
    param_names: Arc<[String]>,
    /// Sorted by priority (higher first), then registration order.
    taps: Vec<Tap>,
}

/// Snapshot of a hook taken for one dispatch pass.
#[derive(Debug, Clone)]
pub(crate) struct HookSnapshot {
    pub definition: HookDefinition,
    pub param_names: Arc<[String]>,
    pub taps: Vec<Tap>,
}

/// Registry of hook definitions and their taps.
#[derive(Debug, Default)]
pub struct HookRegistry {
    /// Hook name → entry.
    hooks: RwLock<HashMap<String, HookEntry>>,
    /// Monotonic tap sequence for stable ordering.
    next_seq: AtomicU64,
}

impl HookRegistry {
    /// Creates a new empty hook registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a hook. Fails with `DuplicateHook` if the name is taken.
    pub fn create_hook<I, S>(
        &self,
        name: &str,
        kind: HookKind,
        param_names: I,
    ) -> KernelResult<HookDefinition>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let definition = HookDefinition::new(name, kind, param_names);
        let mut hooks = self.hooks.write().unwrap_or_else(|e| e.into_inner());

        if hooks.contains_key(name) {
            return Err(KernelError::DuplicateHook(name.to_string()));
        }

        let param_names: Arc<[String]> = definition.param_names.clone().into();
        hooks.insert(
            name.to_string(),
            HookEntry {
                definition: definition.clone(),
                param_names,
                taps: Vec::new(),
            },
        );

        info!(hook = %name, kind = %kind, params = definition.arity(), "Hook created");
        Ok(definition)
    }

    /// Returns the definition of a hook. Fails with `UnknownHook` if absent.
    pub fn get_hook(&self, name: &str) -> KernelResult<HookDefinition> {
        let hooks = self.hooks.read().unwrap_or_else(|e| e.into_inner());
        hooks
            .get(name)
            .map(|entry| entry.definition.clone())
            .ok_or_else(|| KernelError::UnknownHook(name.to_string()))
    }

    /// Returns whether a hook exists.
    pub fn has_hook(&self, name: &str) -> bool {
        let hooks = self.hooks.read().unwrap_or_else(|e| e.into_inner());
        hooks.contains_key(name)
    }

    /// Attaches a plugin's handler to a hook.
    pub fn tap(
        &self,
        hook: &str,
        plugin: &str,
        handler: TapHandler,
        options: TapOptions,
    ) -> KernelResult<()> {
        let mut hooks = self.hooks.write().unwrap_or_else(|e| e.into_inner());
        let entry = hooks
            .get_mut(hook)
            .ok_or_else(|| KernelError::UnknownHook(hook.to_string()))?;

        if handler.is_async() && !entry.definition.kind.accepts_async_taps() {
            return Err(KernelError::InvalidTap {
                hook: hook.to_string(),
                reason: format!("{} hooks only accept synchronous taps", entry.definition.kind),
            });
        }

        if let Some(arity) = options.arity {
            if arity != entry.definition.arity() {
                return Err(KernelError::HookArity {
                    hook: hook.to_string(),
                    expected: entry.definition.arity(),
                    actual: arity,
                });
            }
        }

        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        entry.taps.push(Tap {
            plugin: plugin.to_string(),
            priority: options.priority,
            seq,
            handler,
        });

        // Stable sort keeps registration order among equal priorities.
        entry
            .taps
            .sort_by_key(|t| std::cmp::Reverse(t.priority));

        info!(
            hook = %hook,
            plugin = %plugin,
            priority = options.priority,
            "Hook tapped"
        );
        Ok(())
    }

    /// Removes every tap registered by a plugin. Returns the number removed.
    pub fn untap_plugin(&self, plugin: &str) -> usize {
        let mut hooks = self.hooks.write().unwrap_or_else(|e| e.into_inner());
        let mut removed = 0;

        for entry in hooks.values_mut() {
            let before = entry.taps.len();
            entry.taps.retain(|t| t.plugin != plugin);
            removed += before - entry.taps.len();
        }

        if removed > 0 {
            info!(plugin = %plugin, removed, "All taps removed for plugin");
        }
        removed
    }

    /// Number of taps on a hook.
    pub fn tap_count(&self, hook: &str) -> usize {
        let hooks = self.hooks.read().unwrap_or_else(|e| e.into_inner());
        hooks.get(hook).map(|entry| entry.taps.len()).unwrap_or(0)
    }

    /// Total number of taps across all hooks.
    pub fn total_taps(&self) -> usize {
        let hooks = self.hooks.read().unwrap_or_else(|e| e.into_inner());
        hooks.values().map(|entry| entry.taps.len()).sum()
    }

    /// Names of all hooks, sorted.
    pub fn hook_names(&self) -> Vec<String> {
        let hooks = self.hooks.read().unwrap_or_else(|e| e.into_inner());
        let mut names: Vec<String> = hooks.keys().cloned().collect();
        names.sort();
        names
    }

    /// Clones a hook's definition and taps so dispatch runs without the lock.
    pub(crate) fn snapshot(&self, name: &str) -> KernelResult<HookSnapshot> {
        let hooks = self.hooks.read().unwrap_or_else(|e| e.into_inner());
        hooks
            .get(name)
            .map(|entry| HookSnapshot {
                definition: entry.definition.clone(),
                param_names: entry.param_names.clone(),
                taps: entry.taps.clone(),
            })
            .ok_or_else(|| KernelError::UnknownHook(name.to_string()))
    }
}
