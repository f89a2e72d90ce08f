//! Storage access for plugins.

use std::time::Duration;

use serde_json::Value;

use plughub_core::result::KernelResult;

use crate::storage::{GetOptions, SetOptions, SharedStorage, WatchHandle, WatchOptions};

/// Storage view bound to one namespace.
#[derive(Debug, Clone, Copy)]
pub struct ContextStorage<'a> {
    namespace: &'a str,
    storage: &'a SharedStorage,
}

impl<'a> ContextStorage<'a> {
    pub(crate) fn new(namespace: &'a str, storage: &'a SharedStorage) -> Self {
        Self { namespace, storage }
    }

    /// The view onto the shared `global` namespace.
    pub fn global(&self) -> ContextStorage<'a> {
        Self {
            namespace: self.storage.global_namespace(),
            storage: self.storage,
        }
    }

    /// Namespace this view reads and writes.
    pub fn namespace(&self) -> &str {
        self.namespace
    }

    /// Writes a value.
    pub fn set(&self, key: &str, value: Value) -> KernelResult<()> {
        self.storage
            .set(key, value, SetOptions::in_namespace(self.namespace))
    }

    /// Writes a value that expires after `ttl`.
    pub fn set_with_ttl(&self, key: &str, value: Value, ttl: Duration) -> KernelResult<()> {
        self.storage.set(
            key,
            value,
            SetOptions::in_namespace(self.namespace).with_ttl(ttl),
        )
    }

    /// Reads a value.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.storage
            .get(key, &GetOptions::in_namespace(self.namespace))
    }

    /// Reads a value, or `default` when absent.
    pub fn get_or(&self, key: &str, default: Value) -> Value {
        self.storage.get_or(self.namespace, key, default)
    }

    /// Whether a live value exists.
    pub fn has(&self, key: &str) -> bool {
        self.storage.has(key, Some(self.namespace))
    }

    /// Removes a value.
    pub fn delete(&self, key: &str) -> KernelResult<Option<Value>> {
        self.storage.delete(key, Some(self.namespace))
    }

    /// Watches a key in this namespace.
    pub fn watch<F>(&self, key: &str, callback: F, immediate: bool) -> WatchHandle
    where
        F: Fn(Option<&Value>, Option<&Value>, &str) + Send + Sync + 'static,
    {
        self.storage.watch(
            key,
            callback,
            WatchOptions {
                namespace: Some(self.namespace.to_string()),
                immediate,
            },
        )
    }

    /// Live keys in this namespace.
    pub fn keys(&self) -> Vec<String> {
        self.storage.keys(self.namespace)
    }
}
