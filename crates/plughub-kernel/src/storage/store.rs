//! Namespaced in-memory key/value storage with TTL, watchers and middleware.
//!
//! Entries live under `namespace:key`. An entry with a TTL is treated as
//! absent once `now - stored_at > ttl`; reads purge it lazily, and when a
//! tokio runtime is available a timer removes it at expiry. Timer removals
//! are silent and only affect the exact write they were scheduled for.
//!
//! Watchers and middleware run after every internal lock is released, so a
//! watcher may freely read or write the storage it observes.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use plughub_core::config::storage::StorageConfig;
use plughub_core::error::KernelError;
use plughub_core::result::KernelResult;

use super::middleware::{Middleware, StorageAction, StorageMutation};
use crate::guard::guarded_sync;

/// Watcher callback: `(new_value, old_value, full_key)`. `new_value` is
/// `None` after a delete.
pub type WatchFn = Arc<dyn Fn(Option<&Value>, Option<&Value>, &str) + Send + Sync>;

/// A stored value with its metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageEntry {
    /// Namespace.
    pub namespace: String,
    /// Key without namespace.
    pub key: String,
    /// Stored value.
    pub value: Value,
    /// Write time.
    pub timestamp: DateTime<Utc>,
    /// Time to live.
    pub ttl: Option<Duration>,
}

/// Options for [`SharedStorage::set`].
#[derive(Debug, Clone)]
pub struct SetOptions {
    /// Target namespace. Defaults to the configured default namespace.
    pub namespace: Option<String>,
    /// Expire the entry after this long.
    pub ttl: Option<Duration>,
    /// Fire watchers.
    pub notify: bool,
}

impl Default for SetOptions {
    fn default() -> Self {
        Self {
            namespace: None,
            ttl: None,
            notify: true,
        }
    }
}

impl SetOptions {
    /// Options targeting `namespace`.
    pub fn in_namespace(namespace: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            ..Self::default()
        }
    }

    /// Sets the TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Suppresses watcher notification.
    pub fn silent(mut self) -> Self {
        self.notify = false;
        self
    }
}

/// Options for [`SharedStorage::get`].
#[derive(Debug, Clone, Default)]
pub struct GetOptions {
    /// Source namespace. Defaults to the configured default namespace.
    pub namespace: Option<String>,
    /// Returned when the key is absent or expired.
    pub default: Option<Value>,
}

impl GetOptions {
    /// Options reading from `namespace`.
    pub fn in_namespace(namespace: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            ..Self::default()
        }
    }

    /// Sets the fallback value.
    pub fn or(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }
}

/// Options for [`SharedStorage::watch`].
#[derive(Debug, Clone, Default)]
pub struct WatchOptions {
    /// Watched namespace. Defaults to the configured default namespace.
    pub namespace: Option<String>,
    /// Fire once with the current value on registration.
    pub immediate: bool,
}

/// Storage counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageStats {
    /// Live and not yet purged entries.
    pub entries: usize,
    /// Distinct namespaces holding entries.
    pub namespaces: usize,
    /// Registered watchers.
    pub watchers: usize,
    /// Successful writes.
    pub sets: u64,
    /// Successful deletes.
    pub deletes: u64,
    /// Entries purged after expiry.
    pub expired: u64,
    /// Mutations rejected by middleware.
    pub rejected: u64,
}

#[derive(Debug)]
struct Slot {
    entry: StorageEntry,
    expires_at: Option<Instant>,
    generation: u64,
}

impl Slot {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now > at)
    }
}

struct Watcher {
    id: u64,
    callback: WatchFn,
}

struct StorageInner {
    config: StorageConfig,
    entries: Mutex<HashMap<String, Slot>>,
    watchers: Mutex<HashMap<String, Vec<Watcher>>>,
    middleware: RwLock<Vec<Middleware>>,
    next_id: AtomicU64,
    sets: AtomicU64,
    deletes: AtomicU64,
    expired: AtomicU64,
    rejected: AtomicU64,
}

impl StorageInner {
    /// Returns the live slot value, purging it if expired.
    fn live_value(&self, full_key: &str) -> Option<Value> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let slot = entries.get(full_key)?;
        if !slot.is_expired(Instant::now()) {
            return Some(slot.entry.value.clone());
        }

        entries.remove(full_key);
        self.expired.fetch_add(1, Ordering::Relaxed);
        debug!(key = %full_key, "Expired entry purged on read");
        None
    }

    fn expire_if_current(&self, full_key: &str, generation: u64) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if entries.get(full_key).is_some_and(|slot| slot.generation == generation) {
            entries.remove(full_key);
            self.expired.fetch_add(1, Ordering::Relaxed);
            debug!(key = %full_key, "Expired entry removed by timer");
        }
    }

    fn remove_watcher(&self, full_key: &str, id: u64) -> bool {
        let mut watchers = self.watchers.lock().unwrap_or_else(|e| e.into_inner());
        let Some(list) = watchers.get_mut(full_key) else {
            return false;
        };
        let before = list.len();
        list.retain(|w| w.id != id);
        let removed = list.len() < before;
        if list.is_empty() {
            watchers.remove(full_key);
        }
        removed
    }

    fn notify(&self, full_key: &str, new: Option<&Value>, old: Option<&Value>) {
        let callbacks: Vec<WatchFn> = self
            .watchers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(full_key)
            .map(|list| list.iter().map(|w| w.callback.clone()).collect())
            .unwrap_or_default();

        for callback in callbacks {
            let result = guarded_sync(|| {
                callback(new, old, full_key);
                Ok(())
            });
            if let Err(e) = result {
                warn!(key = %full_key, error = %e, "Storage watcher failed");
            }
        }
    }

    fn apply_middleware(&self, mut mutation: StorageMutation) -> KernelResult<StorageMutation> {
        let chain = self
            .middleware
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();

        for middleware in chain {
            let full_key = mutation.full_key();
            mutation = guarded_sync(|| middleware(mutation)).map_err(|e| {
                self.rejected.fetch_add(1, Ordering::Relaxed);
                KernelError::StorageRejected {
                    key: full_key,
                    reason: format!("{e:#}"),
                }
            })?;
        }
        Ok(mutation)
    }
}

/// Handle returned by [`SharedStorage::watch`]. Unwatching twice is a no-op.
pub struct WatchHandle {
    id: u64,
    full_key: String,
    storage: Weak<StorageInner>,
}

impl WatchHandle {
    /// The watched `namespace:key`.
    pub fn full_key(&self) -> &str {
        &self.full_key
    }

    /// Removes the watcher. Returns `false` if it was already gone.
    pub fn unwatch(&self) -> bool {
        self.storage
            .upgrade()
            .is_some_and(|inner| inner.remove_watcher(&self.full_key, self.id))
    }
}

impl fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchHandle")
            .field("id", &self.id)
            .field("full_key", &self.full_key)
            .finish()
    }
}

/// Shared namespaced key/value store.
pub struct SharedStorage {
    inner: Arc<StorageInner>,
}

impl SharedStorage {
    /// Creates an empty store.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            inner: Arc::new(StorageInner {
                config,
                entries: Mutex::new(HashMap::new()),
                watchers: Mutex::new(HashMap::new()),
                middleware: RwLock::new(Vec::new()),
                next_id: AtomicU64::new(1),
                sets: AtomicU64::new(0),
                deletes: AtomicU64::new(0),
                expired: AtomicU64::new(0),
                rejected: AtomicU64::new(0),
            }),
        }
    }

    /// Builds the `namespace:key` form used internally.
    pub fn full_key(namespace: &str, key: &str) -> String {
        format!("{namespace}:{key}")
    }

    /// The namespace reserved for intentionally shared state.
    pub fn global_namespace(&self) -> &str {
        &self.inner.config.global_namespace
    }

    fn namespace_or_default<'a>(&'a self, namespace: Option<&'a str>) -> &'a str {
        namespace.unwrap_or(&self.inner.config.default_namespace)
    }

    /// Writes a value after running it through the middleware chain.
    pub fn set(&self, key: &str, value: Value, options: SetOptions) -> KernelResult<()> {
        let namespace = self.namespace_or_default(options.namespace.as_deref()).to_string();
        let full_key = Self::full_key(&namespace, key);
        let old_value = self.inner.live_value(&full_key);

        let mutation = self.inner.apply_middleware(StorageMutation {
            key: key.to_string(),
            namespace: namespace.clone(),
            value,
            old_value: old_value.clone(),
            action: StorageAction::Set,
        })?;

        let generation = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let slot = Slot {
            entry: StorageEntry {
                namespace,
                key: key.to_string(),
                value: mutation.value.clone(),
                timestamp: Utc::now(),
                ttl: options.ttl,
            },
            expires_at: options.ttl.map(|ttl| Instant::now() + ttl),
            generation,
        };
        self.inner
            .entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(full_key.clone(), slot);
        self.inner.sets.fetch_add(1, Ordering::Relaxed);

        if let Some(ttl) = options.ttl {
            self.schedule_expiry(&full_key, ttl, generation);
        }

        debug!(key = %full_key, ttl_ms = options.ttl.map(|t| t.as_millis() as u64), "Storage set");

        if options.notify {
            self.inner
                .notify(&full_key, Some(&mutation.value), old_value.as_ref());
        }
        Ok(())
    }

    fn schedule_expiry(&self, full_key: &str, ttl: Duration, generation: u64) {
        if !self.inner.config.eager_expiry {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };

        let storage = Arc::downgrade(&self.inner);
        let full_key = full_key.to_string();
        handle.spawn(async move {
            // Strictly past the deadline, matching the read-side check.
            tokio::time::sleep(ttl + Duration::from_millis(1)).await;
            if let Some(inner) = storage.upgrade() {
                inner.expire_if_current(&full_key, generation);
            }
        });
    }

    /// Reads a value, falling back to `options.default`.
    pub fn get(&self, key: &str, options: &GetOptions) -> Option<Value> {
        let namespace = self.namespace_or_default(options.namespace.as_deref());
        self.inner
            .live_value(&Self::full_key(namespace, key))
            .or_else(|| options.default.clone())
    }

    /// Reads a value from `namespace`, or `default` when absent.
    pub fn get_or(&self, namespace: &str, key: &str, default: Value) -> Value {
        self.inner
            .live_value(&Self::full_key(namespace, key))
            .unwrap_or(default)
    }

    /// Returns the full entry, metadata included.
    pub fn entry(&self, namespace: &str, key: &str) -> Option<StorageEntry> {
        let full_key = Self::full_key(namespace, key);
        self.inner.live_value(&full_key)?;
        self.inner
            .entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&full_key)
            .map(|slot| slot.entry.clone())
    }

    /// Whether a live value exists.
    pub fn has(&self, key: &str, namespace: Option<&str>) -> bool {
        let namespace = self.namespace_or_default(namespace);
        self.inner.live_value(&Self::full_key(namespace, key)).is_some()
    }

    /// Removes a value. Returns the removed value, or `None` if absent.
    pub fn delete(&self, key: &str, namespace: Option<&str>) -> KernelResult<Option<Value>> {
        let namespace = self.namespace_or_default(namespace).to_string();
        let full_key = Self::full_key(&namespace, key);
        let Some(old_value) = self.inner.live_value(&full_key) else {
            return Ok(None);
        };

        self.inner.apply_middleware(StorageMutation {
            key: key.to_string(),
            namespace,
            value: Value::Null,
            old_value: Some(old_value.clone()),
            action: StorageAction::Delete,
        })?;

        self.inner
            .entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&full_key);
        self.inner.deletes.fetch_add(1, Ordering::Relaxed);
        debug!(key = %full_key, "Storage delete");

        self.inner.notify(&full_key, None, Some(&old_value));
        Ok(Some(old_value))
    }

    /// Watches one key. With `immediate`, the callback fires once now with
    /// the current value.
    pub fn watch<F>(&self, key: &str, callback: F, options: WatchOptions) -> WatchHandle
    where
        F: Fn(Option<&Value>, Option<&Value>, &str) + Send + Sync + 'static,
    {
        let namespace = self.namespace_or_default(options.namespace.as_deref());
        let full_key = Self::full_key(namespace, key);
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let callback: WatchFn = Arc::new(callback);

        self.inner
            .watchers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(full_key.clone())
            .or_default()
            .push(Watcher {
                id,
                callback: callback.clone(),
            });

        if options.immediate {
            let current = self.inner.live_value(&full_key);
            callback(current.as_ref(), None, &full_key);
        }

        WatchHandle {
            id,
            full_key,
            storage: Arc::downgrade(&self.inner),
        }
    }

    /// Appends a middleware to the mutation chain.
    pub fn use_middleware<F>(&self, middleware: F)
    where
        F: Fn(StorageMutation) -> anyhow::Result<StorageMutation> + Send + Sync + 'static,
    {
        self.inner
            .middleware
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(Arc::new(middleware));
    }

    /// Live keys of a namespace, sorted.
    pub fn keys(&self, namespace: &str) -> Vec<String> {
        let now = Instant::now();
        let entries = self.inner.entries.lock().unwrap_or_else(|e| e.into_inner());
        let mut keys: Vec<String> = entries
            .values()
            .filter(|slot| slot.entry.namespace == namespace && !slot.is_expired(now))
            .map(|slot| slot.entry.key.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Drops every entry and watcher of a namespace without notifying.
    /// Returns the number of entries removed.
    pub fn clear_namespace(&self, namespace: &str) -> usize {
        let prefix = format!("{namespace}:");

        let removed = {
            let mut entries = self.inner.entries.lock().unwrap_or_else(|e| e.into_inner());
            let before = entries.len();
            entries.retain(|full_key, _| !full_key.starts_with(&prefix));
            before - entries.len()
        };
        self.inner
            .watchers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|full_key, _| !full_key.starts_with(&prefix));

        if removed > 0 {
            info!(namespace = %namespace, removed, "Storage namespace cleared");
        }
        removed
    }

    /// Removes every expired entry. Returns the count.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.inner.entries.lock().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        entries.retain(|_, slot| !slot.is_expired(now));
        let purged = before - entries.len();
        self.inner
            .expired
            .fetch_add(purged as u64, Ordering::Relaxed);
        purged
    }

    /// Current counters.
    pub fn stats(&self) -> StorageStats {
        let (entries, namespaces) = {
            let entries = self.inner.entries.lock().unwrap_or_else(|e| e.into_inner());
            let namespaces: BTreeSet<&str> =
                entries.values().map(|s| s.entry.namespace.as_str()).collect();
            (entries.len(), namespaces.len())
        };
        let watchers = self
            .inner
            .watchers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .map(Vec::len)
            .sum();

        StorageStats {
            entries,
            namespaces,
            watchers,
            sets: self.inner.sets.load(Ordering::Relaxed),
            deletes: self.inner.deletes.load(Ordering::Relaxed),
            expired: self.inner.expired.load(Ordering::Relaxed),
            rejected: self.inner.rejected.load(Ordering::Relaxed),
        }
    }
}

impl Default for SharedStorage {
    fn default() -> Self {
        Self::new(StorageConfig::default())
    }
}

impl fmt::Debug for SharedStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedStorage")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn lazy_only() -> SharedStorage {
        SharedStorage::new(StorageConfig {
            eager_expiry: false,
            ..StorageConfig::default()
        })
    }

    #[test]
    fn test_namespaces_do_not_collide() {
        let storage = SharedStorage::default();
        storage.set("theme", json!("dark"), SetOptions::in_namespace("a")).unwrap();
        storage.set("theme", json!("light"), SetOptions::in_namespace("b")).unwrap();
        storage.set("theme", json!("plain"), SetOptions::default()).unwrap();

        assert_eq!(storage.get("theme", &GetOptions::in_namespace("a")), Some(json!("dark")));
        assert_eq!(storage.get("theme", &GetOptions::in_namespace("b")), Some(json!("light")));
        assert_eq!(storage.get("theme", &GetOptions::default()), Some(json!("plain")));
        assert_eq!(storage.keys("a"), vec!["theme"]);
        assert_eq!(storage.stats().namespaces, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_expiry_on_read() {
        let storage = lazy_only();
        storage
            .set("k", json!("v"), SetOptions::default().with_ttl(Duration::from_millis(100)))
            .unwrap();
        assert!(storage.has("k", None));

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(storage.get("k", &GetOptions::default()), None);
        assert_eq!(
            storage.get("k", &GetOptions::default().or(json!("fallback"))),
            Some(json!("fallback"))
        );
        assert!(!storage.has("k", None));
        assert_eq!(storage.stats().expired, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_eager_timer_removes_only_its_write() {
        let storage = SharedStorage::default();
        storage
            .set("k", json!(1), SetOptions::default().with_ttl(Duration::from_millis(100)))
            .unwrap();
        storage.set("k", json!(2), SetOptions::default()).unwrap();

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(storage.get("k", &GetOptions::default()), Some(json!(2)));

        storage
            .set("t", json!(3), SetOptions::default().with_ttl(Duration::from_millis(50)))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(storage.stats().entries, 1);
    }

    #[test]
    fn test_watchers_fire_in_order_and_unwatch_is_idempotent() {
        type Seen = (&'static str, Option<Value>, Option<Value>, String);
        let storage = SharedStorage::default();
        let seen: Arc<Mutex<Vec<Seen>>> = Arc::new(Mutex::new(Vec::new()));

        let s = seen.clone();
        let first = storage.watch(
            "count",
            move |new, old, key| {
                s.lock()
                    .unwrap()
                    .push(("first", new.cloned(), old.cloned(), key.to_string()));
            },
            WatchOptions::default(),
        );
        let s = seen.clone();
        storage.watch(
            "count",
            move |new, old, key| {
                s.lock()
                    .unwrap()
                    .push(("second", new.cloned(), old.cloned(), key.to_string()));
            },
            WatchOptions::default(),
        );

        storage.set("count", json!(1), SetOptions::default()).unwrap();
        storage.set("count", json!(2), SetOptions::default().silent()).unwrap();
        assert!(first.unwatch());
        assert!(!first.unwatch());
        storage.delete("count", None).unwrap();

        let key = "default:count".to_string();
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                ("first", Some(json!(1)), None, key.clone()),
                ("second", Some(json!(1)), None, key.clone()),
                ("second", None, Some(json!(2)), key),
            ]
        );
    }

    #[test]
    fn test_immediate_watch() {
        let storage = SharedStorage::default();
        storage.set("mode", json!("fast"), SetOptions::in_namespace("global")).unwrap();
        let seen = Arc::new(Mutex::new(None));
        let s = seen.clone();
        storage.watch(
            "mode",
            move |new, _, _| *s.lock().unwrap() = new.cloned(),
            WatchOptions {
                namespace: Some("global".into()),
                immediate: true,
            },
        );
        assert_eq!(*seen.lock().unwrap(), Some(json!("fast")));
    }

    #[test]
    fn test_middleware_transforms_and_rejects() {
        let storage = SharedStorage::default();
        storage.use_middleware(|mut m| {
            if let Value::String(s) = &m.value {
                m.value = json!(s.trim());
            }
            Ok(m)
        });
        storage.use_middleware(|m| {
            if m.key.starts_with("readonly") {
                anyhow::bail!("{} is read-only", m.key);
            }
            Ok(m)
        });

        storage.set("name", json!("  plug  "), SetOptions::default()).unwrap();
        assert_eq!(storage.get("name", &GetOptions::default()), Some(json!("plug")));

        let err = storage
            .set("readonly.flag", json!(true), SetOptions::default())
            .unwrap_err();
        assert!(matches!(err, KernelError::StorageRejected { ref key, .. } if key == "default:readonly.flag"));
        assert!(!storage.has("readonly.flag", None));
        assert_eq!(storage.stats().rejected, 1);
    }

    #[test]
    fn test_middleware_sees_and_can_reject_deletes() {
        let storage = SharedStorage::default();
        let seen: Arc<Mutex<Vec<StorageMutation>>> = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        storage.use_middleware(move |m| {
            s.lock().unwrap().push(m.clone());
            if m.action == StorageAction::Delete && m.namespace == "locked" {
                anyhow::bail!("{} is locked", m.key);
            }
            Ok(m)
        });

        storage.set("token", json!("abc"), SetOptions::in_namespace("locked")).unwrap();
        storage.set("tmp", json!(7), SetOptions::default()).unwrap();
        seen.lock().unwrap().clear();

        let err = storage.delete("token", Some("locked")).unwrap_err();
        assert!(matches!(err, KernelError::StorageRejected { ref key, .. } if key == "locked:token"));
        assert_eq!(
            storage.get("token", &GetOptions::in_namespace("locked")),
            Some(json!("abc"))
        );

        assert_eq!(storage.delete("tmp", None).unwrap(), Some(json!(7)));
        assert!(!storage.has("tmp", None));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen.iter().all(|m| m.action == StorageAction::Delete));
        assert_eq!(seen[0].old_value, Some(json!("abc")));
        assert_eq!(seen[1].full_key(), "default:tmp");
        assert_eq!(seen[1].old_value, Some(json!(7)));

        let stats = storage.stats();
        assert_eq!(stats.deletes, 1);
        assert_eq!(stats.rejected, 1);
    }

    #[test]
    fn test_clear_namespace() {
        let storage = SharedStorage::default();
        storage.set("a", json!(1), SetOptions::in_namespace("p")).unwrap();
        storage.set("b", json!(2), SetOptions::in_namespace("p")).unwrap();
        storage.set("a", json!(3), SetOptions::in_namespace("q")).unwrap();
        storage.watch(
            "a",
            |_, _, _| {},
            WatchOptions {
                namespace: Some("p".into()),
                immediate: false,
            },
        );

        assert_eq!(storage.clear_namespace("p"), 2);
        assert!(storage.keys("p").is_empty());
        assert_eq!(storage.get_or("q", "a", Value::Null), json!(3));
        assert_eq!(storage.stats().watchers, 0);
    }
}
