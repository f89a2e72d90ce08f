//! Event bus: topic-based pub/sub with wildcards, priorities and history.
//!
//! Listeners subscribe to an exact topic or to a pattern containing `*`
//! segments. An emission collects every matching listener, orders them by
//! priority (higher first, registration order for ties) and runs them either
//! one at a time or concurrently with a per-listener timeout. Failures are
//! isolated per listener and reported in the returned [`EmittedEvent`].
//!
//! A concurrent listener that exceeds its timeout is no longer waited for and
//! its [`Event::cancel`] token is cancelled. The listener task itself keeps
//! running until it observes the token or finishes on its own.

use std::cmp::Reverse;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use futures::future::{BoxFuture, join_all};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use plughub_core::config::events::EventsConfig;
use plughub_core::error::KernelError;

use super::history::{EventHistory, EventRecord, HistoryFilter};
use super::topic::TopicPattern;
use crate::guard::{guarded, panic_message};

/// Future returned by a listener.
pub type ListenerFuture = BoxFuture<'static, anyhow::Result<()>>;

/// Type-erased listener callback.
pub type ListenerFn = Arc<dyn Fn(Event) -> ListenerFuture + Send + Sync>;

/// Identifier of a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Raw numeric value.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

/// An event as delivered to one listener.
#[derive(Debug, Clone)]
pub struct Event {
    /// Emission identifier, shared by every listener of one emission.
    pub id: Uuid,
    /// Concrete topic the event was emitted under.
    pub name: String,
    /// Event payload.
    pub payload: Arc<Value>,
    /// Emitting plugin or host component.
    pub source: Option<String>,
    /// Emission time.
    pub timestamp: DateTime<Utc>,
    /// Cancelled when a concurrent emission stops waiting for this listener.
    pub cancel: CancellationToken,
}

/// Options for [`EventBus::on`].
#[derive(Debug, Clone, Default)]
pub struct ListenerOptions {
    /// Higher runs first.
    pub priority: i32,
    /// Remove after the first successful invocation.
    pub once: bool,
    /// Owning namespace, used for bulk removal.
    pub namespace: Option<String>,
}

impl ListenerOptions {
    /// Options with the given priority.
    pub fn priority(priority: i32) -> Self {
        Self {
            priority,
            ..Self::default()
        }
    }

    /// Tags the listener with a namespace.
    pub fn in_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }
}

/// Options for [`EventBus::emit`].
#[derive(Debug, Clone, Default)]
pub struct EmitOptions {
    /// Emitting plugin or host component.
    pub source: Option<String>,
    /// Run listeners concurrently, each under a timeout.
    pub async_mode: bool,
    /// Per-listener timeout for concurrent emissions. Falls back to the
    /// configured default.
    pub timeout: Option<Duration>,
}

impl EmitOptions {
    /// Sequential emission attributed to `source`.
    pub fn from_source(source: impl Into<String>) -> Self {
        Self {
            source: Some(source.into()),
            ..Self::default()
        }
    }

    /// Concurrent emission with the default timeout.
    pub fn concurrent() -> Self {
        Self {
            async_mode: true,
            ..Self::default()
        }
    }

    /// Sets the per-listener timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Result of one listener invocation.
#[derive(Debug, Clone)]
pub struct ListenerOutcome {
    /// Listener that ran.
    pub listener: ListenerId,
    /// Namespace the listener was tagged with.
    pub namespace: Option<String>,
    /// `Err` holds the rendered error.
    pub result: Result<(), String>,
    /// Whether the listener exceeded its timeout.
    pub timed_out: bool,
    /// Time spent waiting for the listener.
    pub elapsed: Duration,
}

impl ListenerOutcome {
    /// Whether the listener completed successfully.
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Summary of a completed emission.
#[derive(Debug, Clone)]
pub struct EmittedEvent {
    /// Emission identifier.
    pub id: Uuid,
    /// Topic.
    pub name: String,
    /// Emitting plugin or host component.
    pub source: Option<String>,
    /// Emission time.
    pub timestamp: DateTime<Utc>,
    /// One outcome per invoked listener, in dispatch order.
    pub results: Vec<ListenerOutcome>,
}

impl EmittedEvent {
    /// Outcomes that failed or timed out.
    pub fn errors(&self) -> Vec<&ListenerOutcome> {
        self.results.iter().filter(|r| !r.is_ok()).collect()
    }

    /// Whether every listener succeeded.
    pub fn all_ok(&self) -> bool {
        self.results.iter().all(ListenerOutcome::is_ok)
    }
}

/// Event bus counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventBusStats {
    /// Total emissions.
    pub emitted: u64,
    /// Listener invocations that failed, timeouts included.
    pub listener_errors: u64,
    /// Listener invocations that timed out.
    pub timeouts: u64,
    /// Currently registered listeners.
    pub listeners: usize,
    /// Records held in the history buffer.
    pub history_len: usize,
}

struct ListenerEntry {
    id: ListenerId,
    pattern: TopicPattern,
    priority: i32,
    once: bool,
    namespace: Option<String>,
    callback: ListenerFn,
}

#[derive(Default)]
struct ListenerTable {
    exact: HashMap<String, Vec<Arc<ListenerEntry>>>,
    wildcard: Vec<Arc<ListenerEntry>>,
}

impl ListenerTable {
    fn insert(&mut self, entry: Arc<ListenerEntry>) {
        match &entry.pattern {
            TopicPattern::Exact(topic) => self.exact.entry(topic.clone()).or_default().push(entry),
            TopicPattern::Wildcard { .. } => self.wildcard.push(entry),
        }
    }

    /// Removes every entry for which `remove` holds. Returns the count.
    fn remove_where(&mut self, remove: impl Fn(&ListenerEntry) -> bool) -> usize {
        let before = self.len();
        for entries in self.exact.values_mut() {
            entries.retain(|e| !remove(e));
        }
        self.exact.retain(|_, entries| !entries.is_empty());
        self.wildcard.retain(|e| !remove(e));
        before - self.len()
    }

    fn matching(&self, topic: &str) -> Vec<Arc<ListenerEntry>> {
        let mut matched: Vec<Arc<ListenerEntry>> = self
            .exact
            .get(topic)
            .into_iter()
            .flatten()
            .chain(self.wildcard.iter().filter(|e| e.pattern.matches(topic)))
            .cloned()
            .collect();
        // Ids are allocated monotonically, so they encode registration order.
        matched.sort_by_key(|e| (Reverse(e.priority), e.id));
        matched
    }

    fn len(&self) -> usize {
        self.exact.values().map(Vec::len).sum::<usize>() + self.wildcard.len()
    }
}

struct BusShared {
    listeners: RwLock<ListenerTable>,
    history: Mutex<EventHistory>,
    next_id: AtomicU64,
    default_timeout: Duration,
    emitted: AtomicU64,
    listener_errors: AtomicU64,
    timeouts: AtomicU64,
}

impl BusShared {
    fn remove(&self, id: ListenerId) -> bool {
        let mut table = self.listeners.write().unwrap_or_else(|e| e.into_inner());
        table.remove_where(|e| e.id == id) > 0
    }
}

/// Handle returned by [`EventBus::on`]. Unsubscribing twice is a no-op.
#[derive(Clone)]
pub struct Subscription {
    id: ListenerId,
    bus: Weak<BusShared>,
}

impl Subscription {
    /// The listener's id.
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Removes the listener. Returns `false` if it was already gone.
    pub fn unsubscribe(&self) -> bool {
        self.bus.upgrade().is_some_and(|bus| bus.remove(self.id))
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// Topic-based publish/subscribe bus.
pub struct EventBus {
    shared: Arc<BusShared>,
}

impl EventBus {
    /// Creates a bus with the given history size and default timeout.
    pub fn new(config: &EventsConfig) -> Self {
        Self {
            shared: Arc::new(BusShared {
                listeners: RwLock::new(ListenerTable::default()),
                history: Mutex::new(EventHistory::new(config.history_size)),
                next_id: AtomicU64::new(1),
                default_timeout: Duration::from_millis(config.default_timeout_ms),
                emitted: AtomicU64::new(0),
                listener_errors: AtomicU64::new(0),
                timeouts: AtomicU64::new(0),
            }),
        }
    }

    /// Subscribes an async listener to a topic or wildcard pattern.
    pub fn on<F, Fut>(&self, topic: &str, listener: F, options: ListenerOptions) -> Subscription
    where
        F: Fn(Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.subscribe(topic, Arc::new(move |event| listener(event).boxed()), options)
    }

    /// Subscribes a synchronous listener.
    pub fn on_fn<F>(&self, topic: &str, listener: F, options: ListenerOptions) -> Subscription
    where
        F: Fn(&Event) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.subscribe(
            topic,
            Arc::new(move |event: Event| futures::future::ready(listener(&event)).boxed()),
            options,
        )
    }

    /// Subscribes a listener that is removed after its first success.
    pub fn once<F, Fut>(&self, topic: &str, listener: F, options: ListenerOptions) -> Subscription
    where
        F: Fn(Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.on(
            topic,
            listener,
            ListenerOptions {
                once: true,
                ..options
            },
        )
    }

    /// Subscribes an already type-erased listener.
    pub fn subscribe(
        &self,
        topic: &str,
        callback: ListenerFn,
        options: ListenerOptions,
    ) -> Subscription {
        let id = ListenerId(self.shared.next_id.fetch_add(1, Ordering::Relaxed));
        let pattern = TopicPattern::compile(topic);
        let wildcard = pattern.is_wildcard();

        let entry = Arc::new(ListenerEntry {
            id,
            pattern,
            priority: options.priority,
            once: options.once,
            namespace: options.namespace.clone(),
            callback,
        });
        self.shared
            .listeners
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(entry);

        debug!(
            topic = %topic,
            listener = %id,
            priority = options.priority,
            once = options.once,
            wildcard,
            namespace = options.namespace.as_deref().unwrap_or("-"),
            "Listener registered"
        );

        Subscription {
            id,
            bus: Arc::downgrade(&self.shared),
        }
    }

    /// Removes one listener. Returns whether it existed.
    pub fn off(&self, id: ListenerId) -> bool {
        self.shared.remove(id)
    }

    /// Removes every listener tagged with `namespace`. Returns the count.
    pub fn off_namespace(&self, namespace: &str) -> usize {
        let removed = self
            .shared
            .listeners
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove_where(|e| e.namespace.as_deref() == Some(namespace));

        if removed > 0 {
            info!(namespace = %namespace, removed, "Listeners removed for namespace");
        }
        removed
    }

    /// Emits an event and waits for every matching listener.
    pub async fn emit(&self, topic: &str, payload: Value, options: EmitOptions) -> EmittedEvent {
        let listeners = self
            .shared
            .listeners
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .matching(topic);

        let template = Event {
            id: Uuid::new_v4(),
            name: topic.to_string(),
            payload: Arc::new(payload),
            source: options.source.clone(),
            timestamp: Utc::now(),
            cancel: CancellationToken::new(),
        };

        debug!(
            topic = %topic,
            event_id = %template.id,
            listeners = listeners.len(),
            async_mode = options.async_mode,
            "Emitting event"
        );

        let results = if options.async_mode {
            let timeout = options.timeout.unwrap_or(self.shared.default_timeout);
            self.dispatch_concurrent(&listeners, &template, timeout).await
        } else {
            self.dispatch_sequential(&listeners, &template).await
        };

        let spent: Vec<ListenerId> = listeners
            .iter()
            .zip(&results)
            .filter(|(entry, outcome)| entry.once && outcome.is_ok())
            .map(|(entry, _)| entry.id)
            .collect();
        if !spent.is_empty() {
            self.shared
                .listeners
                .write()
                .unwrap_or_else(|e| e.into_inner())
                .remove_where(|e| spent.contains(&e.id));
        }

        let error_count = results.iter().filter(|r| !r.is_ok()).count();
        let timeout_count = results.iter().filter(|r| r.timed_out).count();
        self.shared.emitted.fetch_add(1, Ordering::Relaxed);
        self.shared
            .listener_errors
            .fetch_add(error_count as u64, Ordering::Relaxed);
        self.shared
            .timeouts
            .fetch_add(timeout_count as u64, Ordering::Relaxed);

        self.shared
            .history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(EventRecord {
                id: template.id,
                name: template.name.clone(),
                source: template.source.clone(),
                timestamp: template.timestamp,
                listener_count: results.len(),
                error_count,
            });

        EmittedEvent {
            id: template.id,
            name: template.name,
            source: template.source,
            timestamp: template.timestamp,
            results,
        }
    }

    async fn dispatch_sequential(
        &self,
        listeners: &[Arc<ListenerEntry>],
        template: &Event,
    ) -> Vec<ListenerOutcome> {
        let mut results = Vec::with_capacity(listeners.len());

        for entry in listeners {
            let event = Event {
                cancel: CancellationToken::new(),
                ..template.clone()
            };
            let callback = entry.callback.clone();
            let started = Instant::now();
            let result = guarded(async move { callback(event).await }).await;

            if let Err(e) = &result {
                warn!(topic = %template.name, listener = %entry.id, error = %e, "Listener failed");
            }
            results.push(ListenerOutcome {
                listener: entry.id,
                namespace: entry.namespace.clone(),
                result: result.map_err(|e| format!("{e:#}")),
                timed_out: false,
                elapsed: started.elapsed(),
            });
        }

        results
    }

    async fn dispatch_concurrent(
        &self,
        listeners: &[Arc<ListenerEntry>],
        template: &Event,
        timeout: Duration,
    ) -> Vec<ListenerOutcome> {
        let runs = listeners.iter().map(|entry| {
            let token = CancellationToken::new();
            let event = Event {
                cancel: token.clone(),
                ..template.clone()
            };
            let callback = entry.callback.clone();
            let started = Instant::now();
            // Spawned so that a timeout stops the wait without dropping the work.
            let handle = tokio::spawn(async move { callback(event).await });

            async move {
                let mut timed_out = false;
                let result = match tokio::time::timeout(timeout, handle).await {
                    Ok(Ok(Ok(()))) => Ok(()),
                    Ok(Ok(Err(e))) => Err(format!("{e:#}")),
                    Ok(Err(join_error)) if join_error.is_panic() => Err(format!(
                        "panicked: {}",
                        panic_message(join_error.into_panic().as_ref())
                    )),
                    Ok(Err(join_error)) => Err(join_error.to_string()),
                    Err(_) => {
                        token.cancel();
                        timed_out = true;
                        Err(KernelError::ListenerTimeout {
                            listener: entry.id.as_u64(),
                            timeout_ms: timeout.as_millis() as u64,
                        }
                        .to_string())
                    }
                };

                if let Err(e) = &result {
                    warn!(
                        topic = %template.name,
                        listener = %entry.id,
                        timed_out,
                        error = %e,
                        "Listener failed"
                    );
                }
                ListenerOutcome {
                    listener: entry.id,
                    namespace: entry.namespace.clone(),
                    result,
                    timed_out,
                    elapsed: started.elapsed(),
                }
            }
        });

        join_all(runs).await
    }

    /// Number of listeners an emission of `topic` would reach.
    pub fn listener_count(&self, topic: &str) -> usize {
        self.shared
            .listeners
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .matching(topic)
            .len()
    }

    /// Total registered listeners.
    pub fn total_listeners(&self) -> usize {
        self.shared
            .listeners
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    /// Emission records matching `filter`, oldest first.
    pub fn history(&self, filter: &HistoryFilter) -> Vec<EventRecord> {
        self.shared
            .history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .query(filter)
    }

    /// Drops all history records.
    pub fn clear_history(&self) {
        self.shared
            .history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    /// Current counters.
    pub fn stats(&self) -> EventBusStats {
        EventBusStats {
            emitted: self.shared.emitted.load(Ordering::Relaxed),
            listener_errors: self.shared.listener_errors.load(Ordering::Relaxed),
            timeouts: self.shared.timeouts.load(Ordering::Relaxed),
            listeners: self.total_listeners(),
            history_len: self
                .shared
                .history
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .len(),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(&EventsConfig::default())
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.total_listeners())
            .field("default_timeout", &self.shared.default_timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn recorder() -> Arc<Mutex<Vec<String>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    #[tokio::test]
    async fn test_priority_order_across_exact_and_wildcard() {
        let bus = EventBus::default();
        let calls = recorder();

        for (name, topic, priority) in [
            ("low", "build.done", 1),
            ("wild-high", "build.*", 10),
            ("mid-a", "build.done", 5),
            ("mid-b", "build.*", 5),
        ] {
            let calls = calls.clone();
            bus.on_fn(
                topic,
                move |_| {
                    calls.lock().unwrap().push(name.to_string());
                    Ok(())
                },
                ListenerOptions::priority(priority),
            );
        }

        let emitted = bus.emit("build.done", json!({}), EmitOptions::default()).await;
        assert!(emitted.all_ok());
        assert_eq!(*calls.lock().unwrap(), vec!["wild-high", "mid-a", "mid-b", "low"]);
    }

    #[tokio::test]
    async fn test_failing_listener_is_isolated() {
        let bus = EventBus::default();
        let calls = recorder();

        let c = calls.clone();
        bus.on_fn("job", move |_| {
            c.lock().unwrap().push("first".into());
            Ok(())
        }, ListenerOptions::priority(3));
        bus.on_fn("job", |_| anyhow::bail!("broken listener"), ListenerOptions::priority(2));
        bus.on_fn("job", |_| panic!("listener panicked"), ListenerOptions::priority(1));
        let c = calls.clone();
        bus.on("job", move |_| {
            let c = c.clone();
            async move {
                c.lock().unwrap().push("last".into());
                Ok(())
            }
        }, ListenerOptions::default());

        let emitted = bus.emit("job", Value::Null, EmitOptions::default()).await;
        assert_eq!(emitted.results.len(), 4);
        assert_eq!(emitted.errors().len(), 2);
        assert!(emitted.results[1].result.as_ref().unwrap_err().contains("broken listener"));
        assert!(emitted.results[2].result.as_ref().unwrap_err().contains("listener panicked"));
        assert_eq!(*calls.lock().unwrap(), vec!["first", "last"]);
        assert_eq!(bus.stats().listener_errors, 2);
    }

    #[tokio::test]
    async fn test_user_wildcard_scenario() {
        let bus = EventBus::default();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        bus.on_fn("user.*", move |event| {
            s.lock().unwrap().push((*event.payload).clone());
            Ok(())
        }, ListenerOptions::default());

        bus.emit("user.login", json!({"id": 1}), EmitOptions::default()).await;
        bus.emit("order.created", json!({}), EmitOptions::default()).await;

        assert_eq!(*seen.lock().unwrap(), vec![json!({"id": 1})]);
    }

    #[tokio::test]
    async fn test_once_removed_after_success_only() {
        let bus = EventBus::default();
        let count = Arc::new(AtomicU64::new(0));
        let fail_first = Arc::new(AtomicU64::new(0));

        let c = count.clone();
        let f = fail_first.clone();
        bus.once("tick", move |_| {
            let c = c.clone();
            let f = f.clone();
            async move {
                if f.fetch_add(1, Ordering::SeqCst) == 0 {
                    anyhow::bail!("not yet");
                }
                c.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }, ListenerOptions::default());

        bus.emit("tick", Value::Null, EmitOptions::default()).await;
        assert_eq!(bus.listener_count("tick"), 1);
        bus.emit("tick", Value::Null, EmitOptions::default()).await;
        bus.emit("tick", Value::Null, EmitOptions::default()).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(bus.listener_count("tick"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_timeout_cancels_token() {
        let bus = EventBus::default();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        bus.on("slow", move |event: Event| {
            let tx = tx.clone();
            async move {
                event.cancel.cancelled().await;
                let _ = tx.send("cancelled");
                Ok(())
            }
        }, ListenerOptions::default());
        bus.on_fn("slow", |_| Ok(()), ListenerOptions::default());

        let emitted = bus
            .emit(
                "slow",
                Value::Null,
                EmitOptions::concurrent().with_timeout(Duration::from_millis(50)),
            )
            .await;

        assert_eq!(emitted.results.len(), 2);
        assert!(emitted.results[0].timed_out);
        assert!(emitted.results[0].result.as_ref().unwrap_err().contains("timed out"));
        assert!(emitted.results[1].is_ok());
        assert_eq!(rx.recv().await, Some("cancelled"));
        assert_eq!(bus.stats().timeouts, 1);
    }

    #[tokio::test]
    async fn test_off_namespace_and_subscription() {
        let bus = EventBus::default();
        bus.on_fn("a", |_| Ok(()), ListenerOptions::default().in_namespace("p1"));
        bus.on_fn("b.*", |_| Ok(()), ListenerOptions::default().in_namespace("p1"));
        let sub = bus.on_fn("a", |_| Ok(()), ListenerOptions::default().in_namespace("p2"));

        assert_eq!(bus.off_namespace("p1"), 2);
        assert_eq!(bus.total_listeners(), 1);
        assert!(sub.unsubscribe());
        assert!(!sub.unsubscribe());
        assert_eq!(bus.total_listeners(), 0);
    }

    #[tokio::test]
    async fn test_history_records_emissions() {
        let bus = EventBus::new(&EventsConfig {
            history_size: 2,
            default_timeout_ms: 100,
        });
        bus.emit("a", Value::Null, EmitOptions::from_source("host")).await;
        bus.emit("b", Value::Null, EmitOptions::default()).await;
        bus.emit("c", Value::Null, EmitOptions::from_source("host")).await;

        let all = bus.history(&HistoryFilter::default());
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].name, "b");
        assert_eq!(bus.history(&HistoryFilter::source("host")).len(), 1);
        assert_eq!(bus.stats().emitted, 3);

        bus.clear_history();
        assert!(bus.history(&HistoryFilter::default()).is_empty());
    }
}
