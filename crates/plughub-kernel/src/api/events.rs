//! Event access for plugins.

use std::future::Future;

use serde_json::Value;

use crate::events::{
    EmitOptions, EmittedEvent, Event, EventBus, ListenerId, ListenerOptions, Subscription,
};

/// Event view scoped to one plugin.
#[derive(Debug, Clone, Copy)]
pub struct ContextEvents<'a> {
    plugin: &'a str,
    bus: &'a EventBus,
}

impl<'a> ContextEvents<'a> {
    pub(crate) fn new(plugin: &'a str, bus: &'a EventBus) -> Self {
        Self { plugin, bus }
    }

    fn scoped(&self, options: ListenerOptions) -> ListenerOptions {
        ListenerOptions {
            namespace: Some(self.plugin.to_string()),
            ..options
        }
    }

    /// Subscribes an async listener in the plugin's namespace.
    pub fn on<F, Fut>(&self, topic: &str, listener: F, options: ListenerOptions) -> Subscription
    where
        F: Fn(Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.bus.on(topic, listener, self.scoped(options))
    }

    /// Subscribes a synchronous listener in the plugin's namespace.
    pub fn on_fn<F>(&self, topic: &str, listener: F, options: ListenerOptions) -> Subscription
    where
        F: Fn(&Event) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.bus.on_fn(topic, listener, self.scoped(options))
    }

    /// Subscribes a one-shot listener in the plugin's namespace.
    pub fn once<F, Fut>(&self, topic: &str, listener: F, options: ListenerOptions) -> Subscription
    where
        F: Fn(Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.bus.once(topic, listener, self.scoped(options))
    }

    /// Emits sequentially with the plugin as source.
    pub async fn emit(&self, topic: &str, payload: Value) -> EmittedEvent {
        self.emit_with(topic, payload, EmitOptions::default()).await
    }

    /// Emits with explicit options. The source is always the plugin.
    pub async fn emit_with(&self, topic: &str, payload: Value, options: EmitOptions) -> EmittedEvent {
        let options = EmitOptions {
            source: Some(self.plugin.to_string()),
            ..options
        };
        self.bus.emit(topic, payload, options).await
    }

    /// Removes a listener.
    pub fn off(&self, id: ListenerId) -> bool {
        self.bus.off(id)
    }
}
