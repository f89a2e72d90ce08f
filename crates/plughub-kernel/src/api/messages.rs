//! Messaging for plugins.

use serde_json::Value;
use uuid::Uuid;

use plughub_core::result::KernelResult;

use crate::messages::{Message, MessageBus};

/// Mailbox view of one plugin.
#[derive(Debug, Clone, Copy)]
pub struct ContextMessages<'a> {
    plugin: &'a str,
    bus: &'a MessageBus,
}

impl<'a> ContextMessages<'a> {
    pub(crate) fn new(plugin: &'a str, bus: &'a MessageBus) -> Self {
        Self { plugin, bus }
    }

    /// Sends a message to another plugin.
    pub fn send(&self, to: &str, payload: Value) -> KernelResult<Uuid> {
        self.bus.send(self.plugin, to, payload)
    }

    /// Drains this plugin's mailbox.
    pub fn receive(&self) -> Vec<Message> {
        self.bus.receive(self.plugin)
    }

    /// Sends a message to every other plugin.
    pub fn broadcast(&self, payload: Value) -> usize {
        self.bus.broadcast(self.plugin, payload)
    }
}
