//! Point-to-point and broadcast messaging between plugins.
//!
//! Every registered plugin owns a mailbox. Messages queue until the
//! recipient drains them with [`MessageBus::receive`]. A full mailbox drops
//! its oldest message to make room.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use plughub_core::config::messages::MessagesConfig;
use plughub_core::error::KernelError;
use plughub_core::result::KernelResult;

/// A queued message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Message identifier.
    pub id: Uuid,
    /// Sending plugin.
    pub from: String,
    /// Recipient, or `None` for broadcasts.
    pub to: Option<String>,
    /// Message body.
    pub payload: Value,
    /// Send time.
    pub timestamp: DateTime<Utc>,
}

/// Messaging counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageStats {
    /// Open mailboxes.
    pub mailboxes: usize,
    /// Direct messages sent.
    pub sent: u64,
    /// Broadcasts sent.
    pub broadcasts: u64,
    /// Messages waiting across all mailboxes.
    pub pending: usize,
    /// Oldest messages dropped from full mailboxes.
    pub dropped: u64,
}

/// Per-plugin mailboxes.
#[derive(Debug)]
pub struct MessageBus {
    mailboxes: DashMap<String, VecDeque<Message>>,
    capacity: usize,
    sent: AtomicU64,
    broadcasts: AtomicU64,
    dropped: AtomicU64,
}

impl MessageBus {
    /// Creates a bus with no mailboxes.
    pub fn new(config: &MessagesConfig) -> Self {
        Self {
            mailboxes: DashMap::new(),
            capacity: config.mailbox_capacity.max(1),
            sent: AtomicU64::new(0),
            broadcasts: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    fn enqueue(&self, owner: &str, mailbox: &mut VecDeque<Message>, message: Message) {
        if mailbox.len() >= self.capacity {
            if let Some(oldest) = mailbox.pop_front() {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(plugin = %owner, message_id = %oldest.id, "Mailbox full, dropped oldest message");
            }
        }
        mailbox.push_back(message);
    }

    /// Opens a mailbox for `plugin`. Existing mail is kept.
    pub fn open_mailbox(&self, plugin: &str) {
        self.mailboxes.entry(plugin.to_string()).or_default();
    }

    /// Drops a mailbox and any undelivered mail.
    pub fn remove_mailbox(&self, plugin: &str) -> usize {
        self.mailboxes
            .remove(plugin)
            .map(|(_, queue)| queue.len())
            .unwrap_or(0)
    }

    /// Queues a message for `to`.
    pub fn send(&self, from: &str, to: &str, payload: Value) -> KernelResult<Uuid> {
        let mut mailbox = self
            .mailboxes
            .get_mut(to)
            .ok_or_else(|| KernelError::UnknownPlugin(to.to_string()))?;

        let message = Message {
            id: Uuid::new_v4(),
            from: from.to_string(),
            to: Some(to.to_string()),
            payload,
            timestamp: Utc::now(),
        };
        let id = message.id;
        self.enqueue(to, &mut mailbox, message);
        drop(mailbox);

        self.sent.fetch_add(1, Ordering::Relaxed);
        debug!(from = %from, to = %to, message_id = %id, "Message sent");
        Ok(id)
    }

    /// Queues a message for every mailbox except the sender's. Returns the
    /// number of recipients.
    pub fn broadcast(&self, from: &str, payload: Value) -> usize {
        let id = Uuid::new_v4();
        let timestamp = Utc::now();
        let mut recipients = 0;

        for mut mailbox in self.mailboxes.iter_mut() {
            if mailbox.key() == from {
                continue;
            }
            let (owner, queue) = mailbox.pair_mut();
            self.enqueue(owner, queue, Message {
                id,
                from: from.to_string(),
                to: None,
                payload: payload.clone(),
                timestamp,
            });
            recipients += 1;
        }

        self.broadcasts.fetch_add(1, Ordering::Relaxed);
        debug!(from = %from, recipients, message_id = %id, "Message broadcast");
        recipients
    }

    /// Drains `plugin`'s mailbox, oldest first.
    pub fn receive(&self, plugin: &str) -> Vec<Message> {
        self.mailboxes
            .get_mut(plugin)
            .map(|mut mailbox| mailbox.drain(..).collect())
            .unwrap_or_default()
    }

    /// Number of messages waiting for `plugin`.
    pub fn pending(&self, plugin: &str) -> usize {
        self.mailboxes.get(plugin).map(|m| m.len()).unwrap_or(0)
    }

    /// Current counters.
    pub fn stats(&self) -> MessageStats {
        MessageStats {
            mailboxes: self.mailboxes.len(),
            sent: self.sent.load(Ordering::Relaxed),
            broadcasts: self.broadcasts.load(Ordering::Relaxed),
            pending: self.mailboxes.iter().map(|m| m.len()).sum(),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new(&MessagesConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_send_and_receive() {
        let bus = MessageBus::default();
        bus.open_mailbox("a");
        bus.open_mailbox("b");

        bus.send("a", "b", json!({"ping": 1})).unwrap();
        bus.send("a", "b", json!({"ping": 2})).unwrap();
        assert_eq!(bus.pending("b"), 2);

        let received = bus.receive("b");
        assert_eq!(received.len(), 2);
        assert_eq!(received[0].payload, json!({"ping": 1}));
        assert_eq!(received[1].from, "a");
        assert!(bus.receive("b").is_empty());
    }

    #[test]
    fn test_send_to_unknown_plugin() {
        let bus = MessageBus::default();
        assert!(matches!(
            bus.send("a", "ghost", Value::Null),
            Err(KernelError::UnknownPlugin(name)) if name == "ghost"
        ));
    }

    #[test]
    fn test_broadcast_skips_sender() {
        let bus = MessageBus::default();
        for name in ["a", "b", "c"] {
            bus.open_mailbox(name);
        }
        assert_eq!(bus.broadcast("a", json!("reload")), 2);
        assert_eq!(bus.pending("a"), 0);
        assert_eq!(bus.receive("c")[0].to, None);

        assert_eq!(bus.remove_mailbox("b"), 1);
        let stats = bus.stats();
        assert_eq!(stats.mailboxes, 2);
        assert_eq!(stats.broadcasts, 1);
        assert_eq!(stats.pending, 0);
    }

    #[test]
    fn test_full_mailbox_drops_oldest() {
        let bus = MessageBus::new(&MessagesConfig { mailbox_capacity: 2 });
        bus.open_mailbox("a");
        bus.open_mailbox("b");

        for n in 1..=3 {
            bus.send("a", "b", json!(n)).unwrap();
        }
        bus.broadcast("a", json!("all"));
        assert_eq!(bus.pending("b"), 2);

        let payloads: Vec<Value> = bus.receive("b").into_iter().map(|m| m.payload).collect();
        assert_eq!(payloads, vec![json!(3), json!("all")]);
        assert_eq!(bus.stats().dropped, 2);
    }
}
