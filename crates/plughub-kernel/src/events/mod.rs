//! Event bus for loosely-coupled plugin signaling.

pub mod bus;
pub mod history;
pub mod topic;

pub use bus::{
    EmitOptions, EmittedEvent, Event, EventBus, EventBusStats, ListenerFn, ListenerId,
    ListenerOptions, ListenerOutcome, Subscription,
};
pub use history::{EventRecord, HistoryFilter};
pub use topic::TopicPattern;
