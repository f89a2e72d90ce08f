//! # plughub-kernel
//!
//! In-process plugin kernel. Provides:
//!
//! - Hook registry with sync, async-series, async-parallel and waterfall
//!   dispatch over priority-ordered taps
//! - Event bus with single-segment wildcard topics, once listeners,
//!   per-listener timeouts and an emission history
//! - Service registry with singleton/transient factories, dependency
//!   injection and cycle detection
//! - Namespaced shared storage with TTL, watchers and middleware
//! - Per-plugin mailboxes and direct plugin-to-plugin calls
//! - Dependency-ordered plugin lifecycle with failure isolation
//! - Lazy plugins gated by conditions, backed by an LRU instance cache
//!
//! A [`Kernel`] owns one isolated set of all of the above.

pub mod api;
pub mod components;
pub mod events;
mod guard;
pub mod hooks;
pub mod kernel;
pub mod lazy;
pub mod lifecycle;
pub mod messages;
pub mod prelude;
pub mod services;
pub mod storage;

pub use api::context::PluginContext;
pub use components::Components;
pub use events::EventBus;
pub use hooks::{HookDispatcher, HookRegistry};
pub use kernel::{CommunicationStats, Kernel, RegisterOptions};
pub use lazy::{InstanceCache, LazyLoader};
pub use lifecycle::{Plugin, PluginManager, PluginRegistry};
pub use messages::MessageBus;
pub use services::ServiceRegistry;
pub use storage::SharedStorage;
