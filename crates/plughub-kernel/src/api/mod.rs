//! Plugin-facing API: the context and its scoped views.

pub mod context;
pub mod events;
pub mod hooks;
pub mod messages;
pub mod services;
pub mod storage;

pub use context::PluginContext;
pub use events::ContextEvents;
pub use hooks::ContextHooks;
pub use messages::ContextMessages;
pub use services::ContextServices;
pub use storage::ContextStorage;
