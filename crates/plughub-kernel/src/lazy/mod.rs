//! Lazy plugins: deferred construction behind conditions, with a bounded
//! instance cache.

pub mod cache;
pub mod loader;

pub use cache::{CacheStats, EntryStats, InstanceCache};
pub use loader::{LazyConditions, LazyLoader, LoadContext, PluginLoader};
