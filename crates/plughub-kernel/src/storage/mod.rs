//! Shared namespaced key/value storage.

pub mod middleware;
pub mod store;

pub use middleware::{Middleware, StorageAction, StorageMutation};
pub use store::{
    GetOptions, SetOptions, SharedStorage, StorageEntry, StorageStats, WatchFn, WatchHandle,
    WatchOptions,
};
