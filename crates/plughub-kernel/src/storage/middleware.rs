//! Mutation middleware.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of storage mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageAction {
    /// A value is written.
    Set,
    /// A value is removed.
    Delete,
}

impl fmt::Display for StorageAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Set => write!(f, "set"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

/// A mutation as seen by middleware.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageMutation {
    /// Key without namespace.
    pub key: String,
    /// Namespace.
    pub namespace: String,
    /// Value to write. `Null` for deletes.
    pub value: Value,
    /// Current live value, if any.
    pub old_value: Option<Value>,
    /// Mutation kind.
    pub action: StorageAction,
}

impl StorageMutation {
    /// `namespace:key`.
    pub fn full_key(&self) -> String {
        format!("{}:{}", self.namespace, self.key)
    }
}

/// Middleware may pass a mutation through, rewrite its value, or reject it
/// by returning an error.
pub type Middleware = Arc<dyn Fn(StorageMutation) -> anyhow::Result<StorageMutation> + Send + Sync>;
