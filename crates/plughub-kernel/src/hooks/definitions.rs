//! Hook definitions, arguments, and tap handler types.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Dispatch strategy of a hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookKind {
    /// Taps run in order on the calling task; the last tap's return wins.
    Sync,
    /// Taps are awaited one after another; the first failure aborts.
    AsyncSeries,
    /// Taps run concurrently; failures are collected.
    AsyncParallel,
    /// Each tap receives the previous tap's return as its first argument.
    Waterfall,
}

impl HookKind {
    /// Returns the string name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sync => "sync",
            Self::AsyncSeries => "async_series",
            Self::AsyncParallel => "async_parallel",
            Self::Waterfall => "waterfall",
        }
    }

    /// Returns whether taps on this hook may be asynchronous.
    pub fn accepts_async_taps(&self) -> bool {
        !matches!(self, Self::Sync)
    }
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An extension point exposed by the host. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookDefinition {
    /// Unique hook name.
    pub name: String,
    /// Dispatch strategy.
    pub kind: HookKind,
    /// Names of the positional parameters every call supplies.
    pub param_names: Vec<String>,
}

impl HookDefinition {
    /// Creates a new hook definition.
    pub fn new<I, S>(name: impl Into<String>, kind: HookKind, param_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            kind,
            param_names: param_names.into_iter().map(Into::into).collect(),
        }
    }

    /// Number of parameters a call must supply.
    pub fn arity(&self) -> usize {
        self.param_names.len()
    }
}

/// Positional arguments of one hook call, addressable by parameter name.
#[derive(Debug, Clone)]
pub struct HookArgs {
    names: Arc<[String]>,
    values: Vec<Value>,
}

impl HookArgs {
    pub(crate) fn new(names: Arc<[String]>, values: Vec<Value>) -> Self {
        Self { names, values }
    }

    /// Gets an argument by parameter name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.names
            .iter()
            .position(|n| n == name)
            .and_then(|idx| self.values.get(idx))
    }

    /// Gets a string argument by parameter name.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|v| v.as_str())
    }

    /// Gets an argument by position.
    pub fn at(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// The first argument; for waterfall hooks this is the flowing value.
    pub fn first(&self) -> Option<&Value> {
        self.values.first()
    }

    /// All argument values in declaration order.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Number of arguments.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the call carries no arguments.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub(crate) fn replace_first(&mut self, value: Value) {
        if let Some(slot) = self.values.first_mut() {
            *slot = value;
        }
    }
}

/// Return of a tap: `Ok(None)` means "nothing to report / no change".
pub type TapResult = anyhow::Result<Option<Value>>;

/// Synchronous tap callback.
pub type SyncTapFn = Arc<dyn Fn(&HookArgs) -> TapResult + Send + Sync>;

/// Asynchronous tap callback.
pub type AsyncTapFn = Arc<dyn Fn(HookArgs) -> BoxFuture<'static, TapResult> + Send + Sync>;

/// A tap callback, synchronous or asynchronous.
#[derive(Clone)]
pub enum TapHandler {
    /// Runs to completion on the calling task without yielding.
    Sync(SyncTapFn),
    /// Returns a future that is awaited by the dispatcher.
    Async(AsyncTapFn),
}

impl TapHandler {
    /// Wraps a synchronous closure.
    pub fn sync<F>(f: F) -> Self
    where
        F: Fn(&HookArgs) -> TapResult + Send + Sync + 'static,
    {
        Self::Sync(Arc::new(f))
    }

    /// Wraps an asynchronous closure.
    pub fn future<F, Fut>(f: F) -> Self
    where
        F: Fn(HookArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = TapResult> + Send + 'static,
    {
        Self::Async(Arc::new(move |args| f(args).boxed()))
    }

    /// Whether this handler is asynchronous.
    pub fn is_async(&self) -> bool {
        matches!(self, Self::Async(_))
    }

    /// Invokes the handler, awaiting it when asynchronous.
    pub async fn invoke(&self, args: HookArgs) -> TapResult {
        match self {
            Self::Sync(f) => f(&args),
            Self::Async(f) => f(args).await,
        }
    }
}

impl fmt::Debug for TapHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sync(_) => f.write_str("TapHandler::Sync(<closure>)"),
            Self::Async(_) => f.write_str("TapHandler::Async(<closure>)"),
        }
    }
}

/// Options accepted by `tap`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TapOptions {
    /// Higher runs first; ties keep registration order.
    pub priority: i32,
    /// Number of parameters the callback expects, checked at tap time when set.
    pub arity: Option<usize>,
}

impl TapOptions {
    /// Options with the given priority.
    pub fn priority(priority: i32) -> Self {
        Self {
            priority,
            arity: None,
        }
    }

    /// Declares the callback's expected parameter count.
    pub fn with_arity(mut self, arity: usize) -> Self {
        self.arity = Some(arity);
        self
    }
}

/// One plugin's handler attached to a hook.
#[derive(Debug, Clone)]
pub struct Tap {
    /// Plugin that registered this tap.
    pub plugin: String,
    /// Priority (higher = earlier).
    pub priority: i32,
    /// Registration sequence, used for stable ordering.
    pub seq: u64,
    /// The callback.
    pub handler: TapHandler,
}

/// Outcome of one tap in a parallel dispatch.
#[derive(Debug, Clone)]
pub struct TapOutcome {
    /// Plugin that owns the tap.
    pub plugin: String,
    /// Returned value or the failure message.
    pub result: Result<Option<Value>, String>,
}

/// Aggregated result of an async-parallel dispatch.
#[derive(Debug, Clone)]
pub struct ParallelReport {
    /// Hook name.
    pub hook: String,
    /// One outcome per tap, in priority order.
    pub outcomes: Vec<TapOutcome>,
}

impl ParallelReport {
    /// Whether every tap succeeded.
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }

    /// Outcomes that failed.
    pub fn failures(&self) -> Vec<&TapOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_err()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_args_by_name_and_position() {
        let names: Arc<[String]> = vec!["code".to_string(), "id".to_string()].into();
        let args = HookArgs::new(names, vec![json!("let a = 1;"), json!("main.ts")]);
        assert_eq!(args.get_str("id"), Some("main.ts"));
        assert_eq!(args.first(), Some(&json!("let a = 1;")));
        assert_eq!(args.at(1), Some(&json!("main.ts")));
        assert!(args.get("missing").is_none());
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(HookKind::AsyncSeries.to_string(), "async_series");
        assert!(!HookKind::Sync.accepts_async_taps());
        assert!(HookKind::Waterfall.accepts_async_taps());
    }

    #[tokio::test]
    async fn test_handler_invoke_sync_and_async() {
        let names: Arc<[String]> = vec!["x".to_string()].into();
        let args = HookArgs::new(names, vec![json!(2)]);

        let double = TapHandler::sync(|args| {
            Ok(args.first().and_then(|v| v.as_i64()).map(|n| json!(n * 2)))
        });
        let triple = TapHandler::future(|args: HookArgs| async move {
            Ok(args.first().and_then(|v| v.as_i64()).map(|n| json!(n * 3)))
        });

        assert!(!double.is_async());
        assert!(triple.is_async());
        assert_eq!(double.invoke(args.clone()).await.unwrap(), Some(json!(4)));
        assert_eq!(triple.invoke(args).await.unwrap(), Some(json!(6)));
    }
}
