//! Hook dispatcher: runs a hook's taps according to its kind.
//!
//! - `sync`: taps run in priority order without yielding; the last non-empty
//!   return wins.
//! - `async_series`: taps are awaited one at a time; the first failure aborts
//!   the remaining taps and propagates.
//! - `async_parallel`: taps run concurrently; every outcome is collected.
//! - `waterfall`: each tap receives the previous value as its first argument;
//!   an empty or `null` return leaves the value unchanged.
//!
//! Taps are snapshotted before dispatch, so a tap may itself tap or create
//! hooks without deadlocking; changes apply from the next call onwards.

use std::sync::Arc;

use futures::future::join_all;
use serde_json::Value;
use tracing::{debug, warn};

use plughub_core::error::KernelError;
use plughub_core::result::KernelResult;

use super::definitions::{HookArgs, HookKind, ParallelReport, TapHandler, TapOutcome};
use super::registry::{HookRegistry, HookSnapshot};
use crate::guard::{guarded, guarded_sync};

/// Dispatches hooks to their taps.
#[derive(Debug, Clone)]
pub struct HookDispatcher {
    /// Hook registry.
    registry: Arc<HookRegistry>,
}

impl HookDispatcher {
    /// Creates a new hook dispatcher.
    pub fn new(registry: Arc<HookRegistry>) -> Self {
        Self { registry }
    }

    /// Calls a `sync` hook. Returns the last tap's non-empty return, or
    /// `default` when no tap returned anything.
    pub fn call_sync(&self, hook: &str, args: Vec<Value>, default: Value) -> KernelResult<Value> {
        let snapshot = self.prepare(hook, HookKind::Sync, &args)?;
        let args = HookArgs::new(snapshot.param_names.clone(), args);
        let mut last = default;

        for tap in &snapshot.taps {
            let TapHandler::Sync(f) = &tap.handler else {
                continue;
            };
            match guarded_sync(|| f(&args)) {
                Ok(Some(value)) if !value.is_null() => last = value,
                Ok(_) => {}
                Err(e) => return Err(KernelError::tap_failed(hook, &tap.plugin, e)),
            }
        }

        Ok(last)
    }

    /// Calls an `async_series` hook. The first failing tap aborts the rest.
    pub async fn call_async_series(
        &self,
        hook: &str,
        args: Vec<Value>,
        default: Value,
    ) -> KernelResult<Value> {
        let snapshot = self.prepare(hook, HookKind::AsyncSeries, &args)?;
        let args = HookArgs::new(snapshot.param_names.clone(), args);
        let mut last = default;

        for tap in &snapshot.taps {
            match guarded(tap.handler.invoke(args.clone())).await {
                Ok(Some(value)) if !value.is_null() => last = value,
                Ok(_) => {}
                Err(e) => {
                    warn!(hook = %hook, plugin = %tap.plugin, error = %e, "Series tap failed, aborting");
                    return Err(KernelError::tap_failed(hook, &tap.plugin, e));
                }
            }
        }

        Ok(last)
    }

    /// Calls an `async_parallel` hook. Resolves once every tap has settled.
    pub async fn call_async_parallel(
        &self,
        hook: &str,
        args: Vec<Value>,
    ) -> KernelResult<ParallelReport> {
        let snapshot = self.prepare(hook, HookKind::AsyncParallel, &args)?;
        let args = HookArgs::new(snapshot.param_names.clone(), args);

        let runs = snapshot.taps.iter().map(|tap| {
            let args = args.clone();
            async move {
                let result = guarded(tap.handler.invoke(args)).await;
                if let Err(e) = &result {
                    warn!(hook = %hook, plugin = %tap.plugin, error = %e, "Parallel tap failed");
                }
                TapOutcome {
                    plugin: tap.plugin.clone(),
                    result: result.map_err(|e| format!("{e:#}")),
                }
            }
        });
        let outcomes = join_all(runs).await;

        Ok(ParallelReport {
            hook: hook.to_string(),
            outcomes,
        })
    }

    /// Calls a `waterfall` hook. `rest` supplies every parameter after the
    /// first; the first parameter carries `seed` and then each tap's return.
    pub async fn call_waterfall(
        &self,
        hook: &str,
        seed: Value,
        rest: Vec<Value>,
    ) -> KernelResult<Value> {
        let mut values = Vec::with_capacity(rest.len() + 1);
        values.push(seed);
        values.extend(rest);

        let snapshot = self.prepare(hook, HookKind::Waterfall, &values)?;
        let mut args = HookArgs::new(snapshot.param_names.clone(), values);

        for tap in &snapshot.taps {
            match guarded(tap.handler.invoke(args.clone())).await {
                Ok(Some(value)) if !value.is_null() => args.replace_first(value),
                Ok(_) => {}
                Err(e) => {
                    warn!(hook = %hook, plugin = %tap.plugin, error = %e, "Waterfall tap failed, aborting");
                    return Err(KernelError::tap_failed(hook, &tap.plugin, e));
                }
            }
        }

        Ok(args.first().cloned().unwrap_or(Value::Null))
    }

    /// Returns a reference to the hook registry.
    pub fn registry(&self) -> &Arc<HookRegistry> {
        &self.registry
    }

    fn prepare(&self, hook: &str, requested: HookKind, args: &[Value]) -> KernelResult<HookSnapshot> {
        let snapshot = self.registry.snapshot(hook)?;

        if snapshot.definition.kind != requested {
            return Err(KernelError::HookKindMismatch {
                hook: hook.to_string(),
                kind: snapshot.definition.kind.to_string(),
                requested: requested.to_string(),
            });
        }

        if args.len() != snapshot.definition.arity() {
            return Err(KernelError::HookArity {
                hook: hook.to_string(),
                expected: snapshot.definition.arity(),
                actual: args.len(),
            });
        }

        debug!(hook = %hook, kind = %requested, taps = snapshot.taps.len(), "Dispatching hook");
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::hooks::definitions::TapOptions;

    fn dispatcher() -> HookDispatcher {
        HookDispatcher::new(Arc::new(HookRegistry::new()))
    }

    #[test]
    fn test_sync_priority_order_and_last_return() {
        let d = dispatcher();
        let reg = d.registry();
        reg.create_hook("build_start", HookKind::Sync, ["options"]).unwrap();

        let calls = Arc::new(Mutex::new(Vec::new()));
        for (name, priority) in [("p3", 1), ("p1", 10), ("p2", 5)] {
            let calls = calls.clone();
            reg.tap(
                "build_start",
                name,
                TapHandler::sync(move |_| {
                    calls.lock().unwrap().push(name);
                    Ok(Some(json!(name)))
                }),
                TapOptions::priority(priority),
            )
            .unwrap();
        }

        let result = d
            .call_sync("build_start", vec![json!({})], json!("default"))
            .unwrap();
        assert_eq!(*calls.lock().unwrap(), vec!["p1", "p2", "p3"]);
        assert_eq!(result, json!("p3"));
    }

    #[test]
    fn test_zero_taps_returns_default() {
        let d = dispatcher();
        d.registry()
            .create_hook("options", HookKind::Sync, ["opts"])
            .unwrap();
        let result = d
            .call_sync("options", vec![json!(1)], json!({"minify": true}))
            .unwrap();
        assert_eq!(result, json!({"minify": true}));
    }

    #[test]
    fn test_wrong_arity_and_kind() {
        let d = dispatcher();
        d.registry()
            .create_hook("transform", HookKind::Waterfall, ["code", "id"])
            .unwrap();
        assert!(matches!(
            d.call_sync("transform", vec![json!(1), json!(2)], Value::Null),
            Err(KernelError::HookKindMismatch { .. })
        ));
        let err = futures::executor::block_on(d.call_waterfall("transform", json!("x"), vec![]))
            .unwrap_err();
        assert!(matches!(err, KernelError::HookArity { expected: 2, actual: 1, .. }));
    }

    #[tokio::test]
    async fn test_waterfall_with_zero_taps_returns_seed() {
        let d = dispatcher();
        d.registry()
            .create_hook("transform", HookKind::Waterfall, ["code", "id"])
            .unwrap();
        let seed = json!("export const a = 1;");
        let out = d
            .call_waterfall("transform", seed.clone(), vec![json!("a.ts")])
            .await
            .unwrap();
        assert_eq!(out, seed);
    }

    #[tokio::test]
    async fn test_waterfall_chains_and_skips_no_change() {
        let d = dispatcher();
        let reg = d.registry();
        reg.create_hook("transform", HookKind::Waterfall, ["code", "id"])
            .unwrap();
        reg.tap(
            "transform",
            "strip-types",
            TapHandler::sync(|args| {
                let code = args.get_str("code").unwrap_or_default();
                Ok(Some(json!(code.replace(": number", ""))))
            }),
            TapOptions::priority(10),
        )
        .unwrap();
        reg.tap(
            "transform",
            "untouched",
            TapHandler::sync(|_| Ok(None)),
            TapOptions::priority(5),
        )
        .unwrap();
        reg.tap(
            "transform",
            "banner",
            TapHandler::future(|args: HookArgs| async move {
                let code = args.first().and_then(|v| v.as_str()).unwrap_or_default().to_string();
                let id = args.get_str("id").unwrap_or_default().to_string();
                Ok(Some(json!(format!("// {id}\n{code}"))))
            }),
            TapOptions::priority(1),
        )
        .unwrap();

        let out = d
            .call_waterfall("transform", json!("let a: number = 1;"), vec![json!("a.ts")])
            .await
            .unwrap();
        assert_eq!(out, json!("// a.ts\nlet a = 1;"));
    }

    #[tokio::test]
    async fn test_series_first_failure_aborts() {
        let d = dispatcher();
        let reg = d.registry();
        reg.create_hook("resolve_id", HookKind::AsyncSeries, ["source"])
            .unwrap();

        let ran_after = Arc::new(Mutex::new(false));
        reg.tap(
            "resolve_id",
            "broken",
            TapHandler::future(|_| async { Err(anyhow::anyhow!("cannot resolve")) }),
            TapOptions::priority(10),
        )
        .unwrap();
        let flag = ran_after.clone();
        reg.tap(
            "resolve_id",
            "later",
            TapHandler::sync(move |_| {
                *flag.lock().unwrap() = true;
                Ok(None)
            }),
            TapOptions::priority(1),
        )
        .unwrap();

        let err = d
            .call_async_series("resolve_id", vec![json!("./a")], Value::Null)
            .await
            .unwrap_err();
        assert!(matches!(err, KernelError::TapFailed { ref plugin, .. } if plugin == "broken"));
        assert!(!*ran_after.lock().unwrap());
    }

    #[tokio::test]
    async fn test_parallel_collects_partial_failures() {
        let d = dispatcher();
        let reg = d.registry();
        reg.create_hook("write_bundle", HookKind::AsyncParallel, ["bundle"])
            .unwrap();

        let done = Arc::new(Mutex::new(0));
        for (name, fail) in [("a", false), ("b", true), ("c", false)] {
            let done = done.clone();
            reg.tap(
                "write_bundle",
                name,
                TapHandler::future(move |_| {
                    let done = done.clone();
                    async move {
                        tokio::time::sleep(Duration::from_millis(5)).await;
                        if fail {
                            anyhow::bail!("disk full");
                        }
                        *done.lock().unwrap() += 1;
                        Ok(Some(json!(name)))
                    }
                }),
                TapOptions::default(),
            )
            .unwrap();
        }

        let report = d
            .call_async_parallel("write_bundle", vec![json!({})])
            .await
            .unwrap();
        assert_eq!(report.outcomes.len(), 3);
        assert!(!report.is_success());
        assert_eq!(report.failures().len(), 1);
        assert_eq!(report.failures()[0].plugin, "b");
        assert_eq!(*done.lock().unwrap(), 2);
    }
}
