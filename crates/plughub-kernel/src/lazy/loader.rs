//! Deferred plugin construction.
//!
//! A lazy plugin is described by a loader and a set of conditions. The
//! plugin is built the first time [`LazyLoader::check_and_load`] is called
//! with a context satisfying every condition; concurrent callers share that
//! single build.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use futures::FutureExt;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use plughub_core::config::cache::CacheConfig;
use plughub_core::error::KernelError;
use plughub_core::result::KernelResult;

use super::cache::InstanceCache;
use crate::guard::guarded;
use crate::lifecycle::plugin::Plugin;

/// Builds a lazy plugin.
pub type PluginLoader =
    Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<Arc<dyn Plugin>>> + Send + Sync>;

/// Conditions that must all hold before a lazy plugin is built. Unset
/// conditions always hold.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LazyConditions {
    /// Required trigger name.
    pub trigger: Option<String>,
    /// Required environment.
    pub environment: Option<String>,
    /// Feature flag that must be on.
    pub feature_flag: Option<String>,
}

impl LazyConditions {
    /// Requires `trigger`.
    pub fn on_trigger(trigger: impl Into<String>) -> Self {
        Self {
            trigger: Some(trigger.into()),
            ..Self::default()
        }
    }

    /// Also requires `environment`.
    pub fn in_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    /// Also requires feature flag `flag`.
    pub fn with_feature(mut self, flag: impl Into<String>) -> Self {
        self.feature_flag = Some(flag.into());
        self
    }

    /// Whether `context` satisfies every set condition.
    pub fn are_met(&self, context: &LoadContext) -> bool {
        let trigger = self
            .trigger
            .as_deref()
            .is_none_or(|t| context.trigger.as_deref() == Some(t));
        let environment = self
            .environment
            .as_deref()
            .is_none_or(|env| context.environment == env);
        let feature = self
            .feature_flag
            .as_deref()
            .is_none_or(|flag| context.feature_flags.contains(flag));
        trigger && environment && feature
    }
}

/// What the host knows when asking for a lazy plugin.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadContext {
    /// The trigger that caused the request.
    pub trigger: Option<String>,
    /// Current environment.
    pub environment: String,
    /// Enabled feature flags.
    pub feature_flags: HashSet<String>,
}

impl LoadContext {
    /// A context for `environment` with no trigger and no flags.
    pub fn new(environment: impl Into<String>) -> Self {
        Self {
            environment: environment.into(),
            ..Self::default()
        }
    }

    /// Sets the trigger.
    pub fn with_trigger(mut self, trigger: impl Into<String>) -> Self {
        self.trigger = Some(trigger.into());
        self
    }

    /// Turns a feature flag on.
    pub fn with_feature(mut self, flag: impl Into<String>) -> Self {
        self.feature_flags.insert(flag.into());
        self
    }
}

struct LazyEntry {
    loader: PluginLoader,
    conditions: LazyConditions,
}

type InFlight = Arc<OnceCell<Arc<dyn Plugin>>>;

/// Registry of lazy plugins and their built instances.
pub struct LazyLoader {
    entries: DashMap<String, LazyEntry>,
    in_flight: Mutex<HashMap<String, InFlight>>,
    cache: Arc<InstanceCache<Arc<dyn Plugin>>>,
}

impl LazyLoader {
    /// Creates a loader whose instance cache follows `config`.
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: DashMap::new(),
            in_flight: Mutex::new(HashMap::new()),
            cache: Arc::new(InstanceCache::from_config(config)),
        }
    }

    /// Registers a lazy plugin under `name`.
    pub fn register_lazy<F, Fut>(
        &self,
        name: &str,
        loader: F,
        conditions: LazyConditions,
    ) -> KernelResult<()>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Arc<dyn Plugin>>> + Send + 'static,
    {
        let loader: PluginLoader = Arc::new(move || loader().boxed());
        self.register_loader(name, loader, conditions)
    }

    /// Registers a lazy plugin from a prepared loader.
    pub fn register_loader(
        &self,
        name: &str,
        loader: PluginLoader,
        conditions: LazyConditions,
    ) -> KernelResult<()> {
        match self.entries.entry(name.to_string()) {
            dashmap::Entry::Occupied(_) => Err(KernelError::DuplicatePlugin(name.to_string())),
            dashmap::Entry::Vacant(slot) => {
                slot.insert(LazyEntry { loader, conditions });
                info!(plugin = %name, "Lazy plugin registered");
                Ok(())
            }
        }
    }

    /// Builds `name` if its conditions hold.
    ///
    /// Returns `Ok(None)` when a condition is not met. A cached instance is
    /// returned without calling the loader again.
    pub async fn check_and_load(
        &self,
        name: &str,
        context: &LoadContext,
    ) -> KernelResult<Option<Arc<dyn Plugin>>> {
        let (loader, conditions) = {
            let entry = self
                .entries
                .get(name)
                .ok_or_else(|| KernelError::UnknownLazyPlugin(name.to_string()))?;
            (entry.loader.clone(), entry.conditions.clone())
        };

        if !conditions.are_met(context) {
            debug!(plugin = %name, ?conditions, "Lazy conditions not met");
            return Ok(None);
        }

        if let Some(plugin) = self.cache.get(name) {
            return Ok(Some(plugin));
        }

        let cell = {
            let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
            in_flight.entry(name.to_string()).or_default().clone()
        };

        let result = cell
            .get_or_try_init(|| async {
                info!(plugin = %name, "Loading lazy plugin");
                guarded(loader())
                    .await
                    .map_err(|e| KernelError::LazyLoad {
                        plugin: name.to_string(),
                        source: e.into(),
                    })
            })
            .await
            .cloned();

        if let Ok(plugin) = &result {
            self.cache.set(name, plugin.clone());
        }

        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if in_flight.get(name).is_some_and(|current| Arc::ptr_eq(current, &cell)) {
            in_flight.remove(name);
        }
        drop(in_flight);

        result.map(Some)
    }

    /// Forgets a lazy plugin and its cached instance.
    pub fn forget(&self, name: &str) -> bool {
        self.cache.remove(name);
        self.entries.remove(name).is_some()
    }

    /// Drops the cached instance so the next load builds a fresh one.
    pub fn invalidate(&self, name: &str) {
        self.cache.remove(name);
    }

    /// Whether `name` is a registered lazy plugin.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Registered lazy plugin names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// The instance cache.
    pub fn cache(&self) -> &Arc<InstanceCache<Arc<dyn Plugin>>> {
        &self.cache
    }
}

impl std::fmt::Debug for LazyLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyLoader")
            .field("plugins", &self.entries.len())
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;

    struct Lazy;

    #[async_trait]
    impl Plugin for Lazy {
        fn name(&self) -> &str {
            "lazy"
        }
    }

    type LoadFuture = BoxFuture<'static, anyhow::Result<Arc<dyn Plugin>>>;

    fn counting_loader(builds: &Arc<AtomicUsize>) -> impl Fn() -> LoadFuture + Send + Sync + 'static {
        let builds = builds.clone();
        move || {
            let builds = builds.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                builds.fetch_add(1, Ordering::SeqCst);
                Ok::<_, anyhow::Error>(Arc::new(Lazy) as Arc<dyn Plugin>)
            }
            .boxed()
        }
    }

    #[tokio::test]
    async fn test_concurrent_loads_share_one_build() {
        let loader = LazyLoader::new(&CacheConfig::default());
        let builds = Arc::new(AtomicUsize::new(0));
        loader
            .register_lazy("lazy", counting_loader(&builds), LazyConditions::default())
            .unwrap();

        let ctx = LoadContext::new("development");
        let (a, b, c) = tokio::join!(
            loader.check_and_load("lazy", &ctx),
            loader.check_and_load("lazy", &ctx),
            loader.check_and_load("lazy", &ctx),
        );
        let a = a.unwrap().unwrap();
        let b = b.unwrap().unwrap();
        let c = c.unwrap().unwrap();

        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&b, &c));

        loader.check_and_load("lazy", &ctx).await.unwrap();
        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert!(loader.cache().stats().hits >= 1);
    }

    #[tokio::test]
    async fn test_conditions_gate_loading() {
        let loader = LazyLoader::new(&CacheConfig::default());
        let builds = Arc::new(AtomicUsize::new(0));
        let conditions = LazyConditions::on_trigger("file.open")
            .in_environment("production")
            .with_feature("beta");
        loader
            .register_lazy("lazy", counting_loader(&builds), conditions)
            .unwrap();

        let partial = LoadContext::new("production").with_trigger("file.open");
        assert!(loader.check_and_load("lazy", &partial).await.unwrap().is_none());

        let wrong_env = LoadContext::new("development")
            .with_trigger("file.open")
            .with_feature("beta");
        assert!(loader.check_and_load("lazy", &wrong_env).await.unwrap().is_none());
        assert_eq!(builds.load(Ordering::SeqCst), 0);

        let full = LoadContext::new("production")
            .with_trigger("file.open")
            .with_feature("beta");
        assert!(loader.check_and_load("lazy", &full).await.unwrap().is_some());
        assert_eq!(builds.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_load_can_retry() {
        let loader = LazyLoader::new(&CacheConfig::default());
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        loader
            .register_lazy(
                "flaky",
                move || {
                    let attempt = counter.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if attempt == 0 {
                            anyhow::bail!("not yet");
                        }
                        Ok(Arc::new(Lazy) as Arc<dyn Plugin>)
                    }
                },
                LazyConditions::default(),
            )
            .unwrap();

        let ctx = LoadContext::default();
        assert!(matches!(
            loader.check_and_load("flaky", &ctx).await,
            Err(KernelError::LazyLoad { .. })
        ));
        assert!(loader.check_and_load("flaky", &ctx).await.unwrap().is_some());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unknown_and_duplicate() {
        let loader = LazyLoader::new(&CacheConfig::default());
        assert!(matches!(
            loader.check_and_load("ghost", &LoadContext::default()).await,
            Err(KernelError::UnknownLazyPlugin(_))
        ));

        let builds = Arc::new(AtomicUsize::new(0));
        loader
            .register_lazy("lazy", counting_loader(&builds), LazyConditions::default())
            .unwrap();
        assert!(matches!(
            loader.register_lazy("lazy", counting_loader(&builds), LazyConditions::default()),
            Err(KernelError::DuplicatePlugin(_))
        ));
        assert_eq!(loader.names(), vec!["lazy"]);
        assert!(loader.forget("lazy"));
        assert!(!loader.contains("lazy"));
    }
}
