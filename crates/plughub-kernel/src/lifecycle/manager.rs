//! Plugin manager: dependency-ordered lifecycle of all plugins.

use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use plughub_core::config::lifecycle::LifecycleConfig;
use plughub_core::error::KernelError;
use plughub_core::result::KernelResult;

use super::order::{dependency_levels, topological_order};
use super::plugin::Plugin;
use super::registry::PluginRegistry;
use super::state::{PluginRecord, PluginState};
use crate::api::context::PluginContext;
use crate::components::Components;
use crate::guard::guarded;

/// A plugin that failed a lifecycle step.
#[derive(Debug)]
pub struct PluginFailure {
    /// Plugin name.
    pub plugin: String,
    /// What went wrong.
    pub error: KernelError,
}

/// Outcome of a bulk lifecycle operation.
#[derive(Debug, Default)]
pub struct LifecycleReport {
    /// Plugins that completed the step, in processing order.
    pub succeeded: Vec<String>,
    /// Plugins that failed it.
    pub failed: Vec<PluginFailure>,
}

impl LifecycleReport {
    /// Whether every plugin succeeded.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Names of the failed plugins.
    pub fn failed_names(&self) -> Vec<&str> {
        self.failed.iter().map(|f| f.plugin.as_str()).collect()
    }

    fn record(&mut self, plugin: &str, result: KernelResult<()>) {
        match result {
            Ok(()) => self.succeeded.push(plugin.to_string()),
            Err(error) => self.failed.push(PluginFailure {
                plugin: plugin.to_string(),
                error,
            }),
        }
    }
}

/// Report returned by [`PluginManager::init_all`].
pub type InitReport = LifecycleReport;

/// Plugin counts by state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemStatus {
    /// All plugins.
    pub total: usize,
    /// Plugins in `registered`.
    pub registered: usize,
    /// Plugins in `initialized`.
    pub initialized: usize,
    /// Plugins in `enabled`.
    pub enabled: usize,
    /// Plugins in `disabled`.
    pub disabled: usize,
    /// Records in registration order.
    pub plugins: Vec<PluginRecord>,
}

/// Manages the full lifecycle of plugins: register, init, enable, disable,
/// unload.
#[derive(Debug)]
pub struct PluginManager {
    /// Plugin registry.
    plugins: Arc<PluginRegistry>,
    /// Components plugins communicate through.
    components: Components,
    /// Batch settings.
    config: LifecycleConfig,
}

impl PluginManager {
    /// Creates a new plugin manager over `components`.
    pub fn new(components: Components, config: LifecycleConfig) -> Self {
        Self {
            plugins: Arc::new(PluginRegistry::new()),
            components,
            config,
        }
    }

    /// Registers a plugin and opens its mailbox. No plugin code runs beyond
    /// reading its name, version and dependencies.
    pub fn register(&self, plugin: Arc<dyn Plugin>) -> KernelResult<PluginRecord> {
        let record = self.plugins.register(plugin)?;
        self.components.messages.open_mailbox(&record.name);
        Ok(record)
    }

    /// Initializes every `registered` plugin in dependency order.
    ///
    /// Plugins are grouped into dependency levels; each level runs in
    /// concurrent batches of `batch_size`, yielding between batches. A failing
    /// plugin is rolled back and reported without stopping independent
    /// plugins. A dependency cycle is returned as an error before any plugin
    /// runs.
    pub async fn init_all(&self) -> KernelResult<InitReport> {
        let levels = dependency_levels(&self.graph())?;
        let batch_size = self.config.batch_size.max(1);
        let mut report = InitReport::default();

        for level in levels {
            let pending: Vec<String> = level
                .into_iter()
                .filter(|name| self.plugins.state(name) == Some(PluginState::Registered))
                .collect();

            for (index, batch) in pending.chunks(batch_size).enumerate() {
                if index > 0 {
                    tokio::task::yield_now().await;
                }
                let results = join_all(batch.iter().map(|name| self.init_plugin(name))).await;
                for (name, result) in batch.iter().zip(results) {
                    report.record(name, result);
                }
            }
            tokio::task::yield_now().await;
        }

        info!(
            initialized = report.succeeded.len(),
            failed = report.failed.len(),
            "Plugin initialization complete"
        );
        Ok(report)
    }

    /// Initializes one plugin. Its dependencies must already be initialized.
    pub async fn init_plugin(&self, name: &str) -> KernelResult<()> {
        let step = self
            .plugins
            .begin_transition(name, "initialize", |s| s == PluginState::Registered)?;
        let record = &step.record;

        for dependency in &record.dependencies {
            if !self.plugins.state(dependency).is_some_and(PluginState::is_ready) {
                let err = KernelError::DependencyNotReady {
                    plugin: name.to_string(),
                    dependency: dependency.clone(),
                };
                warn!(plugin = %name, dependency = %dependency, "Dependency not ready, skipping init");
                self.plugins
                    .update(name, |r| r.last_error = Some(err.to_string()));
                return Err(err);
            }
        }

        let ctx = PluginContext::new(name, self.components.clone(), Arc::downgrade(&self.plugins));
        debug!(plugin = %name, "Initializing plugin");

        match guarded(step.plugin.init(ctx)).await {
            Ok(()) => {
                self.plugins.update(name, |r| {
                    r.state = PluginState::Initialized;
                    r.initialized_at = Some(Utc::now());
                    r.last_error = None;
                });
                info!(plugin = %name, version = %record.version, "Plugin initialized");
                Ok(())
            }
            Err(e) => {
                let (taps, listeners, services, entries) = self.components.release_namespace(name);
                let err = KernelError::plugin_init(name, e);
                error!(
                    plugin = %name,
                    error = %err,
                    taps,
                    listeners,
                    services,
                    entries,
                    "Plugin init failed, rolled back to registered"
                );
                self.plugins
                    .update(name, |r| r.last_error = Some(err.to_string()));
                Err(err)
            }
        }
    }

    /// Enables every `initialized` or `disabled` plugin in dependency order.
    pub async fn enable_all(&self) -> LifecycleReport {
        let mut report = LifecycleReport::default();
        for name in self.ordered_names() {
            if self.plugins.state(&name).is_some_and(PluginState::can_enable) {
                let result = self.enable_plugin(&name).await;
                report.record(&name, result);
            }
        }
        info!(enabled = report.succeeded.len(), failed = report.failed.len(), "Plugins enabled");
        report
    }

    /// Enables one plugin. Legal from `initialized` and `disabled`.
    pub async fn enable_plugin(&self, name: &str) -> KernelResult<()> {
        let step = self
            .plugins
            .begin_transition(name, "enable", PluginState::can_enable)?;

        if let Err(e) = guarded(step.plugin.enable()).await {
            let err = KernelError::plugin_lifecycle(name, "enable", e);
            warn!(plugin = %name, error = %err, "Plugin enable failed");
            self.plugins.update(name, |r| r.last_error = Some(err.to_string()));
            return Err(err);
        }

        self.plugins.update(name, |r| {
            r.state = PluginState::Enabled;
            r.enabled_at = Some(Utc::now());
        });
        info!(plugin = %name, "Plugin enabled");
        Ok(())
    }

    /// Disables every `enabled` plugin, dependents first.
    pub async fn disable_all(&self) -> LifecycleReport {
        let mut report = LifecycleReport::default();
        for name in self.ordered_names().into_iter().rev() {
            if self.plugins.state(&name) == Some(PluginState::Enabled) {
                let result = self.disable_plugin(&name).await;
                report.record(&name, result);
            }
        }
        info!(disabled = report.succeeded.len(), failed = report.failed.len(), "Plugins disabled");
        report
    }

    /// Disables one plugin. Legal only from `enabled`.
    pub async fn disable_plugin(&self, name: &str) -> KernelResult<()> {
        let step = self
            .plugins
            .begin_transition(name, "disable", |s| s == PluginState::Enabled)?;
        self.run_disable(name, &step.plugin).await
    }

    /// Tears a plugin down and forgets it.
    ///
    /// Disables it if enabled, runs `destroy` if it was initialized, then
    /// removes its listeners, `name.*` services, storage namespace, hook taps
    /// and mailbox. Failures of `disable` and `destroy` are logged and do not
    /// stop the teardown.
    pub async fn unload_plugin(&self, name: &str) -> KernelResult<()> {
        let step = self.plugins.begin_transition(name, "unload", |_| true)?;
        let state = step.record.state;

        if state == PluginState::Enabled {
            if let Err(e) = self.run_disable(name, &step.plugin).await {
                warn!(plugin = %name, error = %e, "Disable before unload failed");
            }
        }

        if state.is_ready() {
            if let Err(e) = guarded(step.plugin.destroy()).await {
                warn!(plugin = %name, error = %e, "Plugin destroy returned error");
            }
        }
        self.plugins
            .update(name, |r| r.state = PluginState::Destroyed);

        let (taps, listeners, services, entries) = self.components.release_namespace(name);
        let mail = self.components.messages.remove_mailbox(name);
        self.plugins.unregister(name)?;

        info!(
            plugin = %name,
            taps,
            listeners,
            services,
            entries,
            undelivered = mail,
            "Plugin unloaded"
        );
        Ok(())
    }

    /// Unloads every plugin, dependents first.
    pub async fn unload_all(&self) {
        for name in self.ordered_names().into_iter().rev() {
            if let Err(e) = self.unload_plugin(&name).await {
                error!(plugin = %name, error = %e, "Error unloading plugin");
            }
        }
        info!("All plugins unloaded");
    }

    /// Calls `method` on `target` on behalf of `caller`.
    pub async fn call(
        &self,
        caller: &str,
        target: &str,
        method: &str,
        args: Vec<Value>,
    ) -> KernelResult<Value> {
        self.plugins.call(caller, target, method, args).await
    }

    /// Plugin counts by state.
    pub fn status(&self) -> SystemStatus {
        let plugins = self.plugins.records();
        let count = |state: PluginState| plugins.iter().filter(|r| r.state == state).count();

        SystemStatus {
            total: plugins.len(),
            registered: count(PluginState::Registered),
            initialized: count(PluginState::Initialized),
            enabled: count(PluginState::Enabled),
            disabled: count(PluginState::Disabled),
            plugins,
        }
    }

    /// Returns the plugin registry.
    pub fn plugin_registry(&self) -> &Arc<PluginRegistry> {
        &self.plugins
    }

    /// Returns the components plugins communicate through.
    pub fn components(&self) -> &Components {
        &self.components
    }

    /// Runs `disable` on a plugin whose step is already claimed.
    async fn run_disable(&self, name: &str, plugin: &Arc<dyn Plugin>) -> KernelResult<()> {
        if let Err(e) = guarded(plugin.disable()).await {
            let err = KernelError::plugin_lifecycle(name, "disable", e);
            warn!(plugin = %name, error = %err, "Plugin disable failed");
            self.plugins.update(name, |r| r.last_error = Some(err.to_string()));
            return Err(err);
        }

        self.plugins
            .update(name, |r| r.state = PluginState::Disabled);
        info!(plugin = %name, "Plugin disabled");
        Ok(())
    }

    fn graph(&self) -> Vec<(String, Vec<String>)> {
        self.plugins
            .records()
            .into_iter()
            .map(|r| (r.name, r.dependencies))
            .collect()
    }

    /// Dependency order, or registration order when the graph has a cycle.
    fn ordered_names(&self) -> Vec<String> {
        let graph = self.graph();
        topological_order(&graph)
            .unwrap_or_else(|_| graph.into_iter().map(|(name, _)| name).collect())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::events::{EmitOptions, ListenerOptions};
    use crate::services::{ServiceFactory, ServiceOptions};

    type Log = Arc<Mutex<Vec<String>>>;

    struct Recorder {
        name: &'static str,
        deps: Vec<String>,
        fail_init: bool,
        log: Log,
    }

    impl Recorder {
        fn new(name: &'static str, deps: &[&str], log: &Log) -> Arc<Self> {
            Arc::new(Self {
                name,
                deps: deps.iter().map(|d| d.to_string()).collect(),
                fail_init: false,
                log: log.clone(),
            })
        }

        fn failing(name: &'static str, log: &Log) -> Arc<Self> {
            Arc::new(Self {
                name,
                deps: Vec::new(),
                fail_init: true,
                log: log.clone(),
            })
        }

        fn push(&self, step: &str) {
            self.log.lock().unwrap().push(format!("{}:{step}", self.name));
        }
    }

    #[async_trait]
    impl Plugin for Recorder {
        fn name(&self) -> &str {
            self.name
        }

        fn dependencies(&self) -> Vec<String> {
            self.deps.clone()
        }

        async fn init(&self, ctx: PluginContext) -> anyhow::Result<()> {
            ctx.events()
                .on_fn("recorder.ping", |_| Ok(()), ListenerOptions::default());
            ctx.services()
                .register("state", ServiceFactory::value(self.name), ServiceOptions::default())
                .await?;
            ctx.storage().set("ready", serde_json::json!(true))?;
            if self.fail_init {
                anyhow::bail!("init exploded");
            }
            self.push("init");
            Ok(())
        }

        async fn enable(&self) -> anyhow::Result<()> {
            self.push("enable");
            Ok(())
        }

        async fn disable(&self) -> anyhow::Result<()> {
            self.push("disable");
            Ok(())
        }

        async fn destroy(&self) -> anyhow::Result<()> {
            self.push("destroy");
            Ok(())
        }
    }

    fn manager() -> PluginManager {
        PluginManager::new(Components::default(), LifecycleConfig::default())
    }

    #[tokio::test]
    async fn test_dependencies_initialize_first() {
        let log: Log = Arc::default();
        let m = manager();
        m.register(Recorder::new("b", &["a"], &log)).unwrap();
        m.register(Recorder::new("a", &[], &log)).unwrap();

        let report = m.init_all().await.unwrap();
        assert!(report.is_success());
        assert_eq!(*log.lock().unwrap(), vec!["a:init", "b:init"]);

        let registry = m.plugin_registry();
        let a = registry.record("a").unwrap().initialized_at.unwrap();
        let b = registry.record("b").unwrap().initialized_at.unwrap();
        assert!(a <= b);
    }

    #[tokio::test]
    async fn test_failed_init_is_isolated_and_rolled_back() {
        let log: Log = Arc::default();
        let m = manager();
        m.register(Recorder::failing("broken", &log)).unwrap();
        m.register(Recorder::new("ok", &[], &log)).unwrap();
        m.register(Recorder::new("needs-broken", &["broken"], &log)).unwrap();

        let report = m.init_all().await.unwrap();
        assert_eq!(report.succeeded, vec!["ok"]);
        assert_eq!(report.failed_names(), vec!["broken", "needs-broken"]);
        assert!(matches!(report.failed[0].error, KernelError::PluginInit { .. }));
        assert!(matches!(report.failed[1].error, KernelError::DependencyNotReady { .. }));

        let components = m.components();
        assert_eq!(m.plugin_registry().state("broken"), Some(PluginState::Registered));
        assert!(!components.services.has("broken.state"));
        assert!(components.services.has("ok.state"));
        assert!(components.storage.keys("broken").is_empty());
        assert_eq!(components.events.listener_count("recorder.ping"), 1);
    }

    #[tokio::test]
    async fn test_cycle_aborts_before_running_plugins() {
        let log: Log = Arc::default();
        let m = manager();
        m.register(Recorder::new("x", &["y"], &log)).unwrap();
        m.register(Recorder::new("y", &["x"], &log)).unwrap();

        let err = m.init_all().await.unwrap_err();
        assert!(err.is_cycle());
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_state_machine_transitions() {
        let log: Log = Arc::default();
        let m = manager();
        m.register(Recorder::new("p", &[], &log)).unwrap();

        assert!(matches!(
            m.enable_plugin("p").await,
            Err(KernelError::InvalidTransition { .. })
        ));
        m.init_plugin("p").await.unwrap();
        assert!(matches!(
            m.init_plugin("p").await,
            Err(KernelError::InvalidTransition { .. })
        ));
        assert!(matches!(
            m.disable_plugin("p").await,
            Err(KernelError::InvalidTransition { .. })
        ));

        m.enable_plugin("p").await.unwrap();
        m.disable_plugin("p").await.unwrap();
        m.enable_plugin("p").await.unwrap();

        let status = m.status();
        assert_eq!(status.total, 1);
        assert_eq!(status.enabled, 1);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["p:init", "p:enable", "p:disable", "p:enable"]
        );
    }

    #[tokio::test]
    async fn test_unload_tears_down_namespace() {
        let log: Log = Arc::default();
        let m = manager();
        m.register(Recorder::new("p", &[], &log)).unwrap();
        m.init_all().await.unwrap();
        m.enable_all().await;

        m.unload_plugin("p").await.unwrap();

        let components = m.components();
        assert!(matches!(
            components.services.get("p.state").await,
            Err(KernelError::UnknownService(_))
        ));
        let emitted = components
            .events
            .emit("recorder.ping", Value::Null, EmitOptions::default())
            .await;
        assert!(emitted.results.is_empty());
        assert!(components.storage.keys("p").is_empty());
        assert!(!m.plugin_registry().contains("p"));
        assert_eq!(
            *log.lock().unwrap(),
            vec!["p:init", "p:enable", "p:disable", "p:destroy"]
        );
        assert!(matches!(
            m.unload_plugin("p").await,
            Err(KernelError::UnknownPlugin(_))
        ));
    }

    struct Slow {
        inits: AtomicUsize,
        enables: AtomicUsize,
    }

    #[async_trait]
    impl Plugin for Slow {
        fn name(&self) -> &str {
            "slow"
        }

        async fn init(&self, _ctx: PluginContext) -> anyhow::Result<()> {
            self.inits.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok(())
        }

        async fn enable(&self) -> anyhow::Result<()> {
            self.enables.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_overlapping_steps_run_plugin_code_once() {
        let m = manager();
        let slow = Arc::new(Slow {
            inits: Default::default(),
            enables: Default::default(),
        });
        m.register(slow.clone()).unwrap();

        let (all, single) = tokio::join!(m.init_all(), m.init_plugin("slow"));
        let all = all.unwrap();
        assert_eq!(slow.inits.load(Ordering::SeqCst), 1);
        assert_eq!(all.succeeded.len() + usize::from(single.is_ok()), 1);
        assert_eq!(m.plugin_registry().state("slow"), Some(PluginState::Initialized));

        let (first, second) = tokio::join!(m.enable_plugin("slow"), m.enable_plugin("slow"));
        assert!(first.is_ok());
        assert!(matches!(second, Err(KernelError::TransitionInProgress { .. })));
        assert_eq!(slow.enables.load(Ordering::SeqCst), 1);
        assert_eq!(m.plugin_registry().state("slow"), Some(PluginState::Enabled));
    }

    #[tokio::test]
    async fn test_batches_cover_wide_levels() {
        let log: Log = Arc::default();
        let m = PluginManager::new(
            Components::default(),
            LifecycleConfig {
                batch_size: 2,
                ..LifecycleConfig::default()
            },
        );
        for name in ["p1", "p2", "p3", "p4", "p5"] {
            m.register(Recorder::new(name, &[], &log)).unwrap();
        }

        let report = m.init_all().await.unwrap();
        assert_eq!(report.succeeded.len(), 5);
        assert_eq!(m.status().initialized, 5);
    }
}
