//! Shared test helpers for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use plughub_core::config::KernelConfig;
use plughub_kernel::prelude::*;

/// Ordered record of lifecycle calls, shared across plugins.
pub type Journal = Arc<Mutex<Vec<(String, u64)>>>;

/// Extra registrations a test plugin makes during `init`.
pub type Setup = Box<dyn Fn(&PluginContext) -> anyhow::Result<()> + Send + Sync>;

static TICK: AtomicU64 = AtomicU64::new(0);

/// Create a kernel with default configuration.
pub fn kernel() -> Kernel {
    Kernel::new(KernelConfig::default())
}

/// Create an empty journal.
pub fn journal() -> Journal {
    Arc::default()
}

/// Entries of `journal` as `"plugin:step"` strings, oldest first.
pub fn steps(journal: &Journal) -> Vec<String> {
    journal.lock().unwrap().iter().map(|(s, _)| s.clone()).collect()
}

/// Tick at which `step` was journaled.
pub fn tick_of(journal: &Journal, step: &str) -> u64 {
    journal
        .lock()
        .unwrap()
        .iter()
        .find(|(s, _)| s == step)
        .map(|(_, t)| *t)
        .unwrap_or_else(|| panic!("no journal entry for {step}"))
}

/// Configurable plugin that journals its lifecycle calls.
pub struct TestPlugin {
    name: String,
    dependencies: Vec<String>,
    fail_init: bool,
    setup: Option<Setup>,
    journal: Journal,
}

impl TestPlugin {
    /// A plugin with no dependencies and a no-op setup.
    pub fn new(name: &str, journal: &Journal) -> Self {
        Self {
            name: name.to_string(),
            dependencies: Vec::new(),
            fail_init: false,
            setup: None,
            journal: journal.clone(),
        }
    }

    /// Declares a dependency.
    pub fn depends_on(mut self, dependency: &str) -> Self {
        self.dependencies.push(dependency.to_string());
        self
    }

    /// Makes `init` fail after running the setup.
    pub fn failing(mut self) -> Self {
        self.fail_init = true;
        self
    }

    /// Runs `setup` with the plugin's context during `init`.
    pub fn with_setup<F>(mut self, setup: F) -> Self
    where
        F: Fn(&PluginContext) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.setup = Some(Box::new(setup));
        self
    }

    /// Wraps the plugin for registration.
    pub fn build(self) -> Arc<dyn Plugin> {
        Arc::new(self)
    }

    fn record(&self, step: &str) {
        let tick = TICK.fetch_add(1, Ordering::SeqCst);
        self.journal
            .lock()
            .unwrap()
            .push((format!("{}:{step}", self.name), tick));
    }
}

#[async_trait]
impl Plugin for TestPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn dependencies(&self) -> Vec<String> {
        self.dependencies.clone()
    }

    async fn init(&self, ctx: PluginContext) -> anyhow::Result<()> {
        if let Some(setup) = &self.setup {
            setup(&ctx)?;
        }
        if self.fail_init {
            anyhow::bail!("{} refused to start", self.name);
        }
        self.record("init");
        Ok(())
    }

    async fn enable(&self) -> anyhow::Result<()> {
        self.record("enable");
        Ok(())
    }

    async fn disable(&self) -> anyhow::Result<()> {
        self.record("disable");
        Ok(())
    }

    async fn destroy(&self) -> anyhow::Result<()> {
        self.record("destroy");
        Ok(())
    }
}
