//! The trait every plugin implements.

use async_trait::async_trait;
use serde_json::Value;

use plughub_core::error::KernelError;

use crate::api::context::PluginContext;

/// A plugin managed by the kernel.
///
/// Only [`name`](Plugin::name) is required. Every lifecycle method defaults
/// to a no-op, and [`handle_call`](Plugin::handle_call) defaults to
/// rejecting every method.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Unique plugin name. Also the plugin's namespace.
    fn name(&self) -> &str;

    /// Plugin version string.
    fn version(&self) -> &str {
        "0.0.0"
    }

    /// Names of plugins that must be initialized first.
    fn dependencies(&self) -> Vec<String> {
        Vec::new()
    }

    /// Called once with the plugin's scoped context.
    async fn init(&self, _ctx: PluginContext) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called when the plugin is enabled.
    async fn enable(&self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called when the plugin is disabled.
    async fn disable(&self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called once before the plugin is removed.
    async fn destroy(&self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Handles a direct call from another plugin or the host.
    async fn handle_call(&self, method: &str, _args: Vec<Value>) -> anyhow::Result<Value> {
        Err(KernelError::MethodNotFound {
            plugin: self.name().to_string(),
            method: method.to_string(),
        }
        .into())
    }
}
