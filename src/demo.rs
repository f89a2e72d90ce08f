//! Example plugins for a small build pipeline.

use std::sync::OnceLock;

use serde_json::{Value, json};

use plughub_kernel::prelude::*;

/// Resolves an import specifier to a module id.
pub const RESOLVE_ID: &str = "resolve_id";
/// Rewrites a module's source.
pub const TRANSFORM: &str = "transform";
/// Emitted by the host after a build.
pub const BUILD_FINISHED: &str = "build.finished";

/// Rewrites import specifiers that start with an alias prefix.
pub struct AliasPlugin {
    prefix: String,
    target: String,
}

impl AliasPlugin {
    pub fn new(prefix: &str, target: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            target: target.to_string(),
        }
    }
}

#[async_trait]
impl Plugin for AliasPlugin {
    fn name(&self) -> &str {
        "alias"
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    async fn init(&self, ctx: PluginContext) -> anyhow::Result<()> {
        let prefix = self.prefix.clone();
        let target = self.target.clone();
        ctx.hooks().tap(
            RESOLVE_ID,
            TapHandler::future(move |args: HookArgs| {
                let prefix = prefix.clone();
                let target = target.clone();
                async move {
                    let resolved = args
                        .get_str("id")
                        .and_then(|id| id.strip_prefix(prefix.as_str()))
                        .map(|rest| json!(format!("{target}{rest}")));
                    Ok(resolved)
                }
            }),
            TapOptions::priority(10),
        )?;

        ctx.services()
            .register(
                "table",
                ServiceFactory::value((self.prefix.clone(), self.target.clone())),
                ServiceOptions::default(),
            )
            .await?;
        Ok(())
    }
}

/// Strips surrounding whitespace and counts finished builds.
pub struct MinifyPlugin;

#[async_trait]
impl Plugin for MinifyPlugin {
    fn name(&self) -> &str {
        "minify"
    }

    fn version(&self) -> &str {
        "0.3.1"
    }

    fn dependencies(&self) -> Vec<String> {
        vec!["alias".to_string()]
    }

    async fn init(&self, ctx: PluginContext) -> anyhow::Result<()> {
        ctx.hooks().tap(
            TRANSFORM,
            TapHandler::sync(|args| {
                let code = args.first().and_then(Value::as_str);
                Ok(code.map(|code| json!(code.trim())))
            }),
            TapOptions::default(),
        )?;

        let listener_ctx = ctx.clone();
        ctx.events().on_fn(
            "build.*",
            move |event| {
                let global = listener_ctx.storage().global();
                let builds = global.get("builds").and_then(|v| v.as_u64()).unwrap_or(0);
                global.set("builds", json!(builds + 1))?;
                listener_ctx.log(tracing::Level::DEBUG, &format!("saw {}", event.name));
                Ok(())
            },
            ListenerOptions::default(),
        );
        Ok(())
    }
}

/// Lazily loaded; summarizes builds on request.
#[derive(Default)]
pub struct ReportPlugin {
    ctx: OnceLock<PluginContext>,
}

#[async_trait]
impl Plugin for ReportPlugin {
    fn name(&self) -> &str {
        "report"
    }

    async fn init(&self, ctx: PluginContext) -> anyhow::Result<()> {
        ctx.log(tracing::Level::INFO, "report plugin ready");
        let _ = self.ctx.set(ctx);
        Ok(())
    }

    async fn handle_call(&self, method: &str, _args: Vec<Value>) -> anyhow::Result<Value> {
        let Some(ctx) = self.ctx.get() else {
            anyhow::bail!("report plugin is not initialized");
        };
        match method {
            "summary" => {
                let builds = ctx.storage().global().get_or("builds", json!(0));
                let table = ctx
                    .services()
                    .get_as::<(String, String)>("alias.table")
                    .await?;
                Ok(json!({ "builds": builds, "alias": table.0, "target": table.1 }))
            }
            _ => Err(KernelError::MethodNotFound {
                plugin: self.name().to_string(),
                method: method.to_string(),
            }
            .into()),
        }
    }
}
