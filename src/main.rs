//! PlugHub host: wires a kernel to a small build pipeline and runs the
//! plugin lifecycle end to end.

mod demo;

use std::sync::Arc;

use serde_json::json;
use tracing_subscriber::{EnvFilter, fmt};

use plughub_core::config::KernelConfig;
use plughub_kernel::prelude::*;

#[tokio::main]
async fn main() {
    let env = std::env::var("PLUGHUB_ENV").unwrap_or_else(|_| "development".to_string());

    let config = match KernelConfig::load(&env) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config);
    tracing::info!(env = %env, "Configuration loaded");

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, "Host error");
        std::process::exit(1);
    }
}

/// Initialize tracing/logging
fn init_logging(config: &KernelConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

async fn run(config: KernelConfig) -> anyhow::Result<()> {
    tracing::info!("Starting PlugHub host v{}", env!("CARGO_PKG_VERSION"));

    let kernel = Kernel::new(config);
    kernel.start_cache_cleanup();

    // ── Step 1: Host extension points ────────────────────────────
    let hooks = kernel.hook_registry();
    hooks.create_hook(demo::RESOLVE_ID, HookKind::AsyncSeries, ["id", "importer"])?;
    hooks.create_hook(demo::TRANSFORM, HookKind::Waterfall, ["code", "id"])?;

    // ── Step 2: Plugins ──────────────────────────────────────────
    kernel
        .register(Arc::new(demo::AliasPlugin::new("@/", "/src/")), RegisterOptions::default())
        .await?;
    kernel
        .register(Arc::new(demo::MinifyPlugin), RegisterOptions::default())
        .await?;
    kernel
        .register(
            Arc::new(demo::ReportPlugin::default()),
            RegisterOptions::lazy(LazyConditions::on_trigger(demo::BUILD_FINISHED)),
        )
        .await?;

    // ── Step 3: Lifecycle ────────────────────────────────────────
    let report = kernel.init_all().await?;
    for failure in &report.failed {
        tracing::error!(plugin = %failure.plugin, error = %failure.error, "Plugin failed to initialize");
    }
    kernel.enable_all().await;

    // ── Step 4: Build one module ─────────────────────────────────
    let dispatcher = kernel.hooks();
    let id = dispatcher
        .call_async_series(
            demo::RESOLVE_ID,
            vec![json!("@/main.js"), json!("index.html")],
            json!("@/main.js"),
        )
        .await?;
    let code = dispatcher
        .call_waterfall(demo::TRANSFORM, json!("  let answer = 42;  \n"), vec![id.clone()])
        .await?;
    tracing::info!(id = %id, code = %code, "Module built");

    kernel
        .events()
        .emit(demo::BUILD_FINISHED, json!({ "modules": 1 }), EmitOptions::from_source("host"))
        .await;

    // ── Step 5: Lazy activation ──────────────────────────────────
    let ctx = kernel.load_context().with_trigger(demo::BUILD_FINISHED);
    if kernel.check_and_load("report", &ctx).await? {
        let summary = kernel.plugins().call("host", "report", "summary", vec![]).await?;
        tracing::info!(summary = %summary, "Build report");
    }

    // ── Step 6: Status ───────────────────────────────────────────
    println!("{}", serde_json::to_string_pretty(&kernel.get_system_status())?);
    println!("{}", serde_json::to_string_pretty(&kernel.get_communication_stats())?);

    kernel.disable_all().await;
    kernel.shutdown().await;
    Ok(())
}
