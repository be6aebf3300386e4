//! Hornet - Rust Instagram 互动智能体
//!
//! 入口：初始化日志与配置，装配各组件，启动存活探针服务与调度循环，
//! 收到 Ctrl+C / SIGTERM 后优雅退出并释放浏览器资源。
//! 初始化阶段的任何失败（配置、存储、凭据、key 池）都以非零退出码终止进程。

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use hornet::ai::{AiGateway, GeminiClient, KeyRotation, RetryConfig};
use hornet::config::{load_config, resolve_ai_keys, Credentials};
use hornet::core::{CycleStats, Scheduler, ShutdownManager};
use hornet::engage::EngagementCycle;
use hornet::ledger::DedupStore;
use hornet::server;
use hornet::session::{SessionLedger, SessionManager};
use hornet::surface::{ChromeSurface, Surface};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // 日志：默认 info，可通过 RUST_LOG 覆盖
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .with(fmt::layer())
        .init();

    let cfg = load_config(None).context("Failed to load config")?;

    let creds = Credentials::resolve(&cfg.account).context("Failed to resolve credentials")?;
    let keys = resolve_ai_keys(&cfg.ai).context("Failed to resolve ai key pool")?;
    let store = Arc::new(
        DedupStore::open(&cfg.storage.path).context("Failed to open dedup store")?,
    );

    let surface: Arc<ChromeSurface> = Arc::new(ChromeSurface::new(&cfg.browser));
    let session = SessionManager::new(SessionLedger::new(&cfg.session.cookie_path), creds);
    let gateway = AiGateway::new(
        Arc::new(GeminiClient::new(&cfg.ai.model, cfg.ai.base_url.as_deref())),
        KeyRotation::new(keys),
        RetryConfig {
            max_attempts: cfg.ai.max_attempts,
            backoff_base: Duration::from_secs(cfg.ai.backoff_secs),
            ..RetryConfig::default()
        },
    );
    let cycle = Arc::new(EngagementCycle::new(
        surface.clone(),
        session,
        gateway,
        store,
        &cfg.engage,
    ));

    let shutdown = Arc::new(ShutdownManager::new());
    shutdown.install_signal_handlers();

    let stats = Arc::new(CycleStats::default());
    let server_task = tokio::spawn(server::serve(
        cfg.server.port,
        stats.clone(),
        shutdown.token(),
    ));

    let scheduler = Scheduler::new(
        Duration::from_secs(cfg.engage.cycle_interval_secs),
        stats.clone(),
    );
    tracing::info!("agent started, entering engagement loop");
    scheduler.run_forever(cycle, shutdown.token()).await;

    // 调度循环已退出：释放浏览器，等监听关闭
    if let Err(e) = surface.close().await {
        tracing::warn!(error = %e, "browser release failed");
    }
    match server_task.await {
        Ok(result) => result.context("liveness listener failed")?,
        Err(e) => tracing::warn!(error = %e, "liveness listener task aborted"),
    }

    tracing::info!("shutdown complete");
    Ok(())
}
