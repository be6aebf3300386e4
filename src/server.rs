//! 存活探针 HTTP 服务
//!
//! /health 返回 ok，/status 返回 Cycle 计数快照。
//! 与调度循环共用关闭 token，收到信号后优雅退出监听。

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use tokio_util::sync::CancellationToken;

use crate::core::{CycleStats, StatusSnapshot};

async fn health() -> &'static str {
    "ok"
}

async fn status(State(stats): State<Arc<CycleStats>>) -> Json<StatusSnapshot> {
    Json(stats.snapshot())
}

/// 启动监听直到关闭信号；绑定失败属于启动期致命错误
pub async fn serve(
    port: u16,
    stats: Arc<CycleStats>,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let app = Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .with_state(stats);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!(port, "liveness listener started");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    tracing::info!("liveness listener stopped");
    Ok(())
}
