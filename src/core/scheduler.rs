//! 调度循环：固定间隔、单 Cycle、崩溃隔离
//!
//! 每轮 Cycle 在独立任务中执行，错误与 panic 都在 Cycle 边界吸收并记录，
//! 循环本身只因关闭信号退出。严格串行：下一轮永远等上一轮的边界处理完成。

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::core::EngageError;

/// 一轮完整的互动 Cycle（依次执行各 Pass）
#[async_trait]
pub trait Cycle: Send + Sync {
    async fn run(&self) -> Result<(), EngageError>;
}

/// Cycle 计数（供 /status 查询）
#[derive(Debug, Default)]
pub struct CycleStats {
    completed: AtomicU64,
    failed: AtomicU64,
    last_cycle_unix: AtomicI64,
}

/// /status 返回的快照
#[derive(Debug, Serialize)]
pub struct StatusSnapshot {
    pub cycles_completed: u64,
    pub cycles_failed: u64,
    pub last_cycle_unix: i64,
}

impl CycleStats {
    pub fn record_success(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
        self.touch();
    }

    pub fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        self.touch();
    }

    fn touch(&self) {
        self.last_cycle_unix
            .store(chrono::Utc::now().timestamp(), Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            cycles_completed: self.completed.load(Ordering::Relaxed),
            cycles_failed: self.failed.load(Ordering::Relaxed),
            last_cycle_unix: self.last_cycle_unix.load(Ordering::Relaxed),
        }
    }

    pub fn failed_count(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn completed_count(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }
}

/// 调度器：run_forever 直到收到关闭信号
pub struct Scheduler {
    interval: Duration,
    stats: Arc<CycleStats>,
}

impl Scheduler {
    pub fn new(interval: Duration, stats: Arc<CycleStats>) -> Self {
        Self { interval, stats }
    }

    /// 主循环：执行一轮 Cycle，休眠固定间隔，重复；只因 shutdown 退出
    pub async fn run_forever(&self, cycle: Arc<dyn Cycle>, shutdown: CancellationToken) {
        loop {
            if shutdown.is_cancelled() {
                break;
            }
            self.run_cycle(&cycle).await;

            tracing::info!(secs = self.interval.as_secs(), "sleeping before next cycle");
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = shutdown.cancelled() => {
                    tracing::info!("shutdown requested, leaving scheduler loop");
                    break;
                }
            }
        }
    }

    /// 执行一轮 Cycle；错误与 panic 都在这里吸收，绝不向外传播
    pub async fn run_cycle(&self, cycle: &Arc<dyn Cycle>) {
        let started = std::time::Instant::now();
        let handle = tokio::spawn({
            let cycle = Arc::clone(cycle);
            async move { cycle.run().await }
        });

        match handle.await {
            Ok(Ok(())) => {
                self.stats.record_success();
                tracing::info!(elapsed_secs = started.elapsed().as_secs(), "cycle complete");
            }
            Ok(Err(e)) => {
                self.stats.record_failure();
                tracing::error!(error = %e, "cycle failed, loop continues");
            }
            Err(join_err) => {
                self.stats.record_failure();
                if join_err.is_panic() {
                    tracing::error!("cycle panicked, loop continues");
                } else {
                    tracing::error!(error = %join_err, "cycle task aborted, loop continues");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::SurfaceError;

    struct OkCycle;

    #[async_trait]
    impl Cycle for OkCycle {
        async fn run(&self) -> Result<(), EngageError> {
            Ok(())
        }
    }

    struct FailingCycle;

    #[async_trait]
    impl Cycle for FailingCycle {
        async fn run(&self) -> Result<(), EngageError> {
            Err(EngageError::Surface(SurfaceError::Navigation(
                "mid-pass failure".to_string(),
            )))
        }
    }

    struct PanickingCycle;

    #[async_trait]
    impl Cycle for PanickingCycle {
        async fn run(&self) -> Result<(), EngageError> {
            panic!("boom");
        }
    }

    #[tokio::test]
    async fn test_cycle_success_recorded() {
        let stats = Arc::new(CycleStats::default());
        let scheduler = Scheduler::new(Duration::from_millis(1), stats.clone());
        scheduler.run_cycle(&(Arc::new(OkCycle) as Arc<dyn Cycle>)).await;
        assert_eq!(stats.completed_count(), 1);
        assert_eq!(stats.failed_count(), 0);
    }

    #[tokio::test]
    async fn test_cycle_failure_is_absorbed() {
        let stats = Arc::new(CycleStats::default());
        let scheduler = Scheduler::new(Duration::from_millis(1), stats.clone());
        // 错误在边界被吸收，run_cycle 正常返回
        scheduler
            .run_cycle(&(Arc::new(FailingCycle) as Arc<dyn Cycle>))
            .await;
        assert_eq!(stats.failed_count(), 1);
    }

    #[tokio::test]
    async fn test_cycle_panic_is_absorbed() {
        let stats = Arc::new(CycleStats::default());
        let scheduler = Scheduler::new(Duration::from_millis(1), stats.clone());
        scheduler
            .run_cycle(&(Arc::new(PanickingCycle) as Arc<dyn Cycle>))
            .await;
        assert_eq!(stats.failed_count(), 1);
    }

    #[tokio::test]
    async fn test_run_forever_exits_on_shutdown() {
        let stats = Arc::new(CycleStats::default());
        let scheduler = Scheduler::new(Duration::from_secs(60), stats.clone());
        let token = CancellationToken::new();
        let cycle: Arc<dyn Cycle> = Arc::new(FailingCycle);

        let loop_task = {
            let token = token.clone();
            async move { scheduler.run_forever(cycle, token).await }
        };
        // 第一轮执行后进入休眠，取消应立即退出循环
        let runner = tokio::spawn(loop_task);
        tokio::time::sleep(Duration::from_millis(100)).await;
        token.cancel();
        runner.await.unwrap();

        assert!(stats.failed_count() >= 1);
    }
}
