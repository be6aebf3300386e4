//! 互动层：三类 Pass 与把它们串成一轮 Cycle 的编排
//!
//! 每轮 Cycle 依次执行信息流点赞、评论回复、私信回复三个逻辑独立的 Pass，
//! 每个 Pass 开始前先确保会话有效（登录致命错误向上传播，由 Scheduler 捕获）。
//!
//! 顺序约束：远端动作确认后才写去重账本。进程若恰好在两步之间崩溃，
//! 该条目重启后会被再次回复（至少一次送达 / 至多一次记录），不做对账。

pub mod comments;
pub mod dm;
pub mod feed;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::ai::AiGateway;
use crate::config::EngageSection;
use crate::core::{Cycle, EngageError};
use crate::ledger::DedupStore;
use crate::session::SessionManager;
use crate::surface::Surface;

pub use comments::CommentPass;
pub use dm::DmPass;
pub use feed::FeedPass;

/// 一轮完整互动：持有全部协作方，按固定顺序执行三个 Pass
pub struct EngagementCycle {
    surface: Arc<dyn Surface>,
    session: SessionManager,
    gateway: AiGateway,
    store: Arc<DedupStore>,
    feed: FeedPass,
    comments: CommentPass,
    dms: DmPass,
}

impl EngagementCycle {
    pub fn new(
        surface: Arc<dyn Surface>,
        session: SessionManager,
        gateway: AiGateway,
        store: Arc<DedupStore>,
        cfg: &EngageSection,
    ) -> Self {
        let username = session.username().to_string();
        let item_delay = Duration::from_secs(cfg.item_delay_secs);
        Self {
            surface,
            session,
            gateway,
            store,
            feed: FeedPass {
                max_posts: cfg.feed_like_count,
                min_delay_ms: cfg.item_delay_secs * 1000,
                max_delay_ms: cfg.item_delay_secs * 2000,
            },
            comments: CommentPass {
                username: username.clone(),
                max_posts: cfg.comment_posts,
                item_delay,
            },
            dms: DmPass {
                username,
                max_threads: cfg.dm_threads,
                item_delay,
            },
        }
    }
}

#[async_trait]
impl Cycle for EngagementCycle {
    async fn run(&self) -> Result<(), EngageError> {
        let surface = self.surface.as_ref();

        tracing::info!("feed pass");
        self.session.ensure_session(surface).await?;
        self.feed.run(surface).await?;

        tracing::info!("comment-reply pass");
        self.session.ensure_session(surface).await?;
        self.comments
            .run(surface, &self.gateway, &self.store)
            .await?;

        tracing::info!("dm-reply pass");
        self.session.ensure_session(surface).await?;
        self.dms.run(surface, &self.gateway, &self.store).await?;

        Ok(())
    }
}
