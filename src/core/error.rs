//! Cycle 级错误类型
//!
//! 与 Scheduler 配合：任何 Pass 内抛出的 EngageError 都在 Cycle 边界被捕获记录，
//! 循环本身不会终止。按来源封装各层错误，调用方用穷举匹配分流，不做字符串嗅探。

use thiserror::Error;

use crate::ai::AiError;
use crate::ledger::LedgerError;
use crate::surface::SurfaceError;

/// 一轮互动中可能出现的错误（登录、页面、AI、存储）
#[derive(Error, Debug)]
pub enum EngageError {
    /// 页面交互失败；其中 LoginTimeout 为登录导航超时，对本轮 Cycle 致命
    #[error("surface error: {0}")]
    Surface(#[from] SurfaceError),

    /// AI 网关内重试耗尽之外的失败（未分类错误对本轮 Cycle 致命）
    #[error("ai error: {0}")]
    Ai(#[from] AiError),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// 会话持久化等会话层失败
    #[error("session error: {0}")]
    Session(String),
}
