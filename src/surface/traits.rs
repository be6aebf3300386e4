//! Surface trait：核心层需要的全部页面能力
//!
//! 会话应用/采集、登录、认证探测、信息流点赞、评论与私信的枚举和回复。
//! 选择器与点击模拟是站点易碎细节，全部收在实现里；核心层只见这个 trait。

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::config::Credentials;
use crate::session::SessionCookie;

/// 页面交互错误
#[derive(Error, Debug)]
pub enum SurfaceError {
    /// 浏览器启动 / 标签页 / CDP 层失败
    #[error("browser error: {0}")]
    Browser(String),

    #[error("navigation failed: {0}")]
    Navigation(String),

    /// 有界等待超时（是否致命由调用方的失败策略决定）
    #[error("timed out waiting for {0}")]
    ElementTimeout(String),

    /// 登录后未在时限内离开登录页；对本轮 Cycle 致命
    #[error("login navigation timed out after {0}s")]
    LoginTimeout(u64),

    /// 页面返回的 JSON 载荷解析失败
    #[error("malformed page payload: {0}")]
    Decode(String),
}

/// 一条待回复的评论
#[derive(Debug, Clone, Deserialize)]
pub struct CommentItem {
    pub id: String,
    pub author: String,
    pub text: String,
}

/// 一条私信
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DmMessage {
    pub id: String,
    #[serde(default)]
    pub sender: String,
    pub text: String,
    pub from_me: bool,
}

/// 浏览器交互面
#[async_trait]
pub trait Surface: Send + Sync {
    /// 将已保存的会话应用到浏览上下文
    async fn apply_session(&self, cookies: &[SessionCookie]) -> Result<(), SurfaceError>;

    /// 采集当前浏览上下文的全部 Cookie
    async fn capture_session(&self) -> Result<Vec<SessionCookie>, SurfaceError>;

    /// 导航到主页
    async fn goto_home(&self) -> Result<(), SurfaceError>;

    /// 认证探测：主页上是否存在指向本账号主页的标记元素
    async fn is_logged_in(&self, username: &str) -> Result<bool, SurfaceError>;

    /// 交互式登录：导航登录页、关闭同意浮层（尽力而为）、填写凭据并提交。
    /// 未在时限内离开登录页返回 LoginTimeout。
    async fn login(&self, creds: &Credentials) -> Result<(), SurfaceError>;

    /// 给信息流第 index 个帖子点赞；无点赞控件返回 Ok(false)（软失败）
    async fn like_post(&self, index: usize) -> Result<bool, SurfaceError>;

    /// 信息流向下滚动一屏
    async fn scroll_feed(&self) -> Result<(), SurfaceError>;

    /// 自己主页最近 limit 个帖子的链接
    async fn own_post_links(&self, username: &str, limit: usize)
        -> Result<Vec<String>, SurfaceError>;

    /// 某帖子下的评论列表；评论区等待超时被吸收为空列表
    async fn list_comments(&self, post_url: &str) -> Result<Vec<CommentItem>, SurfaceError>;

    /// 回复一条评论（远端动作；必须先于账本写入）
    async fn reply_comment(&self, comment_id: &str, text: &str) -> Result<(), SurfaceError>;

    /// 收件箱里最近 limit 个会话的链接
    async fn dm_threads(&self, limit: usize) -> Result<Vec<String>, SurfaceError>;

    /// 某会话内的消息列表
    async fn thread_messages(&self, thread_url: &str) -> Result<Vec<DmMessage>, SurfaceError>;

    /// 在当前打开的会话里发送回复
    async fn reply_dm(&self, text: &str) -> Result<(), SurfaceError>;

    /// 释放浏览器资源（优雅关闭时调用）
    async fn close(&self) -> Result<(), SurfaceError>;
}
