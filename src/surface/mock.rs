//! Mock Surface（用于测试，无需浏览器）
//!
//! 预置帖子 / 评论 / 私信数据，记录登录次数、会话应用与全部回复动作，
//! 便于断言登录子流程只触发一次、自跳过与去重行为。

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::config::Credentials;
use crate::session::SessionCookie;
use crate::surface::{CommentItem, DmMessage, Surface, SurfaceError};

/// Mock 实现：全部状态在内存里
#[derive(Default)]
pub struct MockSurface {
    login_calls: AtomicUsize,
    applied_sessions: AtomicUsize,
    authenticated: AtomicBool,
    /// 应用已保存会话后探测是否通过（false 模拟远端吊销）
    probe_rejects_applied: bool,
    /// capture_session 返回的 Cookie（登录后浏览上下文里的会话）
    captured: Vec<SessionCookie>,
    /// 信息流里带点赞控件的帖子数
    likeable_posts: usize,
    liked: AtomicUsize,
    post_links: Vec<String>,
    comments: HashMap<String, Vec<CommentItem>>,
    threads: Vec<String>,
    messages: HashMap<String, Vec<DmMessage>>,
    comment_replies: Mutex<Vec<(String, String)>>,
    dm_replies: Mutex<Vec<String>>,
    closed: AtomicBool,
}

impl MockSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_captured_session(mut self, cookies: Vec<SessionCookie>) -> Self {
        self.captured = cookies;
        self
    }

    pub fn with_probe_rejecting_applied_session(mut self) -> Self {
        self.probe_rejects_applied = true;
        self
    }

    pub fn with_likeable_posts(mut self, count: usize) -> Self {
        self.likeable_posts = count;
        self
    }

    pub fn with_post(mut self, url: &str, comments: Vec<CommentItem>) -> Self {
        self.post_links.push(url.to_string());
        self.comments.insert(url.to_string(), comments);
        self
    }

    pub fn with_thread(mut self, url: &str, messages: Vec<DmMessage>) -> Self {
        self.threads.push(url.to_string());
        self.messages.insert(url.to_string(), messages);
        self
    }

    pub fn login_calls(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }

    pub fn applied_sessions(&self) -> usize {
        self.applied_sessions.load(Ordering::SeqCst)
    }

    pub fn liked_count(&self) -> usize {
        self.liked.load(Ordering::SeqCst)
    }

    pub fn comment_replies(&self) -> Vec<(String, String)> {
        self.comment_replies.lock().unwrap().clone()
    }

    pub fn dm_replies(&self) -> Vec<String> {
        self.dm_replies.lock().unwrap().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Surface for MockSurface {
    async fn apply_session(&self, _cookies: &[SessionCookie]) -> Result<(), SurfaceError> {
        self.applied_sessions.fetch_add(1, Ordering::SeqCst);
        if !self.probe_rejects_applied {
            self.authenticated.store(true, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn capture_session(&self) -> Result<Vec<SessionCookie>, SurfaceError> {
        Ok(self.captured.clone())
    }

    async fn goto_home(&self) -> Result<(), SurfaceError> {
        Ok(())
    }

    async fn is_logged_in(&self, _username: &str) -> Result<bool, SurfaceError> {
        Ok(self.authenticated.load(Ordering::SeqCst))
    }

    async fn login(&self, _creds: &Credentials) -> Result<(), SurfaceError> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        self.authenticated.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn like_post(&self, index: usize) -> Result<bool, SurfaceError> {
        if index <= self.likeable_posts {
            self.liked.fetch_add(1, Ordering::SeqCst);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn scroll_feed(&self) -> Result<(), SurfaceError> {
        Ok(())
    }

    async fn own_post_links(
        &self,
        _username: &str,
        limit: usize,
    ) -> Result<Vec<String>, SurfaceError> {
        Ok(self.post_links.iter().take(limit).cloned().collect())
    }

    async fn list_comments(&self, post_url: &str) -> Result<Vec<CommentItem>, SurfaceError> {
        Ok(self.comments.get(post_url).cloned().unwrap_or_default())
    }

    async fn reply_comment(&self, comment_id: &str, text: &str) -> Result<(), SurfaceError> {
        self.comment_replies
            .lock()
            .unwrap()
            .push((comment_id.to_string(), text.to_string()));
        Ok(())
    }

    async fn dm_threads(&self, limit: usize) -> Result<Vec<String>, SurfaceError> {
        Ok(self.threads.iter().take(limit).cloned().collect())
    }

    async fn thread_messages(&self, thread_url: &str) -> Result<Vec<DmMessage>, SurfaceError> {
        Ok(self.messages.get(thread_url).cloned().unwrap_or_default())
    }

    async fn reply_dm(&self, text: &str) -> Result<(), SurfaceError> {
        self.dm_replies.lock().unwrap().push(text.to_string());
        Ok(())
    }

    async fn close(&self) -> Result<(), SurfaceError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
