//! 登录管理：每个 Pass 开始前确保存在有效会话
//!
//! 流程：读会话账本 → 判定有效则应用到浏览上下文并探测主页标记；
//! 账本缺失、判定无效或探测失败时走凭据登录并整体覆盖会话文件。
//! 登录本身不做静默重试，登录超时作为致命错误向上传播（由 Scheduler 捕获）。

use crate::config::Credentials;
use crate::core::EngageError;
use crate::session::{session_is_valid, SessionLedger};
use crate::surface::Surface;

/// 会话管理器：账本 + 凭据，凭据进程生命周期内不变
pub struct SessionManager {
    ledger: SessionLedger,
    creds: Credentials,
}

impl SessionManager {
    pub fn new(ledger: SessionLedger, creds: Credentials) -> Self {
        Self { ledger, creds }
    }

    pub fn username(&self) -> &str {
        &self.creds.username
    }

    /// 确保当前浏览上下文已认证；复用路径不回写账本
    pub async fn ensure_session(&self, surface: &dyn Surface) -> Result<(), EngageError> {
        tracing::info!("ensure_session: checking saved session");
        match self.ledger.load() {
            Some(cookies) if session_is_valid(&cookies) => {
                surface.apply_session(&cookies).await?;
                surface.goto_home().await?;
                if surface.is_logged_in(&self.creds.username).await? {
                    tracing::info!("session valid, reusing saved cookies");
                    return Ok(());
                }
                // 结构上有效但已被远端吊销
                tracing::warn!("session expired or revoked, re-logging in");
                self.login_and_persist(surface).await
            }
            Some(_) => {
                tracing::warn!("saved session judged invalid, replacing");
                self.login_and_persist(surface).await
            }
            None => {
                tracing::info!("no saved session, performing credential login");
                self.login_and_persist(surface).await
            }
        }
    }

    /// 凭据登录并整体覆盖会话文件；只有这条路径会写账本
    async fn login_and_persist(&self, surface: &dyn Surface) -> Result<(), EngageError> {
        surface.login(&self.creds).await?;
        let cookies = surface.capture_session().await?;
        self.ledger
            .save(&cookies)
            .map_err(|e| EngageError::Session(format!("persist session failed: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{SessionCookie, SessionLedger};
    use crate::surface::MockSurface;

    fn creds() -> Credentials {
        Credentials {
            username: "hornet_bot".to_string(),
            password: "secret".to_string(),
        }
    }

    fn fresh_session() -> Vec<SessionCookie> {
        vec![SessionCookie {
            name: "sessionid".to_string(),
            value: "abc".to_string(),
            domain: ".instagram.com".to_string(),
            path: "/".to_string(),
            expires: chrono::Utc::now().timestamp() as f64 + 86400.0,
            http_only: true,
            secure: true,
        }]
    }

    #[tokio::test]
    async fn test_login_then_reuse_without_relogin() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = SessionLedger::new(dir.path().join("session.json"));
        let manager = SessionManager::new(ledger.clone(), creds());
        let surface = MockSurface::new().with_captured_session(fresh_session());

        // 无会话文件：执行登录并写盘
        manager.ensure_session(&surface).await.unwrap();
        assert_eq!(surface.login_calls(), 1);
        let saved = ledger.load().unwrap();
        assert_eq!(saved[0].name, "sessionid");
        assert!(session_is_valid(&saved));

        // 同进程第二次调用：复用会话，不再触发登录子流程
        manager.ensure_session(&surface).await.unwrap();
        assert_eq!(surface.login_calls(), 1);
        assert_eq!(surface.applied_sessions(), 1);
    }

    #[tokio::test]
    async fn test_stale_file_triggers_relogin() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = SessionLedger::new(dir.path().join("session.json"));
        // 预置过期会话
        let mut stale = fresh_session();
        stale[0].expires = chrono::Utc::now().timestamp() as f64 - 60.0;
        ledger.save(&stale).unwrap();

        let manager = SessionManager::new(ledger.clone(), creds());
        let surface = MockSurface::new().with_captured_session(fresh_session());

        manager.ensure_session(&surface).await.unwrap();
        assert_eq!(surface.login_calls(), 1);
        // 文件被新会话整体覆盖
        assert!(session_is_valid(&ledger.load().unwrap()));
    }

    #[tokio::test]
    async fn test_revoked_session_falls_back_to_login() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = SessionLedger::new(dir.path().join("session.json"));
        ledger.save(&fresh_session()).unwrap();

        let manager = SessionManager::new(ledger, creds());
        // 结构上有效，但探测失败（远端吊销）
        let surface = MockSurface::new()
            .with_captured_session(fresh_session())
            .with_probe_rejecting_applied_session();

        manager.ensure_session(&surface).await.unwrap();
        assert_eq!(surface.login_calls(), 1);
    }
}
