//! Cookie 会话账本
//!
//! 将浏览器会话（Cookie 序列）写入/从 JSON 文件加载。字段名用 camelCase，
//! 与浏览上下文消费的 CDP Cookie 结构对齐。每次重新登录整体覆盖，从不合并；
//! 过期文件不删除，只在判定无效后被新会话替换。

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// 单条 Cookie 记录
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default = "default_cookie_path")]
    pub path: String,
    /// 过期时间（epoch 秒）；会话级 Cookie 为 -1
    #[serde(default = "default_expires")]
    pub expires: f64,
    #[serde(default)]
    pub http_only: bool,
    #[serde(default)]
    pub secure: bool,
}

fn default_cookie_path() -> String {
    "/".to_string()
}

fn default_expires() -> f64 {
    -1.0
}

/// 会话有效判定：存在名为 sessionid 或 csrftoken 且未过期的 Cookie
pub fn session_is_valid(cookies: &[SessionCookie]) -> bool {
    let now = chrono::Utc::now().timestamp() as f64;
    cookies
        .iter()
        .any(|c| (c.name == "sessionid" || c.name == "csrftoken") && c.expires > now)
}

/// 会话文件账本：固定路径、整体覆盖写
#[derive(Debug, Clone)]
pub struct SessionLedger {
    path: PathBuf,
}

impl SessionLedger {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// 读取会话文件；文件不存在返回 None，读取/解析失败同样视为无会话（记录告警）
    pub fn load(&self) -> Option<Vec<SessionCookie>> {
        if !self.path.exists() {
            tracing::warn!(path = %self.path.display(), "session file not found");
            return None;
        }
        let data = match std::fs::read_to_string(&self.path) {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read session file");
                return None;
            }
        };
        match serde_json::from_str::<Vec<SessionCookie>>(&data) {
            Ok(cookies) => Some(cookies),
            Err(e) => {
                tracing::warn!(error = %e, "failed to parse session file");
                None
            }
        }
    }

    /// 将会话整体写入文件（覆盖）；父目录不存在时自动创建
    pub fn save(&self, cookies: &[SessionCookie]) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(cookies)?)?;
        tracing::info!(count = cookies.len(), path = %self.path.display(), "session saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cookie(name: &str, expires: f64) -> SessionCookie {
        SessionCookie {
            name: name.to_string(),
            value: "v".to_string(),
            domain: ".example.com".to_string(),
            path: "/".to_string(),
            expires,
            http_only: true,
            secure: true,
        }
    }

    fn future() -> f64 {
        chrono::Utc::now().timestamp() as f64 + 3600.0
    }

    fn past() -> f64 {
        chrono::Utc::now().timestamp() as f64 - 3600.0
    }

    #[test]
    fn test_valid_with_future_sessionid() {
        assert!(session_is_valid(&[cookie("sessionid", future())]));
    }

    #[test]
    fn test_valid_with_future_csrftoken() {
        assert!(session_is_valid(&[cookie("csrftoken", future())]));
    }

    #[test]
    fn test_invalid_with_expired_sessionid() {
        assert!(!session_is_valid(&[cookie("sessionid", past())]));
    }

    #[test]
    fn test_invalid_without_marker_cookies() {
        // 其它 Cookie 再多也不算有效会话
        let cookies = vec![cookie("mid", future()), cookie("ig_did", future())];
        assert!(!session_is_valid(&cookies));
    }

    #[test]
    fn test_ledger_roundtrip_and_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = SessionLedger::new(dir.path().join("nested/session.json"));
        assert!(!ledger.exists());
        assert!(ledger.load().is_none());

        ledger.save(&[cookie("sessionid", future())]).unwrap();
        let loaded = ledger.load().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].name, "sessionid");

        // 覆盖写：旧内容不保留
        ledger
            .save(&[cookie("csrftoken", future()), cookie("mid", future())])
            .unwrap();
        let loaded = ledger.load().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].name, "csrftoken");
    }

    #[test]
    fn test_ledger_camel_case_fields() {
        let json = serde_json::to_string(&cookie("sessionid", 1.0)).unwrap();
        assert!(json.contains("httpOnly"));
        assert!(!json.contains("http_only"));
    }
}
