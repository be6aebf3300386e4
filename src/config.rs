//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `HORNET__*` 覆盖（双下划线表示嵌套，
//! 如 `HORNET__SERVER__PORT=8080`）。账号密码与 AI key 池另有独立环境变量兜底
//! （`IG_USERNAME` / `IG_PASSWORD` / `GEMINI_API_KEYS`），避免写进配置文件。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub account: AccountSection,
    #[serde(default)]
    pub ai: AiSection,
    #[serde(default)]
    pub session: SessionSection,
    #[serde(default)]
    pub engage: EngageSection,
    #[serde(default)]
    pub storage: StorageSection,
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub browser: BrowserSection,
}

/// [account] 段：机器人账号
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AccountSection {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// [ai] 段：模型、key 池与重试策略
#[derive(Debug, Clone, Deserialize)]
pub struct AiSection {
    /// AI key 池；为空时回退到环境变量 GEMINI_API_KEYS（逗号分隔）
    #[serde(default)]
    pub keys: Vec<String>,
    #[serde(default = "default_model")]
    pub model: String,
    pub base_url: Option<String>,
    /// 单次结构化回复的总尝试次数上限
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
    /// 服务不可用时的退避基数（秒），指数增长
    #[serde(default = "default_backoff_secs")]
    pub backoff_secs: u64,
}

fn default_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_max_attempts() -> usize {
    5
}

fn default_backoff_secs() -> u64 {
    5
}

impl Default for AiSection {
    fn default() -> Self {
        Self {
            keys: Vec::new(),
            model: default_model(),
            base_url: None,
            max_attempts: default_max_attempts(),
            backoff_secs: default_backoff_secs(),
        }
    }
}

/// [session] 段：Cookie 会话文件位置
#[derive(Debug, Clone, Deserialize)]
pub struct SessionSection {
    #[serde(default = "default_cookie_path")]
    pub cookie_path: PathBuf,
}

fn default_cookie_path() -> PathBuf {
    PathBuf::from("cookies/session.json")
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            cookie_path: default_cookie_path(),
        }
    }
}

/// [engage] 段：循环节奏与各 Pass 的规模
#[derive(Debug, Clone, Deserialize)]
pub struct EngageSection {
    /// 两轮 Cycle 之间的休眠（秒）
    #[serde(default = "default_cycle_interval_secs")]
    pub cycle_interval_secs: u64,
    /// 回复类条目之间的固定间隔（秒），模拟人工节奏
    #[serde(default = "default_item_delay_secs")]
    pub item_delay_secs: u64,
    /// 信息流点赞的帖子数量上限
    #[serde(default = "default_feed_like_count")]
    pub feed_like_count: usize,
    /// 扫描自己主页的最近帖子数
    #[serde(default = "default_comment_posts")]
    pub comment_posts: usize,
    /// 扫描私信会话数上限
    #[serde(default = "default_dm_threads")]
    pub dm_threads: usize,
}

fn default_cycle_interval_secs() -> u64 {
    30
}

fn default_item_delay_secs() -> u64 {
    5
}

fn default_feed_like_count() -> usize {
    50
}

fn default_comment_posts() -> usize {
    3
}

fn default_dm_threads() -> usize {
    5
}

impl Default for EngageSection {
    fn default() -> Self {
        Self {
            cycle_interval_secs: default_cycle_interval_secs(),
            item_delay_secs: default_item_delay_secs(),
            feed_like_count: default_feed_like_count(),
            comment_posts: default_comment_posts(),
            dm_threads: default_dm_threads(),
        }
    }
}

/// [storage] 段：去重账本的 SQLite 路径
#[derive(Debug, Clone, Deserialize)]
pub struct StorageSection {
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("data/hornet.db")
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
        }
    }
}

/// [server] 段：存活探针监听端口
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    3000
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

/// [browser] 段：Chrome 启动与等待超时
#[derive(Debug, Clone, Deserialize)]
pub struct BrowserSection {
    #[serde(default)]
    pub headless: bool,
    /// 形如 http://localhost:8000 的代理地址
    pub proxy: Option<String>,
    /// 元素等待超时（秒），评论列表等软等待
    #[serde(default = "default_wait_timeout_secs")]
    pub wait_timeout_secs: u64,
    /// 登录后等待离开登录页的超时（秒），超时对本轮 Cycle 致命
    #[serde(default = "default_login_timeout_secs")]
    pub login_timeout_secs: u64,
}

fn default_wait_timeout_secs() -> u64 {
    10
}

fn default_login_timeout_secs() -> u64 {
    60
}

impl Default for BrowserSection {
    fn default() -> Self {
        Self {
            headless: false,
            proxy: None,
            wait_timeout_secs: default_wait_timeout_secs(),
            login_timeout_secs: default_login_timeout_secs(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            account: AccountSection::default(),
            ai: AiSection::default(),
            session: SessionSection::default(),
            engage: EngageSection::default(),
            storage: StorageSection::default(),
            server: ServerSection::default(),
            browser: BrowserSection::default(),
        }
    }
}

/// 账号凭据：进程生命周期内不变
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    /// 从配置解析凭据，环境变量 IG_USERNAME / IG_PASSWORD 兜底；两者皆空视为启动失败
    pub fn resolve(section: &AccountSection) -> anyhow::Result<Self> {
        let username = if section.username.is_empty() {
            std::env::var("IG_USERNAME").unwrap_or_default()
        } else {
            section.username.clone()
        };
        let password = if section.password.is_empty() {
            std::env::var("IG_PASSWORD").unwrap_or_default()
        } else {
            section.password.clone()
        };
        if username.is_empty() || password.is_empty() {
            anyhow::bail!("account credentials missing: set [account] or IG_USERNAME / IG_PASSWORD");
        }
        Ok(Self { username, password })
    }
}

/// 解析 AI key 池，环境变量 GEMINI_API_KEYS（逗号分隔）兜底；池为空视为启动失败
pub fn resolve_ai_keys(section: &AiSection) -> anyhow::Result<Vec<String>> {
    let mut keys = section.keys.clone();
    if keys.is_empty() {
        if let Ok(raw) = std::env::var("GEMINI_API_KEYS") {
            keys = raw
                .split(',')
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .collect();
        }
    }
    if keys.is_empty() {
        anyhow::bail!("ai key pool empty: set [ai] keys or GEMINI_API_KEYS");
    }
    Ok(keys)
}

/// 从 config 目录加载配置，环境变量 HORNET__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 HORNET__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("HORNET")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.engage.cycle_interval_secs, 30);
        assert_eq!(cfg.engage.feed_like_count, 50);
        assert_eq!(cfg.ai.max_attempts, 5);
        assert_eq!(cfg.server.port, 3000);
        assert!(!cfg.browser.headless);
    }

    #[test]
    fn test_credentials_missing_is_error() {
        let section = AccountSection::default();
        // 环境变量未设置时应报错
        if std::env::var("IG_USERNAME").is_err() && std::env::var("IG_PASSWORD").is_err() {
            assert!(Credentials::resolve(&section).is_err());
        }
    }

    #[test]
    fn test_resolve_ai_keys_from_section() {
        let section = AiSection {
            keys: vec!["k1".into(), "k2".into()],
            ..AiSection::default()
        };
        let keys = resolve_ai_keys(&section).unwrap();
        assert_eq!(keys, vec!["k1".to_string(), "k2".to_string()]);
    }
}
