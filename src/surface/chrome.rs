//! ChromeSurface：基于 Headless Chrome 的 Surface 实现
//!
//! 需系统已安装 Chrome/Chromium。Browser 与 Tab 惰性创建并复用；
//! headless_chrome 为同步接口，所有 CDP 调用都包在 spawn_blocking 里。
//! 页面枚举通过注入脚本返回 JSON.stringify 载荷，点击用页内事件派发。
//! 选择器是站点易碎细节，集中列在文件顶部。

use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use headless_chrome::protocol::cdp::Network::CookieParam;
use headless_chrome::{Browser, LaunchOptions, Tab};

use crate::config::{BrowserSection, Credentials};
use crate::session::SessionCookie;
use crate::surface::{CommentItem, DmMessage, Surface, SurfaceError};

const LOGIN_PATH: &str = "/accounts/login/";
const SEL_LOGIN_USERNAME: &str = "input[name=\"username\"]";
const SEL_LOGIN_PASSWORD: &str = "input[name=\"password\"]";
const SEL_SUBMIT: &str = "button[type='submit']";
const SEL_COMMENT: &str = "li[data-testid='comment']";
const SEL_THREAD_LINKS: &str = "div[role='dialog'] a";
const SEL_REPLY_BOX: &str = "textarea";

/// 随机挑一个常见桌面 UA，降低指纹一致性
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
];

/// Chrome 实现：站点根地址 + 启动参数 + 复用的 Browser/Tab
pub struct ChromeSurface {
    base_url: String,
    headless: bool,
    proxy: Option<String>,
    user_agent: String,
    wait_timeout: Duration,
    login_timeout: Duration,
    browser: Arc<RwLock<Option<Browser>>>,
    tab: Arc<RwLock<Option<Arc<Tab>>>>,
}

impl ChromeSurface {
    pub fn new(cfg: &BrowserSection) -> Self {
        use rand::seq::SliceRandom;
        let user_agent = USER_AGENTS
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(USER_AGENTS[0])
            .to_string();
        Self {
            base_url: "https://www.instagram.com".to_string(),
            headless: cfg.headless,
            proxy: cfg.proxy.clone(),
            user_agent,
            wait_timeout: Duration::from_secs(cfg.wait_timeout_secs),
            login_timeout: Duration::from_secs(cfg.login_timeout_secs),
            browser: Arc::new(RwLock::new(None)),
            tab: Arc::new(RwLock::new(None)),
        }
    }

    /// 在阻塞线程上取得（或创建）标签页并执行闭包
    async fn with_tab<T, F>(&self, f: F) -> Result<T, SurfaceError>
    where
        T: Send + 'static,
        F: FnOnce(&Arc<Tab>) -> Result<T, SurfaceError> + Send + 'static,
    {
        let browser_arc = Arc::clone(&self.browser);
        let tab_arc = Arc::clone(&self.tab);
        let headless = self.headless;
        let proxy = self.proxy.clone();
        let user_agent = self.user_agent.clone();

        tokio::task::spawn_blocking(move || {
            let mut browser_guard = browser_arc
                .write()
                .map_err(|e| SurfaceError::Browser(e.to_string()))?;
            if browser_guard.is_none() {
                let options = LaunchOptions::default_builder()
                    .headless(headless)
                    .proxy_server(proxy.as_deref())
                    .build()
                    .map_err(|e| SurfaceError::Browser(format!("launch options: {e}")))?;
                let browser = Browser::new(options)
                    .map_err(|e| SurfaceError::Browser(format!("Chrome launch failed: {e}")))?;
                *browser_guard = Some(browser);
            }
            let browser = browser_guard.as_ref().unwrap();

            let mut tab_guard = tab_arc
                .write()
                .map_err(|e| SurfaceError::Browser(e.to_string()))?;
            if tab_guard.is_none() {
                let tab = browser
                    .new_tab()
                    .map_err(|e| SurfaceError::Browser(format!("browser tab failed: {e}")))?;
                let _ = tab.set_user_agent(&user_agent, None, None);
                *tab_guard = Some(tab);
            }
            let tab = Arc::clone(tab_guard.as_ref().unwrap());
            drop(tab_guard);
            drop(browser_guard);

            f(&tab)
        })
        .await
        .map_err(|e| SurfaceError::Browser(format!("blocking task failed: {e}")))?
    }
}

/// 导航并等待加载完成
fn navigate(tab: &Arc<Tab>, url: &str) -> Result<(), SurfaceError> {
    tab.navigate_to(url)
        .map_err(|e| SurfaceError::Navigation(format!("{url}: {e}")))?;
    tab.wait_until_navigated()
        .map_err(|e| SurfaceError::Navigation(format!("{url}: {e}")))?;
    // 留出首屏渲染时间
    std::thread::sleep(Duration::from_millis(500));
    Ok(())
}

/// 执行页内脚本并取 bool 结果
fn eval_bool(tab: &Arc<Tab>, js: &str) -> Result<bool, SurfaceError> {
    let result = tab
        .evaluate(js, false)
        .map_err(|e| SurfaceError::Browser(format!("script failed: {e}")))?;
    Ok(result.value.and_then(|v| v.as_bool()).unwrap_or(false))
}

/// 执行页内脚本并把 JSON.stringify 载荷反序列化为 T
fn eval_json<T: serde::de::DeserializeOwned>(tab: &Arc<Tab>, js: &str) -> Result<T, SurfaceError> {
    let result = tab
        .evaluate(js, false)
        .map_err(|e| SurfaceError::Browser(format!("script failed: {e}")))?;
    let text = result
        .value
        .and_then(|v| v.as_str().map(str::to_owned))
        .ok_or_else(|| SurfaceError::Decode("script returned no value".to_string()))?;
    serde_json::from_str(&text).map_err(|e| SurfaceError::Decode(e.to_string()))
}

/// 嵌入脚本字符串字面量时的转义
fn js_escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

#[async_trait::async_trait]
impl Surface for ChromeSurface {
    async fn apply_session(&self, cookies: &[SessionCookie]) -> Result<(), SurfaceError> {
        // SessionCookie 与 CDP CookieParam 同为 camelCase，直接经 JSON 转换
        let params: Vec<CookieParam> = cookies
            .iter()
            .map(|c| {
                serde_json::to_value(c)
                    .and_then(serde_json::from_value)
                    .map_err(|e| SurfaceError::Decode(format!("cookie convert: {e}")))
            })
            .collect::<Result<_, _>>()?;

        self.with_tab(move |tab| {
            tab.set_cookies(params)
                .map_err(|e| SurfaceError::Browser(format!("set cookies failed: {e}")))?;
            Ok(())
        })
        .await
    }

    async fn capture_session(&self) -> Result<Vec<SessionCookie>, SurfaceError> {
        self.with_tab(move |tab| {
            let cookies = tab
                .get_cookies()
                .map_err(|e| SurfaceError::Browser(format!("get cookies failed: {e}")))?;
            Ok(cookies
                .into_iter()
                .map(|c| SessionCookie {
                    name: c.name,
                    value: c.value,
                    domain: c.domain,
                    path: c.path,
                    expires: c.expires,
                    http_only: c.http_only,
                    secure: c.secure,
                })
                .collect())
        })
        .await
    }

    async fn goto_home(&self) -> Result<(), SurfaceError> {
        let url = format!("{}/", self.base_url);
        self.with_tab(move |tab| navigate(tab, &url)).await
    }

    async fn is_logged_in(&self, username: &str) -> Result<bool, SurfaceError> {
        let js = format!(
            r#"!!document.querySelector("a[href='/{}/']")"#,
            js_escape(username)
        );
        self.with_tab(move |tab| eval_bool(tab, &js)).await
    }

    async fn login(&self, creds: &Credentials) -> Result<(), SurfaceError> {
        let url = format!("{}{}", self.base_url, LOGIN_PATH);
        let username = creds.username.clone();
        let password = creds.password.clone();
        let wait_timeout = self.wait_timeout;
        let login_timeout = self.login_timeout;

        tracing::info!("performing credential login");
        self.with_tab(move |tab| {
            navigate(tab, &url)?;

            // 同意浮层：尽力而为，不存在也不是错误
            let _ = tab.evaluate(
                r#"(function() {
                    document.querySelectorAll('button').forEach(function(btn) {
                        if (btn.innerText.toLowerCase().includes('allow all cookies')) { btn.click(); }
                    });
                    return true;
                })()"#,
                false,
            );

            let field = tab
                .wait_for_element_with_custom_timeout(SEL_LOGIN_USERNAME, wait_timeout)
                .map_err(|_| SurfaceError::ElementTimeout("login form".to_string()))?;
            field
                .click()
                .map_err(|e| SurfaceError::Browser(format!("focus username: {e}")))?;
            tab.type_str(&username)
                .map_err(|e| SurfaceError::Browser(format!("type username: {e}")))?;

            let field = tab
                .wait_for_element_with_custom_timeout(SEL_LOGIN_PASSWORD, wait_timeout)
                .map_err(|_| SurfaceError::ElementTimeout("password field".to_string()))?;
            field
                .click()
                .map_err(|e| SurfaceError::Browser(format!("focus password: {e}")))?;
            tab.type_str(&password)
                .map_err(|e| SurfaceError::Browser(format!("type password: {e}")))?;

            let submit = tab
                .find_element(SEL_SUBMIT)
                .map_err(|e| SurfaceError::Browser(format!("submit login: {e}")))?;
            submit
                .click()
                .map_err(|e| SurfaceError::Browser(format!("submit login: {e}")))?;

            // 有界等待离开登录页；超时对本轮 Cycle 致命
            let deadline = Instant::now() + login_timeout;
            while tab.get_url().contains(LOGIN_PATH) {
                if Instant::now() >= deadline {
                    return Err(SurfaceError::LoginTimeout(login_timeout.as_secs()));
                }
                std::thread::sleep(Duration::from_millis(500));
            }
            tracing::info!("logged in with credentials");
            Ok(())
        })
        .await
    }

    async fn like_post(&self, index: usize) -> Result<bool, SurfaceError> {
        let js = format!(
            r#"(function() {{
                var btn = document.querySelector("article:nth-of-type({index}) svg[aria-label='Like']");
                if (btn) {{
                    btn.dispatchEvent(new MouseEvent('click', {{ bubbles: true, cancelable: true }}));
                    return true;
                }}
                return false;
            }})()"#
        );
        self.with_tab(move |tab| eval_bool(tab, &js)).await
    }

    async fn scroll_feed(&self) -> Result<(), SurfaceError> {
        self.with_tab(move |tab| {
            tab.evaluate("window.scrollBy(0, window.innerHeight); true", false)
                .map_err(|e| SurfaceError::Browser(format!("scroll failed: {e}")))?;
            Ok(())
        })
        .await
    }

    async fn own_post_links(
        &self,
        username: &str,
        limit: usize,
    ) -> Result<Vec<String>, SurfaceError> {
        let url = format!("{}/{}/", self.base_url, username);
        let js = format!(
            r#"JSON.stringify(Array.from(document.querySelectorAll('article a')).slice(0, {limit}).map(function(a) {{ return a.href; }}))"#
        );
        self.with_tab(move |tab| {
            navigate(tab, &url)?;
            eval_json(tab, &js)
        })
        .await
    }

    async fn list_comments(&self, post_url: &str) -> Result<Vec<CommentItem>, SurfaceError> {
        let url = post_url.to_string();
        let wait_timeout = self.wait_timeout;
        self.with_tab(move |tab| {
            navigate(tab, &url)?;
            // 评论区等待超时吸收为空列表（软失败）
            if tab
                .wait_for_element_with_custom_timeout(SEL_COMMENT, wait_timeout)
                .is_err()
            {
                tracing::debug!(url = %url, "no comment list found, skipping post");
                return Ok(Vec::new());
            }
            eval_json(
                tab,
                r#"JSON.stringify(Array.from(document.querySelectorAll("li[data-testid='comment']")).map(function(li) {
                    var user = li.querySelector('h3 a');
                    var span = li.querySelector('span');
                    return {
                        id: li.getAttribute('id') || '',
                        author: user ? user.textContent.trim() : '',
                        text: span ? span.textContent.trim() : ''
                    };
                }).filter(function(c) { return c.id !== ''; }))"#,
            )
        })
        .await
    }

    async fn reply_comment(&self, comment_id: &str, text: &str) -> Result<(), SurfaceError> {
        let click_js = format!(
            r#"(function() {{
                var item = document.getElementById("{}");
                if (!item) return false;
                var btn = item.querySelector('button');
                if (btn) {{ btn.dispatchEvent(new MouseEvent('click', {{ bubbles: true }})); return true; }}
                return false;
            }})()"#,
            js_escape(comment_id)
        );
        let text = text.to_string();
        let comment_id = comment_id.to_string();
        let wait_timeout = self.wait_timeout;
        self.with_tab(move |tab| {
            if !eval_bool(tab, &click_js)? {
                return Err(SurfaceError::ElementTimeout(format!(
                    "reply control for comment {comment_id}"
                )));
            }
            let area = tab
                .wait_for_element_with_custom_timeout(SEL_REPLY_BOX, wait_timeout)
                .map_err(|_| SurfaceError::ElementTimeout("reply textarea".to_string()))?;
            area.click()
                .map_err(|e| SurfaceError::Browser(format!("focus reply box: {e}")))?;
            tab.type_str(&text)
                .map_err(|e| SurfaceError::Browser(format!("type reply: {e}")))?;
            let submit = tab
                .find_element(SEL_SUBMIT)
                .map_err(|e| SurfaceError::Browser(format!("submit reply: {e}")))?;
            submit
                .click()
                .map_err(|e| SurfaceError::Browser(format!("submit reply: {e}")))?;
            Ok(())
        })
        .await
    }

    async fn dm_threads(&self, limit: usize) -> Result<Vec<String>, SurfaceError> {
        let url = format!("{}/direct/inbox/", self.base_url);
        let wait_timeout = self.wait_timeout;
        let js = format!(
            r#"JSON.stringify(Array.from(document.querySelectorAll("div[role='dialog'] a")).slice(0, {limit}).map(function(a) {{ return a.href; }}))"#
        );
        self.with_tab(move |tab| {
            navigate(tab, &url)?;
            tab.wait_for_element_with_custom_timeout(SEL_THREAD_LINKS, wait_timeout)
                .map_err(|_| SurfaceError::ElementTimeout("dm thread list".to_string()))?;
            eval_json(tab, &js)
        })
        .await
    }

    async fn thread_messages(&self, thread_url: &str) -> Result<Vec<DmMessage>, SurfaceError> {
        let url = thread_url.to_string();
        self.with_tab(move |tab| {
            navigate(tab, &url)?;
            eval_json(
                tab,
                r#"JSON.stringify(Array.from(document.querySelectorAll("[role='listitem']")).map(function(li) {
                    var body = li.querySelector("div[role='button'] span");
                    return {
                        id: li.getAttribute('data-testid') || '',
                        sender: '',
                        text: body ? body.textContent.trim() : '',
                        fromMe: !!li.querySelector("svg[aria-label='Seen']")
                    };
                }).filter(function(m) { return m.id !== ''; }))"#,
            )
        })
        .await
    }

    async fn reply_dm(&self, text: &str) -> Result<(), SurfaceError> {
        let text = text.to_string();
        let wait_timeout = self.wait_timeout;
        self.with_tab(move |tab| {
            let area = tab
                .wait_for_element_with_custom_timeout(SEL_REPLY_BOX, wait_timeout)
                .map_err(|_| SurfaceError::ElementTimeout("dm textarea".to_string()))?;
            area.click()
                .map_err(|e| SurfaceError::Browser(format!("focus dm box: {e}")))?;
            tab.type_str(&text)
                .map_err(|e| SurfaceError::Browser(format!("type dm: {e}")))?;
            tab.press_key("Enter")
                .map_err(|e| SurfaceError::Browser(format!("send dm: {e}")))?;
            Ok(())
        })
        .await
    }

    async fn close(&self) -> Result<(), SurfaceError> {
        let browser_arc = Arc::clone(&self.browser);
        let tab_arc = Arc::clone(&self.tab);
        tokio::task::spawn_blocking(move || {
            if let Ok(mut tab_guard) = tab_arc.write() {
                tab_guard.take();
            }
            if let Ok(mut browser_guard) = browser_arc.write() {
                // Browser 句柄析构时关闭 Chrome 进程
                browser_guard.take();
            }
        })
        .await
        .map_err(|e| SurfaceError::Browser(format!("blocking task failed: {e}")))?;
        tracing::info!("browser released");
        Ok(())
    }
}
