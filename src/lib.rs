//! Hornet - Rust Instagram 互动智能体
//!
//! 模块划分：
//! - **ai**: AI 调用网关（Gemini 客户端、key 轮换与有界重试）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误分类、调度循环、优雅关闭
//! - **engage**: 三类互动 Pass（信息流点赞 / 评论回复 / 私信回复）
//! - **ledger**: SQLite 去重账本（已处理条目，仅追加）
//! - **server**: 存活探针 HTTP 服务（/health、/status）
//! - **session**: Cookie 会话账本与登录管理
//! - **surface**: 浏览器交互面（headless_chrome 实现与 Mock）

pub mod ai;
pub mod config;
pub mod core;
pub mod engage;
pub mod ledger;
pub mod server;
pub mod session;
pub mod surface;
