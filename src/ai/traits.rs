//! AI 客户端抽象
//!
//! 所有后端（Gemini / Mock）实现 AiClient：按给定 key 发起一次结构化回复请求。
//! 错误是封闭分类，网关对其穷举匹配决定轮换、退避还是放弃，不做报文字符串嗅探。

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// AI 调用错误分类
#[derive(Error, Debug)]
pub enum AiError {
    /// 限流信号（HTTP 429）：网关轮换 key 后重发
    #[error("rate limited")]
    RateLimited,

    /// 服务暂不可用（HTTP 503）：网关退避后用同一 key 重发
    #[error("service unavailable")]
    Unavailable,

    /// 重试预算耗尽；对单个条目是软失败
    #[error("retry budget exhausted after {attempts} attempts")]
    Exhausted { attempts: usize },

    /// 其它未分类失败：不重试，向调用方传播
    #[error("provider error: {0}")]
    Provider(String),
}

/// 结构化回复：成功时恰好返回一个符合 schema 的对象
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StructuredReply {
    /// 回复正文
    pub reply: String,
}

/// 请求提供方遵循的输出 schema（去掉 JSON Schema 元数据键）
pub fn reply_schema() -> serde_json::Value {
    let schema = schemars::schema_for!(StructuredReply);
    let mut value = serde_json::to_value(schema.schema).unwrap_or_default();
    if let Some(obj) = value.as_object_mut() {
        obj.remove("$schema");
        obj.remove("title");
    }
    value
}

/// AI 客户端 trait：一次底层请求，key 由调用方（网关）指定
#[async_trait]
pub trait AiClient: Send + Sync {
    async fn generate(&self, api_key: &str, prompt: &str) -> Result<StructuredReply, AiError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_schema_shape() {
        let schema = reply_schema();
        assert!(schema.get("$schema").is_none());
        assert!(schema["properties"]["reply"].is_object());
    }
}
