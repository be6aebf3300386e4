//! Gemini API 客户端
//!
//! 调用 generateContent 端点，responseSchema 约束结构化输出。
//! key 按请求传入，由网关的轮换策略在两次尝试之间替换。
//! HTTP 429 / 503 映射为可重试分类，其余一律 Provider。

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::json;

use crate::ai::traits::reply_schema;
use crate::ai::{AiClient, AiError, StructuredReply};

/// Gemini API 常量
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini 客户端：持有 HTTP 连接池与模型名
pub struct GeminiClient {
    http: reqwest::Client,
    model: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(model: &str, base_url: Option<&str>) -> Self {
        Self {
            http: reqwest::Client::new(),
            model: model.to_string(),
            base_url: base_url.unwrap_or(GEMINI_BASE_URL).to_string(),
        }
    }
}

#[async_trait]
impl AiClient for GeminiClient {
    async fn generate(&self, api_key: &str, prompt: &str) -> Result<StructuredReply, AiError> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url, self.model
        );
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": reply_schema(),
            },
        });

        let response = self
            .http
            .post(&url)
            .query(&[("key", api_key)])
            .json(&body)
            .send()
            .await
            .map_err(|e| AiError::Provider(format!("request failed: {e}")))?;

        match response.status() {
            StatusCode::TOO_MANY_REQUESTS => return Err(AiError::RateLimited),
            StatusCode::SERVICE_UNAVAILABLE => return Err(AiError::Unavailable),
            status if !status.is_success() => {
                let detail = response.text().await.unwrap_or_default();
                return Err(AiError::Provider(format!("http {status}: {detail}")));
            }
            _ => {}
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AiError::Provider(format!("invalid response body: {e}")))?;

        let text = payload["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .ok_or_else(|| AiError::Provider("no candidates in response".to_string()))?;

        // 结构化输出不符合 schema 属于提供方违约，不在此处修补
        serde_json::from_str::<StructuredReply>(text)
            .map_err(|e| AiError::Provider(format!("malformed structured reply: {e}")))
    }
}
