//! AI 调用网关：有界重试与 key 轮换
//!
//! 对调用方隐藏重试策略：限流轮换 key 立即重发，服务不可用按指数退避
//! 用同一 key 重发，其余错误立刻传播。总尝试次数有上限，耗尽返回
//! Exhausted，调用方应将其作为单个条目的软失败处理，而非整轮失败。

use std::sync::Arc;
use std::time::Duration;

use crate::ai::{AiClient, AiError, KeyRotation, StructuredReply};

/// 重试策略参数
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// 总尝试次数上限（含首次）
    pub max_attempts: usize,
    /// 服务不可用时的退避基数
    pub backoff_base: Duration,
    /// 退避上限
    pub backoff_cap: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff_base: Duration::from_secs(5),
            backoff_cap: Duration::from_secs(60),
        }
    }
}

/// 网关：客户端 + 轮换策略 + 重试参数
pub struct AiGateway {
    client: Arc<dyn AiClient>,
    rotation: KeyRotation,
    retry: RetryConfig,
}

impl AiGateway {
    pub fn new(client: Arc<dyn AiClient>, rotation: KeyRotation, retry: RetryConfig) -> Self {
        Self {
            client,
            rotation,
            retry,
        }
    }

    /// 轮换策略（测试与观测用）
    pub fn rotation(&self) -> &KeyRotation {
        &self.rotation
    }

    /// 发起一次结构化回复请求；成功时恰好返回一个符合 schema 的对象
    pub async fn invoke(&self, prompt: &str) -> Result<StructuredReply, AiError> {
        let mut backoff = self.retry.backoff_base;

        for attempt in 1..=self.retry.max_attempts {
            let key = self.rotation.current();
            match self.client.generate(key, prompt).await {
                Ok(reply) => return Ok(reply),
                Err(AiError::RateLimited) => {
                    tracing::warn!(attempt, cursor = self.rotation.cursor(), "rate limited, rotating key");
                    self.rotation.advance();
                }
                Err(AiError::Unavailable) => {
                    tracing::warn!(attempt, backoff_secs = backoff.as_secs(), "service unavailable, backing off");
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(self.retry.backoff_cap);
                }
                // 未分类错误不重试，向调用方传播
                Err(e) => return Err(e),
            }
        }

        Err(AiError::Exhausted {
            attempts: self.retry.max_attempts,
        })
    }
}
