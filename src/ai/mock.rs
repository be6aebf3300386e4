//! Mock AI 客户端（用于测试，无需 API）
//!
//! 按脚本顺序返回预设结果，脚本耗尽后回显固定回复；
//! 记录调用次数与每次使用的 key，便于断言重试与轮换行为。

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::ai::{AiClient, AiError, StructuredReply};

/// Mock 客户端：脚本化结果 + 调用记录
#[derive(Debug, Default)]
pub struct MockAiClient {
    script: Mutex<VecDeque<Result<StructuredReply, AiError>>>,
    calls: AtomicUsize,
    keys_seen: Mutex<Vec<String>>,
}

impl MockAiClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按给定顺序返回结果；耗尽后回落到固定成功回复
    pub fn scripted(outcomes: Vec<Result<StructuredReply, AiError>>) -> Self {
        Self {
            script: Mutex::new(outcomes.into()),
            calls: AtomicUsize::new(0),
            keys_seen: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn keys_seen(&self) -> Vec<String> {
        self.keys_seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl AiClient for MockAiClient {
    async fn generate(&self, api_key: &str, prompt: &str) -> Result<StructuredReply, AiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.keys_seen.lock().unwrap().push(api_key.to_string());

        if let Some(outcome) = self.script.lock().unwrap().pop_front() {
            return outcome;
        }
        Ok(StructuredReply {
            reply: format!("mock reply to: {prompt}"),
        })
    }
}
