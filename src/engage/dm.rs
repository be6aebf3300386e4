//! 私信回复 Pass
//!
//! 扫描收件箱最近的会话，对每条未处理的来信生成回复并发送。
//! 与评论 Pass 相同的顺序约束与软失败策略；自己发出的消息一律跳过。

use std::time::Duration;

use crate::ai::{AiError, AiGateway};
use crate::core::EngageError;
use crate::ledger::{DedupStore, ItemClass, LedgerError};
use crate::surface::Surface;

pub struct DmPass {
    pub username: String,
    pub max_threads: usize,
    pub item_delay: Duration,
}

impl DmPass {
    pub async fn run(
        &self,
        surface: &dyn Surface,
        gateway: &AiGateway,
        store: &DedupStore,
    ) -> Result<(), EngageError> {
        let threads = surface.dm_threads(self.max_threads).await?;
        tracing::info!(threads = threads.len(), "scanning dm threads");

        for thread_url in threads {
            let messages = surface.thread_messages(&thread_url).await?;
            for message in messages {
                if message.from_me
                    || (!message.sender.is_empty() && message.sender == self.username)
                {
                    tracing::debug!(message = %message.id, "own message, skipping");
                    continue;
                }
                if store.has_handled(ItemClass::DirectMessage, &message.id)? {
                    tracing::debug!(message = %message.id, "already handled, skipping");
                    continue;
                }

                let prompt = format!(
                    "请用友好、有帮助的语气，按来信的原语言回复这条私信：\"{}\"",
                    message.text
                );
                let reply = match gateway.invoke(&prompt).await {
                    Ok(reply) => reply,
                    Err(AiError::Exhausted { attempts }) => {
                        tracing::warn!(message = %message.id, attempts, "retry budget exhausted, skipping item");
                        continue;
                    }
                    Err(e) => return Err(e.into()),
                };

                // 远端动作先行，账本写入在后
                surface.reply_dm(&reply.reply).await?;
                match store.mark_handled(ItemClass::DirectMessage, &message.id) {
                    Ok(()) => tracing::info!(message = %message.id, "replied to dm"),
                    Err(LedgerError::Duplicate(_)) => {
                        tracing::debug!(message = %message.id, "already recorded by another path")
                    }
                    Err(e) => return Err(e.into()),
                }

                if !self.item_delay.is_zero() {
                    tokio::time::sleep(self.item_delay).await;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::ai::{KeyRotation, MockAiClient, RetryConfig};
    use crate::surface::{DmMessage, MockSurface};

    fn gateway(client: Arc<MockAiClient>) -> AiGateway {
        AiGateway::new(
            client,
            KeyRotation::new(vec!["k1".into()]),
            RetryConfig {
                max_attempts: 3,
                backoff_base: Duration::from_millis(1),
                backoff_cap: Duration::from_millis(2),
            },
        )
    }

    fn message(id: &str, text: &str, from_me: bool) -> DmMessage {
        DmMessage {
            id: id.to_string(),
            sender: String::new(),
            text: text.to_string(),
            from_me,
        }
    }

    #[tokio::test]
    async fn test_own_messages_are_skipped() {
        let surface = MockSurface::new().with_thread(
            "https://example.com/t/1",
            vec![
                message("m1", "我发出的消息", true),
                message("m2", "hello there", false),
            ],
        );
        let client = Arc::new(MockAiClient::new());
        let store = DedupStore::open_in_memory().unwrap();
        let pass = DmPass {
            username: "hornet_bot".to_string(),
            max_threads: 5,
            item_delay: Duration::ZERO,
        };

        pass.run(&surface, &gateway(client.clone()), &store).await.unwrap();

        assert_eq!(client.calls(), 1);
        assert_eq!(surface.dm_replies().len(), 1);
        assert!(!store.has_handled(ItemClass::DirectMessage, "m1").unwrap());
        assert!(store.has_handled(ItemClass::DirectMessage, "m2").unwrap());
    }

    #[tokio::test]
    async fn test_thread_limit_is_respected() {
        let mut surface = MockSurface::new();
        for i in 0..8 {
            surface = surface.with_thread(
                &format!("https://example.com/t/{i}"),
                vec![message(&format!("m{i}"), "hi", false)],
            );
        }
        let client = Arc::new(MockAiClient::new());
        let store = DedupStore::open_in_memory().unwrap();
        let pass = DmPass {
            username: "hornet_bot".to_string(),
            max_threads: 5,
            item_delay: Duration::ZERO,
        };

        pass.run(&surface, &gateway(client), &store).await.unwrap();
        assert_eq!(surface.dm_replies().len(), 5);
    }
}
