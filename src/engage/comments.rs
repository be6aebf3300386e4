//! 评论回复 Pass
//!
//! 扫描自己主页的最近帖子，对每条未处理的他人评论生成回复并发送。
//! 顺序约束：远端回复动作确认之后才写去重账本，绝不反向。
//! 自己的评论永远不进 AI，也不进账本。

use std::time::Duration;

use crate::ai::{AiError, AiGateway};
use crate::core::EngageError;
use crate::ledger::{DedupStore, ItemClass, LedgerError};
use crate::surface::Surface;

pub struct CommentPass {
    pub username: String,
    pub max_posts: usize,
    pub item_delay: Duration,
}

impl CommentPass {
    pub async fn run(
        &self,
        surface: &dyn Surface,
        gateway: &AiGateway,
        store: &DedupStore,
    ) -> Result<(), EngageError> {
        let links = surface.own_post_links(&self.username, self.max_posts).await?;
        tracing::info!(posts = links.len(), "scanning own posts for new comments");

        for url in links {
            let comments = surface.list_comments(&url).await?;
            for comment in comments {
                if comment.author == self.username {
                    tracing::debug!(comment = %comment.id, "own comment, skipping");
                    continue;
                }
                if store.has_handled(ItemClass::Comment, &comment.id)? {
                    tracing::debug!(comment = %comment.id, "already handled, skipping");
                    continue;
                }

                let prompt = format!(
                    "请用友好的语气、评论的原语言，简短回复这条评论：\"{}\"",
                    comment.text
                );
                let reply = match gateway.invoke(&prompt).await {
                    Ok(reply) => reply,
                    Err(AiError::Exhausted { attempts }) => {
                        // 重试预算耗尽：这个条目软失败，Pass 继续
                        tracing::warn!(comment = %comment.id, attempts, "retry budget exhausted, skipping item");
                        continue;
                    }
                    Err(e) => return Err(e.into()),
                };

                let text = format!("@{} {}", comment.author, reply.reply);
                // 远端动作先行，账本写入在后
                surface.reply_comment(&comment.id, &text).await?;
                match store.mark_handled(ItemClass::Comment, &comment.id) {
                    Ok(()) => tracing::info!(comment = %comment.id, "replied to comment"),
                    Err(LedgerError::Duplicate(_)) => {
                        tracing::debug!(comment = %comment.id, "already recorded by another path")
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
    use crate::surface::{CommentItem, MockSurface};

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

    fn comment(id: &str, author: &str, text: &str) -> CommentItem {
        CommentItem {
            id: id.to_string(),
            author: author.to_string(),
            text: text.to_string(),
        }
    }

    fn pass() -> CommentPass {
        CommentPass {
            username: "hornet_bot".to_string(),
            max_posts: 3,
            item_delay: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn test_self_comments_never_reach_ai_or_ledger() {
        let surface = MockSurface::new().with_post(
            "https://example.com/p/1",
            vec![
                comment("c1", "hornet_bot", "自己的评论"),
                comment("c2", "alice", "great shot!"),
            ],
        );
        let client = Arc::new(MockAiClient::new());
        let store = DedupStore::open_in_memory().unwrap();

        pass().run(&surface, &gateway(client.clone()), &store).await.unwrap();

        // 只有 alice 的评论触发 AI 与回复
        assert_eq!(client.calls(), 1);
        let replies = surface.comment_replies();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].0, "c2");
        assert!(replies[0].1.starts_with("@alice "));
        assert!(!store.has_handled(ItemClass::Comment, "c1").unwrap());
        assert!(store.has_handled(ItemClass::Comment, "c2").unwrap());
    }

    #[tokio::test]
    async fn test_second_pass_skips_handled_items() {
        let surface = MockSurface::new().with_post(
            "https://example.com/p/1",
            vec![comment("c1", "alice", "hello"), comment("c2", "bob", "hi")],
        );
        let client = Arc::new(MockAiClient::new());
        let store = DedupStore::open_in_memory().unwrap();
        let gateway = gateway(client.clone());

        pass().run(&surface, &gateway, &store).await.unwrap();
        assert_eq!(surface.comment_replies().len(), 2);

        // 第二轮：全部已记录，不再有回复尝试
        pass().run(&surface, &gateway, &store).await.unwrap();
        assert_eq!(client.calls(), 2);
        assert_eq!(surface.comment_replies().len(), 2);
    }

    #[tokio::test]
    async fn test_exhausted_is_soft_per_item() {
        let surface = MockSurface::new().with_post(
            "https://example.com/p/1",
            vec![comment("c1", "alice", "hello"), comment("c2", "bob", "hi")],
        );
        // c1 的调用全部限流（3 次预算耗尽），c2 正常
        let client = Arc::new(MockAiClient::scripted(vec![
            Err(AiError::RateLimited),
            Err(AiError::RateLimited),
            Err(AiError::RateLimited),
        ]));
        let store = DedupStore::open_in_memory().unwrap();

        pass().run(&surface, &gateway(client), &store).await.unwrap();

        // c1 被软跳过且未记账，c2 成功
        assert!(!store.has_handled(ItemClass::Comment, "c1").unwrap());
        assert!(store.has_handled(ItemClass::Comment, "c2").unwrap());
        assert_eq!(surface.comment_replies().len(), 1);
    }

    #[tokio::test]
    async fn test_unclassified_ai_error_fails_the_pass() {
        let surface = MockSurface::new().with_post(
            "https://example.com/p/1",
            vec![comment("c1", "alice", "hello")],
        );
        let client = Arc::new(MockAiClient::scripted(vec![Err(AiError::Provider(
            "bad schema".to_string(),
        ))]));
        let store = DedupStore::open_in_memory().unwrap();

        let result = pass().run(&surface, &gateway(client), &store).await;
        assert!(matches!(result, Err(EngageError::Ai(_))));
        // 失败条目没有进账本
        assert!(!store.has_handled(ItemClass::Comment, "c1").unwrap());
    }
}
