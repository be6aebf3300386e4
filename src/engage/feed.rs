//! 信息流点赞 Pass
//!
//! 有界遍历信息流帖子逐个尝试点赞。控件缺失记日志后跳过（软失败），
//! 条目间随机延迟并滚动一屏，模拟人工浏览节奏。

use rand::Rng;

use crate::core::EngageError;
use crate::surface::Surface;

pub struct FeedPass {
    pub max_posts: usize,
    /// 条目间延迟区间（毫秒）；上界为 0 时不延迟（测试用）
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl FeedPass {
    pub async fn run(&self, surface: &dyn Surface) -> Result<(), EngageError> {
        surface.goto_home().await?;

        for index in 1..=self.max_posts {
            if surface.like_post(index).await? {
                tracing::info!(post = index, "liked");
            } else {
                tracing::debug!(post = index, "no like control, skipping");
            }

            if self.max_delay_ms > 0 {
                let ms = rand::thread_rng().gen_range(self.min_delay_ms..=self.max_delay_ms);
                tokio::time::sleep(std::time::Duration::from_millis(ms)).await;
            }
            surface.scroll_feed().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::MockSurface;

    #[tokio::test]
    async fn test_like_pass_is_bounded_and_soft() {
        // 10 个帖子里只有 4 个带点赞控件：缺控件不是错误
        let surface = MockSurface::new().with_likeable_posts(4);
        let pass = FeedPass {
            max_posts: 10,
            min_delay_ms: 0,
            max_delay_ms: 0,
        };
        pass.run(&surface).await.unwrap();
        assert_eq!(surface.liked_count(), 4);
    }
}
