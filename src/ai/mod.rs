//! AI 层：客户端抽象、key 轮换与有界重试网关

pub mod gateway;
pub mod gemini;
pub mod mock;
pub mod rotation;
pub mod traits;

pub use gateway::{AiGateway, RetryConfig};
pub use gemini::GeminiClient;
pub use mock::MockAiClient;
pub use rotation::KeyRotation;
pub use traits::{AiClient, AiError, StructuredReply};
