//! 浏览器交互面：核心层只依赖 Surface trait，DOM 细节全部在实现里

pub mod chrome;
pub mod mock;
pub mod traits;

pub use chrome::ChromeSurface;
pub use mock::MockSurface;
pub use traits::{CommentItem, DmMessage, Surface, SurfaceError};
