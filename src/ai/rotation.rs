//! Key 轮换策略
//!
//! 游标由策略对象自持，构造时注入网关，不是进程级全局量。
//! 只有重试策略会推进游标；一次推进影响后续所有调用，
//! 调用方不得假设跨调用的 key 稳定性。

use std::sync::atomic::{AtomicUsize, Ordering};

/// key 池与轮换游标；池不可变，游标单调推进（取模回绕）
#[derive(Debug)]
pub struct KeyRotation {
    keys: Vec<String>,
    cursor: AtomicUsize,
}

impl KeyRotation {
    /// 池不得为空（启动期校验，见 config::resolve_ai_keys）
    pub fn new(keys: Vec<String>) -> Self {
        debug_assert!(!keys.is_empty(), "key pool must not be empty");
        Self {
            keys,
            cursor: AtomicUsize::new(0),
        }
    }

    /// 当前 key
    pub fn current(&self) -> &str {
        &self.keys[self.cursor.load(Ordering::Relaxed) % self.keys.len()]
    }

    /// 轮换到下一个 key，返回新的当前 key
    pub fn advance(&self) -> &str {
        self.cursor.fetch_add(1, Ordering::Relaxed);
        self.current()
    }

    /// 游标位置（已推进次数）
    pub fn cursor(&self) -> usize {
        self.cursor.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_wraps_around() {
        let rotation = KeyRotation::new(vec!["a".into(), "b".into()]);
        assert_eq!(rotation.current(), "a");
        assert_eq!(rotation.advance(), "b");
        assert_eq!(rotation.advance(), "a");
        assert_eq!(rotation.cursor(), 2);
    }
}
