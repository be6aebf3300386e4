//! 去重账本：已处理条目的仅追加记录
//!
//! 每个条目类别（评论 / 私信）一张表，item_id 唯一。只有插入一种变更，
//! 不更新不删除。唯一性冲突映射为 LedgerError::Duplicate，调用方应按
//! 「别的路径已记录过，跳过」处理，而非硬失败。
//! 账本写入必须发生在远端回复动作确认之后（见 engage 模块的顺序约束）。

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection};
use thiserror::Error;

/// 账本错误
#[derive(Error, Debug)]
pub enum LedgerError {
    /// 唯一性冲突：该条目已被记录
    #[error("duplicate item id: {0}")]
    Duplicate(String),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error("ledger io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 条目类别：评论与私信使用独立命名空间
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemClass {
    Comment,
    DirectMessage,
}

impl ItemClass {
    fn table(self) -> &'static str {
        match self {
            ItemClass::Comment => "replied_comments",
            ItemClass::DirectMessage => "replied_dms",
        }
    }
}

/// SQLite 去重存储；rusqlite 为同步接口，连接用 Mutex 包裹
pub struct DedupStore {
    conn: Mutex<Connection>,
}

impl DedupStore {
    /// 打开（或创建）账本数据库；父目录不存在时自动创建。启动期失败应终止进程。
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::init(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// 内存数据库（测试用）
    pub fn open_in_memory() -> Result<Self, LedgerError> {
        let conn = Connection::open_in_memory()?;
        Self::init(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init(conn: &Connection) -> Result<(), LedgerError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS replied_comments (
                item_id    TEXT PRIMARY KEY,
                handled_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS replied_dms (
                item_id    TEXT PRIMARY KEY,
                handled_at TEXT NOT NULL
            );",
        )?;
        Ok(())
    }

    /// 只读幂等查询：该条目是否已处理
    pub fn has_handled(&self, class: ItemClass, item_id: &str) -> Result<bool, LedgerError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT 1 FROM {} WHERE item_id = ?1",
            class.table()
        ))?;
        Ok(stmt.exists(params![item_id])?)
    }

    /// 记录条目已处理；重复插入返回 Duplicate
    pub fn mark_handled(&self, class: ItemClass, item_id: &str) -> Result<(), LedgerError> {
        let conn = self.conn.lock().unwrap();
        let result = conn.execute(
            &format!(
                "INSERT INTO {} (item_id, handled_at) VALUES (?1, ?2)",
                class.table()
            ),
            params![item_id, chrono::Utc::now()],
        );
        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(LedgerError::Duplicate(item_id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_then_has_handled() {
        let store = DedupStore::open_in_memory().unwrap();
        assert!(!store.has_handled(ItemClass::Comment, "c1").unwrap());
        store.mark_handled(ItemClass::Comment, "c1").unwrap();
        assert!(store.has_handled(ItemClass::Comment, "c1").unwrap());
    }

    #[test]
    fn test_duplicate_insert_is_distinguishable() {
        let store = DedupStore::open_in_memory().unwrap();
        store.mark_handled(ItemClass::Comment, "c1").unwrap();
        // 第二次插入：冲突可识别，且不会产生第二条记录
        match store.mark_handled(ItemClass::Comment, "c1") {
            Err(LedgerError::Duplicate(id)) => assert_eq!(id, "c1"),
            other => panic!("expected Duplicate, got {other:?}"),
        }
        assert!(store.has_handled(ItemClass::Comment, "c1").unwrap());
    }

    #[test]
    fn test_classes_are_independent_namespaces() {
        let store = DedupStore::open_in_memory().unwrap();
        store.mark_handled(ItemClass::Comment, "x").unwrap();
        assert!(!store.has_handled(ItemClass::DirectMessage, "x").unwrap());
        // 同一 id 在另一类别里可以正常插入
        store.mark_handled(ItemClass::DirectMessage, "x").unwrap();
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/hornet.db");
        let store = DedupStore::open(&path).unwrap();
        store.mark_handled(ItemClass::Comment, "c1").unwrap();
        assert!(path.exists());
    }
}
