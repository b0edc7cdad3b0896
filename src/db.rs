// 本地存储模块
// 基于 SQLite 的同步键值表，相当于浏览器 localStorage，键统一加 upsolve- 前缀

use crate::error::{poisoned, AppResult};
use chrono::Utc;
use rusqlite::{Connection, OpenFlags, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// 本地键名前缀
pub const LOCAL_PREFIX: &str = "upsolve-";

/// 带前缀的本地键名
pub fn local_key(key: &str) -> String {
    format!("{}{}", LOCAL_PREFIX, key)
}

/// 本地同步存储
#[derive(Clone)]
pub struct LocalStore {
    pool: Arc<Mutex<Connection>>,
}

impl LocalStore {
    /// 打开（或创建）磁盘上的本地存储
    pub fn open(db_path: &Path) -> AppResult<Self> {
        // 确保数据目录存在
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open_with_flags(
            db_path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            ",
        )?;

        Self::with_connection(conn)
    }

    /// 内存存储，测试与无持久化场景使用
    pub fn open_in_memory() -> AppResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> AppResult<Self> {
        let store = Self {
            pool: Arc::new(Mutex::new(conn)),
        };
        store.initialize()?;
        Ok(store)
    }

    /// 初始化表结构
    fn initialize(&self) -> AppResult<()> {
        let conn = self.pool.lock().map_err(poisoned)?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS local_storage (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )?;

        Ok(())
    }

    // ==================== 原始键操作 ====================

    /// 读取原始键
    pub fn get_item(&self, name: &str) -> AppResult<Option<String>> {
        let conn = self.pool.lock().map_err(poisoned)?;

        let value = conn
            .query_row(
                "SELECT value FROM local_storage WHERE key = ?",
                rusqlite::params![name],
                |row| row.get::<_, String>(0),
            )
            .optional()?;

        Ok(value)
    }

    /// 写入原始键，已存在则覆盖
    pub fn set_item(&self, name: &str, value: &str) -> AppResult<()> {
        let conn = self.pool.lock().map_err(poisoned)?;
        let now = Utc::now().to_rfc3339();

        conn.execute(
            "INSERT INTO local_storage (key, value, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            rusqlite::params![name, value, now],
        )?;

        Ok(())
    }

    /// 删除原始键，不存在时无操作
    pub fn remove_item(&self, name: &str) -> AppResult<()> {
        let conn = self.pool.lock().map_err(poisoned)?;

        conn.execute(
            "DELETE FROM local_storage WHERE key = ?",
            rusqlite::params![name],
        )?;

        Ok(())
    }

    /// 列出所有原始键
    pub fn keys(&self) -> AppResult<Vec<String>> {
        let conn = self.pool.lock().map_err(poisoned)?;

        let mut stmt = conn.prepare("SELECT key FROM local_storage ORDER BY key")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut keys = Vec::new();
        for row in rows {
            keys.push(row?);
        }

        Ok(keys)
    }

    // ==================== 命名空间操作 ====================

    pub fn get_raw(&self, key: &str) -> AppResult<Option<String>> {
        self.get_item(&local_key(key))
    }

    pub fn set_raw(&self, key: &str, value: &str) -> AppResult<()> {
        self.set_item(&local_key(key), value)
    }

    pub fn remove_raw(&self, key: &str) -> AppResult<()> {
        self.remove_item(&local_key(key))
    }

    /// 仅清除带应用前缀的键
    pub fn clear_namespace(&self) -> AppResult<usize> {
        let conn = self.pool.lock().map_err(poisoned)?;

        let removed = conn.execute(
            "DELETE FROM local_storage WHERE substr(key, 1, ?) = ?",
            rusqlite::params![LOCAL_PREFIX.len() as i64, LOCAL_PREFIX],
        )?;

        Ok(removed)
    }
}
