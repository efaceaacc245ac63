//! SQLite 执行历史存储
//!
//! 每条 ExecutionHistoryEntry 以 JSON 存为一行，按自增 id 保持追加顺序；跨进程重启后 Planner 仍能看到历史。

#![cfg(feature = "async-sqlite")]

use std::path::Path;

use async_trait::async_trait;
use sqlx::Row;

use super::store::SessionStore;
use crate::agent::ExecutionHistoryEntry;
use crate::core::AgentError;

pub struct SqliteSessionStore {
    pool: sqlx::sqlite::SqlitePool,
}

impl SqliteSessionStore {
    pub async fn open(db_path: impl AsRef<Path>) -> Result<Self, sqlx::Error> {
        let db_url = format!("sqlite:{}?mode=rwc", db_path.as_ref().display());
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&db_url)
            .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS execution_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                entry TEXT NOT NULL,
                recorded_at TEXT NOT NULL
            )",
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_execution_history_session ON execution_history(session_id)",
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }
}

fn store_err(e: impl std::fmt::Display) -> AgentError {
    AgentError::SessionStore(e.to_string())
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn history(&self, session_id: &str) -> Result<Vec<ExecutionHistoryEntry>, AgentError> {
        let rows = sqlx::query(
            "SELECT entry FROM execution_history WHERE session_id = ? ORDER BY id ASC",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        rows.iter()
            .map(|row| {
                let raw: String = row.get("entry");
                serde_json::from_str(&raw).map_err(store_err)
            })
            .collect()
    }

    async fn append(&self, session_id: &str, entry: ExecutionHistoryEntry) -> Result<(), AgentError> {
        let raw = serde_json::to_string(&entry).map_err(store_err)?;
        sqlx::query(
            "INSERT INTO execution_history (session_id, entry, recorded_at) VALUES (?, ?, ?)",
        )
        .bind(session_id)
        .bind(raw)
        .bind(entry.recorded_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }
}
