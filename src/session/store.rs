//! 执行历史存储抽象
//!
//! 每个 session id 对应一条只追加的 ExecutionHistoryEntry 序列；Planner 读取，TaskCoordinator 在任务结束后追加。
//! 内存实现为每个 session 持有一把独立的锁，同一 session 的并发写入串行化。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use crate::agent::ExecutionHistoryEntry;
use crate::core::AgentError;

/// 会话历史存储接口
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// 按追加顺序返回该 session 的全部记录；未知 session 返回空
    async fn history(&self, session_id: &str) -> Result<Vec<ExecutionHistoryEntry>, AgentError>;

    /// 追加一条记录（记录一经写入不再修改）
    async fn append(&self, session_id: &str, entry: ExecutionHistoryEntry) -> Result<(), AgentError>;
}

type SessionSlot = Arc<Mutex<Vec<ExecutionHistoryEntry>>>;

/// 内存会话历史
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, SessionSlot>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 取得（首次引用时创建）该 session 的槽位
    async fn slot(&self, session_id: &str) -> SessionSlot {
        if let Some(slot) = self.sessions.read().await.get(session_id) {
            return Arc::clone(slot);
        }
        let mut sessions = self.sessions.write().await;
        Arc::clone(sessions.entry(session_id.to_string()).or_default())
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn history(&self, session_id: &str) -> Result<Vec<ExecutionHistoryEntry>, AgentError> {
        let slot = self.sessions.read().await.get(session_id).cloned();
        match slot {
            Some(slot) => Ok(slot.lock().await.clone()),
            None => Ok(Vec::new()),
        }
    }

    async fn append(&self, session_id: &str, entry: ExecutionHistoryEntry) -> Result<(), AgentError> {
        let slot = self.slot(session_id).await;
        slot.lock().await.push(entry);
        Ok(())
    }
}

/// 创建会话历史存储
///
/// 提供 db_path 且启用 async-sqlite feature 时使用 SQLite；否则（或打开失败时）使用内存存储
pub async fn create_session_store(db_path: Option<&std::path::Path>) -> Arc<dyn SessionStore> {
    #[cfg(feature = "async-sqlite")]
    if let Some(path) = db_path {
        match super::sqlite::SqliteSessionStore::open(path).await {
            Ok(store) => {
                tracing::info!("Using SQLite session store: {:?}", path);
                return Arc::new(store);
            }
            Err(e) => {
                tracing::warn!("Failed to open SQLite session store, falling back to memory: {}", e);
            }
        }
    }

    #[cfg(not(feature = "async-sqlite"))]
    if db_path.is_some() {
        tracing::warn!("history_db set but async-sqlite feature not enabled, using memory store");
    }

    tracing::info!("Using in-memory session store");
    Arc::new(MemorySessionStore::new())
}
