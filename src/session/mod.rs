//! 会话历史：SessionStore 抽象、内存实现与可选 SQLite 实现

#[cfg(feature = "async-sqlite")]
pub mod sqlite;
pub mod store;

#[cfg(feature = "async-sqlite")]
pub use sqlite::SqliteSessionStore;
pub use store::{create_session_store, MemorySessionStore, SessionStore};
