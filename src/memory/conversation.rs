//! 规划对话记忆
//!
//! 规划 LLM 在同一 session 内的多轮对话：保留最近 N 条消息，超出时剪枝；按 session id 分桶，桶数有上限。

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

/// 消息角色（与 LLM API 一致）
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// 单条消息
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// 最近 max_messages 条消息，超出时丢弃最旧的
#[derive(Clone, Debug)]
pub struct ConversationMemory {
    messages: Vec<Message>,
    max_messages: usize,
}

impl ConversationMemory {
    pub fn new(max_messages: usize) -> Self {
        Self {
            messages: Vec::new(),
            max_messages,
        }
    }

    pub fn push(&mut self, msg: Message) {
        self.messages.push(msg);
        self.prune();
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    fn prune(&mut self) {
        if self.messages.len() > self.max_messages {
            let excess = self.messages.len() - self.max_messages;
            self.messages.drain(..excess);
        }
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// 默认最多保留的 session 数
pub const DEFAULT_MAX_SESSIONS: usize = 1024;

#[derive(Debug)]
struct SessionSlot {
    memory: ConversationMemory,
    /// 最近一次写入的序号，用于淘汰最久未用的 session
    last_used: u64,
}

#[derive(Debug, Default)]
struct Buckets {
    slots: HashMap<String, SessionSlot>,
    tick: u64,
}

/// 按 session id 分桶的对话记忆；同一 session 的读写由锁串行化。
/// session 数超过 max_sessions 时淘汰最久未写入的那个。
#[derive(Debug)]
pub struct SessionConversations {
    buckets: Mutex<Buckets>,
    max_messages: usize,
    max_sessions: usize,
}

impl SessionConversations {
    pub fn new(max_messages: usize) -> Self {
        Self {
            buckets: Mutex::new(Buckets::default()),
            max_messages,
            max_sessions: DEFAULT_MAX_SESSIONS,
        }
    }

    pub fn with_max_sessions(mut self, max_sessions: usize) -> Self {
        self.max_sessions = max_sessions.max(1);
        self
    }

    /// 当前保留的历史消息（不存在则为空）
    pub async fn messages(&self, session_id: &str) -> Vec<Message> {
        self.buckets
            .lock()
            .await
            .slots
            .get(session_id)
            .map(|slot| slot.memory.messages().to_vec())
            .unwrap_or_default()
    }

    pub async fn session_count(&self) -> usize {
        self.buckets.lock().await.slots.len()
    }

    /// 记录一轮问答
    pub async fn record_turn(&self, session_id: &str, user: Message, assistant: Message) {
        let mut buckets = self.buckets.lock().await;
        buckets.tick += 1;
        let tick = buckets.tick;

        if !buckets.slots.contains_key(session_id) && buckets.slots.len() >= self.max_sessions {
            let oldest = buckets
                .slots
                .iter()
                .min_by_key(|(_, slot)| slot.last_used)
                .map(|(id, _)| id.clone());
            if let Some(id) = oldest {
                tracing::debug!(session_id = %id, "Evicting planning conversation");
                buckets.slots.remove(&id);
            }
        }

        let max_messages = self.max_messages;
        let slot = buckets
            .slots
            .entry(session_id.to_string())
            .or_insert_with(|| SessionSlot {
                memory: ConversationMemory::new(max_messages),
                last_used: tick,
            });
        slot.last_used = tick;
        slot.memory.push(user);
        slot.memory.push(assistant);
    }
}
