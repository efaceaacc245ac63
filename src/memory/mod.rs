//! 记忆层：消息类型与规划对话记忆

pub mod conversation;

pub use conversation::{ConversationMemory, Message, Role, SessionConversations};
