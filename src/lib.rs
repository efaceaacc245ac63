//! plan-act：两阶段（规划 / 执行）任务协调器
//!
//! 模块划分：
//! - **agent**: 数据模型、结构化输出提取、Planner、StepExecutor、流事件
//! - **config**: 应用配置加载（TOML + 环境变量）与 prompt 文件
//! - **core**: TaskCoordinator 状态机、事件流、会话监管、错误类型
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Mock / Scripted）
//! - **memory**: 每个 session 的规划对话
//! - **observability**: tracing 初始化
//! - **session**: 执行历史存储（内存 / 可选 SQLite）
//! - **tools**: 工具注册表、执行器、输出格式 Schema

pub mod agent;
pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod session;
pub mod tools;

pub use crate::core::{TaskCoordinator, TaskOutcome, TaskStream};
