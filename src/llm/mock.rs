//! Mock / Scripted LLM 客户端（用于测试与无 API Key 的本地演示）
//!
//! - MockLlmClient：规划阶段返回单步 echo 计划；执行阶段先调用 echo，拿到 Observation 后输出成功结果。
//! - ScriptedLlmClient：按顺序返回预设回复，并记录每次收到的消息，便于断言上下文内容。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{LlmClient, LlmError};
use crate::memory::{Message, Role};

/// Mock 客户端：无需网络即可跑通 plan -> act -> finish
#[derive(Debug, Default)]
pub struct MockLlmClient;

fn last_user(messages: &[Message]) -> &str {
    messages
        .iter()
        .rev()
        .find(|m| m.role == Role::User)
        .map(|m| m.content.as_str())
        .unwrap_or("(no input)")
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        let input = last_user(messages);

        if let Some(observation) = input.strip_prefix("Observation from echo: ") {
            return Ok(serde_json::json!({
                "success": true,
                "message": "Echo completed",
                "content": observation,
            })
            .to_string());
        }

        if input.contains("### Current Step") {
            let request = input
                .lines()
                .skip_while(|l| !l.starts_with("### User Request"))
                .nth(1)
                .unwrap_or("(empty)")
                .trim();
            return Ok(serde_json::json!({
                "tool": "echo",
                "args": { "text": format!("Echo from Mock: {request}") },
            })
            .to_string());
        }

        let request = input
            .lines()
            .next()
            .and_then(|l| l.strip_prefix("User Request: "))
            .unwrap_or(input)
            .trim();
        let plan = serde_json::json!({
            "execution_plan": {
                "overall_description": format!("Echo the request: {request}"),
                "steps": [{
                    "action_description": "Echo the user request",
                    "tool": { "name": "echo", "params": { "text": request } },
                    "status": "pending"
                }]
            }
        });
        Ok(format!("```json\n{plan:#}\n```"))
    }
}

/// 按顺序返回预设回复；脚本耗尽后返回 Request 错误
#[derive(Debug, Default)]
pub struct ScriptedLlmClient {
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    calls: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedLlmClient {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(|r| Ok(r.into())).collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// 追加一条回复（可以是错误）
    pub fn push(&self, reply: Result<String, LlmError>) {
        if let Ok(mut q) = self.replies.lock() {
            q.push_back(reply);
        }
    }

    /// 已收到的所有调用（每次调用的完整消息列表）
    pub fn calls(&self) -> Vec<Vec<Message>> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn remaining(&self) -> usize {
        self.replies.lock().map(|q| q.len()).unwrap_or(0)
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(messages.to_vec());
        }
        self.replies
            .lock()
            .map_err(|e| LlmError::Request(e.to_string()))?
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::Request("script exhausted".to_string())))
    }
}
