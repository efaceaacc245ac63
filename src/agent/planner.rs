//! Planner：把用户请求拆成有序的工具步骤
//!
//! 上下文 = 用户请求 +（若有）该 session 之前的执行历史；调用规划 LLM（不绑定工具），
//! 用 decode_plan 解析输出。同一 session 的规划对话由 Planner 保留最近若干条，跨调用延续。

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::agent::extract::{decode_plan, PlanDecode};
use crate::agent::ExecutionHistoryEntry;
use crate::core::AgentError;
use crate::llm::{complete_guarded, LlmClient};
use crate::memory::{Message, SessionConversations};
use crate::session::SessionStore;

/// 内置规划 prompt（可被 prompt_dir/plan.txt 覆盖）
pub const DEFAULT_PLAN_PROMPT: &str = r#"You are a planning assistant for video and media tasks.
Decompose the user's request into an ordered list of tool invocations. Each step calls exactly one tool.
Later steps may use the outputs of earlier steps.

Respond with a single JSON object in a ```json code block, in this exact shape:
{
  "execution_plan": {
    "overall_description": "one sentence describing the whole task",
    "steps": [
      {
        "action_description": "what this step does",
        "tool": { "name": "tool_name", "params": { } },
        "status": "pending"
      }
    ]
  }
}
If the request needs no tools, answer in plain text without JSON."#;

pub struct Planner {
    llm: Arc<dyn LlmClient>,
    system_prompt: String,
    store: Arc<dyn SessionStore>,
    conversations: SessionConversations,
    timeout_secs: u64,
}

impl Planner {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        system_prompt: impl Into<String>,
        store: Arc<dyn SessionStore>,
        history_messages: usize,
    ) -> Self {
        Self {
            llm,
            system_prompt: system_prompt.into(),
            store,
            conversations: SessionConversations::new(history_messages),
            timeout_secs: 600,
        }
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn base_system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// 读取会话历史；读失败不致命，按空历史继续
    async fn load_history(&self, session_id: &str) -> Vec<ExecutionHistoryEntry> {
        match self.store.history(session_id).await {
            Ok(h) => h,
            Err(e) => {
                tracing::warn!(session_id, "Session history unavailable, planning without it: {}", e);
                Vec::new()
            }
        }
    }

    /// 规划上下文：用户请求 + 之前的执行结果（仅当历史非空）
    pub async fn build_context(&self, session_id: &str, user_request: &str) -> String {
        let mut context = format!("User Request: {user_request}\n");

        let history = self.load_history(session_id).await;
        if !history.is_empty() {
            let rendered = serde_json::to_string_pretty(&history).unwrap_or_default();
            context.push_str("\n### Previous Execution Results:\n");
            context.push_str(&rendered);
            context.push_str("\n\nPlease consider the above execution results when generating the new plan.\n");
            context.push_str(
                "Note that the new plan steps should only cover the user's latest request and must not contain steps from previous tasks.",
            );
        }
        context
    }

    /// 生成计划：返回 Plan，或无法解析时原样返回 LLM 文本
    pub async fn generate_plan(
        &self,
        session_id: &str,
        user_request: &str,
        cancel: &CancellationToken,
    ) -> Result<PlanDecode, AgentError> {
        let context = self.build_context(session_id, user_request).await;

        let mut messages = vec![Message::system(self.system_prompt.clone())];
        messages.extend(self.conversations.messages(session_id).await);
        messages.push(Message::user(context.clone()));

        let output = complete_guarded(self.llm.as_ref(), &messages, cancel, self.timeout_secs).await?;
        self.conversations
            .record_turn(session_id, Message::user(context), Message::assistant(output.clone()))
            .await;

        let decoded = decode_plan(&output);
        match &decoded {
            PlanDecode::Plan(plan) => {
                tracing::info!(session_id, steps = plan.len(), "Plan generated");
            }
            PlanDecode::Unstructured(_) => {
                tracing::warn!(session_id, "Planner output contains no execution_plan");
            }
        }
        Ok(decoded)
    }
}
