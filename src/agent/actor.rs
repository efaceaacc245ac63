//! StepExecutor：执行计划中的单个步骤
//!
//! 执行 LLM 在文本里请求工具（`{"tool": ..., "args": ...}`），本模块解析后经 ToolExecutor 调用，
//! 把 Observation 追加回对话，直到 LLM 给出最终的 StepResult。是否中止整个计划由 TaskCoordinator 决定。

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::agent::extract::{decode_step_result, extract_json, parse_tool_call};
use crate::agent::{Plan, Step, StepResult, StepResults};
use crate::core::AgentError;
use crate::llm::{complete_guarded, LlmClient};
use crate::memory::Message;
use crate::tools::{step_result_schema_json, tool_call_schema_json, ToolExecutor};

/// 内置执行 prompt（可被 prompt_dir/act.txt 覆盖）
pub const DEFAULT_ACT_PROMPT: &str = r#"You are an execution assistant. You carry out exactly one step of a larger plan by calling tools.

To call a tool, reply with only a JSON object: {"tool": "<tool name>", "args": {...}}.
The tool output is sent back to you as "Observation from <tool>: ...".
When the current step is done (or cannot be done), reply with a JSON object in a ```json code block:
{"success": "True/False", "message": "short summary", "content": "tool result content", "output_path": "path or list of paths"}"#;

/// 单个任务内所有步骤共享的工具调用额度
#[derive(Debug, Clone)]
pub struct ToolCallBudget {
    limit: usize,
    used: usize,
}

impl ToolCallBudget {
    pub fn new(limit: usize) -> Self {
        Self { limit, used: 0 }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn used(&self) -> usize {
        self.used
    }

    pub fn remaining(&self) -> usize {
        self.limit.saturating_sub(self.used)
    }

    /// 消耗一次额度；已用尽返回 false
    pub fn try_consume(&mut self) -> bool {
        if self.used >= self.limit {
            return false;
        }
        self.used += 1;
        true
    }
}

pub struct StepExecutor {
    llm: Arc<dyn LlmClient>,
    tools: ToolExecutor,
    system_prompt: String,
    timeout_secs: u64,
}

impl StepExecutor {
    /// act_prompt 后拼接工具目录与两种输出格式的 JSON Schema
    pub fn new(llm: Arc<dyn LlmClient>, tools: ToolExecutor, act_prompt: &str) -> Self {
        let system_prompt = format!(
            "{act_prompt}\n\n## Available tools\n{}\n\n## Tool call format\n{}\n\n## Step result format\n{}",
            tools.registry().to_schema_json(),
            tool_call_schema_json(),
            step_result_schema_json(),
        );
        Self {
            llm,
            tools,
            system_prompt,
            timeout_secs: 600,
        }
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn tools(&self) -> &ToolExecutor {
        &self.tools
    }

    /// 当前步骤的执行上下文
    pub fn build_context(
        step: &Step,
        user_request: &str,
        plan: &Plan,
        completed: &StepResults,
    ) -> String {
        let pretty = |v: serde_json::Result<String>| v.unwrap_or_default();
        format!(
            "### User Request\n{user_request}\n\n\
             ### Whole Plan\n{}\n\n\
             ### Completed Steps\n{}\n\n\
             ### Current Step\n{}\n\n\
             You can only perform the tasks specified in the current step.",
            pretty(serde_json::to_string_pretty(plan)),
            pretty(serde_json::to_string_pretty(completed)),
            pretty(serde_json::to_string_pretty(step)),
        )
    }

    /// 执行一步：工具循环直到 LLM 给出最终结果
    ///
    /// 最终回复无法提取时合成失败结果；取消、超时与幻觉工具以 Err 返回。
    pub async fn execute_step(
        &self,
        step: &Step,
        user_request: &str,
        plan: &Plan,
        completed: &StepResults,
        budget: &mut ToolCallBudget,
        cancel: &CancellationToken,
    ) -> Result<StepResult, AgentError> {
        let mut messages = vec![
            Message::system(self.system_prompt.clone()),
            Message::user(Self::build_context(step, user_request, plan, completed)),
        ];

        loop {
            let raw = complete_guarded(self.llm.as_ref(), &messages, cancel, self.timeout_secs).await?;

            let map = match extract_json(&raw) {
                Ok(map) => map,
                Err(e) => {
                    tracing::warn!(step = step.number(), "Step output not extractable ({}), marking failed", e);
                    return Ok(StepResult::failed(raw));
                }
            };

            let Some(call) = parse_tool_call(&map) else {
                return Ok(match decode_step_result(&raw) {
                    Ok(result) => result,
                    Err(e) => {
                        tracing::warn!(step = step.number(), "Step result malformed: {}", e);
                        StepResult::failed(raw)
                    }
                });
            };

            if !budget.try_consume() {
                tracing::warn!(step = step.number(), limit = budget.limit(), "Tool call limit reached");
                return Ok(StepResult::failed(format!(
                    "Tool call limit ({}) reached",
                    budget.limit()
                )));
            }

            tracing::info!(step = step.number(), tool = %call.tool, "Calling tool");
            let observation = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(AgentError::Cancelled),
                res = self.tools.execute(&call.tool, call.args) => match res {
                    Ok(out) => out,
                    Err(e @ AgentError::HallucinatedTool(_)) => return Err(e),
                    Err(e) => {
                        tracing::warn!(step = step.number(), tool = %call.tool, "Tool failed: {}", e);
                        format!("Error: {e}")
                    }
                },
            };

            messages.push(Message::assistant(raw));
            messages.push(Message::user(format!(
                "Observation from {}: {}",
                call.tool, observation
            )));
        }
    }
}
