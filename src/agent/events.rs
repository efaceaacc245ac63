//! 任务流事件：序列化为 JSON 推送给前端（每个传输单元一个对象）

use serde::Serialize;
use serde_json::Value;

use crate::agent::types::{Plan, StepResult, StepStatus, ToolInvocation};
use crate::core::AbortCode;

/// todo 列表项状态（前端展示用）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoStatus {
    Pending,
    /// 快照在任何步骤开始前生成，因此不会出现；保留给前端枚举
    InProgress,
    Completed,
}

impl From<StepStatus> for TodoStatus {
    fn from(status: StepStatus) -> Self {
        match status {
            StepStatus::Success => TodoStatus::Completed,
            StepStatus::Pending | StepStatus::Failed => TodoStatus::Pending,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TodoItem {
    pub id: usize,
    pub description: String,
    pub status: TodoStatus,
    pub tool: ToolInvocation,
    pub output: String,
}

/// 单个流事件
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// 文本提示（开始规划 / 未生成计划）
    Content { content: String },
    /// 计划快照，每个任务只发一次
    TodoProgress {
        items: Vec<TodoItem>,
        overall_description: String,
    },
    /// 开始执行某一步（step 为 1-based）
    ToolStart { tool: String, step: usize },
    /// 某一步执行结束
    ToolEnd { result: StepResult, step: usize },
    /// 任务中止
    Error { content: String, code: AbortCode },
    /// 任务完成
    Finish { session_id: String },
}

impl StreamEvent {
    pub fn content(text: impl Into<String>) -> Self {
        StreamEvent::Content {
            content: text.into(),
        }
    }

    /// 由计划生成 todo_progress 快照
    pub fn todo_progress(plan: &Plan) -> Self {
        let items = plan
            .steps
            .iter()
            .map(|s| TodoItem {
                id: s.index,
                description: s.action_description.clone(),
                status: s.status.into(),
                tool: s.tool.clone(),
                output: s.output.clone().unwrap_or_default(),
            })
            .collect();
        StreamEvent::TodoProgress {
            items,
            overall_description: plan.overall_description.clone(),
        }
    }

    /// error / finish 之后不再有事件
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Error { .. } | StreamEvent::Finish { .. })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            StreamEvent::Content { .. } => "content",
            StreamEvent::TodoProgress { .. } => "todo_progress",
            StreamEvent::ToolStart { .. } => "tool_start",
            StreamEvent::ToolEnd { .. } => "tool_end",
            StreamEvent::Error { .. } => "error",
            StreamEvent::Finish { .. } => "finish",
        }
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
