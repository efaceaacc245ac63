//! Plan / Act 两阶段：数据模型、结构化输出提取、规划器、单步执行器、流事件

pub mod actor;
pub mod events;
pub mod extract;
pub mod planner;
pub mod types;

pub use actor::{StepExecutor, ToolCallBudget, DEFAULT_ACT_PROMPT};
pub use events::{StreamEvent, TodoItem, TodoStatus};
pub use extract::{decode_plan, decode_step_result, extract_json, ExtractError, PlanDecode, ToolCall};
pub use planner::{Planner, DEFAULT_PLAN_PROMPT};
pub use types::{
    ExecutionHistoryEntry, OutputPath, Plan, Step, StepResult, StepResults, StepStatus,
    ToolInvocation,
};
