//! 编排错误类型
//!
//! LLM / 工具失败、超时与取消、步骤结算错误；TaskCoordinator 在单步边界把它们转为 Aborted。
//! 无法解析的规划输出与步骤回复不是错误：分别表现为 PlanDecode::Unstructured 与合成的失败 StepResult。

use thiserror::Error;

use crate::llm::LlmError;

/// 任务运行过程中可能出现的错误
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("LLM error: {0}")]
    LlmError(#[from] LlmError),

    #[error("Tool execution failed: {0}")]
    ToolExecutionFailed(String),

    #[error("Tool timeout: {0}")]
    ToolTimeout(String),

    #[error("Hallucinated tool: {0}")]
    HallucinatedTool(String),

    /// 单次 completion 调用超过 act.step_timeout_secs
    #[error("Step timed out after {0}s")]
    StepTimeout(u64),

    #[error("Cancelled")]
    Cancelled,

    #[error("Step index {index} out of range (plan has {len} steps)")]
    StepIndexOutOfRange { index: usize, len: usize },

    #[error("Step {0} already settled")]
    StepAlreadySettled(usize),

    #[error("Session store error: {0}")]
    SessionStore(String),
}

/// 中止原因码，随 error 事件下发，供调用方区分失败类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortCode {
    /// 步骤报告 success=false（含无法解析的回复）
    StepFailed,
    /// 执行步骤时抛出错误
    StepError,
    /// 规划阶段 LLM 调用失败
    PlanError,
    Cancelled,
    Timeout,
}

impl AgentError {
    /// 单步边界上把错误映射为中止原因码
    pub fn abort_code(&self) -> AbortCode {
        match self {
            AgentError::Cancelled => AbortCode::Cancelled,
            AgentError::StepTimeout(_) | AgentError::ToolTimeout(_) => AbortCode::Timeout,
            _ => AbortCode::StepError,
        }
    }

    /// 规划阶段的原因码：取消与超时照常，其余为 PlanError
    pub fn plan_abort_code(&self) -> AbortCode {
        match self.abort_code() {
            AbortCode::StepError => AbortCode::PlanError,
            code => code,
        }
    }
}
