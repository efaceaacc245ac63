//! 计划与执行结果的数据模型
//!
//! Plan 由 Planner 创建一次；Step 只由 update_step 原地修改，数量与顺序在整个任务运行期间不变。

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::core::AgentError;

/// 步骤状态：Pending 只能迁移一次到 Success / Failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    #[default]
    Pending,
    Success,
    Failed,
}

impl StepStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StepStatus::Pending)
    }
}

/// 步骤要调用的工具：名称 + 参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ToolInvocation {
    #[serde(default)]
    pub name: String,
    #[serde(default, alias = "parameters", alias = "args")]
    pub params: Map<String, Value>,
}

/// 计划中的单个步骤
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// 0-based，创建后不变
    pub index: usize,
    pub action_description: String,
    pub tool: ToolInvocation,
    pub status: StepStatus,
    pub output: Option<String>,
}

impl Step {
    pub fn new(index: usize, action_description: impl Into<String>, tool: ToolInvocation) -> Self {
        Self {
            index,
            action_description: action_description.into(),
            tool,
            status: StepStatus::Pending,
            output: None,
        }
    }

    /// 1-based 步骤编号（日志、事件与结果表的键）
    pub fn number(&self) -> usize {
        self.index + 1
    }

    fn settle(&mut self, status: StepStatus, output: String) -> Result<(), AgentError> {
        if self.status.is_terminal() {
            return Err(AgentError::StepAlreadySettled(self.number()));
        }
        self.status = status;
        self.output = Some(output);
        Ok(())
    }
}

/// 执行计划
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub overall_description: String,
    pub steps: Vec<Step>,
}

impl Plan {
    pub fn new(overall_description: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            overall_description: overall_description.into(),
            steps,
        }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// 把一步的执行结果写回计划。
    ///
    /// None 记为 Failed 并写入诊断输出，不向上抛错；越界或重复结算才返回错误。
    pub fn update_step(
        &mut self,
        index: usize,
        result: Option<&StepResult>,
    ) -> Result<StepStatus, AgentError> {
        let len = self.steps.len();
        let step = self
            .steps
            .get_mut(index)
            .ok_or(AgentError::StepIndexOutOfRange { index, len })?;

        let (status, output) = match result {
            None => {
                tracing::error!("step_result is None for step {}", index + 1);
                (StepStatus::Failed, "Step result is None".to_string())
            }
            Some(r) if r.success => (StepStatus::Success, r.output_text()),
            Some(r) => (StepStatus::Failed, r.output_text()),
        };
        step.settle(status, output)?;
        Ok(status)
    }
}

/// 输出路径：单个或多个
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutputPath {
    One(String),
    Many(Vec<String>),
}

impl OutputPath {
    pub fn is_empty(&self) -> bool {
        match self {
            OutputPath::One(p) => p.is_empty(),
            OutputPath::Many(ps) => ps.is_empty(),
        }
    }
}

impl fmt::Display for OutputPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputPath::One(p) => f.write_str(p),
            OutputPath::Many(ps) => f.write_str(&ps.join(", ")),
        }
    }
}

/// 单步执行结果（执行 LLM 的输出契约）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    #[serde(default, deserialize_with = "deserialize_truthy")]
    pub success: bool,
    #[serde(default, deserialize_with = "deserialize_lenient_text")]
    pub message: Option<String>,
    #[serde(default)]
    pub content: Option<Value>,
    #[serde(default, deserialize_with = "deserialize_lenient_path")]
    pub output_path: Option<OutputPath>,
    /// 工具返回的其它字段原样保留
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl StepResult {
    pub fn succeeded(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            content: None,
            output_path: None,
            extra: Map::new(),
        }
    }

    /// 合成失败结果：诊断文本同时放进 message 与 content
    pub fn failed(diagnostic: impl Into<String>) -> Self {
        let diagnostic = diagnostic.into();
        Self {
            success: false,
            content: Some(Value::String(diagnostic.clone())),
            message: Some(diagnostic),
            output_path: None,
            extra: Map::new(),
        }
    }

    pub fn with_output_path(mut self, path: OutputPath) -> Self {
        self.output_path = Some(path);
        self
    }

    /// 写回 Step.output 的文本：output_path > content > "No output"
    pub fn output_text(&self) -> String {
        if let Some(path) = self.output_path.as_ref().filter(|p| !p.is_empty()) {
            return path.to_string();
        }
        match &self.content {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::Null) | None => "No output".to_string(),
            Some(Value::String(_)) => "No output".to_string(),
            Some(other) => other.to_string(),
        }
    }
}

/// success 字段接受 bool 或 "True"/"true" 字符串；其它值一律视为失败
fn deserialize_truthy<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Bool(b) => b,
        Value::String(s) => s.trim().eq_ignore_ascii_case("true"),
        Value::Number(n) => n.as_i64() == Some(1),
        _ => false,
    })
}

/// 标量转文本；null 与对象 / 数组之外的值都不会让整条结果解析失败
fn scalar_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

/// message 接受任意 JSON 值：字符串原样，其它值取其 JSON 文本
fn deserialize_lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(scalar_text(Value::deserialize(deserializer)?))
}

/// output_path 接受字符串或列表；列表中的非字符串元素转为文本，其它形状视为缺失
fn deserialize_lenient_path<'de, D>(deserializer: D) -> Result<Option<OutputPath>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(p) => Some(OutputPath::One(p)),
        Value::Array(items) => Some(OutputPath::Many(
            items.into_iter().filter_map(scalar_text).collect(),
        )),
        Value::Null => None,
        other => {
            tracing::warn!("Ignoring output_path of unexpected shape: {}", other);
            None
        }
    })
}

/// 结果表：1-based 步骤编号 -> StepResult
pub type StepResults = BTreeMap<usize, StepResult>;

/// 一次任务结束后（成功或中止）追加到会话历史的记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionHistoryEntry {
    pub plan: Plan,
    pub results: StepResults,
    pub recorded_at: DateTime<Utc>,
}

impl ExecutionHistoryEntry {
    pub fn new(plan: Plan, results: StepResults) -> Self {
        Self {
            plan,
            results,
            recorded_at: Utc::now(),
        }
    }
}
