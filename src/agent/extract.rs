//! 结构化输出提取
//!
//! LLM 输出是不可信的自由文本。按顺序尝试两种策略，先命中者为准：
//! 1. ```json 代码块中的单个对象
//! 2. 第一个 `{` 到最后一个 `}` 之间的子串
//!
//! 一旦选定候选串，解析失败即视为失败，不再回退到下一策略。提取是纯函数，同一输入结果恒定。

use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::agent::types::{Plan, Step, StepResult, ToolInvocation};

/// 计划对象必须带有的键
pub const PLAN_KEY: &str = "execution_plan";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractError {
    #[error("no JSON structure found")]
    NoStructure,

    #[error("malformed JSON: {0}")]
    Malformed(String),
}

fn fenced_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```json\s*(\{.*?\})\s*```").expect("valid fenced-json regex"))
}

/// 策略 1：```json 代码块内的对象
pub fn fenced_json_block(text: &str) -> Option<&str> {
    fenced_re()
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// 策略 2：第一个 `{` 到最后一个 `}`（含）
pub fn brace_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// 从文本中提取一个 JSON 对象
pub fn extract_json(text: &str) -> Result<Map<String, Value>, ExtractError> {
    let candidate = match fenced_json_block(text) {
        Some(block) => {
            tracing::debug!("Found JSON in code block format");
            block
        }
        None => brace_span(text).ok_or(ExtractError::NoStructure)?,
    };

    match serde_json::from_str::<Value>(candidate) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(ExtractError::Malformed(format!(
            "expected object, got {other}"
        ))),
        Err(e) => Err(ExtractError::Malformed(e.to_string())),
    }
}

/// 计划解码结果：成功得到 Plan，或原样返回不可用的文本
#[derive(Debug, Clone, PartialEq)]
pub enum PlanDecode {
    Plan(Plan),
    Unstructured(String),
}

#[derive(Deserialize)]
struct RawPlan {
    #[serde(default)]
    overall_description: String,
    steps: Vec<RawStep>,
}

#[derive(Deserialize)]
struct RawStep {
    #[serde(default)]
    action_description: Option<String>,
    #[serde(default)]
    tool: ToolInvocation,
}

/// 把规划 LLM 的输出解码为 Plan；缺少 execution_plan、步骤列表为空或不可解码时返回原文
pub fn decode_plan(text: &str) -> PlanDecode {
    let unstructured = || PlanDecode::Unstructured(text.to_string());

    let Ok(mut map) = extract_json(text) else {
        return unstructured();
    };
    let Some(raw) = map.remove(PLAN_KEY) else {
        return unstructured();
    };
    let raw: RawPlan = match serde_json::from_value(raw) {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!("execution_plan present but not decodable: {}", e);
            return unstructured();
        }
    };
    if raw.steps.is_empty() {
        tracing::warn!("execution_plan has no steps");
        return unstructured();
    }

    let steps = raw
        .steps
        .into_iter()
        .enumerate()
        .map(|(i, s)| {
            let description = s
                .action_description
                .unwrap_or_else(|| format!("Step {}", i + 1));
            Step::new(i, description, s.tool)
        })
        .collect();
    PlanDecode::Plan(Plan::new(raw.overall_description, steps))
}

/// 把执行 LLM 的最终回复解码为 StepResult
pub fn decode_step_result(text: &str) -> Result<StepResult, ExtractError> {
    let map = extract_json(text)?;
    serde_json::from_value(Value::Object(map)).map_err(|e| ExtractError::Malformed(e.to_string()))
}

/// 执行阶段 LLM 请求调用的工具（简化 JSON：{"tool": "video_gen", "args": {...}}）
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub tool: String,
    pub args: Value,
}

/// 带非空 "tool" 字符串且没有 "success" 的对象视为工具调用
pub fn parse_tool_call(map: &Map<String, Value>) -> Option<ToolCall> {
    if map.contains_key("success") {
        return None;
    }
    let tool = map.get("tool")?.as_str()?.trim();
    if tool.is_empty() {
        return None;
    }
    let args = map
        .get("args")
        .or_else(|| map.get("arguments"))
        .cloned()
        .unwrap_or_else(|| Value::Object(Map::new()));
    Some(ToolCall {
        tool: tool.to_string(),
        args,
    })
}
