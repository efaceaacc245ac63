//! 执行阶段输出格式的 JSON Schema（schemars 生成），拼入 act system prompt，减少 LLM 输出格式错误

use std::collections::HashMap;

use schemars::{schema_for, JsonSchema};

/// 工具调用请求格式：与 parse_tool_call 解析的 `{"tool": "...", "args": {...}}` 一致（仅用于 Schema 生成）
#[allow(dead_code)]
#[derive(JsonSchema)]
struct ToolCallFormat {
    /// 工具名，必须是可用工具之一
    pub tool: String,
    /// 工具参数，依工具 parameters schema 而定
    pub args: HashMap<String, serde_json::Value>,
}

/// 输出路径：单个文件或多个文件
#[allow(dead_code)]
#[derive(JsonSchema)]
#[serde(untagged)]
enum OutputPathFormat {
    One(String),
    Many(Vec<String>),
}

/// 步骤结果格式：工具执行完成后必须输出的对象（仅用于 Schema 生成）
#[allow(dead_code)]
#[derive(JsonSchema)]
struct StepResultFormat {
    /// 当前步骤是否成功
    pub success: bool,
    /// 简短说明，如 "Image generated successfully."
    pub message: String,
    /// 工具执行结果内容，如生成图片的 URL
    pub content: serde_json::Value,
    /// 工具输出文件路径
    pub output_path: Option<OutputPathFormat>,
}

pub fn tool_call_schema_json() -> String {
    let schema = schema_for!(ToolCallFormat);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}

pub fn step_result_schema_json() -> String {
    let schema = schema_for!(StepResultFormat);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schemas_name_required_fields() {
        let tool = tool_call_schema_json();
        assert!(tool.contains("\"tool\"") && tool.contains("\"args\""));
        let result = step_result_schema_json();
        assert!(result.contains("\"success\"") && result.contains("\"output_path\""));
    }
}
