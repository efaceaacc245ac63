//! Echo 工具：本地演示与测试用，按工具响应格式回显文本

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::tools::Tool;

pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echo text back as the tool result (for testing)."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": { "text": { "type": "string", "description": "Text to echo" } },
            "required": ["text"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let text = args
            .get("text")
            .and_then(|v| v.as_str())
            .ok_or_else(|| "missing required argument: text".to_string())?;
        Ok(json!({
            "success": true,
            "message": "Echo completed",
            "content": text,
        })
        .to_string())
    }
}
