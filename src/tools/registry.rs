//! 工具注册表
//!
//! 具体工具（视频生成、剪辑、音频等）由外部实现 Tool trait 并注册；StepExecutor 按名称查找与调用。

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

/// 工具 trait：名称、描述（供 LLM 理解）、参数 schema、异步执行（args 为 JSON）
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// 参数 JSON Schema，默认不限参数
    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String>;
}

/// 工具描述符：{name, description, parameters}
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// 按名称存储 Arc<dyn Tool>；BTreeMap 保证 prompt 中工具顺序稳定
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: impl Tool + 'static) {
        self.register_arc(Arc::new(tool));
    }

    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_some() {
            tracing::warn!("Tool {} registered twice, keeping the latest", name);
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub async fn execute(&self, name: &str, args: Value) -> Result<String, String> {
        let tool = self.tools.get(name).ok_or_else(|| format!("Unknown tool: {name}"))?;
        tool.execute(args).await
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools
            .values()
            .map(|tool| ToolDescriptor {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters_schema(),
            })
            .collect()
    }

    /// 规划 prompt 用的工具列表："- name: description"
    pub fn describe_for_prompt(&self) -> String {
        if self.tools.is_empty() {
            return "No tools available".to_string();
        }
        self.tools
            .values()
            .map(|t| format!("- {}: {}", t.name(), t.description()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// 执行 prompt 用的完整工具 schema
    pub fn to_schema_json(&self) -> String {
        serde_json::to_string_pretty(&self.descriptors()).unwrap_or_else(|_| "[]".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::EchoTool;

    #[tokio::test]
    async fn test_register_and_execute() {
        let mut reg = ToolRegistry::new();
        reg.register(EchoTool);
        assert!(reg.contains("echo"));
        let out = reg
            .execute("echo", serde_json::json!({"text": "hi"}))
            .await
            .unwrap();
        assert!(out.contains("hi"));
        assert!(reg.execute("missing", Value::Null).await.is_err());
    }

    #[test]
    fn test_descriptions() {
        let mut reg = ToolRegistry::new();
        assert_eq!(reg.describe_for_prompt(), "No tools available");
        reg.register(EchoTool);
        assert!(reg.describe_for_prompt().starts_with("- echo: "));
        let schema: Value = serde_json::from_str(&reg.to_schema_json()).unwrap();
        assert_eq!(schema[0]["name"], "echo");
        assert!(schema[0]["parameters"]["properties"]["text"].is_object());
    }
}
