//! 工具层：注册表、执行器、输出格式 Schema；具体业务工具由外部注册

pub mod echo;
pub mod executor;
pub mod registry;
pub mod schema;

pub use echo::EchoTool;
pub use executor::ToolExecutor;
pub use registry::{Tool, ToolDescriptor, ToolRegistry};
pub use schema::{step_result_schema_json, tool_call_schema_json};
