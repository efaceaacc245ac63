//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `PLANACT__*` 覆盖（双下划线表示嵌套，如 `PLANACT__ACT__TOOL_CALL_LIMIT=20`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub plan: PlanSection,
    pub act: ActSection,
    pub tools: ToolsSection,
    pub stream: StreamSection,
}

/// [app] 段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSection {
    pub name: String,
    /// prompt 目录（含 plan.txt / act.txt），未设置时按 config/prompts 查找
    pub prompt_dir: Option<PathBuf>,
    /// 执行历史 SQLite 路径；需启用 async-sqlite feature，未设置时使用内存存储
    pub history_db: Option<PathBuf>,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: "plan-act".to_string(),
            prompt_dir: None,
            history_db: None,
        }
    }
}

/// 模型段：plan 与 act 各一份（[plan.llm] / [act.llm]）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelSection {
    /// openai（任意 OpenAI 兼容端点）或 mock
    pub provider: String,
    pub model: String,
    pub base_url: Option<String>,
    /// 存放 API Key 的环境变量名
    pub api_key_env: String,
}

impl Default for ModelSection {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-5-2025-08-07".to_string(),
            base_url: None,
            api_key_env: "OPENAI_API_KEY".to_string(),
        }
    }
}

/// [plan] 段：规划模型与对话历史条数
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlanSection {
    pub llm: ModelSection,
    /// 同一 session 保留的规划对话消息条数
    pub history_messages: usize,
    /// 规划调用超时（秒）
    pub timeout_secs: u64,
}

impl Default for PlanSection {
    fn default() -> Self {
        Self {
            llm: ModelSection::default(),
            history_messages: 10,
            timeout_secs: 600,
        }
    }
}

/// [act] 段：执行模型、工具调用上限、单次调用超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ActSection {
    pub llm: ModelSection,
    /// 单个任务内最多工具调用次数
    pub tool_call_limit: usize,
    /// 单次 completion 调用超时（秒）
    pub step_timeout_secs: u64,
}

impl Default for ActSection {
    fn default() -> Self {
        Self {
            llm: ModelSection::default(),
            tool_call_limit: 15,
            step_timeout_secs: 600,
        }
    }
}

/// [tools] 段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsSection {
    /// 单次工具调用超时（秒）
    pub tool_timeout_secs: u64,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            tool_timeout_secs: 600,
        }
    }
}

/// [stream] 段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StreamSection {
    /// 事件通道容量（有界，消费者过慢时生产者在发送处等待）
    pub event_buffer: usize,
}

impl Default for StreamSection {
    fn default() -> Self {
        Self { event_buffer: 32 }
    }
}

/// 从 config 目录加载配置，环境变量 PLANACT__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 PLANACT__*
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    for name in ["config/default", "../config/default"] {
        if std::path::Path::new(&format!("{name}.toml")).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(path) = config_path.filter(|p| p.exists()) {
        builder = builder.add_source(config::File::from(path).required(false));
    }

    builder = builder.add_source(
        config::Environment::with_prefix("PLANACT")
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}

/// 读取 prompt 文件：prompt_dir/{name}.txt > config/prompts/{name}.txt > 内置默认
pub fn load_prompt(cfg: &AppConfig, name: &str, fallback: &str) -> String {
    let file = format!("{name}.txt");
    let mut candidates: Vec<PathBuf> = Vec::new();
    if let Some(dir) = &cfg.app.prompt_dir {
        candidates.push(dir.join(&file));
    }
    candidates.push(PathBuf::from("config/prompts").join(&file));
    candidates.push(PathBuf::from("../config/prompts").join(&file));

    candidates
        .into_iter()
        .find_map(|p| std::fs::read_to_string(p).ok())
        .unwrap_or_else(|| fallback.to_string())
}
