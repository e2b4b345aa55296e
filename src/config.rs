//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `AUTOMATA__*` 覆盖（双下划线表示嵌套，如 `AUTOMATA__LLM__PROVIDER=openai`）。

use std::path::PathBuf;

use serde::Deserialize;

use crate::core::ConfigError;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub llm: LlmSection,
    pub agent: AgentSection,
    pub tools: ToolsSection,
    pub tasks: TasksSection,
}

/// [llm] 段：后端选择与默认调用参数
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// 后端：openai / mock；openai 需要 OPENAI_API_KEY
    pub provider: String,
    pub model: String,
    pub base_url: Option<String>,
    pub temperature: f32,
    pub stream: bool,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4".to_string(),
            base_url: None,
            temperature: 0.7,
            stream: false,
        }
    }
}

/// [agent] 段：默认 agent 配置名与迭代上限
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentSection {
    pub config_name: String,
    pub max_iterations: usize,
    pub verbose: bool,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            config_name: "automata-main".to_string(),
            max_iterations: 50,
            verbose: false,
        }
    }
}

/// [tools] 段：工具超时与代码搜索参数
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsSection {
    /// 单次工具调用超时（秒）
    pub tool_timeout_secs: u64,
    pub search: SearchSection,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            tool_timeout_secs: 30,
            search: SearchSection::default(),
        }
    }
}

/// [tools.search] 段：索引根目录、文件过滤与结果截断
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchSection {
    /// 被索引的项目根目录，未设置时用当前目录
    pub project_root: Option<PathBuf>,
    /// 文件名 glob，如 "*.rs"
    pub include: String,
    pub max_files: usize,
    pub top_n: usize,
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            project_root: None,
            include: "*.rs".to_string(),
            max_files: 5000,
            top_n: 20,
        }
    }
}

/// [tasks] 段：任务执行环境的工作目录
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TasksSection {
    /// 未设置时用 ./workspace/tasks
    pub workspace_root: Option<PathBuf>,
}

impl AppConfig {
    pub fn project_root(&self) -> PathBuf {
        self.tools
            .search
            .project_root
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn tasks_root(&self) -> PathBuf {
        self.tasks
            .workspace_root
            .clone()
            .unwrap_or_else(|| PathBuf::from("workspace").join("tasks"))
    }
}

/// 从 config 目录加载配置，环境变量 AUTOMATA__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml，找到则作为第一源
/// 2. 若传入 config_path，则追加该文件（文件不存在时报错）
/// 3. 最后叠加环境变量 AUTOMATA__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, ConfigError> {
    let mut builder = config::Config::builder();

    for name in ["config/default", "../config/default"] {
        if std::path::Path::new(&format!("{}.toml", name)).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(path) = config_path {
        builder = builder.add_source(config::File::from(path).required(true));
    }

    builder = builder.add_source(
        config::Environment::with_prefix("AUTOMATA")
            .separator("__")
            .try_parsing(true),
    );

    builder
        .build()
        .and_then(|c| c.try_deserialize())
        .map_err(|e| ConfigError::Load(e.to_string()))
}
