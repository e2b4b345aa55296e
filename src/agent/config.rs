//! Agent 配置
//!
//! AgentConfigName 对应内置的 system 模板；AgentConfigBuilder 的 setter 只接受正确的类型，
//! 取值范围（temperature、max_iterations 等）在 build() 时统一校验。

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::core::ConfigError;
use crate::tools::{tool_call_schema_json, ToolSpec};

/// 内置 agent 配置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentConfigName {
    Default,
    AutomataMain,
    AutomataRetriever,
    Test,
}

impl AgentConfigName {
    pub const ALL: [AgentConfigName; 4] = [
        AgentConfigName::Default,
        AgentConfigName::AutomataMain,
        AgentConfigName::AutomataRetriever,
        AgentConfigName::Test,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentConfigName::Default => "default",
            AgentConfigName::AutomataMain => "automata-main",
            AgentConfigName::AutomataRetriever => "automata-retriever",
            AgentConfigName::Test => "test",
        }
    }

    /// system 模板，{overview} 与 {tools} 由 InstructionPayload 填充
    pub fn system_template(&self) -> &'static str {
        match self {
            AgentConfigName::Default => {
                "You are a helpful assistant with access to tools.\n\n{overview}\n\nAvailable tools:\n{tools}"
            }
            AgentConfigName::AutomataMain => {
                "You are Automata, an agent that completes programming tasks in a codebase. \
                 Investigate with the tools before answering, one tool call per reply. \
                 When you write code, put it in a fenced code block.\n\n\
                 Codebase overview:\n{overview}\n\nAvailable tools:\n{tools}"
            }
            AgentConfigName::AutomataRetriever => {
                "You are Automata Retriever. Locate the code relevant to the instructions using the search tools \
                 and reply with the symbols and snippets you found.\n\n\
                 Codebase overview:\n{overview}\n\nAvailable tools:\n{tools}"
            }
            AgentConfigName::Test => "Test agent.\n{overview}\n{tools}",
        }
    }
}

impl FromStr for AgentConfigName {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AgentConfigName::ALL
            .into_iter()
            .find(|n| n.as_str() == s.trim())
            .ok_or_else(|| ConfigError::UnknownAgentConfig(s.to_string()))
    }
}

impl fmt::Display for AgentConfigName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 填充 system 模板的内容，按字段结构比较
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstructionPayload {
    pub overview: String,
    /// 为空时由工具列表生成
    pub tools: String,
}

impl InstructionPayload {
    pub fn new(overview: impl Into<String>) -> Self {
        Self {
            overview: overview.into(),
            tools: String::new(),
        }
    }
}

/// 校验后的 agent 配置
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub config_name: AgentConfigName,
    pub model: String,
    pub temperature: f32,
    pub stream: bool,
    pub verbose: bool,
    pub max_iterations: usize,
    pub session_id: String,
    pub instruction_payload: InstructionPayload,
    pub tools: Vec<ToolSpec>,
}

impl AgentConfig {
    pub fn tool_names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name().to_string()).collect()
    }

    /// 渲染 system prompt；有工具时附加调用格式的 JSON Schema
    pub fn system_prompt(&self) -> String {
        let tools = if self.instruction_payload.tools.is_empty() {
            self.tools
                .iter()
                .map(|t| format!("- {}: {}", t.name(), t.description()))
                .collect::<Vec<_>>()
                .join("\n")
        } else {
            self.instruction_payload.tools.clone()
        };
        let mut prompt = self
            .config_name
            .system_template()
            .replace("{overview}", &self.instruction_payload.overview)
            .replace("{tools}", &tools);
        if !self.tools.is_empty() {
            prompt.push_str(
                "\n\nTo call a tool, reply with only a JSON object matching this schema:\n",
            );
            prompt.push_str(&tool_call_schema_json());
            prompt.push_str("\nWhen the task is done, reply with plain text.");
        }
        prompt
    }
}

/// AgentConfig 构建器
///
/// setter 只接受对应类型，类型错误在编译期即被拒绝：
///
/// ```compile_fail
/// use automata::agent::{AgentConfigBuilder, AgentConfigName};
/// let _ = AgentConfigBuilder::from_name(AgentConfigName::Test).with_model(42);
/// ```
///
/// ```compile_fail
/// use automata::agent::{AgentConfigBuilder, AgentConfigName};
/// let _ = AgentConfigBuilder::from_name(AgentConfigName::Test).with_stream("yes");
/// ```
///
/// ```compile_fail
/// use automata::agent::{AgentConfigBuilder, AgentConfigName};
/// let _ = AgentConfigBuilder::from_name(AgentConfigName::Test).with_verbose(1);
/// ```
///
/// ```compile_fail
/// use automata::agent::{AgentConfigBuilder, AgentConfigName};
/// let _ = AgentConfigBuilder::from_name(AgentConfigName::Test).with_max_iterations("ten");
/// ```
///
/// ```compile_fail
/// use automata::agent::{AgentConfigBuilder, AgentConfigName};
/// let _ = AgentConfigBuilder::from_name(AgentConfigName::Test).with_temperature("hot");
/// ```
///
/// ```compile_fail
/// use automata::agent::{AgentConfigBuilder, AgentConfigName};
/// let _ = AgentConfigBuilder::from_name(AgentConfigName::Test).with_session_id(7);
/// ```
///
/// 取值范围在 build() 时检查：
///
/// ```
/// use automata::agent::{AgentConfigBuilder, AgentConfigName};
/// let config = AgentConfigBuilder::from_name(AgentConfigName::Test)
///     .with_model("gpt-3.5-turbo")
///     .with_max_iterations(3)
///     .build()
///     .unwrap();
/// assert_eq!(config.model, "gpt-3.5-turbo");
/// assert!(AgentConfigBuilder::from_name(AgentConfigName::Test).with_temperature(1.5).build().is_err());
/// ```
#[derive(Debug, Clone)]
pub struct AgentConfigBuilder {
    config_name: AgentConfigName,
    model: String,
    temperature: f32,
    stream: bool,
    verbose: bool,
    max_iterations: usize,
    session_id: Option<String>,
    instruction_payload: InstructionPayload,
    tools: Vec<ToolSpec>,
}

impl AgentConfigBuilder {
    pub const DEFAULT_MODEL: &'static str = "gpt-4";
    pub const DEFAULT_TEMPERATURE: f32 = 0.7;
    pub const DEFAULT_MAX_ITERATIONS: usize = 50;

    pub fn from_name(config_name: AgentConfigName) -> Self {
        Self {
            config_name,
            model: Self::DEFAULT_MODEL.to_string(),
            temperature: Self::DEFAULT_TEMPERATURE,
            stream: false,
            verbose: false,
            max_iterations: Self::DEFAULT_MAX_ITERATIONS,
            session_id: None,
            instruction_payload: InstructionPayload::default(),
            tools: Vec::new(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_instruction_payload(mut self, payload: InstructionPayload) -> Self {
        self.instruction_payload = payload;
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolSpec>) -> Self {
        self.tools = tools;
        self
    }

    pub fn build(self) -> Result<AgentConfig, ConfigError> {
        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidField {
                field: "model",
                reason: "must not be empty".to_string(),
            });
        }
        if !self.temperature.is_finite() || !(0.0..=1.0).contains(&self.temperature) {
            return Err(ConfigError::InvalidField {
                field: "temperature",
                reason: format!("{} is outside [0, 1]", self.temperature),
            });
        }
        if self.max_iterations == 0 {
            return Err(ConfigError::InvalidField {
                field: "max_iterations",
                reason: "must be positive".to_string(),
            });
        }
        if let Some(id) = &self.session_id {
            if id.trim().is_empty() {
                return Err(ConfigError::InvalidField {
                    field: "session_id",
                    reason: "must not be empty".to_string(),
                });
            }
        }
        let mut seen = HashSet::new();
        for tool in &self.tools {
            if !seen.insert(tool.name()) {
                return Err(ConfigError::DuplicateTool(tool.name().to_string()));
            }
        }

        Ok(AgentConfig {
            config_name: self.config_name,
            model: self.model,
            temperature: self.temperature,
            stream: self.stream,
            verbose: self.verbose,
            max_iterations: self.max_iterations,
            session_id: self
                .session_id
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            instruction_payload: self.instruction_payload,
            tools: self.tools,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::tool_fn;

    fn tool(name: &str) -> ToolSpec {
        ToolSpec::new(name, "desc", tool_fn(|q| async move { Ok(q) }))
    }

    #[test]
    fn test_defaults() {
        let config = AgentConfigBuilder::from_name(AgentConfigName::AutomataMain)
            .build()
            .unwrap();
        assert_eq!(config.model, "gpt-4");
        assert_eq!(config.temperature, 0.7);
        assert!(!config.stream);
        assert!(!config.verbose);
        assert_eq!(config.max_iterations, 50);
        assert!(uuid::Uuid::parse_str(&config.session_id).is_ok());
    }

    #[test]
    fn test_overrides_reflected_unchanged() {
        let payload = InstructionPayload::new("two modules");
        let config = AgentConfigBuilder::from_name(AgentConfigName::Test)
            .with_model("gpt-3.5-turbo-16k")
            .with_temperature(0.2)
            .with_stream(true)
            .with_verbose(true)
            .with_max_iterations(7)
            .with_session_id("session-42")
            .with_instruction_payload(payload.clone())
            .with_tools(vec![tool("a"), tool("b")])
            .build()
            .unwrap();
        assert_eq!(config.model, "gpt-3.5-turbo-16k");
        assert_eq!(config.temperature, 0.2);
        assert!(config.stream);
        assert!(config.verbose);
        assert_eq!(config.max_iterations, 7);
        assert_eq!(config.session_id, "session-42");
        assert_eq!(config.instruction_payload, payload);
        assert_eq!(config.tool_names(), vec!["a", "b"]);
    }

    #[test]
    fn test_value_ranges() {
        let base = || AgentConfigBuilder::from_name(AgentConfigName::Test);
        for t in [-0.1, 1.01, f32::NAN, f32::INFINITY] {
            assert!(matches!(
                base().with_temperature(t).build(),
                Err(ConfigError::InvalidField { field: "temperature", .. })
            ));
        }
        assert!(base().with_temperature(0.0).build().is_ok());
        assert!(base().with_temperature(1.0).build().is_ok());
        assert!(matches!(
            base().with_max_iterations(0).build(),
            Err(ConfigError::InvalidField { field: "max_iterations", .. })
        ));
        assert!(matches!(
            base().with_model(" ").build(),
            Err(ConfigError::InvalidField { field: "model", .. })
        ));
        assert!(matches!(
            base().with_session_id("").build(),
            Err(ConfigError::InvalidField { field: "session_id", .. })
        ));
    }

    #[test]
    fn test_duplicate_tool_names_rejected() {
        let err = AgentConfigBuilder::from_name(AgentConfigName::Test)
            .with_tools(vec![tool("a"), tool("a")])
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::DuplicateTool("a".to_string()));
    }

    #[test]
    fn test_config_names() {
        for name in AgentConfigName::ALL {
            assert_eq!(name.as_str().parse::<AgentConfigName>().unwrap(), name);
        }
        assert_eq!(
            "automata-writer".parse::<AgentConfigName>().unwrap_err(),
            ConfigError::UnknownAgentConfig("automata-writer".to_string())
        );
    }

    #[test]
    fn test_payload_structural_equality() {
        let a = InstructionPayload::new("overview");
        let mut b = InstructionPayload::new("overview");
        assert_eq!(a, b);
        b.tools = "- x".to_string();
        assert_ne!(a, b);
    }

    #[test]
    fn test_system_prompt_lists_tools() {
        let config = AgentConfigBuilder::from_name(AgentConfigName::Default)
            .with_instruction_payload(InstructionPayload::new("OVERVIEW"))
            .with_tools(vec![tool("exact-search")])
            .build()
            .unwrap();
        let prompt = config.system_prompt();
        assert!(prompt.contains("OVERVIEW"));
        assert!(prompt.contains("- exact-search: desc"));
        assert!(prompt.contains("\"query\""));
    }
}
