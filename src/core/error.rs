//! 错误类型与恢复动作
//!
//! 按来源划分：配置（构建期立即失败）、分发（未知工具标识）、工具执行、Agent 循环、任务生命周期、评估。
//! 与 RecoveryEngine 配合：AgentError 决定 RetryWithPrompt / ReportToModel / Abort。

use thiserror::Error;

use crate::llm::LlmError;
use crate::tasks::TaskStatus;

/// 配置错误：未知 toolkit / agent 配置、字段取值非法、依赖缺失；构建期即失败，不会推迟到运行期
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Unknown toolkit: {0}")]
    UnknownToolkit(String),

    #[error("Unknown agent config: {0}")]
    UnknownAgentConfig(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("Toolkit {toolkit} requires missing dependency {dependency}")]
    MissingDependency { toolkit: String, dependency: String },

    #[error("Duplicate tool name: {0}")]
    DuplicateTool(String),

    #[error("Dependency initialization failed ({dependency}): {reason}")]
    DependencyInit { dependency: String, reason: String },

    #[error("Config load failed: {0}")]
    Load(String),
}

/// 分发错误：调用方或模型请求了不存在的工具标识
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Duplicate tool name: {0}")]
    DuplicateTool(String),
}

/// 单次工具调用失败；在 Agent 循环中作为 Observation 回传给模型，不破坏任务状态
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    #[error("Tool execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Tool timeout: {0}")]
    Timeout(String),

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("Search failed: {0}")]
    Search(String),

    #[error("Path escape attempt: {0}")]
    PathEscape(String),
}

/// Agent 运行过程中可能出现的错误
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("JSON parse error: {0}")]
    JsonParseError(String),

    #[error("Maximum iterations ({max_iterations}) reached without completion")]
    MaxIterationsExceeded { max_iterations: usize },

    #[error("Agent already completed")]
    AlreadyCompleted,

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// 任务生命周期错误
#[derive(Error, Debug)]
pub enum TaskError {
    #[error("Task {0} is already registered")]
    DuplicateTask(String),

    #[error("Task {0} not found")]
    NotFound(String),

    #[error("Invalid task transition {from:?} -> {to:?}")]
    InvalidTransition { from: TaskStatus, to: TaskStatus },

    #[error("Task environment error: {0}")]
    Environment(String),

    #[error("Task execution failed: {0}")]
    Execution(#[from] AgentError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// 评估错误：任务执行失败，或单个评估器无法处理对话轨迹
#[derive(Error, Debug)]
pub enum EvalError {
    #[error("Task execution failed before evaluation: {0}")]
    Execution(#[from] TaskError),

    #[error("Evaluator {evaluator} failed: {reason}")]
    Evaluator { evaluator: String, reason: String },

    #[error("Task {0} has no conversation trace")]
    MissingTrace(String),
}

/// 恢复引擎根据错误类型给出的建议动作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryAction {
    /// 将提示注入下一轮，让 LLM 重试（如 JSON 格式错误）
    RetryWithPrompt(String),
    /// 把错误作为工具结果回传给模型，循环继续
    ReportToModel(String),
    /// 终止当前运行并向调用方返回错误
    Abort,
}
