//! 错误恢复引擎
//!
//! 根据 AgentError 类型返回 RecoveryAction，供 Agent 循环决定是重试、把错误回传给模型还是终止。

use crate::core::{AgentError, RecoveryAction};

/// 语义化错误恢复：将错误映射为可执行动作（重试提示 / 回传模型 / 终止）
#[derive(Debug, Default)]
pub struct RecoveryEngine;

impl RecoveryEngine {
    pub fn new() -> Self {
        Self
    }

    /// 未知工具必须大声失败；工具自身的失败只影响本轮 Observation
    pub fn handle(&self, err: &AgentError) -> RecoveryAction {
        match err {
            AgentError::JsonParseError(raw) => RecoveryAction::RetryWithPrompt(format!(
                "Your previous reply could not be parsed as a tool call: {raw}. \
                 To call a tool, reply with exactly one JSON object of the form \
                 {{\"tool\": \"<tool name>\", \"args\": {{\"query\": \"...\"}}}}. \
                 To finish, reply with plain text only."
            )),
            AgentError::Tool(e) => RecoveryAction::ReportToModel(format!("Error: {e}")),
            _ => RecoveryAction::Abort,
        }
    }
}
