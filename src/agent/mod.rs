//! Agent 运行循环
//!
//! 对话以用户指令为种子，system prompt 在每次请求时拼在最前。
//! 每轮：请求一次完成 → 纯文本则结束；工具调用则按名查找（未知工具直接失败）、执行、
//! 把调用与结果追加为两条消息后继续。超过 max_iterations 仍未完成时报告 MaxIterationsExceeded。

pub mod config;
pub mod parser;

use std::sync::Arc;

use crate::core::{AgentError, DispatchError, RecoveryAction, RecoveryEngine};
use crate::llm::{CompletionParams, LlmClient};
use crate::memory::{Conversation, FunctionCall, Message};
use crate::tools::{ToolExecutor, ToolRegistry};

pub use config::{AgentConfig, AgentConfigBuilder, AgentConfigName, InstructionPayload};
pub use parser::{parse_llm_output, AgentReply, ToolCall};

/// 工具调用默认超时（秒）
pub const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 30;

/// Observation 日志预览最大字符数
const OBSERVATION_PREVIEW_CHARS: usize = 200;

pub struct Agent {
    instructions: String,
    config: AgentConfig,
    llm: Arc<dyn LlmClient>,
    executor: ToolExecutor,
    recovery: RecoveryEngine,
    conversation: Conversation,
    iterations: usize,
    final_response: Option<String>,
}

impl Agent {
    pub fn new(
        instructions: impl Into<String>,
        config: AgentConfig,
        llm: Arc<dyn LlmClient>,
    ) -> Result<Self, AgentError> {
        let instructions = instructions.into();
        let registry = ToolRegistry::from_specs(config.tools.iter().cloned())?;
        let mut conversation = Conversation::new();
        conversation.push(Message::user(instructions.clone()));
        Ok(Self {
            instructions,
            config,
            llm,
            executor: ToolExecutor::new(registry, DEFAULT_TOOL_TIMEOUT_SECS),
            recovery: RecoveryEngine::new(),
            conversation,
            iterations: 0,
            final_response: None,
        })
    }

    pub fn with_tool_timeout(mut self, timeout_secs: u64) -> Self {
        self.executor = ToolExecutor::new(self.executor.registry().clone(), timeout_secs);
        self
    }

    /// 运行直到模型给出纯文本完成；返回最终回复
    pub async fn run(&mut self) -> Result<String, AgentError> {
        if self.is_completed() {
            return Err(AgentError::AlreadyCompleted);
        }
        tracing::info!(
            session_id = %self.config.session_id,
            config = %self.config.config_name,
            model = %self.config.model,
            tools = self.executor.tool_names().len(),
            "Agent run started"
        );
        while self.iterations < self.config.max_iterations {
            if let Some(response) = self.step().await? {
                tracing::info!(
                    session_id = %self.config.session_id,
                    iterations = self.iterations,
                    "Agent completed"
                );
                return Ok(response);
            }
        }
        tracing::warn!(
            session_id = %self.config.session_id,
            max_iterations = self.config.max_iterations,
            "Agent exhausted its iteration budget"
        );
        Err(AgentError::MaxIterationsExceeded {
            max_iterations: self.config.max_iterations,
        })
    }

    /// 执行一轮；完成时返回 Some(最终回复)
    pub async fn step(&mut self) -> Result<Option<String>, AgentError> {
        if self.is_completed() {
            return Err(AgentError::AlreadyCompleted);
        }
        if self.iterations >= self.config.max_iterations {
            return Err(AgentError::MaxIterationsExceeded {
                max_iterations: self.config.max_iterations,
            });
        }
        self.iterations += 1;

        let params = CompletionParams {
            model: Some(self.config.model.clone()),
            temperature: self.config.temperature,
            stream: self.config.stream,
        };
        let reply = self
            .llm
            .complete_text(&self.request_messages(), &params)
            .await?;
        self.trace(format_args!("iteration {} reply: {}", self.iterations, reply));

        match parse_llm_output(&reply) {
            Ok(AgentReply::Completion(text)) => {
                self.conversation.push(Message::assistant(text.clone()));
                self.final_response = Some(text.clone());
                Ok(Some(text))
            }
            Ok(AgentReply::ToolCall(call)) => {
                self.act(reply.trim(), call).await?;
                Ok(None)
            }
            Err(e) => match self.recovery.handle(&e) {
                RecoveryAction::RetryWithPrompt(prompt) => {
                    tracing::warn!(error = %e, "Unparseable reply, asking the model to retry");
                    self.conversation.push(Message::assistant(reply.trim()));
                    self.conversation.push(Message::user(prompt));
                    Ok(None)
                }
                _ => Err(e),
            },
        }
    }

    async fn act(&mut self, raw_reply: &str, call: ToolCall) -> Result<(), AgentError> {
        if self.executor.get_tool(&call.tool).is_none() {
            tracing::warn!(tool = %call.tool, "Model requested an unknown tool");
            return Err(DispatchError::UnknownTool(call.tool).into());
        }
        self.conversation.push(Message::assistant_call(
            raw_reply,
            FunctionCall::new(call.tool.clone(), call.args.clone()),
        ));

        let observation = match self.executor.execute(&call.tool, &call.args).await {
            Ok(output) => output,
            Err(e) => match self.recovery.handle(&e) {
                RecoveryAction::ReportToModel(message) => message,
                _ => return Err(e),
            },
        };
        self.trace(format_args!(
            "{} -> {}",
            call.tool,
            preview(&observation, OBSERVATION_PREVIEW_CHARS)
        ));
        self.conversation
            .push(Message::function(call.tool, observation));
        Ok(())
    }

    /// system prompt + 对话历史
    fn request_messages(&self) -> Vec<Message> {
        let mut messages = Vec::with_capacity(self.conversation.len() + 1);
        messages.push(Message::system(self.config.system_prompt()));
        messages.extend(self.conversation.messages().iter().cloned());
        messages
    }

    fn trace(&self, message: std::fmt::Arguments<'_>) {
        if self.config.verbose {
            tracing::info!(session_id = %self.config.session_id, "{}", message);
        } else {
            tracing::debug!(session_id = %self.config.session_id, "{}", message);
        }
    }

    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn into_conversation(self) -> Conversation {
        self.conversation
    }

    /// 已记录的工具调用（按发生顺序）
    pub fn function_calls(&self) -> Vec<FunctionCall> {
        self.conversation.function_calls().cloned().collect()
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn is_completed(&self) -> bool {
        self.final_response.is_some()
    }

    pub fn final_response(&self) -> Option<&str> {
        self.final_response.as_deref()
    }
}

fn preview(s: &str, max_chars: usize) -> String {
    if s.chars().count() > max_chars {
        format!("{}...", s.chars().take(max_chars).collect::<String>())
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ToolError;
    use crate::llm::MockLlmClient;
    use crate::memory::Role;
    use crate::tools::{tool_fn, ToolSpec};

    fn tools() -> Vec<ToolSpec> {
        vec![
            ToolSpec::new(
                "exact-search",
                "search",
                tool_fn(|q| async move { Ok(format!("src/lib.rs:[{}]", q.len())) }),
            ),
            ToolSpec::new(
                "broken",
                "fails",
                tool_fn(|_| async { Err(ToolError::ExecutionFailed("index offline".to_string())) }),
            ),
        ]
    }

    fn agent(llm: Arc<MockLlmClient>, max_iterations: usize) -> Agent {
        let config = AgentConfigBuilder::from_name(AgentConfigName::Test)
            .with_max_iterations(max_iterations)
            .with_tools(tools())
            .build()
            .unwrap();
        Agent::new("find symbol Foo", config, llm).unwrap()
    }

    #[tokio::test]
    async fn test_completion_without_tools() {
        let llm = Arc::new(MockLlmClient::scripted(["Foo is in src/lib.rs"]));
        let mut agent = agent(llm.clone(), 5);
        let response = agent.run().await.unwrap();

        assert_eq!(response, "Foo is in src/lib.rs");
        assert_eq!(agent.conversation().len(), 2);
        assert!(agent.function_calls().is_empty());
        assert!(agent.is_completed());

        let request = &llm.requests()[0];
        assert_eq!(request.messages[0].role, Role::System);
        assert_eq!(request.messages[1].content, "find symbol Foo");
        assert_eq!(request.params.model.as_deref(), Some("gpt-4"));
    }

    #[tokio::test]
    async fn test_tool_call_then_completion() {
        let llm = Arc::new(MockLlmClient::scripted([
            r#"{"tool": "exact-search", "args": {"query": "Foo"}}"#,
            "Done",
        ]));
        let mut agent = agent(llm, 5);
        agent.run().await.unwrap();

        let messages = agent.conversation().messages();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[2].role, Role::Function);
        assert_eq!(messages[2].content, "src/lib.rs:[3]");
        let calls = agent.function_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "exact-search");
        assert_eq!(calls[0].query(), Some("Foo"));
    }

    #[tokio::test]
    async fn test_unknown_tool_fails_loudly() {
        let llm = Arc::new(MockLlmClient::scripted([
            r#"{"tool": "delete-everything", "args": {"query": "/"}}"#,
        ]));
        let mut agent = agent(llm, 5);
        let err = agent.run().await.unwrap_err();
        assert!(matches!(
            err,
            AgentError::Dispatch(DispatchError::UnknownTool(ref t)) if t == "delete-everything"
        ));
        assert!(agent.function_calls().is_empty());
    }

    #[tokio::test]
    async fn test_tool_failure_reported_to_model() {
        let llm = Arc::new(MockLlmClient::scripted([
            r#"{"tool": "broken", "args": {"query": "x"}}"#,
            "Gave up",
        ]));
        let mut agent = agent(llm, 5);
        assert_eq!(agent.run().await.unwrap(), "Gave up");
        let observation = &agent.conversation().messages()[2];
        assert!(observation.content.starts_with("Error: "));
        assert!(observation.content.contains("index offline"));
    }

    #[tokio::test]
    async fn test_malformed_json_retries() {
        let llm = Arc::new(MockLlmClient::scripted([r#"{"tool": "exact-search""#, "Done"]));
        let mut agent = agent(llm, 5);
        assert_eq!(agent.run().await.unwrap(), "Done");
        assert_eq!(agent.iterations(), 2);
        let retry = &agent.conversation().messages()[2];
        assert_eq!(retry.role, Role::User);
        assert!(retry.content.contains("JSON"));
    }

    #[tokio::test]
    async fn test_iteration_budget_reported() {
        let call = r#"{"tool": "exact-search", "args": {"query": "Foo"}}"#;
        let llm = Arc::new(MockLlmClient::scripted([call, call, call, "never reached"]));
        let mut agent = agent(llm.clone(), 3);
        let err = agent.run().await.unwrap_err();
        assert!(matches!(err, AgentError::MaxIterationsExceeded { max_iterations: 3 }));
        assert_eq!(llm.call_count(), 3);
        assert_eq!(agent.function_calls().len(), 3);
    }

    #[tokio::test]
    async fn test_run_after_completion() {
        let llm = Arc::new(MockLlmClient::scripted(["Done"]));
        let mut agent = agent(llm, 2);
        agent.run().await.unwrap();
        assert!(matches!(agent.run().await, Err(AgentError::AlreadyCompleted)));
    }
}
