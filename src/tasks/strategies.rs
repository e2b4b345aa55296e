//! 执行策略
//!
//! TaskExecutor 只负责状态记账，具体怎么跑由 TaskExecution 决定：
//! AgentTaskExecution 驱动真实 Agent；DryRunExecution 只校验配置；ReplayExecution 回放给定轨迹。

use std::sync::Arc;

use async_trait::async_trait;

use crate::agent::{Agent, DEFAULT_TOOL_TIMEOUT_SECS};
use crate::core::TaskError;
use crate::llm::LlmClient;
use crate::memory::Message;
use crate::tasks::{Task, TaskOutcome};

#[async_trait]
pub trait TaskExecution: Send + Sync {
    async fn execute(&self, task: &Task) -> Result<TaskOutcome, TaskError>;
}

/// 为任务新建一个 Agent 并运行到结束
pub struct AgentTaskExecution {
    llm: Arc<dyn LlmClient>,
    tool_timeout_secs: u64,
    verbose: bool,
}

impl AgentTaskExecution {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            llm,
            tool_timeout_secs: DEFAULT_TOOL_TIMEOUT_SECS,
            verbose: false,
        }
    }

    pub fn with_tool_timeout(mut self, timeout_secs: u64) -> Self {
        self.tool_timeout_secs = timeout_secs;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

#[async_trait]
impl TaskExecution for AgentTaskExecution {
    async fn execute(&self, task: &Task) -> Result<TaskOutcome, TaskError> {
        let config = task.agent_config(self.verbose)?;
        let mut agent = Agent::new(task.instructions.clone(), config, Arc::clone(&self.llm))?
            .with_tool_timeout(self.tool_timeout_secs);
        let response = agent.run().await?;
        Ok(TaskOutcome {
            response: Some(response),
            conversation: agent.into_conversation().into_messages(),
        })
    }
}

/// 不调用 LLM：校验 agent 配置后返回只含指令的轨迹
#[derive(Debug, Default)]
pub struct DryRunExecution;

#[async_trait]
impl TaskExecution for DryRunExecution {
    async fn execute(&self, task: &Task) -> Result<TaskOutcome, TaskError> {
        let config = task.agent_config(false)?;
        tracing::info!(
            task_id = %task.id,
            config = %config.config_name,
            tools = ?config.tool_names(),
            "Dry run"
        );
        Ok(TaskOutcome {
            response: None,
            conversation: vec![Message::user(task.instructions.clone())],
        })
    }
}

/// 回放预先记录的轨迹
#[derive(Debug, Clone)]
pub struct ReplayExecution {
    conversation: Vec<Message>,
}

impl ReplayExecution {
    pub fn new(conversation: Vec<Message>) -> Self {
        Self { conversation }
    }
}

#[async_trait]
impl TaskExecution for ReplayExecution {
    async fn execute(&self, _task: &Task) -> Result<TaskOutcome, TaskError> {
        let response = self
            .conversation
            .iter()
            .rev()
            .find(|m| m.function_call.is_none() && m.role == crate::memory::Role::Assistant)
            .map(|m| m.content.clone());
        Ok(TaskOutcome {
            response,
            conversation: self.conversation.clone(),
        })
    }
}
