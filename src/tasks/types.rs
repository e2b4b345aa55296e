//! 任务与生命周期状态
//!
//! 状态只能前进：Created → Registered → EnvReady → Running → Succeeded；
//! 任意非终态都可以进入 Failed。Succeeded / Failed 为终态。

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::agent::{AgentConfig, AgentConfigBuilder, AgentConfigName, InstructionPayload};
use crate::core::{ConfigError, TaskError};
use crate::memory::{Conversation, Message};
use crate::tools::ToolSpec;

/// 注册后由 TaskRegistry 持有，执行器与评估器通过锁访问
pub type SharedTask = Arc<Mutex<Task>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Created,
    Registered,
    EnvReady,
    Running,
    Succeeded,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Succeeded | TaskStatus::Failed)
    }

    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        match (self, next) {
            (Created, Registered) | (Registered, EnvReady) | (EnvReady, Running) | (Running, Succeeded) => true,
            (current, Failed) => !current.is_terminal(),
            _ => false,
        }
    }
}

/// 一次任务执行的产出
#[derive(Debug, Clone, Default)]
pub struct TaskOutcome {
    /// 模型最终回复；dry run 时为空
    pub response: Option<String>,
    pub conversation: Vec<Message>,
}

/// 一个编排单元
#[derive(Debug, Clone)]
pub struct Task {
    pub id: String,
    pub instructions: String,
    pub config_name: AgentConfigName,
    pub model: String,
    pub temperature: f32,
    pub max_iterations: usize,
    pub tools: Vec<ToolSpec>,
    pub instruction_payload: InstructionPayload,
    status: TaskStatus,
    error: Option<String>,
    result: Option<String>,
    conversation: Vec<Message>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Task {
    pub fn new(instructions: impl Into<String>, config_name: AgentConfigName) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            instructions: instructions.into(),
            config_name,
            model: AgentConfigBuilder::DEFAULT_MODEL.to_string(),
            temperature: AgentConfigBuilder::DEFAULT_TEMPERATURE,
            max_iterations: AgentConfigBuilder::DEFAULT_MAX_ITERATIONS,
            tools: Vec::new(),
            instruction_payload: InstructionPayload::default(),
            status: TaskStatus::Created,
            error: None,
            result: None,
            conversation: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolSpec>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_instruction_payload(mut self, payload: InstructionPayload) -> Self {
        self.instruction_payload = payload;
        self
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn result(&self) -> Option<&str> {
        self.result.as_deref()
    }

    /// 执行后的对话轨迹
    pub fn conversation(&self) -> Conversation {
        Conversation::from(self.conversation.clone())
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn transition(&mut self, next: TaskStatus) -> Result<(), TaskError> {
        if !self.status.can_transition_to(next) {
            return Err(TaskError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        tracing::debug!(task_id = %self.id, from = ?self.status, to = ?next, "Task transition");
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// 进入 Failed 并记录错误；已是终态时只保留原状态
    pub fn fail(&mut self, error: impl std::fmt::Display) {
        let message = error.to_string();
        if self.transition(TaskStatus::Failed).is_err() {
            tracing::warn!(task_id = %self.id, status = ?self.status, error = %message, "Failure reported for a finished task");
            return;
        }
        self.error = Some(message);
    }

    pub fn record_success(&mut self, outcome: &TaskOutcome) -> Result<(), TaskError> {
        self.transition(TaskStatus::Succeeded)?;
        self.result = outcome.response.clone();
        self.conversation = outcome.conversation.clone();
        Ok(())
    }

    /// 以任务 id 作为 session id 构建 agent 配置
    pub fn agent_config(&self, verbose: bool) -> Result<AgentConfig, ConfigError> {
        AgentConfigBuilder::from_name(self.config_name)
            .with_model(self.model.clone())
            .with_temperature(self.temperature)
            .with_max_iterations(self.max_iterations)
            .with_verbose(verbose)
            .with_session_id(self.id.clone())
            .with_instruction_payload(self.instruction_payload.clone())
            .with_tools(self.tools.clone())
            .build()
    }

    /// 可序列化的任务记录（不含工具处理函数）
    pub fn record(&self) -> TaskRecord {
        TaskRecord {
            id: self.id.clone(),
            instructions: self.instructions.clone(),
            config_name: self.config_name.to_string(),
            model: self.model.clone(),
            max_iterations: self.max_iterations,
            tools: self.tools.iter().map(|t| t.name().to_string()).collect(),
            status: self.status,
            error: self.error.clone(),
            result: self.result.clone(),
            conversation: self.conversation.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// 写入 task.json 的记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: String,
    pub instructions: String,
    pub config_name: String,
    pub model: String,
    pub max_iterations: usize,
    pub tools: Vec<String>,
    pub status: TaskStatus,
    pub error: Option<String>,
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conversation: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
