//! 编排会话
//!
//! 持有本会话的依赖工厂、任务注册表与执行环境；命令入口只通过这里构建工具、
//! 创建 Agent 或任务并运行。没有进程级单例，reset 之后一切依赖重新解析。

use std::path::PathBuf;
use std::sync::Arc;

use crate::agent::{Agent, AgentConfigBuilder, AgentConfigName, InstructionPayload};
use crate::config::AppConfig;
use crate::core::{AgentError, ConfigError, DependencyFactory, DependencySources, EvalError, TaskError};
use crate::eval::{Action, CompositeEvalResult, EvalComposite, Evaluator};
use crate::llm::LlmClient;
use crate::tasks::{
    AgentTaskExecution, DryRunExecution, LocalWorkspaceEnvironment, SharedTask, Task,
    TaskEnvironment, TaskExecutor, TaskOutcome, TaskRegistry,
};
use crate::tools::{AgentToolFactory, Dependency, DependencyKey, ToolSpec, ToolkitName};

/// 调用方对默认 agent 参数的覆盖；None 表示沿用会话默认值
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentOverrides {
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_iterations: Option<usize>,
    pub stream: Option<bool>,
}

impl AgentOverrides {
    /// 以 self 为准，缺省字段从 fallback 补齐
    fn or(&self, fallback: &AgentOverrides) -> AgentOverrides {
        AgentOverrides {
            model: self.model.clone().or_else(|| fallback.model.clone()),
            temperature: self.temperature.or(fallback.temperature),
            max_iterations: self.max_iterations.or(fallback.max_iterations),
            stream: self.stream.or(fallback.stream),
        }
    }
}

pub struct OrchestrationSession {
    dependencies: DependencyFactory,
    llm: Arc<dyn LlmClient>,
    registry: TaskRegistry,
    environment: LocalWorkspaceEnvironment,
    defaults: AgentOverrides,
    tool_timeout_secs: u64,
    verbose: bool,
}

impl OrchestrationSession {
    /// 以给定依赖来源和任务目录开启会话；agent 使用来源中的 completion provider
    pub fn init(sources: DependencySources, tasks_root: impl Into<PathBuf>) -> Self {
        let llm = Arc::clone(&sources.completion_provider);
        Self {
            dependencies: DependencyFactory::new(sources),
            llm,
            registry: TaskRegistry::new(),
            environment: LocalWorkspaceEnvironment::new(tasks_root),
            defaults: AgentOverrides::default(),
            tool_timeout_secs: crate::agent::DEFAULT_TOOL_TIMEOUT_SECS,
            verbose: false,
        }
    }

    pub fn from_config(cfg: &AppConfig, llm: Arc<dyn LlmClient>) -> Self {
        let mut session = Self::init(DependencySources::from_config(cfg, llm), cfg.tasks_root());
        session.defaults = AgentOverrides {
            model: Some(cfg.llm.model.clone()),
            temperature: Some(cfg.llm.temperature),
            max_iterations: Some(cfg.agent.max_iterations),
            stream: Some(cfg.llm.stream),
        };
        session.tool_timeout_secs = cfg.tools.tool_timeout_secs;
        session.verbose = cfg.agent.verbose;
        session
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_tool_timeout(mut self, timeout_secs: u64) -> Self {
        self.tool_timeout_secs = timeout_secs;
        self
    }

    /// 丢弃缓存依赖与已注册任务
    pub fn reset(&mut self) {
        self.dependencies.reset();
        self.registry = TaskRegistry::new();
        tracing::info!("Orchestration session reset");
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    pub fn environment(&self) -> &LocalWorkspaceEnvironment {
        &self.environment
    }

    pub fn dependencies(&self) -> &DependencyFactory {
        &self.dependencies
    }

    /// 校验配置名与工具集名称并构建工具；任何名称无效都在解析依赖之前失败
    pub fn run_setup<S: AsRef<str>>(
        &mut self,
        agent_config: &str,
        toolkits: &[S],
    ) -> Result<(Vec<ToolSpec>, AgentConfigName), ConfigError> {
        let config_name: AgentConfigName = agent_config.parse()?;
        let toolkits = ToolkitName::parse_list(toolkits)?;
        let deps = self.dependencies.build_dependencies(&toolkits)?;
        let tools = AgentToolFactory::build_toolkits(&toolkits, &deps)?;
        tracing::info!(
            config = %config_name,
            toolkits = ?toolkits.iter().map(|t| t.as_str()).collect::<Vec<_>>(),
            tools = tools.len(),
            "Session setup complete"
        );
        Ok((tools, config_name))
    }

    /// 需要时取项目概览填入 {overview}
    pub fn instruction_payload(&mut self, include_overview: bool) -> Result<InstructionPayload, ConfigError> {
        if !include_overview {
            return Ok(InstructionPayload::default());
        }
        match self.dependencies.get_or_resolve(DependencyKey::SymbolSearch)? {
            Dependency::SymbolSearch(search) => Ok(InstructionPayload::new(search.overview())),
            other => Err(ConfigError::DependencyInit {
                dependency: DependencyKey::SymbolSearch.to_string(),
                reason: format!("resolved to {}", other.key()),
            }),
        }
    }

    /// 构建一个尚未运行的 Agent
    pub fn build_agent(
        &self,
        instructions: impl Into<String>,
        config_name: AgentConfigName,
        tools: Vec<ToolSpec>,
        overrides: &AgentOverrides,
        payload: InstructionPayload,
    ) -> Result<Agent, AgentError> {
        let settings = overrides.or(&self.defaults);
        let mut builder = AgentConfigBuilder::from_name(config_name)
            .with_verbose(self.verbose)
            .with_instruction_payload(payload)
            .with_tools(tools);
        if let Some(model) = settings.model {
            builder = builder.with_model(model);
        }
        if let Some(temperature) = settings.temperature {
            builder = builder.with_temperature(temperature);
        }
        if let Some(max_iterations) = settings.max_iterations {
            builder = builder.with_max_iterations(max_iterations);
        }
        if let Some(stream) = settings.stream {
            builder = builder.with_stream(stream);
        }
        let config = builder.build()?;
        Ok(Agent::new(instructions, config, Arc::clone(&self.llm))?.with_tool_timeout(self.tool_timeout_secs))
    }

    /// 构建并运行 Agent，返回运行结束后的 Agent（可读取对话与调用记录）
    pub async fn run_with_agent(
        &self,
        instructions: impl Into<String>,
        config_name: AgentConfigName,
        tools: Vec<ToolSpec>,
        overrides: &AgentOverrides,
        payload: InstructionPayload,
    ) -> Result<Agent, AgentError> {
        let mut agent = self.build_agent(instructions, config_name, tools, overrides, payload)?;
        agent.run().await?;
        Ok(agent)
    }

    /// 注册任务并准备执行环境；返回时任务处于 EnvReady
    pub async fn create_task(
        &self,
        instructions: impl Into<String>,
        config_name: AgentConfigName,
        tools: Vec<ToolSpec>,
        overrides: &AgentOverrides,
        payload: InstructionPayload,
    ) -> Result<SharedTask, TaskError> {
        let settings = overrides.or(&self.defaults);
        let mut task = Task::new(instructions, config_name)
            .with_tools(tools)
            .with_instruction_payload(payload);
        if let Some(model) = settings.model {
            task = task.with_model(model);
        }
        if let Some(temperature) = settings.temperature {
            task = task.with_temperature(temperature);
        }
        if let Some(max_iterations) = settings.max_iterations {
            task = task.with_max_iterations(max_iterations);
        }

        let shared = self.registry.register(task).await?;
        self.environment.setup(&shared).await?;
        Ok(shared)
    }

    /// dry_run 时不调用 LLM
    pub fn executor(&self, dry_run: bool) -> TaskExecutor {
        if dry_run {
            TaskExecutor::new(DryRunExecution)
        } else {
            TaskExecutor::new(
                AgentTaskExecution::new(Arc::clone(&self.llm))
                    .with_tool_timeout(self.tool_timeout_secs)
                    .with_verbose(self.verbose),
            )
        }
    }

    /// 执行任务并把最终记录写回工作目录；写盘失败只记日志
    pub async fn run_with_task(
        &self,
        task: &SharedTask,
        executor: &TaskExecutor,
    ) -> Result<TaskOutcome, TaskError> {
        let result = executor.execute(task).await;
        let snapshot = task.lock().await.clone();
        if let Err(e) = self.environment.persist(&snapshot).await {
            tracing::warn!(task_id = %snapshot.id, error = %e, "Failed to persist task record");
        }
        result
    }

    /// evaluators 为 None 时使用一组新建的默认评估器
    pub async fn run_with_eval(
        &self,
        task: &SharedTask,
        expected: &[Action],
        evaluators: Option<Vec<Box<dyn Evaluator>>>,
        executor: &TaskExecutor,
    ) -> Result<CompositeEvalResult, EvalError> {
        let composite = EvalComposite::new(evaluators.unwrap_or_else(EvalComposite::default_evaluators));
        let result = composite.generate_eval_result(task, expected, executor).await;
        let snapshot = task.lock().await.clone();
        if let Err(e) = self.environment.persist(&snapshot).await {
            tracing::warn!(task_id = %snapshot.id, error = %e, "Failed to persist task record");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;
    use crate::tasks::TaskStatus;

    fn session(dir: &std::path::Path, llm: MockLlmClient) -> OrchestrationSession {
        std::fs::create_dir_all(dir.join("project/src")).unwrap();
        std::fs::write(
            dir.join("project/src/lib.rs"),
            "/// Entry type\npub struct Foo;\n\npub fn make_foo() -> Foo {\n    Foo\n}\n",
        )
        .unwrap();
        OrchestrationSession::init(
            DependencySources::new(dir.join("project"), Arc::new(llm)),
            dir.join("tasks"),
        )
    }

    #[test]
    fn test_run_setup_builds_tools() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(dir.path(), MockLlmClient::new());
        let (tools, name) = session.run_setup("automata-main", &["code_search"]).unwrap();
        assert_eq!(name, AgentConfigName::AutomataMain);
        assert_eq!(tools.len(), 6);
    }

    #[test]
    fn test_run_setup_rejects_unknown_names_before_resolution() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(dir.path(), MockLlmClient::new());
        assert!(matches!(
            session.run_setup("nope", &["code_search"]),
            Err(ConfigError::UnknownAgentConfig(_))
        ));
        assert!(matches!(
            session.run_setup("automata-main", &["code_search", "py_writer"]),
            Err(ConfigError::UnknownToolkit(ref n)) if n == "py_writer"
        ));
        assert_eq!(session.dependencies().resolution_count(DependencyKey::SymbolSearch), 0);
    }

    #[test]
    fn test_reset_clears_dependencies() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(dir.path(), MockLlmClient::new());
        session.run_setup("automata-main", &["code_search"]).unwrap();
        session.reset();
        assert!(!session.dependencies().is_cached(DependencyKey::SymbolSearch));
        session.run_setup("automata-main", &["code_search"]).unwrap();
        assert_eq!(session.dependencies().resolution_count(DependencyKey::SymbolSearch), 2);
    }

    #[test]
    fn test_instruction_payload_overview() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(dir.path(), MockLlmClient::new());
        assert_eq!(session.instruction_payload(false).unwrap(), InstructionPayload::default());
        let payload = session.instruction_payload(true).unwrap();
        assert!(payload.overview.starts_with("Indexed 1 files"));
    }

    #[tokio::test]
    async fn test_run_with_agent_plain_reply() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(dir.path(), MockLlmClient::scripted(["All done."]));
        let (tools, name) = session.run_setup("automata-main", &["code_search"]).unwrap();
        let overrides = AgentOverrides {
            max_iterations: Some(3),
            ..Default::default()
        };
        let agent = session
            .run_with_agent("Say hi", name, tools, &overrides, InstructionPayload::default())
            .await
            .unwrap();
        assert_eq!(agent.config().max_iterations, 3);
        assert_eq!(agent.final_response(), Some("All done."));
        assert_eq!(agent.conversation().len(), 2);
        assert!(agent.function_calls().is_empty());
    }

    #[tokio::test]
    async fn test_task_lifecycle_persists_record() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(dir.path(), MockLlmClient::scripted(["Finished."]));
        let (tools, name) = session.run_setup("automata-main", &["code_search"]).unwrap();
        let task = session
            .create_task("Do it", name, tools, &AgentOverrides::default(), InstructionPayload::default())
            .await
            .unwrap();
        assert_eq!(task.lock().await.status(), TaskStatus::EnvReady);

        let executor = session.executor(false);
        let outcome = session.run_with_task(&task, &executor).await.unwrap();
        assert_eq!(outcome.response.as_deref(), Some("Finished."));

        let id = task.lock().await.id.clone();
        let stored = std::fs::read_to_string(session.environment().task_dir(&id).join("task.json")).unwrap();
        let record: crate::tasks::TaskRecord = serde_json::from_str(&stored).unwrap();
        assert_eq!(record.status, TaskStatus::Succeeded);
        assert_eq!(record.result.as_deref(), Some("Finished."));
    }

    #[tokio::test]
    async fn test_dry_run_executor_skips_llm() {
        let dir = tempfile::tempdir().unwrap();
        let llm = MockLlmClient::new();
        let session = session(dir.path(), llm);
        let task = session
            .create_task(
                "Plan only",
                AgentConfigName::Test,
                Vec::new(),
                &AgentOverrides::default(),
                InstructionPayload::default(),
            )
            .await
            .unwrap();
        let outcome = session.run_with_task(&task, &session.executor(true)).await.unwrap();
        assert_eq!(outcome.response, None);
        assert_eq!(outcome.conversation.len(), 1);
    }
}
