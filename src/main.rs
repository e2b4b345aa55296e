//! Automata 命令行入口
//!
//! 解析参数、加载配置、初始化日志，然后把请求交给编排会话。
//! 配置名与工具集名称在调用核心之前先校验。

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};

use automata::agent::AgentConfigName;
use automata::config::load_config;
use automata::eval::Action;
use automata::llm::create_llm_from_config;
use automata::memory::Message;
use automata::tasks::{ReplayExecution, TaskExecutor};
use automata::tools::{tool_call_schema_json, ToolkitName};
use automata::{AgentOverrides, OrchestrationSession};

#[derive(Parser)]
#[command(name = "automata")]
#[command(about = "Agent task orchestration: tool dispatch, task lifecycle and evaluation")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// 额外的 TOML 配置文件
    #[arg(long, global = true, env = "AUTOMATA_CONFIG")]
    config: Option<PathBuf>,

    /// 输出 agent 每一步的详细日志
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// 直接运行一个 agent
    Run(RunArgs),

    /// 注册任务、准备环境并执行
    Task {
        #[command(flatten)]
        run: RunArgs,

        /// 只校验配置，不调用 LLM
        #[arg(long)]
        dry_run: bool,
    },

    /// 执行任务并与期望动作比较
    Eval {
        #[command(flatten)]
        run: RunArgs,

        /// 期望动作列表（JSON 数组）
        #[arg(long)]
        expected: PathBuf,

        /// 回放已记录的对话（JSON 消息数组）而不是调用 LLM
        #[arg(long)]
        replay: Option<PathBuf>,
    },

    /// 打印工具集生成的工具及调用格式
    Tools {
        #[arg(long, value_delimiter = ',', default_value = "code_search")]
        toolkits: Vec<String>,

        #[arg(long)]
        project_root: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    /// 指令文本
    instructions: String,

    #[arg(long, default_value = "automata-main")]
    agent_config: String,

    /// 在 system prompt 中附带项目概览
    #[arg(long)]
    include_overview: bool,

    #[arg(long)]
    model: Option<String>,

    #[arg(long)]
    temperature: Option<f32>,

    #[arg(long)]
    max_iterations: Option<usize>,

    #[arg(long, value_delimiter = ',', default_value = "code_search")]
    toolkits: Vec<String>,

    #[arg(long)]
    project_root: Option<PathBuf>,
}

impl RunArgs {
    fn validate(&self) -> anyhow::Result<()> {
        self.agent_config
            .parse::<AgentConfigName>()
            .context("Invalid --agent-config")?;
        ToolkitName::parse_list(&self.toolkits).context("Invalid --toolkits")?;
        Ok(())
    }

    fn overrides(&self) -> AgentOverrides {
        AgentOverrides {
            model: self.model.clone(),
            temperature: self.temperature,
            max_iterations: self.max_iterations,
            stream: None,
        }
    }
}

fn open_session(
    config: Option<PathBuf>,
    project_root: Option<PathBuf>,
    verbose: bool,
) -> anyhow::Result<OrchestrationSession> {
    let mut cfg = load_config(config).context("Failed to load config")?;
    if project_root.is_some() {
        cfg.tools.search.project_root = project_root;
    }
    cfg.agent.verbose |= verbose;
    let llm = create_llm_from_config(&cfg);
    Ok(OrchestrationSession::from_config(&cfg, llm))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    automata::observability::init(cli.verbose);

    match cli.command {
        Command::Run(args) => {
            args.validate()?;
            let mut session = open_session(cli.config, args.project_root.clone(), cli.verbose)?;
            let (tools, config_name) = session.run_setup(&args.agent_config, &args.toolkits)?;
            let payload = session.instruction_payload(args.include_overview)?;
            let agent = session
                .run_with_agent(args.instructions.clone(), config_name, tools, &args.overrides(), payload)
                .await
                .context("Agent run failed")?;
            println!("{}", agent.final_response().unwrap_or_default());
        }
        Command::Task { run, dry_run } => {
            run.validate()?;
            let mut session = open_session(cli.config, run.project_root.clone(), cli.verbose)?;
            let (tools, config_name) = session.run_setup(&run.agent_config, &run.toolkits)?;
            let payload = session.instruction_payload(run.include_overview)?;
            let task = session
                .create_task(run.instructions.clone(), config_name, tools, &run.overrides(), payload)
                .await
                .context("Failed to create task")?;
            let executor = session.executor(dry_run);
            let result = session.run_with_task(&task, &executor).await;
            let record = task.lock().await.record();
            println!("{}", serde_json::to_string_pretty(&record)?);
            result.context("Task execution failed")?;
        }
        Command::Eval {
            run,
            expected,
            replay,
        } => {
            run.validate()?;
            let expected_json = std::fs::read_to_string(&expected)
                .with_context(|| format!("Failed to read {}", expected.display()))?;
            let expected: Vec<Action> =
                serde_json::from_str(&expected_json).context("Invalid expected actions")?;
            let replay = match replay {
                Some(path) => {
                    let json = std::fs::read_to_string(&path)
                        .with_context(|| format!("Failed to read {}", path.display()))?;
                    let messages: Vec<Message> =
                        serde_json::from_str(&json).context("Invalid replay conversation")?;
                    Some(messages)
                }
                None => None,
            };

            let mut session = open_session(cli.config, run.project_root.clone(), cli.verbose)?;
            let (tools, config_name) = session.run_setup(&run.agent_config, &run.toolkits)?;
            let payload = session.instruction_payload(run.include_overview)?;
            let task = session
                .create_task(run.instructions.clone(), config_name, tools, &run.overrides(), payload)
                .await
                .context("Failed to create task")?;
            let executor = match replay {
                Some(messages) => TaskExecutor::new(ReplayExecution::new(messages)),
                None => session.executor(false),
            };
            let result = session
                .run_with_eval(&task, &expected, None, &executor)
                .await
                .context("Evaluation failed")?;
            println!("{}", serde_json::to_string_pretty(&result.summary())?);
        }
        Command::Tools {
            toolkits,
            project_root,
        } => {
            ToolkitName::parse_list(&toolkits).context("Invalid --toolkits")?;
            let mut session = open_session(cli.config, project_root, cli.verbose)?;
            let (tools, _) = session.run_setup(AgentConfigName::Default.as_str(), &toolkits)?;
            for tool in &tools {
                println!("{}: {}", tool.name(), tool.description());
            }
            println!();
            println!("{}", tool_call_schema_json());
        }
    }

    Ok(())
}
