//! Automata - Rust 智能体任务编排系统
//!
//! 模块划分：
//! - **agent**: Agent 配置、回复解析与运行循环
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误与恢复、依赖工厂、编排会话
//! - **eval**: 从对话轨迹提取动作并与期望比较
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Mock）
//! - **memory**: 对话消息
//! - **search**: 符号索引与搜索接口
//! - **tasks**: 任务注册、执行环境与执行器
//! - **tools**: 工具集构建、工具注册表与执行器

pub mod agent;
pub mod config;
pub mod core;
pub mod eval;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod search;
pub mod tasks;
pub mod tools;

pub use agent::{Agent, AgentConfig, AgentConfigBuilder, AgentConfigName, InstructionPayload};
pub use core::{AgentOverrides, DependencyFactory, DependencySources, OrchestrationSession};
pub use eval::{Action, EvalComposite};
pub use tasks::{Task, TaskExecutor, TaskRegistry, TaskStatus};
