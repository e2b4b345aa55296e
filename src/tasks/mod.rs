//! 任务：生命周期状态、注册表、执行环境与执行器

pub mod environment;
pub mod executor;
pub mod registry;
pub mod strategies;
pub mod types;

pub use environment::{LocalWorkspaceEnvironment, TaskEnvironment};
pub use executor::TaskExecutor;
pub use registry::TaskRegistry;
pub use strategies::{AgentTaskExecution, DryRunExecution, ReplayExecution, TaskExecution};
pub use types::{SharedTask, Task, TaskOutcome, TaskRecord, TaskStatus};
