//! 核心编排层：错误与恢复、依赖工厂、编排会话

pub mod dependency_factory;
pub mod error;
pub mod recovery;
pub mod session;

pub use dependency_factory::{DependencyFactory, DependencySources};
pub use error::{AgentError, ConfigError, DispatchError, EvalError, RecoveryAction, TaskError, ToolError};
pub use recovery::RecoveryEngine;
pub use session::{AgentOverrides, OrchestrationSession};
