//! 工具层：工具集构建、注册表、执行器与调用格式

pub mod code_search;
pub mod executor;
pub mod factory;
pub mod file_access;
pub mod registry;
pub mod schema;
pub mod toolkit;

pub use code_search::{CodeSearchToolkitBuilder, SearchToolVariant, NO_RESULT_FOUND};
pub use executor::ToolExecutor;
pub use factory::AgentToolFactory;
pub use file_access::{FileAccessToolkitBuilder, FileToolVariant, SafeFs};
pub use registry::{tool_fn, ToolFn, ToolRegistry, ToolSpec};
pub use schema::tool_call_schema_json;
pub use toolkit::{Dependency, DependencyKey, ToolkitBuilder, ToolkitDependencies, ToolkitName};
