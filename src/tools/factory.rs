//! Agent 工具工厂
//!
//! 按调用方给出的工具集顺序构建各 ToolkitBuilder 并拼接其输出；
//! 未知工具集、缺失依赖、跨工具集重名均为配置错误。

use std::collections::HashSet;

use crate::core::ConfigError;
use crate::tools::{
    CodeSearchToolkitBuilder, FileAccessToolkitBuilder, ToolSpec, ToolkitBuilder,
    ToolkitDependencies, ToolkitName,
};

pub struct AgentToolFactory;

impl AgentToolFactory {
    /// 为指定工具集创建构建器，只取其声明需要的依赖
    pub fn create_builder(
        toolkit: ToolkitName,
        deps: &ToolkitDependencies,
    ) -> Result<Box<dyn ToolkitBuilder>, ConfigError> {
        Ok(match toolkit {
            ToolkitName::CodeSearch => Box::new(CodeSearchToolkitBuilder::from_dependencies(deps)?),
            ToolkitName::FileAccess => Box::new(FileAccessToolkitBuilder::from_dependencies(deps)?),
        })
    }

    /// 名称 → 工具列表；未知名称返回 UnknownToolkit(name)
    pub fn build_tools<I, S>(names: I, deps: &ToolkitDependencies) -> Result<Vec<ToolSpec>, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let toolkits = ToolkitName::parse_list(names)?;
        Self::build_toolkits(&toolkits, deps)
    }

    pub fn build_toolkits(
        toolkits: &[ToolkitName],
        deps: &ToolkitDependencies,
    ) -> Result<Vec<ToolSpec>, ConfigError> {
        let mut tools = Vec::new();
        let mut seen = HashSet::new();
        for &toolkit in toolkits {
            let builder = Self::create_builder(toolkit, deps)?;
            for tool in builder.build() {
                if !seen.insert(tool.name().to_string()) {
                    return Err(ConfigError::DuplicateTool(tool.name().to_string()));
                }
                tools.push(tool);
            }
        }
        tracing::debug!(
            toolkits = ?toolkits.iter().map(|t| t.as_str()).collect::<Vec<_>>(),
            tools = tools.len(),
            "Built agent tools"
        );
        Ok(tools)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::llm::MockLlmClient;
    use crate::search::WorkspaceSymbolIndex;
    use crate::tools::{Dependency, SafeFs};

    fn deps(dir: &std::path::Path) -> ToolkitDependencies {
        let index = WorkspaceSymbolIndex::from_sources(dir, [("src/lib.rs", "pub struct Foo;\n")]).unwrap();
        ToolkitDependencies::new()
            .with(Dependency::SymbolSearch(Arc::new(index)))
            .with(Dependency::CompletionProvider(Arc::new(MockLlmClient::new())))
            .with(Dependency::Workspace(Arc::new(SafeFs::new(dir))))
    }

    #[test]
    fn test_build_tools_preserves_toolkit_order() {
        let dir = tempfile::tempdir().unwrap();
        let tools = AgentToolFactory::build_tools(["file_access", "code_search"], &deps(dir.path())).unwrap();
        let names: Vec<&str> = tools.iter().map(|t| t.name()).collect();
        assert_eq!(names[0], "read-file");
        assert_eq!(names[3], "llm-facilitated-search");
        assert_eq!(names.len(), 9);
    }

    #[test]
    fn test_unknown_toolkit() {
        let dir = tempfile::tempdir().unwrap();
        let err = AgentToolFactory::build_tools(["code_search", "oracle"], &deps(dir.path())).err();
        assert_eq!(err, Some(ConfigError::UnknownToolkit("oracle".to_string())));
    }

    #[test]
    fn test_duplicate_toolkit_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = AgentToolFactory::build_tools(["code_search", "code_search"], &deps(dir.path())).err();
        assert_eq!(err, Some(ConfigError::DuplicateTool("llm-facilitated-search".to_string())));
    }

    #[test]
    fn test_missing_dependency() {
        let err = AgentToolFactory::build_tools(["code_search"], &ToolkitDependencies::new()).err();
        assert!(matches!(err, Some(ConfigError::MissingDependency { ref toolkit, .. }) if toolkit == "code_search"));
    }
}
