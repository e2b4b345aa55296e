//! Toolkit 抽象
//!
//! ToolkitName 是可构建的工具集枚举，每个工具集声明自己需要的依赖键；
//! ToolkitDependencies 保存一次会话中已解析的依赖实例（Arc 共享）；
//! ToolkitBuilder 把一组工具变体展开为 ToolSpec 列表。

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::core::ConfigError;
use crate::llm::LlmClient;
use crate::search::SymbolSearch;
use crate::tools::{SafeFs, ToolSpec};

/// 已注册的工具集名称
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ToolkitName {
    CodeSearch,
    FileAccess,
}

impl ToolkitName {
    pub const ALL: [ToolkitName; 2] = [ToolkitName::CodeSearch, ToolkitName::FileAccess];

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolkitName::CodeSearch => "code_search",
            ToolkitName::FileAccess => "file_access",
        }
    }

    /// 该工具集构建时需要的依赖
    pub fn required_dependencies(&self) -> &'static [DependencyKey] {
        match self {
            ToolkitName::CodeSearch => &[DependencyKey::SymbolSearch, DependencyKey::CompletionProvider],
            ToolkitName::FileAccess => &[DependencyKey::Workspace],
        }
    }

    /// 解析逗号分隔或多个名称，保持调用方顺序
    pub fn parse_list<I, S>(names: I) -> Result<Vec<ToolkitName>, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names.into_iter().map(|n| n.as_ref().parse()).collect()
    }
}

impl FromStr for ToolkitName {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "code_search" => Ok(ToolkitName::CodeSearch),
            "file_access" => Ok(ToolkitName::FileAccess),
            other => Err(ConfigError::UnknownToolkit(other.to_string())),
        }
    }
}

impl fmt::Display for ToolkitName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 依赖键：对应工具集构建器的构造参数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DependencyKey {
    SymbolSearch,
    CompletionProvider,
    Workspace,
}

impl DependencyKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            DependencyKey::SymbolSearch => "symbol_search",
            DependencyKey::CompletionProvider => "completion_provider",
            DependencyKey::Workspace => "workspace",
        }
    }
}

impl fmt::Display for DependencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 已解析的依赖实例
#[derive(Clone)]
pub enum Dependency {
    SymbolSearch(Arc<dyn SymbolSearch>),
    CompletionProvider(Arc<dyn LlmClient>),
    Workspace(Arc<SafeFs>),
}

impl Dependency {
    pub fn key(&self) -> DependencyKey {
        match self {
            Dependency::SymbolSearch(_) => DependencyKey::SymbolSearch,
            Dependency::CompletionProvider(_) => DependencyKey::CompletionProvider,
            Dependency::Workspace(_) => DependencyKey::Workspace,
        }
    }

    /// 两个依赖是否指向同一实例
    pub fn same_instance(&self, other: &Dependency) -> bool {
        match (self, other) {
            (Dependency::SymbolSearch(a), Dependency::SymbolSearch(b)) => Arc::ptr_eq(a, b),
            (Dependency::CompletionProvider(a), Dependency::CompletionProvider(b)) => {
                Arc::ptr_eq(a, b)
            }
            (Dependency::Workspace(a), Dependency::Workspace(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dependency::Workspace(fs) => f.debug_tuple("Workspace").field(fs).finish(),
            other => write!(f, "{}(..)", other.key()),
        }
    }
}

/// 依赖键 → 实例
#[derive(Clone, Debug, Default)]
pub struct ToolkitDependencies {
    entries: BTreeMap<DependencyKey, Dependency>,
    /// 搜索结果截断长度，None 时由构建器使用默认值
    top_n: Option<usize>,
}

impl ToolkitDependencies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, dependency: Dependency) {
        self.entries.insert(dependency.key(), dependency);
    }

    pub fn with(mut self, dependency: Dependency) -> Self {
        self.insert(dependency);
        self
    }

    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = Some(top_n);
        self
    }

    pub fn top_n(&self) -> Option<usize> {
        self.top_n
    }

    pub fn get(&self, key: DependencyKey) -> Option<&Dependency> {
        self.entries.get(&key)
    }

    pub fn contains(&self, key: DependencyKey) -> bool {
        self.entries.contains_key(&key)
    }

    pub fn keys(&self) -> Vec<DependencyKey> {
        self.entries.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn missing(toolkit: ToolkitName, key: DependencyKey) -> ConfigError {
        ConfigError::MissingDependency {
            toolkit: toolkit.to_string(),
            dependency: key.to_string(),
        }
    }

    pub fn symbol_search(&self, toolkit: ToolkitName) -> Result<Arc<dyn SymbolSearch>, ConfigError> {
        match self.get(DependencyKey::SymbolSearch) {
            Some(Dependency::SymbolSearch(s)) => Ok(Arc::clone(s)),
            _ => Err(Self::missing(toolkit, DependencyKey::SymbolSearch)),
        }
    }

    pub fn completion_provider(&self, toolkit: ToolkitName) -> Result<Arc<dyn LlmClient>, ConfigError> {
        match self.get(DependencyKey::CompletionProvider) {
            Some(Dependency::CompletionProvider(llm)) => Ok(Arc::clone(llm)),
            _ => Err(Self::missing(toolkit, DependencyKey::CompletionProvider)),
        }
    }

    pub fn workspace(&self, toolkit: ToolkitName) -> Result<Arc<SafeFs>, ConfigError> {
        match self.get(DependencyKey::Workspace) {
            Some(Dependency::Workspace(fs)) => Ok(Arc::clone(fs)),
            _ => Err(Self::missing(toolkit, DependencyKey::Workspace)),
        }
    }
}

/// 工具集构建器：声明的变体 → ToolSpec 列表（保持请求顺序，名称唯一）
pub trait ToolkitBuilder: Send + Sync {
    fn toolkit(&self) -> ToolkitName;

    fn build(&self) -> Vec<ToolSpec>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_toolkit_names() {
        assert_eq!("code_search".parse::<ToolkitName>().unwrap(), ToolkitName::CodeSearch);
        assert_eq!(
            ToolkitName::parse_list(["file_access", "code_search"]).unwrap(),
            vec![ToolkitName::FileAccess, ToolkitName::CodeSearch]
        );
        assert_eq!(
            "context_oracle".parse::<ToolkitName>().unwrap_err(),
            ConfigError::UnknownToolkit("context_oracle".to_string())
        );
    }

    #[test]
    fn test_missing_dependency_names_toolkit_and_key() {
        let deps = ToolkitDependencies::new();
        let err = deps.workspace(ToolkitName::FileAccess).unwrap_err();
        assert_eq!(
            err,
            ConfigError::MissingDependency {
                toolkit: "file_access".to_string(),
                dependency: "workspace".to_string(),
            }
        );
    }

    #[test]
    fn test_insert_replaces_same_key() {
        let dir = tempfile::tempdir().unwrap();
        let a = Dependency::Workspace(Arc::new(SafeFs::new(dir.path())));
        let b = Dependency::Workspace(Arc::new(SafeFs::new(dir.path())));
        let deps = ToolkitDependencies::new().with(a.clone()).with(b.clone());
        assert_eq!(deps.len(), 1);
        assert!(deps.get(DependencyKey::Workspace).unwrap().same_instance(&b));
        assert!(!a.same_instance(&b));
    }
}
