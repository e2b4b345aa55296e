//! 依赖工厂
//!
//! 每个编排会话持有一个实例。按工具集声明的依赖键解析实例，同一键在未 reset 的会话内只解析一次；
//! 首次解析 SymbolSearch 时扫描项目建立索引，之后直接返回缓存的 Arc。

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::core::ConfigError;
use crate::llm::LlmClient;
use crate::search::{SymbolSearch, WorkspaceSymbolIndex};
use crate::tools::{Dependency, DependencyKey, SafeFs, ToolkitDependencies, ToolkitName};

/// 依赖的来源：项目位置、索引参数与 completion provider
#[derive(Clone)]
pub struct DependencySources {
    pub project_root: PathBuf,
    pub include: String,
    pub max_files: usize,
    pub top_n: usize,
    pub completion_provider: Arc<dyn LlmClient>,
    /// 预先构建好的搜索实现；设置后不再扫描项目
    pub symbol_search: Option<Arc<dyn SymbolSearch>>,
}

impl DependencySources {
    pub fn new(project_root: impl Into<PathBuf>, completion_provider: Arc<dyn LlmClient>) -> Self {
        Self {
            project_root: project_root.into(),
            include: "*.rs".to_string(),
            max_files: 5000,
            top_n: crate::tools::code_search::DEFAULT_TOP_N,
            completion_provider,
            symbol_search: None,
        }
    }

    pub fn from_config(cfg: &AppConfig, completion_provider: Arc<dyn LlmClient>) -> Self {
        Self {
            include: cfg.tools.search.include.clone(),
            max_files: cfg.tools.search.max_files,
            top_n: cfg.tools.search.top_n,
            ..Self::new(cfg.project_root(), completion_provider)
        }
    }

    pub fn with_symbol_search(mut self, search: Arc<dyn SymbolSearch>) -> Self {
        self.symbol_search = Some(search);
        self
    }
}

/// 可重置的依赖解析器
pub struct DependencyFactory {
    sources: DependencySources,
    cache: HashMap<DependencyKey, Dependency>,
    resolutions: HashMap<DependencyKey, usize>,
}

impl DependencyFactory {
    pub fn new(sources: DependencySources) -> Self {
        Self {
            sources,
            cache: HashMap::new(),
            resolutions: HashMap::new(),
        }
    }

    pub fn sources(&self) -> &DependencySources {
        &self.sources
    }

    /// 清空所有已缓存的依赖；下一次请求会重新解析
    pub fn reset(&mut self) {
        let cleared = self.cache.len();
        self.cache.clear();
        tracing::info!(cleared, "Dependency factory reset");
    }

    /// 解析给定工具集所需的全部依赖；未知工具集名称在任何初始化之前即失败
    pub fn build_dependencies_for_tools<I, S>(
        &mut self,
        toolkit_names: I,
    ) -> Result<ToolkitDependencies, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let toolkits = ToolkitName::parse_list(toolkit_names)?;
        self.build_dependencies(&toolkits)
    }

    pub fn build_dependencies(
        &mut self,
        toolkits: &[ToolkitName],
    ) -> Result<ToolkitDependencies, ConfigError> {
        let mut deps = ToolkitDependencies::new().with_top_n(self.sources.top_n);
        for toolkit in toolkits {
            for &key in toolkit.required_dependencies() {
                if deps.contains(key) {
                    continue;
                }
                deps.insert(self.get_or_resolve(key)?);
            }
        }
        Ok(deps)
    }

    /// 该依赖在本工厂生命周期内被实际构造的次数
    pub fn resolution_count(&self, key: DependencyKey) -> usize {
        self.resolutions.get(&key).copied().unwrap_or(0)
    }

    pub fn is_cached(&self, key: DependencyKey) -> bool {
        self.cache.contains_key(&key)
    }

    /// 解析单个依赖（同样走缓存）
    pub fn get_or_resolve(&mut self, key: DependencyKey) -> Result<Dependency, ConfigError> {
        if let Some(dep) = self.cache.get(&key) {
            return Ok(dep.clone());
        }
        let dep = self.resolve(key)?;
        *self.resolutions.entry(key).or_default() += 1;
        self.cache.insert(key, dep.clone());
        tracing::debug!(dependency = %key, "Resolved dependency");
        Ok(dep)
    }

    fn resolve(&self, key: DependencyKey) -> Result<Dependency, ConfigError> {
        let init_error = |reason: String| ConfigError::DependencyInit {
            dependency: key.to_string(),
            reason,
        };
        match key {
            DependencyKey::SymbolSearch => {
                if let Some(search) = &self.sources.symbol_search {
                    return Ok(Dependency::SymbolSearch(Arc::clone(search)));
                }
                let index = WorkspaceSymbolIndex::build(
                    &self.sources.project_root,
                    &self.sources.include,
                    self.sources.max_files,
                )
                .map_err(|e| init_error(e.to_string()))?;
                Ok(Dependency::SymbolSearch(Arc::new(index)))
            }
            DependencyKey::CompletionProvider => Ok(Dependency::CompletionProvider(Arc::clone(
                &self.sources.completion_provider,
            ))),
            DependencyKey::Workspace => {
                if !self.sources.project_root.is_dir() {
                    return Err(init_error(format!(
                        "{} is not a directory",
                        self.sources.project_root.display()
                    )));
                }
                Ok(Dependency::Workspace(Arc::new(SafeFs::new(
                    &self.sources.project_root,
                ))))
            }
        }
    }
}
