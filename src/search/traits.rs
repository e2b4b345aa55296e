//! 代码搜索协作方契约
//!
//! 排序、相似度、引用、精确搜索与源码检索五类查询；结果有序，实现必须无状态或内部同步。

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::core::ToolError;

/// 符号种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Function,
    Struct,
    Enum,
    Trait,
    TypeAlias,
    Const,
    Static,
    Module,
}

impl SymbolKind {
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "fn" => Some(Self::Function),
            "struct" => Some(Self::Struct),
            "enum" => Some(Self::Enum),
            "trait" => Some(Self::Trait),
            "type" => Some(Self::TypeAlias),
            "const" => Some(Self::Const),
            "static" => Some(Self::Static),
            "mod" => Some(Self::Module),
            _ => None,
        }
    }
}

/// 已索引符号
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Symbol {
    /// 模块路径 + 名称，如 `tools::registry::ToolSpec`
    pub dotpath: String,
    pub kind: SymbolKind,
    pub file: PathBuf,
    pub line: usize,
}

impl Symbol {
    /// 末段名称
    pub fn name(&self) -> &str {
        self.dotpath.rsplit("::").next().unwrap_or(&self.dotpath)
    }
}

/// 一处引用位置（1 起始）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SymbolReference {
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for SymbolReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// 代码搜索接口
pub trait SymbolSearch: Send + Sync {
    /// 按综合排名排序的符号
    fn symbol_rank_results(&self, query: &str) -> Result<Vec<(Symbol, f64)>, ToolError>;

    /// 按与 query 的代码相似度排序的符号
    fn code_similarity_results(&self, query: &str) -> Result<Vec<(Symbol, f64)>, ToolError>;

    /// 文件 → 该文件中对 symbol 的引用
    fn symbol_references(
        &self,
        symbol: &str,
    ) -> Result<BTreeMap<String, Vec<SymbolReference>>, ToolError>;

    /// 符号源码；不存在时 None
    fn retrieve_source_code(&self, symbol: &str) -> Result<Option<String>, ToolError>;

    /// 文件 → 包含 pattern 的行号
    fn exact_search(&self, pattern: &str) -> Result<BTreeMap<String, Vec<usize>>, ToolError>;

    /// 代码库概览，用于 agent 指令；默认为空
    fn overview(&self) -> String {
        String::new()
    }
}
