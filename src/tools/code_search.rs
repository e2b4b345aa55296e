//! 代码搜索工具集
//!
//! 每个 SearchToolVariant 对应唯一的处理函数与描述，由 match 穷尽检查保证；
//! 变体之外的标识在解析时即返回 UnknownTool。
//! llm-facilitated-search 是唯一会调用 LLM 的处理器：模型的选择必须是相似度结果中的某一行，
//! 否则丢弃并返回原始排序。

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::core::{AgentError, ConfigError, DispatchError, ToolError};
use crate::llm::{CompletionParams, LlmClient};
use crate::search::SymbolSearch;
use crate::tools::{tool_fn, ToolRegistry, ToolSpec, ToolkitBuilder, ToolkitDependencies, ToolkitName};

/// 结果列表默认截断长度
pub const DEFAULT_TOP_N: usize = 20;
/// 检索源码无结果时返回的提示
pub const NO_RESULT_FOUND: &str = "No Result Found";
/// llm-facilitated-search 固定使用的模型与温度
pub const AGENT_SEARCH_MODEL: &str = "gpt-4";
pub const AGENT_SEARCH_TEMPERATURE: f32 = 0.7;

const AGENT_SEARCH_TEMPLATE: &str = "Choose the most relevant symbol for the query from the candidates below.\n\
Reply with exactly one candidate line and nothing else.\n\n\
Query: {query}\n\n\
Candidates:\n{results}";

/// 代码搜索工具变体
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchToolVariant {
    AgentFacilitatedSearch,
    SymbolSimilaritySearch,
    SymbolRankSearch,
    SymbolReferences,
    RetrieveSourceCode,
    ExactSearch,
}

impl SearchToolVariant {
    pub const ALL: [SearchToolVariant; 6] = [
        SearchToolVariant::AgentFacilitatedSearch,
        SearchToolVariant::SymbolSimilaritySearch,
        SearchToolVariant::SymbolRankSearch,
        SearchToolVariant::SymbolReferences,
        SearchToolVariant::RetrieveSourceCode,
        SearchToolVariant::ExactSearch,
    ];

    /// 工具名（模型调用时使用）
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchToolVariant::AgentFacilitatedSearch => "llm-facilitated-search",
            SearchToolVariant::SymbolSimilaritySearch => "symbol-similarity-search",
            SearchToolVariant::SymbolRankSearch => "symbol-rank-search",
            SearchToolVariant::SymbolReferences => "symbol-references",
            SearchToolVariant::RetrieveSourceCode => "retrieve-source-code-by-symbol",
            SearchToolVariant::ExactSearch => "exact-search",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            SearchToolVariant::AgentFacilitatedSearch => {
                "Searches the codebase for the symbol most relevant to a natural language query, \
                 letting the language model pick among similarity results. Returns a newline-separated list of symbols."
            }
            SearchToolVariant::SymbolSimilaritySearch => {
                "Returns symbols whose source is most similar to the query, newline-separated, most similar first."
            }
            SearchToolVariant::SymbolRankSearch => {
                "Returns the highest ranked symbols for the query, newline-separated, combining similarity and usage."
            }
            SearchToolVariant::SymbolReferences => {
                "Finds references to a symbol. Returns lines of the form file:[line:column, ...]."
            }
            SearchToolVariant::RetrieveSourceCode => {
                "Returns the source code of a symbol given its path, e.g. tools::registry::ToolSpec."
            }
            SearchToolVariant::ExactSearch => {
                "Performs an exact text search. Returns lines of the form file:[line, ...]."
            }
        }
    }
}

impl FromStr for SearchToolVariant {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SearchToolVariant::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| DispatchError::UnknownTool(s.to_string()))
    }
}

impl fmt::Display for SearchToolVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 代码搜索工具集构建器
#[derive(Clone)]
pub struct CodeSearchToolkitBuilder {
    search: Arc<dyn SymbolSearch>,
    llm: Arc<dyn LlmClient>,
    variants: Vec<SearchToolVariant>,
    top_n: usize,
}

impl CodeSearchToolkitBuilder {
    pub fn new(search: Arc<dyn SymbolSearch>, llm: Arc<dyn LlmClient>) -> Self {
        Self {
            search,
            llm,
            variants: SearchToolVariant::ALL.to_vec(),
            top_n: DEFAULT_TOP_N,
        }
    }

    pub fn from_dependencies(deps: &ToolkitDependencies) -> Result<Self, ConfigError> {
        let builder = Self::new(
            deps.symbol_search(ToolkitName::CodeSearch)?,
            deps.completion_provider(ToolkitName::CodeSearch)?,
        );
        Ok(match deps.top_n() {
            Some(top_n) => builder.with_top_n(top_n),
            None => builder,
        })
    }

    /// 指定要构建的变体；重复项只保留首次出现
    pub fn with_variants(mut self, variants: impl IntoIterator<Item = SearchToolVariant>) -> Self {
        let mut unique = Vec::new();
        for v in variants {
            if !unique.contains(&v) {
                unique.push(v);
            }
        }
        self.variants = unique;
        self
    }

    /// 按名称指定变体；未知名称返回 UnknownTool
    pub fn with_variant_names<I, S>(self, names: I) -> Result<Self, DispatchError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let variants = names
            .into_iter()
            .map(|n| n.as_ref().parse())
            .collect::<Result<Vec<SearchToolVariant>, _>>()?;
        Ok(self.with_variants(variants))
    }

    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n.max(1);
        self
    }

    pub fn variants(&self) -> &[SearchToolVariant] {
        &self.variants
    }

    pub fn top_n(&self) -> usize {
        self.top_n
    }

    /// 单个变体 → ToolSpec，name 即变体规范名
    pub fn build_tool(&self, variant: SearchToolVariant) -> ToolSpec {
        let this = self.clone();
        ToolSpec::new(
            variant.as_str(),
            variant.description(),
            tool_fn(move |query| {
                let this = this.clone();
                async move { this.run_processor(variant, &query).await }
            }),
        )
    }

    pub fn build_tool_named(&self, tool_id: &str) -> Result<ToolSpec, DispatchError> {
        Ok(self.build_tool(tool_id.parse()?))
    }

    /// 每次调用都重新 build()，与 build() 的输出保持一致
    pub async fn process_query(
        &self,
        variant: SearchToolVariant,
        query: &str,
    ) -> Result<String, AgentError> {
        let registry = ToolRegistry::from_specs(self.build())?;
        let tool = registry.lookup(variant.as_str())?;
        Ok(tool.call(query).await?)
    }

    async fn run_processor(&self, variant: SearchToolVariant, query: &str) -> Result<String, ToolError> {
        tracing::debug!(tool = %variant, query = %query, "code search");
        match variant {
            SearchToolVariant::AgentFacilitatedSearch => self.agent_facilitated_search(query).await,
            SearchToolVariant::SymbolSimilaritySearch => self.symbol_similarity_search(query),
            SearchToolVariant::SymbolRankSearch => self.symbol_rank_search(query),
            SearchToolVariant::SymbolReferences => self.symbol_references(query),
            SearchToolVariant::RetrieveSourceCode => self.retrieve_source_code(query),
            SearchToolVariant::ExactSearch => self.exact_search(query),
        }
    }

    fn similarity_dotpaths(&self, query: &str) -> Result<Vec<String>, ToolError> {
        Ok(self
            .search
            .code_similarity_results(query)?
            .into_iter()
            .map(|(symbol, _)| symbol.dotpath)
            .collect())
    }

    fn symbol_similarity_search(&self, query: &str) -> Result<String, ToolError> {
        let mut dotpaths = self.similarity_dotpaths(query)?;
        dotpaths.truncate(self.top_n);
        Ok(dotpaths.join("\n"))
    }

    fn symbol_rank_search(&self, query: &str) -> Result<String, ToolError> {
        Ok(self
            .search
            .symbol_rank_results(query)?
            .into_iter()
            .take(self.top_n)
            .map(|(symbol, _)| symbol.dotpath)
            .collect::<Vec<_>>()
            .join("\n"))
    }

    fn symbol_references(&self, query: &str) -> Result<String, ToolError> {
        Ok(self
            .search
            .symbol_references(query)?
            .into_iter()
            .take(self.top_n)
            .map(|(file, refs)| {
                let positions: Vec<String> = refs.iter().map(|r| r.to_string()).collect();
                format!("{}:[{}]", file, positions.join(", "))
            })
            .collect::<Vec<_>>()
            .join("\n"))
    }

    fn retrieve_source_code(&self, query: &str) -> Result<String, ToolError> {
        Ok(self
            .search
            .retrieve_source_code(query)?
            .unwrap_or_else(|| NO_RESULT_FOUND.to_string()))
    }

    fn exact_search(&self, query: &str) -> Result<String, ToolError> {
        Ok(self
            .search
            .exact_search(query)?
            .into_iter()
            .take(self.top_n)
            .map(|(file, lines)| {
                let lines: Vec<String> = lines.iter().map(|l| l.to_string()).collect();
                format!("{}:[{}]", file, lines.join(", "))
            })
            .collect::<Vec<_>>()
            .join("\n"))
    }

    async fn agent_facilitated_search(&self, query: &str) -> Result<String, ToolError> {
        let mut shown = self.similarity_dotpaths(query)?;
        if shown.is_empty() {
            return Ok(String::new());
        }
        // 模型只看到前 top_n 项，信任检查也只在这个窗口内进行
        shown.truncate(self.top_n);
        let prompt = AGENT_SEARCH_TEMPLATE
            .replace("{query}", query)
            .replace("{results}", &shown.join("\n"));
        let params = CompletionParams {
            model: Some(AGENT_SEARCH_MODEL.to_string()),
            temperature: AGENT_SEARCH_TEMPERATURE,
            stream: true,
        };

        let reordered = match self.llm.standalone_call(&prompt, &params).await {
            Ok(reply) => promote_trusted_pick(shown, reply.trim(), query),
            Err(e) => {
                tracing::warn!(error = %e, "llm-facilitated-search completion failed, using similarity ranking");
                shown
            }
        };
        Ok(reordered.join("\n"))
    }
}

impl ToolkitBuilder for CodeSearchToolkitBuilder {
    fn toolkit(&self) -> ToolkitName {
        ToolkitName::CodeSearch
    }

    fn build(&self) -> Vec<ToolSpec> {
        self.variants.iter().map(|&v| self.build_tool(v)).collect()
    }
}

/// 模型的选择必须恰好是展示给它的某个候选；命中则移到首位，否则保持原排序
fn promote_trusted_pick(mut ranked: Vec<String>, pick: &str, query: &str) -> Vec<String> {
    match ranked.iter().position(|candidate| candidate == pick) {
        Some(pos) => {
            let chosen = ranked.remove(pos);
            ranked.insert(0, chosen);
            ranked
        }
        None => {
            tracing::warn!(query = %query, pick = %pick, "Discarding LLM pick not present in similarity results");
            ranked
        }
    }
}
