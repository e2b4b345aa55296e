//! 工作区符号索引
//!
//! 遍历项目根目录（跳过隐藏目录、target、node_modules），用正则提取 Rust 条目声明，
//! 构建一个只读索引。相似度为 token 重叠，排名在相似度基础上按引用频次加权。
//! 构建完成后不再修改，可在多个任务间共享。

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

use regex::Regex;

use crate::core::ToolError;
use crate::search::{Symbol, SymbolKind, SymbolReference, SymbolSearch};

/// 单个条目源码最多保留的行数
const MAX_SOURCE_LINES: usize = 200;
/// 遍历的最大目录深度
const MAX_WALK_DEPTH: usize = 16;

const DECL_PATTERN: &str = r#"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:(?:async|unsafe|const|extern\s+"[^"]*")\s+)*(fn|struct|enum|trait|type|const|static|mod)\s+([A-Za-z_][A-Za-z0-9_]*)"#;
const IDENT_PATTERN: &str = r"[A-Za-z_][A-Za-z0-9_]*";

struct IndexedFile {
    rel_path: String,
    content: String,
}

struct IndexedSymbol {
    symbol: Symbol,
    source: String,
    tokens: HashSet<String>,
}

/// 只读的工作区索引
pub struct WorkspaceSymbolIndex {
    root: PathBuf,
    files: Vec<IndexedFile>,
    symbols: Vec<IndexedSymbol>,
    identifier_counts: HashMap<String, usize>,
    decl_re: Regex,
}

impl WorkspaceSymbolIndex {
    /// 遍历 root，按文件名 glob（如 "*.rs"）收集最多 max_files 个文件并建立索引
    pub fn build(root: impl AsRef<Path>, include: &str, max_files: usize) -> Result<Self, ToolError> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(ToolError::Search(format!(
                "Project root not found: {}",
                root.display()
            )));
        }
        let include_pattern = glob::Pattern::new(include)
            .map_err(|e| ToolError::Search(format!("Invalid include pattern {include}: {e}")))?;

        let mut sources = Vec::new();
        for entry in walkdir::WalkDir::new(&root)
            .max_depth(MAX_WALK_DEPTH)
            .into_iter()
            .filter_entry(|e| {
                // 根目录本身可能是 "." 或临时目录，不参与过滤
                let name = e.file_name().to_string_lossy();
                e.depth() == 0
                    || (!name.starts_with('.') && name != "target" && name != "node_modules")
            })
            .filter_map(|e| e.ok())
        {
            if sources.len() >= max_files {
                tracing::warn!(max_files, "Index file limit reached, remaining files skipped");
                break;
            }
            if !entry.file_type().is_file() {
                continue;
            }
            let file_name = entry.file_name().to_string_lossy();
            if !include_pattern.matches(&file_name) {
                continue;
            }
            // 跳过无法按 UTF-8 读取的文件
            let Ok(content) = std::fs::read_to_string(entry.path()) else {
                continue;
            };
            let rel_path = entry
                .path()
                .strip_prefix(&root)
                .unwrap_or(entry.path())
                .to_string_lossy()
                .replace('\\', "/");
            sources.push((rel_path, content));
        }

        let index = Self::from_sources(root, sources)?;
        tracing::info!(
            files = index.files.len(),
            symbols = index.symbols.len(),
            root = %index.root.display(),
            "Workspace index built"
        );
        Ok(index)
    }

    /// 由 (相对路径, 内容) 直接建立索引
    pub fn from_sources<I, P, C>(root: impl Into<PathBuf>, sources: I) -> Result<Self, ToolError>
    where
        I: IntoIterator<Item = (P, C)>,
        P: Into<String>,
        C: Into<String>,
    {
        let decl_re = Regex::new(DECL_PATTERN).map_err(|e| ToolError::Search(e.to_string()))?;
        let ident_re = Regex::new(IDENT_PATTERN).map_err(|e| ToolError::Search(e.to_string()))?;

        let mut files: Vec<IndexedFile> = sources
            .into_iter()
            .map(|(p, c)| IndexedFile {
                rel_path: p.into(),
                content: c.into(),
            })
            .collect();
        files.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));

        let mut identifier_counts: HashMap<String, usize> = HashMap::new();
        let mut symbols = Vec::new();
        for file in &files {
            for m in ident_re.find_iter(&file.content) {
                *identifier_counts.entry(m.as_str().to_string()).or_default() += 1;
            }
            symbols.extend(extract_symbols(&decl_re, file));
        }

        Ok(Self {
            root: root.into(),
            files,
            symbols,
            identifier_counts,
            decl_re,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn symbol_count(&self) -> usize {
        self.symbols.len()
    }

    fn reference_count(&self, name: &str) -> usize {
        // 减去声明本身
        self.identifier_counts
            .get(name)
            .copied()
            .unwrap_or(0)
            .saturating_sub(1)
    }

    fn similarity_scores(&self, query: &str) -> Vec<(&IndexedSymbol, f64)> {
        let query_tokens = tokenize(query);
        if query_tokens.is_empty() {
            return Vec::new();
        }
        let query_lower = query.trim().to_lowercase();
        self.symbols
            .iter()
            .filter_map(|s| {
                let overlap = query_tokens.intersection(&s.tokens).count();
                if overlap == 0 {
                    return None;
                }
                let mut score =
                    overlap as f64 / ((query_tokens.len() * s.tokens.len()) as f64).sqrt();
                if s.symbol.name().to_lowercase() == query_lower {
                    score += 0.5;
                }
                Some((s, score))
            })
            .collect()
    }
}

fn sort_by_score(mut scored: Vec<(Symbol, f64)>) -> Vec<(Symbol, f64)> {
    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.dotpath.cmp(&b.0.dotpath))
    });
    scored
}

impl SymbolSearch for WorkspaceSymbolIndex {
    fn symbol_rank_results(&self, query: &str) -> Result<Vec<(Symbol, f64)>, ToolError> {
        let weight = |s: &IndexedSymbol| 1.0 + (1.0 + self.reference_count(s.symbol.name()) as f64).ln();
        let scored: Vec<(Symbol, f64)> = if tokenize(query).is_empty() {
            self.symbols
                .iter()
                .map(|s| (s.symbol.clone(), weight(s)))
                .collect()
        } else {
            self.similarity_scores(query)
                .into_iter()
                .map(|(s, sim)| (s.symbol.clone(), sim * weight(s)))
                .collect()
        };
        Ok(sort_by_score(scored))
    }

    fn code_similarity_results(&self, query: &str) -> Result<Vec<(Symbol, f64)>, ToolError> {
        let scored = self
            .similarity_scores(query)
            .into_iter()
            .map(|(s, sim)| (s.symbol.clone(), sim))
            .collect();
        Ok(sort_by_score(scored))
    }

    fn symbol_references(
        &self,
        symbol: &str,
    ) -> Result<BTreeMap<String, Vec<SymbolReference>>, ToolError> {
        let name = last_segment(symbol);
        let mut refs = BTreeMap::new();
        if name.is_empty() {
            return Ok(refs);
        }
        let word = Regex::new(&format!(r"\b{}\b", regex::escape(name)))
            .map_err(|e| ToolError::Search(e.to_string()))?;

        for file in &self.files {
            let mut found = Vec::new();
            for (i, line) in file.content.lines().enumerate() {
                let is_declaration = self
                    .decl_re
                    .captures(line)
                    .and_then(|c| c.get(2))
                    .is_some_and(|m| m.as_str() == name);
                if is_declaration {
                    continue;
                }
                found.extend(word.find_iter(line).map(|m| SymbolReference {
                    line: i + 1,
                    column: m.start() + 1,
                }));
            }
            if !found.is_empty() {
                refs.insert(file.rel_path.clone(), found);
            }
        }
        Ok(refs)
    }

    fn retrieve_source_code(&self, symbol: &str) -> Result<Option<String>, ToolError> {
        let symbol = symbol.trim();
        let exact = self.symbols.iter().find(|s| s.symbol.dotpath == symbol);
        let found = exact.or_else(|| {
            let name = last_segment(symbol);
            self.symbols.iter().find(|s| s.symbol.name() == name)
        });
        Ok(found.map(|s| s.source.clone()))
    }

    fn exact_search(&self, pattern: &str) -> Result<BTreeMap<String, Vec<usize>>, ToolError> {
        let mut hits = BTreeMap::new();
        if pattern.is_empty() {
            return Ok(hits);
        }
        for file in &self.files {
            let lines: Vec<usize> = file
                .content
                .lines()
                .enumerate()
                .filter(|(_, line)| line.contains(pattern))
                .map(|(i, _)| i + 1)
                .collect();
            if !lines.is_empty() {
                hits.insert(file.rel_path.clone(), lines);
            }
        }
        Ok(hits)
    }

    fn overview(&self) -> String {
        let mut per_module: BTreeMap<String, usize> = BTreeMap::new();
        for s in &self.symbols {
            let module = s
                .symbol
                .dotpath
                .rsplit_once("::")
                .map(|(m, _)| m.to_string())
                .unwrap_or_else(|| "crate".to_string());
            *per_module.entry(module).or_default() += 1;
        }
        let mut lines = vec![format!(
            "Indexed {} files and {} symbols.",
            self.files.len(),
            self.symbols.len()
        )];
        lines.extend(
            per_module
                .iter()
                .take(50)
                .map(|(module, count)| format!("- {module} ({count} symbols)")),
        );
        lines.join("\n")
    }
}

/// `a::b::Foo` / `a.b.Foo` → `Foo`
fn last_segment(symbol: &str) -> &str {
    let symbol = symbol.trim();
    let after_colons = symbol.rsplit("::").next().unwrap_or(symbol);
    after_colons.rsplit('.').next().unwrap_or(after_colons)
}

/// `src/tools/registry.rs` → `tools::registry`；`src/lib.rs` / `src/main.rs` → 空
fn module_path(rel_path: &str) -> String {
    let without_ext = rel_path
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(rel_path);
    let mut segments: Vec<&str> = without_ext.split('/').filter(|s| !s.is_empty()).collect();
    if segments.first() == Some(&"src") {
        segments.remove(0);
    }
    if matches!(segments.last(), Some(&"mod")) {
        segments.pop();
    }
    if segments.len() == 1 && matches!(segments[0], "lib" | "main") {
        segments.clear();
    }
    segments.join("::")
}

/// 标识符拆分为小写 token：snake_case 与 CamelCase 均拆开，同时保留完整词
fn tokenize(text: &str) -> HashSet<String> {
    let mut tokens = HashSet::new();
    for word in text.split(|c: char| !c.is_alphanumeric()) {
        if word.is_empty() {
            continue;
        }
        let mut current = String::new();
        let mut prev_lower = false;
        for c in word.chars() {
            if c.is_uppercase() && prev_lower && !current.is_empty() {
                push_token(&mut tokens, &current);
                current.clear();
            }
            prev_lower = c.is_lowercase() || c.is_ascii_digit();
            current.push(c);
        }
        push_token(&mut tokens, &current);
        push_token(&mut tokens, word);
    }
    tokens
}

fn push_token(tokens: &mut HashSet<String>, token: &str) {
    if token.chars().count() >= 2 {
        tokens.insert(token.to_lowercase());
    }
}

fn extract_symbols(decl_re: &Regex, file: &IndexedFile) -> Vec<IndexedSymbol> {
    let module = module_path(&file.rel_path);
    let lines: Vec<&str> = file.content.lines().collect();
    let mut symbols = Vec::new();

    for (i, line) in lines.iter().enumerate() {
        // 测试模块中的条目不入索引
        if line.trim_start().starts_with("#[cfg(test)]") {
            break;
        }
        let Some(caps) = decl_re.captures(line) else {
            continue;
        };
        let (Some(keyword), Some(name)) = (caps.get(1), caps.get(2)) else {
            continue;
        };
        let Some(kind) = SymbolKind::from_keyword(keyword.as_str()) else {
            continue;
        };
        let name = name.as_str();
        let dotpath = if module.is_empty() {
            name.to_string()
        } else {
            format!("{module}::{name}")
        };

        let source = item_source(&lines[i..]);
        let mut tokens = tokenize(name);
        tokens.extend(tokenize(line));
        tokens.extend(doc_comment_above(&lines, i).iter().flat_map(|d| tokenize(d)));

        symbols.push(IndexedSymbol {
            symbol: Symbol {
                dotpath,
                kind,
                file: PathBuf::from(&file.rel_path),
                line: i + 1,
            },
            source,
            tokens,
        });
    }
    symbols
}

/// 从声明行开始按花括号配平截取条目源码
fn item_source(lines: &[&str]) -> String {
    let mut depth: i64 = 0;
    let mut opened = false;
    let mut taken = Vec::new();
    for line in lines.iter().take(MAX_SOURCE_LINES) {
        taken.push(*line);
        for c in line.chars() {
            match c {
                '{' => {
                    depth += 1;
                    opened = true;
                }
                '}' => depth -= 1,
                _ => {}
            }
        }
        if opened && depth <= 0 {
            break;
        }
        if !opened && line.trim_end().ends_with(';') {
            break;
        }
    }
    taken.join("\n")
}

fn doc_comment_above<'a>(lines: &[&'a str], decl_line: usize) -> Vec<&'a str> {
    let mut docs = Vec::new();
    for line in lines[..decl_line].iter().rev() {
        let trimmed = line.trim_start();
        if let Some(doc) = trimmed.strip_prefix("///") {
            docs.push(doc);
        } else if trimmed.starts_with("#[") {
            continue;
        } else {
            break;
        }
    }
    docs
}
