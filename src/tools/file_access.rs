//! 沙箱文件工具集
//!
//! SafeFs 绑定 root_dir，所有路径经 resolve 校验必须在 root 下（禁止 ../ 逃逸）；
//! FileAccessToolkitBuilder 基于 SafeFs 提供 read-file / list-directory / write-file。

use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use serde::Deserialize;

use crate::core::{ConfigError, DispatchError, ToolError};
use crate::tools::{tool_fn, ToolSpec, ToolkitBuilder, ToolkitDependencies, ToolkitName};

/// 沙箱文件系统：绑定根目录，resolve 校验路径在根下，防止路径逃逸
#[derive(Debug, Clone)]
pub struct SafeFs {
    root_dir: PathBuf,
}

impl SafeFs {
    pub fn new(root_dir: impl AsRef<Path>) -> Self {
        let root = root_dir.as_ref().to_path_buf();
        let root_dir = root.canonicalize().unwrap_or(root);
        Self { root_dir }
    }

    pub fn root(&self) -> &Path {
        &self.root_dir
    }

    /// 检查已存在路径是否在沙箱内
    pub fn resolve(&self, path: &str) -> Result<PathBuf, ToolError> {
        let path = path.trim().trim_start_matches("./");
        let full = self.root_dir.join(path);
        let canonical = full
            .canonicalize()
            .map_err(|_| ToolError::ExecutionFailed(format!("Path not found: {}", path)))?;
        if canonical.starts_with(&self.root_dir) {
            Ok(canonical)
        } else {
            Err(ToolError::PathEscape(path.to_string())) // 如 ../../etc/passwd
        }
    }

    /// 写入目标可以尚不存在：只允许普通相对路径分量
    fn resolve_for_write(&self, path: &str) -> Result<PathBuf, ToolError> {
        let path = path.trim().trim_start_matches("./");
        let relative = Path::new(path);
        if path.is_empty() || !relative.components().all(|c| matches!(c, Component::Normal(_))) {
            return Err(ToolError::PathEscape(path.to_string()));
        }
        Ok(self.root_dir.join(relative))
    }

    pub fn read_file(&self, path: &str) -> Result<String, ToolError> {
        let resolved = self.resolve(path)?;
        std::fs::read_to_string(&resolved)
            .map_err(|e| ToolError::ExecutionFailed(format!("Read failed: {}", e)))
    }

    pub fn list_dir(&self, path: &str) -> Result<Vec<String>, ToolError> {
        let path = path.trim();
        let base = if path.is_empty() || path == "." {
            self.root_dir.clone()
        } else {
            self.resolve(path)?
        };
        let mut entries = Vec::new();
        for e in std::fs::read_dir(&base)
            .map_err(|e| ToolError::ExecutionFailed(format!("List failed: {}", e)))?
        {
            let e = e.map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;
            let name = e.file_name().to_string_lossy().to_string();
            if !name.starts_with('.') {
                let ty = if e.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                    "/"
                } else {
                    ""
                };
                entries.push(format!("{}{}", name, ty));
            }
        }
        entries.sort();
        Ok(entries)
    }

    pub fn write_file(&self, path: &str, content: &str) -> Result<usize, ToolError> {
        let target = self.resolve_for_write(path)?;
        // 目标本身不能是符号链接，否则写入会穿透到链接指向处
        if std::fs::symlink_metadata(&target).is_ok_and(|m| m.file_type().is_symlink()) {
            return Err(ToolError::PathEscape(path.to_string()));
        }
        if let Some(parent) = target.parent() {
            // 先校验最深的已存在祖先，再创建缺失目录
            let existing = parent
                .ancestors()
                .find(|p| p.exists())
                .unwrap_or(&self.root_dir);
            let existing_canon = existing
                .canonicalize()
                .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;
            if !existing_canon.starts_with(&self.root_dir) {
                return Err(ToolError::PathEscape(path.to_string()));
            }
            std::fs::create_dir_all(parent)
                .map_err(|e| ToolError::ExecutionFailed(format!("Create dir failed: {}", e)))?;
            let parent_canon = parent
                .canonicalize()
                .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;
            if !parent_canon.starts_with(&self.root_dir) {
                return Err(ToolError::PathEscape(path.to_string()));
            }
        }
        std::fs::write(&target, content)
            .map_err(|e| ToolError::ExecutionFailed(format!("Write failed: {}", e)))?;
        Ok(content.len())
    }
}

/// 文件工具变体
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileToolVariant {
    ReadFile,
    ListDirectory,
    WriteFile,
}

impl FileToolVariant {
    pub const ALL: [FileToolVariant; 3] = [
        FileToolVariant::ReadFile,
        FileToolVariant::ListDirectory,
        FileToolVariant::WriteFile,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FileToolVariant::ReadFile => "read-file",
            FileToolVariant::ListDirectory => "list-directory",
            FileToolVariant::WriteFile => "write-file",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            FileToolVariant::ReadFile => "Reads a file. Query: path relative to the workspace root.",
            FileToolVariant::ListDirectory => {
                "Lists a directory, directories suffixed with '/'. Query: path relative to the workspace root, '.' for the root."
            }
            FileToolVariant::WriteFile => {
                "Writes a file. Query: JSON {\"path\": ..., \"content\": ...} or the path on the first line followed by the content."
            }
        }
    }
}

impl FromStr for FileToolVariant {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FileToolVariant::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| DispatchError::UnknownTool(s.to_string()))
    }
}

impl fmt::Display for FileToolVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Deserialize)]
struct WriteRequest {
    path: String,
    content: String,
}

fn parse_write_query(query: &str) -> Result<WriteRequest, ToolError> {
    if let Ok(req) = serde_json::from_str::<WriteRequest>(query.trim()) {
        return Ok(req);
    }
    match query.split_once('\n') {
        Some((path, content)) if !path.trim().is_empty() => Ok(WriteRequest {
            path: path.trim().to_string(),
            content: content.to_string(),
        }),
        _ => Err(ToolError::InvalidArguments(
            "write-file expects {\"path\", \"content\"} or path and content on separate lines".to_string(),
        )),
    }
}

/// 文件工具集构建器
#[derive(Debug, Clone)]
pub struct FileAccessToolkitBuilder {
    fs: Arc<SafeFs>,
    variants: Vec<FileToolVariant>,
}

impl FileAccessToolkitBuilder {
    pub fn new(fs: Arc<SafeFs>) -> Self {
        Self {
            fs,
            variants: FileToolVariant::ALL.to_vec(),
        }
    }

    pub fn from_dependencies(deps: &ToolkitDependencies) -> Result<Self, ConfigError> {
        Ok(Self::new(deps.workspace(ToolkitName::FileAccess)?))
    }

    pub fn with_variants(mut self, variants: impl IntoIterator<Item = FileToolVariant>) -> Self {
        let mut unique = Vec::new();
        for v in variants {
            if !unique.contains(&v) {
                unique.push(v);
            }
        }
        self.variants = unique;
        self
    }

    pub fn build_tool(&self, variant: FileToolVariant) -> ToolSpec {
        let fs = Arc::clone(&self.fs);
        ToolSpec::new(
            variant.as_str(),
            variant.description(),
            tool_fn(move |query| {
                let fs = Arc::clone(&fs);
                async move {
                    tracing::info!(tool = %variant, query = %query, "file tool execute");
                    match variant {
                        FileToolVariant::ReadFile => fs.read_file(&query),
                        FileToolVariant::ListDirectory => Ok(fs.list_dir(&query)?.join("\n")),
                        FileToolVariant::WriteFile => {
                            let req = parse_write_query(&query)?;
                            let written = fs.write_file(&req.path, &req.content)?;
                            Ok(format!("Wrote {} bytes to {}", written, req.path))
                        }
                    }
                }
            }),
        )
    }
}

impl ToolkitBuilder for FileAccessToolkitBuilder {
    fn toolkit(&self) -> ToolkitName {
        ToolkitName::FileAccess
    }

    fn build(&self) -> Vec<ToolSpec> {
        self.variants.iter().map(|&v| self.build_tool(v)).collect()
    }
}
