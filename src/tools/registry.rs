//! 工具注册表
//!
//! ToolSpec 是构建完成后不可变的可调用工具（name / description / handler）；
//! ToolRegistry 按注册顺序保存，名称唯一，按名查找。

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde_json::Value;

use crate::core::{DispatchError, ToolError};

/// 工具处理函数：接收 query，异步返回文本结果
pub type ToolFn = Arc<dyn Fn(String) -> BoxFuture<'static, Result<String, ToolError>> + Send + Sync>;

/// 单个工具：名称在一次构建的工具集中唯一
#[derive(Clone)]
pub struct ToolSpec {
    name: String,
    description: String,
    function: ToolFn,
}

impl ToolSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>, function: ToolFn) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            function,
        }
    }

    /// 工具名称（模型调用时 JSON 中的 "tool" 字段）
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 工具描述（供 LLM 理解功能）
    pub fn description(&self) -> &str {
        &self.description
    }

    /// 参数 JSON Schema：所有工具统一接收一个 query 字符串
    pub fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The query string to search for."
                }
            },
            "required": ["query"]
        })
    }

    pub async fn call(&self, query: &str) -> Result<String, ToolError> {
        (self.function)(query.to_string()).await
    }

    /// 以模型给出的 args 调用：{"query": "..."} 或直接为字符串
    pub async fn execute(&self, args: &Value) -> Result<String, ToolError> {
        let query = match args {
            Value::String(s) => s.as_str(),
            other => other
                .get("query")
                .and_then(|v| v.as_str())
                .ok_or_else(|| {
                    ToolError::InvalidArguments(format!(
                        "{} expects {{\"query\": string}}, got {}",
                        self.name, other
                    ))
                })?,
        };
        self.call(query).await
    }
}

impl fmt::Debug for ToolSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolSpec")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// 工具注册表：保持注册顺序，拒绝重名
#[derive(Default, Clone, Debug)]
pub struct ToolRegistry {
    tools: Vec<ToolSpec>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_specs(specs: impl IntoIterator<Item = ToolSpec>) -> Result<Self, DispatchError> {
        let mut registry = Self::new();
        for spec in specs {
            registry.register(spec)?;
        }
        Ok(registry)
    }

    pub fn register(&mut self, tool: ToolSpec) -> Result<(), DispatchError> {
        if self.index.contains_key(tool.name()) {
            return Err(DispatchError::DuplicateTool(tool.name().to_string()));
        }
        self.index.insert(tool.name().to_string(), self.tools.len());
        self.tools.push(tool);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ToolSpec> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    /// 按名查找，不存在时返回 UnknownTool
    pub fn lookup(&self, name: &str) -> Result<&ToolSpec, DispatchError> {
        self.get(name)
            .ok_or_else(|| DispatchError::UnknownTool(name.to_string()))
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name().to_string()).collect()
    }

    pub fn tools(&self) -> &[ToolSpec] {
        &self.tools
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// 返回 (name, description) 列表，用于生成 prompt 中的 Available tools 段落
    pub fn tool_descriptions(&self) -> Vec<(String, String)> {
        self.tools
            .iter()
            .map(|t| (t.name().to_string(), t.description().to_string()))
            .collect()
    }

    /// 工具 schema JSON：name / description / parameters，供 completion provider 提供函数调用
    pub fn to_schema_json(&self) -> String {
        let tools: Vec<Value> = self
            .tools
            .iter()
            .map(|tool| {
                serde_json::json!({
                    "name": tool.name(),
                    "description": tool.description(),
                    "parameters": tool.parameters_schema()
                })
            })
            .collect();
        serde_json::to_string_pretty(&tools).unwrap_or_else(|_| "[]".to_string())
    }
}

/// 用闭包构造 ToolFn
pub fn tool_fn<F, Fut>(f: F) -> ToolFn
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<String, ToolError>> + Send + 'static,
{
    Arc::new(move |query: String| -> BoxFuture<'static, Result<String, ToolError>> {
        Box::pin(f(query))
    })
}
