//! 工具执行器
//!
//! 持有 ToolRegistry 与全局超时，execute(tool_name, args) 先按名查找（未知工具直接返回 UnknownTool），
//! 再在超时内调用；超时或失败时转为 ToolError；每次调用输出结构化审计日志（JSON）。

use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::time::timeout;

use crate::core::{AgentError, ToolError};
use crate::tools::{ToolRegistry, ToolSpec};

/// 工具执行器：对每次调用施加超时，并将结果映射为 AgentError
#[derive(Debug, Clone)]
pub struct ToolExecutor {
    registry: ToolRegistry,
    timeout: Duration,
}

impl ToolExecutor {
    pub fn new(registry: ToolRegistry, timeout_secs: u64) -> Self {
        Self {
            registry,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// 执行指定工具；未知工具返回 Dispatch 错误，超时返回 ToolError::Timeout
    pub async fn execute(&self, tool_name: &str, args: &Value) -> Result<String, AgentError> {
        let tool = self.registry.lookup(tool_name)?;
        let start = Instant::now();
        let result = timeout(self.timeout, tool.execute(args)).await;

        let (ok, outcome): (bool, &str) = match &result {
            Ok(Ok(_)) => (true, "ok"),
            Ok(Err(_)) => (false, "error"),
            Err(_) => (false, "timeout"),
        };
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": tool_name,
            "ok": ok,
            "outcome": outcome,
            "duration_ms": start.elapsed().as_millis() as u64,
            "args_preview": args_preview(args),
        });
        tracing::info!(audit = %audit, "tool");

        match result {
            Ok(Ok(content)) => Ok(content),
            Ok(Err(e)) => Err(AgentError::Tool(e)),
            Err(_) => Err(AgentError::Tool(ToolError::Timeout(tool_name.to_string()))),
        }
    }

    pub fn get_tool(&self, name: &str) -> Option<&ToolSpec> {
        self.registry.get(name)
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.registry.tool_names()
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }
}

fn args_preview(args: &Value) -> String {
    let s = args.to_string();
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DispatchError;
    use crate::tools::{tool_fn, ToolSpec};

    fn executor() -> ToolExecutor {
        let registry = ToolRegistry::from_specs([
            ToolSpec::new("ok", "", tool_fn(|q| async move { Ok(q) })),
            ToolSpec::new(
                "fails",
                "",
                tool_fn(|_| async { Err(ToolError::ExecutionFailed("boom".to_string())) }),
            ),
            ToolSpec::new(
                "slow",
                "",
                tool_fn(|_| async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok(String::new())
                }),
            ),
        ])
        .unwrap();
        ToolExecutor::new(registry, 1)
    }

    #[tokio::test]
    async fn test_execute_ok() {
        let result = executor().execute("ok", &serde_json::json!({"query": "Foo"})).await;
        assert_eq!(result.unwrap(), "Foo");
    }

    #[tokio::test]
    async fn test_unknown_tool_is_dispatch_error() {
        let err = executor()
            .execute("nope", &serde_json::json!({"query": "Foo"}))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AgentError::Dispatch(DispatchError::UnknownTool(ref name)) if name == "nope"
        ));
    }

    #[tokio::test]
    async fn test_tool_failure_is_tool_error() {
        let err = executor()
            .execute("fails", &serde_json::json!({"query": "x"}))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Tool(ToolError::ExecutionFailed(_))));
    }

    #[tokio::test]
    async fn test_timeout() {
        let err = executor()
            .execute("slow", &serde_json::json!({"query": "x"}))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Tool(ToolError::Timeout(ref t)) if t == "slow"));
    }
}
