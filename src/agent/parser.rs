//! 模型回复解析
//!
//! 以 `{` 开头或整段为 ```json 代码块的回复视为工具调用：{"tool": "...", "args": {"query": "..."}}；
//! 正文中夹带的 json 代码块只有含 tool 字段时才算调用。
//! 其余为纯文本完成。看起来是工具调用但 JSON 无法解析时返回 JsonParseError，由恢复引擎要求重试。

use serde::{Deserialize, Serialize};

use crate::core::AgentError;

/// 模型请求的工具调用
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub tool: String,
    #[serde(default)]
    pub args: serde_json::Value,
}

/// 一次回复的含义
#[derive(Debug, Clone, PartialEq)]
pub enum AgentReply {
    /// 任务完成，携带最终文本
    Completion(String),
    ToolCall(ToolCall),
}

pub fn parse_llm_output(output: &str) -> Result<AgentReply, AgentError> {
    let trimmed = output.trim();

    if trimmed.starts_with('{') {
        let json_str = trimmed
            .rfind('}')
            .map(|end| &trimmed[..=end])
            .unwrap_or(trimmed);
        return decode_tool_call(json_str, trimmed);
    }

    let Some(start) = trimmed.find("```json") else {
        return Ok(AgentReply::Completion(trimmed.to_string()));
    };
    let rest = &trimmed[start + 7..];
    let block = rest.find("```").map(|end| rest[..end].trim()).unwrap_or(rest.trim());

    // 整段回复就是一个 json 代码块：按工具调用严格解析
    if start == 0 {
        return decode_tool_call(block, trimmed);
    }
    // 正文中引用的 json 代码块只有带 tool 字段的对象才算调用
    match serde_json::from_str::<serde_json::Value>(block) {
        Ok(serde_json::Value::Object(map)) if map.contains_key("tool") => {
            decode_tool_call(block, trimmed)
        }
        _ => Ok(AgentReply::Completion(trimmed.to_string())),
    }
}

fn decode_tool_call(json_str: &str, full: &str) -> Result<AgentReply, AgentError> {
    let parsed: ToolCall = serde_json::from_str(json_str)
        .map_err(|e| AgentError::JsonParseError(format!("{}: {}", e, json_str)))?;

    if parsed.tool.trim().is_empty() {
        Ok(AgentReply::Completion(full.to_string()))
    } else {
        Ok(AgentReply::ToolCall(parsed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_completion() {
        assert_eq!(
            parse_llm_output("  Found it.  ").unwrap(),
            AgentReply::Completion("Found it.".to_string())
        );
    }

    #[test]
    fn test_code_block_is_completion() {
        let reply = "Here is the fix:\n```rust\nfn foo() { bar() }\n```";
        assert!(matches!(parse_llm_output(reply).unwrap(), AgentReply::Completion(_)));
    }

    #[test]
    fn test_json_tool_call() {
        let reply = r#"{"tool": "exact-search", "args": {"query": "Foo"}}"#;
        let AgentReply::ToolCall(call) = parse_llm_output(reply).unwrap() else {
            panic!("expected tool call");
        };
        assert_eq!(call.tool, "exact-search");
        assert_eq!(call.args["query"], "Foo");
    }

    #[test]
    fn test_fenced_json_tool_call() {
        let reply = "Let me search.\n```json\n{\"tool\": \"symbol-rank-search\", \"args\": {\"query\": \"Agent\"}}\n```";
        assert!(matches!(
            parse_llm_output(reply).unwrap(),
            AgentReply::ToolCall(ToolCall { ref tool, .. }) if tool == "symbol-rank-search"
        ));
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        let err = parse_llm_output(r#"{"tool": "exact-search", "args": "#).unwrap_err();
        assert!(matches!(err, AgentError::JsonParseError(_)));
    }

    #[test]
    fn test_empty_tool_is_completion() {
        assert!(matches!(
            parse_llm_output(r#"{"tool": "", "args": {}}"#).unwrap(),
            AgentReply::Completion(_)
        ));
    }

    #[test]
    fn test_answer_quoting_json_is_completion() {
        let reply = "The config looks like this:\n```json\n{\"model\": \"gpt-4\", \"temperature\": 0.7}\n```\nThat is the final answer.";
        assert_eq!(
            parse_llm_output(reply).unwrap(),
            AgentReply::Completion(reply.to_string())
        );
        let reply = "Example output:\n```json\n[1, 2, 3]\n```";
        assert!(matches!(parse_llm_output(reply).unwrap(), AgentReply::Completion(_)));
    }

    #[test]
    fn test_bare_json_fence_is_strict() {
        let reply = "```json\n{\"tool\": \"exact-search\", \"args\": \n```";
        assert!(matches!(
            parse_llm_output(reply).unwrap_err(),
            AgentError::JsonParseError(_)
        ));
    }
}
