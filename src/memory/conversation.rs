//! 对话轨迹
//!
//! Agent 的完整对话（指令、模型回复、工具调用与结果），按追加顺序保存，不做剪枝；
//! 评估器基于同一份轨迹提取 Action。

use serde::{Deserialize, Serialize};

/// 消息角色（Function 为工具返回结果）
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
    Function,
}

/// 模型请求的工具调用：{"tool": "...", "args": {...}}
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: serde_json::Value,
}

impl FunctionCall {
    pub fn new(name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }

    /// 取出 query 参数；args 本身为字符串时直接作为 query
    pub fn query(&self) -> Option<&str> {
        match &self.arguments {
            serde_json::Value::String(s) => Some(s.as_str()),
            other => other.get("query").and_then(|v| v.as_str()),
        }
    }
}

/// 单条消息
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// Function 消息对应的工具名
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Assistant 消息携带的工具调用
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,
}

impl Message {
    fn with_role(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            name: None,
            function_call: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, content)
    }

    /// 工具返回结果
    pub fn function(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::with_role(Role::Function, content)
        }
    }

    /// 携带工具调用的 assistant 消息
    pub fn assistant_call(content: impl Into<String>, call: FunctionCall) -> Self {
        Self {
            function_call: Some(call),
            ..Self::with_role(Role::Assistant, content)
        }
    }
}

/// 对话：有序消息列表
#[derive(Clone, Debug, Default)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, msg: Message) {
        self.messages.push(msg);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// 轨迹中所有工具调用（按出现顺序）
    pub fn function_calls(&self) -> impl Iterator<Item = &FunctionCall> {
        self.messages.iter().filter_map(|m| m.function_call.as_ref())
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }
}

impl From<Vec<Message>> for Conversation {
    fn from(messages: Vec<Message>) -> Self {
        Self { messages }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_call_query() {
        let call = FunctionCall::new("exact-search", serde_json::json!({"query": "Foo"}));
        assert_eq!(call.query(), Some("Foo"));

        let call = FunctionCall::new("exact-search", serde_json::json!("Bar"));
        assert_eq!(call.query(), Some("Bar"));

        let call = FunctionCall::new("exact-search", serde_json::json!({"path": "x"}));
        assert_eq!(call.query(), None);
    }

    #[test]
    fn test_conversation_collects_calls_in_order() {
        let mut conv = Conversation::new();
        conv.push(Message::user("find Foo"));
        conv.push(Message::assistant_call(
            "",
            FunctionCall::new("symbol-rank-search", serde_json::json!({"query": "Foo"})),
        ));
        conv.push(Message::function("symbol-rank-search", "a::Foo"));
        conv.push(Message::assistant_call(
            "",
            FunctionCall::new("exact-search", serde_json::json!({"query": "Foo"})),
        ));

        let names: Vec<&str> = conv.function_calls().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["symbol-rank-search", "exact-search"]);
        assert_eq!(conv.len(), 4);
    }

    #[test]
    fn test_message_serialization_skips_empty_fields() {
        let json = serde_json::to_value(Message::user("hi")).unwrap();
        assert_eq!(json, serde_json::json!({"role": "user", "content": "hi"}));
    }
}
