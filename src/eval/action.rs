//! 评估比较的基本单元：agent 产生的一次动作

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    /// 工具调用
    FunctionCall {
        name: String,
        #[serde(default)]
        arguments: Value,
    },
    /// 回复中以代码块写出的代码
    CodeWriting {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        language: Option<String>,
        snippet: String,
    },
}

impl Action {
    pub fn function_call(name: impl Into<String>, query: impl Into<String>) -> Self {
        Action::FunctionCall {
            name: name.into(),
            arguments: serde_json::json!({ "query": query.into() }),
        }
    }

    pub fn code_writing(language: Option<&str>, snippet: impl Into<String>) -> Self {
        Action::CodeWriting {
            language: language.map(str::to_string),
            snippet: snippet.into(),
        }
    }

    /// 把 self 当作期望动作，判断 observed 是否满足它
    pub fn is_satisfied_by(&self, observed: &Action) -> bool {
        match (self, observed) {
            (
                Action::FunctionCall { name, arguments },
                Action::FunctionCall {
                    name: observed_name,
                    arguments: observed_args,
                },
            ) => name == observed_name && arguments_match(arguments, observed_args),
            (
                Action::CodeWriting { language, snippet },
                Action::CodeWriting {
                    language: observed_lang,
                    snippet: observed_snippet,
                },
            ) => {
                let language_ok = match (language, observed_lang) {
                    (None, _) => true,
                    (Some(l), Some(o)) => l.eq_ignore_ascii_case(o),
                    (Some(_), None) => false,
                };
                language_ok && normalize_code(observed_snippet).contains(&normalize_code(snippet))
            }
            _ => false,
        }
    }
}

/// 参数中的 query；参数本身为字符串时即为 query
pub fn query_of(arguments: &Value) -> Option<&str> {
    match arguments {
        Value::String(s) => Some(s.as_str()),
        other => other.get("query").and_then(|v| v.as_str()),
    }
}

fn arguments_match(expected: &Value, observed: &Value) -> bool {
    match expected {
        Value::Null => true,
        Value::String(q) => query_of(observed).is_some_and(|o| o.trim() == q.trim()),
        Value::Object(fields) => fields.iter().all(|(key, value)| {
            if key == "query" {
                match (value.as_str(), query_of(observed)) {
                    (Some(e), Some(o)) => e.trim() == o.trim(),
                    _ => false,
                }
            } else {
                observed.get(key) == Some(value)
            }
        }),
        other => other == observed,
    }
}

/// 去掉每行首尾空白与空行，忽略缩进差异
fn normalize_code(code: &str) -> String {
    code.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_call_matching() {
        let expected = Action::function_call("exact-search", "Foo");
        assert!(expected.is_satisfied_by(&Action::FunctionCall {
            name: "exact-search".to_string(),
            arguments: serde_json::json!({"query": " Foo "}),
        }));
        assert!(expected.is_satisfied_by(&Action::FunctionCall {
            name: "exact-search".to_string(),
            arguments: serde_json::json!("Foo"),
        }));
        assert!(!expected.is_satisfied_by(&Action::function_call("exact-search", "Bar")));
        assert!(!expected.is_satisfied_by(&Action::function_call("symbol-references", "Foo")));
    }

    #[test]
    fn test_any_arguments_when_expected_null() {
        let expected = Action::FunctionCall {
            name: "exact-search".to_string(),
            arguments: Value::Null,
        };
        assert!(expected.is_satisfied_by(&Action::function_call("exact-search", "anything")));
    }

    #[test]
    fn test_code_writing_containment() {
        let expected = Action::code_writing(Some("rust"), "let x = 1;");
        let observed = Action::code_writing(Some("Rust"), "fn main() {\n    let x = 1;\n}");
        assert!(expected.is_satisfied_by(&observed));
        assert!(!expected.is_satisfied_by(&Action::code_writing(None, "let x = 1;")));
        assert!(Action::code_writing(None, "let x = 1;").is_satisfied_by(&observed));
        assert!(!expected.is_satisfied_by(&Action::function_call("x", "let x = 1;")));
    }

    #[test]
    fn test_serde_shape() {
        let json = serde_json::to_value(Action::function_call("exact-search", "Foo")).unwrap();
        assert_eq!(json["type"], "function_call");
        assert_eq!(json["arguments"]["query"], "Foo");
        let parsed: Action =
            serde_json::from_str(r#"{"type": "code_writing", "snippet": "x = 1"}"#).unwrap();
        assert_eq!(parsed, Action::code_writing(None, "x = 1"));
    }
}
