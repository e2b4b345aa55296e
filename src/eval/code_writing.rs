//! 代码编写评估：assistant 回复中的 ``` 代码块

use regex::Regex;

use crate::core::EvalError;
use crate::eval::{Action, Evaluator};
use crate::memory::{Conversation, Role};

const CODE_BLOCK_PATTERN: &str = r"(?s)```([A-Za-z0-9_+\-]*)[ \t]*\r?\n(.*?)```";

#[derive(Debug, Default)]
pub struct CodeWritingEval;

impl CodeWritingEval {
    pub fn new() -> Self {
        Self
    }
}

impl Evaluator for CodeWritingEval {
    fn name(&self) -> &str {
        "code_writing"
    }

    fn handles(&self, action: &Action) -> bool {
        matches!(action, Action::CodeWriting { .. })
    }

    fn extract_actions(&self, conversation: &Conversation) -> Result<Vec<Action>, EvalError> {
        let block = Regex::new(CODE_BLOCK_PATTERN).map_err(|e| EvalError::Evaluator {
            evaluator: self.name().to_string(),
            reason: e.to_string(),
        })?;
        let mut actions = Vec::new();
        for message in conversation.messages() {
            if message.role != Role::Assistant || message.function_call.is_some() {
                continue;
            }
            for caps in block.captures_iter(&message.content) {
                let language = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
                // json 代码块是工具调用
                if language == "json" {
                    continue;
                }
                let snippet = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
                let language = (!language.is_empty()).then_some(language);
                actions.push(Action::code_writing(language, snippet.trim_end()));
            }
        }
        Ok(actions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::Message;

    #[test]
    fn test_extracts_fenced_blocks() {
        let mut conversation = Conversation::new();
        conversation.push(Message::user("write a function"));
        conversation.push(Message::assistant(
            "Here:\n```rust\nfn add(a: i32, b: i32) -> i32 {\n    a + b\n}\n```\nand a shell line\n```\ncargo fmt\n```",
        ));
        let actions = CodeWritingEval::new().extract_actions(&conversation).unwrap();
        assert_eq!(actions.len(), 2);
        assert_eq!(
            actions[0],
            Action::code_writing(Some("rust"), "fn add(a: i32, b: i32) -> i32 {\n    a + b\n}")
        );
        assert_eq!(actions[1], Action::code_writing(None, "cargo fmt"));
    }

    #[test]
    fn test_skips_user_turns_and_json_blocks() {
        let mut conversation = Conversation::new();
        conversation.push(Message::user("```rust\nfn not_agent() {}\n```"));
        conversation.push(Message::assistant("```json\n{\"tool\": \"x\"}\n```"));
        assert!(CodeWritingEval::new()
            .extract_actions(&conversation)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_evaluate_snippet_containment() {
        let mut conversation = Conversation::new();
        conversation.push(Message::assistant("```rust\nfn main() {\n    let x = 1;\n}\n```"));
        let result = CodeWritingEval::new()
            .evaluate(&conversation, &[Action::code_writing(Some("rust"), "let x = 1;")])
            .unwrap();
        assert!(result.full_match);
    }
}
