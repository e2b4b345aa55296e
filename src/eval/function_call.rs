//! 工具调用评估：轨迹中 assistant 消息携带的 function_call

use crate::core::EvalError;
use crate::eval::{Action, Evaluator};
use crate::memory::Conversation;

#[derive(Debug, Default)]
pub struct FunctionCallEval;

impl FunctionCallEval {
    pub fn new() -> Self {
        Self
    }
}

impl Evaluator for FunctionCallEval {
    fn name(&self) -> &str {
        "function_call"
    }

    fn handles(&self, action: &Action) -> bool {
        matches!(action, Action::FunctionCall { .. })
    }

    fn extract_actions(&self, conversation: &Conversation) -> Result<Vec<Action>, EvalError> {
        Ok(conversation
            .function_calls()
            .map(|call| Action::FunctionCall {
                name: call.name.clone(),
                arguments: call.arguments.clone(),
            })
            .collect())
    }
}
