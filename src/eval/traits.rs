//! 评估器抽象
//!
//! 每个评估器只负责自己能识别的动作类型：从对话轨迹中提取该类动作，并与同类期望动作比较。

use crate::core::EvalError;
use crate::eval::{Action, EvalResult};
use crate::memory::Conversation;

pub trait Evaluator: Send + Sync {
    fn name(&self) -> &str;

    /// 该评估器是否负责这一类动作
    fn handles(&self, action: &Action) -> bool;

    fn extract_actions(&self, conversation: &Conversation) -> Result<Vec<Action>, EvalError>;

    /// 只用自己负责的期望动作进行比较
    fn evaluate(&self, conversation: &Conversation, expected: &[Action]) -> Result<EvalResult, EvalError> {
        let expected: Vec<Action> = expected.iter().filter(|a| self.handles(a)).cloned().collect();
        let observed = self.extract_actions(conversation)?;
        Ok(EvalResult::compute(observed, expected))
    }
}
