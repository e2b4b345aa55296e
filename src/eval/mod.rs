//! 评估：从对话轨迹提取动作并与期望动作比较

pub mod action;
pub mod code_writing;
pub mod composite;
pub mod function_call;
pub mod result;
pub mod traits;

pub use action::{query_of, Action};
pub use code_writing::CodeWritingEval;
pub use composite::{CompositeEvalResult, EvalComposite, EvalSummary, EvaluatorReport};
pub use function_call::FunctionCallEval;
pub use result::{EvalResult, MatchResult};
pub use traits::Evaluator;
