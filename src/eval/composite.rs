//! 组合评估
//!
//! 在同一份轨迹上依次运行所有评估器，单个评估器失败只记录在它自己的报告里；
//! 合并结论在全部评估器运行完之后计算，只要有评估器失败就不会是完全匹配。

use serde::Serialize;

use crate::core::EvalError;
use crate::eval::{Action, CodeWritingEval, EvalResult, Evaluator, FunctionCallEval, MatchResult};
use crate::memory::Conversation;
use crate::tasks::{SharedTask, TaskExecutor, TaskStatus};

/// 单个评估器的结果
#[derive(Debug)]
pub struct EvaluatorReport {
    pub evaluator: String,
    pub result: Result<EvalResult, EvalError>,
}

/// 组合评估结果
#[derive(Debug)]
pub struct CompositeEvalResult {
    pub task_id: String,
    pub reports: Vec<EvaluatorReport>,
    pub merged: EvalResult,
}

impl CompositeEvalResult {
    pub fn is_full_match(&self) -> bool {
        self.failed_evaluators().is_empty() && self.merged.full_match
    }

    pub fn failed_evaluators(&self) -> Vec<&str> {
        self.reports
            .iter()
            .filter(|r| r.result.is_err())
            .map(|r| r.evaluator.as_str())
            .collect()
    }

    /// 便于输出的摘要
    pub fn summary(&self) -> EvalSummary {
        EvalSummary {
            task_id: self.task_id.clone(),
            full_match: self.is_full_match(),
            score: self.merged.score,
            evaluators: self
                .reports
                .iter()
                .map(|r| EvaluatorSummary {
                    evaluator: r.evaluator.clone(),
                    full_match: r.result.as_ref().ok().map(|res| res.full_match),
                    error: r.result.as_ref().err().map(|e| e.to_string()),
                })
                .collect(),
            result: self.merged.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EvalSummary {
    pub task_id: String,
    pub full_match: bool,
    pub score: f64,
    pub evaluators: Vec<EvaluatorSummary>,
    pub result: EvalResult,
}

#[derive(Debug, Serialize)]
pub struct EvaluatorSummary {
    pub evaluator: String,
    pub full_match: Option<bool>,
    pub error: Option<String>,
}

pub struct EvalComposite {
    evaluators: Vec<Box<dyn Evaluator>>,
}

impl EvalComposite {
    pub fn new(evaluators: Vec<Box<dyn Evaluator>>) -> Self {
        Self { evaluators }
    }

    /// 每次调用都返回新的评估器实例
    pub fn default_evaluators() -> Vec<Box<dyn Evaluator>> {
        vec![Box::new(FunctionCallEval::new()), Box::new(CodeWritingEval::new())]
    }

    pub fn with_default_evaluators() -> Self {
        Self::new(Self::default_evaluators())
    }

    pub fn evaluator_names(&self) -> Vec<&str> {
        self.evaluators.iter().map(|e| e.name()).collect()
    }

    /// 任务尚未执行时先通过 executor 执行，再在其轨迹上评估
    pub async fn generate_eval_result(
        &self,
        task: &SharedTask,
        expected: &[Action],
        executor: &TaskExecutor,
    ) -> Result<CompositeEvalResult, EvalError> {
        let (task_id, status) = {
            let task = task.lock().await;
            (task.id.clone(), task.status())
        };
        match status {
            TaskStatus::Succeeded => {}
            TaskStatus::Failed => return Err(EvalError::MissingTrace(task_id)),
            _ => {
                executor.execute(task).await?;
            }
        }
        let conversation = task.lock().await.conversation();
        Ok(self.evaluate_conversation(task_id, &conversation, expected))
    }

    pub fn evaluate_conversation(
        &self,
        task_id: impl Into<String>,
        conversation: &Conversation,
        expected: &[Action],
    ) -> CompositeEvalResult {
        let task_id = task_id.into();
        let reports: Vec<EvaluatorReport> = self
            .evaluators
            .iter()
            .map(|evaluator| {
                let result = evaluator.evaluate(conversation, expected);
                if let Err(e) = &result {
                    tracing::warn!(task_id = %task_id, evaluator = evaluator.name(), error = %e, "Evaluator failed");
                }
                EvaluatorReport {
                    evaluator: evaluator.name().to_string(),
                    result,
                }
            })
            .collect();

        let merged = self.merge(&reports, expected);
        tracing::info!(
            task_id = %task_id,
            full_match = merged.full_match,
            score = merged.score,
            "Evaluation finished"
        );
        CompositeEvalResult {
            task_id,
            reports,
            merged,
        }
    }

    /// 每个期望动作由负责它的评估器判定；没有评估器负责或负责的评估器失败时记为未命中
    fn merge(&self, reports: &[EvaluatorReport], expected: &[Action]) -> EvalResult {
        let mut cursors = vec![0usize; reports.len()];
        let match_results: Vec<MatchResult> = expected
            .iter()
            .map(|action| {
                let mut matched = false;
                for (i, (evaluator, report)) in self.evaluators.iter().zip(reports).enumerate() {
                    if !evaluator.handles(action) {
                        continue;
                    }
                    if let Ok(result) = &report.result {
                        matched |= result
                            .match_results
                            .get(cursors[i])
                            .is_some_and(|m| m.matched);
                    }
                    cursors[i] += 1;
                }
                MatchResult {
                    expected: action.clone(),
                    matched,
                }
            })
            .collect();

        let ok_results = reports.iter().filter_map(|r| r.result.as_ref().ok());
        let mut observed = Vec::new();
        let mut extra = Vec::new();
        for result in ok_results {
            observed.extend(result.actions_observed.iter().cloned());
            extra.extend(result.extra_actions.iter().cloned());
        }

        let mut merged = EvalResult::from_parts(observed, expected.to_vec(), match_results, extra);
        if reports.iter().any(|r| r.result.is_err()) {
            merged.full_match = false;
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{FunctionCall, Message};

    struct Broken;

    impl Evaluator for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn handles(&self, action: &Action) -> bool {
            matches!(action, Action::CodeWriting { .. })
        }

        fn extract_actions(&self, _conversation: &Conversation) -> Result<Vec<Action>, EvalError> {
            Err(EvalError::Evaluator {
                evaluator: "broken".to_string(),
                reason: "cannot parse trace".to_string(),
            })
        }
    }

    fn trace_with_call(name: &str, query: &str) -> Conversation {
        let mut conversation = Conversation::new();
        conversation.push(Message::user("find symbol Foo"));
        conversation.push(Message::assistant_call(
            "",
            FunctionCall::new(name, serde_json::json!({ "query": query })),
        ));
        conversation.push(Message::function(name, "src/lib.rs:[1]"));
        conversation.push(Message::assistant("```rust\npub struct Foo;\n```"));
        conversation
    }

    #[test]
    fn test_mixed_expectations_full_match() {
        let composite = EvalComposite::with_default_evaluators();
        let expected = [
            Action::function_call("exact-search", "Foo"),
            Action::code_writing(Some("rust"), "pub struct Foo;"),
        ];
        let result = composite.evaluate_conversation("t", &trace_with_call("exact-search", "Foo"), &expected);
        assert!(result.is_full_match());
        assert_eq!(result.merged.actions_expected.len(), 2);
        assert_eq!(result.reports.len(), 2);
    }

    #[test]
    fn test_missing_call_is_non_match() {
        let composite = EvalComposite::with_default_evaluators();
        let expected = [Action::function_call("exact-search", "Foo")];
        let result =
            composite.evaluate_conversation("t", &trace_with_call("symbol-rank-search", "Foo"), &expected);
        assert!(!result.is_full_match());
        assert_eq!(result.merged.score, 0.0);
        assert_eq!(result.merged.extra_actions.len(), 2);
    }

    #[test]
    fn test_failing_evaluator_reported_without_aborting_siblings() {
        let composite = EvalComposite::new(vec![Box::new(Broken), Box::new(FunctionCallEval::new())]);
        let expected = [Action::function_call("exact-search", "Foo")];
        let result = composite.evaluate_conversation("t", &trace_with_call("exact-search", "Foo"), &expected);

        assert_eq!(result.failed_evaluators(), vec!["broken"]);
        assert!(result.reports[1].result.as_ref().unwrap().full_match);
        assert!(result.merged.match_results[0].matched);
        assert!(!result.merged.full_match);
        assert!(!result.is_full_match());
    }

    #[test]
    fn test_unhandled_expectation_is_unmatched() {
        let composite = EvalComposite::new(vec![Box::new(FunctionCallEval::new())]);
        let expected = [Action::code_writing(None, "pub struct Foo;")];
        let result = composite.evaluate_conversation("t", &trace_with_call("exact-search", "Foo"), &expected);
        assert!(!result.is_full_match());
    }

    #[test]
    fn test_default_evaluators_are_fresh() {
        let a = EvalComposite::default_evaluators();
        let b = EvalComposite::default_evaluators();
        assert_eq!(a.len(), b.len());
        let names: Vec<&str> = a.iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["function_call", "code_writing"]);
    }

    #[test]
    fn test_summary_serializes() {
        let composite = EvalComposite::with_default_evaluators();
        let result = composite.evaluate_conversation("t", &trace_with_call("exact-search", "Foo"), &[]);
        let json = serde_json::to_value(result.summary()).unwrap();
        assert_eq!(json["task_id"], "t");
        assert_eq!(json["full_match"], true);
    }
}
