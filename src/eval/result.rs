//! 评估结果

use serde::Serialize;

use crate::eval::Action;

/// 单个期望动作是否在轨迹中出现
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    pub expected: Action,
    pub matched: bool,
}

/// 一次评估的结果，生成后不再修改
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvalResult {
    pub actions_observed: Vec<Action>,
    pub actions_expected: Vec<Action>,
    pub match_results: Vec<MatchResult>,
    /// 没有对应期望的观测动作
    pub extra_actions: Vec<Action>,
    pub full_match: bool,
    /// 命中的期望动作占比；没有期望时为 1.0
    pub score: f64,
}

impl EvalResult {
    /// 每个期望动作按顺序匹配第一个尚未使用且满足它的观测动作
    pub fn compute(actions_observed: Vec<Action>, actions_expected: Vec<Action>) -> Self {
        let mut used = vec![false; actions_observed.len()];
        let match_results: Vec<MatchResult> = actions_expected
            .iter()
            .map(|expected| {
                let hit = actions_observed
                    .iter()
                    .enumerate()
                    .find(|(i, observed)| !used[*i] && expected.is_satisfied_by(observed))
                    .map(|(i, _)| i);
                if let Some(i) = hit {
                    used[i] = true;
                }
                MatchResult {
                    expected: expected.clone(),
                    matched: hit.is_some(),
                }
            })
            .collect();

        let extra_actions = actions_observed
            .iter()
            .zip(&used)
            .filter(|(_, used)| !**used)
            .map(|(a, _)| a.clone())
            .collect();

        Self::from_parts(actions_observed, actions_expected, match_results, extra_actions)
    }

    pub(crate) fn from_parts(
        actions_observed: Vec<Action>,
        actions_expected: Vec<Action>,
        match_results: Vec<MatchResult>,
        extra_actions: Vec<Action>,
    ) -> Self {
        let matched = match_results.iter().filter(|m| m.matched).count();
        let score = if match_results.is_empty() {
            1.0
        } else {
            matched as f64 / match_results.len() as f64
        };
        Self {
            full_match: matched == match_results.len(),
            actions_observed,
            actions_expected,
            match_results,
            extra_actions,
            score,
        }
    }

    pub fn matched_count(&self) -> usize {
        self.match_results.iter().filter(|m| m.matched).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_match_and_extras() {
        let observed = vec![
            Action::function_call("symbol-rank-search", "Foo"),
            Action::function_call("exact-search", "Foo"),
        ];
        let expected = vec![Action::function_call("exact-search", "Foo")];
        let result = EvalResult::compute(observed, expected);
        assert!(result.full_match);
        assert_eq!(result.score, 1.0);
        assert_eq!(result.extra_actions, vec![Action::function_call("symbol-rank-search", "Foo")]);
    }

    #[test]
    fn test_each_observation_used_once() {
        let observed = vec![Action::function_call("exact-search", "Foo")];
        let expected = vec![
            Action::function_call("exact-search", "Foo"),
            Action::function_call("exact-search", "Foo"),
        ];
        let result = EvalResult::compute(observed, expected);
        assert!(!result.full_match);
        assert_eq!(result.matched_count(), 1);
        assert_eq!(result.score, 0.5);
    }

    #[test]
    fn test_no_expectations() {
        let result = EvalResult::compute(vec![], vec![]);
        assert!(result.full_match);
        assert_eq!(result.score, 1.0);
    }
}
