//! 任务执行器
//!
//! EnvReady → Running → 调用策略（不持有任务锁）→ Succeeded 或 Failed。
//! 策略返回错误时任务进入 Failed 并记录错误，错误原样返回给调用方。

use std::sync::Arc;

use crate::core::TaskError;
use crate::tasks::{SharedTask, TaskExecution, TaskOutcome, TaskStatus};

#[derive(Clone)]
pub struct TaskExecutor {
    strategy: Arc<dyn TaskExecution>,
}

impl TaskExecutor {
    pub fn new(strategy: impl TaskExecution + 'static) -> Self {
        Self {
            strategy: Arc::new(strategy),
        }
    }

    pub fn from_strategy(strategy: Arc<dyn TaskExecution>) -> Self {
        Self { strategy }
    }

    pub async fn execute(&self, task: &SharedTask) -> Result<TaskOutcome, TaskError> {
        let snapshot = {
            let mut task = task.lock().await;
            task.transition(TaskStatus::Running)?;
            task.clone()
        };
        tracing::info!(task_id = %snapshot.id, "Task running");

        let result = self.strategy.execute(&snapshot).await;

        let mut task = task.lock().await;
        match result {
            Ok(outcome) => {
                task.record_success(&outcome)?;
                tracing::info!(task_id = %task.id, "Task succeeded");
                Ok(outcome)
            }
            Err(e) => {
                task.fail(&e);
                tracing::error!(task_id = %task.id, error = %e, "Task failed");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::agent::AgentConfigName;
    use crate::core::AgentError;
    use crate::llm::MockLlmClient;
    use crate::tasks::{AgentTaskExecution, DryRunExecution, Task, TaskRegistry};

    struct Failing;

    #[async_trait]
    impl TaskExecution for Failing {
        async fn execute(&self, _task: &crate::tasks::Task) -> Result<TaskOutcome, TaskError> {
            Err(TaskError::Execution(AgentError::MaxIterationsExceeded { max_iterations: 1 }))
        }
    }

    async fn ready_task(id: &str) -> SharedTask {
        let task = TaskRegistry::new()
            .register(Task::new("find symbol Foo", AgentConfigName::Test).with_id(id))
            .await
            .unwrap();
        task.lock().await.transition(TaskStatus::EnvReady).unwrap();
        task
    }

    #[tokio::test]
    async fn test_failure_marks_failed_and_resurfaces() {
        let task = ready_task("f").await;
        let err = TaskExecutor::new(Failing).execute(&task).await.unwrap_err();
        assert!(matches!(err, TaskError::Execution(AgentError::MaxIterationsExceeded { .. })));
        let task = task.lock().await;
        assert_eq!(task.status(), TaskStatus::Failed);
        assert!(task.error().unwrap().contains("Maximum iterations"));
    }

    #[tokio::test]
    async fn test_success_marks_succeeded() {
        let task = ready_task("s").await;
        let llm = Arc::new(MockLlmClient::scripted(["Foo lives in src/lib.rs"]));
        let outcome = TaskExecutor::new(AgentTaskExecution::new(llm))
            .execute(&task)
            .await
            .unwrap();
        assert_eq!(outcome.response.as_deref(), Some("Foo lives in src/lib.rs"));
        let task = task.lock().await;
        assert_eq!(task.status(), TaskStatus::Succeeded);
        assert_eq!(task.conversation().len(), 2);
        assert_eq!(task.result(), Some("Foo lives in src/lib.rs"));
    }

    #[tokio::test]
    async fn test_requires_env_ready() {
        let task = TaskRegistry::new()
            .register(Task::new("x", AgentConfigName::Test))
            .await
            .unwrap();
        let err = TaskExecutor::new(DryRunExecution).execute(&task).await.unwrap_err();
        assert!(matches!(err, TaskError::InvalidTransition { from: TaskStatus::Registered, .. }));
        assert_eq!(task.lock().await.status(), TaskStatus::Registered);
    }

    #[tokio::test]
    async fn test_config_error_fails_task() {
        let task = TaskRegistry::new()
            .register(Task::new("x", AgentConfigName::Test).with_temperature(3.0))
            .await
            .unwrap();
        task.lock().await.transition(TaskStatus::EnvReady).unwrap();
        let err = TaskExecutor::new(DryRunExecution).execute(&task).await.unwrap_err();
        assert!(matches!(err, TaskError::Config(_)));
        assert_eq!(task.lock().await.status(), TaskStatus::Failed);
    }
}
