//! 任务执行环境
//!
//! setup 把 Registered 的任务推进到 EnvReady；已是 EnvReady 时为空操作。
//! 准备过程中出错时任务状态不变，可以直接重试。

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::core::TaskError;
use crate::tasks::{SharedTask, Task, TaskStatus};

const TASK_RECORD_FILE: &str = "task.json";

#[async_trait]
pub trait TaskEnvironment: Send + Sync {
    /// Registered → EnvReady；重复调用安全
    async fn setup(&self, task: &SharedTask) -> Result<(), TaskError>;

    async fn teardown(&self, task: &SharedTask) -> Result<(), TaskError>;
}

/// 在 `<root>/<task_id>/` 下为每个任务建立目录并写入 task.json
#[derive(Debug, Clone)]
pub struct LocalWorkspaceEnvironment {
    root: PathBuf,
}

impl LocalWorkspaceEnvironment {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn task_dir(&self, task_id: &str) -> PathBuf {
        self.root.join(task_id)
    }

    /// 覆盖写入任务记录（包括执行后的对话轨迹）
    pub async fn persist(&self, task: &Task) -> Result<PathBuf, TaskError> {
        let dir = self.task_dir(&task.id);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| TaskError::Environment(format!("create {}: {}", dir.display(), e)))?;
        let path = dir.join(TASK_RECORD_FILE);
        let json = serde_json::to_string_pretty(&task.record())
            .map_err(|e| TaskError::Environment(e.to_string()))?;
        tokio::fs::write(&path, json)
            .await
            .map_err(|e| TaskError::Environment(format!("write {}: {}", path.display(), e)))?;
        Ok(path)
    }
}

#[async_trait]
impl TaskEnvironment for LocalWorkspaceEnvironment {
    async fn setup(&self, task: &SharedTask) -> Result<(), TaskError> {
        let mut task = task.lock().await;
        match task.status() {
            TaskStatus::EnvReady => {
                tracing::debug!(task_id = %task.id, "Environment already ready");
                return Ok(());
            }
            TaskStatus::Registered => {}
            other => {
                return Err(TaskError::InvalidTransition {
                    from: other,
                    to: TaskStatus::EnvReady,
                })
            }
        }

        // 先写盘再推进状态，写盘失败时任务仍是 Registered
        let mut ready = task.clone();
        ready.transition(TaskStatus::EnvReady)?;
        let path = self.persist(&ready).await?;
        task.transition(TaskStatus::EnvReady)?;
        tracing::info!(task_id = %task.id, record = %path.display(), "Task environment ready");
        Ok(())
    }

    async fn teardown(&self, task: &SharedTask) -> Result<(), TaskError> {
        let id = task.lock().await.id.clone();
        let dir = self.task_dir(&id);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => {
                tracing::info!(task_id = %id, "Task environment removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(TaskError::Environment(format!(
                "remove {}: {}",
                dir.display(),
                e
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentConfigName;
    use crate::tasks::TaskRegistry;

    async fn registered(id: &str) -> SharedTask {
        TaskRegistry::new()
            .register(Task::new("find symbol Foo", AgentConfigName::Test).with_id(id))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_setup_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let env = LocalWorkspaceEnvironment::new(dir.path());
        let task = registered("t1").await;

        env.setup(&task).await.unwrap();
        env.setup(&task).await.unwrap();
        assert_eq!(task.lock().await.status(), TaskStatus::EnvReady);

        let record = std::fs::read_to_string(env.task_dir("t1").join("task.json")).unwrap();
        let json: serde_json::Value = serde_json::from_str(&record).unwrap();
        assert_eq!(json["status"], "ENV_READY");
        assert_eq!(json["instructions"], "find symbol Foo");
    }

    #[tokio::test]
    async fn test_setup_failure_leaves_task_registered() {
        let dir = tempfile::tempdir().unwrap();
        // root 是普通文件，无法在其下建目录
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "x").unwrap();
        let env = LocalWorkspaceEnvironment::new(&blocker);
        let task = registered("t2").await;

        assert!(matches!(env.setup(&task).await, Err(TaskError::Environment(_))));
        assert_eq!(task.lock().await.status(), TaskStatus::Registered);

        let env = LocalWorkspaceEnvironment::new(dir.path().join("ok"));
        env.setup(&task).await.unwrap();
        assert_eq!(task.lock().await.status(), TaskStatus::EnvReady);
    }

    #[tokio::test]
    async fn test_setup_rejects_running_task() {
        let dir = tempfile::tempdir().unwrap();
        let env = LocalWorkspaceEnvironment::new(dir.path());
        let task = registered("t3").await;
        env.setup(&task).await.unwrap();
        task.lock().await.transition(TaskStatus::Running).unwrap();
        assert!(matches!(
            env.setup(&task).await,
            Err(TaskError::InvalidTransition { from: TaskStatus::Running, .. })
        ));
    }

    #[tokio::test]
    async fn test_teardown_removes_directory() {
        let dir = tempfile::tempdir().unwrap();
        let env = LocalWorkspaceEnvironment::new(dir.path());
        let task = registered("t4").await;
        env.setup(&task).await.unwrap();
        env.teardown(&task).await.unwrap();
        assert!(!env.task_dir("t4").exists());
        env.teardown(&task).await.unwrap();
    }
}
