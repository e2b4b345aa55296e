//! 任务注册表
//!
//! register 在写锁内完成「检查 id + 插入」，并发注册同一 id 时只有一个成功。
//! 与未结束的任务 id 冲突时拒绝；同 id 的终态记录会被新任务替换。

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use crate::core::{ConfigError, TaskError};
use crate::tasks::{SharedTask, Task, TaskStatus};

#[derive(Clone, Default)]
pub struct TaskRegistry {
    tasks: Arc<RwLock<HashMap<String, SharedTask>>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Created → Registered，返回共享句柄
    pub async fn register(&self, mut task: Task) -> Result<SharedTask, TaskError> {
        if task.id.trim().is_empty() {
            return Err(ConfigError::InvalidField {
                field: "id",
                reason: "must not be empty".to_string(),
            }
            .into());
        }
        let mut tasks = self.tasks.write().await;
        if let Some(existing) = tasks.get(&task.id) {
            // 锁被占用说明任务正在执行
            let finished = existing
                .try_lock()
                .map(|t| t.status().is_terminal())
                .unwrap_or(false);
            if !finished {
                tracing::warn!(task_id = %task.id, "Rejected duplicate task registration");
                return Err(TaskError::DuplicateTask(task.id));
            }
        }
        task.transition(TaskStatus::Registered)?;
        let id = task.id.clone();
        let shared = Arc::new(Mutex::new(task));
        tasks.insert(id.clone(), Arc::clone(&shared));
        tracing::info!(task_id = %id, "Task registered");
        Ok(shared)
    }

    pub async fn get(&self, id: &str) -> Option<SharedTask> {
        self.tasks.read().await.get(id).cloned()
    }

    pub async fn status(&self, id: &str) -> Result<TaskStatus, TaskError> {
        let task = self
            .get(id)
            .await
            .ok_or_else(|| TaskError::NotFound(id.to_string()))?;
        let status = task.lock().await.status();
        Ok(status)
    }

    /// 所有任务 id（排序）
    pub async fn list(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.tasks.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub async fn fetch_by_status(&self, status: TaskStatus) -> Vec<SharedTask> {
        let tasks: Vec<SharedTask> = self.tasks.read().await.values().cloned().collect();
        let mut matching = Vec::new();
        for task in tasks {
            if task.lock().await.status() == status {
                matching.push(task);
            }
        }
        matching
    }

    pub async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tasks.read().await.is_empty()
    }
}
