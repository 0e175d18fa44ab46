use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use uuid::Uuid;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    config::Settings,
    error::ApiError,
};

/// Task status enumeration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

/// Metadata and tracking information for one background scan task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskInfo {
    pub id: Uuid,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub progress: f32, // 0.0 to 1.0
    pub message: Option<String>,
    pub error: Option<String>,
    pub metadata: serde_json::Value,
}

impl TaskInfo {
    pub fn new(id: Uuid, metadata: serde_json::Value) -> Self {
        Self {
            id,
            status: TaskStatus::Pending,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            progress: 0.0,
            message: None,
            error: None,
            metadata,
        }
    }

    pub fn start(&mut self) {
        self.status = TaskStatus::Running;
        self.started_at = Some(Utc::now());
    }

    pub fn complete(&mut self) {
        self.status = TaskStatus::Completed;
        self.completed_at = Some(Utc::now());
        self.progress = 1.0;
    }

    pub fn fail(&mut self, error: String) {
        self.status = TaskStatus::Failed;
        self.completed_at = Some(Utc::now());
        self.error = Some(error);
    }

    pub fn cancel(&mut self) {
        self.status = TaskStatus::Cancelled;
        self.completed_at = Some(Utc::now());
    }

    pub fn update_progress(&mut self, progress: f32, message: Option<String>) {
        self.progress = progress.clamp(0.0, 1.0);
        self.message = message;
    }

    pub fn is_active(&self) -> bool {
        matches!(self.status, TaskStatus::Pending | TaskStatus::Running)
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.status, TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled)
    }
}

/// Task execution context handed to the scan closure
pub struct TaskContext {
    pub task_id: Uuid,
    pub task_manager: Arc<TaskManager>,
}

impl TaskContext {
    pub async fn update_progress(&self, progress: f32, message: Option<String>) -> Result<(), ApiError> {
        self.task_manager.update_task_progress(self.task_id, progress, message).await
    }

    pub async fn check_cancellation(&self) -> Result<(), ApiError> {
        if self.task_manager.is_task_cancelled(self.task_id).await {
            Err(ApiError::Validation("Task was cancelled".to_string()))
        } else {
            Ok(())
        }
    }
}

/// Background task manager with concurrency control and cancellation support.
///
/// Tasks are keyed by the scan id they execute, so cancelling a scan and
/// cancelling its task are the same operation.
pub struct TaskManager {
    settings: Arc<Settings>,
    tasks: Arc<RwLock<HashMap<Uuid, TaskInfo>>>,
    active_handles: Arc<Mutex<HashMap<Uuid, JoinHandle<()>>>>,
    concurrency_semaphore: Arc<tokio::sync::Semaphore>,
}

impl TaskManager {
    pub fn new(settings: Arc<Settings>) -> Self {
        let max_concurrent = settings.max_concurrent_scans as usize;

        Self {
            settings,
            tasks: Arc::new(RwLock::new(HashMap::new())),
            active_handles: Arc::new(Mutex::new(HashMap::new())),
            concurrency_semaphore: Arc::new(tokio::sync::Semaphore::new(max_concurrent)),
        }
    }

    /// Submit a new task for execution under the given id
    pub async fn submit_task<F>(&self, task_id: Uuid, metadata: serde_json::Value, task_fn: F) -> Result<Uuid, ApiError>
    where
        F: Fn(TaskContext) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), ApiError>> + Send>> + Send + Sync + 'static,
    {
        let task_info = TaskInfo::new(task_id, metadata);

        // Store task info
        {
            let mut tasks = self.tasks.write().await;
            tasks.insert(task_id, task_info);
        }

        // Spawn background task
        let task_manager = Arc::new(self.clone());
        let semaphore = self.concurrency_semaphore.clone();

        let handle = tokio::spawn(async move {
            // Acquire semaphore permit for concurrency control. The semaphore
            // is never closed, so acquisition only fails during teardown.
            let _permit = match semaphore.acquire().await {
                Ok(permit) => permit,
                Err(_) => return,
            };

            // The task may have been cancelled while queued behind the permit
            if task_manager.is_task_cancelled(task_id).await {
                return;
            }

            // Create task context
            let context = TaskContext {
                task_id,
                task_manager: task_manager.clone(),
            };

            // Mark task as started
            if let Err(e) = task_manager.start_task(task_id).await {
                tracing::error!("Failed to start task {}: {}", task_id, e);
                return;
            }

            // Execute the task
            match task_fn(context).await {
                Ok(()) => {
                    if let Err(e) = task_manager.complete_task(task_id).await {
                        tracing::error!("Failed to complete task {}: {}", task_id, e);
                    }
                }
                Err(e) => {
                    if let Err(err) = task_manager.fail_task(task_id, e.to_string()).await {
                        tracing::error!("Failed to mark task {} as failed: {}", task_id, err);
                    }
                }
            }

            // Remove from active handles
            {
                let mut handles = task_manager.active_handles.lock().await;
                handles.remove(&task_id);
            }
        });

        // Store the handle
        {
            let mut handles = self.active_handles.lock().await;
            handles.insert(task_id, handle);
        }

        tracing::info!("Submitted scan task {}", task_id);
        Ok(task_id)
    }

    /// Get task information by ID
    pub async fn get_task(&self, task_id: Uuid) -> Option<TaskInfo> {
        let tasks = self.tasks.read().await;
        tasks.get(&task_id).cloned()
    }

    /// List all tasks, optionally filtered by status
    pub async fn list_tasks(&self, status: Option<TaskStatus>) -> Vec<TaskInfo> {
        let tasks = self.tasks.read().await;
        tasks.values()
            .filter(|task| status.as_ref().map_or(true, |wanted| &task.status == wanted))
            .cloned()
            .collect()
    }

    /// Get active (running or pending) tasks
    pub async fn get_active_tasks(&self) -> Vec<TaskInfo> {
        let tasks = self.tasks.read().await;
        tasks.values()
            .filter(|task| task.is_active())
            .cloned()
            .collect()
    }

    /// Cancel a task by ID
    pub async fn cancel_task(&self, task_id: Uuid) -> Result<(), ApiError> {
        // Update task status
        {
            let mut tasks = self.tasks.write().await;
            if let Some(task) = tasks.get_mut(&task_id) {
                if task.is_active() {
                    task.cancel();
                    tracing::info!("Cancelled task {}", task_id);
                } else {
                    return Err(ApiError::Validation("Task is not active".to_string()));
                }
            } else {
                return Err(ApiError::not_found("Task not found"));
            }
        }

        // Abort the task handle if it exists
        {
            let mut handles = self.active_handles.lock().await;
            if let Some(handle) = handles.remove(&task_id) {
                handle.abort();
            }
        }

        Ok(())
    }

    /// Cancel all active tasks
    pub async fn cancel_all_tasks(&self) -> Result<usize, ApiError> {
        let active_task_ids: Vec<Uuid> = {
            let tasks = self.tasks.read().await;
            tasks.values()
                .filter(|task| task.is_active())
                .map(|task| task.id)
                .collect()
        };

        let mut cancelled_count = 0;
        for task_id in active_task_ids {
            if self.cancel_task(task_id).await.is_ok() {
                cancelled_count += 1;
            }
        }

        tracing::info!("Cancelled {} active tasks", cancelled_count);
        Ok(cancelled_count)
    }

    /// Clean up finished tasks older than the specified duration
    pub async fn cleanup_old_tasks(&self, max_age: chrono::Duration) -> Result<usize, ApiError> {
        let cutoff_time = Utc::now() - max_age;
        let mut removed_count = 0;

        {
            let mut tasks = self.tasks.write().await;
            let task_ids_to_remove: Vec<Uuid> = tasks.values()
                .filter(|task| {
                    task.is_finished() &&
                    task.completed_at.map_or(false, |completed| completed < cutoff_time)
                })
                .map(|task| task.id)
                .collect();

            for task_id in task_ids_to_remove {
                tasks.remove(&task_id);
                removed_count += 1;
            }
        }

        if removed_count > 0 {
            tracing::info!("Cleaned up {} old completed tasks", removed_count);
        }

        Ok(removed_count)
    }

    /// Get task manager statistics
    pub async fn get_statistics(&self) -> TaskManagerStats {
        let tasks = self.tasks.read().await;
        let mut stats = TaskManagerStats::default();

        for task in tasks.values() {
            stats.total_tasks += 1;
            match task.status {
                TaskStatus::Pending => stats.pending_tasks += 1,
                TaskStatus::Running => stats.running_tasks += 1,
                TaskStatus::Completed => stats.completed_tasks += 1,
                TaskStatus::Failed => stats.failed_tasks += 1,
                TaskStatus::Cancelled => stats.cancelled_tasks += 1,
            }
        }

        stats.available_slots = self.concurrency_semaphore.available_permits();
        stats.max_concurrent = self.settings.max_concurrent_scans as usize;

        stats
    }

    /// Check if a task is cancelled
    pub async fn is_task_cancelled(&self, task_id: Uuid) -> bool {
        let tasks = self.tasks.read().await;
        tasks.get(&task_id)
            .map(|task| task.status == TaskStatus::Cancelled)
            .unwrap_or(false)
    }

    /// Internal method to start a task
    async fn start_task(&self, task_id: Uuid) -> Result<(), ApiError> {
        let mut tasks = self.tasks.write().await;
        if let Some(task) = tasks.get_mut(&task_id) {
            task.start();
            tracing::info!("Started task {}", task_id);
            Ok(())
        } else {
            Err(ApiError::not_found("Task not found"))
        }
    }

    /// Internal method to complete a task. Cancellation is terminal, so a
    /// task that was cancelled while finishing keeps its cancelled status.
    async fn complete_task(&self, task_id: Uuid) -> Result<(), ApiError> {
        let mut tasks = self.tasks.write().await;
        if let Some(task) = tasks.get_mut(&task_id) {
            if task.status != TaskStatus::Cancelled {
                task.complete();
                tracing::info!("Completed task {}", task_id);
            }
            Ok(())
        } else {
            Err(ApiError::not_found("Task not found"))
        }
    }

    /// Internal method to fail a task. A cancelled task stays cancelled even
    /// when its future unwinds with an error.
    async fn fail_task(&self, task_id: Uuid, error: String) -> Result<(), ApiError> {
        let mut tasks = self.tasks.write().await;
        if let Some(task) = tasks.get_mut(&task_id) {
            if task.status != TaskStatus::Cancelled {
                task.fail(error.clone());
                tracing::warn!("Failed task {}: {}", task_id, error);
            }
            Ok(())
        } else {
            Err(ApiError::not_found("Task not found"))
        }
    }

    /// Internal method to update task progress
    async fn update_task_progress(&self, task_id: Uuid, progress: f32, message: Option<String>) -> Result<(), ApiError> {
        let mut tasks = self.tasks.write().await;
        if let Some(task) = tasks.get_mut(&task_id) {
            task.update_progress(progress, message);
            Ok(())
        } else {
            Err(ApiError::not_found("Task not found"))
        }
    }

    /// Wait for all active tasks to complete (useful for testing and shutdown)
    pub async fn wait_for_all_tasks(&self) -> Result<(), ApiError> {
        loop {
            let active_count = {
                let tasks = self.tasks.read().await;
                tasks.values().filter(|task| task.is_active()).count()
            };

            if active_count == 0 {
                break;
            }

            tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
        }

        Ok(())
    }

    /// Graceful shutdown - cancel all tasks and wait for completion
    pub async fn shutdown(&self) -> Result<(), ApiError> {
        tracing::info!("Shutting down task manager...");

        // Cancel all active tasks
        let cancelled_count = self.cancel_all_tasks().await?;

        // Wait a bit for tasks to handle cancellation
        if cancelled_count > 0 {
            tokio::time::sleep(tokio::time::Duration::from_secs(1)).await;
        }

        // Abort any remaining handles
        {
            let mut handles = self.active_handles.lock().await;
            for (task_id, handle) in handles.drain() {
                tracing::debug!("Aborting task handle {}", task_id);
                handle.abort();
            }
        }

        tracing::info!("Task manager shutdown complete");
        Ok(())
    }
}

// Implement Clone for TaskManager to enable Arc sharing
impl Clone for TaskManager {
    fn clone(&self) -> Self {
        Self {
            settings: Arc::clone(&self.settings),
            tasks: Arc::clone(&self.tasks),
            active_handles: Arc::clone(&self.active_handles),
            concurrency_semaphore: Arc::clone(&self.concurrency_semaphore),
        }
    }
}

/// Task manager statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskManagerStats {
    pub total_tasks: usize,
    pub pending_tasks: usize,
    pub running_tasks: usize,
    pub completed_tasks: usize,
    pub failed_tasks: usize,
    pub cancelled_tasks: usize,
    pub available_slots: usize,
    pub max_concurrent: usize,
}
