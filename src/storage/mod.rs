use crate::{
    domain::{BoardConfig, PositionUpdate, Task, TaskId},
    error::{PsychostasiaError, Result},
};
use async_trait::async_trait;

#[cfg(feature = "file-storage")]
pub mod file_storage;
pub mod memory_storage;

/// Storage trait for persisting task rows and board configuration
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Initializes the storage backend
    async fn initialize(&self) -> Result<()>;

    /// Checks if the store has been initialized
    async fn is_initialized(&self) -> bool;

    /// Inserts or overwrites a task row
    async fn save_task(&self, task: &Task) -> Result<()>;

    /// Loads a task by ID
    async fn load_task(&self, id: &TaskId) -> Result<Task>;

    /// Lists every task row
    async fn list_tasks(&self) -> Result<Vec<Task>>;

    /// Deletes a task
    async fn delete_task(&self, id: &TaskId) -> Result<()>;

    /// Writes the status and position of an existing row
    async fn update_position(&self, update: &PositionUpdate) -> Result<()>;

    /// Saves the board configuration
    async fn save_board_config(&self, config: &BoardConfig) -> Result<()>;

    /// Loads the board configuration
    async fn load_board_config(&self) -> Result<BoardConfig>;
}

/// A row write that the store rejected
#[derive(Debug)]
pub struct PersistFailure {
    pub id: TaskId,
    pub error: PsychostasiaError,
}

/// Outcome of writing a batch of position updates one row at a time
#[derive(Debug, Default)]
pub struct PersistReport {
    pub applied: Vec<TaskId>,
    pub failures: Vec<PersistFailure>,
}

impl PersistReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn attempted(&self) -> usize {
        self.applied.len() + self.failures.len()
    }

    /// Short message suitable for a toast
    pub fn summary(&self) -> Option<String> {
        if self.failures.is_empty() {
            return None;
        }
        Some(format!(
            "Failed to save {} of {} task positions; refresh to reload the board",
            self.failures.len(),
            self.attempted()
        ))
    }
}

/// Writes updates in order, one awaited request per row.
///
/// A failed row is recorded and logged, and the remaining rows are still
/// written. Nothing is rolled back.
pub async fn persist_updates<S>(store: &S, updates: &[PositionUpdate]) -> PersistReport
where
    S: TaskStore + ?Sized,
{
    let mut report = PersistReport::default();

    for update in updates {
        match store.update_position(update).await {
            Ok(()) => report.applied.push(update.id.clone()),
            Err(error) => {
                tracing::warn!(
                    task_id = %update.id,
                    status = %update.status,
                    position = update.position,
                    error = %error,
                    "failed to persist task position"
                );
                report.failures.push(PersistFailure {
                    id: update.id.clone(),
                    error,
                });
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::memory_storage::MemoryStorage;
    use super::*;
    use crate::domain::TaskStatus;
    use chrono::Utc;

    #[tokio::test]
    async fn test_persist_updates_writes_in_order() {
        let storage = MemoryStorage::new();
        let a = Task::new("A".to_string());
        let b = Task::new("B".to_string()).with_position(1);
        storage.save_task(&a).await.unwrap();
        storage.save_task(&b).await.unwrap();

        let updates = vec![
            PositionUpdate {
                id: b.id.clone(),
                status: TaskStatus::NotStarted,
                position: 0,
                updated_at: Utc::now(),
            },
            PositionUpdate {
                id: a.id.clone(),
                status: TaskStatus::NotStarted,
                position: 1,
                updated_at: Utc::now(),
            },
        ];

        let report = persist_updates(&storage, &updates).await;

        assert!(report.is_complete());
        assert_eq!(report.applied, vec![b.id.clone(), a.id.clone()]);
        assert_eq!(storage.load_task(&a.id).await.unwrap().position, 1);
        assert_eq!(storage.load_task(&b.id).await.unwrap().position, 0);
        assert!(report.summary().is_none());
    }

    #[tokio::test]
    async fn test_persist_updates_continues_after_failure() {
        let storage = MemoryStorage::new();
        let kept = Task::new("Kept".to_string());
        storage.save_task(&kept).await.unwrap();

        let missing = TaskId::new();
        let updates = vec![
            PositionUpdate {
                id: missing.clone(),
                status: TaskStatus::Completed,
                position: 0,
                updated_at: Utc::now(),
            },
            PositionUpdate {
                id: kept.id.clone(),
                status: TaskStatus::Completed,
                position: 1,
                updated_at: Utc::now(),
            },
        ];

        let report = persist_updates(&storage, &updates).await;

        assert!(!report.is_complete());
        assert_eq!(report.attempted(), 2);
        assert_eq!(report.failures[0].id, missing);
        assert!(matches!(
            report.failures[0].error,
            PsychostasiaError::TaskNotFound(_)
        ));
        assert_eq!(report.applied, vec![kept.id.clone()]);

        let stored = storage.load_task(&kept.id).await.unwrap();
        assert_eq!(stored.status, TaskStatus::Completed);
        assert!(report.summary().unwrap().contains("1 of 2"));
    }

    #[tokio::test]
    async fn test_persist_nothing() {
        let storage = MemoryStorage::new();
        let report = persist_updates(&storage, &[]).await;
        assert!(report.is_complete());
        assert_eq!(report.attempted(), 0);
    }
}
