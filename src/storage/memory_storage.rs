use crate::{
    domain::{BoardConfig, PositionUpdate, Task, TaskId},
    error::{PsychostasiaError, Result},
    storage::TaskStore,
};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Volatile storage backend holding rows in a map
#[derive(Debug, Default)]
pub struct MemoryStorage {
    tasks: RwLock<HashMap<TaskId, Task>>,
    board: RwLock<Option<BoardConfig>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an initialized store pre-populated with rows
    pub fn with_tasks(config: BoardConfig, tasks: impl IntoIterator<Item = Task>) -> Self {
        let tasks = tasks.into_iter().map(|t| (t.id.clone(), t)).collect();
        Self {
            tasks: RwLock::new(tasks),
            board: RwLock::new(Some(config)),
        }
    }
}

#[async_trait]
impl TaskStore for MemoryStorage {
    async fn initialize(&self) -> Result<()> {
        let mut board = self.board.write().await;
        if board.is_none() {
            *board = Some(BoardConfig::default());
        }
        Ok(())
    }

    async fn is_initialized(&self) -> bool {
        self.board.read().await.is_some()
    }

    async fn save_task(&self, task: &Task) -> Result<()> {
        self.tasks
            .write()
            .await
            .insert(task.id.clone(), task.clone());
        Ok(())
    }

    async fn load_task(&self, id: &TaskId) -> Result<Task> {
        self.tasks
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| PsychostasiaError::TaskNotFound(id.to_string()))
    }

    async fn list_tasks(&self) -> Result<Vec<Task>> {
        let mut tasks: Vec<Task> = self.tasks.read().await.values().cloned().collect();
        tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(tasks)
    }

    async fn delete_task(&self, id: &TaskId) -> Result<()> {
        self.tasks
            .write()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| PsychostasiaError::TaskNotFound(id.to_string()))
    }

    async fn update_position(&self, update: &PositionUpdate) -> Result<()> {
        let mut tasks = self.tasks.write().await;
        let task = tasks
            .get_mut(&update.id)
            .ok_or_else(|| PsychostasiaError::TaskNotFound(update.id.to_string()))?;
        task.status = update.status;
        task.position = update.position;
        task.updated_at = update.updated_at;
        Ok(())
    }

    async fn save_board_config(&self, config: &BoardConfig) -> Result<()> {
        *self.board.write().await = Some(config.clone());
        Ok(())
    }

    async fn load_board_config(&self) -> Result<BoardConfig> {
        self.board
            .read()
            .await
            .clone()
            .ok_or(PsychostasiaError::BoardNotInitialized)
    }
}
