//! Board state owner.
//!
//! [`BoardStore`] keeps the local [`Board`] snapshot and the backing
//! [`TaskStore`] in step. Every mutation is computed on the snapshot first,
//! then the changed rows are written one at a time. A failed write is
//! reported but never reverts the snapshot; [`BoardStore::refresh`] reloads
//! the canonical state.

use serde::{Deserialize, Serialize};

use crate::domain::{Board, DragEnd, Task, TaskId, TaskStatus, TaskType};
use crate::error::{PsychostasiaError, Result};
use crate::storage::{persist_updates, PersistReport, TaskStore};

/// Fields for a task created from the board
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTask {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub status: TaskStatus,
    #[serde(default)]
    pub assignee: Option<String>,
    #[serde(default)]
    pub task_type: TaskType,
}

impl NewTask {
    pub fn new(title: impl Into<String>, status: TaskStatus) -> Self {
        Self {
            title: title.into(),
            description: None,
            status,
            assignee: None,
            task_type: TaskType::default(),
        }
    }
}

/// Row change pushed by the realtime feed of the tasks collection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "record", rename_all = "lowercase")]
pub enum ChangeEvent {
    Insert(Task),
    Update(Task),
    Delete(TaskId),
}

pub struct BoardStore<S: TaskStore> {
    board: Board,
    store: S,
}

impl<S: TaskStore> BoardStore<S> {
    /// Loads the board from storage, initializing the store if needed.
    ///
    /// Columns whose stored positions drifted are renumbered and the
    /// repairs are written back.
    pub async fn load(store: S) -> Result<Self> {
        if !store.is_initialized().await {
            store.initialize().await?;
        }

        let (board, _repairs) = Self::fetch(&store).await?;
        Ok(Self { board, store })
    }

    async fn fetch(store: &S) -> Result<(Board, PersistReport)> {
        let config = store.load_board_config().await?;
        let tasks = store.list_tasks().await?;
        let (board, repairs) = Board::from_tasks(config, tasks);

        let report = if repairs.is_empty() {
            PersistReport::default()
        } else {
            tracing::info!(rows = repairs.len(), "repairing drifted task positions");
            persist_updates(store, &repairs).await
        };
        if let Some(summary) = report.summary() {
            tracing::warn!(%summary, "position repair incomplete");
        }

        tracing::debug!(tasks = board.len(), "loaded board");
        Ok((board, report))
    }

    pub fn snapshot(&self) -> &Board {
        &self.board
    }

    pub fn storage(&self) -> &S {
        &self.store
    }

    /// Applies a drag-end to the snapshot and persists the changed rows.
    ///
    /// Invalid indices return an error before anything changes. Write
    /// failures are returned in the report, not as an error.
    pub async fn drag_end(&mut self, drag: &DragEnd) -> Result<PersistReport> {
        let updates = self.board.apply_reorder(drag)?;
        if updates.is_empty() {
            return Ok(PersistReport::default());
        }

        tracing::info!(
            from = %drag.source.status,
            to = %drag.destination.status,
            rows = updates.len(),
            "applied drag"
        );
        Ok(persist_updates(&self.store, &updates).await)
    }

    /// Creates a task at the end of its column
    pub async fn create_task(&mut self, new_task: NewTask) -> Result<Task> {
        let mut task = Task::new(new_task.title).with_status(new_task.status);
        task.description = new_task.description;
        task.assignee = new_task.assignee;
        task.task_type = new_task.task_type;

        let update = self.board.add_task(task)?;
        let task = self
            .board
            .find(&update.id)
            .cloned()
            .ok_or_else(|| PsychostasiaError::TaskNotFound(update.id.to_string()))?;

        if let Err(err) = self.store.save_task(&task).await {
            // Creation is not a reorder; a row that never landed is dropped
            self.board.discard(&task.id);
            return Err(err);
        }

        tracing::info!(
            task_id = %task.id,
            status = %task.status,
            position = task.position,
            "created task"
        );
        Ok(task)
    }

    /// Deletes a task and closes the gap in its column.
    ///
    /// Rows missing from the snapshot are rejected before storage is
    /// touched, and a failed delete leaves the snapshot as it was.
    pub async fn delete_task(&mut self, id: &TaskId) -> Result<PersistReport> {
        if self.board.find(id).is_none() {
            return Err(PsychostasiaError::TaskNotFound(id.to_string()));
        }
        self.store.delete_task(id).await?;
        let (removed, updates) = self.board.remove_task(id)?;

        tracing::info!(task_id = %removed.id, renumbered = updates.len(), "deleted task");
        Ok(persist_updates(&self.store, &updates).await)
    }

    /// Folds a realtime change into the snapshot.
    ///
    /// Events are overwrites keyed by id, so replaying one is harmless.
    /// Rows from other clients win over local state. Columns are then
    /// renumbered in the local view only; nothing is written back.
    pub fn apply_change(&mut self, event: ChangeEvent) {
        match event {
            ChangeEvent::Insert(task) | ChangeEvent::Update(task) => {
                tracing::debug!(task_id = %task.id, "applying remote row");
                self.board.upsert(task);
            }
            ChangeEvent::Delete(id) => {
                if !self.board.discard(&id) {
                    tracing::debug!(task_id = %id, "remote delete for unknown row");
                }
            }
        }

        let shifted = self.board.normalize();
        if !shifted.is_empty() {
            tracing::debug!(rows = shifted.len(), "renumbered local view after remote change");
        }
    }

    /// Replaces the snapshot with the canonical state from storage.
    ///
    /// Returns the outcome of writing back any repaired positions.
    pub async fn refresh(&mut self) -> Result<PersistReport> {
        let (board, report) = Self::fetch(&self.store).await?;
        self.board = board;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BoardConfig, Location, PositionUpdate};
    use crate::storage::memory_storage::MemoryStorage;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// Memory store that rejects position writes and deletes for chosen rows
    /// and logs every position write in order
    #[derive(Default)]
    struct FlakyStorage {
        inner: MemoryStorage,
        reject: Mutex<HashSet<TaskId>>,
        writes: Mutex<Vec<TaskId>>,
    }

    impl FlakyStorage {
        fn reject(&self, id: &TaskId) {
            self.reject.lock().unwrap().insert(id.clone());
        }

        fn accept(&self, id: &TaskId) {
            self.reject.lock().unwrap().remove(id);
        }

        fn writes(&self) -> Vec<TaskId> {
            self.writes.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TaskStore for FlakyStorage {
        async fn initialize(&self) -> Result<()> {
            self.inner.initialize().await
        }

        async fn is_initialized(&self) -> bool {
            self.inner.is_initialized().await
        }

        async fn save_task(&self, task: &Task) -> Result<()> {
            self.inner.save_task(task).await
        }

        async fn load_task(&self, id: &TaskId) -> Result<Task> {
            self.inner.load_task(id).await
        }

        async fn list_tasks(&self) -> Result<Vec<Task>> {
            self.inner.list_tasks().await
        }

        async fn delete_task(&self, id: &TaskId) -> Result<()> {
            if self.reject.lock().unwrap().contains(id) {
                return Err(PsychostasiaError::StorageError("backend rejected delete".to_string()));
            }
            self.inner.delete_task(id).await
        }

        async fn update_position(&self, update: &PositionUpdate) -> Result<()> {
            self.writes.lock().unwrap().push(update.id.clone());
            if self.reject.lock().unwrap().contains(&update.id) {
                return Err(PsychostasiaError::StorageError("backend rejected row".to_string()));
            }
            self.inner.update_position(update).await
        }

        async fn save_board_config(&self, config: &BoardConfig) -> Result<()> {
            self.inner.save_board_config(config).await
        }

        async fn load_board_config(&self) -> Result<BoardConfig> {
            self.inner.load_board_config().await
        }
    }

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    async fn seeded<S: TaskStore>(store: S, cards: &[(&str, TaskStatus)]) -> BoardStore<S> {
        let mut board = BoardStore::load(store).await.unwrap();
        for (title, status) in cards {
            board.create_task(NewTask::new(*title, *status)).await.unwrap();
        }
        board
    }

    fn titles<S: TaskStore>(store: &BoardStore<S>, status: TaskStatus) -> Vec<String> {
        store
            .snapshot()
            .column(status)
            .into_iter()
            .map(|t| t.title.clone())
            .collect()
    }

    fn id_of<S: TaskStore>(store: &BoardStore<S>, title: &str) -> TaskId {
        store
            .snapshot()
            .tasks()
            .iter()
            .find(|t| t.title == title)
            .unwrap()
            .id
            .clone()
    }

    #[tokio::test]
    async fn test_load_initializes_store() {
        let store = BoardStore::load(MemoryStorage::new()).await.unwrap();
        assert!(store.storage().is_initialized().await);
        assert!(store.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_create_task_appends_and_saves() {
        let store = seeded(
            MemoryStorage::new(),
            &[("A", TaskStatus::NotStarted), ("B", TaskStatus::NotStarted)],
        )
        .await;

        let b = id_of(&store, "B");
        let saved = store.storage().load_task(&b).await.unwrap();
        assert_eq!(saved.position, 1);
        assert_eq!(titles(&store, TaskStatus::NotStarted), vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_drag_end_persists_changed_rows() {
        let mut store = seeded(
            MemoryStorage::new(),
            &[
                ("A", TaskStatus::NotStarted),
                ("B", TaskStatus::NotStarted),
                ("X", TaskStatus::InProgress),
            ],
        )
        .await;

        let drag = DragEnd::new(
            Location::new(TaskStatus::NotStarted, 0),
            Location::new(TaskStatus::InProgress, 0),
        )
        .with_task(id_of(&store, "A"));
        let report = store.drag_end(&drag).await.unwrap();

        assert!(report.is_complete());
        assert_eq!(report.applied.len(), 3);
        assert_eq!(titles(&store, TaskStatus::InProgress), vec!["A", "X"]);

        // Stored rows match the snapshot field for field, timestamps included
        for task in store.snapshot().tasks() {
            assert_eq!(&store.storage().load_task(&task.id).await.unwrap(), task);
        }

        // Storage agrees with the snapshot
        store.refresh().await.unwrap();
        assert_eq!(titles(&store, TaskStatus::InProgress), vec!["A", "X"]);
        assert_eq!(titles(&store, TaskStatus::NotStarted), vec!["B"]);
        assert!(store.snapshot().check_invariants().is_ok());
    }

    #[tokio::test]
    async fn test_drag_to_same_slot_writes_nothing() {
        let mut store = seeded(
            FlakyStorage::default(),
            &[("A", TaskStatus::NotStarted), ("B", TaskStatus::NotStarted)],
        )
        .await;

        let drag = DragEnd::new(
            Location::new(TaskStatus::NotStarted, 1),
            Location::new(TaskStatus::NotStarted, 1),
        );
        let report = store.drag_end(&drag).await.unwrap();

        assert_eq!(report.attempted(), 0);
        assert!(store.storage().writes().is_empty());
    }

    #[tokio::test]
    async fn test_writes_follow_moved_shifted_source_order() {
        let mut store = seeded(
            FlakyStorage::default(),
            &[
                ("A0", TaskStatus::NotStarted),
                ("A1", TaskStatus::NotStarted),
                ("B0", TaskStatus::InProgress),
            ],
        )
        .await;

        let drag = DragEnd::new(
            Location::new(TaskStatus::NotStarted, 0),
            Location::new(TaskStatus::InProgress, 0),
        );
        store.drag_end(&drag).await.unwrap();

        assert_eq!(
            store.storage().writes(),
            vec![id_of(&store, "A0"), id_of(&store, "B0"), id_of(&store, "A1")]
        );
    }

    #[tokio::test]
    async fn test_invalid_drag_changes_nothing() {
        let mut store = seeded(FlakyStorage::default(), &[("A", TaskStatus::NotStarted)]).await;
        let before = store.snapshot().tasks().to_vec();

        let drag = DragEnd::new(
            Location::new(TaskStatus::NotStarted, 4),
            Location::new(TaskStatus::InProgress, 0),
        );
        assert!(matches!(
            store.drag_end(&drag).await,
            Err(PsychostasiaError::InvalidSourceIndex { .. })
        ));
        assert_eq!(store.snapshot().tasks(), before.as_slice());
        assert!(store.storage().writes().is_empty());
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_local_reorder() {
        init_tracing();
        let mut store = seeded(
            FlakyStorage::default(),
            &[
                ("A0", TaskStatus::NotStarted),
                ("A1", TaskStatus::NotStarted),
                ("B0", TaskStatus::InProgress),
            ],
        )
        .await;
        let b0 = id_of(&store, "B0");
        store.storage().reject(&b0);

        let drag = DragEnd::new(
            Location::new(TaskStatus::NotStarted, 0),
            Location::new(TaskStatus::InProgress, 0),
        );
        let report = store.drag_end(&drag).await.unwrap();

        // B0's write failed but the remaining writes still ran
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].id, b0);
        assert_eq!(report.applied.len(), 2);
        assert!(report.summary().is_some());

        // Local view keeps the reorder
        assert_eq!(titles(&store, TaskStatus::InProgress), vec!["A0", "B0"]);

        // Storage diverged: B0 still claims position 0
        let stored = store.storage().load_task(&b0).await.unwrap();
        assert_eq!(stored.position, 0);
    }

    #[tokio::test]
    async fn test_refresh_repairs_divergence() {
        init_tracing();
        let mut store = seeded(
            FlakyStorage::default(),
            &[("A0", TaskStatus::NotStarted), ("B0", TaskStatus::InProgress)],
        )
        .await;
        let b0 = id_of(&store, "B0");
        store.storage().reject(&b0);

        let drag = DragEnd::new(
            Location::new(TaskStatus::NotStarted, 0),
            Location::new(TaskStatus::InProgress, 0),
        );
        store.drag_end(&drag).await.unwrap();

        // A0 and B0 both hold position 0 in storage; reload renumbers
        store.storage().accept(&b0);
        let report = store.refresh().await.unwrap();
        assert!(report.is_complete());
        assert_eq!(report.applied.len(), 1);
        assert!(store.snapshot().check_invariants().is_ok());
        assert_eq!(store.snapshot().column_len(TaskStatus::InProgress), 2);
    }

    #[tokio::test]
    async fn test_refresh_reports_failed_repairs() {
        init_tracing();
        let mut store = seeded(
            FlakyStorage::default(),
            &[("A0", TaskStatus::NotStarted), ("B0", TaskStatus::InProgress)],
        )
        .await;
        let a0 = id_of(&store, "A0");
        let b0 = id_of(&store, "B0");
        store.storage().reject(&b0);

        let drag = DragEnd::new(
            Location::new(TaskStatus::NotStarted, 0),
            Location::new(TaskStatus::InProgress, 0),
        );
        store.drag_end(&drag).await.unwrap();

        // Whichever duplicate gets renumbered, its write is rejected
        store.storage().reject(&a0);
        let report = store.refresh().await.unwrap();

        assert!(!report.is_complete());
        assert_eq!(report.failures.len(), 1);
        assert!(report.summary().unwrap().contains("1 of 1"));
        // The local view is repaired even though storage is not
        assert!(store.snapshot().check_invariants().is_ok());
    }

    #[tokio::test]
    async fn test_delete_task_renumbers_and_persists() {
        let mut store = seeded(
            MemoryStorage::new(),
            &[
                ("A", TaskStatus::Completed),
                ("B", TaskStatus::Completed),
                ("C", TaskStatus::Completed),
            ],
        )
        .await;
        let a = id_of(&store, "A");
        let c = id_of(&store, "C");

        let report = store.delete_task(&a).await.unwrap();

        assert_eq!(report.applied.len(), 2);
        assert_eq!(titles(&store, TaskStatus::Completed), vec!["B", "C"]);
        assert_eq!(store.storage().load_task(&c).await.unwrap().position, 1);
        assert!(store.storage().load_task(&a).await.is_err());
    }

    #[tokio::test]
    async fn test_delete_missing_task() {
        let mut store = seeded(MemoryStorage::new(), &[]).await;
        assert!(matches!(
            store.delete_task(&TaskId::new()).await,
            Err(PsychostasiaError::TaskNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_unknown_row_leaves_storage_alone() {
        let mut store = seeded(MemoryStorage::new(), &[("A", TaskStatus::NotStarted)]).await;

        // Saved behind the snapshot's back, e.g. by another client
        let stray = Task::new("Stray".to_string());
        store.storage().save_task(&stray).await.unwrap();

        assert!(matches!(
            store.delete_task(&stray.id).await,
            Err(PsychostasiaError::TaskNotFound(_))
        ));
        assert_eq!(store.storage().load_task(&stray.id).await.unwrap(), stray);
        assert_eq!(store.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_delete_keeps_snapshot() {
        let mut store = seeded(
            FlakyStorage::default(),
            &[("A", TaskStatus::Completed), ("B", TaskStatus::Completed)],
        )
        .await;
        let a = id_of(&store, "A");
        store.storage().reject(&a);
        let before = store.snapshot().tasks().to_vec();

        assert!(matches!(
            store.delete_task(&a).await,
            Err(PsychostasiaError::StorageError(_))
        ));
        assert_eq!(store.snapshot().tasks(), before.as_slice());
        assert!(store.storage().load_task(&a).await.is_ok());
        assert!(store.storage().writes().is_empty());
    }

    #[tokio::test]
    async fn test_remote_insert_into_taken_slot_keeps_columns_contiguous() {
        let mut store = seeded(FlakyStorage::default(), &[("A", TaskStatus::NotStarted)]).await;

        let remote = Task::new("Remote".to_string())
            .with_status(TaskStatus::NotStarted)
            .with_position(0);
        store.apply_change(ChangeEvent::Insert(remote));

        assert!(store.snapshot().check_invariants().is_ok());
        assert_eq!(titles(&store, TaskStatus::NotStarted), vec!["A", "Remote"]);

        // Dropping a card back on its own slot still writes nothing
        let drag = DragEnd::new(
            Location::new(TaskStatus::NotStarted, 1),
            Location::new(TaskStatus::NotStarted, 1),
        );
        let report = store.drag_end(&drag).await.unwrap();
        assert_eq!(report.attempted(), 0);
        assert!(store.storage().writes().is_empty());
    }

    #[tokio::test]
    async fn test_apply_change_is_idempotent() {
        let mut store = seeded(MemoryStorage::new(), &[("A", TaskStatus::NotStarted)]).await;

        let remote = Task::new("Remote".to_string())
            .with_status(TaskStatus::InProgress)
            .with_position(0);

        store.apply_change(ChangeEvent::Insert(remote.clone()));
        store.apply_change(ChangeEvent::Insert(remote.clone()));
        assert_eq!(store.snapshot().len(), 2);

        let mut moved = remote.clone();
        moved.status = TaskStatus::Completed;
        store.apply_change(ChangeEvent::Update(moved.clone()));
        store.apply_change(ChangeEvent::Update(moved.clone()));
        assert_eq!(
            store.snapshot().find(&remote.id).unwrap().status,
            TaskStatus::Completed
        );
        assert_eq!(store.snapshot().len(), 2);

        store.apply_change(ChangeEvent::Delete(remote.id.clone()));
        store.apply_change(ChangeEvent::Delete(remote.id.clone()));
        assert_eq!(store.snapshot().len(), 1);
    }

    #[test]
    fn test_change_event_wire_format() {
        let id = TaskId::new();
        let json = serde_json::to_string(&ChangeEvent::Delete(id.clone())).unwrap();
        assert_eq!(json, format!(r#"{{"type":"delete","record":"{}"}}"#, id));

        let back: ChangeEvent = serde_json::from_str(&json).unwrap();
        assert!(matches!(back, ChangeEvent::Delete(got) if got == id));
    }

    #[tokio::test]
    async fn test_load_existing_rows() {
        let tasks = vec![
            Task::new("Second".to_string()).with_position(1),
            Task::new("First".to_string()).with_position(0),
        ];
        let storage = MemoryStorage::with_tasks(BoardConfig::default(), tasks);

        let store = BoardStore::load(storage).await.unwrap();
        assert_eq!(titles(&store, TaskStatus::NotStarted), vec!["First", "Second"]);
    }
}
