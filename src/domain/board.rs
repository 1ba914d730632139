use crate::domain::reorder::{column_slots, reorder, DragEnd};
use crate::domain::task::{to_position, PositionUpdate, Task, TaskId, TaskStatus};
use crate::error::{PsychostasiaError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Configuration for a sprint board column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wip_limit: Option<u32>,
}

impl Column {
    pub fn new(name: String, status: TaskStatus) -> Self {
        Self {
            name,
            status,
            wip_limit: None,
        }
    }

    pub fn with_wip_limit(mut self, limit: u32) -> Self {
        self.wip_limit = Some(limit);
        self
    }
}

/// Board configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardConfig {
    pub name: String,
    pub columns: Vec<Column>,
}

impl BoardConfig {
    /// Rejects configs that list the same status twice
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for column in &self.columns {
            if !seen.insert(column.status) {
                return Err(PsychostasiaError::ConfigError(format!(
                    "column status '{}' is configured more than once",
                    column.status
                )));
            }
        }
        Ok(())
    }
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            name: "Sprint Board".to_string(),
            columns: vec![
                Column::new("Not Started".to_string(), TaskStatus::NotStarted),
                Column::new("In Progress".to_string(), TaskStatus::InProgress),
                Column::new("Requires Review".to_string(), TaskStatus::RequiresReview),
                Column::new("Completed".to_string(), TaskStatus::Completed),
            ],
        }
    }
}

/// In-memory snapshot of the sprint board.
///
/// Every public mutator leaves each column's positions contiguous.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Board {
    pub config: BoardConfig,
    tasks: Vec<Task>,
}

impl Board {
    pub fn new(config: BoardConfig) -> Self {
        Self {
            config,
            tasks: Vec::new(),
        }
    }

    /// Builds a board from rows fetched from storage, repairing any column
    /// whose positions drifted.
    pub fn from_tasks(config: BoardConfig, tasks: Vec<Task>) -> (Self, Vec<PositionUpdate>) {
        let mut board = Self { config, tasks };
        let repairs = board.normalize();
        (board, repairs)
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Tasks in one column, ordered by position
    pub fn column(&self, status: TaskStatus) -> Vec<&Task> {
        column_slots(&self.tasks, status)
            .into_iter()
            .map(|slot| &self.tasks[slot])
            .collect()
    }

    pub fn column_len(&self, status: TaskStatus) -> usize {
        self.tasks.iter().filter(|t| t.status == status).count()
    }

    pub fn find(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| &t.id == id)
    }

    /// Gets the column configuration for a status
    pub fn get_column_for_status(&self, status: TaskStatus) -> Option<&Column> {
        self.config.columns.iter().find(|col| col.status == status)
    }

    /// Checks whether a column holds more tasks than its configured limit
    pub fn is_over_wip_limit(&self, status: TaskStatus) -> bool {
        self.get_column_for_status(status)
            .and_then(|col| col.wip_limit)
            .map(|limit| self.column_len(status) > limit as usize)
            .unwrap_or(false)
    }

    /// Verifies that every column's positions are exactly `0..n-1` and
    /// that no id appears twice.
    pub fn check_invariants(&self) -> Result<()> {
        let mut ids = HashSet::new();
        for task in &self.tasks {
            if !ids.insert(&task.id) {
                return Err(PsychostasiaError::InvariantViolation {
                    status: task.status,
                    detail: format!("task {} appears more than once", task.id),
                });
            }
        }
        validate_columns(&self.tasks)
    }

    /// Places a task at the end of its column and returns the row to write
    pub fn add_task(&mut self, mut task: Task) -> Result<PositionUpdate> {
        let position = to_position(self.column_len(task.status))?;
        task.place(task.status, position);
        let update = task.position_update();
        self.tasks.push(task);
        Ok(update)
    }

    /// Removes a task and closes the gap in its former column.
    ///
    /// Returns the removed task and the renumbered rows.
    pub fn remove_task(&mut self, id: &TaskId) -> Result<(Task, Vec<PositionUpdate>)> {
        let index = self
            .tasks
            .iter()
            .position(|t| &t.id == id)
            .ok_or_else(|| PsychostasiaError::TaskNotFound(id.to_string()))?;

        let removed = self.tasks.remove(index);
        let updates = self.renumber_column(removed.status);
        Ok((removed, updates))
    }

    /// Runs a drag-end through the reorder engine and swaps in the result.
    ///
    /// On error the board is left untouched.
    pub fn apply_reorder(&mut self, drag: &DragEnd) -> Result<Vec<PositionUpdate>> {
        let outcome = reorder(&self.tasks, drag)?;
        self.tasks = outcome.tasks;
        Ok(outcome.updates)
    }

    /// Inserts or overwrites a row by id without renumbering.
    ///
    /// Used for rows pushed from elsewhere, which are taken as authoritative.
    pub fn upsert(&mut self, task: Task) {
        match self.tasks.iter_mut().find(|t| t.id == task.id) {
            Some(existing) => *existing = task,
            None => self.tasks.push(task),
        }
    }

    /// Drops a row by id without renumbering. Returns whether it was present.
    pub fn discard(&mut self, id: &TaskId) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|t| &t.id != id);
        self.tasks.len() != before
    }

    /// Renumbers every column to `0..n-1`, ordering by position, then
    /// creation time, then id. Returns the rows that changed.
    pub fn normalize(&mut self) -> Vec<PositionUpdate> {
        self.tasks.sort_by(|a, b| {
            a.status
                .ordinal()
                .cmp(&b.status.ordinal())
                .then(a.position.cmp(&b.position))
                .then(a.created_at.cmp(&b.created_at))
                .then(a.id.cmp(&b.id))
        });

        TaskStatus::ALL
            .iter()
            .flat_map(|&status| self.renumber_column(status))
            .collect()
    }

    fn renumber_column(&mut self, status: TaskStatus) -> Vec<PositionUpdate> {
        let slots = column_slots(&self.tasks, status);
        let mut updates = Vec::new();
        for (position, slot) in (0u32..).zip(slots) {
            let task = &mut self.tasks[slot];
            if task.place(status, position) {
                updates.push(task.position_update());
            }
        }
        updates
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new(BoardConfig::default())
    }
}

/// Checks that each column's positions are exactly `0..n-1`.
pub(crate) fn validate_columns(tasks: &[Task]) -> Result<()> {
    for status in TaskStatus::ALL {
        let slots = column_slots(tasks, status);
        for (expected, slot) in (0u32..).zip(slots) {
            let actual = tasks[slot].position;
            if actual != expected {
                let detail = if actual < expected {
                    format!("position {} is held by more than one task", actual)
                } else {
                    format!("position {} is missing", expected)
                };
                return Err(PsychostasiaError::InvariantViolation { status, detail });
            }
        }
    }
    Ok(())
}
