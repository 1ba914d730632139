//! Drag-and-drop reordering of sprint board tasks.
//!
//! [`reorder`] is a pure transformation: it takes a snapshot of every task on
//! the board plus a drag-end event and returns the new snapshot together with
//! the row updates that must be persisted. It performs no I/O and never
//! mutates its input.

use serde::{Deserialize, Serialize};

use crate::domain::task::{to_position, PositionUpdate, Task, TaskId, TaskStatus};
use crate::error::{PsychostasiaError, Result};

/// A slot on the board: a column and an index into its position-sorted view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub status: TaskStatus,
    pub index: usize,
}

impl Location {
    pub fn new(status: TaskStatus, index: usize) -> Self {
        Self { status, index }
    }
}

/// Drag-end notification emitted by the board when a card is dropped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DragEnd {
    /// Card that was dragged. When present it must match the task at `source`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,
    pub source: Location,
    pub destination: Location,
}

impl DragEnd {
    pub fn new(source: Location, destination: Location) -> Self {
        Self {
            task_id: None,
            source,
            destination,
        }
    }

    pub fn with_task(mut self, task_id: TaskId) -> Self {
        self.task_id = Some(task_id);
        self
    }

    pub fn is_same_column(&self) -> bool {
        self.source.status == self.destination.status
    }
}

/// Result of a reorder: the full new task list and the rows that changed
#[derive(Debug, Clone)]
pub struct ReorderOutcome {
    pub tasks: Vec<Task>,
    /// Changed rows in write order: moved task, shifted destination tasks,
    /// then renumbered source tasks
    pub updates: Vec<PositionUpdate>,
}

impl ReorderOutcome {
    pub fn is_noop(&self) -> bool {
        self.updates.is_empty()
    }
}

/// Applies a drag-end event to a snapshot of the board.
///
/// Indices refer to the column filtered by status and sorted by position.
/// Returns an error without computing anything if the source index does not
/// hold a task, the destination index is past the end of the destination
/// column, or the dragged task id does not match the source slot.
///
/// # Examples
/// ```
/// use psychostasia_core::domain::reorder::{reorder, DragEnd, Location};
/// use psychostasia_core::domain::task::{Task, TaskStatus};
///
/// let tasks = vec![
///     Task::new("T1".to_string()).with_position(0),
///     Task::new("T2".to_string()).with_position(1),
///     Task::new("T3".to_string()).with_position(2),
/// ];
///
/// let drag = DragEnd::new(
///     Location::new(TaskStatus::NotStarted, 0),
///     Location::new(TaskStatus::NotStarted, 2),
/// );
/// let outcome = reorder(&tasks, &drag).unwrap();
///
/// let t1 = outcome.tasks.iter().find(|t| t.title == "T1").unwrap();
/// assert_eq!(t1.position, 2);
/// assert_eq!(outcome.updates.len(), 3);
/// ```
pub fn reorder(tasks: &[Task], drag: &DragEnd) -> Result<ReorderOutcome> {
    let mut tasks = tasks.to_vec();
    let source_column = column_slots(&tasks, drag.source.status);

    let moved = *source_column
        .get(drag.source.index)
        .ok_or_else(|| PsychostasiaError::InvalidSourceIndex {
            status: drag.source.status,
            index: drag.source.index,
            len: source_column.len(),
        })?;

    if let Some(expected) = &drag.task_id {
        if &tasks[moved].id != expected {
            return Err(PsychostasiaError::DraggedTaskMismatch {
                expected: expected.to_string(),
                found: tasks[moved].id.to_string(),
            });
        }
    }

    let changed = if drag.is_same_column() {
        move_within_column(&mut tasks, source_column, drag)?
    } else {
        move_across_columns(&mut tasks, source_column, moved, drag)?
    };

    let updates: Vec<PositionUpdate> = changed
        .into_iter()
        .map(|slot| tasks[slot].position_update())
        .collect();

    tracing::debug!(
        from = %drag.source.status,
        from_index = drag.source.index,
        to = %drag.destination.status,
        to_index = drag.destination.index,
        changed = updates.len(),
        "computed reorder"
    );

    Ok(ReorderOutcome { tasks, updates })
}

/// Indices into `tasks` for one column, ordered by position.
///
/// The sort is stable so duplicate positions keep their list order.
pub(crate) fn column_slots(tasks: &[Task], status: TaskStatus) -> Vec<usize> {
    let mut slots: Vec<usize> = tasks
        .iter()
        .enumerate()
        .filter(|(_, task)| task.status == status)
        .map(|(slot, _)| slot)
        .collect();
    slots.sort_by_key(|&slot| tasks[slot].position);
    slots
}

/// Splice-moves a card inside its column and renumbers the column.
fn move_within_column(
    tasks: &mut [Task],
    mut column: Vec<usize>,
    drag: &DragEnd,
) -> Result<Vec<usize>> {
    let status = drag.source.status;
    let to = drag.destination.index;

    // Removing the card first leaves len - 1 slots, so the last valid
    // insertion point is len - 1.
    if to >= column.len() {
        return Err(PsychostasiaError::InvalidDestinationIndex {
            status,
            index: to,
            max: column.len().saturating_sub(1),
        });
    }

    let moved = column.remove(drag.source.index);
    column.insert(to, moved);

    let mut changed = renumber(tasks, &column, status);

    // Moved card is written first
    if let Some(at) = changed.iter().position(|&slot| slot == moved) {
        changed[..=at].rotate_right(1);
    }

    Ok(changed)
}

/// Moves a card into another column, shifting the destination's occupants
/// down and closing the gap left in the source column.
fn move_across_columns(
    tasks: &mut [Task],
    source_column: Vec<usize>,
    moved: usize,
    drag: &DragEnd,
) -> Result<Vec<usize>> {
    let dest_status = drag.destination.status;
    let dest_index = drag.destination.index;
    let dest_column = column_slots(tasks, dest_status);

    if dest_index > dest_column.len() {
        return Err(PsychostasiaError::InvalidDestinationIndex {
            status: dest_status,
            index: dest_index,
            max: dest_column.len(),
        });
    }

    let mut changed = Vec::new();
    let target = to_position(dest_index)?;

    let mut shifted = Vec::new();
    if !dest_column.is_empty() {
        let occupied = dest_column
            .iter()
            .any(|&slot| tasks[slot].position == target);

        if occupied {
            for &slot in &dest_column {
                let position = tasks[slot].position;
                if position >= target && tasks[slot].place(dest_status, position + 1) {
                    shifted.push(slot);
                }
            }
        }
    }

    let position = if dest_column.is_empty() { 0 } else { target };
    tasks[moved].place(dest_status, position);
    changed.push(moved);

    shifted.sort_by_key(|&slot| tasks[slot].position);
    changed.extend(shifted);

    let remaining: Vec<usize> = source_column
        .into_iter()
        .filter(|&slot| slot != moved)
        .collect();
    changed.extend(renumber(tasks, &remaining, drag.source.status));

    Ok(changed)
}

/// Assigns `0..n-1` to the given slots in order, returning those that changed.
fn renumber(tasks: &mut [Task], ordered: &[usize], status: TaskStatus) -> Vec<usize> {
    let mut changed = Vec::new();
    for (position, &slot) in (0u32..).zip(ordered) {
        if tasks[slot].place(status, position) {
            changed.push(slot);
        }
    }
    changed
}
