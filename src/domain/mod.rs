pub mod board;
pub mod reorder;
pub mod sorting;
pub mod task;

pub use board::{Board, BoardConfig, Column};
pub use reorder::{reorder, DragEnd, Location, ReorderOutcome};
pub use sorting::{sort_tasks, SortField, SortOrder};
pub use task::{PositionUpdate, Task, TaskId, TaskStatus, TaskType};
