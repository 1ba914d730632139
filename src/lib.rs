//! # Psychostasia Core
//!
//! Sprint board domain model for the Psychostasia studio dashboard.
//!
//! The centre of the crate is [`domain::reorder`], a pure function that
//! turns a drag-and-drop move into new `status`/`position` values for the
//! affected tasks. [`BoardStore`] wraps it with a local snapshot, serial
//! per-row persistence through a [`TaskStore`], and realtime change folding.

pub mod config;
pub mod domain;
pub mod error;
pub mod storage;
pub mod store;

// Re-export commonly used types
pub use config::{StorageConfig, WorkspaceConfig};
pub use domain::{
    board::{Board, BoardConfig, Column},
    reorder::{reorder, DragEnd, Location, ReorderOutcome},
    task::{PositionUpdate, Task, TaskId, TaskStatus, TaskType},
};
pub use error::{PsychostasiaError, Result};
pub use storage::{persist_updates, PersistFailure, PersistReport, TaskStore};
pub use store::{BoardStore, ChangeEvent, NewTask};
