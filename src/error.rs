use crate::domain::task::TaskStatus;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PsychostasiaError>;

#[derive(Debug, Error)]
pub enum PsychostasiaError {
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Invalid task ID format: {0}")]
    InvalidTaskId(String),

    #[error("Invalid task status: {0}")]
    InvalidStatus(String),

    #[error("Source index {index} out of range for column {status} ({len} tasks)")]
    InvalidSourceIndex {
        status: TaskStatus,
        index: usize,
        len: usize,
    },

    #[error("Destination index {index} out of range for column {status} (max {max})")]
    InvalidDestinationIndex {
        status: TaskStatus,
        index: usize,
        max: usize,
    },

    #[error("Dragged task {expected} is not at the source index (found {found})")]
    DraggedTaskMismatch { expected: String, found: String },

    #[error("Column {status} violates position ordering: {detail}")]
    InvariantViolation { status: TaskStatus, detail: String },

    #[error("Invalid date range: start {start} is after end {end}")]
    InvalidDateRange { start: String, end: String },

    #[error("Board not initialized")]
    BoardNotInitialized,

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("{0}")]
    Other(String),
}

impl From<toml::de::Error> for PsychostasiaError {
    fn from(err: toml::de::Error) -> Self {
        Self::ConfigError(err.to_string())
    }
}

impl From<toml::ser::Error> for PsychostasiaError {
    fn from(err: toml::ser::Error) -> Self {
        Self::ConfigError(err.to_string())
    }
}
