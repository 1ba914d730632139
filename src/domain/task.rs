use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use uuid::Uuid;

use crate::error::PsychostasiaError;

/// Unique identifier for a task row
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Creates a new random TaskId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an existing UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for TaskId {
    type Err = PsychostasiaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| PsychostasiaError::InvalidTaskId(s.to_string()))
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// Column of the sprint board a task sits in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    NotStarted,
    InProgress,
    RequiresReview,
    Completed,
}

impl TaskStatus {
    /// All columns in left-to-right board order
    pub const ALL: [TaskStatus; 4] = [
        Self::NotStarted,
        Self::InProgress,
        Self::RequiresReview,
        Self::Completed,
    ];

    /// Zero-based index of the column on the board
    pub fn ordinal(&self) -> u8 {
        match self {
            Self::NotStarted => 0,
            Self::InProgress => 1,
            Self::RequiresReview => 2,
            Self::Completed => 3,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "Not Started"),
            Self::InProgress => write!(f, "In Progress"),
            Self::RequiresReview => write!(f, "Requires Review"),
            Self::Completed => write!(f, "Completed"),
        }
    }
}

impl FromStr for TaskStatus {
    type Err = PsychostasiaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Accept "not-started", "Not Started", "not_started" and friends
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .collect::<String>()
            .to_lowercase();

        match normalized.as_str() {
            "notstarted" => Ok(Self::NotStarted),
            "inprogress" => Ok(Self::InProgress),
            "requiresreview" => Ok(Self::RequiresReview),
            "completed" => Ok(Self::Completed),
            _ => Err(PsychostasiaError::InvalidStatus(s.to_string())),
        }
    }
}

/// Kind of work a task represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    #[default]
    Feature,
    Bug,
    Chore,
    Research,
}

/// A sprint board task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    /// Zero-based rank within the status column
    pub position: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(default, rename = "type")]
    pub task_type: TaskType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Creates a new task at the top of the Not Started column.
    ///
    /// Use [`crate::Board::add_task`] to place it at the end of its column.
    pub fn new(title: String) -> Self {
        let now = Utc::now();
        Self {
            id: TaskId::new(),
            title,
            description: None,
            status: TaskStatus::NotStarted,
            position: 0,
            assignee: None,
            task_type: TaskType::default(),
            due_date: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Builder-style status setter, used before a task is placed on a board
    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_position(mut self, position: u32) -> Self {
        self.position = position;
        self
    }

    /// Sets the title
    pub fn set_title(&mut self, title: String) {
        self.title = title;
        self.updated_at = Utc::now();
    }

    /// Sets the description
    pub fn set_description(&mut self, description: String) {
        self.description = Some(description);
        self.updated_at = Utc::now();
    }

    pub fn assign(&mut self, assignee: impl Into<String>) {
        self.assignee = Some(assignee.into());
        self.updated_at = Utc::now();
    }

    pub fn unassign(&mut self) {
        self.assignee = None;
        self.updated_at = Utc::now();
    }

    /// Sets the due date, rejecting dates before the task was created
    pub fn set_due_date(&mut self, date: DateTime<Utc>) -> Result<(), PsychostasiaError> {
        if date < self.created_at {
            return Err(PsychostasiaError::InvalidDateRange {
                start: self.created_at.to_rfc3339(),
                end: date.to_rfc3339(),
            });
        }
        self.due_date = Some(date);
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn clear_due_date(&mut self) {
        self.due_date = None;
        self.updated_at = Utc::now();
    }

    /// Moves the task to a column slot. Returns true if anything changed.
    pub(crate) fn place(&mut self, status: TaskStatus, position: u32) -> bool {
        if self.status == status && self.position == position {
            return false;
        }
        self.status = status;
        self.position = position;
        self.updated_at = Utc::now();
        true
    }

    /// The row update that persists this task's current slot
    pub fn position_update(&self) -> PositionUpdate {
        PositionUpdate {
            id: self.id.clone(),
            status: self.status,
            position: self.position,
            updated_at: self.updated_at,
        }
    }
}

/// Converts a column index into a stored position
pub(crate) fn to_position(index: usize) -> Result<u32, PsychostasiaError> {
    u32::try_from(index)
        .map_err(|_| PsychostasiaError::Other(format!("position {index} overflows")))
}

/// Row update request against the tasks collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionUpdate {
    pub id: TaskId,
    pub status: TaskStatus,
    pub position: u32,
    /// Timestamp of the local change, written as-is so the row matches the board
    pub updated_at: DateTime<Utc>,
}
