use crate::domain::task::{Task, TaskStatus};
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::str::FromStr;

/// Fields available for sorting tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Position,
    Title,
    Status,
    Created,
    Updated,
    Due,
}

/// Sort order direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl FromStr for SortField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "position" => Ok(SortField::Position),
            "title" => Ok(SortField::Title),
            "status" => Ok(SortField::Status),
            "created" => Ok(SortField::Created),
            "updated" => Ok(SortField::Updated),
            "due" => Ok(SortField::Due),
            _ => Err(format!(
                "Invalid sort field '{}'. Valid fields: position, title, status, created, updated, due",
                s
            )),
        }
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "asc" => Ok(SortOrder::Ascending),
            "desc" => Ok(SortOrder::Descending),
            _ => Err(format!(
                "Invalid sort order '{}'. Valid orders: asc, desc",
                s
            )),
        }
    }
}

/// Sorts tasks in place by the given field and direction.
///
/// Sorting by [`SortField::Position`] orders by column first, so the result
/// reads like the board from left to right and top to bottom.
///
/// # Examples
/// ```
/// use psychostasia_core::domain::sorting::{sort_tasks, SortField, SortOrder};
/// use psychostasia_core::domain::task::Task;
///
/// let mut tasks = vec![
///     Task::new("Charlie".to_string()),
///     Task::new("alpha".to_string()),
///     Task::new("Bravo".to_string()),
/// ];
///
/// sort_tasks(&mut tasks, SortField::Title, SortOrder::Ascending);
/// assert_eq!(tasks[0].title, "alpha");
/// ```
pub fn sort_tasks(tasks: &mut [Task], field: SortField, order: SortOrder) {
    tasks.sort_by(|a, b| {
        let cmp = match field {
            SortField::Position => compare_status(&a.status, &b.status)
                .then(a.position.cmp(&b.position)),
            SortField::Title => a.title.to_lowercase().cmp(&b.title.to_lowercase()),
            SortField::Status => compare_status(&a.status, &b.status),
            SortField::Created => a.created_at.cmp(&b.created_at),
            SortField::Updated => a.updated_at.cmp(&b.updated_at),
            SortField::Due => {
                // Undated tasks stay last regardless of direction
                return compare_option_dates(a.due_date, b.due_date, order);
            }
        };

        match order {
            SortOrder::Ascending => cmp,
            SortOrder::Descending => cmp.reverse(),
        }
    });
}

/// Compare task status by board column order
fn compare_status(a: &TaskStatus, b: &TaskStatus) -> Ordering {
    a.ordinal().cmp(&b.ordinal())
}

/// Compare Option<DateTime> with None always sorting to the end
fn compare_option_dates(
    a: Option<DateTime<Utc>>,
    b: Option<DateTime<Utc>>,
    order: SortOrder,
) -> Ordering {
    match (a, b) {
        (Some(a_date), Some(b_date)) => match order {
            SortOrder::Ascending => a_date.cmp(&b_date),
            SortOrder::Descending => b_date.cmp(&a_date),
        },
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
