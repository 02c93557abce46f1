//! Task model and status state machine.
//!
//! # Invariants
//! - `project` is fixed at creation.
//! - `TaskStatus::Complete` always carries the user who completed the task;
//!   `Pending` never does.
//! - `toggle` is the only status transition.

use super::{ProjectId, TaskId, UserId};
use serde::{Deserialize, Serialize};
use time::Date;
use uuid::Uuid;

/// Task priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    /// Case-insensitive parse of `low|medium|high`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

/// Completion state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Complete { completed_by: UserId },
}

impl TaskStatus {
    /// Flips the status. Entering `Complete` stamps `actor`; leaving it
    /// clears the stamp.
    pub fn toggled(self, actor: UserId) -> Self {
        match self {
            Self::Pending => Self::Complete {
                completed_by: actor,
            },
            Self::Complete { .. } => Self::Pending,
        }
    }

    pub fn is_complete(self) -> bool {
        matches!(self, Self::Complete { .. })
    }

    pub fn completed_by(self) -> Option<UserId> {
        match self {
            Self::Pending => None,
            Self::Complete { completed_by } => Some(completed_by),
        }
    }

    /// Rebuilds a status from its persisted `(flag, user)` pair.
    ///
    /// Returns `None` for inconsistent pairs.
    pub fn from_parts(complete: bool, completed_by: Option<UserId>) -> Option<Self> {
        match (complete, completed_by) {
            (false, None) => Some(Self::Pending),
            (true, Some(completed_by)) => Some(Self::Complete { completed_by }),
            _ => None,
        }
    }
}

/// Validated editable task fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFields {
    pub name: String,
    pub description: String,
    pub delivery_date: Date,
    pub priority: Priority,
}

/// Persisted task document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    pub description: String,
    pub delivery_date: Date,
    pub priority: Priority,
    pub project: ProjectId,
    pub status: TaskStatus,
}

impl Task {
    /// Creates a pending task belonging to `project`.
    pub fn new(project: ProjectId, fields: TaskFields) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: fields.name,
            description: fields.description,
            delivery_date: fields.delivery_date,
            priority: fields.priority,
            project,
            status: TaskStatus::Pending,
        }
    }

    /// Replaces all editable fields. Status and project are untouched.
    pub fn apply(&mut self, fields: TaskFields) {
        self.name = fields.name;
        self.description = fields.description;
        self.delivery_date = fields.delivery_date;
        self.priority = fields.priority;
    }

    /// Toggles the status on behalf of `actor`.
    pub fn toggle_status(&mut self, actor: UserId) {
        self.status = self.status.toggled(actor);
    }
}

#[cfg(test)]
mod tests {
    use super::{Priority, TaskStatus};
    use uuid::Uuid;

    #[test]
    fn toggle_stamps_and_clears_completed_by() {
        let actor = Uuid::new_v4();
        let complete = TaskStatus::Pending.toggled(actor);
        assert!(complete.is_complete());
        assert_eq!(complete.completed_by(), Some(actor));

        let pending = complete.toggled(Uuid::new_v4());
        assert_eq!(pending, TaskStatus::Pending);
        assert_eq!(pending.completed_by(), None);
    }

    #[test]
    fn double_toggle_by_same_actor_is_identity() {
        let actor = Uuid::new_v4();
        for start in [TaskStatus::Pending, TaskStatus::Complete { completed_by: actor }] {
            assert_eq!(start.toggled(actor).toggled(actor), start);
        }
    }

    #[test]
    fn rejects_inconsistent_persisted_pairs() {
        assert_eq!(TaskStatus::from_parts(false, None), Some(TaskStatus::Pending));
        assert!(TaskStatus::from_parts(true, None).is_none());
        assert!(TaskStatus::from_parts(false, Some(Uuid::new_v4())).is_none());
    }

    #[test]
    fn priority_parse_is_case_insensitive() {
        assert_eq!(Priority::parse(" HIGH "), Some(Priority::High));
        assert_eq!(Priority::parse("Medium"), Some(Priority::Medium));
        assert_eq!(Priority::parse("urgent"), None);
    }
}
