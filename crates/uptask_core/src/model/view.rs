//! Serializable read models returned to clients and carried by
//! synchronization events.
//!
//! Views never expose credential hashes or tokens.

use super::project::Project;
use super::task::{Priority, Task};
use super::user::User;
use super::validation::format_date;
use super::{ProjectId, TaskId, UserId};
use serde::Serialize;

/// Public projection of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserSummary {
    pub id: UserId,
    pub name: String,
    pub email: String,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
        }
    }
}

/// Who completed a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletedBy {
    pub id: UserId,
    pub name: String,
}

/// Task as seen by clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskView {
    pub id: TaskId,
    pub name: String,
    pub description: String,
    pub delivery_date: String,
    pub priority: Priority,
    pub project: ProjectId,
    /// `true` when complete.
    pub status: bool,
    pub completed_by: Option<CompletedBy>,
}

impl TaskView {
    /// Builds the view. `completed_by` is the resolved completing user, if any.
    pub fn new(task: &Task, completed_by: Option<&User>) -> Self {
        let completed_by = match (task.status.completed_by(), completed_by) {
            (Some(id), Some(user)) if user.id == id => Some(CompletedBy {
                id,
                name: user.name.clone(),
            }),
            (Some(id), _) => Some(CompletedBy {
                id,
                name: String::new(),
            }),
            (None, _) => None,
        };
        Self {
            id: task.id,
            name: task.name.clone(),
            description: task.description.clone(),
            delivery_date: format_date(task.delivery_date),
            priority: task.priority,
            project: task.project,
            status: task.status.is_complete(),
            completed_by,
        }
    }
}

/// Project list entry, without partners or tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummary {
    pub id: ProjectId,
    pub name: String,
    pub description: String,
    pub delivery_date: String,
    pub customer: String,
    pub creator: UserId,
}

impl From<&Project> for ProjectSummary {
    fn from(project: &Project) -> Self {
        Self {
            id: project.id,
            name: project.name.clone(),
            description: project.description.clone(),
            delivery_date: format_date(project.delivery_date),
            customer: project.customer.clone(),
            creator: project.creator,
        }
    }
}

/// Full project with resolved partners and ordered tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectDetail {
    #[serde(flatten)]
    pub summary: ProjectSummary,
    pub partners: Vec<UserSummary>,
    pub tasks: Vec<TaskView>,
}
