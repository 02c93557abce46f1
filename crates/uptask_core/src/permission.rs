//! Permission evaluator for projects and tasks.
//!
//! # Responsibility
//! - Decide, from ids alone, whether a principal may act on a project or on
//!   a task through its parent project.
//!
//! # Invariants
//! - Pure: no I/O, no mutation. Callers load the entities first so that a
//!   missing entity is reported as not-found before any permission check.
//! - Project edits and task definition edits are creator-only.
//! - Viewing and status toggling are open to creator and partners.
//! - The creator can never be added as a partner.

use crate::model::project::Project;
use crate::model::task::Task;
use crate::model::UserId;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Project-level actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProjectAction {
    View,
    Edit,
    Delete,
    ManagePartners,
    CreateTask,
}

impl ProjectAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::View => "project.view",
            Self::Edit => "project.edit",
            Self::Delete => "project.delete",
            Self::ManagePartners => "project.manage_partners",
            Self::CreateTask => "project.create_task",
        }
    }
}

/// Task-level actions, always evaluated against the parent project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskAction {
    View,
    Edit,
    Delete,
    ToggleStatus,
}

impl TaskAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::View => "task.view",
            Self::Edit => "task.edit",
            Self::Delete => "task.delete",
            Self::ToggleStatus => "task.toggle_status",
        }
    }
}

/// Reason an action was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionError {
    /// The principal lacks the relation the action requires.
    Forbidden {
        user: UserId,
        action: &'static str,
    },
    /// The partner candidate is already a partner.
    AlreadyPartner(UserId),
    /// The partner candidate is the project creator.
    CreatorCannotBePartner(UserId),
    /// The task does not belong to the project it was checked against.
    ProjectMismatch,
}

impl Display for PermissionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Forbidden { user, action } => {
                write!(f, "user {user} is not allowed to perform {action}")
            }
            Self::AlreadyPartner(user) => write!(f, "user {user} is already a partner"),
            Self::CreatorCannotBePartner(user) => {
                write!(f, "project creator {user} cannot be a partner")
            }
            Self::ProjectMismatch => write!(f, "task does not belong to the given project"),
        }
    }
}

impl Error for PermissionError {}

/// Creator or partner.
pub fn can_view_project(user: UserId, project: &Project) -> bool {
    project.is_creator(user) || project.is_partner(user)
}

/// Creator only.
pub fn can_mutate_project(user: UserId, project: &Project) -> bool {
    project.is_creator(user)
}

/// Evaluates a project-level action.
pub fn authorize_project(
    user: UserId,
    project: &Project,
    action: ProjectAction,
) -> Result<(), PermissionError> {
    let allowed = match action {
        ProjectAction::View => can_view_project(user, project),
        ProjectAction::Edit
        | ProjectAction::Delete
        | ProjectAction::ManagePartners
        | ProjectAction::CreateTask => can_mutate_project(user, project),
    };
    if allowed {
        Ok(())
    } else {
        Err(PermissionError::Forbidden {
            user,
            action: action.as_str(),
        })
    }
}

/// Checks that `user` may add `candidate` as a partner of `project`.
pub fn can_add_partner(
    user: UserId,
    project: &Project,
    candidate: UserId,
) -> Result<(), PermissionError> {
    authorize_project(user, project, ProjectAction::ManagePartners)?;
    if project.is_creator(candidate) {
        return Err(PermissionError::CreatorCannotBePartner(candidate));
    }
    if project.is_partner(candidate) {
        return Err(PermissionError::AlreadyPartner(candidate));
    }
    Ok(())
}

/// Creator or partner of the parent project.
pub fn can_view_task(user: UserId, task: &Task, parent: &Project) -> bool {
    task.project == parent.id && can_view_project(user, parent)
}

/// Creator of the parent project only; partners are excluded.
pub fn can_mutate_task(user: UserId, task: &Task, parent: &Project) -> bool {
    task.project == parent.id && can_mutate_project(user, parent)
}

/// Creator or partner of the parent project.
pub fn can_toggle_status(user: UserId, task: &Task, parent: &Project) -> bool {
    task.project == parent.id && can_view_project(user, parent)
}

/// Evaluates a task-level action against the task's parent project.
pub fn authorize_task(
    user: UserId,
    task: &Task,
    parent: &Project,
    action: TaskAction,
) -> Result<(), PermissionError> {
    if task.project != parent.id {
        return Err(PermissionError::ProjectMismatch);
    }
    let allowed = match action {
        TaskAction::View => can_view_task(user, task, parent),
        TaskAction::ToggleStatus => can_toggle_status(user, task, parent),
        TaskAction::Edit | TaskAction::Delete => can_mutate_task(user, task, parent),
    };
    if allowed {
        Ok(())
    } else {
        Err(PermissionError::Forbidden {
            user,
            action: action.as_str(),
        })
    }
}
