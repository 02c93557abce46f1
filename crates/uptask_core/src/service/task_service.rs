//! Task use-case service.
//!
//! # Responsibility
//! - Task detail, create, update, delete and status toggle.
//! - Keep the parent project's task list in step with task rows.
//! - Emit one synchronization event per successful mutation.
//!
//! # Invariants
//! - Permissions are always evaluated against the task's parent project.
//! - Create writes the task row, then appends it to the project; a failed
//!   append is reported as a partial write and nothing is compensated.
//! - Delete runs both writes independently and emits only when both
//!   succeeded.
//! - Events skip the originating connection and never fail the mutation.

use super::error::{ServiceError, ServiceResult};
use super::{resolve_id, task_view, Principal};
use crate::model::input::{TaskInput, TaskRef};
use crate::model::project::Project;
use crate::model::task::Task;
use crate::model::validation::FieldErrors;
use crate::model::view::TaskView;
use crate::model::{EntityKind, TaskId, UserId};
use crate::permission::{authorize_project, authorize_task, ProjectAction, TaskAction};
use crate::repo::project_repo::ProjectRepository;
use crate::repo::task_repo::TaskRepository;
use crate::repo::user_repo::IdentityStore;
use crate::repo::RepoError;
use crate::sync::{Broadcaster, SyncEvent};
use log::{error, info, warn};

/// Use-case service for tasks.
pub struct TaskService<P: ProjectRepository, T: TaskRepository, U: IdentityStore> {
    projects: P,
    tasks: T,
    users: U,
    broadcaster: Broadcaster,
}

impl<P: ProjectRepository, T: TaskRepository, U: IdentityStore> TaskService<P, T, U> {
    pub fn new(projects: P, tasks: T, users: U, broadcaster: Broadcaster) -> Self {
        Self {
            projects,
            tasks,
            users,
            broadcaster,
        }
    }

    pub fn get_task(&self, user: UserId, id: &str) -> ServiceResult<TaskView> {
        let (task, project) = self.load_with_parent(id)?;
        self.authorize(user, &task, &project, TaskAction::View)?;
        task_view(&self.users, &task)
    }

    /// Creates a task and appends it to its project's task list.
    pub fn create_task(&self, principal: Principal, input: &TaskInput) -> ServiceResult<TaskView> {
        let (fields, project_ref) = input.validate_for_create()?;
        let project_id = resolve_id(&project_ref, EntityKind::Project)?;
        let project = self.projects.load_project(project_id)?;
        authorize_project(principal.user, &project, ProjectAction::CreateTask).map_err(|err| {
            warn!(
                "event=authorize module=service status=denied action={} project_id={} user_id={}",
                ProjectAction::CreateTask.as_str(),
                project.id,
                principal.user
            );
            ServiceError::from(err)
        })?;

        let task = Task::new(project.id, fields);
        self.tasks.create_task(&task)?;
        if let Err(source) = self.projects.attach_task(project.id, task.id) {
            error!(
                "event=task_create module=service status=error stage=attach task_id={} project_id={}",
                task.id, project.id
            );
            return Err(ServiceError::PartialWrite {
                task: task.id,
                source,
            });
        }
        info!(
            "event=task_create module=service status=ok task_id={} project_id={}",
            task.id, project.id
        );

        let view = task_view(&self.users, &task)?;
        self.emit(principal, SyncEvent::TaskCreated { task: view.clone() });
        Ok(view)
    }

    /// Replaces the task's editable fields. Creator of the parent only.
    pub fn update_task(
        &self,
        principal: Principal,
        id: &str,
        input: &TaskInput,
    ) -> ServiceResult<TaskView> {
        let fields = input.validate()?;
        let (mut task, project) = self.load_with_parent(id)?;
        self.authorize(principal.user, &task, &project, TaskAction::Edit)?;

        task.apply(fields);
        self.tasks.save_task(&task)?;
        info!(
            "event=task_update module=service status=ok task_id={} project_id={}",
            task.id, project.id
        );

        let view = task_view(&self.users, &task)?;
        self.emit(principal, SyncEvent::TaskUpdated { task: view.clone() });
        Ok(view)
    }

    /// Detaches the task from its project and deletes it.
    pub fn delete_task(&self, principal: Principal, id: &str) -> ServiceResult<TaskId> {
        let (task, project) = self.load_with_parent(id)?;
        self.authorize(principal.user, &task, &project, TaskAction::Delete)?;

        let detached = self.projects.detach_task(project.id, task.id);
        let deleted = self.tasks.delete_task(task.id);
        let failures = [detached, deleted]
            .into_iter()
            .filter_map(Result::err)
            .collect::<Vec<RepoError>>();
        if !failures.is_empty() {
            error!(
                "event=task_delete module=service status=error task_id={} project_id={} failures={}",
                task.id,
                project.id,
                failures.len()
            );
            return Err(ServiceError::CascadeIncomplete {
                task: task.id,
                failures,
            });
        }
        info!(
            "event=task_delete module=service status=ok task_id={} project_id={}",
            task.id, project.id
        );

        self.emit(
            principal,
            SyncEvent::TaskDeleted {
                task: task.id,
                project: project.id,
            },
        );
        Ok(task.id)
    }

    /// Flips the task between pending and complete.
    ///
    /// Completing stamps the acting user; reopening clears the stamp.
    pub fn toggle_status(&self, principal: Principal, input: &TaskRef) -> ServiceResult<TaskView> {
        let Some(id) = input.id.as_deref() else {
            return Err(ServiceError::Validation(FieldErrors::single(
                "id",
                "task id is required",
            )));
        };
        let (mut task, project) = self.load_with_parent(id)?;
        self.authorize(principal.user, &task, &project, TaskAction::ToggleStatus)?;

        task.toggle_status(principal.user);
        self.tasks.save_task(&task)?;
        info!(
            "event=task_toggle module=service status=ok task_id={} complete={}",
            task.id,
            task.status.is_complete()
        );

        let view = task_view(&self.users, &task)?;
        self.emit(principal, SyncEvent::StatusChanged { task: view.clone() });
        Ok(view)
    }

    /// Loads a task and its parent. A task whose parent is gone is
    /// reported as missing.
    fn load_with_parent(&self, id: &str) -> ServiceResult<(Task, Project)> {
        let id = resolve_id(id, EntityKind::Task)?;
        let task = self.tasks.load_task(id)?;
        let project = match self.projects.load_project(task.project) {
            Ok(project) => project,
            Err(RepoError::NotFound(..)) => return Err(ServiceError::NotFound(EntityKind::Task)),
            Err(err) => return Err(err.into()),
        };
        Ok((task, project))
    }

    fn authorize(
        &self,
        user: UserId,
        task: &Task,
        project: &Project,
        action: TaskAction,
    ) -> ServiceResult<()> {
        authorize_task(user, task, project, action).map_err(|err| {
            warn!(
                "event=authorize module=service status=denied action={} task_id={} user_id={user}",
                action.as_str(),
                task.id
            );
            ServiceError::from(err)
        })
    }

    fn emit(&self, principal: Principal, event: SyncEvent) {
        let origin = self.broadcaster.origin_for(principal.user, principal.connection);
        self.broadcaster.publish(&event, origin);
    }
}
