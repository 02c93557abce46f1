//! Project use-case service.
//!
//! # Responsibility
//! - Project listing, detail, create, update and delete.
//! - Partner management by email.
//!
//! # Invariants
//! - Only the creator edits, deletes or manages partners.
//! - Deleting a project leaves its task rows in place.
//! - Project mutations emit no synchronization events.
//! - With rooms attached, a removed partner's connections leave the
//!   project's room and a deleted project's room is emptied.

use super::error::{ServiceError, ServiceResult};
use super::{resolve_id, task_views};
use crate::model::input::{PartnerInput, PartnerRef, ProjectInput};
use crate::model::project::Project;
use crate::model::validation::{required_email, FieldErrors};
use crate::model::view::{ProjectDetail, ProjectSummary, UserSummary};
use crate::model::{EntityKind, ProjectId, UserId};
use crate::permission::{authorize_project, can_add_partner, ProjectAction};
use crate::repo::project_repo::ProjectRepository;
use crate::repo::task_repo::TaskRepository;
use crate::repo::user_repo::IdentityStore;
use crate::sync::Broadcaster;
use log::{info, warn};

/// Use-case service for projects and their partners.
pub struct ProjectService<P: ProjectRepository, T: TaskRepository, U: IdentityStore> {
    projects: P,
    tasks: T,
    users: U,
    rooms: Option<Broadcaster>,
}

impl<P: ProjectRepository, T: TaskRepository, U: IdentityStore> ProjectService<P, T, U> {
    pub fn new(projects: P, tasks: T, users: U) -> Self {
        Self {
            projects,
            tasks,
            users,
            rooms: None,
        }
    }

    /// Keeps room membership in step with partner removal and project
    /// deletion.
    pub fn with_rooms(mut self, rooms: Broadcaster) -> Self {
        self.rooms = Some(rooms);
        self
    }

    /// Projects `user` created or partners on, oldest first.
    pub fn list_projects(&self, user: UserId) -> ServiceResult<Vec<ProjectSummary>> {
        let projects = self.projects.list_projects_for(user)?;
        Ok(projects.iter().map(ProjectSummary::from).collect())
    }

    /// Project with partner summaries and tasks in list order.
    pub fn get_project(&self, user: UserId, id: &str) -> ServiceResult<ProjectDetail> {
        let project = self.load(id)?;
        self.authorize(user, &project, ProjectAction::View)?;

        let partners = self.users.find_many(&project.partners)?;
        let tasks = self.tasks.load_tasks(&project.tasks)?;
        Ok(ProjectDetail {
            summary: ProjectSummary::from(&project),
            partners: partners.iter().map(UserSummary::from).collect(),
            tasks: task_views(&self.users, &tasks)?,
        })
    }

    /// Resolves a project the user may view, for joining its room.
    pub fn open_project(&self, user: UserId, id: &str) -> ServiceResult<ProjectId> {
        let project = self.load(id)?;
        self.authorize(user, &project, ProjectAction::View)?;
        Ok(project.id)
    }

    pub fn create_project(&self, user: UserId, input: &ProjectInput) -> ServiceResult<ProjectSummary> {
        let fields = input.validate()?;
        let project = Project::new(user, fields);
        self.projects.create_project(&project)?;
        info!(
            "event=project_create module=service status=ok project_id={} user_id={user}",
            project.id
        );
        Ok(ProjectSummary::from(&project))
    }

    /// Replaces all four editable fields. Creator only.
    pub fn update_project(
        &self,
        user: UserId,
        id: &str,
        input: &ProjectInput,
    ) -> ServiceResult<ProjectSummary> {
        let fields = input.validate()?;
        let mut project = self.load(id)?;
        self.authorize(user, &project, ProjectAction::Edit)?;

        project.apply(fields);
        self.projects.save_project(&project)?;
        info!(
            "event=project_update module=service status=ok project_id={} user_id={user}",
            project.id
        );
        Ok(ProjectSummary::from(&project))
    }

    /// Deletes the project. Its tasks are left orphaned.
    pub fn delete_project(&self, user: UserId, id: &str) -> ServiceResult<ProjectId> {
        let project = self.load(id)?;
        self.authorize(user, &project, ProjectAction::Delete)?;

        self.projects.delete_project(project.id)?;
        if let Some(rooms) = &self.rooms {
            rooms.close_room(project.id);
        }
        info!(
            "event=project_delete module=service status=ok project_id={} user_id={user} orphaned_tasks={}",
            project.id,
            project.tasks.len()
        );
        Ok(project.id)
    }

    /// Adds the account registered under `input.email` as a partner.
    pub fn add_partner(&self, user: UserId, input: &PartnerInput) -> ServiceResult<UserSummary> {
        let project_id = resolve_id(input.project.as_deref().unwrap_or_default(), EntityKind::Project)?;
        let mut errors = FieldErrors::new();
        let email = required_email(&mut errors, "email", input.email.as_deref());
        let email = match email {
            Some(email) if errors.is_empty() => email,
            _ => return Err(ServiceError::Validation(errors)),
        };

        let project = self.projects.load_project(project_id)?;
        self.authorize(user, &project, ProjectAction::ManagePartners)?;

        let Some(candidate) = self.users.find_by_email(&email)? else {
            return Err(ServiceError::UnknownAccount(FieldErrors::single(
                "email",
                "user does not exist",
            )));
        };
        can_add_partner(user, &project, candidate.id)?;

        self.projects.add_partner(project.id, candidate.id)?;
        info!(
            "event=partner_add module=service status=ok project_id={} partner_id={}",
            project.id, candidate.id
        );
        Ok(UserSummary::from(&candidate))
    }

    /// Removes a partner. Removing a non-partner succeeds without change.
    pub fn remove_partner(&self, user: UserId, project: &str, partner: &PartnerRef) -> ServiceResult<()> {
        let project = self.load(project)?;
        let Some(raw_partner) = partner.id.as_deref() else {
            return Err(ServiceError::Validation(FieldErrors::single(
                "id",
                "partner id is required",
            )));
        };
        let partner_id = resolve_id(raw_partner, EntityKind::User)?;
        self.authorize(user, &project, ProjectAction::ManagePartners)?;

        self.projects.remove_partner(project.id, partner_id)?;
        if partner_id != project.creator {
            if let Some(rooms) = &self.rooms {
                rooms.revoke(project.id, partner_id);
            }
        }
        info!(
            "event=partner_remove module=service status=ok project_id={} partner_id={partner_id} was_partner={}",
            project.id,
            project.is_partner(partner_id)
        );
        Ok(())
    }

    fn load(&self, id: &str) -> ServiceResult<Project> {
        let id = resolve_id(id, EntityKind::Project)?;
        Ok(self.projects.load_project(id)?)
    }

    fn authorize(&self, user: UserId, project: &Project, action: ProjectAction) -> ServiceResult<()> {
        authorize_project(user, project, action).map_err(|err| {
            warn!(
                "event=authorize module=service status=denied action={} project_id={} user_id={user}",
                action.as_str(),
                project.id
            );
            ServiceError::from(err)
        })
    }
}
