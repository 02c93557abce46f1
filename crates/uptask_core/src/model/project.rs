//! Project model.
//!
//! # Invariants
//! - `creator` is fixed at creation and is never listed in `partners`.
//! - `partners` holds no duplicates.
//! - `tasks` keeps insertion order and holds no duplicates.

use super::{ProjectId, TaskId, UserId};
use time::Date;
use uuid::Uuid;

/// Validated editable project fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectFields {
    pub name: String,
    pub description: String,
    pub delivery_date: Date,
    pub customer: String,
}

/// Persisted project document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub description: String,
    pub delivery_date: Date,
    pub customer: String,
    pub creator: UserId,
    pub partners: Vec<UserId>,
    pub tasks: Vec<TaskId>,
}

impl Project {
    /// Creates a project owned by `creator` with no partners and no tasks.
    pub fn new(creator: UserId, fields: ProjectFields) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: fields.name,
            description: fields.description,
            delivery_date: fields.delivery_date,
            customer: fields.customer,
            creator,
            partners: Vec::new(),
            tasks: Vec::new(),
        }
    }

    /// Replaces all editable fields.
    pub fn apply(&mut self, fields: ProjectFields) {
        self.name = fields.name;
        self.description = fields.description;
        self.delivery_date = fields.delivery_date;
        self.customer = fields.customer;
    }

    pub fn is_creator(&self, user: UserId) -> bool {
        self.creator == user
    }

    pub fn is_partner(&self, user: UserId) -> bool {
        self.partners.contains(&user)
    }

    /// Creator or partner.
    pub fn is_member(&self, user: UserId) -> bool {
        self.is_creator(user) || self.is_partner(user)
    }

    /// Adds a partner. Returns `false` when `user` is the creator or already a
    /// partner, leaving the project unchanged.
    pub fn add_partner(&mut self, user: UserId) -> bool {
        if self.is_member(user) {
            return false;
        }
        self.partners.push(user);
        true
    }

    /// Removes a partner. Returns whether anything was removed.
    pub fn remove_partner(&mut self, user: UserId) -> bool {
        let before = self.partners.len();
        self.partners.retain(|partner| *partner != user);
        before != self.partners.len()
    }

    /// Appends a task id unless already present.
    pub fn attach_task(&mut self, task: TaskId) -> bool {
        if self.tasks.contains(&task) {
            return false;
        }
        self.tasks.push(task);
        true
    }

    /// Removes a task id. Returns whether anything was removed.
    pub fn detach_task(&mut self, task: TaskId) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|id| *id != task);
        before != self.tasks.len()
    }
}
