//! Domain model for users, projects and tasks.
//!
//! # Responsibility
//! - Define the canonical records persisted by the repositories.
//! - Own the entity-level invariants (creator never a partner, task status
//!   state machine) so services cannot bypass them.
//! - Define request inputs and their field-keyed validation.
//!
//! # Invariants
//! - Every entity is identified by a stable UUID that is never reused.
//! - Identity comparison is done by id equality only.

pub mod input;
pub mod project;
pub mod task;
pub mod user;
pub mod validation;
pub mod view;

use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier of a user account.
pub type UserId = Uuid;
/// Stable identifier of a project.
pub type ProjectId = Uuid;
/// Stable identifier of a task.
pub type TaskId = Uuid;

/// Entity families addressed by repositories and error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    User,
    Project,
    Task,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Project => "project",
            Self::Task => "task",
        }
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parses a client-supplied identifier.
///
/// Returns `None` for anything that is not a canonical UUID, which callers
/// report exactly like a missing entity.
pub fn parse_id(value: &str) -> Option<Uuid> {
    Uuid::parse_str(value.trim()).ok()
}
