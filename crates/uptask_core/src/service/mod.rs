//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate validation, entity resolution, authorization, persistence
//!   and event emission into use-case level APIs.
//! - Keep the HTTP and WebSocket layers decoupled from storage details.
//!
//! # Invariants
//! - Every mutation runs in the same order: validate, resolve (not found),
//!   authorize (forbidden), apply, cascade, emit.
//! - A missing entity is always reported before a permission failure.
//! - Events are emitted only after every write of the mutation succeeded.

pub mod account_service;
pub mod error;
pub mod project_service;
pub mod task_service;

pub use account_service::AccountService;
pub use error::{ServiceError, ServiceResult};
pub use project_service::ProjectService;
pub use task_service::TaskService;

use crate::model::task::Task;
use crate::model::user::User;
use crate::model::view::TaskView;
use crate::model::{parse_id, EntityKind, UserId};
use crate::repo::user_repo::IdentityStore;
use crate::sync::ConnectionId;
use uuid::Uuid;

/// Authenticated caller of a use-case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub user: UserId,
    /// Live connection the request originated from, if the client named one.
    pub connection: Option<ConnectionId>,
}

impl Principal {
    pub fn new(user: UserId) -> Self {
        Self {
            user,
            connection: None,
        }
    }

    pub fn with_connection(mut self, connection: Option<ConnectionId>) -> Self {
        self.connection = connection;
        self
    }
}

impl From<UserId> for Principal {
    fn from(user: UserId) -> Self {
        Self::new(user)
    }
}

/// Parses a client-supplied id, reporting malformed values as missing.
pub(crate) fn resolve_id(value: &str, kind: EntityKind) -> ServiceResult<Uuid> {
    parse_id(value).ok_or(ServiceError::NotFound(kind))
}

/// Builds task views, resolving completing users in one lookup.
pub(crate) fn task_views<U: IdentityStore>(users: &U, tasks: &[Task]) -> ServiceResult<Vec<TaskView>> {
    let mut completer_ids = tasks
        .iter()
        .filter_map(|task| task.status.completed_by())
        .collect::<Vec<_>>();
    completer_ids.sort_unstable();
    completer_ids.dedup();
    let completers = users.find_many(&completer_ids)?;

    Ok(tasks
        .iter()
        .map(|task| {
            let completer = task
                .status
                .completed_by()
                .and_then(|id| completers.iter().find(|user| user.id == id));
            TaskView::new(task, completer)
        })
        .collect())
}

/// Builds the view of a single task.
pub(crate) fn task_view<U: IdentityStore>(users: &U, task: &Task) -> ServiceResult<TaskView> {
    let completer: Option<User> = match task.status.completed_by() {
        Some(id) => users.find_by_id(id)?,
        None => None,
    };
    Ok(TaskView::new(task, completer.as_ref()))
}
