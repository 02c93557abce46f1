//! Core domain logic for UpTask.
//! This crate is the single source of truth for business invariants.

pub mod credential;
pub mod db;
pub mod logging;
pub mod mail;
pub mod model;
pub mod permission;
pub mod repo;
pub mod service;
pub mod sync;

pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use logging::{default_log_level, init_logging, logging_status, LogTarget, LoggingError};
pub use mail::{LogMailer, Mailer};
pub use model::validation::FieldErrors;
pub use model::{EntityKind, ProjectId, TaskId, UserId};
pub use permission::{PermissionError, ProjectAction, TaskAction};
pub use repo::project_repo::{ProjectRepository, SqliteProjectRepository};
pub use repo::task_repo::{SqliteTaskRepository, TaskRepository};
pub use repo::user_repo::{IdentityStore, SqliteUserRepository};
pub use repo::{RepoError, RepoResult};
pub use service::{
    AccountService, Principal, ProjectService, ServiceError, ServiceResult, TaskService,
};
pub use sync::{Broadcaster, ConnectionId, EventSink, RoomRegistry, SharedRoomRegistry, SyncEvent};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
