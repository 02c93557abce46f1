//! Shared application state.

use crate::auth::SessionKeys;
use crate::error::ApiError;
use axum::http::HeaderValue;
use rusqlite::Connection;
use std::sync::{Arc, Mutex};
use uptask_core::{
    AccountService, Broadcaster, Mailer, ProjectService, RoomRegistry, ServiceResult,
    SqliteProjectRepository, SqliteTaskRepository, SqliteUserRepository, TaskService,
};

/// One SQLite connection shared by every request.
///
/// Every call runs on tokio's blocking pool with the connection locked.
#[derive(Clone)]
pub struct DbHandle {
    conn: Arc<Mutex<Connection>>,
}

impl DbHandle {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Runs `f` against the connection.
    pub async fn run<T, F>(&self, f: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> ServiceResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let result = tokio::task::spawn_blocking(move || {
            let guard = conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            f(&guard)
        })
        .await?;
        Ok(result?)
    }
}

/// Account service bound to one connection.
pub type Accounts<'conn> = AccountService<SqliteUserRepository<'conn>, Arc<dyn Mailer>>;
/// Project service bound to one connection.
pub type Projects<'conn> = ProjectService<
    SqliteProjectRepository<'conn>,
    SqliteTaskRepository<'conn>,
    SqliteUserRepository<'conn>,
>;
/// Task service bound to one connection.
pub type Tasks<'conn> = TaskService<
    SqliteProjectRepository<'conn>,
    SqliteTaskRepository<'conn>,
    SqliteUserRepository<'conn>,
>;

#[derive(Clone)]
pub struct AppState {
    pub db: DbHandle,
    pub sessions: SessionKeys,
    pub broadcaster: Broadcaster,
    pub mailer: Arc<dyn Mailer>,
    pub secure_cookies: bool,
    /// Browser origins allowed to send credentialed cross-origin requests.
    pub allowed_origins: Vec<HeaderValue>,
}

impl AppState {
    pub fn new(
        conn: Connection,
        sessions: SessionKeys,
        mailer: Arc<dyn Mailer>,
        secure_cookies: bool,
    ) -> Self {
        Self {
            db: DbHandle::new(conn),
            sessions,
            broadcaster: Broadcaster::new(RoomRegistry::shared()),
            mailer,
            secure_cookies,
            allowed_origins: Vec::new(),
        }
    }

    /// Origins that cannot be header values are skipped.
    pub fn with_allowed_origins<I, O>(mut self, origins: I) -> Self
    where
        I: IntoIterator<Item = O>,
        O: AsRef<str>,
    {
        self.allowed_origins = origins
            .into_iter()
            .filter_map(|origin| HeaderValue::from_str(origin.as_ref()).ok())
            .collect();
        self
    }
}

pub fn account_service(conn: &Connection, mailer: Arc<dyn Mailer>) -> Accounts<'_> {
    AccountService::new(SqliteUserRepository::new(conn), mailer)
}

pub fn project_service(conn: &Connection, broadcaster: Broadcaster) -> Projects<'_> {
    ProjectService::new(
        SqliteProjectRepository::new(conn),
        SqliteTaskRepository::new(conn),
        SqliteUserRepository::new(conn),
    )
    .with_rooms(broadcaster)
}

pub fn task_service(conn: &Connection, broadcaster: Broadcaster) -> Tasks<'_> {
    TaskService::new(
        SqliteProjectRepository::new(conn),
        SqliteTaskRepository::new(conn),
        SqliteUserRepository::new(conn),
        broadcaster,
    )
}
