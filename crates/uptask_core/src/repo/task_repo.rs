//! Task repository contract and SQLite implementation.
//!
//! # Invariants
//! - Persisted `(status, completed_by)` pairs are always consistent; reads
//!   reject inconsistent rows.
//! - Task rows never reference the project's task list; attaching and
//!   detaching is done through `ProjectRepository`.

use super::{bool_to_int, parse_flag, parse_stored_date, parse_uuid, RepoError, RepoResult};
use crate::model::task::{Priority, Task, TaskStatus};
use crate::model::validation::format_date;
use crate::model::{EntityKind, TaskId};
use rusqlite::{params, Connection, OptionalExtension};

const TASK_SELECT_SQL: &str = "SELECT
    id,
    name,
    description,
    delivery_date,
    priority,
    project_id,
    status,
    completed_by
FROM tasks";

/// Repository interface for task documents.
pub trait TaskRepository {
    fn create_task(&self, task: &Task) -> RepoResult<()>;
    fn load_task(&self, id: TaskId) -> RepoResult<Task>;
    fn save_task(&self, task: &Task) -> RepoResult<()>;
    fn delete_task(&self, id: TaskId) -> RepoResult<()>;
    /// Loads tasks in the order of `ids`, skipping ids without a row.
    fn load_tasks(&self, ids: &[TaskId]) -> RepoResult<Vec<Task>>;
}

/// SQLite-backed task repository.
pub struct SqliteTaskRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTaskRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn find(&self, id: TaskId) -> RepoResult<Option<Task>> {
        let row = {
            let mut stmt = self
                .conn
                .prepare_cached(&format!("{TASK_SELECT_SQL} WHERE id = ?1;"))?;
            stmt.query_row([id.to_string()], TaskRow::read).optional()?
        };
        row.map(TaskRow::into_task).transpose()
    }
}

impl TaskRepository for SqliteTaskRepository<'_> {
    fn create_task(&self, task: &Task) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO tasks (
                id,
                name,
                description,
                delivery_date,
                priority,
                project_id,
                status,
                completed_by
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                task.id.to_string(),
                task.name,
                task.description,
                format_date(task.delivery_date),
                task.priority.as_str(),
                task.project.to_string(),
                bool_to_int(task.status.is_complete()),
                task.status.completed_by().map(|user| user.to_string()),
            ],
        )?;
        Ok(())
    }

    fn load_task(&self, id: TaskId) -> RepoResult<Task> {
        self.find(id)?
            .ok_or(RepoError::NotFound(EntityKind::Task, id))
    }

    fn save_task(&self, task: &Task) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE tasks
             SET
                name = ?2,
                description = ?3,
                delivery_date = ?4,
                priority = ?5,
                status = ?6,
                completed_by = ?7,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![
                task.id.to_string(),
                task.name,
                task.description,
                format_date(task.delivery_date),
                task.priority.as_str(),
                bool_to_int(task.status.is_complete()),
                task.status.completed_by().map(|user| user.to_string()),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(EntityKind::Task, task.id));
        }
        Ok(())
    }

    fn delete_task(&self, id: TaskId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM tasks WHERE id = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::NotFound(EntityKind::Task, id));
        }
        Ok(())
    }

    fn load_tasks(&self, ids: &[TaskId]) -> RepoResult<Vec<Task>> {
        let mut tasks = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(task) = self.find(*id)? {
                tasks.push(task);
            }
        }
        Ok(tasks)
    }
}

struct TaskRow {
    id: String,
    name: String,
    description: String,
    delivery_date: String,
    priority: String,
    project_id: String,
    status: i64,
    completed_by: Option<String>,
}

impl TaskRow {
    fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            description: row.get("description")?,
            delivery_date: row.get("delivery_date")?,
            priority: row.get("priority")?,
            project_id: row.get("project_id")?,
            status: row.get("status")?,
            completed_by: row.get("completed_by")?,
        })
    }

    fn into_task(self) -> RepoResult<Task> {
        let complete = parse_flag(self.status, "tasks.status")?;
        let completed_by = self
            .completed_by
            .as_deref()
            .map(|value| parse_uuid(value, "tasks.completed_by"))
            .transpose()?;
        let status = TaskStatus::from_parts(complete, completed_by).ok_or_else(|| {
            RepoError::InvalidData("inconsistent tasks.status/completed_by pair".to_string())
        })?;
        let priority = Priority::parse(&self.priority).ok_or_else(|| {
            RepoError::InvalidData(format!(
                "invalid priority `{}` in tasks.priority",
                self.priority
            ))
        })?;

        Ok(Task {
            id: parse_uuid(&self.id, "tasks.id")?,
            name: self.name,
            description: self.description,
            delivery_date: parse_stored_date(&self.delivery_date, "tasks.delivery_date")?,
            priority,
            project: parse_uuid(&self.project_id, "tasks.project_id")?,
            status,
        })
    }
}
