//! Project repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Persist project documents together with their partner set and ordered
//!   task list.
//! - Offer narrow link mutations (partner add/remove, task attach/detach)
//!   so cascades do not rewrite the whole document.
//!
//! # Invariants
//! - `save_project` replaces scalar fields and both link lists in one
//!   transaction.
//! - Partner and task order follow the `position` column.
//! - `remove_partner` and `detach_task` are idempotent.

use super::{parse_stored_date, parse_uuid, RepoError, RepoResult};
use crate::model::project::Project;
use crate::model::validation::format_date;
use crate::model::{EntityKind, ProjectId, TaskId, UserId};
use rusqlite::{params, Connection, OptionalExtension};

const PROJECT_SELECT_SQL: &str = "SELECT
    id,
    name,
    description,
    delivery_date,
    customer,
    creator_id
FROM projects";

/// Repository interface for project documents.
pub trait ProjectRepository {
    fn create_project(&self, project: &Project) -> RepoResult<()>;
    fn load_project(&self, id: ProjectId) -> RepoResult<Project>;
    fn save_project(&self, project: &Project) -> RepoResult<()>;
    fn delete_project(&self, id: ProjectId) -> RepoResult<()>;
    /// Projects where `user` is creator or partner, oldest first.
    fn list_projects_for(&self, user: UserId) -> RepoResult<Vec<Project>>;
    fn add_partner(&self, project: ProjectId, user: UserId) -> RepoResult<()>;
    fn remove_partner(&self, project: ProjectId, user: UserId) -> RepoResult<()>;
    fn attach_task(&self, project: ProjectId, task: TaskId) -> RepoResult<()>;
    fn detach_task(&self, project: ProjectId, task: TaskId) -> RepoResult<()>;
}

/// SQLite-backed project repository.
pub struct SqliteProjectRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteProjectRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn ensure_exists(&self, id: ProjectId) -> RepoResult<()> {
        let exists = self
            .conn
            .query_row(
                "SELECT 1 FROM projects WHERE id = ?1;",
                [id.to_string()],
                |_| Ok(()),
            )
            .optional()?;
        exists.ok_or(RepoError::NotFound(EntityKind::Project, id))
    }

    fn load_links(&self, sql: &str, id: ProjectId, column: &str) -> RepoResult<Vec<uuid::Uuid>> {
        let mut stmt = self.conn.prepare_cached(sql)?;
        let mut rows = stmt.query([id.to_string()])?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next()? {
            let value: String = row.get(0)?;
            ids.push(parse_uuid(&value, column)?);
        }
        Ok(ids)
    }

    fn hydrate(&self, row: ProjectRow) -> RepoResult<Project> {
        let id = parse_uuid(&row.id, "projects.id")?;
        let partners = self.load_links(
            "SELECT user_id FROM project_partners WHERE project_id = ?1 ORDER BY position ASC;",
            id,
            "project_partners.user_id",
        )?;
        let tasks = self.load_links(
            "SELECT task_id FROM project_tasks WHERE project_id = ?1 ORDER BY position ASC;",
            id,
            "project_tasks.task_id",
        )?;
        Ok(Project {
            id,
            name: row.name,
            description: row.description,
            delivery_date: parse_stored_date(&row.delivery_date, "projects.delivery_date")?,
            customer: row.customer,
            creator: parse_uuid(&row.creator_id, "projects.creator_id")?,
            partners,
            tasks,
        })
    }
}

impl ProjectRepository for SqliteProjectRepository<'_> {
    fn create_project(&self, project: &Project) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO projects (id, name, description, delivery_date, customer, creator_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                project.id.to_string(),
                project.name,
                project.description,
                format_date(project.delivery_date),
                project.customer,
                project.creator.to_string(),
            ],
        )?;
        for partner in &project.partners {
            self.add_partner(project.id, *partner)?;
        }
        for task in &project.tasks {
            self.attach_task(project.id, *task)?;
        }
        Ok(())
    }

    fn load_project(&self, id: ProjectId) -> RepoResult<Project> {
        let row = {
            let mut stmt = self
                .conn
                .prepare_cached(&format!("{PROJECT_SELECT_SQL} WHERE id = ?1;"))?;
            stmt.query_row([id.to_string()], ProjectRow::read)
                .optional()?
        };
        let row = row.ok_or(RepoError::NotFound(EntityKind::Project, id))?;
        self.hydrate(row)
    }

    fn save_project(&self, project: &Project) -> RepoResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        let changed = tx.execute(
            "UPDATE projects
             SET
                name = ?2,
                description = ?3,
                delivery_date = ?4,
                customer = ?5,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![
                project.id.to_string(),
                project.name,
                project.description,
                format_date(project.delivery_date),
                project.customer,
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(EntityKind::Project, project.id));
        }

        let project_id = project.id.to_string();
        tx.execute(
            "DELETE FROM project_partners WHERE project_id = ?1;",
            [project_id.as_str()],
        )?;
        for (position, partner) in project.partners.iter().enumerate() {
            tx.execute(
                "INSERT INTO project_partners (project_id, user_id, position) VALUES (?1, ?2, ?3);",
                params![project_id, partner.to_string(), position as i64],
            )?;
        }
        tx.execute(
            "DELETE FROM project_tasks WHERE project_id = ?1;",
            [project_id.as_str()],
        )?;
        for (position, task) in project.tasks.iter().enumerate() {
            tx.execute(
                "INSERT INTO project_tasks (project_id, task_id, position) VALUES (?1, ?2, ?3);",
                params![project_id, task.to_string(), position as i64],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn delete_project(&self, id: ProjectId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM projects WHERE id = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::NotFound(EntityKind::Project, id));
        }
        Ok(())
    }

    fn list_projects_for(&self, user: UserId) -> RepoResult<Vec<Project>> {
        let rows = {
            let mut stmt = self.conn.prepare_cached(&format!(
                "{PROJECT_SELECT_SQL}
                 WHERE creator_id = ?1
                    OR EXISTS (
                        SELECT 1 FROM project_partners pp
                        WHERE pp.project_id = projects.id AND pp.user_id = ?1
                    )
                 ORDER BY created_at ASC, rowid ASC;"
            ))?;
            let rows = stmt
                .query_map([user.to_string()], ProjectRow::read)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        };
        rows.into_iter().map(|row| self.hydrate(row)).collect()
    }

    fn add_partner(&self, project: ProjectId, user: UserId) -> RepoResult<()> {
        self.ensure_exists(project)?;
        self.conn.execute(
            "INSERT OR IGNORE INTO project_partners (project_id, user_id, position)
             VALUES (
                ?1,
                ?2,
                (SELECT COALESCE(MAX(position) + 1, 0) FROM project_partners WHERE project_id = ?1)
             );",
            params![project.to_string(), user.to_string()],
        )?;
        Ok(())
    }

    fn remove_partner(&self, project: ProjectId, user: UserId) -> RepoResult<()> {
        self.ensure_exists(project)?;
        self.conn.execute(
            "DELETE FROM project_partners WHERE project_id = ?1 AND user_id = ?2;",
            params![project.to_string(), user.to_string()],
        )?;
        Ok(())
    }

    fn attach_task(&self, project: ProjectId, task: TaskId) -> RepoResult<()> {
        self.ensure_exists(project)?;
        self.conn.execute(
            "INSERT OR IGNORE INTO project_tasks (project_id, task_id, position)
             VALUES (
                ?1,
                ?2,
                (SELECT COALESCE(MAX(position) + 1, 0) FROM project_tasks WHERE project_id = ?1)
             );",
            params![project.to_string(), task.to_string()],
        )?;
        Ok(())
    }

    fn detach_task(&self, project: ProjectId, task: TaskId) -> RepoResult<()> {
        self.ensure_exists(project)?;
        self.conn.execute(
            "DELETE FROM project_tasks WHERE project_id = ?1 AND task_id = ?2;",
            params![project.to_string(), task.to_string()],
        )?;
        Ok(())
    }
}

struct ProjectRow {
    id: String,
    name: String,
    description: String,
    delivery_date: String,
    customer: String,
    creator_id: String,
}

impl ProjectRow {
    fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            description: row.get("description")?,
            delivery_date: row.get("delivery_date")?,
            customer: row.get("customer")?,
            creator_id: row.get("creator_id")?,
        })
    }
}
