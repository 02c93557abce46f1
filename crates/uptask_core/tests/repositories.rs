use rusqlite::Connection;
use time::macros::date;
use uptask_core::model::project::{Project, ProjectFields};
use uptask_core::model::task::{Priority, Task, TaskFields, TaskStatus};
use uptask_core::model::user::User;
use uptask_core::{
    open_db_in_memory, EntityKind, IdentityStore, ProjectRepository, RepoError,
    SqliteProjectRepository, SqliteTaskRepository, SqliteUserRepository, TaskRepository,
};
use uuid::Uuid;

fn seed_user(conn: &Connection, name: &str) -> User {
    let user = User::new(name, format!("{}@example.com", name.to_lowercase()), "hash".to_string());
    SqliteUserRepository::new(conn).create_user(&user).unwrap();
    user
}

fn seed_project(conn: &Connection, creator: Uuid, name: &str) -> Project {
    let project = Project::new(
        creator,
        ProjectFields {
            name: name.to_string(),
            description: "Company site".to_string(),
            delivery_date: date!(2024 - 09 - 30),
            customer: "ACME".to_string(),
        },
    );
    SqliteProjectRepository::new(conn)
        .create_project(&project)
        .unwrap();
    project
}

fn task_for(project: Uuid, name: &str) -> Task {
    Task::new(
        project,
        TaskFields {
            name: name.to_string(),
            description: "Mockups".to_string(),
            delivery_date: date!(2024 - 06 - 01),
            priority: Priority::Medium,
        },
    )
}

#[test]
fn users_are_found_by_email_token_and_id() {
    let conn = open_db_in_memory().unwrap();
    let user = seed_user(&conn, "Ana");
    let repo = SqliteUserRepository::new(&conn);

    assert_eq!(repo.find_by_email("ana@example.com").unwrap(), Some(user.clone()));
    assert_eq!(repo.find_by_id(user.id).unwrap(), Some(user.clone()));
    let token = user.token.clone().unwrap();
    assert_eq!(repo.find_by_token(&token).unwrap().map(|u| u.id), Some(user.id));
    assert_eq!(repo.find_by_token("").unwrap(), None);
    assert_eq!(repo.find_by_id(Uuid::new_v4()).unwrap(), None);
}

#[test]
fn duplicate_email_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    seed_user(&conn, "Ana");
    let clone = User::new("Other", "ana@example.com", "hash".to_string());

    let err = SqliteUserRepository::new(&conn)
        .create_user(&clone)
        .unwrap_err();
    assert!(matches!(err, RepoError::Duplicate("email")));
}

#[test]
fn saved_user_round_trips_confirmation() {
    let conn = open_db_in_memory().unwrap();
    let mut user = seed_user(&conn, "Ana");
    let repo = SqliteUserRepository::new(&conn);

    user.confirm();
    repo.save_user(&user).unwrap();

    let stored = repo.find_by_id(user.id).unwrap().unwrap();
    assert!(stored.confirmed);
    assert_eq!(stored.token, None);
}

#[test]
fn project_links_keep_insertion_order_and_ignore_duplicates() {
    let conn = open_db_in_memory().unwrap();
    let creator = seed_user(&conn, "Ana");
    let first = seed_user(&conn, "Bea");
    let second = seed_user(&conn, "Carl");
    let project = seed_project(&conn, creator.id, "Website");
    let repo = SqliteProjectRepository::new(&conn);

    repo.add_partner(project.id, second.id).unwrap();
    repo.add_partner(project.id, first.id).unwrap();
    repo.add_partner(project.id, second.id).unwrap();

    let t1 = Uuid::new_v4();
    let t2 = Uuid::new_v4();
    repo.attach_task(project.id, t2).unwrap();
    repo.attach_task(project.id, t1).unwrap();
    repo.attach_task(project.id, t2).unwrap();

    let loaded = repo.load_project(project.id).unwrap();
    assert_eq!(loaded.partners, vec![second.id, first.id]);
    assert_eq!(loaded.tasks, vec![t2, t1]);

    repo.remove_partner(project.id, second.id).unwrap();
    repo.remove_partner(project.id, second.id).unwrap();
    repo.detach_task(project.id, t2).unwrap();
    let loaded = repo.load_project(project.id).unwrap();
    assert_eq!(loaded.partners, vec![first.id]);
    assert_eq!(loaded.tasks, vec![t1]);
}

#[test]
fn link_operations_on_missing_project_are_not_found() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteProjectRepository::new(&conn);
    let missing = Uuid::new_v4();

    let err = repo.attach_task(missing, Uuid::new_v4()).unwrap_err();
    assert!(matches!(err, RepoError::NotFound(EntityKind::Project, id) if id == missing));
    assert!(matches!(
        repo.load_project(missing).unwrap_err(),
        RepoError::NotFound(EntityKind::Project, _)
    ));
}

#[test]
fn save_project_replaces_fields_and_links() {
    let conn = open_db_in_memory().unwrap();
    let creator = seed_user(&conn, "Ana");
    let partner = seed_user(&conn, "Bea");
    let mut project = seed_project(&conn, creator.id, "Website");
    let repo = SqliteProjectRepository::new(&conn);

    project.name = "Website v2".to_string();
    project.add_partner(partner.id);
    project.attach_task(Uuid::new_v4());
    repo.save_project(&project).unwrap();

    assert_eq!(repo.load_project(project.id).unwrap(), project);
}

#[test]
fn listing_covers_created_and_partnered_projects() {
    let conn = open_db_in_memory().unwrap();
    let ana = seed_user(&conn, "Ana");
    let bea = seed_user(&conn, "Bea");
    let own = seed_project(&conn, ana.id, "Own");
    let shared = seed_project(&conn, bea.id, "Shared");
    let foreign = seed_project(&conn, bea.id, "Foreign");
    let repo = SqliteProjectRepository::new(&conn);
    repo.add_partner(shared.id, ana.id).unwrap();

    let ids = repo
        .list_projects_for(ana.id)
        .unwrap()
        .into_iter()
        .map(|project| project.id)
        .collect::<Vec<_>>();
    assert_eq!(ids, vec![own.id, shared.id]);
    assert!(!ids.contains(&foreign.id));
}

#[test]
fn deleting_project_keeps_task_rows() {
    let conn = open_db_in_memory().unwrap();
    let creator = seed_user(&conn, "Ana");
    let project = seed_project(&conn, creator.id, "Website");
    let projects = SqliteProjectRepository::new(&conn);
    let tasks = SqliteTaskRepository::new(&conn);
    let task = task_for(project.id, "Design");
    tasks.create_task(&task).unwrap();
    projects.attach_task(project.id, task.id).unwrap();

    projects.delete_project(project.id).unwrap();

    assert!(matches!(
        projects.load_project(project.id).unwrap_err(),
        RepoError::NotFound(EntityKind::Project, _)
    ));
    assert_eq!(tasks.load_task(task.id).unwrap().project, project.id);
    assert!(matches!(
        projects.delete_project(project.id).unwrap_err(),
        RepoError::NotFound(..)
    ));
}

#[test]
fn task_status_round_trips_with_completer() {
    let conn = open_db_in_memory().unwrap();
    let creator = seed_user(&conn, "Ana");
    let project = seed_project(&conn, creator.id, "Website");
    let repo = SqliteTaskRepository::new(&conn);
    let mut task = task_for(project.id, "Design");
    repo.create_task(&task).unwrap();

    task.toggle_status(creator.id);
    task.priority = Priority::High;
    repo.save_task(&task).unwrap();

    let stored = repo.load_task(task.id).unwrap();
    assert_eq!(
        stored.status,
        TaskStatus::Complete {
            completed_by: creator.id
        }
    );
    assert_eq!(stored.priority, Priority::High);
}

#[test]
fn load_tasks_preserves_requested_order_and_skips_missing() {
    let conn = open_db_in_memory().unwrap();
    let creator = seed_user(&conn, "Ana");
    let project = seed_project(&conn, creator.id, "Website");
    let repo = SqliteTaskRepository::new(&conn);
    let a = task_for(project.id, "A");
    let b = task_for(project.id, "B");
    repo.create_task(&a).unwrap();
    repo.create_task(&b).unwrap();

    let loaded = repo.load_tasks(&[b.id, Uuid::new_v4(), a.id]).unwrap();
    assert_eq!(loaded, vec![b.clone(), a]);

    repo.delete_task(b.id).unwrap();
    assert!(matches!(
        repo.delete_task(b.id).unwrap_err(),
        RepoError::NotFound(EntityKind::Task, _)
    ));
}
