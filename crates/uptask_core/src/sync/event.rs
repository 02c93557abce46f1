//! Synchronization event schema.
//!
//! Serialized as `{"type": "<kind>", "payload": {...}}`.

use crate::model::view::TaskView;
use crate::model::{ProjectId, TaskId};
use serde::Serialize;

/// Event kinds emitted to project rooms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    TaskCreated,
    TaskUpdated,
    TaskDeleted,
    StatusChanged,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TaskCreated => "task-created",
            Self::TaskUpdated => "task-updated",
            Self::TaskDeleted => "task-deleted",
            Self::StatusChanged => "status-changed",
        }
    }
}

/// One state change delivered to the viewers of a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
pub enum SyncEvent {
    TaskCreated { task: TaskView },
    TaskUpdated { task: TaskView },
    /// Enough to drop the task locally without a follow-up fetch.
    TaskDeleted { task: TaskId, project: ProjectId },
    StatusChanged { task: TaskView },
}

impl SyncEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::TaskCreated { .. } => EventKind::TaskCreated,
            Self::TaskUpdated { .. } => EventKind::TaskUpdated,
            Self::TaskDeleted { .. } => EventKind::TaskDeleted,
            Self::StatusChanged { .. } => EventKind::StatusChanged,
        }
    }

    /// Room the event belongs to.
    pub fn project(&self) -> ProjectId {
        match self {
            Self::TaskCreated { task } | Self::TaskUpdated { task } | Self::StatusChanged { task } => {
                task.project
            }
            Self::TaskDeleted { project, .. } => *project,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{EventKind, SyncEvent};
    use crate::model::task::Priority;
    use crate::model::view::TaskView;
    use uuid::Uuid;

    fn task_view(project: Uuid) -> TaskView {
        TaskView {
            id: Uuid::new_v4(),
            name: "Design".to_string(),
            description: "Mockups".to_string(),
            delivery_date: "2024-06-01".to_string(),
            priority: Priority::High,
            project,
            status: false,
            completed_by: None,
        }
    }

    #[test]
    fn serializes_with_kebab_case_type_and_payload() {
        let project = Uuid::new_v4();
        let view = task_view(project);
        let json = serde_json::to_value(SyncEvent::TaskCreated { task: view.clone() }).unwrap();
        assert_eq!(json["type"], "task-created");
        assert_eq!(json["payload"]["task"]["id"], view.id.to_string());
        assert_eq!(json["payload"]["task"]["priority"], "high");
        assert_eq!(json["payload"]["task"]["deliveryDate"], "2024-06-01");
    }

    #[test]
    fn deletion_carries_task_and_project_ids() {
        let task = Uuid::new_v4();
        let project = Uuid::new_v4();
        let event = SyncEvent::TaskDeleted { task, project };
        assert_eq!(event.kind(), EventKind::TaskDeleted);
        assert_eq!(event.project(), project);

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "task-deleted",
                "payload": { "task": task.to_string(), "project": project.to_string() }
            })
        );
    }

    #[test]
    fn kind_strings_match_wire_type() {
        let project = Uuid::new_v4();
        let event = SyncEvent::StatusChanged {
            task: task_view(project),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], event.kind().as_str());
        assert_eq!(event.project(), project);
    }
}
