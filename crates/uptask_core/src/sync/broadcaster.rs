//! Fan-out of synchronization events to project rooms.

use super::event::SyncEvent;
use super::room_registry::{ConnectionId, RoomRegistry, SharedRoomRegistry};
use crate::model::{ProjectId, UserId};
use log::{debug, info, warn};
use std::sync::{Arc, MutexGuard};

/// Outcome of one broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    /// Connections whose sink was closed; they were disconnected.
    pub dropped: usize,
    /// Whether the originating connection was in the room and skipped.
    pub skipped_origin: bool,
}

/// Delivers events to every member of a room except the originator.
#[derive(Clone)]
pub struct Broadcaster {
    registry: SharedRoomRegistry,
}

impl Broadcaster {
    pub fn new(registry: SharedRoomRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &SharedRoomRegistry {
        &self.registry
    }

    /// Broadcasts `event` to its project's room.
    pub fn publish(&self, event: &SyncEvent, origin: Option<ConnectionId>) -> BroadcastReport {
        self.broadcast(event.project(), event, origin)
    }

    /// Broadcasts `event` to `project`'s room, skipping `origin`.
    ///
    /// Never fails: closed sinks are pruned from the registry and counted.
    /// The registry lock is not held while delivering.
    pub fn broadcast(
        &self,
        project: ProjectId,
        event: &SyncEvent,
        origin: Option<ConnectionId>,
    ) -> BroadcastReport {
        let subscribers = self.lock().subscribers(project);
        let mut report = BroadcastReport::default();
        let mut closed = Vec::new();

        for (connection, sink) in subscribers {
            if Some(connection) == origin {
                report.skipped_origin = true;
                continue;
            }
            match sink.deliver(event) {
                Ok(()) => report.delivered += 1,
                Err(_) => closed.push(connection),
            }
        }

        if !closed.is_empty() {
            let mut registry = self.lock();
            for connection in &closed {
                registry.disconnect(*connection);
            }
            report.dropped = closed.len();
            warn!(
                "event=broadcast_prune module=sync status=ok project_id={project} dropped={}",
                report.dropped
            );
        }

        debug!(
            "event=broadcast module=sync status=ok kind={} project_id={project} delivered={} skipped_origin={}",
            event.kind().as_str(),
            report.delivered,
            report.skipped_origin
        );
        report
    }

    /// Takes `user`'s connections out of `project`'s room after they lost
    /// access to it.
    pub fn revoke(&self, project: ProjectId, user: UserId) -> usize {
        let evicted = self.lock().evict(project, user);
        if evicted > 0 {
            info!(
                "event=room_revoke module=sync status=ok project_id={project} user_id={user} connections={evicted}"
            );
        }
        evicted
    }

    /// Empties the room of a project that no longer exists.
    pub fn close_room(&self, project: ProjectId) -> usize {
        let members = self.lock().close_room(project);
        if members > 0 {
            info!("event=room_close module=sync status=ok project_id={project} connections={members}");
        }
        members
    }

    /// Returns `connection` when it is registered to `user`, so a client
    /// cannot suppress delivery to someone else's connection.
    pub fn origin_for(
        &self,
        user: UserId,
        connection: Option<ConnectionId>,
    ) -> Option<ConnectionId> {
        let connection = connection?;
        (self.lock().owner_of(connection) == Some(user)).then_some(connection)
    }

    fn lock(&self) -> MutexGuard<'_, RoomRegistry> {
        // Registry state stays consistent even if a holder panicked: every
        // mutation is a single map operation.
        self.registry
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl From<SharedRoomRegistry> for Broadcaster {
    fn from(registry: SharedRoomRegistry) -> Self {
        Self::new(registry)
    }
}

impl std::fmt::Debug for Broadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Broadcaster")
            .field("registry", &Arc::as_ptr(&self.registry))
            .finish()
    }
}
