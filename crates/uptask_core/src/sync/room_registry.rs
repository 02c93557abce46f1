//! In-process registry of live connections and the project rooms they view.

use super::event::SyncEvent;
use crate::model::{ProjectId, UserId};
use log::debug;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::num::ParseIntError;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

/// Process-unique identifier of one live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl Display for ConnectionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ConnectionId {
    type Err = ParseIntError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        value.trim().parse::<u64>().map(Self)
    }
}

/// The receiving side is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkClosed;

impl Display for SinkClosed {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "event sink closed")
    }
}

impl Error for SinkClosed {}

/// Outbound side of one connection.
///
/// `deliver` must not block: it hands the event to the connection's writer
/// and returns.
pub trait EventSink: Send + Sync {
    fn deliver(&self, event: &SyncEvent) -> Result<(), SinkClosed>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomError {
    UnknownConnection(ConnectionId),
}

impl Display for RoomError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownConnection(id) => write!(f, "connection is not registered: {id}"),
        }
    }
}

impl Error for RoomError {}

struct ConnectionEntry {
    owner: UserId,
    sink: Arc<dyn EventSink>,
    rooms: BTreeSet<ProjectId>,
}

/// Registry shared by the REST and real-time paths.
pub type SharedRoomRegistry = Arc<Mutex<RoomRegistry>>;

/// Maps project ids to subscribed connections and back.
#[derive(Default)]
pub struct RoomRegistry {
    next_id: u64,
    connections: BTreeMap<ConnectionId, ConnectionEntry>,
    rooms: BTreeMap<ProjectId, BTreeSet<ConnectionId>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps a fresh registry for sharing.
    pub fn shared() -> SharedRoomRegistry {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Registers a new connection with no room memberships.
    pub fn connect(&mut self, owner: UserId, sink: Arc<dyn EventSink>) -> ConnectionId {
        self.next_id += 1;
        let id = ConnectionId(self.next_id);
        self.connections.insert(
            id,
            ConnectionEntry {
                owner,
                sink,
                rooms: BTreeSet::new(),
            },
        );
        debug!("event=room_connect module=sync status=ok connection={id} user_id={owner}");
        id
    }

    /// Subscribes `connection` to `project`'s room.
    ///
    /// Returns `Ok(false)` when the connection was already a member.
    pub fn join(&mut self, connection: ConnectionId, project: ProjectId) -> Result<bool, RoomError> {
        let entry = self
            .connections
            .get_mut(&connection)
            .ok_or(RoomError::UnknownConnection(connection))?;
        let joined = entry.rooms.insert(project);
        self.rooms.entry(project).or_default().insert(connection);
        debug!(
            "event=room_join module=sync status=ok connection={connection} project_id={project} new={joined}"
        );
        Ok(joined)
    }

    /// Removes a connection from every room it joined. Returns how many
    /// rooms it left; unknown connections leave zero.
    pub fn disconnect(&mut self, connection: ConnectionId) -> usize {
        let Some(entry) = self.connections.remove(&connection) else {
            return 0;
        };
        for project in &entry.rooms {
            self.drop_member(*project, connection);
        }
        debug!(
            "event=room_disconnect module=sync status=ok connection={connection} rooms_left={}",
            entry.rooms.len()
        );
        entry.rooms.len()
    }

    /// Unsubscribes `connection` from `project`. Returns whether it was a
    /// member.
    pub fn leave(&mut self, connection: ConnectionId, project: ProjectId) -> bool {
        let left = self
            .connections
            .get_mut(&connection)
            .is_some_and(|entry| entry.rooms.remove(&project));
        if left {
            self.drop_member(project, connection);
            debug!("event=room_leave module=sync status=ok connection={connection} project_id={project}");
        }
        left
    }

    /// Unsubscribes every connection `owner` holds in `project`'s room.
    /// Returns how many connections left.
    pub fn evict(&mut self, project: ProjectId, owner: UserId) -> usize {
        let owned: Vec<ConnectionId> = self
            .rooms
            .get(&project)
            .into_iter()
            .flatten()
            .copied()
            .filter(|id| self.owner_of(*id) == Some(owner))
            .collect();
        owned
            .into_iter()
            .filter(|connection| self.leave(*connection, project))
            .count()
    }

    /// Empties `project`'s room. The connections stay registered. Returns how
    /// many members it had.
    pub fn close_room(&mut self, project: ProjectId) -> usize {
        let Some(members) = self.rooms.remove(&project) else {
            return 0;
        };
        for connection in &members {
            if let Some(entry) = self.connections.get_mut(connection) {
                entry.rooms.remove(&project);
            }
        }
        debug!(
            "event=room_close module=sync status=ok project_id={project} members={}",
            members.len()
        );
        members.len()
    }

    /// Sinks of every connection in `project`'s room, in connection order.
    pub fn subscribers(&self, project: ProjectId) -> Vec<(ConnectionId, Arc<dyn EventSink>)> {
        self.rooms
            .get(&project)
            .into_iter()
            .flatten()
            .filter_map(|id| {
                self.connections
                    .get(id)
                    .map(|entry| (*id, Arc::clone(&entry.sink)))
            })
            .collect()
    }

    pub fn room_size(&self, project: ProjectId) -> usize {
        self.rooms.get(&project).map_or(0, BTreeSet::len)
    }

    /// Rooms joined by `connection`, sorted.
    pub fn rooms_of(&self, connection: ConnectionId) -> Vec<ProjectId> {
        self.connections
            .get(&connection)
            .map(|entry| entry.rooms.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn owner_of(&self, connection: ConnectionId) -> Option<UserId> {
        self.connections.get(&connection).map(|entry| entry.owner)
    }

    pub fn is_connected(&self, connection: ConnectionId) -> bool {
        self.connections.contains_key(&connection)
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    fn drop_member(&mut self, project: ProjectId, connection: ConnectionId) {
        if let Some(members) = self.rooms.get_mut(&project) {
            members.remove(&connection);
            if members.is_empty() {
                self.rooms.remove(&project);
            }
        }
    }
}
