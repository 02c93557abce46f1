//! Room-scoped real-time synchronization.
//!
//! # Responsibility
//! - Track which live connections view which project (room registry).
//! - Fan synchronization events out to a room, skipping the connection that
//!   originated the mutation (broadcaster).
//!
//! # Invariants
//! - Room membership is ephemeral: nothing here is persisted.
//! - A connection receives events only for rooms it joined and only while
//!   it is registered.
//! - Delivery is best-effort and at-most-once; failures never propagate to
//!   the mutation that produced the event.

pub mod broadcaster;
pub mod event;
pub mod room_registry;

pub use broadcaster::{BroadcastReport, Broadcaster};
pub use event::{EventKind, SyncEvent};
pub use room_registry::{
    ConnectionId, EventSink, RoomError, RoomRegistry, SharedRoomRegistry, SinkClosed,
};
