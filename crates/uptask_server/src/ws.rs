//! WebSocket surface for project rooms.
//!
//! # Responsibility
//! - Authenticate the upgrade and register the connection with the room
//!   registry.
//! - Handle `join` frames, re-checking view permission on every join.
//! - Forward room events to the socket until it closes.
//!
//! # Invariants
//! - A connection is removed from every room when its socket closes or a
//!   send fails.
//! - A failed join never adds the connection to the room.
//! - Each socket buffers at most `SYNC_QUEUE_CAPACITY` undelivered events; a
//!   client that falls further behind is dropped from the registry.

use crate::auth::{authenticate, session_token};
use crate::error::ApiError;
use crate::state::{project_service, AppState};
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, MutexGuard};
use tokio::sync::mpsc::{self, error::TrySendError};
use uptask_core::sync::SinkClosed;
use uptask_core::{ConnectionId, EventSink, ProjectId, RoomRegistry, SyncEvent, UserId};

const SYNC_QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Default, Deserialize)]
pub struct SyncQuery {
    token: Option<String>,
}

/// Frames a client may send.
#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    #[serde(alias = "open-project")]
    Join { project: String },
}

/// Control frames sent by the server. Room events use [`SyncEvent`].
#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    Connected { connection: ConnectionId },
    Joined { project: ProjectId },
    Error { message: String },
}

/// Hands room events to the socket task.
struct ChannelSink(mpsc::Sender<SyncEvent>);

impl EventSink for ChannelSink {
    fn deliver(&self, event: &SyncEvent) -> Result<(), SinkClosed> {
        match self.0.try_send(event.clone()) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                warn!(
                    "event=ws_queue module=ws status=full capacity={}",
                    self.0.max_capacity()
                );
                Err(SinkClosed)
            }
            Err(TrySendError::Closed(_)) => Err(SinkClosed),
        }
    }
}

/// `GET /api/sync`.
pub async fn upgrade(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<SyncQuery>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, ApiError> {
    let token = session_token(&headers).or(query.token);
    let user = authenticate(&state, token).await?;
    let ws = ws.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
    Ok(ws
        .on_upgrade(move |socket| serve_connection(socket, state, user))
        .into_response())
}

async fn serve_connection(mut socket: WebSocket, state: AppState, user: UserId) {
    let (tx, mut rx) = mpsc::channel(SYNC_QUEUE_CAPACITY);
    let connection = registry(&state).connect(user, Arc::new(ChannelSink(tx)));
    info!("event=ws_open module=ws status=ok connection={connection} user_id={user}");

    if send_json(&mut socket, &ServerMessage::Connected { connection })
        .await
        .is_ok()
    {
        loop {
            tokio::select! {
                incoming = socket.recv() => match incoming {
                    Some(Ok(Message::Text(text))) => {
                        let reply = handle_frame(&state, user, connection, text.as_str()).await;
                        if send_json(&mut socket, &reply).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                },
                outgoing = rx.recv() => match outgoing {
                    Some(event) => {
                        if send_json(&mut socket, &event).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                },
            }
        }
    }

    let rooms = registry(&state).disconnect(connection);
    info!("event=ws_close module=ws status=ok connection={connection} rooms_left={rooms}");
}

/// Processes one client frame and returns the reply.
async fn handle_frame(
    state: &AppState,
    user: UserId,
    connection: ConnectionId,
    text: &str,
) -> ServerMessage {
    let message = match serde_json::from_str::<ClientMessage>(text) {
        Ok(message) => message,
        Err(err) => {
            debug!("event=ws_frame module=ws status=error connection={connection} reason=decode");
            return ServerMessage::Error {
                message: format!("malformed frame: {err}"),
            };
        }
    };

    match message {
        ClientMessage::Join { project } => {
            let broadcaster = state.broadcaster.clone();
            let opened = state
                .db
                .run(move |conn| project_service(conn, broadcaster).open_project(user, &project))
                .await;
            let project = match opened {
                Ok(project) => project,
                Err(err) => {
                    warn!(
                        "event=ws_join module=ws status=denied connection={connection} user_id={user}"
                    );
                    return ServerMessage::Error {
                        message: err.to_string(),
                    };
                }
            };
            let joined = registry(state).join(connection, project);
            match joined {
                Ok(_) => ServerMessage::Joined { project },
                Err(err) => ServerMessage::Error {
                    message: err.to_string(),
                },
            }
        }
    }
}

async fn send_json<T: Serialize>(socket: &mut WebSocket, value: &T) -> Result<(), ()> {
    let text = serde_json::to_string(value).map_err(|_| ())?;
    socket
        .send(Message::Text(text.into()))
        .await
        .map_err(|_| ())
}

fn registry(state: &AppState) -> MutexGuard<'_, RoomRegistry> {
    state
        .broadcaster
        .registry()
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::{ChannelSink, ClientMessage, ServerMessage};
    use tokio::sync::mpsc;
    use uptask_core::sync::SinkClosed;
    use uptask_core::{EventSink, SyncEvent};
    use uuid::Uuid;

    fn deleted() -> SyncEvent {
        SyncEvent::TaskDeleted {
            task: Uuid::new_v4(),
            project: Uuid::new_v4(),
        }
    }

    #[test]
    fn full_queue_reports_the_sink_closed() {
        let (tx, mut rx) = mpsc::channel(1);
        let sink = ChannelSink(tx);

        assert_eq!(sink.deliver(&deleted()), Ok(()));
        assert_eq!(sink.deliver(&deleted()), Err(SinkClosed));

        assert!(rx.try_recv().is_ok());
        assert_eq!(sink.deliver(&deleted()), Ok(()));
        drop(rx);
        assert_eq!(sink.deliver(&deleted()), Err(SinkClosed));
    }

    #[test]
    fn join_accepts_open_project_alias() {
        let id = Uuid::new_v4().to_string();
        let join: ClientMessage =
            serde_json::from_str(&format!(r#"{{"type":"join","project":"{id}"}}"#)).unwrap();
        let alias: ClientMessage =
            serde_json::from_str(&format!(r#"{{"type":"open-project","project":"{id}"}}"#))
                .unwrap();
        assert_eq!(join, alias);
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"leave"}"#).is_err());
    }

    #[test]
    fn control_frames_are_tagged() {
        let connection = "7".parse().unwrap();
        let json = serde_json::to_value(ServerMessage::Connected { connection }).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "connected", "connection": 7 }));

        let json = serde_json::to_value(ServerMessage::Error {
            message: "nope".to_string(),
        })
        .unwrap();
        assert_eq!(json["type"], "error");
    }
}
