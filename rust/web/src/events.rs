use crate::errors::IntoClientError;
use crate::room::RoomId;
use duelroom_engine::{Board, Mark};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Transport-assigned identifier of one client connection.
pub type ConnectionId = String;

pub type EventSender = mpsc::Sender<ServerEvent>;
pub type EventReceiver = mpsc::Receiver<ServerEvent>;

/// Events a client may send, decoded from `{"event": .., "data": ..}` envelopes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    JoinPlayer { name: String },
    CreateRoom { room_name: String },
    JoinRoom { room_id: RoomId },
    LeaveRoom,
    PlayerReady,
    PlayerCancel,
    /// `index` is `None` when the number names no cell (negative or fractional).
    MakeMove {
        room_id: RoomId,
        index: Option<usize>,
    },
    RestartGame { room_id: RoomId },
    Reconnected,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct JoinPlayerPayload {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateRoomPayload {
    #[serde(alias = "name")]
    room_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RoomPayload {
    room_id: RoomId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MovePayload {
    room_id: RoomId,
    index: serde_json::Number,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InboundError {
    #[error("malformed message: {0}")]
    Malformed(String),
    #[error("invalid payload for `{event}`: {reason}")]
    InvalidPayload { event: &'static str, reason: String },
}

impl IntoClientError for InboundError {
    fn error_code(&self) -> &'static str {
        match self {
            InboundError::Malformed(_) => "malformed_message",
            InboundError::InvalidPayload { .. } => "invalid_payload",
        }
    }

    fn client_message(&self) -> String {
        match self {
            InboundError::Malformed(_) => "Malformed message".to_string(),
            InboundError::InvalidPayload { event, .. } => {
                format!("Missing or invalid fields for {event}")
            }
        }
    }
}

fn payload<T: DeserializeOwned>(
    event: &'static str,
    data: serde_json::Value,
) -> Result<T, InboundError> {
    serde_json::from_value(data).map_err(|err| InboundError::InvalidPayload {
        event,
        reason: err.to_string(),
    })
}

impl ClientEvent {
    /// Decodes one text frame.
    ///
    /// Returns `Ok(None)` for event names this server does not handle; those
    /// are dropped without telling the client.
    pub fn parse(text: &str) -> Result<Option<Self>, InboundError> {
        let Envelope { event, data } =
            serde_json::from_str(text).map_err(|err| InboundError::Malformed(err.to_string()))?;

        let parsed = match event.as_str() {
            "joinPlayer" => {
                let p: JoinPlayerPayload = payload("joinPlayer", data)?;
                ClientEvent::JoinPlayer { name: p.name }
            }
            "createRoom" => {
                let p: CreateRoomPayload = payload("createRoom", data)?;
                ClientEvent::CreateRoom {
                    room_name: p.room_name,
                }
            }
            "joinRoom" => {
                let p: RoomPayload = payload("joinRoom", data)?;
                ClientEvent::JoinRoom { room_id: p.room_id }
            }
            "makeMove" => {
                let p: MovePayload = payload("makeMove", data)?;
                ClientEvent::MakeMove {
                    room_id: p.room_id,
                    index: p.index.as_u64().and_then(|i| usize::try_from(i).ok()),
                }
            }
            "restartGame" => {
                let p: RoomPayload = payload("restartGame", data)?;
                ClientEvent::RestartGame { room_id: p.room_id }
            }
            "leaveRoom" => ClientEvent::LeaveRoom,
            "playerReady" => ClientEvent::PlayerReady,
            "playerCancel" => ClientEvent::PlayerCancel,
            "reconnected" => ClientEvent::Reconnected,
            _ => return Ok(None),
        };

        Ok(Some(parsed))
    }

    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::JoinPlayer { .. } => "joinPlayer",
            ClientEvent::CreateRoom { .. } => "createRoom",
            ClientEvent::JoinRoom { .. } => "joinRoom",
            ClientEvent::LeaveRoom => "leaveRoom",
            ClientEvent::PlayerReady => "playerReady",
            ClientEvent::PlayerCancel => "playerCancel",
            ClientEvent::MakeMove { .. } => "makeMove",
            ClientEvent::RestartGame { .. } => "restartGame",
            ClientEvent::Reconnected => "reconnected",
        }
    }
}

/// Winner field of `gameOver`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Winner {
    X,
    O,
    Draw,
}

impl From<Mark> for Winner {
    fn from(mark: Mark) -> Self {
        match mark {
            Mark::X => Winner::X,
            Mark::O => Winner::O,
        }
    }
}

/// Events pushed to clients, serialized as `{"event": .., "data": ..}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "playerjoined")]
    Registered { name: String },
    #[serde(rename = "error")]
    Error { message: String },
    #[serde(rename = "roomCreated", rename_all = "camelCase")]
    RoomCreated { room_id: RoomId },
    #[serde(rename = "roomJoined", rename_all = "camelCase")]
    RoomJoined { room_id: RoomId, players_count: usize },
    #[serde(rename = "playerJoined", rename_all = "camelCase")]
    PlayerJoined { players_count: usize },
    #[serde(rename = "playerLeft", rename_all = "camelCase")]
    PlayerLeft { players_count: usize },
    #[serde(rename = "playerReady", rename_all = "camelCase")]
    PlayerReady { players_ready: usize },
    #[serde(rename = "startRoom")]
    StartRoom,
    #[serde(rename = "roomCanceled", rename_all = "camelCase")]
    RoomCanceled { players_count: usize },
    #[serde(rename = "moveMade", rename_all = "camelCase")]
    MoveMade {
        board: Board,
        current_turn: ConnectionId,
    },
    #[serde(rename = "gameOver")]
    GameOver {
        winner: Winner,
        #[serde(skip_serializing_if = "Option::is_none")]
        combination: Option<[usize; 3]>,
    },
    #[serde(rename = "restartGame", rename_all = "camelCase")]
    RestartGame {
        board: Board,
        current_turn: ConnectionId,
    },
    #[serde(rename = "reconnected")]
    Reconnected { id: ConnectionId },
}

impl ServerEvent {
    pub fn error(message: impl Into<String>) -> Self {
        ServerEvent::Error {
            message: message.into(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::Registered { .. } => "playerjoined",
            ServerEvent::Error { .. } => "error",
            ServerEvent::RoomCreated { .. } => "roomCreated",
            ServerEvent::RoomJoined { .. } => "roomJoined",
            ServerEvent::PlayerJoined { .. } => "playerJoined",
            ServerEvent::PlayerLeft { .. } => "playerLeft",
            ServerEvent::PlayerReady { .. } => "playerReady",
            ServerEvent::StartRoom => "startRoom",
            ServerEvent::RoomCanceled { .. } => "roomCanceled",
            ServerEvent::MoveMade { .. } => "moveMade",
            ServerEvent::GameOver { .. } => "gameOver",
            ServerEvent::RestartGame { .. } => "restartGame",
            ServerEvent::Reconnected { .. } => "reconnected",
        }
    }

    pub fn to_json(&self) -> String {
        match serde_json::to_string(self) {
            Ok(json) => json,
            Err(err) => serde_json::json!({
                "event": "error",
                "data": { "message": format!("failed to serialize event: {err}") }
            })
            .to_string(),
        }
    }
}

/// Outbound queue of one connection. Dropping it unregisters the connection.
pub struct ConnectionSubscription {
    hub: ConnectionHub,
    connection_id: ConnectionId,
    pub receiver: EventReceiver,
}

impl ConnectionSubscription {
    pub fn connection_id(&self) -> &ConnectionId {
        &self.connection_id
    }

    pub fn receiver(&mut self) -> &mut EventReceiver {
        &mut self.receiver
    }
}

impl Drop for ConnectionSubscription {
    fn drop(&mut self) {
        self.hub.unregister(&self.connection_id);
    }
}

/// Per-connection outbound channels.
///
/// Delivery is fire-and-forget: a full or closed queue drops the event and
/// the connection is pruned.
#[derive(Debug, Clone)]
pub struct ConnectionHub {
    inner: Arc<HubInner>,
}

#[derive(Debug)]
struct HubInner {
    connections: RwLock<HashMap<ConnectionId, EventSender>>,
    buffer: usize,
}

impl ConnectionHub {
    pub fn new(buffer: usize) -> Self {
        Self {
            inner: Arc::new(HubInner {
                connections: RwLock::new(HashMap::new()),
                buffer: buffer.max(1),
            }),
        }
    }

    /// Registers a fresh connection under a random id.
    pub fn connect(&self) -> ConnectionSubscription {
        self.register(Uuid::new_v4().to_string())
    }

    pub fn register(&self, connection_id: impl Into<ConnectionId>) -> ConnectionSubscription {
        let connection_id = connection_id.into();
        let (tx, rx) = mpsc::channel(self.inner.buffer);
        {
            let mut guard = self
                .inner
                .connections
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            guard.insert(connection_id.clone(), tx);
        }

        tracing::info!(connection_id = %connection_id, "client connected");

        ConnectionSubscription {
            hub: self.clone(),
            connection_id,
            receiver: rx,
        }
    }

    /// Queues `event` for one connection. Returns `false` when it was dropped.
    pub fn send(&self, connection_id: &str, event: ServerEvent) -> bool {
        let sender = {
            let guard = self
                .inner
                .connections
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            guard.get(connection_id).cloned()
        };

        let Some(sender) = sender else {
            tracing::debug!(
                connection_id = %connection_id,
                event = event.name(),
                "no open connection for event"
            );
            return false;
        };

        match sender.try_send(event) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(
                    connection_id = %connection_id,
                    error = %err,
                    "failed to queue event for connection"
                );
                self.unregister(connection_id);
                false
            }
        }
    }

    pub fn send_to_all<'a, I>(&self, connection_ids: I, event: &ServerEvent)
    where
        I: IntoIterator<Item = &'a ConnectionId>,
    {
        for id in connection_ids {
            self.send(id, event.clone());
        }
    }

    pub fn unregister(&self, connection_id: &str) {
        let mut guard = self
            .inner
            .connections
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if guard.remove(connection_id).is_some() {
            tracing::debug!(connection_id = %connection_id, "connection channel closed");
        }
    }

    pub fn connection_count(&self) -> usize {
        self.inner
            .connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
