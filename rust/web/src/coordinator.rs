//! Single-task dispatcher that owns every player and room.
//!
//! Connections never touch shared state directly. They post [`Command`]s to
//! the coordinator task, which applies each one to completion before reading
//! the next. Outbound events are collected while a command runs and are
//! queued to the [`ConnectionHub`] only after it finishes.

use crate::directory::{DirectoryError, RoomDirectory};
use crate::errors::{ErrorSeverity, IntoClientError};
use crate::events::{ClientEvent, ConnectionHub, ConnectionId, ServerEvent};
use crate::registry::{PlayerRegistry, RegistryError};
use crate::room::{Countdown, Room, RoomError, RoomId};
use crate::settings::AppSettings;
use chrono::Utc;
use duelroom_engine::Outcome;
use serde::Serialize;
use std::ops::ControlFlow;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Messages processed by the coordinator task.
#[derive(Debug)]
pub enum Command {
    /// A decoded client event.
    Inbound {
        connection_id: ConnectionId,
        event: ClientEvent,
    },
    /// The connection closed, cleanly or not.
    Disconnect { connection_id: ConnectionId },
    /// A room's start countdown ran out.
    CountdownElapsed { room_id: RoomId, generation: u64 },
    /// Snapshot of counters for health checks.
    Status {
        respond_to: oneshot::Sender<CoordinatorStatus>,
    },
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CoordinatorStatus {
    pub players: usize,
    pub rooms: usize,
    pub connections: usize,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CoordinatorError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Room(#[from] RoomError),
    #[error("room {0} not found")]
    RoomNotFound(RoomId),
    #[error("connection has not joined as a player")]
    NotRegistered,
    #[error("connection is already in room {0}")]
    AlreadyInRoom(RoomId),
    #[error("invalid `{field}`: {reason}")]
    InvalidField {
        field: &'static str,
        reason: &'static str,
    },
    #[error("coordinator is not running")]
    Stopped,
}

impl From<DirectoryError> for CoordinatorError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::NotFound(room_id) => CoordinatorError::RoomNotFound(room_id),
            DirectoryError::AlreadySeated(room_id) => CoordinatorError::AlreadyInRoom(room_id),
            DirectoryError::Room(room) => CoordinatorError::Room(room),
        }
    }
}

impl IntoClientError for CoordinatorError {
    fn error_code(&self) -> &'static str {
        match self {
            CoordinatorError::Registry(err) => err.error_code(),
            CoordinatorError::Room(err) => err.error_code(),
            CoordinatorError::RoomNotFound(_) => "room_not_found",
            CoordinatorError::NotRegistered => "not_registered",
            CoordinatorError::AlreadyInRoom(_) => "already_in_room",
            CoordinatorError::InvalidField { .. } => "invalid_field",
            CoordinatorError::Stopped => "coordinator_stopped",
        }
    }

    fn client_message(&self) -> String {
        match self {
            CoordinatorError::Registry(err) => err.client_message(),
            CoordinatorError::Room(err) => err.client_message(),
            CoordinatorError::RoomNotFound(_) => "Room ID not found".to_string(),
            CoordinatorError::NotRegistered => "Please join as a player first".to_string(),
            CoordinatorError::AlreadyInRoom(_) => "You are already in a room".to_string(),
            CoordinatorError::InvalidField { field, reason } => {
                format!("Invalid {field}: {reason}")
            }
            CoordinatorError::Stopped => "Server is shutting down".to_string(),
        }
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            CoordinatorError::Stopped => ErrorSeverity::Server,
            _ => ErrorSeverity::Client,
        }
    }
}

/// Events produced by one command, delivered after it completes.
#[derive(Debug, Default)]
struct Outbox {
    deliveries: Vec<(Vec<ConnectionId>, ServerEvent)>,
}

impl Outbox {
    fn to(&mut self, connection_id: &str, event: ServerEvent) {
        self.deliveries.push((vec![connection_id.to_string()], event));
    }

    fn to_room(&mut self, room: &Room, event: ServerEvent) {
        self.deliveries.push((room.member_ids(), event));
    }

    fn to_room_except(&mut self, room: &Room, except: &str, event: ServerEvent) {
        let recipients = room
            .member_ids()
            .into_iter()
            .filter(|id| id != except)
            .collect();
        self.deliveries.push((recipients, event));
    }

    fn flush(self, hub: &ConnectionHub) {
        for (recipients, event) in self.deliveries {
            tracing::trace!(
                event = event.name(),
                recipients = recipients.len(),
                "delivering event"
            );
            hub.send_to_all(&recipients, &event);
        }
    }
}

/// Owner of the player registry and the room directory.
#[derive(Debug)]
pub struct SessionCoordinator {
    players: PlayerRegistry,
    rooms: RoomDirectory,
    hub: ConnectionHub,
    settings: AppSettings,
    commands: mpsc::UnboundedSender<Command>,
}

impl SessionCoordinator {
    /// `commands` must feed the loop that drives this coordinator; countdown
    /// timers post their expiry through it.
    pub fn new(
        players: PlayerRegistry,
        rooms: RoomDirectory,
        hub: ConnectionHub,
        settings: AppSettings,
        commands: mpsc::UnboundedSender<Command>,
    ) -> Self {
        Self {
            players,
            rooms,
            hub,
            settings,
            commands,
        }
    }

    /// Starts a coordinator task with empty state.
    pub fn spawn(hub: ConnectionHub, settings: AppSettings) -> (CoordinatorHandle, JoinHandle<()>) {
        Self::spawn_with(PlayerRegistry::new(), RoomDirectory::new(), hub, settings)
    }

    pub fn spawn_with(
        players: PlayerRegistry,
        rooms: RoomDirectory,
        hub: ConnectionHub,
        settings: AppSettings,
    ) -> (CoordinatorHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let coordinator = Self::new(players, rooms, hub, settings, tx.clone());
        let task = tokio::spawn(coordinator.run(rx));
        (CoordinatorHandle { commands: tx }, task)
    }

    pub async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        tracing::info!(
            countdown_secs = self.settings.countdown_secs,
            "session coordinator started"
        );
        while let Some(command) = commands.recv().await {
            if self.handle(command).is_break() {
                break;
            }
        }
        tracing::info!("session coordinator stopped");
    }

    pub fn handle(&mut self, command: Command) -> ControlFlow<()> {
        match command {
            Command::Inbound {
                connection_id,
                event,
            } => self.handle_event(&connection_id, event),
            Command::Disconnect { connection_id } => self.disconnect(&connection_id),
            Command::CountdownElapsed {
                room_id,
                generation,
            } => self.countdown_elapsed(&room_id, generation),
            Command::Status { respond_to } => {
                let _ = respond_to.send(self.status());
            }
            Command::Shutdown => return ControlFlow::Break(()),
        }
        ControlFlow::Continue(())
    }

    pub fn handle_event(&mut self, connection_id: &str, event: ClientEvent) {
        tracing::debug!(
            connection_id = %connection_id,
            event = event.name(),
            "handling client event"
        );

        let mut outbox = Outbox::default();
        let result = match event {
            ClientEvent::JoinPlayer { name } => self.join_player(connection_id, name, &mut outbox),
            ClientEvent::CreateRoom { room_name } => {
                self.create_room(connection_id, room_name, &mut outbox)
            }
            ClientEvent::JoinRoom { room_id } => {
                self.join_room(connection_id, &room_id, &mut outbox)
            }
            ClientEvent::LeaveRoom => {
                self.leave_current_room(connection_id, &mut outbox);
                Ok(())
            }
            ClientEvent::PlayerReady => self.player_ready(connection_id, &mut outbox),
            ClientEvent::PlayerCancel => self.player_cancel(connection_id, &mut outbox),
            ClientEvent::MakeMove { room_id, index } => {
                self.make_move(connection_id, &room_id, index, &mut outbox)
            }
            ClientEvent::RestartGame { room_id } => {
                self.restart_game(connection_id, &room_id, &mut outbox)
            }
            ClientEvent::Reconnected => {
                outbox.to(
                    connection_id,
                    ServerEvent::Reconnected {
                        id: connection_id.to_string(),
                    },
                );
                Ok(())
            }
        };

        match result {
            Ok(()) => outbox.flush(&self.hub),
            Err(err) => {
                err.log_for(connection_id);
                self.hub
                    .send(connection_id, ServerEvent::error(err.client_message()));
            }
        }
    }

    /// Drops the player and runs the leave flow for its room.
    pub fn disconnect(&mut self, connection_id: &str) {
        let mut outbox = Outbox::default();

        if let Some(player) = self.players.unregister(connection_id) {
            tracing::info!(
                connection_id = %connection_id,
                player = %player.display_name,
                session_secs = (Utc::now() - player.joined_at).num_seconds(),
                "player disconnected"
            );
        } else {
            tracing::debug!(connection_id = %connection_id, "anonymous connection closed");
        }
        self.leave_current_room(connection_id, &mut outbox);

        outbox.flush(&self.hub);
    }

    pub fn countdown_elapsed(&mut self, room_id: &str, generation: u64) {
        let Some(room) = self.rooms.find_mut(room_id) else {
            tracing::debug!(room_id = %room_id, "countdown fired for a closed room");
            return;
        };

        if !room.start(generation) {
            tracing::debug!(
                room_id = %room_id,
                generation = generation,
                "stale countdown ignored"
            );
            return;
        }

        tracing::info!(room_id = %room_id, "match started");
        let mut outbox = Outbox::default();
        outbox.to_room(room, ServerEvent::StartRoom);
        outbox.flush(&self.hub);
    }

    pub fn status(&self) -> CoordinatorStatus {
        CoordinatorStatus {
            players: self.players.len(),
            rooms: self.rooms.len(),
            connections: self.hub.connection_count(),
        }
    }

    pub fn players(&self) -> &PlayerRegistry {
        &self.players
    }

    pub fn rooms(&self) -> &RoomDirectory {
        &self.rooms
    }

    fn join_player(
        &mut self,
        connection_id: &str,
        name: String,
        outbox: &mut Outbox,
    ) -> Result<(), CoordinatorError> {
        if name.is_empty() {
            return Err(CoordinatorError::InvalidField {
                field: "name",
                reason: "must not be empty",
            });
        }
        if name.chars().count() > self.settings.max_name_len {
            return Err(CoordinatorError::InvalidField {
                field: "name",
                reason: "too long",
            });
        }

        let player = self.players.register(connection_id, name)?;
        tracing::info!(
            connection_id = %connection_id,
            player = %player.display_name,
            sequence = player.sequence,
            "player joined"
        );
        outbox.to(
            connection_id,
            ServerEvent::Registered {
                name: player.display_name.clone(),
            },
        );
        Ok(())
    }

    fn create_room(
        &mut self,
        connection_id: &str,
        room_name: String,
        outbox: &mut Outbox,
    ) -> Result<(), CoordinatorError> {
        let player = self
            .players
            .find(connection_id)
            .ok_or(CoordinatorError::NotRegistered)?;

        let room_id = self.rooms.create(room_name, player)?;
        outbox.to(connection_id, ServerEvent::RoomCreated { room_id });
        Ok(())
    }

    fn join_room(
        &mut self,
        connection_id: &str,
        room_id: &str,
        outbox: &mut Outbox,
    ) -> Result<(), CoordinatorError> {
        let player = self
            .players
            .find(connection_id)
            .ok_or(CoordinatorError::NotRegistered)?;

        let players_count = self.rooms.join(room_id, player)?;
        tracing::info!(
            connection_id = %connection_id,
            room_id = %room_id,
            players_count = players_count,
            "player joined room"
        );

        if let Some(room) = self.rooms.find(room_id) {
            outbox.to_room(room, ServerEvent::PlayerJoined { players_count });
        }
        outbox.to(
            connection_id,
            ServerEvent::RoomJoined {
                room_id: room_id.to_string(),
                players_count,
            },
        );
        Ok(())
    }

    fn leave_current_room(&mut self, connection_id: &str, outbox: &mut Outbox) {
        let Some((room_id, outcome)) = self.rooms.leave(connection_id) else {
            return;
        };
        tracing::info!(
            connection_id = %connection_id,
            room_id = %room_id,
            remaining = outcome.remaining,
            canceled = outcome.canceled,
            "player left room"
        );

        let Some(room) = self.rooms.find(&room_id) else {
            return;
        };
        outbox.to_room(
            room,
            ServerEvent::PlayerLeft {
                players_count: outcome.remaining,
            },
        );
        if outcome.canceled {
            outbox.to_room_except(
                room,
                connection_id,
                ServerEvent::RoomCanceled {
                    players_count: outcome.remaining,
                },
            );
        }
    }

    fn player_ready(
        &mut self,
        connection_id: &str,
        outbox: &mut Outbox,
    ) -> Result<(), CoordinatorError> {
        let Some(room) = self.rooms.seated_mut(connection_id) else {
            tracing::debug!(connection_id = %connection_id, "ready signal outside a room");
            return Ok(());
        };

        let outcome = room.set_ready(connection_id)?;
        outbox.to_room(
            room,
            ServerEvent::PlayerReady {
                players_ready: outcome.players_ready,
            },
        );

        if outcome.countdown_due {
            arm_countdown(room, self.settings.countdown(), &self.commands);
        }
        Ok(())
    }

    fn player_cancel(
        &mut self,
        connection_id: &str,
        outbox: &mut Outbox,
    ) -> Result<(), CoordinatorError> {
        let Some(room) = self.rooms.seated_mut(connection_id) else {
            tracing::debug!(connection_id = %connection_id, "cancel signal outside a room");
            return Ok(());
        };

        let players_ready = room.cancel_ready(connection_id)?;
        outbox.to_room(room, ServerEvent::PlayerReady { players_ready });
        Ok(())
    }

    fn make_move(
        &mut self,
        connection_id: &str,
        room_id: &str,
        index: Option<usize>,
        outbox: &mut Outbox,
    ) -> Result<(), CoordinatorError> {
        let room = self
            .rooms
            .find_mut(room_id)
            .ok_or_else(|| CoordinatorError::RoomNotFound(room_id.to_string()))?;

        let Some(index) = index else {
            tracing::debug!(
                connection_id = %connection_id,
                room_id = %room_id,
                "ignored move to a non-cell index"
            );
            return Ok(());
        };

        let result = match room.make_move(connection_id, index) {
            Ok(result) => result,
            Err(rejection) => {
                tracing::debug!(
                    connection_id = %connection_id,
                    room_id = %room_id,
                    index = index,
                    reason = %rejection,
                    "ignored move"
                );
                return Ok(());
            }
        };

        outbox.to_room(
            room,
            ServerEvent::MoveMade {
                board: result.board,
                current_turn: result.current_turn,
            },
        );

        let game_over = match result.outcome {
            Outcome::Winner { mark, line } => Some(ServerEvent::GameOver {
                winner: mark.into(),
                combination: Some(line),
            }),
            Outcome::Draw => Some(ServerEvent::GameOver {
                winner: crate::events::Winner::Draw,
                combination: None,
            }),
            Outcome::InProgress => None,
        };
        if let Some(event) = game_over {
            tracing::info!(room_id = %room_id, board = %result.board, "game over");
            outbox.to_room(room, event);
        }
        Ok(())
    }

    fn restart_game(
        &mut self,
        connection_id: &str,
        room_id: &str,
        outbox: &mut Outbox,
    ) -> Result<(), CoordinatorError> {
        let room = self
            .rooms
            .find_mut(room_id)
            .ok_or_else(|| CoordinatorError::RoomNotFound(room_id.to_string()))?;

        let (board, current_turn) = room.restart(connection_id)?;
        tracing::info!(room_id = %room_id, connection_id = %connection_id, "game restarted");
        outbox.to_room(
            room,
            ServerEvent::RestartGame {
                board,
                current_turn,
            },
        );
        Ok(())
    }
}

/// Spawns the timer task for `room`, replacing any pending one.
fn arm_countdown(room: &mut Room, delay: Duration, commands: &mpsc::UnboundedSender<Command>) {
    let generation = room.next_countdown_generation();
    let room_id = room.id().clone();
    let commands = commands.clone();

    tracing::debug!(
        room_id = %room_id,
        generation = generation,
        delay_secs = delay.as_secs(),
        "countdown armed"
    );

    let task = tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        let _ = commands.send(Command::CountdownElapsed {
            room_id,
            generation,
        });
    });
    room.arm_countdown(Countdown::new(generation, task.abort_handle()));
}

/// Cloneable entry point used by connection tasks.
#[derive(Debug, Clone)]
pub struct CoordinatorHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl CoordinatorHandle {
    pub fn submit(
        &self,
        connection_id: impl Into<ConnectionId>,
        event: ClientEvent,
    ) -> Result<(), CoordinatorError> {
        self.send(Command::Inbound {
            connection_id: connection_id.into(),
            event,
        })
    }

    pub fn disconnect(&self, connection_id: impl Into<ConnectionId>) -> Result<(), CoordinatorError> {
        self.send(Command::Disconnect {
            connection_id: connection_id.into(),
        })
    }

    pub async fn status(&self) -> Result<CoordinatorStatus, CoordinatorError> {
        let (respond_to, response) = oneshot::channel();
        self.send(Command::Status { respond_to })?;
        response.await.map_err(|_| CoordinatorError::Stopped)
    }

    pub fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown);
    }

    fn send(&self, command: Command) -> Result<(), CoordinatorError> {
        self.commands
            .send(command)
            .map_err(|_| CoordinatorError::Stopped)
    }
}
