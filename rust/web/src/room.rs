use crate::errors::IntoClientError;
use crate::events::ConnectionId;
use crate::registry::Player;
use duelroom_engine::{evaluate, Board, GameError, Mark, Outcome};
use thiserror::Error;
use tokio::task::AbortHandle;

pub type RoomId = String;

/// Rooms seat exactly two players.
pub const ROOM_CAPACITY: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub connection_id: ConnectionId,
    pub display_name: String,
    pub mark: Mark,
    pub ready: bool,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RoomError {
    #[error("room {room_id} is full")]
    Full { room_id: RoomId },
    #[error("connection is already a member of room {room_id}")]
    AlreadyMember { room_id: RoomId },
    #[error("connection is not a member of room {room_id}")]
    NotMember { room_id: RoomId },
}

impl IntoClientError for RoomError {
    fn error_code(&self) -> &'static str {
        match self {
            RoomError::Full { .. } => "room_full",
            RoomError::AlreadyMember { .. } => "already_member",
            RoomError::NotMember { .. } => "not_member",
        }
    }

    fn client_message(&self) -> String {
        match self {
            RoomError::Full { .. } => "Room is full".to_string(),
            RoomError::AlreadyMember { .. } => "You are already in this room".to_string(),
            RoomError::NotMember { .. } => "You are not in this room".to_string(),
        }
    }
}

/// Why a move was dropped. Never reported to the client.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum MoveRejection {
    #[error("waiting for a second player")]
    AwaitingOpponent,
    #[error("not the mover's turn")]
    NotYourTurn,
    #[error("game already decided")]
    GameDecided,
    #[error(transparent)]
    Illegal(#[from] GameError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveResult {
    pub board: Board,
    pub current_turn: ConnectionId,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaveOutcome {
    pub remaining: usize,
    /// The room had started and the match was called off.
    pub canceled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadyOutcome {
    pub players_ready: usize,
    /// Both seats are filled and ready in a room that has not started.
    pub countdown_due: bool,
}

/// Pending start timer of a room. Dropping it aborts the timer task.
#[derive(Debug)]
pub struct Countdown {
    generation: u64,
    handle: AbortHandle,
}

impl Countdown {
    pub fn new(generation: u64, handle: AbortHandle) -> Self {
        Self { generation, handle }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// One two-player room and its tic-tac-toe game.
#[derive(Debug)]
pub struct Room {
    id: RoomId,
    name: String,
    members: Vec<Member>,
    board: Board,
    current_turn: ConnectionId,
    started: bool,
    countdown: Option<Countdown>,
    countdown_generation: u64,
}

impl Room {
    /// Opens a room seated with its creator, who plays `x` and moves first.
    pub fn new(id: impl Into<RoomId>, name: impl Into<String>, creator: &Player) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            members: vec![Member {
                connection_id: creator.connection_id.clone(),
                display_name: creator.display_name.clone(),
                mark: Mark::X,
                ready: false,
            }],
            board: Board::empty(),
            current_turn: creator.connection_id.clone(),
            started: false,
            countdown: None,
            countdown_generation: 0,
        }
    }

    pub fn id(&self) -> &RoomId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn member_ids(&self) -> Vec<ConnectionId> {
        self.members
            .iter()
            .map(|m| m.connection_id.clone())
            .collect()
    }

    pub fn member(&self, connection_id: &str) -> Option<&Member> {
        self.members
            .iter()
            .find(|m| m.connection_id == connection_id)
    }

    pub fn is_member(&self, connection_id: &str) -> bool {
        self.member(connection_id).is_some()
    }

    pub fn mark_of(&self, connection_id: &str) -> Option<Mark> {
        self.member(connection_id).map(|m| m.mark)
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn ready_count(&self) -> usize {
        self.members.iter().filter(|m| m.ready).count()
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn current_turn(&self) -> &ConnectionId {
        &self.current_turn
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn has_pending_countdown(&self) -> bool {
        self.countdown.is_some()
    }

    /// Seats a second player with the mark the sitting member does not hold.
    pub fn join(&mut self, player: &Player) -> Result<usize, RoomError> {
        if self.is_member(&player.connection_id) {
            return Err(RoomError::AlreadyMember {
                room_id: self.id.clone(),
            });
        }
        if self.members.len() >= ROOM_CAPACITY {
            return Err(RoomError::Full {
                room_id: self.id.clone(),
            });
        }

        let mark = match self.members.first() {
            Some(sitting) => sitting.mark.opponent(),
            None => Mark::X,
        };
        if self.members.is_empty() {
            self.current_turn = player.connection_id.clone();
        }
        self.members.push(Member {
            connection_id: player.connection_id.clone(),
            display_name: player.display_name.clone(),
            mark,
            ready: false,
        });

        Ok(self.members.len())
    }

    /// Removes a member. Cancels any pending countdown and, if the match
    /// had started, calls it off.
    pub fn leave(&mut self, connection_id: &str) -> Result<LeaveOutcome, RoomError> {
        let position = self
            .members
            .iter()
            .position(|m| m.connection_id == connection_id)
            .ok_or_else(|| RoomError::NotMember {
                room_id: self.id.clone(),
            })?;
        self.members.remove(position);
        self.countdown = None;

        if self.current_turn == connection_id {
            if let Some(first) = self.members.first() {
                self.current_turn = first.connection_id.clone();
            }
        }

        let canceled = self.started && !self.members.is_empty();
        self.started = false;

        Ok(LeaveOutcome {
            remaining: self.members.len(),
            canceled,
        })
    }

    /// Marks a member ready. A pending countdown is dropped unless the room
    /// now qualifies for a new one.
    pub fn set_ready(&mut self, connection_id: &str) -> Result<ReadyOutcome, RoomError> {
        self.member_mut(connection_id)?.ready = true;

        let all_ready = self.members.iter().all(|m| m.ready);
        let countdown_due = all_ready && self.members.len() == ROOM_CAPACITY && !self.started;
        if !countdown_due {
            self.countdown = None;
        }

        Ok(ReadyOutcome {
            players_ready: self.ready_count(),
            countdown_due,
        })
    }

    pub fn cancel_ready(&mut self, connection_id: &str) -> Result<usize, RoomError> {
        self.member_mut(connection_id)?.ready = false;
        self.countdown = None;
        Ok(self.ready_count())
    }

    /// Reserves the generation number for the next countdown.
    pub fn next_countdown_generation(&mut self) -> u64 {
        self.countdown_generation += 1;
        self.countdown_generation
    }

    /// Stores a freshly armed countdown, aborting any previous one.
    pub fn arm_countdown(&mut self, countdown: Countdown) {
        self.countdown = Some(countdown);
    }

    /// Starts the match when the countdown of `generation` fires.
    ///
    /// Returns `false` without touching the room if that countdown was
    /// replaced or canceled, or if the seats are no longer full and ready.
    pub fn start(&mut self, generation: u64) -> bool {
        let armed = self.countdown.as_ref().map(Countdown::generation);
        if armed != Some(generation) {
            return false;
        }
        self.countdown = None;

        if self.members.len() != ROOM_CAPACITY
            || !self.members.iter().all(|m| m.ready)
            || self.started
        {
            return false;
        }

        self.started = true;
        self.reset_board();
        true
    }

    /// Places the mover's mark at `index` and passes the turn.
    pub fn make_move(
        &mut self,
        connection_id: &str,
        index: usize,
    ) -> Result<MoveResult, MoveRejection> {
        if self.members.len() < ROOM_CAPACITY {
            return Err(MoveRejection::AwaitingOpponent);
        }
        if self.current_turn != connection_id {
            return Err(MoveRejection::NotYourTurn);
        }
        if evaluate(&self.board).is_decided() {
            return Err(MoveRejection::GameDecided);
        }
        let mark = self
            .mark_of(connection_id)
            .ok_or(MoveRejection::NotYourTurn)?;

        self.board = self.board.apply_move(index, mark)?;
        if let Some(other) = self
            .members
            .iter()
            .find(|m| m.connection_id != connection_id)
        {
            self.current_turn = other.connection_id.clone();
        }

        Ok(MoveResult {
            board: self.board,
            current_turn: self.current_turn.clone(),
            outcome: evaluate(&self.board),
        })
    }

    /// Clears the board and hands the first move to the first seated member.
    pub fn restart(&mut self, requested_by: &str) -> Result<(Board, ConnectionId), RoomError> {
        if !self.is_member(requested_by) {
            return Err(RoomError::NotMember {
                room_id: self.id.clone(),
            });
        }
        self.reset_board();
        Ok((self.board, self.current_turn.clone()))
    }

    fn reset_board(&mut self) {
        self.board = Board::empty();
        if let Some(first) = self.members.first() {
            self.current_turn = first.connection_id.clone();
        }
    }

    fn member_mut(&mut self, connection_id: &str) -> Result<&mut Member, RoomError> {
        let room_id = &self.id;
        self.members
            .iter_mut()
            .find(|m| m.connection_id == connection_id)
            .ok_or_else(|| RoomError::NotMember {
                room_id: room_id.clone(),
            })
    }
}
