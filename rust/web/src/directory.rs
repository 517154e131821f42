use crate::events::ConnectionId;
use crate::registry::Player;
use crate::room::{LeaveOutcome, Room, RoomError, RoomId};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use thiserror::Error;

const ROOM_ID_LEN: usize = 8;
const ROOM_ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("room {0} not found")]
    NotFound(RoomId),
    #[error("connection is already seated in room {0}")]
    AlreadySeated(RoomId),
    #[error(transparent)]
    Room(#[from] RoomError),
}

/// All live rooms plus an index of which room each connection sits in.
///
/// Both maps are updated by the same call, so a connection is indexed
/// exactly when it is a member of the indexed room.
#[derive(Debug)]
pub struct RoomDirectory {
    rooms: HashMap<RoomId, Room>,
    seats: HashMap<ConnectionId, RoomId>,
    rng: StdRng,
}

impl Default for RoomDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl RoomDirectory {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_os_rng())
    }

    /// Deterministic room ids, for tests.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            rooms: HashMap::new(),
            seats: HashMap::new(),
            rng,
        }
    }

    /// Opens a room seated with `creator` and returns its id.
    pub fn create(
        &mut self,
        room_name: impl Into<String>,
        creator: &Player,
    ) -> Result<RoomId, DirectoryError> {
        if let Some(room_id) = self.seats.get(&creator.connection_id) {
            return Err(DirectoryError::AlreadySeated(room_id.clone()));
        }

        let room_id = self.fresh_room_id();
        let room = Room::new(room_id.clone(), room_name, creator);
        tracing::info!(
            room_id = %room_id,
            room_name = %room.name(),
            creator = %creator.display_name,
            "room created"
        );

        self.rooms.insert(room_id.clone(), room);
        self.seats
            .insert(creator.connection_id.clone(), room_id.clone());

        Ok(room_id)
    }

    pub fn find(&self, room_id: &str) -> Option<&Room> {
        self.rooms.get(room_id)
    }

    pub fn find_mut(&mut self, room_id: &str) -> Option<&mut Room> {
        self.rooms.get_mut(room_id)
    }

    /// Seats `player` in `room_id`; returns the new member count.
    pub fn join(&mut self, room_id: &str, player: &Player) -> Result<usize, DirectoryError> {
        if let Some(current) = self.seats.get(&player.connection_id) {
            return Err(DirectoryError::AlreadySeated(current.clone()));
        }
        let room = self
            .rooms
            .get_mut(room_id)
            .ok_or_else(|| DirectoryError::NotFound(room_id.to_string()))?;

        let count = room.join(player)?;
        self.seats
            .insert(player.connection_id.clone(), room.id().clone());
        Ok(count)
    }

    /// Removes `connection_id` from whatever room it sits in.
    ///
    /// An emptied room is dropped, which also aborts its countdown.
    pub fn leave(&mut self, connection_id: &str) -> Option<(RoomId, LeaveOutcome)> {
        let room_id = self.seats.remove(connection_id)?;
        let outcome = self.rooms.get_mut(&room_id)?.leave(connection_id).ok()?;
        self.remove_if_empty(&room_id);
        Some((room_id, outcome))
    }

    pub fn remove_if_empty(&mut self, room_id: &str) -> bool {
        let empty = self.rooms.get(room_id).is_some_and(Room::is_empty);
        if empty {
            self.rooms.remove(room_id);
            tracing::info!(room_id = %room_id, "room closed");
        }
        empty
    }

    pub fn room_of(&self, connection_id: &str) -> Option<&RoomId> {
        self.seats.get(connection_id)
    }

    /// The room `connection_id` currently sits in.
    pub fn seated_mut(&mut self, connection_id: &str) -> Option<&mut Room> {
        let room_id = self.seats.get(connection_id)?;
        self.rooms.get_mut(room_id)
    }

    /// Runs `f` on every room that seats `connection_id`.
    ///
    /// Served from the seat index; with one room per connection this calls
    /// `f` at most once.
    pub fn for_each_room_containing<F>(&mut self, connection_id: &str, mut f: F)
    where
        F: FnMut(&mut Room),
    {
        let Some(room_id) = self.seats.get(connection_id) else {
            return;
        };
        if let Some(room) = self.rooms.get_mut(room_id) {
            f(room);
        }
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// Random base-36 token, regenerated if it names a live room.
    fn fresh_room_id(&mut self) -> RoomId {
        loop {
            let candidate: String = (0..ROOM_ID_LEN)
                .map(|_| {
                    let pick = self.rng.random_range(0..ROOM_ID_ALPHABET.len());
                    char::from(ROOM_ID_ALPHABET[pick])
                })
                .collect();
            if !self.rooms.contains_key(&candidate) {
                return candidate;
            }
            tracing::debug!(room_id = %candidate, "room id collision, regenerating");
        }
    }
}
