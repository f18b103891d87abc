//! Persistence seams for players and rooms, with in-memory implementations.

use dashmap::DashMap;

use super::arena::ArenaError;
use super::player::{Player, PlayerId};
use super::roster::Room;

/// Durable storage of player records.
pub trait PlayerRepository: Send + Sync {
    fn insert(&self, player: Player);

    fn get(&self, player_id: &str) -> Option<Player>;

    fn list(&self) -> Vec<Player>;

    /// Store a player's readiness, returning the updated record.
    fn set_ready(&self, player_id: &str, ready: bool) -> Option<Player>;
}

/// Durable storage of rooms.
pub trait RoomRepository: Send + Sync {
    fn insert(&self, room: Room);

    fn get(&self, room_id: &str) -> Option<Room>;

    fn list(&self) -> Vec<Room>;

    fn remove(&self, room_id: &str) -> Option<Room>;

    /// Apply a fallible change to a stored room.
    ///
    /// The change works on a copy, which replaces the stored room only if the
    /// change succeeds. Changes to the same room are serialized.
    fn commit<T>(
        &self,
        room_id: &str,
        change: impl FnOnce(&mut Room) -> Result<T, ArenaError>,
    ) -> Result<(Room, T), ArenaError>;
}

#[derive(Debug, Default)]
pub struct InMemoryPlayers {
    players: DashMap<PlayerId, Player>,
}

impl InMemoryPlayers {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PlayerRepository for InMemoryPlayers {
    fn insert(&self, player: Player) {
        self.players.insert(player.id.clone(), player);
    }

    fn get(&self, player_id: &str) -> Option<Player> {
        self.players.get(player_id).map(|p| p.value().clone())
    }

    fn list(&self) -> Vec<Player> {
        self.players.iter().map(|p| p.value().clone()).collect()
    }

    fn set_ready(&self, player_id: &str, ready: bool) -> Option<Player> {
        let mut player = self.players.get_mut(player_id)?;
        player.ready = ready;
        Some(player.clone())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryRooms {
    rooms: DashMap<String, Room>,
}

impl InMemoryRooms {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RoomRepository for InMemoryRooms {
    fn insert(&self, room: Room) {
        self.rooms.insert(room.id.clone(), room);
    }

    fn get(&self, room_id: &str) -> Option<Room> {
        self.rooms.get(room_id).map(|r| r.value().clone())
    }

    fn list(&self) -> Vec<Room> {
        self.rooms.iter().map(|r| r.value().clone()).collect()
    }

    fn remove(&self, room_id: &str) -> Option<Room> {
        self.rooms.remove(room_id).map(|(_, room)| room)
    }

    fn commit<T>(
        &self,
        room_id: &str,
        change: impl FnOnce(&mut Room) -> Result<T, ArenaError>,
    ) -> Result<(Room, T), ArenaError> {
        let mut stored = self
            .rooms
            .get_mut(room_id)
            .ok_or_else(|| ArenaError::RoomNotFound(room_id.to_string()))?;

        let mut working = stored.clone();
        let value = change(&mut working)?;
        *stored = working.clone();
        Ok((working, value))
    }
}
