//! Room rosters.
//!
//! A room is the lobby players gather in before a match. Membership changes
//! are computed purely: each operation takes the current room and returns
//! the next one, leaving the caller to commit it.

use serde::Serialize;

use super::board::Board;
use super::config::EngineConfig;
use super::player::{Player, PlayerId};

/// Room state.
#[derive(Debug, Clone, Serialize)]
pub struct Room {
    /// Unique room ID
    pub id: String,

    /// Player who owns lifecycle decisions; first member in join order
    pub master: PlayerId,

    /// Members in join order
    players: Vec<Player>,

    /// Maximum members
    pub capacity: usize,

    /// Members needed to start
    pub min_players: usize,

    /// Set when enough members are present and all of them are ready
    pub ready: bool,

    /// Board handed to the next match started from this room
    #[serde(skip)]
    pub board: Option<Board>,

    /// Most recent match started from this room
    pub match_id: Option<String>,

    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Room {
    /// Create a room with its master as the first member.
    pub fn new(id: String, master: Player, config: &EngineConfig) -> Self {
        let mut master = master;
        master.ready = false;
        Self {
            id,
            master: master.id.clone(),
            players: vec![master],
            capacity: config.room_capacity,
            min_players: config.min_players,
            ready: false,
            board: Some(Board::generate(config.board_width, config.board_height)),
            match_id: None,
            created_at: chrono::Utc::now(),
        }
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn player_ids(&self) -> impl Iterator<Item = &str> {
        self.players.iter().map(|p| p.id.as_str())
    }

    pub fn get_player(&self, player_id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.id == player_id)
    }

    pub fn has_player(&self, player_id: &str) -> bool {
        self.get_player(player_id).is_some()
    }

    pub fn is_master(&self, player_id: &str) -> bool {
        self.master == player_id
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn ready_count(&self) -> usize {
        self.players.iter().filter(|p| p.ready).count()
    }

    pub fn all_ready(&self) -> bool {
        !self.players.is_empty() && self.players.iter().all(|p| p.ready)
    }

    /// Enough members to start a match. Readiness is not considered.
    pub fn can_start(&self) -> bool {
        self.players.len() >= self.min_players
    }

    fn refresh_ready(&mut self) {
        self.ready = self.can_start() && self.all_ready();
    }

    pub fn to_json(&self) -> serde_json::Value {
        let players: Vec<serde_json::Value> = self.players.iter().map(|p| p.to_json()).collect();

        serde_json::json!({
            "id": self.id,
            "master": self.master,
            "players": players,
            "capacity": self.capacity,
            "ready": self.ready,
            "match_id": self.match_id
        })
    }
}

/// Roster errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RosterError {
    #[error("Room is full")]
    RoomFull,
    #[error("Already a member of this room")]
    AlreadyJoined,
    #[error("Not a member of this room")]
    NotInRoom,
}

/// Append a player in join order.
pub fn join(room: &Room, player: &Player) -> Result<Room, RosterError> {
    if room.has_player(&player.id) {
        return Err(RosterError::AlreadyJoined);
    }
    if room.is_full() {
        return Err(RosterError::RoomFull);
    }

    let mut next = room.clone();
    let mut member = player.clone();
    member.ready = false;
    next.players.push(member);
    next.ready = false;
    Ok(next)
}

/// Remove a player. If the leaver was ready, every member's readiness is
/// cleared; the master role passes to the next member in join order.
pub fn leave(room: &Room, player_id: &str) -> Result<Room, RosterError> {
    let index = room
        .players
        .iter()
        .position(|p| p.id == player_id)
        .ok_or(RosterError::NotInRoom)?;

    let mut next = room.clone();
    let leaver = next.players.remove(index);
    if leaver.ready {
        for member in &mut next.players {
            member.ready = false;
        }
    }
    next.ready = false;

    if next.master == leaver.id {
        if let Some(first) = next.players.first() {
            next.master = first.id.clone();
        }
    }
    Ok(next)
}

/// Set one member's readiness. Idempotent.
pub fn set_ready(room: &Room, player_id: &str, ready: bool) -> Result<Room, RosterError> {
    let mut next = room.clone();
    let member = next
        .players
        .iter_mut()
        .find(|p| p.id == player_id)
        .ok_or(RosterError::NotInRoom)?;
    member.ready = ready;
    next.refresh_ready();
    Ok(next)
}
