//! Match state machine.
//!
//! A match is created from a room's roster and board, then advanced one turn
//! at a time. Every turn is validated in full before anything is applied, so a
//! rejected turn leaves the match exactly as it was.
//!
//! ```text
//! Room (lobby) ──start──▶ Active ──last player standing──▶ Finished
//! ```

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, info};

use super::board::{Board, BoardError, Coordinate};
use super::config::EngineConfig;
use super::moves;
use super::player::PlayerId;
use super::roster::Room;

/// Match state machine states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Active,
    Finished,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Finished => "finished",
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

/// Match errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MatchError {
    #[error("Not enough players to start")]
    NotEnoughPlayers,
    #[error("Not every player is ready")]
    PlayersNotReady,
    #[error("Player {0} is already in an active match")]
    AlreadyInMatch(PlayerId),
    #[error("It's not your turn")]
    NotCurrentActor,
    #[error("Path must start where the player stands")]
    DiscontinuousPath,
    #[error("Illegal step at index {index}")]
    IllegalStep { index: usize },
    #[error(transparent)]
    Board(#[from] BoardError),
    #[error("Match has finished")]
    MatchFinished,
    #[error("No match found")]
    MatchNotFound,
}

/// Result of an accepted turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TurnOutcome {
    /// Player whose turn it is now
    pub next_actor: PlayerId,
    /// Turn counter after advancing
    pub turn: u32,
    /// Steps actually walked
    pub steps_applied: usize,
    pub eliminated: Option<PlayerId>,
    pub winner: Option<PlayerId>,
}

/// Read-only view of a match.
#[derive(Debug, Clone, Serialize)]
pub struct MatchSnapshot {
    pub match_id: String,
    pub room_id: String,
    pub status: MatchStatus,
    pub turn: u32,
    pub current_actor: PlayerId,
    pub players: Vec<PlayerId>,
    pub active_player_count: usize,
    pub board: Board,
    pub history: HashMap<PlayerId, Vec<Coordinate>>,
    pub winner: Option<PlayerId>,
}

impl MatchSnapshot {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "match_id": self.match_id,
            "room_id": self.room_id,
            "status": self.status.as_str(),
            "turn": self.turn,
            "current_player": self.current_actor,
            "players": self.players,
            "number_of_players": self.active_player_count,
            "map": self.board.to_json(),
            "history": self.history,
            "winner": self.winner
        })
    }
}

/// One match's mutable state.
#[derive(Debug, Clone)]
pub struct Match {
    pub id: String,

    pub room_id: String,

    status: MatchStatus,

    board: Board,

    /// Active players in join order; shrinks on elimination
    players: Vec<PlayerId>,

    /// Turn counter, starts at 1
    turn: u32,

    current_actor: PlayerId,

    /// Visited coordinates per active player; last entry is where they stand
    history: HashMap<PlayerId, Vec<Coordinate>>,

    eliminated: Vec<PlayerId>,

    winner: Option<PlayerId>,

    pub started_at: chrono::DateTime<chrono::Utc>,

    pub ended_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Match {
    /// Start a match from a room. Reuses the room's board when present.
    ///
    /// Players take spawn corners and turn order by join order.
    pub fn start(
        id: String,
        room: &Room,
        board: Option<Board>,
        config: &EngineConfig,
    ) -> Result<Self, MatchError> {
        if room.player_count() < config.min_players.max(2) {
            return Err(MatchError::NotEnoughPlayers);
        }
        if config.require_ready && !room.all_ready() {
            return Err(MatchError::PlayersNotReady);
        }

        let mut board =
            board.unwrap_or_else(|| Board::generate(config.board_width, config.board_height));
        let spawns = board.spawn_positions(room.player_count());

        let mut players = Vec::with_capacity(spawns.len());
        let mut history = HashMap::with_capacity(spawns.len());
        for (player_id, spawn) in room.player_ids().zip(spawns) {
            board.set_occupant(spawn, Some(player_id.to_string()))?;
            history.insert(player_id.to_string(), vec![spawn]);
            players.push(player_id.to_string());
        }

        let current_actor = players[0].clone();

        Ok(Self {
            id,
            room_id: room.id.clone(),
            status: MatchStatus::Active,
            board,
            players,
            turn: 1,
            current_actor,
            history,
            eliminated: Vec::new(),
            winner: None,
            started_at: chrono::Utc::now(),
            ended_at: None,
        })
    }

    pub fn status(&self) -> MatchStatus {
        self.status
    }

    pub fn turn(&self) -> u32 {
        self.turn
    }

    pub fn current_actor(&self) -> &str {
        &self.current_actor
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Active players in turn order.
    pub fn players(&self) -> &[PlayerId] {
        &self.players
    }

    pub fn has_player(&self, player_id: &str) -> bool {
        self.players.iter().any(|p| p == player_id)
    }

    pub fn eliminated(&self) -> &[PlayerId] {
        &self.eliminated
    }

    pub fn winner(&self) -> Option<&str> {
        self.winner.as_deref()
    }

    pub fn history(&self, player_id: &str) -> Option<&[Coordinate]> {
        self.history.get(player_id).map(Vec::as_slice)
    }

    /// Where a player currently stands.
    pub fn position(&self, player_id: &str) -> Option<Coordinate> {
        self.history.get(player_id).and_then(|h| h.last().copied())
    }

    /// Apply one turn atomically.
    pub fn apply_turn(
        &mut self,
        player_id: &str,
        path: &[Coordinate],
    ) -> Result<TurnOutcome, MatchError> {
        if !self.status.is_active() {
            return Err(MatchError::MatchFinished);
        }
        if player_id != self.current_actor {
            return Err(MatchError::NotCurrentActor);
        }
        if path.first().copied() != self.position(player_id) {
            return Err(MatchError::DiscontinuousPath);
        }
        // Pairs are checked in path order so the first failure is reported
        for (index, pair) in path.windows(2).enumerate() {
            self.board.cell_at(pair[1])?;
            if !moves::is_legal_step(pair[0], pair[1]) {
                return Err(MatchError::IllegalStep { index });
            }
        }

        let mut next = self.clone();
        let outcome = next.walk(player_id, path)?;
        *self = next;
        Ok(outcome)
    }

    /// Walk a validated path, then advance the turn.
    fn walk(&mut self, player_id: &str, path: &[Coordinate]) -> Result<TurnOutcome, MatchError> {
        let mut steps_applied = 0;
        let mut eliminated = None;

        for pair in path.windows(2) {
            let (from, to) = (pair[0], pair[1]);

            let victim = match self.board.occupant(to)? {
                Some(owner) if owner != player_id => Some(owner.to_string()),
                _ => None,
            };
            if let Some(victim) = &victim {
                self.eliminate(victim);
            }

            self.board.set_occupant(from, None)?;
            self.board.set_occupant(to, Some(player_id.to_string()))?;
            if let Some(steps) = self.history.get_mut(player_id) {
                steps.push(to);
            }
            steps_applied += 1;

            if victim.is_some() {
                eliminated = victim;
                break;
            }
        }

        self.advance();

        debug!(
            match_id = %self.id,
            player_id,
            steps_applied,
            next_actor = %self.current_actor,
            "Turn applied"
        );

        Ok(TurnOutcome {
            next_actor: self.current_actor.clone(),
            turn: self.turn,
            steps_applied,
            eliminated,
            winner: self.winner.clone(),
        })
    }

    fn eliminate(&mut self, victim: &str) {
        self.board.clear_owner(victim);
        self.history.remove(victim);
        self.players.retain(|p| p != victim);
        self.eliminated.push(victim.to_string());
        info!(match_id = %self.id, player_id = victim, "Player eliminated");
    }

    /// Round-robin over the current active list, indexed by the turn counter.
    fn advance(&mut self) {
        let count = self.players.len();
        if count == 0 {
            return;
        }

        let index = (self.turn as usize) % count;
        self.current_actor = self.players[index].clone();
        self.turn += 1;

        if count == 1 {
            self.status = MatchStatus::Finished;
            self.winner = Some(self.players[0].clone());
            self.ended_at = Some(chrono::Utc::now());
            info!(match_id = %self.id, winner = %self.players[0], "Match finished");
        }
    }

    pub fn snapshot(&self) -> MatchSnapshot {
        MatchSnapshot {
            match_id: self.id.clone(),
            room_id: self.room_id.clone(),
            status: self.status,
            turn: self.turn,
            current_actor: self.current_actor.clone(),
            players: self.players.clone(),
            active_player_count: self.players.len(),
            board: self.board.clone(),
            history: self.history.clone(),
            winner: self.winner.clone(),
        }
    }
}
