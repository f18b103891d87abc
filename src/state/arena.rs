//! The arena - single entry point for request handlers.
//!
//! Wires the player and room repositories, the match registry and per-player
//! presence together. Every operation either commits all of its changes or
//! returns a typed error without mutating anything.

use dashmap::DashMap;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::board::Coordinate;
use super::config::{ConfigError, EngineConfig};
use super::engine::{MatchError, MatchSnapshot, TurnOutcome};
use super::player::{InvalidTransition, Player, PlayerEvent, PlayerId, PlayerLocation, PlayerState};
use super::registry::MatchRegistry;
use super::repository::{InMemoryPlayers, InMemoryRooms, PlayerRepository, RoomRepository};
use super::roster::{self, Room, RosterError};

/// Arena errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArenaError {
    #[error("Player {0} not found")]
    PlayerNotFound(String),
    #[error("Room {0} not found")]
    RoomNotFound(String),
    #[error("Already in room {0}")]
    AlreadyInRoom(String),
    #[error("Room {0} has a match in progress")]
    MatchInProgress(String),
    #[error(transparent)]
    Roster(#[from] RosterError),
    #[error(transparent)]
    Match(#[from] MatchError),
    #[error(transparent)]
    Transition(#[from] InvalidTransition),
}

/// Result of cleanup operation.
#[derive(Debug, Default)]
pub struct CleanupResult {
    pub finished_matches: Vec<String>,
    pub empty_rooms: Vec<String>,
}

impl CleanupResult {
    pub fn is_empty(&self) -> bool {
        self.finished_matches.is_empty() && self.empty_rooms.is_empty()
    }
}

/// Rooms, matches and player presence for one process.
///
/// Construct once at startup and share by reference (or `Arc`) with every
/// request handler.
#[derive(Debug)]
pub struct Arena<P = InMemoryPlayers, R = InMemoryRooms> {
    config: EngineConfig,
    players: P,
    rooms: R,
    matches: MatchRegistry,
    presence: DashMap<PlayerId, PlayerState>,
}

impl Arena {
    /// Arena backed by in-memory repositories.
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        Self::with_repositories(config, InMemoryPlayers::new(), InMemoryRooms::new())
    }
}

impl<P: PlayerRepository, R: RoomRepository> Arena<P, R> {
    pub fn with_repositories(config: EngineConfig, players: P, rooms: R) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            players,
            rooms,
            matches: MatchRegistry::new(),
            presence: DashMap::new(),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn matches(&self) -> &MatchRegistry {
        &self.matches
    }

    #[instrument(skip(self))]
    pub fn register_player(&self, name: &str) -> Player {
        let player = Player::new(Uuid::new_v4().to_string(), name);
        self.players.insert(player.clone());
        info!(player_id = %player.id, "Player registered");
        player
    }

    pub fn player(&self, player_id: &str) -> Result<Player, ArenaError> {
        self.players
            .get(player_id)
            .ok_or_else(|| ArenaError::PlayerNotFound(player_id.to_string()))
    }

    pub fn players(&self) -> Vec<Player> {
        self.players.list()
    }

    /// Where a player currently is.
    pub fn location(&self, player_id: &str) -> PlayerLocation {
        self.presence
            .get(player_id)
            .map(|state| state.location().clone())
            .unwrap_or_default()
    }

    /// Set a player's readiness, in their room too if they are in one.
    #[instrument(skip(self))]
    pub fn set_ready(&self, player_id: &str, ready: bool) -> Result<Player, ArenaError> {
        self.player(player_id)?;

        if let Some(room_id) = self.location(player_id).room_id() {
            self.rooms.commit(room_id, |room| {
                *room = roster::set_ready(room, player_id, ready)?;
                Ok(())
            })?;
        }

        self.players
            .set_ready(player_id, ready)
            .ok_or_else(|| ArenaError::PlayerNotFound(player_id.to_string()))
    }

    /// Create a room with the given player as master and first member.
    #[instrument(skip(self))]
    pub fn create_room(&self, master_id: &str) -> Result<Room, ArenaError> {
        let master = self.player(master_id)?;
        let room_id = Uuid::new_v4().to_string();

        let mut presence = self.presence.entry(master_id.to_string()).or_default();
        if let Some(current) = presence.room_id() {
            return Err(ArenaError::AlreadyInRoom(current.to_string()));
        }
        presence.apply_mut(PlayerEvent::JoinRoom {
            room_id: room_id.clone(),
        })?;

        let room = Room::new(room_id, master, &self.config);
        self.rooms.insert(room.clone());
        drop(presence);

        self.sync_readiness(&room);
        info!(room_id = %room.id, master = %room.master, "Room created");
        Ok(room)
    }

    #[instrument(skip(self))]
    pub fn join_room(&self, room_id: &str, player_id: &str) -> Result<Room, ArenaError> {
        let player = self.player(player_id)?;

        let mut presence = self.presence.entry(player_id.to_string()).or_default();
        match presence.room_id() {
            Some(current) if current == room_id => return Err(RosterError::AlreadyJoined.into()),
            Some(current) => return Err(ArenaError::AlreadyInRoom(current.to_string())),
            None => {}
        }

        let (room, next) = self.rooms.commit(room_id, |room| {
            self.ensure_no_active_match(room)?;
            *room = roster::join(room, &player)?;
            Ok(presence.apply(PlayerEvent::JoinRoom {
                room_id: room_id.to_string(),
            })?)
        })?;
        *presence = next;
        drop(presence);

        self.sync_readiness(&room);
        info!(room_id, player_id, players = room.player_count(), "Player joined room");
        Ok(room)
    }

    /// Leave a room. The room is removed once its last member leaves.
    #[instrument(skip(self))]
    pub fn leave_room(&self, room_id: &str, player_id: &str) -> Result<Room, ArenaError> {
        let mut presence = self.presence.entry(player_id.to_string()).or_default();

        let (room, next) = self.rooms.commit(room_id, |room| {
            self.ensure_no_active_match(room)?;
            *room = roster::leave(room, player_id)?;
            Ok(presence.apply(PlayerEvent::LeaveRoom)?)
        })?;
        *presence = next;
        drop(presence);

        self.players.set_ready(player_id, false);
        self.sync_readiness(&room);
        info!(room_id, player_id, players = room.player_count(), "Player left room");

        if room.is_empty() {
            self.rooms.remove(room_id);
            info!(room_id, "Empty room removed");
        }
        Ok(room)
    }

    pub fn room(&self, room_id: &str) -> Result<Room, ArenaError> {
        self.rooms
            .get(room_id)
            .ok_or_else(|| ArenaError::RoomNotFound(room_id.to_string()))
    }

    pub fn rooms(&self) -> Vec<Room> {
        self.rooms.list()
    }

    /// Start a match from a room, handing it the room's board.
    #[instrument(skip(self))]
    pub fn start_match(&self, room_id: &str) -> Result<MatchSnapshot, ArenaError> {
        let match_id = Uuid::new_v4().to_string();
        let start = PlayerEvent::StartMatch {
            match_id: match_id.clone(),
        };

        // Presence is checked before the room is touched; it is locked ahead
        // of rooms, never inside a room commit.
        for member in self.room(room_id)?.player_ids() {
            self.presence_of(member).apply(start.clone())?;
        }

        let (_, snapshot) = self.rooms.commit(room_id, |room| {
            self.ensure_no_active_match(room)?;
            let board = room.board.take();
            let snapshot = self
                .matches
                .start(match_id.clone(), room, board, &self.config)?;
            room.match_id = Some(match_id.clone());
            Ok(snapshot)
        })?;

        for player_id in &snapshot.players {
            self.transition(player_id, start.clone());
        }
        Ok(snapshot)
    }

    /// Apply a turn for the player whose turn it is.
    #[instrument(skip(self, path), fields(steps = path.len().saturating_sub(1)))]
    pub fn apply_turn(&self, player_id: &str, path: &[Coordinate]) -> Result<TurnOutcome, ArenaError> {
        let outcome = self.matches.apply_turn(player_id, path)?;

        if let Some(victim) = &outcome.eliminated {
            self.transition(victim, PlayerEvent::LeaveMatch);
        }
        if let Some(winner) = &outcome.winner {
            self.transition(winner, PlayerEvent::LeaveMatch);
        }
        Ok(outcome)
    }

    /// Snapshot of the match a player is taking part in.
    pub fn match_state(&self, player_id: &str) -> Result<MatchSnapshot, ArenaError> {
        Ok(self.matches.state(player_id)?)
    }

    /// Drop finished matches and rooms nobody is in.
    pub fn cleanup(&self) -> CleanupResult {
        let finished_matches = self.matches.cleanup_finished();

        let empty_rooms: Vec<String> = self
            .rooms
            .list()
            .into_iter()
            .filter(|room| room.is_empty())
            .map(|room| room.id)
            .collect();
        for id in &empty_rooms {
            self.rooms.remove(id);
        }

        CleanupResult {
            finished_matches,
            empty_rooms,
        }
    }

    fn ensure_no_active_match(&self, room: &Room) -> Result<(), ArenaError> {
        match &room.match_id {
            Some(match_id) if self.matches.is_active(match_id) => {
                Err(ArenaError::MatchInProgress(room.id.clone()))
            }
            _ => Ok(()),
        }
    }

    /// Mirror room readiness into the player records.
    fn sync_readiness(&self, room: &Room) {
        for member in room.players() {
            self.players.set_ready(&member.id, member.ready);
        }
    }

    fn presence_of(&self, player_id: &str) -> PlayerState {
        self.presence
            .get(player_id)
            .map(|state| state.value().clone())
            .unwrap_or_default()
    }

    /// Record a presence change that follows an already committed match
    /// change.
    ///
    /// Start checks every member up front, and turns only move players who
    /// sit in the match. This fails only when the registry was driven
    /// directly through `matches()`, bypassing presence; the match change
    /// stands and the stale presence is reported.
    fn transition(&self, player_id: &str, event: PlayerEvent) {
        let mut state = self.presence.entry(player_id.to_string()).or_default();
        if let Err(err) = state.apply_mut(event) {
            warn!(player_id, error = %err, "Presence out of sync");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::engine::MatchStatus;
    use pretty_assertions::assert_eq;

    fn c(x: usize, y: usize) -> Coordinate {
        Coordinate::new(x, y)
    }

    fn arena() -> Arena {
        Arena::new(EngineConfig::default()).unwrap()
    }

    /// A room with `count` registered members, master first.
    fn make_room(arena: &Arena, count: usize) -> (Room, Vec<String>) {
        let ids: Vec<String> = (1..=count)
            .map(|n| arena.register_player(&format!("P{}", n)).id)
            .collect();
        let mut room = arena.create_room(&ids[0]).unwrap();
        for id in &ids[1..] {
            room = arena.join_room(&room.id, id).unwrap();
        }
        (room, ids)
    }

    #[test]
    fn test_create_room() {
        let arena = arena();
        let (room, ids) = make_room(&arena, 1);

        assert!(room.is_master(&ids[0]));
        assert_eq!(room.player_count(), 1);
        assert_eq!(arena.room(&room.id).unwrap().id, room.id);
        assert_eq!(arena.location(&ids[0]).room_id(), Some(room.id.as_str()));

        assert_eq!(
            arena.create_room(&ids[0]).unwrap_err(),
            ArenaError::AlreadyInRoom(room.id.clone())
        );
        assert!(matches!(
            arena.create_room("ghost"),
            Err(ArenaError::PlayerNotFound(_))
        ));
    }

    #[test]
    fn test_join_errors() {
        let arena = arena();
        let (room, ids) = make_room(&arena, 2);

        assert_eq!(
            arena.join_room(&room.id, &ids[1]).unwrap_err(),
            ArenaError::Roster(RosterError::AlreadyJoined)
        );

        let other = arena.register_player("Other");
        assert_eq!(
            arena.join_room("missing", &other.id).unwrap_err(),
            ArenaError::RoomNotFound("missing".to_string())
        );
        // A failed join leaves the player free to join elsewhere
        assert_eq!(arena.location(&other.id), PlayerLocation::Idle);

        let (second, _) = make_room(&arena, 1);
        assert_eq!(
            arena.join_room(&second.id, &ids[1]).unwrap_err(),
            ArenaError::AlreadyInRoom(room.id.clone())
        );
    }

    #[test]
    fn test_fifth_join_is_rejected() {
        let arena = arena();
        let (room, ids) = make_room(&arena, 4);
        let fifth = arena.register_player("P5");

        assert_eq!(
            arena.join_room(&room.id, &fifth.id).unwrap_err(),
            ArenaError::Roster(RosterError::RoomFull)
        );

        let room = arena.room(&room.id).unwrap();
        let members: Vec<&str> = room.player_ids().collect();
        assert_eq!(members, ids.iter().map(String::as_str).collect::<Vec<_>>());
        assert_eq!(arena.location(&fifth.id), PlayerLocation::Idle);
    }

    #[test]
    fn test_leave_room() {
        let arena = arena();
        let (room, ids) = make_room(&arena, 2);

        let after = arena.leave_room(&room.id, &ids[0]).unwrap();
        assert!(after.is_master(&ids[1]));
        assert_eq!(arena.location(&ids[0]), PlayerLocation::Idle);

        assert_eq!(
            arena.leave_room(&room.id, &ids[0]).unwrap_err(),
            ArenaError::Roster(RosterError::NotInRoom)
        );

        arena.leave_room(&room.id, &ids[1]).unwrap();
        assert_eq!(
            arena.room(&room.id).unwrap_err(),
            ArenaError::RoomNotFound(room.id.clone())
        );
        assert_eq!(
            arena.leave_room(&room.id, &ids[1]).unwrap_err(),
            ArenaError::RoomNotFound(room.id.clone())
        );
    }

    #[test]
    fn test_ready_is_mirrored() {
        let arena = arena();
        let (room, ids) = make_room(&arena, 2);

        arena.set_ready(&ids[0], true).unwrap();
        let player = arena.set_ready(&ids[1], true).unwrap();
        assert!(player.ready);
        assert!(arena.room(&room.id).unwrap().ready);

        // Idempotent
        arena.set_ready(&ids[1], true).unwrap();
        assert!(arena.room(&room.id).unwrap().ready);

        // A ready member leaving clears everyone
        arena.leave_room(&room.id, &ids[1]).unwrap();
        assert!(!arena.room(&room.id).unwrap().ready);
        assert!(!arena.player(&ids[0]).unwrap().ready);
        assert!(!arena.player(&ids[1]).unwrap().ready);
    }

    #[test]
    fn test_start_requires_two_players() {
        let arena = arena();
        let (room, _) = make_room(&arena, 1);

        assert_eq!(
            arena.start_match(&room.id).unwrap_err(),
            ArenaError::Match(MatchError::NotEnoughPlayers)
        );
        // Room keeps its board for a later start
        assert!(arena.room(&room.id).unwrap().board.is_some());
        assert_eq!(
            arena.start_match("missing").unwrap_err(),
            ArenaError::RoomNotFound("missing".to_string())
        );
    }

    #[test]
    fn test_readiness_gate() {
        let config = EngineConfig {
            require_ready: true,
            ..EngineConfig::default()
        };
        let arena = Arena::new(config).unwrap();
        let (room, ids) = make_room(&arena, 2);

        assert_eq!(
            arena.start_match(&room.id).unwrap_err(),
            ArenaError::Match(MatchError::PlayersNotReady)
        );

        arena.set_ready(&ids[0], true).unwrap();
        arena.set_ready(&ids[1], true).unwrap();
        assert!(arena.start_match(&room.id).is_ok());
    }

    #[test]
    fn test_start_rejects_out_of_sync_presence() {
        let arena = arena();
        let (room, ids) = make_room(&arena, 2);
        arena.presence.remove(&ids[1]);

        assert!(matches!(
            arena.start_match(&room.id),
            Err(ArenaError::Transition(_))
        ));

        // Nothing was started or consumed
        let room = arena.room(&room.id).unwrap();
        assert!(room.match_id.is_none());
        assert!(room.board.is_some());
        assert_eq!(arena.matches().count(), 0);
        assert_eq!(arena.location(&ids[0]).room_id(), Some(room.id.as_str()));
    }

    #[test]
    fn test_start_match() {
        let arena = arena();
        let (room, ids) = make_room(&arena, 3);

        let snapshot = arena.start_match(&room.id).unwrap();

        assert_eq!(snapshot.turn, 1);
        assert_eq!(snapshot.current_actor, ids[0]);
        assert_eq!(snapshot.active_player_count, 3);
        assert_eq!(snapshot.history.len(), 3);
        assert_eq!(snapshot.history[&ids[0]], vec![c(1, 1)]);
        assert_eq!(snapshot.history[&ids[1]], vec![c(1, 16)]);
        assert_eq!(snapshot.history[&ids[2]], vec![c(16, 1)]);

        let room = arena.room(&room.id).unwrap();
        assert_eq!(room.match_id.as_deref(), Some(snapshot.match_id.as_str()));
        assert!(room.board.is_none());
        for id in &ids {
            assert!(arena.location(id).is_in_match());
        }
    }

    #[test]
    fn test_room_frozen_during_match() {
        let arena = arena();
        let (room, ids) = make_room(&arena, 2);
        arena.start_match(&room.id).unwrap();

        let late = arena.register_player("Late");
        assert_eq!(
            arena.join_room(&room.id, &late.id).unwrap_err(),
            ArenaError::MatchInProgress(room.id.clone())
        );
        assert_eq!(
            arena.leave_room(&room.id, &ids[1]).unwrap_err(),
            ArenaError::MatchInProgress(room.id.clone())
        );
        assert_eq!(
            arena.start_match(&room.id).unwrap_err(),
            ArenaError::MatchInProgress(room.id.clone())
        );

        // Readiness may still change
        assert!(arena.set_ready(&ids[1], true).is_ok());
    }

    #[test]
    fn test_scenario_simple_move() {
        let arena = arena();
        let (room, ids) = make_room(&arena, 2);
        arena.start_match(&room.id).unwrap();

        let outcome = arena.apply_turn(&ids[0], &[c(1, 1), c(1, 2)]).unwrap();
        assert_eq!(outcome.next_actor, ids[1]);

        let state = arena.match_state(&ids[1]).unwrap();
        assert_eq!(state.board.occupant(c(1, 2)).unwrap(), Some(ids[0].as_str()));
        assert_eq!(state.board.occupant(c(1, 1)).unwrap(), None);
        assert_eq!(state.current_actor, ids[1]);
    }

    #[test]
    fn test_scenario_out_of_turn() {
        let arena = arena();
        let (room, ids) = make_room(&arena, 2);
        arena.start_match(&room.id).unwrap();
        arena.apply_turn(&ids[0], &[c(1, 1), c(1, 2)]).unwrap();
        let before = arena.match_state(&ids[0]).unwrap().to_json();

        assert_eq!(
            arena.apply_turn(&ids[0], &[c(1, 2), c(2, 2)]).unwrap_err(),
            ArenaError::Match(MatchError::NotCurrentActor)
        );
        assert_eq!(arena.match_state(&ids[0]).unwrap().to_json(), before);
    }

    #[test]
    fn test_scenario_elimination_and_rematch() {
        let arena = arena();
        let (room, ids) = make_room(&arena, 2);
        let (a, b) = (ids[0].as_str(), ids[1].as_str());
        arena.start_match(&room.id).unwrap();

        // "a" runs down column 1 while "b" steps aside and back
        let mut b_at = c(1, 16);
        for y in 1..15 {
            arena.apply_turn(a, &[c(1, y), c(1, y + 1)]).unwrap();
            if y < 14 {
                let next = if b_at.x == 1 { c(2, 16) } else { c(1, 16) };
                arena.apply_turn(b, &[b_at, next]).unwrap();
                b_at = next;
            }
        }
        let outcome = arena
            .apply_turn(b, &[b_at, c(1, 16), c(1, 15)])
            .unwrap();
        assert_eq!(outcome.eliminated.as_deref(), Some(a));
        assert_eq!(outcome.winner.as_deref(), Some(b));

        let state = arena.match_state(b).unwrap();
        assert_eq!(state.status, MatchStatus::Finished);
        assert_eq!(state.active_player_count, 1);
        assert_eq!(state.board.occupied_cells().count(), 1);
        assert!(state.board.is_consistent());

        assert_eq!(
            arena.apply_turn(b, &[c(1, 15), c(1, 14)]).unwrap_err(),
            ArenaError::Match(MatchError::MatchFinished)
        );
        assert_eq!(
            arena.match_state(a).unwrap_err(),
            ArenaError::Match(MatchError::MatchNotFound)
        );
        assert_eq!(
            arena.apply_turn(a, &[c(1, 15), c(1, 14)]).unwrap_err(),
            ArenaError::Match(MatchError::MatchNotFound)
        );

        // Both are back in the lobby and can play again on a fresh board
        assert_eq!(arena.location(a).room_id(), Some(room.id.as_str()));
        assert!(!arena.location(b).is_in_match());
        let rematch = arena.start_match(&room.id).unwrap();
        assert_eq!(rematch.board.occupied_cells().count(), 2);
        assert_eq!(arena.match_state(a).unwrap().match_id, rematch.match_id);

        let cleaned = arena.cleanup();
        assert_eq!(cleaned.finished_matches, vec![state.match_id]);
        assert!(cleaned.empty_rooms.is_empty());
    }

    #[test]
    fn test_independent_matches_in_parallel() {
        let arena = arena();
        let rooms: Vec<(Room, Vec<String>)> = (0..4).map(|_| make_room(&arena, 2)).collect();
        for (room, _) in &rooms {
            arena.start_match(&room.id).unwrap();
        }

        std::thread::scope(|s| {
            for (_, ids) in &rooms {
                let arena = &arena;
                s.spawn(move || {
                    arena.apply_turn(&ids[0], &[c(1, 1), c(2, 1)]).unwrap();
                    arena.apply_turn(&ids[1], &[c(1, 16), c(2, 16)]).unwrap();
                });
            }
        });

        for (_, ids) in &rooms {
            let state = arena.match_state(&ids[0]).unwrap();
            assert_eq!(state.turn, 3);
            assert_eq!(state.current_actor, ids[0]);
        }
        assert_eq!(arena.matches().active_count(), 4);
    }
}
