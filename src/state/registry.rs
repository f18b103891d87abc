//! Match registry - tracks all matches and which player is in which.
//!
//! Each match sits behind its own mutex, so turns on one match are serialized
//! while different matches never contend. The index maps are sharded
//! `DashMap`s. An index entry may be held while locking a match, never the
//! other way round.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, info};

use super::board::{Board, Coordinate};
use super::config::EngineConfig;
use super::engine::{Match, MatchError, MatchSnapshot, TurnOutcome};
use super::player::PlayerId;
use super::roster::Room;

/// Shared handle to one match.
#[derive(Debug, Clone)]
pub struct MatchHandle {
    pub id: String,
    inner: Arc<Mutex<Match>>,
}

impl MatchHandle {
    fn new(game: Match) -> Self {
        Self {
            id: game.id.clone(),
            inner: Arc::new(Mutex::new(game)),
        }
    }

    /// Lock the match for the duration of one operation.
    pub fn lock(&self) -> MutexGuard<'_, Match> {
        // Match never panics mid-update; a poisoned lock still holds a
        // consistent state.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_active(&self) -> bool {
        self.lock().status().is_active()
    }

    pub fn snapshot(&self) -> MatchSnapshot {
        self.lock().snapshot()
    }
}

/// A player's entry in the index.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Seat {
    /// Claimed by a match that is still being registered
    Pending(String),
    Taken(String),
}

impl Seat {
    fn match_id(&self) -> &str {
        match self {
            Self::Pending(id) | Self::Taken(id) => id,
        }
    }
}

/// Registry of all tracked matches.
#[derive(Debug, Default)]
pub struct MatchRegistry {
    matches: DashMap<String, MatchHandle>,
    /// Player ID to the match they sit in
    player_index: DashMap<PlayerId, Seat>,
}

impl MatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start and register a match for a room's players.
    ///
    /// Fails with `AlreadyInMatch` if any of them is in another active match
    /// or in one still starting. Seats are claimed in player ID order, so of
    /// two overlapping starts racing each other exactly one wins.
    pub fn start(
        &self,
        match_id: String,
        room: &Room,
        board: Option<Board>,
        config: &EngineConfig,
    ) -> Result<MatchSnapshot, MatchError> {
        let game = Match::start(match_id.clone(), room, board, config)?;
        let mut participants = game.players().to_vec();
        participants.sort();

        let mut claimed = Vec::with_capacity(participants.len());
        for player_id in &participants {
            match self.claim(player_id, &match_id) {
                Ok(previous) => claimed.push((player_id.clone(), previous)),
                Err(err) => {
                    for (player_id, previous) in claimed {
                        self.release(&player_id, &match_id, previous);
                    }
                    debug!(match_id = %match_id, error = %err, "Match start rejected");
                    return Err(err);
                }
            }
        }

        let handle = MatchHandle::new(game);
        let snapshot = handle.snapshot();
        self.matches.insert(match_id.clone(), handle);
        let pending = Seat::Pending(match_id.clone());
        for (player_id, _) in &claimed {
            if let Some(mut seat) = self.player_index.get_mut(player_id) {
                if *seat == pending {
                    *seat = Seat::Taken(match_id.clone());
                }
            }
        }
        info!(
            match_id = %snapshot.match_id,
            room_id = %snapshot.room_id,
            players = snapshot.active_player_count,
            "Match started"
        );
        Ok(snapshot)
    }

    /// Seat a player in a starting match unless they are still in an active
    /// one or another start holds their seat. Returns the entry it replaced.
    fn claim(&self, player_id: &str, match_id: &str) -> Result<Option<Seat>, MatchError> {
        let pending = Seat::Pending(match_id.to_string());
        match self.player_index.entry(player_id.to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(pending);
                Ok(None)
            }
            Entry::Occupied(mut slot) => {
                let free = matches!(slot.get(), Seat::Taken(current) if !self.is_active(current));
                if !free {
                    return Err(MatchError::AlreadyInMatch(player_id.to_string()));
                }
                Ok(Some(slot.insert(pending)))
            }
        }
    }

    /// Undo a claim made for a match that failed to start.
    fn release(&self, player_id: &str, match_id: &str, previous: Option<Seat>) {
        let pending = Seat::Pending(match_id.to_string());
        match previous {
            Some(previous) => {
                if let Some(mut current) = self.player_index.get_mut(player_id) {
                    if *current == pending {
                        *current = previous;
                    }
                }
            }
            None => {
                self.player_index
                    .remove_if(player_id, |_, current| *current == pending);
            }
        }
    }

    pub fn get(&self, match_id: &str) -> Option<MatchHandle> {
        self.matches.get(match_id).map(|m| m.value().clone())
    }

    /// Match a player belongs to, if any. Matches still starting are skipped.
    pub fn find_by_player(&self, player_id: &str) -> Option<MatchHandle> {
        let match_id = match self.player_index.get(player_id)?.value() {
            Seat::Taken(id) => id.clone(),
            Seat::Pending(_) => return None,
        };
        self.get(&match_id)
    }

    /// Whether a match is tracked and still being played.
    pub fn is_active(&self, match_id: &str) -> bool {
        self.get(match_id).is_some_and(|m| m.is_active())
    }

    /// Apply a turn for a player, serialized against the rest of their match.
    pub fn apply_turn(
        &self,
        player_id: &str,
        path: &[Coordinate],
    ) -> Result<TurnOutcome, MatchError> {
        let handle = self
            .find_by_player(player_id)
            .ok_or(MatchError::MatchNotFound)?;

        let outcome = handle.lock().apply_turn(player_id, path);
        if let Err(err) = &outcome {
            debug!(match_id = %handle.id, player_id, error = %err, "Turn rejected");
        }
        let outcome = outcome?;

        if let Some(victim) = &outcome.eliminated {
            self.player_index
                .remove_if(victim.as_str(), |_, seat| seat.match_id() == handle.id);
        }
        Ok(outcome)
    }

    /// Snapshot of the match a player is part of.
    pub fn state(&self, player_id: &str) -> Result<MatchSnapshot, MatchError> {
        self.find_by_player(player_id)
            .map(|m| m.snapshot())
            .ok_or(MatchError::MatchNotFound)
    }

    /// Remove a match and its index entries.
    pub fn remove(&self, match_id: &str) -> Option<MatchHandle> {
        let (_, handle) = self.matches.remove(match_id)?;
        self.player_index.retain(|_, seat| seat.match_id() != match_id);
        Some(handle)
    }

    /// Remove finished matches.
    pub fn cleanup_finished(&self) -> Vec<String> {
        let finished: Vec<String> = self
            .matches
            .iter()
            .map(|m| m.value().clone())
            .filter(|m| !m.is_active())
            .map(|m| m.id)
            .collect();

        for id in &finished {
            self.remove(id);
        }
        if !finished.is_empty() {
            info!(count = finished.len(), "Removed finished matches");
        }

        finished
    }

    pub fn active_count(&self) -> usize {
        self.matches
            .iter()
            .map(|m| m.value().clone())
            .filter(|m| m.is_active())
            .count()
    }

    pub fn count(&self) -> usize {
        self.matches.len()
    }
}
