//! Player records and presence state machine.
//!
//! Tracks where a player is in the system and validates transitions.
//!
//! # State Diagram
//!
//! ```text
//! ┌──────────────┐   join_room    ┌───────────┐
//! │     Idle     │───────────────▶│  InRoom   │
//! │              │◀───────────────│           │
//! └──────────────┘   leave_room   └─────┬─────┘
//!                                   ▲   │ start_match
//!                       leave_match │   ▼
//!                                 ┌─────────────┐
//!                                 │   InMatch   │
//!                                 └─────────────┘
//! ```
//!
//! A player leaves a match when eliminated or when the match finishes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque player identifier.
pub type PlayerId = String;

/// A registered player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub ready: bool,
}

impl Player {
    pub fn new(id: impl Into<PlayerId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ready: false,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "id": self.id,
            "name": self.name,
            "ready": self.ready
        })
    }
}

/// Player's current location in the system.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PlayerLocation {
    /// Registered, not in any room
    #[default]
    Idle,

    /// In a room lobby
    InRoom { room_id: String },

    /// Playing a match started from their room
    InMatch { room_id: String, match_id: String },
}

impl PlayerLocation {
    pub fn is_in_room(&self) -> bool {
        !matches!(self, Self::Idle)
    }

    pub fn is_in_match(&self) -> bool {
        matches!(self, Self::InMatch { .. })
    }

    /// Room ID, also set while playing.
    pub fn room_id(&self) -> Option<&str> {
        match self {
            Self::InRoom { room_id } | Self::InMatch { room_id, .. } => Some(room_id),
            Self::Idle => None,
        }
    }

    pub fn match_id(&self) -> Option<&str> {
        match self {
            Self::InMatch { match_id, .. } => Some(match_id),
            _ => None,
        }
    }
}

impl fmt::Display for PlayerLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::InRoom { room_id } => write!(f, "InRoom({})", room_id),
            Self::InMatch { room_id, match_id } => {
                write!(f, "InMatch({}, {})", room_id, match_id)
            }
        }
    }
}

/// State transition events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerEvent {
    JoinRoom { room_id: String },
    LeaveRoom,
    StartMatch { match_id: String },
    LeaveMatch,
}

/// Error when a state transition is invalid.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid transition from {from} via {event:?}: {reason}")]
pub struct InvalidTransition {
    pub from: PlayerLocation,
    pub event: PlayerEvent,
    pub reason: &'static str,
}

/// Player presence state machine.
#[derive(Debug, Clone, Default)]
pub struct PlayerState {
    location: PlayerLocation,
}

impl PlayerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn location(&self) -> &PlayerLocation {
        &self.location
    }

    /// Apply an event, returning the new state or an error.
    pub fn apply(&self, event: PlayerEvent) -> Result<Self, InvalidTransition> {
        Ok(Self {
            location: self.transition(&event)?,
        })
    }

    /// Apply an event in place.
    pub fn apply_mut(&mut self, event: PlayerEvent) -> Result<(), InvalidTransition> {
        self.location = self.transition(&event)?;
        Ok(())
    }

    fn transition(&self, event: &PlayerEvent) -> Result<PlayerLocation, InvalidTransition> {
        use PlayerEvent::*;
        use PlayerLocation::*;

        let invalid = |reason: &'static str| InvalidTransition {
            from: self.location.clone(),
            event: event.clone(),
            reason,
        };

        match (&self.location, event) {
            (Idle, JoinRoom { room_id }) => Ok(InRoom {
                room_id: room_id.clone(),
            }),
            (InRoom { .. }, JoinRoom { .. }) => Err(invalid("Already in a room")),
            (InMatch { .. }, JoinRoom { .. }) => Err(invalid("Match in progress")),

            (InRoom { .. }, LeaveRoom) => Ok(Idle),
            (InMatch { .. }, LeaveRoom) => Err(invalid("Match in progress")),
            (Idle, LeaveRoom) => Err(invalid("Not in a room")),

            (InRoom { room_id }, StartMatch { match_id }) => Ok(InMatch {
                room_id: room_id.clone(),
                match_id: match_id.clone(),
            }),
            (InMatch { .. }, StartMatch { .. }) => Err(invalid("Already in a match")),
            (Idle, StartMatch { .. }) => Err(invalid("Must be in a room to start a match")),

            (InMatch { room_id, .. }, LeaveMatch) => Ok(InRoom {
                room_id: room_id.clone(),
            }),
            (_, LeaveMatch) => Err(invalid("Not in a match")),
        }
    }

    pub fn is_in_room(&self) -> bool {
        self.location.is_in_room()
    }

    pub fn is_in_match(&self) -> bool {
        self.location.is_in_match()
    }

    pub fn room_id(&self) -> Option<&str> {
        self.location.room_id()
    }

    pub fn match_id(&self) -> Option<&str> {
        self.location.match_id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_initial_state() {
        let state = PlayerState::new();
        assert!(!state.is_in_room());
        assert_eq!(*state.location(), PlayerLocation::Idle);
    }

    #[test]
    fn test_room_flow() {
        let mut state = PlayerState::new();

        state
            .apply_mut(PlayerEvent::JoinRoom {
                room_id: "room-1".to_string(),
            })
            .unwrap();
        assert!(state.is_in_room());
        assert_eq!(state.room_id(), Some("room-1"));

        state.apply_mut(PlayerEvent::LeaveRoom).unwrap();
        assert!(!state.is_in_room());
    }

    #[test]
    fn test_match_flow() {
        let mut state = PlayerState::new();

        state
            .apply_mut(PlayerEvent::JoinRoom {
                room_id: "room-1".to_string(),
            })
            .unwrap();
        state
            .apply_mut(PlayerEvent::StartMatch {
                match_id: "match-1".to_string(),
            })
            .unwrap();

        assert!(state.is_in_match());
        assert_eq!(state.match_id(), Some("match-1"));
        assert_eq!(state.room_id(), Some("room-1"));

        // Room membership is frozen while playing
        assert!(state.apply(PlayerEvent::LeaveRoom).is_err());

        state.apply_mut(PlayerEvent::LeaveMatch).unwrap();
        assert!(!state.is_in_match());
        assert_eq!(state.room_id(), Some("room-1"));
    }

    #[test]
    fn test_invalid_transitions() {
        let state = PlayerState::new();

        assert!(state.apply(PlayerEvent::LeaveRoom).is_err());
        assert!(state.apply(PlayerEvent::LeaveMatch).is_err());

        let result = state.apply(PlayerEvent::StartMatch {
            match_id: "match-1".to_string(),
        });
        assert!(result.is_err());

        let in_room = state
            .apply(PlayerEvent::JoinRoom {
                room_id: "room-1".to_string(),
            })
            .unwrap();
        let err = in_room
            .apply(PlayerEvent::JoinRoom {
                room_id: "room-2".to_string(),
            })
            .unwrap_err();
        assert_eq!(err.reason, "Already in a room");
    }

    #[test]
    fn test_display() {
        let loc = PlayerLocation::InMatch {
            room_id: "room-1".to_string(),
            match_id: "match-1".to_string(),
        };
        assert_eq!(format!("{}", loc), "InMatch(room-1, match-1)");
    }

    #[test]
    fn test_player_json() {
        let player = Player::new("p1", "Alice");
        assert_eq!(
            player.to_json(),
            serde_json::json!({"id": "p1", "name": "Alice", "ready": false})
        );
    }
}
