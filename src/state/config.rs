//! Engine configuration.

use serde::{Deserialize, Serialize};

use super::board::{BOARD_HEIGHT, BOARD_WIDTH, MAX_SPAWNS};

/// Maximum players per room.
pub const MAX_ROOM_PLAYERS: usize = 4;

/// Minimum players needed to start a match.
pub const MIN_MATCH_PLAYERS: usize = 2;

/// Tunables shared by every room and match the engine creates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub board_width: usize,
    pub board_height: usize,
    pub room_capacity: usize,
    pub min_players: usize,
    /// Require every room member to be ready before a match can start.
    pub require_ready: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            board_width: BOARD_WIDTH,
            board_height: BOARD_HEIGHT,
            room_capacity: MAX_ROOM_PLAYERS,
            min_players: MIN_MATCH_PLAYERS,
            require_ready: false,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON config. Missing fields take defaults.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.board_width < 2 || self.board_height < 2 {
            return Err(ConfigError::BoardTooSmall {
                width: self.board_width,
                height: self.board_height,
            });
        }
        if self.room_capacity > MAX_SPAWNS {
            return Err(ConfigError::CapacityTooLarge(self.room_capacity));
        }
        if self.min_players < MIN_MATCH_PLAYERS || self.min_players > self.room_capacity {
            return Err(ConfigError::InvalidMinPlayers {
                min: self.min_players,
                capacity: self.room_capacity,
            });
        }
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Board {width}x{height} is too small")]
    BoardTooSmall { width: usize, height: usize },
    #[error("Room capacity {0} exceeds the 4 spawn corners")]
    CapacityTooLarge(usize),
    #[error("Minimum players {min} must be at least 2 and at most capacity {capacity}")]
    InvalidMinPlayers { min: usize, capacity: usize },
    #[error("Malformed config: {0}")]
    Parse(#[from] serde_json::Error),
}
