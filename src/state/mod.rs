//! State management module for GridRunner.
//!
//! - `board` - Fixed grid of cells and spawn corners
//! - `moves` - Step legality
//! - `player` - Player records and presence state machine
//! - `roster` - Room membership, readiness and master role
//! - `engine` - One match: turns, movement, elimination
//! - `registry` - All matches, indexed by ID and by player
//! - `repository` - Player and room storage seams
//! - `arena` - Entry point tying the above together
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                                Arena                                 │
//! │                                                                      │
//! │  ┌──────────────────┐  ┌──────────────────┐  ┌──────────────────┐    │
//! │  │ PlayerRepository │  │  RoomRepository  │  │  MatchRegistry   │    │
//! │  │                  │  │                  │  │                  │    │
//! │  │ player_id →      │  │ room_id →        │  │ match_id →       │    │
//! │  │   Player         │  │   Room (roster,  │  │   Mutex<Match>   │    │
//! │  │                  │  │   board)         │  │                  │    │
//! │  │                  │  │                  │  │ player_id →      │    │
//! │  │                  │  │                  │  │   match_id       │    │
//! │  └──────────────────┘  └──────────────────┘  └──────────────────┘    │
//! │                                                                      │
//! │  ┌──────────────────────────────────────────────────────────────┐    │
//! │  │                  PlayerState (per player)                     │    │
//! │  │                                                               │    │
//! │  │          Idle ──▶ InRoom ──▶ InMatch ──▶ InRoom ──▶ Idle      │    │
//! │  └──────────────────────────────────────────────────────────────┘    │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```

pub mod arena;
pub mod board;
pub mod config;
pub mod engine;
pub mod moves;
pub mod player;
pub mod registry;
pub mod repository;
pub mod roster;

// Re-export commonly used types
pub use arena::{Arena, ArenaError, CleanupResult};
pub use board::{Board, BoardError, Cell, Coordinate, BOARD_HEIGHT, BOARD_WIDTH, MAX_SPAWNS};
pub use config::{ConfigError, EngineConfig, MAX_ROOM_PLAYERS, MIN_MATCH_PLAYERS};
pub use engine::{Match, MatchError, MatchSnapshot, MatchStatus, TurnOutcome};
pub use moves::{first_illegal_step, is_legal_step};
pub use player::{InvalidTransition, Player, PlayerEvent, PlayerId, PlayerLocation, PlayerState};
pub use registry::{MatchHandle, MatchRegistry};
pub use repository::{InMemoryPlayers, InMemoryRooms, PlayerRepository, RoomRepository};
pub use roster::{Room, RosterError};
