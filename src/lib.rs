//! GridRunner State Library
//!
//! This crate provides room, board and turn state for GridRunner, a
//! turn-based elimination game for 2-4 players on a 16x16 grid.
//!
//! # Overview
//!
//! - **Rooms** - Players gather in a room; the first member is its master.
//!   Join order decides spawn corner and turn order.
//!
//! - **Matches** - Players take turns submitting paths of orthogonal steps.
//!   Stepping onto another player's cell eliminates them and ends the turn.
//!   The last player standing wins.
//!
//! - **Registry** - Matches are looked up by player. Turns on one match are
//!   serialized; different matches run independently.
//!
//! # Design Principles
//!
//! 1. **State machines validate transitions** - Invalid changes are rejected
//!    with typed errors and leave state untouched.
//!
//! 2. **Compute, then commit** - Turns and roster changes are computed on a
//!    copy and stored only when they succeed.
//!
//! 3. **No networking** - This crate is pure state, no HTTP or storage engine.
//!
//! 4. **Serialization-ready** - All types can be converted to JSON for clients.
//!
//! # Example
//!
//! ```rust
//! use gridrunner_state::{Arena, Coordinate, EngineConfig};
//!
//! let arena = Arena::new(EngineConfig::default()).unwrap();
//!
//! let alice = arena.register_player("Alice");
//! let bob = arena.register_player("Bob");
//!
//! let room = arena.create_room(&alice.id).unwrap();
//! arena.join_room(&room.id, &bob.id).unwrap();
//!
//! let snapshot = arena.start_match(&room.id).unwrap();
//! assert_eq!(snapshot.current_actor, alice.id);
//!
//! let outcome = arena
//!     .apply_turn(&alice.id, &[Coordinate::new(1, 1), Coordinate::new(1, 2)])
//!     .unwrap();
//! assert_eq!(outcome.next_actor, bob.id);
//! ```

pub mod state;

// Re-export everything from state module at crate root
pub use state::*;
