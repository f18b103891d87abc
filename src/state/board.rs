//! Board state.
//!
//! A fixed grid of cells addressed by 1-based `(x, y)` coordinates. Each cell
//! records whether it is occupied and by which player.

use serde::{Deserialize, Serialize};

/// Default board width.
pub const BOARD_WIDTH: usize = 16;

/// Default board height.
pub const BOARD_HEIGHT: usize = 16;

/// Number of spawn corners a board offers.
pub const MAX_SPAWNS: usize = 4;

/// Board position, 1-based on both axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coordinate {
    pub x: usize,
    pub y: usize,
}

impl Coordinate {
    pub fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }

    /// Manhattan distance to another coordinate.
    pub fn distance_to(&self, other: &Coordinate) -> usize {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// A single board cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cell {
    pub x: usize,
    pub y: usize,
    occupied: bool,
    owner: Option<String>,
}

impl Cell {
    fn new(x: usize, y: usize) -> Self {
        Self {
            x,
            y,
            occupied: false,
            owner: None,
        }
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.x, self.y)
    }

    pub fn is_occupied(&self) -> bool {
        self.occupied
    }

    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    fn set_owner(&mut self, owner: Option<String>) {
        self.occupied = owner.is_some();
        self.owner = owner;
    }
}

/// Board errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BoardError {
    #[error("Coordinate {coordinate} is outside the {width}x{height} board")]
    OutOfBounds {
        coordinate: Coordinate,
        width: usize,
        height: usize,
    },
}

/// Grid of cells stored row-major.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Board {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
}

impl Board {
    /// Generate an empty board.
    pub fn generate(width: usize, height: usize) -> Self {
        let cells = (1..=height)
            .flat_map(|y| (1..=width).map(move |x| Cell::new(x, y)))
            .collect();
        Self {
            width,
            height,
            cells,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Check if a coordinate lies on the board.
    pub fn contains(&self, at: Coordinate) -> bool {
        (1..=self.width).contains(&at.x) && (1..=self.height).contains(&at.y)
    }

    fn index(&self, at: Coordinate) -> Result<usize, BoardError> {
        if !self.contains(at) {
            return Err(BoardError::OutOfBounds {
                coordinate: at,
                width: self.width,
                height: self.height,
            });
        }
        Ok((at.y - 1) * self.width + (at.x - 1))
    }

    /// Get the cell at a coordinate.
    pub fn cell_at(&self, at: Coordinate) -> Result<&Cell, BoardError> {
        let index = self.index(at)?;
        Ok(&self.cells[index])
    }

    /// Owner of the cell at a coordinate, if any.
    pub fn occupant(&self, at: Coordinate) -> Result<Option<&str>, BoardError> {
        Ok(self.cell_at(at)?.owner())
    }

    /// Set or clear the occupant of one cell. Adjacency is not checked here.
    pub fn set_occupant(
        &mut self,
        at: Coordinate,
        owner: Option<String>,
    ) -> Result<(), BoardError> {
        let index = self.index(at)?;
        self.cells[index].set_owner(owner);
        Ok(())
    }

    /// Clear every cell owned by a player. Returns how many were cleared.
    pub fn clear_owner(&mut self, player_id: &str) -> usize {
        let mut cleared = 0;
        for cell in self.cells.iter_mut().filter(|c| c.owner() == Some(player_id)) {
            cell.set_owner(None);
            cleared += 1;
        }
        cleared
    }

    /// Spawn corners for the first `player_count` players in join order.
    pub fn spawn_positions(&self, player_count: usize) -> Vec<Coordinate> {
        [
            Coordinate::new(1, 1),
            Coordinate::new(1, self.height),
            Coordinate::new(self.width, 1),
            Coordinate::new(self.width, self.height),
        ]
        .into_iter()
        .take(player_count.min(MAX_SPAWNS))
        .collect()
    }

    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.cells.iter()
    }

    pub fn occupied_cells(&self) -> impl Iterator<Item = &Cell> {
        self.cells.iter().filter(|c| c.is_occupied())
    }

    /// Check that every cell's occupied flag agrees with its owner.
    pub fn is_consistent(&self) -> bool {
        self.cells.iter().all(|c| c.occupied == c.owner.is_some())
    }

    /// Flat cell list for clients.
    pub fn to_json(&self) -> serde_json::Value {
        let cells: Vec<serde_json::Value> = self
            .cells
            .iter()
            .map(|c| {
                serde_json::json!({
                    "x": c.x,
                    "y": c.y,
                    "occupied": c.occupied,
                    "player": c.owner
                })
            })
            .collect();
        serde_json::Value::Array(cells)
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::generate(BOARD_WIDTH, BOARD_HEIGHT)
    }
}
