//! Ship classes and placed ships.

use crate::bitboard::BitBoard;
use crate::common::PlacementError;
use crate::config::BOARD_SIZE;

pub type BB = BitBoard<u128, BOARD_SIZE>;

/// Index of a ship within its owner's fleet.
pub type ShipId = usize;

/// Orientation of a ship on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "net", derive(serde::Serialize, serde::Deserialize))]
pub enum Orientation {
    Horizontal,
    Vertical,
}

impl Orientation {
    pub fn from_horizontal(horizontal: bool) -> Self {
        if horizontal {
            Orientation::Horizontal
        } else {
            Orientation::Vertical
        }
    }

    /// Unit step `(d_row, d_col)` along the ship.
    pub fn step(self) -> (usize, usize) {
        match self {
            Orientation::Horizontal => (0, 1),
            Orientation::Vertical => (1, 0),
        }
    }
}

/// Kind of ship: name and size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShipClass {
    name: &'static str,
    size: usize,
}

impl ShipClass {
    pub const fn new(name: &'static str, size: usize) -> Self {
        Self { name, size }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn size(&self) -> usize {
        self.size
    }
}

/// A ship sitting on a board, tracking how many of its cells were hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ship {
    id: ShipId,
    class: ShipClass,
    row: usize,
    col: usize,
    orientation: Orientation,
    hits: usize,
}

impl Ship {
    /// Position a ship with its bow at (`row`, `col`). Fails when any cell
    /// would fall off an `N×N` board.
    pub fn new(
        id: ShipId,
        class: ShipClass,
        row: usize,
        col: usize,
        orientation: Orientation,
    ) -> Result<Self, PlacementError> {
        let (dr, dc) = orientation.step();
        let len = class.size();
        if len == 0 || row >= BOARD_SIZE || col >= BOARD_SIZE {
            return Err(PlacementError::OutOfBounds);
        }
        let stern = (row.checked_add(dr * (len - 1)), col.checked_add(dc * (len - 1)));
        if !matches!(stern, (Some(r), Some(c)) if r < BOARD_SIZE && c < BOARD_SIZE) {
            return Err(PlacementError::OutOfBounds);
        }
        Ok(Ship {
            id,
            class,
            row,
            col,
            orientation,
            hits: 0,
        })
    }

    pub fn id(&self) -> ShipId {
        self.id
    }

    pub fn class(&self) -> ShipClass {
        self.class
    }

    pub fn size(&self) -> usize {
        self.class.size()
    }

    pub fn origin(&self) -> (usize, usize) {
        (self.row, self.col)
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    /// Cells covered by the ship, bow first.
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize)> {
        let (dr, dc) = self.orientation.step();
        let (row, col) = (self.row, self.col);
        (0..self.size()).map(move |i| (row + dr * i, col + dc * i))
    }

    pub fn contains(&self, row: usize, col: usize) -> bool {
        self.cells().any(|cell| cell == (row, col))
    }

    /// Occupancy mask of the ship.
    pub fn mask(&self) -> BB {
        let mut mask = BB::new();
        for (r, c) in self.cells() {
            // cells are in bounds by construction
            let _ = mask.set(r, c);
        }
        mask
    }

    /// Count one more hit. Saturates at the ship size.
    pub fn register_hit(&mut self) {
        if self.hits < self.size() {
            self.hits += 1;
        }
    }

    pub fn is_sunk(&self) -> bool {
        self.hits == self.size()
    }
}
