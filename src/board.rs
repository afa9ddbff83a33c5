//! Occupancy grid, registered ships and the shot log of one player's waters.

use rand::Rng;

use crate::common::{PlacementError, ShotError, ShotOutcome};
use crate::config::{BOARD_SIZE, FLEET_SIZE};
use crate::ship::{Orientation, Ship, ShipClass, ShipId, BB};

const PLACEMENT_ATTEMPTS: usize = 200;

/// One entry of the shot log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "net", derive(serde::Serialize, serde::Deserialize))]
pub struct Shot {
    pub row: usize,
    pub col: usize,
    pub hit: bool,
}

/// A sunk ship as seen by the shooter: its size and the cells it covered.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "net", derive(serde::Serialize, serde::Deserialize))]
pub struct SunkShip {
    pub size: usize,
    pub cells: Vec<(usize, usize)>,
}

/// A player's board.
///
/// Either holds real ships (`place`/`receive_shot`) or acts as a shadow of the
/// opponent's board whose ships are unknown (`record_remote`). In both cases
/// the shot log and the revealed sunk ships are the public record the
/// targeting engine reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    grid: [[Option<ShipId>; BOARD_SIZE]; BOARD_SIZE],
    ships: Vec<Ship>,
    shots: Vec<Shot>,
    shot_mask: BB,
    hit_mask: BB,
    sunk: Vec<SunkShip>,
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl Board {
    /// Empty board with no ships and no shots.
    pub fn new() -> Self {
        Board {
            grid: [[None; BOARD_SIZE]; BOARD_SIZE],
            ships: Vec::with_capacity(FLEET_SIZE),
            shots: Vec::new(),
            shot_mask: BB::new(),
            hit_mask: BB::new(),
            sunk: Vec::new(),
        }
    }

    pub fn ships(&self) -> &[Ship] {
        &self.ships
    }

    pub fn ship(&self, id: ShipId) -> Option<&Ship> {
        self.ships.iter().find(|s| s.id() == id)
    }

    /// Ship occupying a cell, if any.
    pub fn cell(&self, row: usize, col: usize) -> Option<ShipId> {
        self.grid.get(row).and_then(|r| r.get(col)).copied().flatten()
    }

    pub fn shots(&self) -> &[Shot] {
        &self.shots
    }

    /// Cells fired upon so far.
    pub fn shot_mask(&self) -> BB {
        self.shot_mask
    }

    /// Cells fired upon that were hits.
    pub fn hit_mask(&self) -> BB {
        self.hit_mask
    }

    pub fn is_shot(&self, row: usize, col: usize) -> bool {
        self.shot_mask.contains(row, col)
    }

    /// Ships revealed as sunk, in the order they went down.
    pub fn sunk_ships(&self) -> &[SunkShip] {
        &self.sunk
    }

    fn occupancy_except(&self, id: ShipId) -> BB {
        let mut mask = BB::new();
        for ship in self.ships.iter().filter(|s| s.id() != id) {
            mask |= ship.mask();
        }
        mask
    }

    fn check(&self, ship: &Ship) -> Result<(), PlacementError> {
        let mask = ship.mask();
        let others = self.occupancy_except(ship.id());
        if !(mask & others).is_empty() {
            return Err(PlacementError::Overlap);
        }
        if !(mask & others.halo()).is_empty() {
            return Err(PlacementError::Adjacent);
        }
        Ok(())
    }

    /// Whether `place` would accept this placement.
    pub fn can_place(
        &self,
        id: ShipId,
        class: ShipClass,
        row: usize,
        col: usize,
        orientation: Orientation,
    ) -> bool {
        Ship::new(id, class, row, col, orientation)
            .and_then(|ship| self.check(&ship))
            .is_ok()
    }

    /// Place (or move) ship `id` with its bow at (`row`, `col`).
    ///
    /// The ship must lie fully on the board and must neither overlap nor touch,
    /// even diagonally, any other ship. A ship already registered under `id` is
    /// lifted off first; on error the board is left exactly as it was.
    pub fn place(
        &mut self,
        id: ShipId,
        class: ShipClass,
        row: usize,
        col: usize,
        orientation: Orientation,
    ) -> Result<(), PlacementError> {
        let ship = Ship::new(id, class, row, col, orientation)?;
        self.check(&ship)?;
        self.remove(id);
        for (r, c) in ship.cells() {
            self.grid[r][c] = Some(id);
        }
        self.ships.push(ship);
        Ok(())
    }

    /// Lift a ship off the board, clearing its cells.
    pub fn remove(&mut self, id: ShipId) -> Option<Ship> {
        let idx = self.ships.iter().position(|s| s.id() == id)?;
        let ship = self.ships.remove(idx);
        for (r, c) in ship.cells() {
            self.grid[r][c] = None;
        }
        Some(ship)
    }

    /// Pick a random legal `(row, col, orientation)` for a ship of `class`.
    pub fn random_placement<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        id: ShipId,
        class: ShipClass,
    ) -> Result<(usize, usize, Orientation), PlacementError> {
        for _ in 0..PLACEMENT_ATTEMPTS {
            let orientation = Orientation::from_horizontal(rng.random());
            let (dr, dc) = orientation.step();
            let max_r = BOARD_SIZE - 1 - dr * (class.size() - 1);
            let max_c = BOARD_SIZE - 1 - dc * (class.size() - 1);
            let r = rng.random_range(0..=max_r);
            let c = rng.random_range(0..=max_c);
            if self.can_place(id, class, r, c, orientation) {
                return Ok((r, c, orientation));
            }
        }
        Err(PlacementError::NoRoom)
    }

    fn check_target(&self, row: usize, col: usize) -> Result<(), ShotError> {
        if row >= BOARD_SIZE || col >= BOARD_SIZE {
            return Err(ShotError::OutOfBounds);
        }
        if self.shot_mask.contains(row, col) {
            return Err(ShotError::AlreadyShot);
        }
        Ok(())
    }

    fn log_shot(&mut self, row: usize, col: usize, hit: bool) {
        self.shots.push(Shot { row, col, hit });
        let _ = self.shot_mask.set(row, col);
        if hit {
            let _ = self.hit_mask.set(row, col);
        }
    }

    /// Resolve a shot against the ships on this board.
    ///
    /// Out-of-bounds and repeated shots are rejected without touching the log.
    pub fn receive_shot(&mut self, row: usize, col: usize) -> Result<ShotOutcome, ShotError> {
        self.check_target(row, col)?;
        let Some(id) = self.grid[row][col] else {
            self.log_shot(row, col, false);
            return Ok(ShotOutcome::Miss);
        };
        self.log_shot(row, col, true);
        let Some(ship) = self.ships.iter_mut().find(|s| s.id() == id) else {
            return Ok(ShotOutcome::Hit);
        };
        ship.register_hit();
        if ship.is_sunk() {
            let size = ship.size();
            let cells = ship.cells().collect();
            self.sunk.push(SunkShip { size, cells });
            Ok(ShotOutcome::Sunk { size })
        } else {
            Ok(ShotOutcome::Hit)
        }
    }

    /// Record the outcome of a shot resolved elsewhere (shadow board).
    ///
    /// A sunk result reveals the orthogonally connected hits around the cell
    /// that are not yet part of a sunk ship. Ships never touch, so that group
    /// is exactly the ship that went down. A sunk size of `0` means the size
    /// was not reported and is taken from the revealed cells.
    pub fn record_remote(
        &mut self,
        row: usize,
        col: usize,
        outcome: ShotOutcome,
    ) -> Result<(), ShotError> {
        self.check_target(row, col)?;
        self.log_shot(row, col, outcome.is_hit());
        if let ShotOutcome::Sunk { size } = outcome {
            let mut claimed = BB::new();
            for s in &self.sunk {
                for &(r, c) in &s.cells {
                    let _ = claimed.set(r, c);
                }
            }
            let cells = connected_hits(self.hit_mask, claimed, (row, col));
            let size = if size == 0 { cells.len() } else { size };
            self.sunk.push(SunkShip { size, cells });
        }
        Ok(())
    }

    /// True when every registered ship has been sunk.
    pub fn all_ships_sunk(&self) -> bool {
        self.ships.iter().all(Ship::is_sunk)
    }

    /// True when a full fleet has been revealed as sunk. Works for shadow
    /// boards too, where the ships themselves are unknown.
    pub fn fleet_destroyed(&self) -> bool {
        self.sunk.len() >= FLEET_SIZE
    }
}

/// Flood fill over `hits` (minus `excluded`) from `start`, orthogonal steps only.
pub(crate) fn connected_hits(hits: BB, excluded: BB, start: (usize, usize)) -> Vec<(usize, usize)> {
    let mut seen = excluded;
    let mut out = Vec::new();
    let mut stack = vec![start];
    while let Some((r, c)) = stack.pop() {
        if !hits.contains(r, c) || seen.contains(r, c) {
            continue;
        }
        let _ = seen.set(r, c);
        out.push((r, c));
        for (nr, nc) in orthogonal_neighbors(r, c) {
            stack.push((nr, nc));
        }
    }
    out.sort_unstable();
    out
}

/// In-bounds orthogonal neighbours of a cell (up, down, left, right).
pub fn orthogonal_neighbors(row: usize, col: usize) -> impl Iterator<Item = (usize, usize)> {
    const DIRS: [(isize, isize); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];
    DIRS.into_iter().filter_map(move |(dr, dc)| offset((row, col), dr, dc))
}

/// Step a cell by `(dr, dc)`, returning `None` off the board.
pub fn offset(cell: (usize, usize), dr: isize, dc: isize) -> Option<(usize, usize)> {
    let r = cell.0 as isize + dr;
    let c = cell.1 as isize + dc;
    if r < 0 || c < 0 || r >= BOARD_SIZE as isize || c >= BOARD_SIZE as isize {
        None
    } else {
        Some((r as usize, c as usize))
    }
}
