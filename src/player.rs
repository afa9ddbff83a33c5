use rand::Rng;

use crate::board::Board;
use crate::common::PlacementError;
use crate::config::FLEET;
use crate::game::PlayerId;
use crate::ship::{Orientation, ShipClass, ShipId};

const FLEET_ATTEMPTS: usize = 20;

/// A seat at the table: a board, the fixed fleet and a readiness flag.
///
/// Ship ids are indices into `FLEET`, handed out when the seat is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    id: PlayerId,
    board: Board,
    ready: bool,
    shadow: bool,
}

impl Player {
    pub fn new(id: PlayerId) -> Self {
        Self {
            id,
            board: Board::new(),
            ready: false,
            shadow: false,
        }
    }

    /// Seat whose ships live on another machine. Its board only records shot
    /// results, and it may ready up without placing anything locally.
    pub fn shadow(id: PlayerId) -> Self {
        Self {
            shadow: true,
            ..Self::new(id)
        }
    }

    pub fn id(&self) -> PlayerId {
        self.id
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub(crate) fn board_mut(&mut self) -> &mut Board {
        &mut self.board
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn is_shadow(&self) -> bool {
        self.shadow
    }

    pub fn fleet(&self) -> &'static [ShipClass] {
        &FLEET
    }

    /// Ids of fleet ships that have no position yet.
    pub fn unplaced(&self) -> impl Iterator<Item = ShipId> + '_ {
        (0..FLEET.len()).filter(|&id| self.board.ship(id).is_none())
    }

    pub fn all_placed(&self) -> bool {
        self.unplaced().next().is_none()
    }

    /// Place or move fleet ship `id`. Refused once the player is ready.
    pub fn place_ship(
        &mut self,
        id: ShipId,
        row: usize,
        col: usize,
        orientation: Orientation,
    ) -> Result<(), PlacementError> {
        if self.ready {
            return Err(PlacementError::FleetFrozen);
        }
        let class = *FLEET.get(id).ok_or(PlacementError::UnknownShip(id))?;
        self.board.place(id, class, row, col, orientation)
    }

    /// Place every ship not placed yet at a random legal spot.
    pub fn place_fleet_randomly<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<(), PlacementError> {
        if self.ready {
            return Err(PlacementError::FleetFrozen);
        }
        let pending: Vec<ShipId> = self.unplaced().collect();
        'attempt: for _ in 0..FLEET_ATTEMPTS {
            for (n, &id) in pending.iter().enumerate() {
                let class = FLEET[id];
                let placed = self
                    .board
                    .random_placement(rng, id, class)
                    .and_then(|(r, c, o)| self.board.place(id, class, r, c, o));
                if placed.is_err() {
                    // boxed in by earlier picks; start this batch over
                    for &undo in &pending[..n] {
                        self.board.remove(undo);
                    }
                    continue 'attempt;
                }
            }
            return Ok(());
        }
        Err(PlacementError::NoRoom)
    }

    /// Lock the fleet. Permanent for the rest of the game.
    pub fn mark_ready(&mut self) -> Result<(), PlacementError> {
        if !self.shadow && !self.all_placed() {
            return Err(PlacementError::FleetIncomplete);
        }
        self.ready = true;
        Ok(())
    }
}
