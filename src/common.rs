//! Shot results and the errors raised by the board and game model.

use crate::bitboard::BitBoardError;

/// Result of a shot that was accepted by a board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "net", derive(serde::Serialize, serde::Deserialize))]
pub enum ShotOutcome {
    Miss,
    Hit,
    /// The shot completed a ship of the given size.
    Sunk { size: usize },
}

impl ShotOutcome {
    pub fn is_hit(&self) -> bool {
        !matches!(self, ShotOutcome::Miss)
    }
}

/// Why a ship placement was refused. The board is unchanged whenever one of
/// these is returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlacementError {
    #[error("ship placement is out of bounds")]
    OutOfBounds,
    #[error("ship placement overlaps another ship")]
    Overlap,
    #[error("ship placement touches another ship")]
    Adjacent,
    #[error("no ship with id {0} in the fleet")]
    UnknownShip(usize),
    #[error("fleet is locked once the player is ready")]
    FleetFrozen,
    #[error("every ship must be placed before readying up")]
    FleetIncomplete,
    #[error("unable to find room for ship")]
    NoRoom,
}

impl From<BitBoardError> for PlacementError {
    fn from(_: BitBoardError) -> Self {
        PlacementError::OutOfBounds
    }
}

/// Why a shot was refused. Rejected shots never mutate any state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShotError {
    #[error("shot is outside the board")]
    OutOfBounds,
    #[error("cell was already fired upon")]
    AlreadyShot,
    #[error("it is not this player's turn")]
    NotYourTurn,
    #[error("the battle has not started")]
    NotStarted,
    #[error("the game is over")]
    GameOver,
    #[error("this game has no AI seat")]
    NoAiSeat,
    #[error("no untried cell left to target")]
    NoTarget,
    #[error("no shot is awaiting a result")]
    NoPendingShot,
}

impl From<BitBoardError> for ShotError {
    fn from(_: BitBoardError) -> Self {
        ShotError::OutOfBounds
    }
}

/// Lock a mutex, taking the data back from a poisoned lock instead of
/// panicking. Every critical section in the crate leaves the guarded value
/// consistent before it can panic.
pub fn lock<T>(mutex: &std::sync::Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}
