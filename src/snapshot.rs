//! Per-viewer views of a game, as broadcast by the server after every action.

use crate::board::{Board, Shot, SunkShip};
use crate::game::{ChatLine, LastShot, Phase, PlayerId};
use crate::ship::Orientation;

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "net", derive(serde::Serialize, serde::Deserialize))]
pub struct ShipView {
    pub id: usize,
    pub name: String,
    pub size: usize,
    pub row: usize,
    pub col: usize,
    pub orientation: Orientation,
    pub hits: usize,
}

/// A board as one viewer may see it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "net", derive(serde::Serialize, serde::Deserialize))]
pub struct BoardView {
    /// Empty for the opponent's board.
    pub ships: Vec<ShipView>,
    pub shots: Vec<Shot>,
    pub sunk: Vec<SunkShip>,
}

impl BoardView {
    /// Own board: ships included.
    pub fn revealed(board: &Board) -> Self {
        let ships = board
            .ships()
            .iter()
            .map(|s| ShipView {
                id: s.id(),
                name: s.class().name().to_string(),
                size: s.size(),
                row: s.origin().0,
                col: s.origin().1,
                orientation: s.orientation(),
                hits: s.hits(),
            })
            .collect();
        BoardView {
            ships,
            ..Self::hidden(board)
        }
    }

    /// Opponent board: only the public shot record.
    pub fn hidden(board: &Board) -> Self {
        BoardView {
            ships: Vec::new(),
            shots: board.shots().to_vec(),
            sunk: board.sunk_ships().to_vec(),
        }
    }
}

/// Full game snapshot addressed to one seat.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "net", derive(serde::Serialize, serde::Deserialize))]
pub struct GameStateUpdate {
    pub player_id: PlayerId,
    pub phase: Phase,
    pub current_turn: PlayerId,
    pub winner: Option<PlayerId>,
    pub last_shot: Option<LastShot>,
    pub own_board: BoardView,
    pub opponent_board: BoardView,
    pub ready: [bool; 2],
    pub opponent_connected: bool,
    pub chat: Vec<ChatLine>,
    /// Rejection reason or connection notice for this viewer.
    pub notice: Option<String>,
}
