use core::time::Duration;

use crate::ai::Difficulty;
use crate::game::PlayerId;
use crate::ship::ShipClass;

pub const BOARD_SIZE: usize = 10;
pub const FLEET_SIZE: usize = 5;
pub const FLEET: [ShipClass; FLEET_SIZE] = [
    ShipClass::new("Carrier", 5),
    ShipClass::new("Battleship", 4),
    ShipClass::new("Cruiser", 3),
    ShipClass::new("Submarine", 3),
    ShipClass::new("Destroyer", 2),
];

/// Total number of ship segments in the fleet.
pub const TOTAL_SHIP_CELLS: usize = 5 + 4 + 3 + 3 + 2;

pub const DEFAULT_PEER_PORT: u16 = 5555;
pub const DEFAULT_SERVER_PORT: u16 = 65432;

/// Number of chat lines kept in a game's log.
pub const CHAT_HISTORY: usize = 32;

/// Look up a fleet class by name.
pub fn ship_class(name: &str) -> Option<ShipClass> {
    FLEET.iter().copied().find(|c| c.name() == name)
}

/// Per-game settings. Passed by value into `GameState`; nothing here is global.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameConfig {
    /// Seat that fires first once both fleets are ready. `None` means the
    /// starting seat will be announced later (peer guest).
    pub starting_player: Option<PlayerId>,
    pub difficulty: Difficulty,
    pub seed: Option<u64>,
    /// When set, a player who does not fire within this window gets a forced
    /// random shot.
    pub turn_timeout: Option<Duration>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            starting_player: Some(0),
            difficulty: Difficulty::Medium,
            seed: None,
            turn_timeout: None,
        }
    }
}

/// Socket behaviour shared by the server, client and peer roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetConfig {
    /// Receive poll interval; background tasks check their shutdown flag
    /// at least this often.
    pub recv_timeout: Duration,
    pub connect_attempts: u32,
    /// Fixed delay between connect attempts.
    pub retry_backoff: Duration,
    /// How long the peer host keeps its listening socket open.
    pub accept_timeout: Duration,
    pub max_frame_size: u32,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            recv_timeout: Duration::from_secs(1),
            connect_attempts: 5,
            retry_backoff: Duration::from_secs(2),
            accept_timeout: Duration::from_secs(120),
            max_frame_size: 1_000_000,
        }
    }
}
