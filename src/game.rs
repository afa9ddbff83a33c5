use rand::rngs::SmallRng;
use rand::SeedableRng;

use crate::ai::{random_untried, AiOpponent, Coord};
use crate::board::Board;
use crate::common::{PlacementError, ShotError, ShotOutcome};
use crate::config::{GameConfig, CHAT_HISTORY};
use crate::player::Player;
use crate::ship::{Orientation, ShipId};
use crate::snapshot::{BoardView, GameStateUpdate};

/// Seat index, `0` or `1`.
pub type PlayerId = usize;

/// The other seat.
pub fn opponent_of(id: PlayerId) -> PlayerId {
    1 - (id & 1)
}

/// Game phase as seen from one seat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "net", derive(serde::Serialize, serde::Deserialize))]
pub enum Phase {
    /// This seat is still placing its fleet.
    Placing,
    /// This seat is ready; the battle has not begun.
    Waiting,
    YourTurn,
    OpponentTurn,
    GameOver,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Setup,
    Battle,
    Over,
}

/// Most recent resolved shot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "net", derive(serde::Serialize, serde::Deserialize))]
pub struct LastShot {
    pub by: PlayerId,
    pub row: usize,
    pub col: usize,
    pub outcome: ShotOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "net", derive(serde::Serialize, serde::Deserialize))]
pub struct ChatLine {
    pub from: PlayerId,
    pub text: String,
}

#[derive(Debug, Clone)]
struct AiSeat {
    seat: PlayerId,
    engine: AiOpponent,
}

/// Turn-owning state machine over two seats.
///
/// `process_shot` is the single transition for games where both boards are
/// local (hot seat, vs AI, server). Peer games, where the opponent's ships
/// live elsewhere, split a turn into the `begin_local_shot` /
/// `record_shot_result` / `hand_over_turn` and `receive_remote_shot` /
/// `accept_turn` steps so that turn ownership only moves on an explicit
/// hand-over.
#[derive(Debug, Clone)]
pub struct GameState {
    config: GameConfig,
    players: [Player; 2],
    local: PlayerId,
    current: PlayerId,
    starting: Option<PlayerId>,
    stage: Stage,
    winner: Option<PlayerId>,
    last_shot: Option<LastShot>,
    pending: Option<Coord>,
    chat: Vec<ChatLine>,
    ai: Option<AiSeat>,
    rng: SmallRng,
}

impl GameState {
    /// Two local seats; seat 0 is the local viewer.
    pub fn new(config: GameConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_os_rng(),
        };
        Self {
            config,
            players: [Player::new(0), Player::new(1)],
            local: 0,
            current: config.starting_player.unwrap_or(0),
            starting: config.starting_player,
            stage: Stage::Setup,
            winner: None,
            last_shot: None,
            pending: None,
            chat: Vec::new(),
            ai: None,
            rng,
        }
    }

    /// Local player in seat 0 against the computer in seat 1. The computer's
    /// fleet is placed and readied immediately.
    pub fn versus_ai(config: GameConfig) -> Result<Self, PlacementError> {
        let mut game = Self::new(config);
        let engine = match config.seed {
            Some(seed) => AiOpponent::with_seed(config.difficulty, seed.wrapping_add(1)),
            None => AiOpponent::new(config.difficulty),
        };
        game.ai = Some(AiSeat { seat: 1, engine });
        game.seat_ai()?;
        Ok(game)
    }

    /// Peer game seen from `local`; the other seat is a shadow whose board
    /// only records reported results.
    pub fn peer(config: GameConfig, local: PlayerId) -> Self {
        let mut game = Self::new(config);
        game.local = local;
        game.players[opponent_of(local)] = Player::shadow(opponent_of(local));
        game
    }

    fn seat_ai(&mut self) -> Result<(), PlacementError> {
        if let Some(seat) = self.ai.as_ref().map(|a| a.seat) {
            self.players[seat].place_fleet_randomly(&mut self.rng)?;
            self.player_ready(seat)?;
        }
        Ok(())
    }

    /// Back to an empty setup with the same seats and settings.
    pub fn reset(&mut self) -> Result<(), PlacementError> {
        for seat in 0..2 {
            self.players[seat] = if self.players[seat].is_shadow() {
                Player::shadow(seat)
            } else {
                Player::new(seat)
            };
        }
        self.starting = self.config.starting_player;
        self.current = self.starting.unwrap_or(0);
        self.stage = Stage::Setup;
        self.winner = None;
        self.last_shot = None;
        self.pending = None;
        self.chat.clear();
        if let Some(ai) = self.ai.as_mut() {
            ai.engine.reset();
        }
        self.seat_ai()
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn local(&self) -> PlayerId {
        self.local
    }

    pub fn remote(&self) -> PlayerId {
        opponent_of(self.local)
    }

    pub fn player(&self, id: PlayerId) -> &Player {
        &self.players[id & 1]
    }

    pub fn board(&self, id: PlayerId) -> &Board {
        self.players[id & 1].board()
    }

    pub fn current_turn(&self) -> PlayerId {
        self.current
    }

    pub fn starting_player(&self) -> Option<PlayerId> {
        self.starting
    }

    pub fn winner(&self) -> Option<PlayerId> {
        self.winner
    }

    pub fn last_shot(&self) -> Option<LastShot> {
        self.last_shot
    }

    /// Cell fired at by the local seat that still awaits its result.
    pub fn pending_shot(&self) -> Option<Coord> {
        self.pending
    }

    pub fn chat(&self) -> &[ChatLine] {
        &self.chat
    }

    pub fn ai_seat(&self) -> Option<PlayerId> {
        self.ai.as_ref().map(|a| a.seat)
    }

    pub fn ai(&self) -> Option<&AiOpponent> {
        self.ai.as_ref().map(|a| &a.engine)
    }

    pub fn is_over(&self) -> bool {
        self.stage == Stage::Over
    }

    /// Phase from the local seat's point of view.
    pub fn phase(&self) -> Phase {
        self.phase_for(self.local)
    }

    pub fn phase_for(&self, viewer: PlayerId) -> Phase {
        match self.stage {
            Stage::Over => Phase::GameOver,
            Stage::Battle if self.current == viewer => Phase::YourTurn,
            Stage::Battle => Phase::OpponentTurn,
            Stage::Setup if self.players[viewer & 1].is_ready() => Phase::Waiting,
            Stage::Setup => Phase::Placing,
        }
    }

    pub fn place_ship(
        &mut self,
        id: PlayerId,
        ship: ShipId,
        row: usize,
        col: usize,
        orientation: Orientation,
    ) -> Result<(), PlacementError> {
        if self.stage != Stage::Setup {
            return Err(PlacementError::FleetFrozen);
        }
        self.players[id & 1].place_ship(ship, row, col, orientation)
    }

    pub fn place_fleet_randomly(&mut self, id: PlayerId) -> Result<(), PlacementError> {
        if self.stage != Stage::Setup {
            return Err(PlacementError::FleetFrozen);
        }
        self.players[id & 1].place_fleet_randomly(&mut self.rng)
    }

    /// Lock a seat's fleet; the battle starts once both seats are ready and
    /// the starting seat is known.
    pub fn player_ready(&mut self, id: PlayerId) -> Result<(), PlacementError> {
        if self.stage != Stage::Setup {
            return Err(PlacementError::FleetFrozen);
        }
        self.players[id & 1].mark_ready()?;
        self.try_begin();
        Ok(())
    }

    /// Fix which seat fires first (peer guest learns it from the host).
    pub fn set_starting_player(&mut self, id: PlayerId) {
        if self.stage == Stage::Setup {
            self.starting = Some(id & 1);
            self.try_begin();
        }
    }

    fn try_begin(&mut self) {
        if self.stage != Stage::Setup || !self.players.iter().all(Player::is_ready) {
            return;
        }
        if let Some(first) = self.starting {
            self.stage = Stage::Battle;
            self.current = first;
            log::info!("battle begins, seat {} fires first", first);
        }
    }

    fn check_turn(&self, id: PlayerId) -> Result<(), ShotError> {
        match self.stage {
            Stage::Setup => Err(ShotError::NotStarted),
            Stage::Over => Err(ShotError::GameOver),
            Stage::Battle if self.current != id => Err(ShotError::NotYourTurn),
            Stage::Battle => Ok(()),
        }
    }

    fn conclude(&mut self, winner: PlayerId) {
        self.stage = Stage::Over;
        self.winner = Some(winner);
        self.pending = None;
        log::info!("game over, seat {} wins", winner);
    }

    /// Seat `id` fires at (`row`, `col`) on the opposing board.
    ///
    /// Either the whole transition happens (board updated, win checked, turn
    /// passed) or, on `Err`, nothing changes.
    pub fn process_shot(&mut self, id: PlayerId, row: usize, col: usize) -> Result<ShotOutcome, ShotError> {
        self.check_turn(id)?;
        let target = opponent_of(id);
        let outcome = self.players[target].board_mut().receive_shot(row, col)?;
        self.last_shot = Some(LastShot { by: id, row, col, outcome });
        let defender = self.players[target].board();
        if !defender.ships().is_empty() && defender.all_ships_sunk() {
            self.conclude(id);
        } else {
            self.current = target;
        }
        Ok(outcome)
    }

    /// Let the computer seat take its turn.
    pub fn bot_play(&mut self) -> Result<(Coord, ShotOutcome), ShotError> {
        let seat = self.ai_seat().ok_or(ShotError::NoAiSeat)?;
        self.check_turn(seat)?;
        let target = opponent_of(seat);
        let cell = match self.ai.as_mut() {
            Some(ai) => ai.engine.choose_target(self.players[target].board()),
            None => None,
        };
        let (row, col) = cell.ok_or(ShotError::NoTarget)?;
        let outcome = self.process_shot(seat, row, col)?;
        if let (ShotOutcome::Sunk { size }, Some(ai)) = (outcome, self.ai.as_mut()) {
            ai.engine.note_sunk(size);
        }
        Ok(((row, col), outcome))
    }

    /// Random untried cell for a seat whose turn timed out.
    pub fn forced_target(&mut self, id: PlayerId) -> Result<Coord, ShotError> {
        self.check_turn(id)?;
        let board = self.players[opponent_of(id)].board();
        random_untried(board, &mut self.rng).ok_or(ShotError::NoTarget)
    }

    /// Fire a random untried cell on behalf of a seat whose turn timed out.
    pub fn force_shot(&mut self, id: PlayerId) -> Result<(Coord, ShotOutcome), ShotError> {
        let (row, col) = self.forced_target(id)?;
        log::info!("seat {} timed out, forcing shot at ({}, {})", id, row, col);
        let outcome = self.process_shot(id, row, col)?;
        Ok(((row, col), outcome))
    }

    /// Peer mode: the local seat commits to a shot whose result will arrive
    /// from the opponent.
    pub fn begin_local_shot(&mut self, row: usize, col: usize) -> Result<(), ShotError> {
        self.check_turn(self.local)?;
        if self.pending.is_some() {
            return Err(ShotError::NotYourTurn);
        }
        let board = self.players[self.remote()].board();
        if row >= crate::config::BOARD_SIZE || col >= crate::config::BOARD_SIZE {
            return Err(ShotError::OutOfBounds);
        }
        if board.is_shot(row, col) {
            return Err(ShotError::AlreadyShot);
        }
        self.pending = Some((row, col));
        Ok(())
    }

    /// Peer mode: record the opponent's verdict on our pending shot. The turn
    /// stays ours until `hand_over_turn`.
    pub fn record_shot_result(&mut self, row: usize, col: usize, outcome: ShotOutcome) -> Result<(), ShotError> {
        self.check_turn(self.local)?;
        if self.pending != Some((row, col)) {
            return Err(ShotError::NoPendingShot);
        }
        let remote = self.remote();
        self.players[remote].board_mut().record_remote(row, col, outcome)?;
        self.pending = None;
        self.last_shot = Some(LastShot { by: self.local, row, col, outcome });
        if self.players[remote].board().fleet_destroyed() {
            self.conclude(self.local);
        }
        Ok(())
    }

    /// Peer mode: give the turn to the opponent after our shot resolved.
    pub fn hand_over_turn(&mut self) -> Result<(), ShotError> {
        self.check_turn(self.local)?;
        if self.pending.is_some() {
            return Err(ShotError::NoPendingShot);
        }
        self.current = self.remote();
        Ok(())
    }

    /// Peer mode: resolve the opponent's shot against our board. Turn
    /// ownership does not move here.
    pub fn receive_remote_shot(&mut self, row: usize, col: usize) -> Result<ShotOutcome, ShotError> {
        let remote = self.remote();
        self.check_turn(remote)?;
        let local = self.local;
        let outcome = self.players[local].board_mut().receive_shot(row, col)?;
        self.last_shot = Some(LastShot { by: remote, row, col, outcome });
        let own = self.players[local].board();
        if !own.ships().is_empty() && own.all_ships_sunk() {
            self.conclude(remote);
        }
        Ok(outcome)
    }

    /// Peer mode: apply an explicit turn-change announcement.
    pub fn accept_turn(&mut self, next: PlayerId) -> Result<(), ShotError> {
        match self.stage {
            Stage::Setup => Err(ShotError::NotStarted),
            Stage::Over => Err(ShotError::GameOver),
            Stage::Battle => {
                self.current = next & 1;
                Ok(())
            }
        }
    }

    /// Apply a game-over announcement. Ignored if the game already ended.
    pub fn declare_winner(&mut self, winner: PlayerId) {
        if self.stage != Stage::Over {
            self.conclude(winner & 1);
        }
    }

    pub fn push_chat(&mut self, from: PlayerId, text: impl Into<String>) {
        self.chat.push(ChatLine { from: from & 1, text: text.into() });
        if self.chat.len() > CHAT_HISTORY {
            let excess = self.chat.len() - CHAT_HISTORY;
            self.chat.drain(..excess);
        }
    }

    /// Everything `viewer` is allowed to see, with the opponent's ships hidden.
    pub fn snapshot_for(&self, viewer: PlayerId) -> GameStateUpdate {
        let viewer = viewer & 1;
        let other = opponent_of(viewer);
        GameStateUpdate {
            player_id: viewer,
            phase: self.phase_for(viewer),
            current_turn: self.current,
            winner: self.winner,
            last_shot: self.last_shot,
            own_board: BoardView::revealed(self.board(viewer)),
            opponent_board: BoardView::hidden(self.board(other)),
            ready: [self.players[0].is_ready(), self.players[1].is_ready()],
            opponent_connected: true,
            chat: self.chat.clone(),
            notice: None,
        }
    }
}
