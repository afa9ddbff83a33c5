//! Authoritative two-seat game server.
//!
//! The server owns the only mutable `GameState`. Clients send [`Action`]s and
//! get a fresh [`GameStateUpdate`] addressed to their seat after every
//! processed action. Seats are handed out first-come (0 then 1); a third
//! connection is refused. When a player drops, their seat is freed and the
//! game is reset; a returning player starts over.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::time::timeout;

use crate::common::{lock, PlacementError, ShotError};
use crate::config::{GameConfig, NetConfig};
use crate::game::{opponent_of, GameState, Phase, PlayerId};
use crate::protocol::{Action, GameStateUpdate};
use crate::ship::Orientation;
use crate::transport::{advertised_addr, tcp, Inbound, NetworkError, Outbound};

/// Why an action was refused. The game is unchanged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionError {
    #[error(transparent)]
    Placement(#[from] PlacementError),
    #[error(transparent)]
    Shot(#[from] ShotError),
    #[error("empty chat message")]
    EmptyChat,
}

/// Apply one client action for `seat`.
pub fn apply_action(game: &mut GameState, seat: PlayerId, action: Action) -> Result<(), ActionError> {
    match action {
        Action::PlaceShip {
            ship,
            row,
            col,
            horizontal,
        } => game.place_ship(seat, ship, row, col, Orientation::from_horizontal(horizontal))?,
        Action::PlayerReady => game.player_ready(seat)?,
        Action::FireShot { row, col } => {
            let outcome = game.process_shot(seat, row, col)?;
            log::info!("seat {} fired at ({}, {}): {:?}", seat, row, col, outcome);
        }
        Action::ChatMessage { text } => {
            let text = text.trim();
            if text.is_empty() {
                return Err(ActionError::EmptyChat);
            }
            game.push_chat(seat, text);
        }
    }
    Ok(())
}

/// Cloneable handle that stops a running server.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandle(Arc<AtomicBool>);

impl ShutdownHandle {
    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Who is to move and in which phase; changes exactly when the turn clock
/// should restart.
fn turn_marker(game: &GameState) -> (PlayerId, Phase) {
    let current = game.current_turn();
    (current, game.phase_for(current))
}

struct Seat {
    conn: u64,
    tx: UnboundedSender<GameStateUpdate>,
}

struct Shared {
    game: Mutex<GameState>,
    seats: Mutex<[Option<Seat>; 2]>,
    turn_started: Mutex<Instant>,
    next_conn: AtomicU64,
    config: GameConfig,
    net: NetConfig,
    shutdown: ShutdownHandle,
}

impl Shared {
    /// Send every connected seat its own view. `notice` goes to one seat only.
    fn broadcast(&self, notice: Option<(PlayerId, String)>) {
        let game = lock(&self.game);
        let seats = lock(&self.seats);
        for (id, seat) in seats.iter().enumerate() {
            let Some(seat) = seat else { continue };
            let mut view = game.snapshot_for(id);
            view.opponent_connected = seats[opponent_of(id)].is_some();
            view.notice = match &notice {
                Some((to, text)) if *to == id => Some(text.clone()),
                _ => None,
            };
            let _ = seat.tx.send(view);
        }
    }

    fn claim_seat(&self, tx: UnboundedSender<GameStateUpdate>) -> Option<(PlayerId, u64)> {
        let mut seats = lock(&self.seats);
        let id = seats.iter().position(Option::is_none)?;
        let conn = self.next_conn.fetch_add(1, Ordering::SeqCst);
        seats[id] = Some(Seat { conn, tx });
        Some((id, conn))
    }

    fn handle(&self, seat: PlayerId, action: Action) {
        log::debug!("seat {} -> {:?}", seat, action);
        let (result, turn_moved) = {
            let mut game = lock(&self.game);
            let before = turn_marker(&game);
            let result = apply_action(&mut game, seat, action);
            (result, turn_marker(&game) != before)
        };
        if turn_moved {
            *lock(&self.turn_started) = Instant::now();
        }
        match result {
            Ok(()) => self.broadcast(None),
            Err(e) => {
                log::debug!("rejected action from seat {}: {}", seat, e);
                self.broadcast(Some((seat, e.to_string())));
            }
        }
    }

    /// Free a seat after its connection ended and start the game over.
    fn release(&self, seat: PlayerId, conn: u64, reason: &NetworkError) {
        {
            let mut game = lock(&self.game);
            let mut seats = lock(&self.seats);
            if seats[seat].as_ref().map(|s| s.conn) != Some(conn) {
                return;
            }
            seats[seat] = None;
            if let Err(e) = game.reset() {
                log::warn!("reset after disconnect failed: {}", e);
                *game = GameState::new(self.config);
            }
        }
        log::info!("seat {} left ({}), game reset", seat, reason);
        self.broadcast(Some((opponent_of(seat), "opponent disconnected, game reset".to_string())));
    }

    /// Fire for the seat whose turn ran past the configured limit.
    fn enforce_turn_timeout(&self) {
        let Some(limit) = self.config.turn_timeout else { return };
        if lock(&self.turn_started).elapsed() < limit {
            return;
        }
        let forced = {
            let mut game = lock(&self.game);
            let current = game.current_turn();
            if game.phase_for(current) != Phase::YourTurn {
                return;
            }
            game.force_shot(current).map(|_| current)
        };
        *lock(&self.turn_started) = Instant::now();
        match forced {
            Ok(seat) => self.broadcast(Some((seat, "turn timed out, a random shot was fired".to_string()))),
            Err(e) => log::warn!("forced shot failed: {}", e),
        }
    }
}

pub struct Server {
    listener: TcpListener,
    shared: Arc<Shared>,
}

impl Server {
    pub async fn bind<A: ToSocketAddrs>(addr: A, config: GameConfig, net: NetConfig) -> Result<Self, NetworkError> {
        let listener = TcpListener::bind(addr).await?;
        let shared = Arc::new(Shared {
            game: Mutex::new(GameState::new(config)),
            seats: Mutex::new([None, None]),
            turn_started: Mutex::new(Instant::now()),
            next_conn: AtomicU64::new(0),
            config,
            net,
            shutdown: ShutdownHandle::default(),
        });
        Ok(Self { listener, shared })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, NetworkError> {
        Ok(self.listener.local_addr()?)
    }

    /// Address to give to players on other machines.
    pub fn advertised_addr(&self) -> Result<SocketAddr, NetworkError> {
        Ok(advertised_addr(self.local_addr()?.port()))
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shared.shutdown.clone()
    }

    /// Accept and serve clients until shut down.
    pub async fn run(self) -> Result<(), NetworkError> {
        let shared = self.shared;
        log::info!("server listening on {}", self.listener.local_addr()?);
        while !shared.shutdown.is_triggered() {
            shared.enforce_turn_timeout();
            let (stream, addr) = match timeout(shared.net.recv_timeout, self.listener.accept()).await {
                Err(_) => continue,
                Ok(Err(e)) => {
                    log::warn!("accept failed: {}", e);
                    continue;
                }
                Ok(Ok(conn)) => conn,
            };
            let (tx, rx) = unbounded_channel();
            let Some((seat, conn)) = shared.claim_seat(tx) else {
                log::warn!("refusing {}: both seats taken", addr);
                drop(stream);
                continue;
            };
            log::info!("{} took seat {}", addr, seat);
            serve_client(Arc::clone(&shared), stream, seat, conn, rx);
            shared.broadcast(None);
        }
        // Dropping the senders ends the writer tasks.
        *lock(&shared.seats) = [None, None];
        log::info!("server stopped");
        Ok(())
    }
}

fn serve_client(
    shared: Arc<Shared>,
    stream: TcpStream,
    seat: PlayerId,
    conn: u64,
    mut rx: UnboundedReceiver<GameStateUpdate>,
) {
    let _ = stream.set_nodelay(true);
    let (mut reader, mut writer) = tcp::split::<Action, GameStateUpdate>(stream, &shared.net);

    tokio::spawn(async move {
        while let Some(update) = rx.recv().await {
            if let Err(e) = writer.send(update).await {
                log::debug!("writer for seat {} stopped: {}", seat, e);
                break;
            }
        }
    });

    tokio::spawn(async move {
        while !shared.shutdown.is_triggered() {
            match reader.recv().await {
                Ok(action) => shared.handle(seat, action),
                Err(NetworkError::Timeout) => continue,
                Err(e) if !e.is_fatal() => log::warn!("dropping message from seat {}: {}", seat, e),
                Err(e) => {
                    shared.release(seat, conn, &e);
                    return;
                }
            }
        }
    });
}
