//! Peer-to-peer games: each side keeps its own authoritative `GameState` and
//! the two exchange [`PeerMessage`]s as JSON lines.
//!
//! The host takes seat 0 and the guest seat 1. The host decides who fires
//! first and announces it with `game_start` once both fleets are ready.
//! Turn ownership moves only when the shooter, having recorded the result of
//! its shot, sends `turn_change`.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use rand::Rng;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::common::{lock, PlacementError, ShotError};
use crate::config::{GameConfig, NetConfig};
use crate::game::{GameState, Phase, PlayerId};
use crate::protocol::{PeerMessage, Side, WireResult};
use crate::ship::{Orientation, ShipId};
use crate::snapshot::GameStateUpdate;
use crate::transport::{advertised_addr, connect_with_retry, json_lines, Inbound, NetworkError, Outbound};

pub const HOST_SEAT: PlayerId = 0;
pub const GUEST_SEAT: PlayerId = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Host,
    Guest,
}

impl Role {
    pub fn seat(self) -> PlayerId {
        match self {
            Role::Host => HOST_SEAT,
            Role::Guest => GUEST_SEAT,
        }
    }

    /// Fresh local game for this side. The host settles the starting seat
    /// up front (coin flip when unset); the guest learns it from `game_start`.
    pub fn new_game<R: Rng + ?Sized>(self, mut config: GameConfig, rng: &mut R) -> GameState {
        config.starting_player = match self {
            Role::Host => Some(config.starting_player.unwrap_or_else(|| rng.random_range(0..2))),
            Role::Guest => None,
        };
        GameState::peer(config, self.seat())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    #[error(transparent)]
    Shot(#[from] ShotError),
    #[error(transparent)]
    Placement(#[from] PlacementError),
    #[error(transparent)]
    Network(#[from] NetworkError),
    #[error("not connected to a peer")]
    NotConnected,
}

/// Seat named by `side` in a message received from the remote peer.
fn seat_from_remote(game: &GameState, side: Side) -> PlayerId {
    match side {
        Side::Player => game.remote(),
        Side::Opponent => game.local(),
    }
}

/// Apply one message from the peer to the local game and return the replies
/// to send back. On `Err` the game is unchanged and nothing should be sent.
pub fn handle_message(game: &mut GameState, role: Role, msg: PeerMessage) -> Result<Vec<PeerMessage>, PeerError> {
    let mut replies = Vec::new();
    match msg {
        PeerMessage::Shot { row, col } => {
            let outcome = game.receive_remote_shot(row, col)?;
            replies.push(PeerMessage::ShotResult {
                result: WireResult::from(outcome),
                row,
                col,
            });
            if game.is_over() {
                replies.push(PeerMessage::GameOver { winner: Side::Opponent });
            }
        }
        PeerMessage::ShotResult { result, row, col } => {
            game.record_shot_result(row, col, result.outcome())?;
            if game.is_over() {
                replies.push(PeerMessage::GameOver { winner: Side::Player });
            } else {
                game.hand_over_turn()?;
                replies.push(PeerMessage::TurnChange {
                    next_player: Side::Opponent,
                });
            }
        }
        PeerMessage::TurnChange { next_player } => {
            let next = seat_from_remote(game, next_player);
            game.accept_turn(next)?;
        }
        PeerMessage::GameStart { host_starts } => {
            if role == Role::Host {
                log::warn!("ignoring game_start sent by the guest");
            } else {
                let first = if host_starts { HOST_SEAT } else { GUEST_SEAT };
                game.set_starting_player(first);
            }
        }
        PeerMessage::GameOver { winner } => {
            let seat = seat_from_remote(game, winner);
            game.declare_winner(seat);
        }
        PeerMessage::Ready => {
            let remote = game.remote();
            if !game.player(remote).is_ready() {
                game.player_ready(remote)?;
            }
            replies.extend(start_if_ready(game, role));
        }
        PeerMessage::Chat { text } => {
            let remote = game.remote();
            game.push_chat(remote, text);
        }
    }
    Ok(replies)
}

/// Lock the local fleet. Returns the messages announcing it.
pub fn local_ready(game: &mut GameState, role: Role) -> Result<Vec<PeerMessage>, PeerError> {
    let local = game.local();
    game.player_ready(local)?;
    let mut out = vec![PeerMessage::Ready];
    out.extend(start_if_ready(game, role));
    Ok(out)
}

fn start_if_ready(game: &GameState, role: Role) -> Option<PeerMessage> {
    let both = game.player(HOST_SEAT).is_ready() && game.player(GUEST_SEAT).is_ready();
    match (role, game.starting_player()) {
        (Role::Host, Some(first)) if both => Some(PeerMessage::GameStart {
            host_starts: first == HOST_SEAT,
        }),
        _ => None,
    }
}

/// Commit to a shot at the opponent. Returns the message to send.
pub fn local_shot(game: &mut GameState, row: usize, col: usize) -> Result<PeerMessage, PeerError> {
    game.begin_local_shot(row, col)?;
    Ok(PeerMessage::Shot { row, col })
}

/// Connection state visible to the front end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkStatus {
    pub connected: bool,
    pub message: String,
}

/// Sending half; `None` once the link has been torn down.
type SharedOutbound = Arc<tokio::sync::Mutex<Option<Box<dyn Outbound<PeerMessage>>>>>;

/// A running peer connection: the local game plus a background receiver.
pub struct PeerSession {
    role: Role,
    game: Arc<Mutex<GameState>>,
    outbound: SharedOutbound,
    link: Arc<Mutex<LinkStatus>>,
    shutdown: Arc<AtomicBool>,
    receiver: Option<JoinHandle<()>>,
}

impl PeerSession {
    /// Listen on all interfaces for a single guest, then stop listening.
    pub async fn host(config: GameConfig, net: NetConfig, port: u16) -> Result<Self, PeerError> {
        let listener = TcpListener::bind(("0.0.0.0", port)).await.map_err(NetworkError::from)?;
        let local = listener.local_addr().map_err(NetworkError::from)?;
        log::info!("hosting on {}, reachable at {}", local, advertised_addr(local.port()));
        Self::accept(listener, config, net).await
    }

    /// Wait up to the accept timeout for one guest on `listener`, which is
    /// closed afterwards.
    pub async fn accept(listener: TcpListener, config: GameConfig, net: NetConfig) -> Result<Self, PeerError> {
        let (stream, peer) = timeout(net.accept_timeout, listener.accept())
            .await
            .map_err(|_| NetworkError::Timeout)?
            .map_err(NetworkError::from)?;
        drop(listener);
        let _ = stream.set_nodelay(true);
        log::info!("guest connected from {}", peer);
        let (reader, writer) = json_lines::split::<PeerMessage, PeerMessage>(stream, &net);
        Ok(Self::from_parts(Role::Host, config, Box::new(reader), Box::new(writer)))
    }

    /// Connect to a host, retrying per `net`.
    pub async fn join(config: GameConfig, net: NetConfig, addr: SocketAddr) -> Result<Self, PeerError> {
        let stream = connect_with_retry(addr, net.connect_attempts, net.retry_backoff).await?;
        let (reader, writer) = json_lines::split::<PeerMessage, PeerMessage>(stream, &net);
        Ok(Self::from_parts(Role::Guest, config, Box::new(reader), Box::new(writer)))
    }

    /// Session over already established halves. Must be called inside a
    /// tokio runtime; the receiver task starts immediately.
    pub fn from_parts(
        role: Role,
        config: GameConfig,
        inbound: Box<dyn Inbound<PeerMessage>>,
        outbound: Box<dyn Outbound<PeerMessage>>,
    ) -> Self {
        let game = Arc::new(Mutex::new(role.new_game(config, &mut rand::rng())));
        let outbound: SharedOutbound = Arc::new(tokio::sync::Mutex::new(Some(outbound)));
        let link = Arc::new(Mutex::new(LinkStatus {
            connected: true,
            message: "connected".to_string(),
        }));
        let shutdown = Arc::new(AtomicBool::new(false));
        let receiver = tokio::spawn(receive_loop(
            role,
            inbound,
            Arc::clone(&game),
            Arc::clone(&outbound),
            Arc::clone(&link),
            Arc::clone(&shutdown),
        ));
        Self {
            role,
            game,
            outbound,
            link,
            shutdown,
            receiver: Some(receiver),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn status(&self) -> LinkStatus {
        lock(&self.link).clone()
    }

    pub fn is_connected(&self) -> bool {
        lock(&self.link).connected
    }

    pub fn phase(&self) -> Phase {
        lock(&self.game).phase()
    }

    /// Copy of the local game.
    pub fn game(&self) -> GameState {
        lock(&self.game).clone()
    }

    /// The local view, as a server client would see it.
    pub fn snapshot(&self) -> GameStateUpdate {
        let link = self.status();
        let game = lock(&self.game);
        let mut view = game.snapshot_for(game.local());
        view.opponent_connected = link.connected;
        if !link.connected {
            view.notice = Some(link.message);
        }
        view
    }

    pub fn place_ship(&self, ship: ShipId, row: usize, col: usize, orientation: Orientation) -> Result<(), PeerError> {
        let mut game = lock(&self.game);
        let local = game.local();
        Ok(game.place_ship(local, ship, row, col, orientation)?)
    }

    pub fn place_fleet_randomly(&self) -> Result<(), PeerError> {
        let mut game = lock(&self.game);
        let local = game.local();
        Ok(game.place_fleet_randomly(local)?)
    }

    pub async fn ready(&self) -> Result<(), PeerError> {
        let msgs = local_ready(&mut lock(&self.game), self.role)?;
        self.send_all(msgs).await
    }

    pub async fn fire(&self, row: usize, col: usize) -> Result<(), PeerError> {
        let msg = local_shot(&mut lock(&self.game), row, col)?;
        self.send_all(vec![msg]).await
    }

    /// Fire at a random untried cell because the local turn timed out.
    pub async fn force_shot(&self) -> Result<(usize, usize), PeerError> {
        let (row, col, msg) = {
            let mut game = lock(&self.game);
            let local = game.local();
            let (row, col) = game.forced_target(local)?;
            log::info!("turn timed out, forcing shot at ({}, {})", row, col);
            (row, col, local_shot(&mut game, row, col)?)
        };
        self.send_all(vec![msg]).await?;
        Ok((row, col))
    }

    pub async fn chat(&self, text: impl Into<String>) -> Result<(), PeerError> {
        let text = text.into();
        {
            let mut game = lock(&self.game);
            let local = game.local();
            game.push_chat(local, text.clone());
        }
        self.send_all(vec![PeerMessage::Chat { text }]).await
    }

    async fn send_all(&self, msgs: Vec<PeerMessage>) -> Result<(), PeerError> {
        if !self.is_connected() {
            return Err(PeerError::NotConnected);
        }
        let mut guard = self.outbound.lock().await;
        let Some(out) = guard.as_mut() else {
            return Err(PeerError::NotConnected);
        };
        for msg in msgs {
            if let Err(e) = out.send(msg).await {
                mark_disconnected(&self.link, &self.game, &e);
                guard.take();
                return Err(e.into());
            }
        }
        Ok(())
    }

    /// Stop the receiver task and wait for it to exit.
    pub async fn shutdown(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.receiver.take() {
            let _ = handle.await;
        }
        self.outbound.lock().await.take();
        let mut link = lock(&self.link);
        if link.connected {
            link.connected = false;
            link.message = "session closed".to_string();
        }
    }
}

impl Drop for PeerSession {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}

fn mark_disconnected(link: &Mutex<LinkStatus>, game: &Mutex<GameState>, err: &NetworkError) {
    {
        let mut link = lock(link);
        if !link.connected {
            return;
        }
        link.connected = false;
        link.message = format!("connection lost: {}", err);
    }
    log::warn!("peer link lost: {}", err);
    let mut game = lock(game);
    if !game.is_over() {
        if let Err(e) = game.reset() {
            log::warn!("could not reset game after disconnect: {}", e);
        }
    }
}

async fn receive_loop(
    role: Role,
    mut inbound: Box<dyn Inbound<PeerMessage>>,
    game: Arc<Mutex<GameState>>,
    outbound: SharedOutbound,
    link: Arc<Mutex<LinkStatus>>,
    shutdown: Arc<AtomicBool>,
) {
    while !shutdown.load(Ordering::SeqCst) {
        let msg = match inbound.recv().await {
            Ok(msg) => msg,
            Err(NetworkError::Timeout) => continue,
            Err(e) if !e.is_fatal() => {
                log::warn!("dropping peer message: {}", e);
                continue;
            }
            Err(e) => {
                mark_disconnected(&link, &game, &e);
                outbound.lock().await.take();
                return;
            }
        };
        log::debug!("peer -> {:?}", msg);
        let replies = handle_message(&mut lock(&game), role, msg);
        match replies {
            Ok(replies) => {
                let mut guard = outbound.lock().await;
                let Some(out) = guard.as_mut() else { return };
                for reply in replies {
                    if let Err(e) = out.send(reply).await {
                        mark_disconnected(&link, &game, &e);
                        guard.take();
                        return;
                    }
                }
            }
            Err(e) => log::warn!("rejected peer message: {}", e),
        }
    }
}
