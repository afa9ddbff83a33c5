//! Two-player naval battle: board model, targeting AI, turn state machine,
//! and the peer-to-peer and client/server network roles.

mod ai;
mod bitboard;
mod board;
pub mod cli;
mod common;
mod config;
mod game;
mod logging;
mod player;
mod ship;
mod snapshot;

#[cfg(feature = "net")]
pub mod client;
#[cfg(feature = "net")]
pub mod directory;
#[cfg(feature = "net")]
pub mod peer;
#[cfg(feature = "net")]
pub mod protocol;
#[cfg(feature = "net")]
pub mod server;
#[cfg(feature = "net")]
pub mod transport;

pub use ai::*;
pub use bitboard::{BitBoard, BitBoardError, Cells};
pub use board::*;
pub use common::*;
pub use config::*;
pub use game::*;
pub use logging::{init_logging, LOG_ENV};
pub use player::*;
pub use ship::*;
pub use snapshot::*;

#[cfg(feature = "net")]
pub use client::{Client, ClientStatus};
#[cfg(feature = "net")]
pub use peer::{PeerError, PeerSession, Role};
#[cfg(feature = "net")]
pub use protocol::{Action, Frame, PeerMessage, ProtocolError, Side, WireResult};
#[cfg(feature = "net")]
pub use server::{apply_action, ActionError, Server, ShutdownHandle};
#[cfg(feature = "net")]
pub use transport::NetworkError;
