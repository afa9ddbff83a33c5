//! Matchmaking directory: where peers find each other.
//!
//! The real service lives outside this crate and is reached over HTTP; this
//! module fixes its request and response shapes behind the [`Directory`]
//! trait. [`InMemoryDirectory`] serves the same contract inside one process.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Mutex;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::common::lock;

const CODE_LEN: usize = 6;
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DirectoryError {
    #[error("unknown player `{0}`")]
    UnknownPlayer(String),
    #[error("no open game with code `{0}`")]
    UnknownGame(String),
    #[error("game `{0}` already has two players")]
    GameFull(String),
    #[error("directory unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub name: String,
    pub addr: SocketAddr,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateGameRequest {
    pub host: String,
    /// Where the host is listening for its guest.
    pub addr: SocketAddr,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateGameResponse {
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinGameRequest {
    pub code: String,
    pub guest: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinGameResponse {
    pub host: String,
    pub addr: SocketAddr,
}

#[async_trait::async_trait]
pub trait Directory: Send + Sync {
    /// Address a named player last registered from.
    async fn lookup_player(&self, name: &str) -> Result<PlayerRecord, DirectoryError>;

    /// Publish a hosted game and get the code guests join with.
    async fn create_game(&self, req: CreateGameRequest) -> Result<CreateGameResponse, DirectoryError>;

    /// Claim the guest seat of a published game.
    async fn join_game(&self, req: JoinGameRequest) -> Result<JoinGameResponse, DirectoryError>;
}

#[derive(Debug, Clone)]
struct OpenGame {
    host: String,
    addr: SocketAddr,
    guest: Option<String>,
}

#[derive(Debug, Default)]
struct Tables {
    players: HashMap<String, SocketAddr>,
    games: HashMap<String, OpenGame>,
}

#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    tables: Mutex<Tables>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_player(&self, name: impl Into<String>, addr: SocketAddr) {
        lock(&self.tables).players.insert(name.into(), addr);
    }

    fn fresh_code(games: &HashMap<String, OpenGame>) -> String {
        let mut rng = rand::rng();
        loop {
            let code: String = (0..CODE_LEN)
                .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
                .collect();
            if !games.contains_key(&code) {
                return code;
            }
        }
    }
}

#[async_trait::async_trait]
impl Directory for InMemoryDirectory {
    async fn lookup_player(&self, name: &str) -> Result<PlayerRecord, DirectoryError> {
        let tables = lock(&self.tables);
        let addr = tables
            .players
            .get(name)
            .copied()
            .ok_or_else(|| DirectoryError::UnknownPlayer(name.to_string()))?;
        Ok(PlayerRecord {
            name: name.to_string(),
            addr,
        })
    }

    async fn create_game(&self, req: CreateGameRequest) -> Result<CreateGameResponse, DirectoryError> {
        let mut tables = lock(&self.tables);
        let code = Self::fresh_code(&tables.games);
        tables.players.insert(req.host.clone(), req.addr);
        tables.games.insert(
            code.clone(),
            OpenGame {
                host: req.host,
                addr: req.addr,
                guest: None,
            },
        );
        log::info!("directory: game {} created", code);
        Ok(CreateGameResponse { code })
    }

    async fn join_game(&self, req: JoinGameRequest) -> Result<JoinGameResponse, DirectoryError> {
        let code = req.code.trim().to_ascii_uppercase();
        let mut tables = lock(&self.tables);
        let game = tables
            .games
            .get_mut(&code)
            .ok_or_else(|| DirectoryError::UnknownGame(code.clone()))?;
        if game.guest.is_some() {
            return Err(DirectoryError::GameFull(code));
        }
        game.guest = Some(req.guest);
        Ok(JoinGameResponse {
            host: game.host.clone(),
            addr: game.addr,
        })
    }
}
