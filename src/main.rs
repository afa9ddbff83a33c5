use std::io::BufRead;
use std::net::{IpAddr, SocketAddr};
use std::time::Instant;

use anyhow::Context;
use broadside::cli::{self, Command};
use broadside::protocol::Action;
use broadside::{
    init_logging, opponent_of, probability_grid, Client, Difficulty, GameConfig, GameState, GameStateUpdate,
    Intel, NetConfig, PeerSession, Phase, Player, Server, ShipView, DEFAULT_PEER_PORT, DEFAULT_SERVER_PORT,
};
use clap::{Args, Parser, Subcommand};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tokio::time::{sleep, timeout, Duration};

/// How often the network front ends poll shared state and input.
const TICK: Duration = Duration::from_millis(50);

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone, Copy, Debug)]
struct GameOpts {
    #[arg(long, value_enum, default_value_t = Difficulty::Medium)]
    difficulty: Difficulty,
    #[arg(long, help = "Fix RNG seed for reproducible games (e.g., --seed 12345)")]
    seed: Option<u64>,
    #[arg(long, help = "Seconds a player may take before a random shot is fired for them")]
    turn_timeout: Option<u64>,
}

impl GameOpts {
    fn config(self) -> GameConfig {
        GameConfig {
            difficulty: self.difficulty,
            seed: self.seed,
            turn_timeout: self.turn_timeout.map(Duration::from_secs),
            ..GameConfig::default()
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Play against the computer in this terminal.
    Solo {
        #[command(flatten)]
        game: GameOpts,
    },
    /// Run the authoritative two-seat server.
    Serve {
        #[arg(long, default_value = "0.0.0.0")]
        bind: IpAddr,
        #[arg(long, default_value_t = DEFAULT_SERVER_PORT)]
        port: u16,
        #[command(flatten)]
        game: GameOpts,
    },
    /// Take a seat at a running server.
    Connect {
        #[arg(default_value_t = SocketAddr::from(([127, 0, 0, 1], DEFAULT_SERVER_PORT)))]
        addr: SocketAddr,
    },
    /// Host a peer-to-peer game and wait for one guest.
    Host {
        #[arg(long, default_value_t = DEFAULT_PEER_PORT)]
        port: u16,
        #[arg(long, help = "Who fires first: 0 = host, 1 = guest (random if omitted)")]
        first: Option<usize>,
        #[command(flatten)]
        game: GameOpts,
    },
    /// Join a peer-to-peer game.
    Join {
        addr: SocketAddr,
        #[command(flatten)]
        game: GameOpts,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();
    let net = NetConfig::default();

    match cli.command {
        Commands::Solo { game } => run_solo(game.config()).await,
        Commands::Serve { bind, port, game } => {
            let server = Server::bind((bind, port), game.config(), net).await?;
            println!("Server listening on {}", server.local_addr()?);
            println!("Players on other machines connect to {}", server.advertised_addr()?);
            server.run().await?;
            Ok(())
        }
        Commands::Connect { addr } => run_client(addr, net).await,
        Commands::Host { port, first, game } => {
            let config = GameConfig {
                starting_player: first.map(|f| f & 1),
                ..game.config()
            };
            println!("Waiting up to {:?} for a guest on port {}...", net.accept_timeout, port);
            let session = PeerSession::host(config, net, port).await.context("no guest joined")?;
            run_peer(session, config).await
        }
        Commands::Join { addr, game } => {
            println!("Connecting to {}...", addr);
            let session = PeerSession::join(game.config(), net, addr)
                .await
                .with_context(|| format!("could not reach {}", addr))?;
            run_peer(session, game.config()).await
        }
    }
}

/// Lines typed on stdin, read on a dedicated thread so the game loop never
/// blocks on the terminal.
fn spawn_stdin() -> UnboundedReceiver<String> {
    let (tx, rx) = unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

fn prompt(update: &GameStateUpdate, unplaced: impl Iterator<Item = usize>) {
    println!("\n{}", cli::render_update(update));
    if update.phase == Phase::Placing {
        let remaining = cli::fleet_listing(unplaced);
        if !remaining.is_empty() {
            println!("Still to place: {}", remaining);
        }
    }
}

async fn run_solo(config: GameConfig) -> anyhow::Result<()> {
    let mut game = GameState::versus_ai(config)?;
    let me = game.local();
    let mut input = spawn_stdin();
    println!("{}", cli::HELP);
    prompt(&game.snapshot_for(me), game.player(me).unplaced());
    let mut turn_started = Instant::now();

    while !game.is_over() {
        if game.phase() == Phase::OpponentTurn {
            let ((row, col), outcome) = game.bot_play()?;
            println!("Computer fires at {}: {:?}", cli::coord_to_string(row, col), outcome);
            turn_started = Instant::now();
            if !game.is_over() {
                prompt(&game.snapshot_for(me), game.player(me).unplaced());
            }
            continue;
        }

        let limit = config
            .turn_timeout
            .filter(|_| game.phase() == Phase::YourTurn)
            .map(|t| t.saturating_sub(turn_started.elapsed()));
        let line = match limit {
            Some(left) => match timeout(left, input.recv()).await {
                Ok(line) => line,
                Err(_) => {
                    let ((row, col), outcome) = game.force_shot(me)?;
                    println!("Too slow! Fired at {} for you: {:?}", cli::coord_to_string(row, col), outcome);
                    turn_started = Instant::now();
                    continue;
                }
            },
            None => input.recv().await,
        };
        let Some(line) = line else { return Ok(()) };
        if line.trim().is_empty() {
            continue;
        }

        let command = match cli::parse_command(&line) {
            Ok(command) => command,
            Err(e) => {
                println!("{}", e);
                continue;
            }
        };
        let result: anyhow::Result<()> = match command {
            Command::Place {
                ship,
                row,
                col,
                orientation,
            } => game.place_ship(me, ship, row, col, orientation).map_err(Into::into),
            Command::Random => game.place_fleet_randomly(me).map_err(Into::into),
            Command::Ready => game.player_ready(me).map_err(Into::into),
            Command::Fire { row, col } => match game.process_shot(me, row, col) {
                Ok(outcome) => {
                    println!("You fire at {}: {:?}", cli::coord_to_string(row, col), outcome);
                    turn_started = Instant::now();
                    Ok(())
                }
                Err(e) => Err(e.into()),
            },
            Command::Say(text) => {
                game.push_chat(me, text);
                Ok(())
            }
            Command::Hint => {
                let intel = Intel::gather(game.board(opponent_of(me)));
                println!("{}", cli::render_heatmap(&probability_grid(&intel, true)));
                continue;
            }
            Command::Help => {
                println!("{}", cli::HELP);
                continue;
            }
            Command::Quit => return Ok(()),
        };
        if let Err(e) = result {
            println!("Rejected: {}", e);
            continue;
        }
        if game.phase() != Phase::OpponentTurn {
            prompt(&game.snapshot_for(me), game.player(me).unplaced());
        }
    }
    prompt(&game.snapshot_for(me), std::iter::empty());
    Ok(())
}

/// Random positions for the ships the server does not have yet, worked out
/// against a scratch copy of our own board.
fn random_placements(own: &[ShipView]) -> anyhow::Result<Vec<Action>> {
    let mut scratch = Player::new(0);
    for ship in own {
        scratch.place_ship(ship.id, ship.row, ship.col, ship.orientation)?;
    }
    let missing: Vec<usize> = scratch.unplaced().collect();
    scratch.place_fleet_randomly(&mut rand::rng())?;
    let actions = missing
        .into_iter()
        .filter_map(|id| scratch.board().ship(id))
        .map(|ship| Action::PlaceShip {
            ship: ship.id(),
            row: ship.origin().0,
            col: ship.origin().1,
            horizontal: ship.orientation() == broadside::Orientation::Horizontal,
        })
        .collect();
    Ok(actions)
}

fn unplaced_in(update: &GameStateUpdate) -> impl Iterator<Item = usize> + '_ {
    (0..broadside::FLEET_SIZE).filter(move |id| !update.own_board.ships.iter().any(|s| s.id == *id))
}

async fn run_client(addr: SocketAddr, net: NetConfig) -> anyhow::Result<()> {
    let mut client = Client::connect(addr, net).await?;
    let mut input = spawn_stdin();
    println!("{}", cli::HELP);
    let mut shown: Option<GameStateUpdate> = None;

    loop {
        let status = client.status();
        if !status.connected {
            println!("{}", status.message);
            return Ok(());
        }
        if let Some(update) = status.latest.filter(|u| shown.as_ref() != Some(u)) {
            prompt(&update, unplaced_in(&update));
            shown = Some(update);
        }

        let line = match input.try_recv() {
            Ok(line) => line,
            Err(tokio::sync::mpsc::error::TryRecvError::Empty) => {
                sleep(TICK).await;
                continue;
            }
            Err(tokio::sync::mpsc::error::TryRecvError::Disconnected) => break,
        };
        if line.trim().is_empty() {
            continue;
        }
        let actions = match cli::parse_command(&line) {
            Err(e) => {
                println!("{}", e);
                continue;
            }
            Ok(Command::Place {
                ship,
                row,
                col,
                orientation,
            }) => vec![Action::PlaceShip {
                ship,
                row,
                col,
                horizontal: orientation == broadside::Orientation::Horizontal,
            }],
            Ok(Command::Random) => {
                let own = shown.as_ref().map(|u| u.own_board.ships.clone()).unwrap_or_default();
                match random_placements(&own) {
                    Ok(actions) => actions,
                    Err(e) => {
                        println!("Rejected: {}", e);
                        continue;
                    }
                }
            }
            Ok(Command::Ready) => vec![Action::PlayerReady],
            Ok(Command::Fire { row, col }) => vec![Action::FireShot { row, col }],
            Ok(Command::Say(text)) => vec![Action::ChatMessage { text }],
            Ok(Command::Help) | Ok(Command::Hint) => {
                println!("{}", cli::HELP);
                continue;
            }
            Ok(Command::Quit) => break,
        };
        for action in actions {
            client.send(action).await?;
        }
    }
    client.shutdown().await;
    Ok(())
}

async fn run_peer(mut session: PeerSession, config: GameConfig) -> anyhow::Result<()> {
    let mut input = spawn_stdin();
    println!("Connected as {:?}.\n{}", session.role(), cli::HELP);
    let mut shown: Option<GameStateUpdate> = None;
    let mut turn_started: Option<Instant> = None;

    loop {
        let view = session.snapshot();
        if shown.as_ref() != Some(&view) {
            let game = session.game();
            prompt(&view, game.player(game.local()).unplaced());
            shown = Some(view.clone());
        }
        if !view.opponent_connected || view.phase == Phase::GameOver {
            break;
        }

        // Local turn clock: starts when the turn becomes ours.
        match (view.phase, turn_started) {
            (Phase::YourTurn, None) => turn_started = Some(Instant::now()),
            (Phase::YourTurn, Some(_)) => {}
            _ => turn_started = None,
        }
        if let (Some(limit), Some(since)) = (config.turn_timeout, turn_started) {
            let waiting = session.game().pending_shot().is_some();
            if !waiting && since.elapsed() >= limit {
                match session.force_shot().await {
                    Ok((row, col)) => println!("Too slow! Fired at {} for you.", cli::coord_to_string(row, col)),
                    Err(e) => println!("Forced shot failed: {}", e),
                }
                turn_started = None;
                continue;
            }
        }

        let line = match input.try_recv() {
            Ok(line) => line,
            Err(tokio::sync::mpsc::error::TryRecvError::Empty) => {
                sleep(TICK).await;
                continue;
            }
            Err(tokio::sync::mpsc::error::TryRecvError::Disconnected) => break,
        };
        if line.trim().is_empty() {
            continue;
        }
        let result = match cli::parse_command(&line) {
            Err(e) => {
                println!("{}", e);
                continue;
            }
            Ok(Command::Place {
                ship,
                row,
                col,
                orientation,
            }) => session.place_ship(ship, row, col, orientation),
            Ok(Command::Random) => session.place_fleet_randomly(),
            Ok(Command::Ready) => session.ready().await,
            Ok(Command::Fire { row, col }) => session.fire(row, col).await,
            Ok(Command::Say(text)) => session.chat(text).await,
            Ok(Command::Help) | Ok(Command::Hint) => {
                println!("{}", cli::HELP);
                continue;
            }
            Ok(Command::Quit) => break,
        };
        if let Err(e) = result {
            println!("Rejected: {}", e);
        }
    }

    let status = session.status();
    if !status.connected {
        println!("{}", status.message);
    }
    session.shutdown().await;
    Ok(())
}
