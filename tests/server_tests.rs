#![cfg(feature = "net")]

use std::net::SocketAddr;
use std::time::Duration;

use broadside::{
    apply_action, Action, ActionError, Client, GameConfig, GameState, GameStateUpdate, NetConfig, Phase,
    PlacementError, Server, ShotError, ShutdownHandle, FLEET,
};
use tokio::task::JoinHandle;

fn net() -> NetConfig {
    NetConfig {
        recv_timeout: Duration::from_millis(20),
        connect_attempts: 1,
        retry_backoff: Duration::from_millis(10),
        ..NetConfig::default()
    }
}

async fn start(config: GameConfig) -> (SocketAddr, ShutdownHandle, JoinHandle<()>) {
    let server = Server::bind("127.0.0.1:0", config, net()).await.unwrap();
    let addr = server.local_addr().unwrap();
    let handle = server.shutdown_handle();
    let task = tokio::spawn(async move {
        server.run().await.unwrap();
    });
    (addr, handle, task)
}

async fn wait_update(client: &Client, what: &str, pred: impl Fn(&GameStateUpdate) -> bool) -> GameStateUpdate {
    for _ in 0..300 {
        if let Some(update) = client.latest() {
            if pred(&update) {
                return update;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {}", what);
}

async fn place_and_ready(client: &mut Client) {
    for id in 0..FLEET.len() {
        client
            .send(Action::PlaceShip {
                ship: id,
                row: id * 2,
                col: 0,
                horizontal: true,
            })
            .await
            .unwrap();
    }
    client.send(Action::PlayerReady).await.unwrap();
}

async fn seated_pair(addr: SocketAddr) -> (Client, Client) {
    let a = Client::connect(addr, net()).await.unwrap();
    wait_update(&a, "seat 0", |u| u.player_id == 0).await;
    let b = Client::connect(addr, net()).await.unwrap();
    wait_update(&b, "seat 1", |u| u.player_id == 1).await;
    (a, b)
}

#[test]
fn actions_map_onto_the_game() {
    let mut game = GameState::new(GameConfig::default());
    assert_eq!(
        apply_action(
            &mut game,
            0,
            Action::PlaceShip {
                ship: 9,
                row: 0,
                col: 0,
                horizontal: true
            }
        ),
        Err(ActionError::Placement(PlacementError::UnknownShip(9)))
    );
    assert_eq!(
        apply_action(&mut game, 0, Action::FireShot { row: 0, col: 0 }),
        Err(ActionError::Shot(ShotError::NotStarted))
    );
    assert_eq!(
        apply_action(&mut game, 1, Action::ChatMessage { text: "   ".into() }),
        Err(ActionError::EmptyChat)
    );
    apply_action(&mut game, 1, Action::ChatMessage { text: " hello ".into() }).unwrap();
    assert_eq!(game.chat()[0].text, "hello");

    apply_action(
        &mut game,
        1,
        Action::PlaceShip {
            ship: 0,
            row: 5,
            col: 5,
            horizontal: false,
        },
    )
    .unwrap();
    let carrier = game.board(1).ship(0).unwrap();
    assert!(carrier.contains(9, 5));
}

#[test]
fn wild_placement_coordinates_are_rejected() {
    let mut game = GameState::new(GameConfig::default());
    for (row, col, horizontal) in [(usize::MAX, 0, false), (0, usize::MAX, true), (usize::MAX, usize::MAX, true)] {
        assert_eq!(
            apply_action(
                &mut game,
                0,
                Action::PlaceShip {
                    ship: 4,
                    row,
                    col,
                    horizontal
                }
            ),
            Err(ActionError::Placement(PlacementError::OutOfBounds))
        );
    }
    assert!(game.board(0).ships().is_empty());
}

#[tokio::test]
async fn two_clients_play_through_the_server() {
    let (addr, shutdown, task) = start(GameConfig::default()).await;
    let (mut a, mut b) = seated_pair(addr).await;
    wait_update(&a, "opponent joined", |u| u.opponent_connected).await;

    place_and_ready(&mut a).await;
    place_and_ready(&mut b).await;
    let view = wait_update(&a, "battle", |u| u.phase == Phase::YourTurn).await;
    assert_eq!(view.own_board.ships.len(), FLEET.len());
    assert!(view.opponent_board.ships.is_empty());

    b.send(Action::FireShot { row: 0, col: 0 }).await.unwrap();
    let view = wait_update(&b, "rejection", |u| u.notice.is_some()).await;
    assert_eq!(view.phase, Phase::OpponentTurn);
    assert!(view.own_board.shots.is_empty());
    assert!(view.notice.unwrap().contains("turn"));

    a.send(Action::FireShot { row: 2, col: 1 }).await.unwrap();
    let view = wait_update(&b, "first shot", |u| u.phase == Phase::YourTurn).await;
    assert_eq!(view.own_board.shots.len(), 1);
    assert!(view.own_board.shots[0].hit);

    b.send(Action::ChatMessage { text: "ouch".into() }).await.unwrap();
    wait_update(&a, "chat", |u| u.chat.iter().any(|l| l.text == "ouch" && l.from == 1)).await;

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(2), task).await.unwrap().unwrap();
}

#[tokio::test]
async fn third_client_is_refused() {
    let (addr, shutdown, task) = start(GameConfig::default()).await;
    let (a, _b) = seated_pair(addr).await;
    let c = Client::connect(addr, net()).await.unwrap();
    for _ in 0..300 {
        if !c.status().connected {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(!c.status().connected);
    assert!(c.latest().is_none());
    assert!(a.status().connected);

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(2), task).await.unwrap().unwrap();
}

#[tokio::test]
async fn disconnect_frees_the_seat_and_resets() {
    let (addr, shutdown, task) = start(GameConfig::default()).await;
    let (mut a, mut b) = seated_pair(addr).await;
    place_and_ready(&mut a).await;
    place_and_ready(&mut b).await;
    wait_update(&a, "battle", |u| u.phase == Phase::YourTurn).await;

    b.shutdown().await;
    let view = wait_update(&a, "reset", |u| !u.opponent_connected).await;
    assert_eq!(view.phase, Phase::Placing);
    assert!(view.own_board.ships.is_empty());
    assert_eq!(view.notice.as_deref(), Some("opponent disconnected, game reset"));

    // the freed seat is handed to the next arrival
    let c = Client::connect(addr, net()).await.unwrap();
    wait_update(&c, "seat 1 again", |u| u.player_id == 1).await;

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(2), task).await.unwrap().unwrap();
}

#[tokio::test]
async fn idle_turn_gets_a_forced_shot() {
    let config = GameConfig {
        turn_timeout: Some(Duration::from_millis(200)),
        ..GameConfig::default()
    };
    let (addr, shutdown, task) = start(config).await;
    let (mut a, mut b) = seated_pair(addr).await;
    place_and_ready(&mut a).await;
    place_and_ready(&mut b).await;

    let view = wait_update(&b, "forced shot", |u| u.phase == Phase::YourTurn).await;
    assert_eq!(view.own_board.shots.len(), 1);
    let view = wait_update(&a, "timeout notice", |u| u.notice.is_some()).await;
    assert!(view.notice.unwrap().contains("timed out"));

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(2), task).await.unwrap().unwrap();
}

#[tokio::test]
async fn chatting_does_not_hold_off_the_turn_clock() {
    let config = GameConfig {
        turn_timeout: Some(Duration::from_millis(300)),
        ..GameConfig::default()
    };
    let (addr, shutdown, task) = start(config).await;
    let (mut a, mut b) = seated_pair(addr).await;
    place_and_ready(&mut a).await;
    place_and_ready(&mut b).await;
    wait_update(&a, "battle", |u| u.phase == Phase::YourTurn).await;

    let mut forced = false;
    for n in 0..60 {
        a.send(Action::ChatMessage { text: format!("stalling {}", n) }).await.unwrap();
        b.send(Action::ChatMessage { text: format!("hurry {}", n) }).await.unwrap();
        tokio::time::sleep(Duration::from_millis(25)).await;
        if b.latest().is_some_and(|u| u.phase == Phase::YourTurn) {
            forced = true;
            break;
        }
    }
    assert!(forced, "idle turn never timed out while chat kept flowing");
    let view = wait_update(&b, "forced shot", |u| u.phase == Phase::YourTurn).await;
    assert_eq!(view.own_board.shots.len(), 1);

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(2), task).await.unwrap().unwrap();
}

#[tokio::test]
async fn malformed_frame_frees_the_seat() {
    use tokio::io::AsyncWriteExt;

    let (addr, shutdown, task) = start(GameConfig::default()).await;
    let a = Client::connect(addr, net()).await.unwrap();
    wait_update(&a, "seat 0", |u| u.player_id == 0).await;
    let mut raw = tokio::net::TcpStream::connect(addr).await.unwrap();
    wait_update(&a, "opponent joined", |u| u.opponent_connected).await;

    raw.write_all(&0u32.to_be_bytes()).await.unwrap();
    let view = wait_update(&a, "opponent dropped", |u| !u.opponent_connected).await;
    assert_eq!(view.notice.as_deref(), Some("opponent disconnected, game reset"));

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(2), task).await.unwrap().unwrap();
}
