#![cfg(feature = "net")]

use std::time::Duration;

use broadside::peer::{handle_message, local_ready, local_shot};
use broadside::transport::in_memory;
use broadside::{
    Frame, GameConfig, GameState, NetConfig, Orientation, PeerError, PeerMessage, PeerSession, Phase, ProtocolError,
    Role, ShotError, Side, WireResult, FLEET,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

fn place_rows(game: &mut GameState) {
    let seat = game.local();
    for id in 0..FLEET.len() {
        game.place_ship(seat, id, id * 2, 0, Orientation::Horizontal).unwrap();
    }
}

fn deliver(game: &mut GameState, role: Role, msgs: Vec<PeerMessage>) -> Vec<PeerMessage> {
    let mut replies = Vec::new();
    for msg in msgs {
        replies.extend(handle_message(game, role, msg).unwrap());
    }
    replies
}

/// Host and guest with fleets on alternate rows, battle started, host to fire.
fn started_pair() -> (GameState, GameState) {
    let config = GameConfig::default();
    let mut host = Role::Host.new_game(config, &mut rand::rng());
    let mut guest = Role::Guest.new_game(config, &mut rand::rng());
    place_rows(&mut host);
    place_rows(&mut guest);
    let to_guest = local_ready(&mut host, Role::Host).unwrap();
    assert!(deliver(&mut guest, Role::Guest, to_guest).is_empty());
    let to_host = local_ready(&mut guest, Role::Guest).unwrap();
    let start = deliver(&mut host, Role::Host, to_host);
    assert!(deliver(&mut guest, Role::Guest, start).is_empty());
    (host, guest)
}

/// One complete shot: fire, result, hand-over.
fn volley(shooter: &mut GameState, shooter_role: Role, target: &mut GameState, target_role: Role, cell: (usize, usize)) {
    let shot = local_shot(shooter, cell.0, cell.1).unwrap();
    let back = deliver(target, target_role, vec![shot]);
    let forth = deliver(shooter, shooter_role, back);
    assert!(deliver(target, target_role, forth).is_empty());
}

#[test]
fn messages_use_the_documented_json_shapes() {
    let shot = PeerMessage::Shot { row: 2, col: 5 }.encode().unwrap();
    assert_eq!(shot, br#"{"type":"shot","row":2,"col":5}"#.to_vec());

    let result = PeerMessage::ShotResult {
        result: WireResult::Hit,
        row: 2,
        col: 5,
    };
    assert_eq!(
        String::from_utf8(result.encode().unwrap()).unwrap(),
        r#"{"type":"shot_result","result":"hit","row":2,"col":5}"#
    );

    let turn = PeerMessage::TurnChange {
        next_player: Side::Opponent,
    };
    assert_eq!(
        String::from_utf8(turn.encode().unwrap()).unwrap(),
        r#"{"type":"turn_change","next_player":"opponent"}"#
    );
    assert_eq!(PeerMessage::Ready.encode().unwrap(), br#"{"type":"ready"}"#.to_vec());
    assert_eq!(
        PeerMessage::decode(br#"{"type":"game_over","winner":"player"}"#).unwrap(),
        PeerMessage::GameOver { winner: Side::Player }
    );
}

#[test]
fn undecodable_messages_are_classified() {
    assert_eq!(
        PeerMessage::decode(br#"{"type":"surrender"}"#),
        Err(ProtocolError::UnknownType("surrender".into()))
    );
    assert!(matches!(
        PeerMessage::decode(br#"{"row":1,"col":2}"#),
        Err(ProtocolError::Malformed(_))
    ));
    assert!(matches!(PeerMessage::decode(b"not json"), Err(ProtocolError::Malformed(_))));
    assert!(matches!(
        PeerMessage::decode(br#"{"type":"shot","row":"two"}"#),
        Err(ProtocolError::Malformed(_))
    ));
}

#[test]
fn host_announces_start_once_both_fleets_are_ready() {
    let config = GameConfig::default();
    let mut host = Role::Host.new_game(config, &mut rand::rng());
    let mut guest = Role::Guest.new_game(config, &mut rand::rng());
    place_rows(&mut host);
    place_rows(&mut guest);

    // guest readies first; its ready alone does not start anything
    let to_host = local_ready(&mut guest, Role::Guest).unwrap();
    assert_eq!(to_host, vec![PeerMessage::Ready]);
    assert_eq!(guest.phase(), Phase::Waiting);
    assert!(deliver(&mut host, Role::Host, to_host).is_empty());

    let to_guest = local_ready(&mut host, Role::Host).unwrap();
    assert_eq!(
        to_guest,
        vec![PeerMessage::Ready, PeerMessage::GameStart { host_starts: true }]
    );
    assert_eq!(host.phase(), Phase::YourTurn);
    assert_eq!(guest.phase(), Phase::Waiting);

    assert!(deliver(&mut guest, Role::Guest, to_guest).is_empty());
    assert_eq!(guest.phase(), Phase::OpponentTurn);
}

#[test]
fn turn_moves_only_on_turn_change() {
    let (mut host, mut guest) = started_pair();

    let shot = local_shot(&mut host, 2, 1).unwrap();
    assert_eq!(shot, PeerMessage::Shot { row: 2, col: 1 });
    // a second shot while the first is unresolved is refused
    assert!(matches!(
        local_shot(&mut host, 2, 2),
        Err(PeerError::Shot(ShotError::NotYourTurn))
    ));

    let reply = deliver(&mut guest, Role::Guest, vec![shot]);
    assert_eq!(
        reply,
        vec![PeerMessage::ShotResult {
            result: WireResult::Hit,
            row: 2,
            col: 1
        }]
    );
    assert_eq!(guest.current_turn(), 0);
    assert!(matches!(
        local_shot(&mut guest, 0, 0),
        Err(PeerError::Shot(ShotError::NotYourTurn))
    ));

    let handover = deliver(&mut host, Role::Host, reply);
    assert_eq!(
        handover,
        vec![PeerMessage::TurnChange {
            next_player: Side::Opponent
        }]
    );
    assert_eq!(host.current_turn(), 1);
    assert!(host.board(1).is_shot(2, 1));

    assert!(deliver(&mut guest, Role::Guest, handover).is_empty());
    assert_eq!(guest.phase(), Phase::YourTurn);
}

#[test]
fn out_of_turn_remote_shot_is_rejected() {
    let (mut host, _guest) = started_pair();
    let err = handle_message(&mut host, Role::Host, PeerMessage::Shot { row: 0, col: 0 });
    assert!(matches!(err, Err(PeerError::Shot(ShotError::NotYourTurn))));
    assert!(host.board(0).shots().is_empty());
}

#[test]
fn game_start_from_guest_is_ignored() {
    let (mut host, _guest) = started_pair();
    let replies = handle_message(&mut host, Role::Host, PeerMessage::GameStart { host_starts: false }).unwrap();
    assert!(replies.is_empty());
    assert_eq!(host.phase(), Phase::YourTurn);
}

#[test]
fn sinking_the_fleet_ends_both_games() {
    let (mut host, mut guest) = started_pair();
    let targets: Vec<(usize, usize)> = guest.board(1).ships().iter().flat_map(|s| s.cells()).collect();
    let mut misses = (1..10).step_by(2).flat_map(|r| (0..10).map(move |c| (r, c)));

    for (i, &cell) in targets.iter().enumerate() {
        volley(&mut host, Role::Host, &mut guest, Role::Guest, cell);
        if i + 1 < targets.len() {
            let miss = misses.next().unwrap();
            volley(&mut guest, Role::Guest, &mut host, Role::Host, miss);
        }
    }

    assert!(host.is_over());
    assert!(guest.is_over());
    assert_eq!(host.winner(), Some(0));
    assert_eq!(guest.winner(), Some(0));
    assert_eq!(host.board(1).sunk_ships().len(), FLEET.len());
    let mut sizes: Vec<usize> = host.board(1).sunk_ships().iter().map(|s| s.size).collect();
    sizes.sort_unstable();
    assert_eq!(sizes, vec![2, 3, 3, 4, 5]);
}

#[test]
fn chat_is_recorded_against_the_sender() {
    let (_host, mut guest) = started_pair();
    deliver(&mut guest, Role::Guest, vec![PeerMessage::Chat { text: "ahoy".into() }]);
    assert_eq!(guest.chat().len(), 1);
    assert_eq!(guest.chat()[0].from, 0);
}

async fn wait_for(what: &str, mut cond: impl FnMut() -> bool) {
    for _ in 0..200 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {}", what);
}

#[tokio::test]
async fn sessions_play_over_an_in_memory_link() {
    let config = GameConfig::default();
    let ((h_tx, h_rx), (g_tx, g_rx)) = in_memory::pair::<PeerMessage, PeerMessage>();
    let poll = Duration::from_millis(10);
    let host = PeerSession::from_parts(Role::Host, config, Box::new(h_rx.with_poll(poll)), Box::new(h_tx));
    let mut guest = PeerSession::from_parts(Role::Guest, config, Box::new(g_rx.with_poll(poll)), Box::new(g_tx));

    host.place_fleet_randomly().unwrap();
    guest.place_fleet_randomly().unwrap();
    host.ready().await.unwrap();
    guest.ready().await.unwrap();
    wait_for("battle start", || {
        host.phase() == Phase::YourTurn && guest.phase() == Phase::OpponentTurn
    })
    .await;

    host.fire(0, 0).await.unwrap();
    wait_for("hand-over to guest", || guest.phase() == Phase::YourTurn).await;
    assert!(host.game().board(1).is_shot(0, 0));
    assert!(guest.game().board(1).is_shot(0, 0));

    let (row, col) = guest.force_shot().await.unwrap();
    wait_for("hand-over to host", || host.phase() == Phase::YourTurn).await;
    assert!(host.game().board(0).is_shot(row, col));

    guest.chat("fair winds").await.unwrap();
    wait_for("chat", || host.game().chat().len() == 1).await;

    guest.shutdown().await;
    drop(guest);
    wait_for("disconnect", || !host.is_connected()).await;
    assert_eq!(host.phase(), Phase::Placing);
    let view = host.snapshot();
    assert!(!view.opponent_connected);
    assert!(view.notice.is_some());
    assert!(matches!(host.chat("anyone?").await, Err(PeerError::NotConnected)));
}

#[tokio::test]
async fn garbage_line_tears_the_link_down() {
    let net = NetConfig {
        recv_timeout: Duration::from_millis(20),
        accept_timeout: Duration::from_secs(2),
        ..NetConfig::default()
    };
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (host, raw) = tokio::join!(
        PeerSession::accept(listener, GameConfig::default(), net),
        TcpStream::connect(addr)
    );
    let host = host.unwrap();
    let mut raw = raw.unwrap();

    host.place_fleet_randomly().unwrap();
    raw.write_all(b"{\"type\":\"ready\"}\n").await.unwrap();
    wait_for("guest ready", || host.game().player(1).is_ready()).await;

    // an unknown type is skipped
    raw.write_all(b"{\"type\":\"emote\",\"face\":\":)\"}\n").await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(host.is_connected());

    raw.write_all(b"this is not json\n").await.unwrap();
    wait_for("teardown", || !host.is_connected()).await;
    assert_eq!(host.phase(), Phase::Placing);
    assert!(!host.game().player(1).is_ready());
    assert!(host.game().board(0).ships().is_empty());

    let mut buf = [0u8; 256];
    let closed = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match raw.read(&mut buf).await {
                Ok(0) | Err(_) => return,
                Ok(_) => continue,
            }
        }
    })
    .await;
    assert!(closed.is_ok(), "host kept the socket open");
}
