#![cfg(feature = "net")]

use std::net::SocketAddr;

use broadside::directory::{
    CreateGameRequest, Directory, DirectoryError, InMemoryDirectory, JoinGameRequest, PlayerRecord,
};

fn addr(port: u16) -> SocketAddr {
    SocketAddr::from(([192, 168, 1, 20], port))
}

#[tokio::test]
async fn players_are_looked_up_by_name() {
    let dir = InMemoryDirectory::new();
    dir.register_player("ishmael", addr(5555));
    assert_eq!(
        dir.lookup_player("ishmael").await.unwrap(),
        PlayerRecord {
            name: "ishmael".into(),
            addr: addr(5555)
        }
    );
    assert_eq!(
        dir.lookup_player("ahab").await,
        Err(DirectoryError::UnknownPlayer("ahab".into()))
    );
}

#[tokio::test]
async fn a_game_code_admits_exactly_one_guest() {
    let dir = InMemoryDirectory::new();
    let created = dir
        .create_game(CreateGameRequest {
            host: "starbuck".into(),
            addr: addr(6000),
        })
        .await
        .unwrap();
    assert_eq!(created.code.len(), 6);
    assert!(created
        .code
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    assert!(!created.code.chars().any(|c| "OI01".contains(c)));

    // the host becomes reachable by name too
    assert_eq!(dir.lookup_player("starbuck").await.unwrap().addr, addr(6000));

    let joined = dir
        .join_game(JoinGameRequest {
            code: format!("  {} ", created.code.to_lowercase()),
            guest: "queequeg".into(),
        })
        .await
        .unwrap();
    assert_eq!(joined.host, "starbuck");
    assert_eq!(joined.addr, addr(6000));

    let again = dir
        .join_game(JoinGameRequest {
            code: created.code.clone(),
            guest: "flask".into(),
        })
        .await;
    assert_eq!(again, Err(DirectoryError::GameFull(created.code)));
}

#[tokio::test]
async fn unknown_codes_are_rejected() {
    let dir = InMemoryDirectory::new();
    let res = dir
        .join_game(JoinGameRequest {
            code: "zzzzzz".into(),
            guest: "pip".into(),
        })
        .await;
    assert_eq!(res, Err(DirectoryError::UnknownGame("ZZZZZZ".into())));
}

#[test]
fn request_bodies_are_plain_json() {
    let req = JoinGameRequest {
        code: "ABC234".into(),
        guest: "pip".into(),
    };
    assert_eq!(
        serde_json::to_string(&req).unwrap(),
        r#"{"code":"ABC234","guest":"pip"}"#
    );
    let rec: PlayerRecord = serde_json::from_str(r#"{"name":"pip","addr":"10.0.0.2:5555"}"#).unwrap();
    assert_eq!(rec.addr, SocketAddr::from(([10, 0, 0, 2], 5555)));
}
