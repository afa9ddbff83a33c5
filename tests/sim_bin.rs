#![cfg(feature = "net")]

use std::process::Command;

fn run_sim(args: &[&str]) -> Vec<serde_json::Value> {
    let output = Command::new(env!("CARGO_BIN_EXE_sim"))
        .args(args)
        .env("BROADSIDE_LOG", "off")
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    String::from_utf8(output.stdout)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

#[test]
fn sim_prints_one_result_per_game() {
    let results = run_sim(&["--first", "hard", "--second", "easy", "--seed", "3", "--games", "2"]);
    assert_eq!(results.len(), 2);
    for (n, result) in results.iter().enumerate() {
        assert_eq!(result["seed"], 3 + n as u64);
        assert_eq!(result["player1"]["difficulty"], "Hard");
        assert_eq!(result["player2"]["difficulty"], "Easy");
        let winner = result["winner"].as_str().unwrap();
        assert!(winner == "player1" || winner == "player2");
        let shots = result[winner]["shots"].as_u64().unwrap();
        assert!((17..=100).contains(&shots));
    }
}

#[test]
fn same_seed_same_game() {
    let a = run_sim(&["--seed", "42"]);
    let b = run_sim(&["--seed", "42"]);
    assert_eq!(a, b);
}
