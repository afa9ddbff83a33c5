use broadside::{opponent_of, AiOpponent, Difficulty, GameConfig, GameState, ShotOutcome};
use clap::Parser;
use serde_json::json;

/// Play the computer against itself and print one JSON line per game.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(long, value_enum, default_value_t = Difficulty::Hard)]
    first: Difficulty,
    #[arg(long, value_enum, default_value_t = Difficulty::Medium)]
    second: Difficulty,
    #[arg(long, default_value_t = 1)]
    seed: u64,
    #[arg(long, default_value_t = 1)]
    games: u64,
}

fn play(first: Difficulty, second: Difficulty, seed: u64) -> anyhow::Result<serde_json::Value> {
    let config = GameConfig {
        seed: Some(seed),
        ..GameConfig::default()
    };
    let mut game = GameState::new(config);
    let mut engines = [
        AiOpponent::with_seed(first, seed.wrapping_add(1)),
        AiOpponent::with_seed(second, seed.wrapping_add(2)),
    ];
    for seat in 0..2 {
        game.place_fleet_randomly(seat)?;
        game.player_ready(seat)?;
    }

    let mut shots = [0usize; 2];
    while !game.is_over() {
        let seat = game.current_turn();
        let target = engines[seat]
            .choose_target(game.board(opponent_of(seat)))
            .ok_or_else(|| anyhow::anyhow!("seat {} ran out of targets", seat))?;
        let outcome = game.process_shot(seat, target.0, target.1)?;
        if let ShotOutcome::Sunk { size } = outcome {
            engines[seat].note_sunk(size);
        }
        shots[seat] += 1;
    }

    let winner = match game.winner() {
        Some(0) => Some("player1"),
        Some(_) => Some("player2"),
        None => None,
    };
    Ok(json!({
        "seed": seed,
        "player1": {"difficulty": format!("{:?}", first), "shots": shots[0]},
        "player2": {"difficulty": format!("{:?}", second), "shots": shots[1]},
        "winner": winner,
    }))
}

fn main() -> anyhow::Result<()> {
    broadside::init_logging();
    let args = Args::parse();
    for n in 0..args.games {
        let result = play(args.first, args.second, args.seed.wrapping_add(n))?;
        println!("{}", serde_json::to_string(&result)?);
    }
    Ok(())
}
