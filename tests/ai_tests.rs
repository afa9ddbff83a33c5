use broadside::{
    opponent_of, AiOpponent, Board, Difficulty, GameConfig, GameState, Intel, Orientation, ShotOutcome, FLEET,
};

fn board_with_hits(hits: &[(usize, usize)]) -> Board {
    let mut board = Board::new();
    // battleship along row 1, columns 1..=4
    board.place(1, FLEET[1], 1, 1, Orientation::Horizontal).unwrap();
    for &(r, c) in hits {
        board.receive_shot(r, c).unwrap();
    }
    board
}

#[test]
fn easy_never_repeats_a_cell() {
    let mut board = Board::new();
    board.place(0, FLEET[0], 0, 0, Orientation::Horizontal).unwrap();
    let mut ai = AiOpponent::with_seed(Difficulty::Easy, 3);
    for _ in 0..100 {
        let (r, c) = ai.choose_target(&board).expect("cells remain");
        assert!(!board.is_shot(r, c), "re-targeted ({}, {})", r, c);
        board.receive_shot(r, c).unwrap();
    }
    assert_eq!(ai.choose_target(&board), None);
}

#[test]
fn hard_and_expert_extend_along_the_axis() {
    for difficulty in [Difficulty::Hard, Difficulty::Expert] {
        for seed in 0..20 {
            let board = board_with_hits(&[(1, 1), (1, 2)]);
            let mut ai = AiOpponent::with_seed(difficulty, seed);
            let pick = ai.choose_target(&board).unwrap();
            assert!(
                pick == (1, 0) || pick == (1, 3),
                "{:?} seed {} picked {:?}",
                difficulty,
                seed,
                pick
            );
        }
    }
}

#[test]
fn expert_uses_the_open_end_when_one_is_tried() {
    let mut board = board_with_hits(&[(1, 1), (1, 2)]);
    board.receive_shot(1, 0).unwrap();
    let mut ai = AiOpponent::with_seed(Difficulty::Expert, 11);
    assert_eq!(ai.choose_target(&board), Some((1, 3)));
}

#[test]
fn expert_finishes_a_pair_before_bridging_lone_hits() {
    for seed in 0..20 {
        let mut board = Board::new();
        board.place(1, FLEET[1], 1, 1, Orientation::Horizontal).unwrap();
        board.place(0, FLEET[0], 5, 7, Orientation::Vertical).unwrap();
        for (r, c) in [(1, 1), (1, 2), (5, 7), (7, 7)] {
            board.receive_shot(r, c).unwrap();
        }
        let pick = AiOpponent::with_seed(Difficulty::Expert, seed)
            .choose_target(&board)
            .unwrap();
        assert!(pick == (1, 0) || pick == (1, 3), "seed {} picked {:?}", seed, pick);
    }
}

#[test]
fn hard_turns_around_after_overshooting() {
    for seed in 0..10 {
        let mut board = Board::new();
        // battleship on row 4, columns 3..=6
        board.place(1, FLEET[1], 4, 3, Orientation::Horizontal).unwrap();
        board.receive_shot(4, 5).unwrap();
        board.receive_shot(4, 6).unwrap();
        let mut ai = AiOpponent::with_seed(Difficulty::Hard, seed);

        let fire = |board: &mut Board, ai: &mut AiOpponent| {
            let (r, c) = ai.choose_target(board).unwrap();
            (r, c, board.receive_shot(r, c).unwrap())
        };
        assert_eq!(fire(&mut board, &mut ai), (4, 7, ShotOutcome::Miss));
        assert_eq!(fire(&mut board, &mut ai), (4, 4, ShotOutcome::Hit));
        assert_eq!(fire(&mut board, &mut ai), (4, 3, ShotOutcome::Sunk { size: 4 }), "seed {}", seed);
    }
}

#[test]
fn vertical_pair_extends_vertically() {
    let mut board = Board::new();
    board.place(0, FLEET[0], 3, 6, Orientation::Vertical).unwrap();
    board.receive_shot(4, 6).unwrap();
    board.receive_shot(5, 6).unwrap();
    let mut ai = AiOpponent::with_seed(Difficulty::Hard, 5);
    let pick = ai.choose_target(&board).unwrap();
    assert!(pick == (3, 6) || pick == (6, 6), "picked {:?}", pick);
}

#[test]
fn medium_fires_next_to_a_fresh_hit() {
    let board = board_with_hits(&[(1, 2)]);
    let mut ai = AiOpponent::with_seed(Difficulty::Medium, 9);
    let (r, c) = ai.choose_target(&board).unwrap();
    assert_eq!(r.abs_diff(1) + c.abs_diff(2), 1);
}

#[test]
fn intel_tracks_clusters_and_remaining_sizes() {
    let mut board = Board::new();
    board.place(4, FLEET[4], 8, 0, Orientation::Horizontal).unwrap();
    board.place(1, FLEET[1], 1, 1, Orientation::Horizontal).unwrap();
    board.receive_shot(8, 0).unwrap();
    assert_eq!(board.receive_shot(8, 1), Ok(ShotOutcome::Sunk { size: 2 }));
    board.receive_shot(1, 3).unwrap();

    let intel = Intel::gather(&board);
    assert_eq!(intel.remaining(), &[5, 4, 3, 3]);
    assert_eq!(intel.clusters().len(), 1);
    assert_eq!(intel.clusters()[0].cells(), &[(1, 3)]);
    assert!(intel.sunk_halo().contains(7, 2));
}

#[test]
fn every_tier_finishes_a_game_against_itself() {
    for difficulty in [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard, Difficulty::Expert] {
        let config = GameConfig {
            seed: Some(42),
            difficulty,
            ..GameConfig::default()
        };
        let mut game = GameState::new(config);
        let mut engines = [
            AiOpponent::with_seed(difficulty, 1),
            AiOpponent::with_seed(difficulty, 2),
        ];
        for seat in 0..2 {
            game.place_fleet_randomly(seat).unwrap();
            game.player_ready(seat).unwrap();
        }
        let mut turns = 0;
        while !game.is_over() {
            let seat = game.current_turn();
            let (r, c) = engines[seat]
                .choose_target(game.board(opponent_of(seat)))
                .expect("target available while the game runs");
            game.process_shot(seat, r, c).unwrap();
            turns += 1;
            assert!(turns <= 200, "{:?} did not finish", difficulty);
        }
        let winner = game.winner().unwrap();
        assert!(game.board(opponent_of(winner)).all_ships_sunk());
    }
}

#[test]
fn bot_play_reports_through_process_shot() {
    let config = GameConfig {
        seed: Some(5),
        starting_player: Some(1),
        difficulty: Difficulty::Expert,
        ..GameConfig::default()
    };
    let mut game = GameState::versus_ai(config).unwrap();
    game.place_fleet_randomly(0).unwrap();
    game.player_ready(0).unwrap();
    assert_eq!(game.current_turn(), 1);

    let ((r, c), outcome) = game.bot_play().unwrap();
    assert!(game.board(0).is_shot(r, c));
    assert_eq!(game.last_shot().map(|s| s.outcome), Some(outcome));
    assert_eq!(game.current_turn(), 0);
    assert!(game.bot_play().is_err());
}
