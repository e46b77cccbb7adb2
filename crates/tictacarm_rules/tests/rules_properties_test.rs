//! Exhaustive and scenario tests for the rule engine.

use rand::SeedableRng;
use rand::rngs::StdRng;
use tictacarm_rules::{Board, Move, Side, check_draw, check_win, choose_robot_move};

/// Every assignment of 0/1/2 to the nine cells.
fn all_boards() -> impl Iterator<Item = Board> {
    (0..3u32.pow(9)).map(|mut n| {
        let mut codes = [[0u8; 3]; 3];
        for at in Move::ALL {
            codes[at.row()][at.col()] = (n % 3) as u8;
            n /= 3;
        }
        Board::from_codes(codes).expect("codes are always 0-2")
    })
}

fn line_is_uniform(board: &Board, side: Side) -> bool {
    let rows = board.rows();
    let mark = side.mark();
    (0..3).any(|i| rows[i].iter().all(|c| *c == mark))
        || (0..3).any(|j| (0..3).all(|i| rows[i][j] == mark))
        || (0..3).all(|i| rows[i][i] == mark)
        || (0..3).all(|i| rows[i][2 - i] == mark)
}

#[test]
fn test_check_win_matches_line_definition() {
    for board in all_boards() {
        for side in [Side::Player, Side::Robot] {
            assert_eq!(
                check_win(&board, side),
                line_is_uniform(&board, side),
                "board {} side {}",
                board,
                side
            );
        }
    }
}

#[test]
fn test_draw_iff_full() {
    for board in all_boards() {
        let has_empty = !board.empty_cells().is_empty();
        if has_empty {
            assert!(!check_draw(&board), "board {} has an empty cell", board);
        } else if !check_win(&board, Side::Player) && !check_win(&board, Side::Robot) {
            assert!(check_draw(&board), "board {} should be a draw", board);
        }
    }
}

#[test]
fn test_choose_robot_move_is_pure_and_legal() {
    let mut rng = StdRng::seed_from_u64(42);
    for board in all_boards() {
        let before = board;
        let choice = choose_robot_move(&board, &mut rng);
        assert_eq!(board, before, "input board changed");
        match choice {
            Some(at) => assert!(board.is_empty(at), "picked occupied {} on {}", at, board),
            None => assert!(board.is_full(), "no move on non-full board {}", board),
        }
    }
}

#[test]
fn test_scenario_robot_completes_a_diagonal() {
    // Robot = 2, player = 1.
    let board = Board::from_codes([[2, 1, 2], [1, 2, 1], [0, 0, 0]]).unwrap();
    let mut rng = StdRng::seed_from_u64(0);
    let at = choose_robot_move(&board, &mut rng).unwrap();
    assert!(board.empty_cells().contains(&at));
    // (2,0) closes the anti-diagonal and comes first in row-major order.
    assert_eq!(at, Move::at(2, 0));
    let mut after = board;
    after.place(at, Side::Robot).unwrap();
    assert!(check_win(&after, Side::Robot));
}

#[test]
fn test_scenario_robot_blocks_top_row() {
    let board = Board::from_codes([[1, 1, 0], [2, 0, 0], [0, 0, 0]]).unwrap();
    let mut rng = StdRng::seed_from_u64(0);
    assert_eq!(choose_robot_move(&board, &mut rng), Some(Move::at(0, 2)));
}

#[test]
fn test_scenario_own_win_beats_block() {
    // Both sides threaten; taking the win is tier one.
    let board = Board::from_codes([[1, 1, 0], [2, 2, 0], [0, 0, 0]]).unwrap();
    let mut rng = StdRng::seed_from_u64(0);
    assert_eq!(choose_robot_move(&board, &mut rng), Some(Move::at(1, 2)));
}

#[test]
fn test_scenario_robot_wins_main_diagonal() {
    let board = Board::from_codes([[2, 0, 0], [0, 2, 0], [0, 0, 0]]).unwrap();
    let mut rng = StdRng::seed_from_u64(0);
    assert_eq!(choose_robot_move(&board, &mut rng), Some(Move::at(2, 2)));
}

#[test]
fn test_seeded_choice_is_deterministic() {
    let board = Board::from_codes([[0, 0, 0], [0, 1, 0], [0, 0, 0]]).unwrap();
    let first = choose_robot_move(&board, &mut StdRng::seed_from_u64(9));
    let second = choose_robot_move(&board, &mut StdRng::seed_from_u64(9));
    assert_eq!(first, second);
}
