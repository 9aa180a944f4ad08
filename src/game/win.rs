//! Five-in-a-row detection around the stone just placed.
//!
//! Only the four lines through the new stone are walked, so the cost is
//! bounded by the run lengths rather than by the size of the board.

use super::board::{Board, Stone};

/// Stones in an unbroken line needed to win.
pub const WIN_LENGTH: usize = 5;

/// Direction vectors for line checking (4 directions)
const DIRECTIONS: [(i64, i64); 4] = [
    (0, 1),  // Vertical
    (1, 0),  // Horizontal
    (1, 1),  // Diagonal up
    (1, -1), // Diagonal down
];

/// Count consecutive `color` stones starting one step from (x, y) along (dx, dy).
fn walk(board: &Board, x: i64, y: i64, dx: i64, dy: i64, color: Stone) -> usize {
    let mut count = 0;
    let (mut cx, mut cy) = (x, y);
    loop {
        match (cx.checked_add(dx), cy.checked_add(dy)) {
            (Some(nx), Some(ny)) if board.color_at(nx, ny) == Some(color) => {
                count += 1;
                cx = nx;
                cy = ny;
            }
            _ => return count,
        }
    }
}

/// Length of the run of `color` through (x, y) along one axis, the stone itself included.
pub fn run_length(board: &Board, x: i64, y: i64, (dx, dy): (i64, i64), color: Stone) -> usize {
    1 + walk(board, x, y, dx, dy, color) + walk(board, x, y, -dx, -dy, color)
}

/// True when the `color` stone at (x, y) completes five or more in a row.
#[inline]
pub fn is_winning_move(board: &Board, x: i64, y: i64, color: Stone) -> bool {
    DIRECTIONS
        .iter()
        .any(|&dir| run_length(board, x, y, dir, color) >= WIN_LENGTH)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board_with(stones: &[(i64, i64, Stone)]) -> Board {
        let mut board = Board::new();
        for (i, &(x, y, color)) in stones.iter().enumerate() {
            board.place(x, y, color, i as u64 + 1).unwrap();
        }
        board
    }

    #[test]
    fn test_vertical_five() {
        let board = board_with(&[
            (0, 0, Stone::Black),
            (0, 1, Stone::Black),
            (0, 2, Stone::Black),
            (0, 3, Stone::Black),
            (0, 4, Stone::Black),
        ]);
        assert!(is_winning_move(&board, 0, 4, Stone::Black));
    }

    #[test]
    fn test_four_never_wins() {
        let board = board_with(&[
            (0, 0, Stone::White),
            (1, 0, Stone::White),
            (2, 0, Stone::White),
            (3, 0, Stone::White),
        ]);
        assert!(!is_winning_move(&board, 3, 0, Stone::White));
        assert_eq!(run_length(&board, 3, 0, (1, 0), Stone::White), 4);
    }

    #[test]
    fn test_five_completed_in_the_middle() {
        // Gap filled at (2, 2): two on each side.
        let board = board_with(&[
            (0, 0, Stone::White),
            (1, 1, Stone::White),
            (3, 3, Stone::White),
            (4, 4, Stone::White),
            (2, 2, Stone::White),
        ]);
        assert!(is_winning_move(&board, 2, 2, Stone::White));
    }

    #[test]
    fn test_anti_diagonal_five() {
        let board = board_with(&[
            (-2, 2, Stone::Black),
            (-1, 1, Stone::Black),
            (0, 0, Stone::Black),
            (1, -1, Stone::Black),
            (2, -2, Stone::Black),
        ]);
        assert!(is_winning_move(&board, 0, 0, Stone::Black));
    }

    #[test]
    fn test_opponent_stone_breaks_the_run() {
        let board = board_with(&[
            (0, 0, Stone::Black),
            (1, 0, Stone::Black),
            (2, 0, Stone::White),
            (3, 0, Stone::Black),
            (4, 0, Stone::Black),
            (5, 0, Stone::Black),
        ]);
        assert!(!is_winning_move(&board, 3, 0, Stone::Black));
    }

    #[test]
    fn test_overline_counts_as_win() {
        let board = board_with(&[
            (0, 0, Stone::White),
            (0, 1, Stone::White),
            (0, 2, Stone::White),
            (0, 4, Stone::White),
            (0, 5, Stone::White),
            (0, 3, Stone::White),
        ]);
        assert!(is_winning_move(&board, 0, 3, Stone::White));
        assert_eq!(run_length(&board, 0, 3, (0, 1), Stone::White), 6);
    }

    #[test]
    fn test_walk_stops_at_coordinate_edge() {
        let board = board_with(&[(i64::MAX, 0, Stone::Black)]);
        assert!(!is_winning_move(&board, i64::MAX, 0, Stone::Black));
    }
}
