pub mod board;
pub mod turn;
pub mod win;

// Re-export important types
pub use board::{Board, Move, Stone};
pub use turn::{apply_move, GameState, MoveRequest, Outcome, Status};
pub use win::is_winning_move;
