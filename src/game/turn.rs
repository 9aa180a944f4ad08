use serde::{Deserialize, Serialize};

use super::board::{Board, Move, Stone};
use super::win::is_winning_move;
use crate::error::MoveRejection;

/// Lifecycle of a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    #[serde(rename = "New")]
    New,
    #[serde(rename = "In progress")]
    InProgress,
    #[serde(rename = "Finished")]
    Finished,
}

/// Board plus whose turn it is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "StoredGameState", into = "StoredGameState")]
pub struct GameState {
    board: Board,
    next_sequence_number: u64,
    next_color: Stone,
}

impl GameState {
    /// Empty board with `first` to move.
    pub fn new(first: Stone) -> Self {
        GameState {
            board: Board::new(),
            next_sequence_number: 1,
            next_color: first,
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn next_sequence_number(&self) -> u64 {
        self.next_sequence_number
    }

    pub fn next_color(&self) -> Stone {
        self.next_color
    }

    /// Color that opened the game.
    pub fn starting_color(&self) -> Stone {
        self.board
            .moves()
            .first()
            .map(|m| m.color)
            .unwrap_or(self.next_color)
    }
}

/// Stored layout of a `GameState`, checked on the way in.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredGameState {
    moves: Board,
    next_sequence_number: u64,
    next_color: Stone,
}

#[derive(Debug, thiserror::Error)]
#[error("next sequence number {next} does not follow {count} moves")]
pub struct SequenceMismatch {
    next: u64,
    count: usize,
}

impl TryFrom<StoredGameState> for GameState {
    type Error = SequenceMismatch;

    fn try_from(stored: StoredGameState) -> Result<Self, Self::Error> {
        let count = stored.moves.len();
        if stored.next_sequence_number != count as u64 + 1 {
            return Err(SequenceMismatch {
                next: stored.next_sequence_number,
                count,
            });
        }
        Ok(GameState {
            board: stored.moves,
            next_sequence_number: stored.next_sequence_number,
            next_color: stored.next_color,
        })
    }
}

impl From<GameState> for StoredGameState {
    fn from(state: GameState) -> Self {
        StoredGameState {
            moves: state.board,
            next_sequence_number: state.next_sequence_number,
            next_color: state.next_color,
        }
    }
}

/// A candidate move as received from a client. Coordinates arrive untrusted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveRequest {
    pub x: f64,
    pub y: f64,
    pub claimed_sequence_number: u64,
    /// Requester's stone, `None` for spectators.
    pub color: Option<Stone>,
}

impl MoveRequest {
    pub fn new(x: f64, y: f64, claimed_sequence_number: u64) -> Self {
        MoveRequest {
            x,
            y,
            claimed_sequence_number,
            color: None,
        }
    }

    /// Attribute the request to a player role.
    pub fn by(self, color: Option<Stone>) -> Self {
        MoveRequest { color, ..self }
    }
}

/// Result of a request that was not rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The game is not accepting moves; nothing changed and nobody is told.
    Ignored,
    Placed(Move),
}

fn to_cell(v: f64) -> Option<i64> {
    // i64::MAX as f64 rounds up to 2^63, so the upper bound is exclusive.
    if v.is_finite() && v.fract() == 0.0 && v >= i64::MIN as f64 && v < i64::MAX as f64 {
        Some(v as i64)
    } else {
        None
    }
}

/// Validate `request` against the game and apply it.
///
/// Checks run in a fixed order and nothing is mutated until all of them pass.
pub fn apply_move(
    status: &mut Status,
    state: &mut GameState,
    request: &MoveRequest,
) -> Result<Outcome, MoveRejection> {
    if *status != Status::InProgress {
        return Ok(Outcome::Ignored);
    }

    let (x, y) = match (to_cell(request.x), to_cell(request.y)) {
        (Some(x), Some(y)) => (x, y),
        _ => return Err(MoveRejection::InvalidCoordinates),
    };

    if request.claimed_sequence_number != state.next_sequence_number {
        return Err(MoveRejection::StaleState);
    }

    if request.color != Some(state.next_color) {
        return Err(MoveRejection::NotYourTurn);
    }

    let color = state.next_color;
    let mut placed = state.board.place(x, y, color, state.next_sequence_number)?;
    state.next_sequence_number += 1;

    if is_winning_move(&state.board, x, y, color) {
        state.board.mark_winning(x, y);
        placed.is_winning_move = true;
        *status = Status::Finished;
    } else {
        state.next_color = color.opponent();
    }

    Ok(Outcome::Placed(placed))
}
