use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::error::MoveRejection;

/// Stone color. Also used as the player role inside a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stone {
    White,
    Black,
}

impl Stone {
    pub fn opponent(self) -> Stone {
        match self {
            Stone::White => Stone::Black,
            Stone::Black => Stone::White,
        }
    }
}

impl fmt::Display for Stone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stone::White => write!(f, "white"),
            Stone::Black => write!(f, "black"),
        }
    }
}

/// A stone placed on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Move {
    pub x: i64,
    pub y: i64,
    pub sequence_number: u64,
    pub color: Stone,
    #[serde(default)]
    pub is_winning_move: bool,
}

/// Unbounded board keyed by coordinate. Keeps the order stones were placed in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Move>", into = "Vec<Move>")]
pub struct Board {
    moves: Vec<Move>,
    index: HashMap<(i64, i64), usize>,
}

impl Board {
    /// Create a new empty board
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a stone at (x, y). Fails if the cell already holds one.
    pub fn place(
        &mut self,
        x: i64,
        y: i64,
        color: Stone,
        sequence_number: u64,
    ) -> Result<Move, MoveRejection> {
        if self.is_occupied(x, y) {
            return Err(MoveRejection::CellOccupied);
        }

        let placed = Move {
            x,
            y,
            sequence_number,
            color,
            is_winning_move: false,
        };
        self.index.insert((x, y), self.moves.len());
        self.moves.push(placed);
        Ok(placed)
    }

    pub fn get(&self, x: i64, y: i64) -> Option<&Move> {
        self.index.get(&(x, y)).map(|&i| &self.moves[i])
    }

    pub fn is_occupied(&self, x: i64, y: i64) -> bool {
        self.index.contains_key(&(x, y))
    }

    /// Color of the stone at (x, y), if any.
    pub fn color_at(&self, x: i64, y: i64) -> Option<Stone> {
        self.get(x, y).map(|m| m.color)
    }

    /// Flag the stone at (x, y) as the one that ended the game.
    pub fn mark_winning(&mut self, x: i64, y: i64) {
        if let Some(&i) = self.index.get(&(x, y)) {
            self.moves[i].is_winning_move = true;
        }
    }

    /// Bounding box `(min_x, min_y, max_x, max_y)` of all stones.
    pub fn extent(&self) -> Option<(i64, i64, i64, i64)> {
        let first = self.moves.first()?;
        let init = (first.x, first.y, first.x, first.y);
        Some(self.moves.iter().fold(init, |(lx, ly, hx, hy), m| {
            (lx.min(m.x), ly.min(m.y), hx.max(m.x), hy.max(m.y))
        }))
    }

    /// Moves in the order they were played.
    pub fn moves(&self) -> &[Move] {
        &self.moves
    }

    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    pub fn winning_moves(&self) -> usize {
        self.moves.iter().filter(|m| m.is_winning_move).count()
    }
}

/// Error for a stored move list that places two stones on one cell.
#[derive(Debug, thiserror::Error)]
#[error("duplicate stone at ({x}, {y})")]
pub struct DuplicateCell {
    pub x: i64,
    pub y: i64,
}

impl TryFrom<Vec<Move>> for Board {
    type Error = DuplicateCell;

    fn try_from(moves: Vec<Move>) -> Result<Self, Self::Error> {
        let mut index = HashMap::with_capacity(moves.len());
        for (i, m) in moves.iter().enumerate() {
            if index.insert((m.x, m.y), i).is_some() {
                return Err(DuplicateCell { x: m.x, y: m.y });
            }
        }
        Ok(Board { moves, index })
    }
}

impl From<Board> for Vec<Move> {
    fn from(board: Board) -> Self {
        board.moves
    }
}
