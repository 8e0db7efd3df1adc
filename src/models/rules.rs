use std::fmt::Debug;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::errors::GameError;
use crate::models::board::{Board, CellPosition};
use crate::models::session::Session;

/// Outcome of evaluating a board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Ongoing,
    Won(Session),
    Drawn,
}

pub trait TerminalRule: Debug + Send + Sync {
    fn evaluate(&self, board: &Board) -> Verdict;
}

/// Rule variant as named in the game settings.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleVariant {
    /// Ends in a draw once every cell is occupied.
    #[default]
    FullBoard,
    /// `length` consecutive cells of one owner along a row, column or diagonal win.
    InARow { length: u32 },
}

impl RuleVariant {
    /// Builds the rule for a board of the given size.
    pub fn build(&self, rows: u32, cols: u32) -> Result<Arc<dyn TerminalRule>, GameError> {
        match *self {
            Self::FullBoard => Ok(Arc::new(FullBoard)),
            Self::InARow { length } => {
                if length == 0 || (length > rows && length > cols) {
                    return Err(GameError::Unsupported(format!(
                        "{length} in a row on a {rows}x{cols} board"
                    )));
                }
                Ok(Arc::new(InARow { length }))
            }
        }
    }
}

#[derive(Debug)]
pub struct FullBoard;

impl TerminalRule for FullBoard {
    fn evaluate(&self, board: &Board) -> Verdict {
        if board.is_full() {
            Verdict::Drawn
        } else {
            Verdict::Ongoing
        }
    }
}

#[derive(Debug)]
pub struct InARow {
    length: u32,
}

const DIRECTIONS: [(i64, i64); 4] = [(0, 1), (1, 0), (1, 1), (1, -1)];

impl InARow {
    fn run_from(&self, board: &Board, start: CellPosition, owner: &Session, dir: (i64, i64)) -> bool {
        (1..self.length as i64).all(|step| {
            let row = start.row as i64 + dir.0 * step;
            let col = start.col as i64 + dir.1 * step;
            if row < 0 || col < 0 {
                return false;
            }
            board.owner(CellPosition::new(row as u32, col as u32)) == Some(owner)
        })
    }
}

impl TerminalRule for InARow {
    fn evaluate(&self, board: &Board) -> Verdict {
        for row in 0..board.rows() {
            for col in 0..board.cols() {
                let start = CellPosition::new(row, col);
                let Some(owner) = board.owner(start) else {
                    continue;
                };
                if DIRECTIONS
                    .iter()
                    .any(|&dir| self.run_from(board, start, owner, dir))
                {
                    return Verdict::Won(owner.clone());
                }
            }
        }
        if board.is_full() {
            Verdict::Drawn
        } else {
            Verdict::Ongoing
        }
    }
}
