use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::session::Session;

// A (row, column) coordinate on the board
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellPosition {
    pub row: u32,
    pub col: u32,
}

impl CellPosition {
    pub fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }
}

impl fmt::Display for CellPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// Row-major grid of cells. A cell is either empty or owned by the participant who
/// moved there; cells are only ever filled, never cleared.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Board {
    rows: u32,
    cols: u32,
    cells: Vec<Option<Session>>,
}

impl Board {
    pub fn new(rows: u32, cols: u32) -> Self {
        Self {
            rows,
            cols,
            cells: vec![None; (rows as usize) * (cols as usize)],
        }
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn cols(&self) -> u32 {
        self.cols
    }

    pub fn contains(&self, pos: CellPosition) -> bool {
        pos.row < self.rows && pos.col < self.cols
    }

    fn index(&self, pos: CellPosition) -> Option<usize> {
        self.contains(pos)
            .then(|| pos.row as usize * self.cols as usize + pos.col as usize)
    }

    /// Owner of the cell, `None` when empty or out of bounds.
    pub fn owner(&self, pos: CellPosition) -> Option<&Session> {
        self.index(pos).and_then(|i| self.cells[i].as_ref())
    }

    pub fn is_occupied(&self, pos: CellPosition) -> bool {
        self.owner(pos).is_some()
    }

    /// Marks an empty, in-bounds cell as owned. Returns false and leaves the board
    /// untouched otherwise.
    pub fn occupy(&mut self, pos: CellPosition, owner: Session) -> bool {
        match self.index(pos) {
            Some(i) if self.cells[i].is_none() => {
                self.cells[i] = Some(owner);
                true
            }
            _ => false,
        }
    }

    pub fn occupied_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }

    pub fn is_full(&self) -> bool {
        self.cells.iter().all(Option::is_some)
    }
}
