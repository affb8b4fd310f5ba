use crate::error::MoveError;
use crate::players::Mark;
use itertools::Itertools;
use ndarray::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const BOARD_ROWS: usize = 3;
pub const BOARD_COLS: usize = 3;
const CELLS: usize = BOARD_ROWS * BOARD_COLS;
const EMPTY_CHAR: char = '-';

/// A (row, column) pair, both zero-based.
pub type Move = (usize, usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsGameOver {
    InPlay,
    Drawn,
    Win(Mark),
}

impl IsGameOver {
    pub fn is_over(&self) -> bool {
        !matches!(self, IsGameOver::InPlay)
    }
}

/// Cell contents of a board, one character per cell in row-major order.
///
/// Keys depend on the cells only, so two positions that differ just in whose
/// turn it is share a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateKey(String);

impl StateKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Validates a key read from outside, e.g. from a policy file.
    pub fn parse(raw: &str) -> Option<StateKey> {
        GameState::from_key(raw).map(|state| state.to_state_key())
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A 3x3 tic-tac-toe position plus the side to move.
///
/// Positions are values: applying a move returns a new `GameState` and leaves
/// the original untouched, so "what if" evaluations never alias the real game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GameState {
    cells: [Option<Mark>; CELLS],
    to_move: Mark,
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}

impl GameState {
    /// An empty board with X to move.
    pub fn new() -> Self {
        GameState {
            cells: [None; CELLS],
            to_move: Mark::Cross,
        }
    }

    /// Rebuilds a position from its key. The side to move is derived from
    /// the symbol counts; keys that no legal game can produce are rejected.
    pub fn from_key(key: &str) -> Option<GameState> {
        let mut cells = [None; CELLS];
        let mut count = 0;
        for (cell, c) in cells.iter_mut().zip(key.chars()) {
            *cell = match c {
                EMPTY_CHAR => None,
                c => Some(Mark::from_char(c)?),
            };
            count += 1;
        }
        if count != CELLS || key.chars().count() != CELLS {
            return None;
        }
        let crosses = cells.iter().filter(|c| **c == Some(Mark::Cross)).count();
        let noughts = cells.iter().filter(|c| **c == Some(Mark::Nought)).count();
        let to_move = match crosses.checked_sub(noughts) {
            Some(0) => Mark::Cross,
            Some(1) => Mark::Nought,
            _ => return None,
        };
        Some(GameState { cells, to_move })
    }

    pub fn to_move(&self) -> Mark {
        self.to_move
    }

    pub fn get(&self, (row, col): Move) -> Option<Mark> {
        if row >= BOARD_ROWS || col >= BOARD_COLS {
            return None;
        }
        self.cells[row * BOARD_COLS + col]
    }

    pub fn move_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }

    pub fn to_state_key(&self) -> StateKey {
        StateKey(
            self.cells
                .iter()
                .map(|cell| cell.map_or(EMPTY_CHAR, Mark::as_char))
                .collect(),
        )
    }

    /// Empty cells in row-major order.
    pub fn available_moves(&self) -> impl Iterator<Item = Move> + '_ {
        self.cells
            .iter()
            .positions(|cell| cell.is_none())
            .map(|index| (index / BOARD_COLS, index % BOARD_COLS))
    }

    pub fn is_full(&self) -> bool {
        self.cells.iter().all(Option::is_some)
    }

    /// Places the side to move on `mv` and passes the turn.
    pub fn apply_move(&self, mv: Move) -> Result<GameState, MoveError> {
        let (row, col) = mv;
        if row >= BOARD_ROWS || col >= BOARD_COLS {
            return Err(MoveError::OutOfBounds { row, col });
        }
        let index = row * BOARD_COLS + col;
        if self.cells[index].is_some() {
            return Err(MoveError::Occupied { row, col });
        }
        let mut next = *self;
        next.cells[index] = Some(self.to_move);
        next.to_move = self.to_move.other();
        Ok(next)
    }

    /// Rows first, then columns, then the main and anti diagonal. A line sum
    /// of +3 or -3 wins for that sign.
    pub fn is_game_over(&self) -> IsGameOver {
        let grid = self.signed_grid();
        let lines = grid
            .rows()
            .into_iter()
            .map(|row| row.sum())
            .chain(grid.columns().into_iter().map(|col| col.sum()))
            .chain(std::iter::once(grid.diag().sum()))
            .chain(std::iter::once(grid.slice(s![.., ..;-1]).diag().sum()));
        for sum in lines {
            match sum {
                3 => return IsGameOver::Win(Mark::Cross),
                -3 => return IsGameOver::Win(Mark::Nought),
                _ => {}
            }
        }
        if self.is_full() {
            IsGameOver::Drawn
        } else {
            IsGameOver::InPlay
        }
    }

    fn signed_grid(&self) -> Array2<i8> {
        Array2::from_shape_fn((BOARD_ROWS, BOARD_COLS), |(row, col)| {
            self.cells[row * BOARD_COLS + col].map_or(0, Mark::sign)
        })
    }
}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "    1   2   3")?;
        for (i, (a, b, c)) in self.cells.iter().tuples::<(_, _, _)>().enumerate() {
            let [a, b, c] = [a, b, c].map(|cell| cell.map_or(' ', Mark::as_char));
            writeln!(f, "  -------------")?;
            writeln!(f, "{} | {} | {} | {} |", i + 1, a, b, c)?;
        }
        write!(f, "  -------------")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINES: [[Move; 3]; 8] = [
        [(0, 0), (0, 1), (0, 2)],
        [(1, 0), (1, 1), (1, 2)],
        [(2, 0), (2, 1), (2, 2)],
        [(0, 0), (1, 0), (2, 0)],
        [(0, 1), (1, 1), (2, 1)],
        [(0, 2), (1, 2), (2, 2)],
        [(0, 0), (1, 1), (2, 2)],
        [(0, 2), (1, 1), (2, 0)],
    ];

    fn play(moves: &[Move]) -> GameState {
        moves.iter().fold(GameState::new(), |state, &mv| {
            state.apply_move(mv).expect("legal move")
        })
    }

    #[test]
    fn every_line_wins_for_its_symbol() {
        for mark in [Mark::Cross, Mark::Nought] {
            for line in LINES {
                let mut state = GameState::new();
                for (row, col) in line {
                    state.cells[row * BOARD_COLS + col] = Some(mark);
                }
                assert_eq!(state.is_game_over(), IsGameOver::Win(mark), "{line:?}");
            }
        }
    }

    #[test]
    fn full_board_without_line_is_drawn() {
        let state = GameState::from_key("XOXXOOOXX").unwrap();
        assert_eq!(state.is_game_over(), IsGameOver::Drawn);
    }

    #[test]
    fn open_board_without_line_is_in_play() {
        assert_eq!(GameState::new().is_game_over(), IsGameOver::InPlay);
        let state = GameState::from_key("XO-XO----").unwrap();
        assert_eq!(state.is_game_over(), IsGameOver::InPlay);
    }

    #[test]
    fn diagonal_scenario() {
        let state = play(&[(0, 0), (0, 1), (1, 1), (1, 0)]);
        assert_eq!(state.is_game_over(), IsGameOver::InPlay);
        let state = state.apply_move((2, 2)).unwrap();
        assert_eq!(state.is_game_over(), IsGameOver::Win(Mark::Cross));
    }

    #[test]
    fn nine_moves_without_line_draw() {
        let moves = [
            (0, 0),
            (0, 1),
            (0, 2),
            (1, 1),
            (1, 0),
            (1, 2),
            (2, 1),
            (2, 0),
            (2, 2),
        ];
        let state = play(&moves[..8]);
        assert_eq!(state.is_game_over(), IsGameOver::InPlay);
        let state = state.apply_move(moves[8]).unwrap();
        assert_eq!(state.is_game_over(), IsGameOver::Drawn);
        assert_eq!(state.available_moves().count(), 0);
    }

    #[test]
    fn occupied_cell_is_rejected() {
        let state = play(&[(1, 1)]);
        let before = state;
        assert_eq!(
            state.apply_move((1, 1)),
            Err(MoveError::Occupied { row: 1, col: 1 })
        );
        assert_eq!(state, before);
        assert_eq!(state.to_move(), Mark::Nought);
    }

    #[test]
    fn out_of_bounds_is_rejected() {
        assert_eq!(
            GameState::new().apply_move((0, 3)),
            Err(MoveError::OutOfBounds { row: 0, col: 3 })
        );
    }

    #[test]
    fn apply_move_flips_turn_and_keeps_original() {
        let empty = GameState::new();
        let next = empty.apply_move((2, 1)).unwrap();
        assert_eq!(empty, GameState::new());
        assert_eq!(next.get((2, 1)), Some(Mark::Cross));
        assert_eq!(next.to_move(), Mark::Nought);
        assert_eq!(next.to_state_key().as_str(), "-------X-");
    }

    #[test]
    fn available_moves_are_the_empty_cells() {
        let state = play(&[(0, 0), (2, 2)]);
        let moves: Vec<Move> = state.available_moves().collect();
        assert_eq!(moves.len(), 7);
        assert!(!moves.contains(&(0, 0)));
        assert!(!moves.contains(&(2, 2)));
        assert_eq!(moves[0], (0, 1));
    }

    #[test]
    fn key_ignores_turn_flag() {
        let a = GameState::from_key("X---O----").unwrap();
        let mut b = a;
        b.to_move = Mark::Nought;
        assert_eq!(a.to_state_key(), b.to_state_key());
    }

    #[test]
    fn from_key_rejects_impossible_positions() {
        assert!(GameState::from_key("XX-------").is_none());
        assert!(GameState::from_key("O--------").is_none());
        assert!(GameState::from_key("X--").is_none());
        assert!(GameState::from_key("X---------").is_none());
        assert!(GameState::from_key("Z--------").is_none());
        assert!(StateKey::parse("O-O-X----").is_none());
        assert!(StateKey::parse("X-O-X----").is_some());
    }

    #[test]
    fn display_renders_grid() {
        let state = play(&[(0, 0), (1, 1)]);
        let text = state.to_string();
        assert!(text.contains("1 | X |   |   |"));
        assert!(text.contains("2 |   | O |   |"));
    }
}
