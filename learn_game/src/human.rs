//! Talking to a human over a text stream.

use crate::board::{GameState, Move, BOARD_COLS, BOARD_ROWS};
use itertools::Itertools;
use log::debug;
use std::io::{self, BufRead, Write};

/// How the game reaches a person: show them the board, ask for a move.
pub trait HumanAdapter {
    fn render_board(&mut self, board: &GameState) -> io::Result<()>;

    /// Blocks until the human names one of `available`. Input that is not a
    /// legal move is answered with a new prompt, never with an error.
    fn prompt_for_move(&mut self, name: &str, available: &[Move]) -> io::Result<Move>;

    fn announce(&mut self, message: &str) -> io::Result<()>;
}

/// Line-oriented adapter; stdin/stdout in the binary, buffers in tests.
pub struct TerminalAdapter<R, W> {
    input: R,
    output: W,
}

impl TerminalAdapter<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio() -> Self {
        TerminalAdapter::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> TerminalAdapter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        TerminalAdapter { input, output }
    }

    pub fn into_output(self) -> W {
        self.output
    }
}

/// Parses "row col" (1-based, space or comma separated) into a zero-based move.
pub fn parse_move(line: &str) -> Option<Move> {
    let (row, col): (Option<usize>, Option<usize>) = line
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|part| !part.is_empty())
        .map(|part| part.parse::<usize>().ok())
        .collect_tuple()?;
    let (row, col) = (row?, col?);
    if (1..=BOARD_ROWS).contains(&row) && (1..=BOARD_COLS).contains(&col) {
        Some((row - 1, col - 1))
    } else {
        None
    }
}

impl<R: BufRead, W: Write> HumanAdapter for TerminalAdapter<R, W> {
    fn render_board(&mut self, board: &GameState) -> io::Result<()> {
        writeln!(self.output, "{board}")
    }

    fn prompt_for_move(&mut self, name: &str, available: &[Move]) -> io::Result<Move> {
        let mut buf = Vec::new();
        loop {
            write!(self.output, "{name}, enter your move as `row column` (1-3): ")?;
            self.output.flush()?;
            buf.clear();
            if self.input.read_until(b'\n', &mut buf)? == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "input closed before a move was entered",
                ));
            }
            // bytes that are not UTF-8 are just another unparseable answer
            match std::str::from_utf8(&buf).ok().and_then(parse_move) {
                Some(mv) if available.contains(&mv) => return Ok(mv),
                Some(mv) => {
                    debug!("rejected taken cell {mv:?}");
                    writeln!(self.output, "That square is taken, please choose another one.")?;
                }
                None => {
                    debug!(
                        "rejected unparseable input {:?}",
                        String::from_utf8_lossy(&buf).trim_end()
                    );
                    writeln!(self.output, "Please type two numbers from 1 to 3, e.g. `2 3`.")?;
                }
            }
        }
    }

    fn announce(&mut self, message: &str) -> io::Result<()> {
        writeln!(self.output, "{message}")
    }
}
