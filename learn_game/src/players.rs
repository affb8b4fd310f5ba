use crate::board::{GameState, IsGameOver, Move, StateKey};
use crate::config::AgentConfig;
use crate::error::{GameError, PersistenceError};
use crate::human::HumanAdapter;
use crate::policy_table::{self, PolicySnapshot, PolicyTable};
use log::trace;
use rand::prelude::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::path::{Path, PathBuf};

/// X always moves first.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Mark {
    Cross,
    Nought,
}

impl Mark {
    pub fn other(self) -> Self {
        match self {
            Mark::Cross => Mark::Nought,
            Mark::Nought => Mark::Cross,
        }
    }
    pub fn as_char(self) -> char {
        match self {
            Mark::Cross => 'X',
            Mark::Nought => 'O',
        }
    }
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'X' => Some(Mark::Cross),
            'O' => Some(Mark::Nought),
            _ => None,
        }
    }
    /// +1 for X, -1 for O; three in a line sums to +3 or -3.
    pub fn sign(self) -> i8 {
        match self {
            Mark::Cross => 1,
            Mark::Nought => -1,
        }
    }
}

impl fmt::Display for Mark {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Anything that can take a turn: a learning agent, a person, a script.
///
/// The learning hooks default to doing nothing so that only agents which
/// keep a policy need to care about them.
pub trait Player {
    fn get_name(&self) -> &str;
    fn get_mark(&self) -> Mark;
    fn choose_move(&mut self, board: &GameState) -> Result<Move, GameError>;

    /// Called after this player's own move has been applied to `board`.
    fn value_backup(&mut self, _board: &GameState) {}

    /// Called once when the opponent's move finished the game.
    fn final_backup(&mut self, _board: &GameState) {}

    /// Called at the end of a played (non-training) game.
    fn game_over(&mut self, _board: &GameState, _outcome: IsGameOver) -> Result<(), GameError> {
        Ok(())
    }

    /// Forget everything tied to the episode that just ended.
    fn reset(&mut self) {}

    fn policy(&self) -> Option<&PolicyTable> {
        None
    }

    fn policy_to_disk(
        &self,
        _dir: &Path,
        _export_json: bool,
    ) -> Result<Option<PathBuf>, PersistenceError> {
        Ok(None)
    }
}

/// Self-play agent that learns a state-value table by temporal differences.
///
/// Each move is either exploratory (uniformly random) or greedy (the move
/// whose resulting position has the highest learned value). After every own
/// move the resulting position joins the episode history, and unless the move
/// was exploratory the previous history entry is pulled toward it.
#[derive(Debug)]
pub struct ComputerPlayer {
    name: String,
    mark: Mark,
    learning_rate: f64,
    exploration_rate: f64,
    policy: PolicyTable,
    history: Vec<StateKey>,
    exploration_move: bool,
    rng: ChaCha8Rng,
}

impl ComputerPlayer {
    pub fn new(name: &str, mark: Mark, config: AgentConfig) -> Self {
        ComputerPlayer {
            name: name.to_owned(),
            mark,
            learning_rate: config.learning_rate,
            exploration_rate: config.exploration_rate,
            policy: PolicyTable::new(),
            history: Vec::new(),
            exploration_move: false,
            rng: ChaCha8Rng::from_entropy(),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = ChaCha8Rng::seed_from_u64(seed);
        self
    }

    pub fn with_policy(mut self, policy: PolicyTable) -> Self {
        self.policy = policy;
        self
    }

    /// Restores an agent from a saved snapshot, refusing one learned for the
    /// other symbol.
    pub fn from_disk(
        path: &Path,
        name: &str,
        mark: Mark,
        config: AgentConfig,
    ) -> Result<Self, PersistenceError> {
        let snapshot = policy_table::policy_from_disk(path)?.expect_mark(mark)?;
        Ok(ComputerPlayer::new(name, mark, config).with_policy(snapshot.table))
    }

    pub fn exploration_rate(&self) -> f64 {
        self.exploration_rate
    }

    pub fn history(&self) -> &[StateKey] {
        &self.history
    }

    pub fn into_policy(self) -> PolicyTable {
        self.policy
    }

    fn push_history(&mut self, board: &GameState, learn: bool) {
        self.history.push(board.to_state_key());
        if !learn {
            return;
        }
        if let [.., previous, last] = self.history.as_slice() {
            let value = self.policy.backup(previous, last, self.learning_rate);
            trace!("{}: {} -> {:.4}", self.name, previous, value);
        }
    }
}

impl Player for ComputerPlayer {
    fn get_name(&self) -> &str {
        &self.name
    }
    fn get_mark(&self) -> Mark {
        self.mark
    }

    fn choose_move(&mut self, board: &GameState) -> Result<Move, GameError> {
        if board.to_move() != self.mark {
            return Err(GameError::WrongTurn {
                player: self.name.clone(),
                expected: board.to_move(),
                found: self.mark,
            });
        }
        let mut positions: Vec<Move> = board.available_moves().collect();
        if positions.is_empty() {
            return Err(GameError::NoMove {
                player: self.name.clone(),
            });
        }
        if self.history.is_empty() {
            self.policy.value_of(board, self.mark);
            self.history.push(board.to_state_key());
        }

        let n: f64 = self.rng.gen();
        let action = if self.exploration_rate > 0.0 && n <= self.exploration_rate {
            self.exploration_move = true;
            let action = positions[self.rng.gen_range(0..positions.len())];
            self.policy.value_of(&board.apply_move(action)?, self.mark);
            action
        } else {
            self.exploration_move = false;
            positions.shuffle(&mut self.rng);
            let mut value_max = f64::NEG_INFINITY;
            let mut action = positions[0];
            for p in positions {
                let value = self.policy.value_of(&board.apply_move(p)?, self.mark);
                if value >= value_max {
                    value_max = value;
                    action = p;
                }
            }
            action
        };
        trace!(
            "{} ({}) plays {:?}{}",
            self.name,
            self.mark,
            action,
            if self.exploration_move { " exploring" } else { "" }
        );
        Ok(action)
    }

    fn value_backup(&mut self, board: &GameState) {
        let learn = !self.exploration_move;
        self.push_history(board, learn);
    }

    fn final_backup(&mut self, board: &GameState) {
        self.policy.value_of(board, self.mark);
        self.push_history(board, true);
    }

    fn reset(&mut self) {
        self.history.clear();
        self.exploration_move = false;
    }

    fn policy(&self) -> Option<&PolicyTable> {
        Some(&self.policy)
    }

    fn policy_to_disk(
        &self,
        dir: &Path,
        export_json: bool,
    ) -> Result<Option<PathBuf>, PersistenceError> {
        let snapshot = PolicySnapshot::new(&self.name, self.mark, self.policy.clone());
        policy_table::policy_to_disk(dir, &snapshot, export_json).map(Some)
    }
}

/// A person at the other end of a [`HumanAdapter`].
pub struct HumanPlayer<A> {
    pub name: String,
    pub mark: Mark,
    adapter: A,
}

impl<A: HumanAdapter> HumanPlayer<A> {
    pub fn new(name: &str, mark: Mark, adapter: A) -> Self {
        HumanPlayer {
            name: name.to_owned(),
            mark,
            adapter,
        }
    }

    pub fn into_adapter(self) -> A {
        self.adapter
    }
}

impl<A> fmt::Debug for HumanPlayer<A> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("HumanPlayer")
            .field("name", &self.name)
            .field("mark", &self.mark)
            .finish_non_exhaustive()
    }
}

impl<A: HumanAdapter> Player for HumanPlayer<A> {
    fn get_name(&self) -> &str {
        &self.name
    }
    fn get_mark(&self) -> Mark {
        self.mark
    }

    fn choose_move(&mut self, board: &GameState) -> Result<Move, GameError> {
        let available: Vec<Move> = board.available_moves().collect();
        if available.is_empty() {
            return Err(GameError::NoMove {
                player: self.name.clone(),
            });
        }
        self.adapter.render_board(board)?;
        Ok(self.adapter.prompt_for_move(&self.name, &available)?)
    }

    fn game_over(&mut self, board: &GameState, outcome: IsGameOver) -> Result<(), GameError> {
        self.adapter.render_board(board)?;
        let message = match outcome {
            IsGameOver::Win(mark) if mark == self.mark => {
                format!("Congratulations, {}! You have won!", self.name)
            }
            IsGameOver::Win(_) => format!("Really sorry, {}, you have lost.", self.name),
            IsGameOver::Drawn | IsGameOver::InPlay => "The game ended in a draw.".to_owned(),
        };
        self.adapter.announce(&message)?;
        Ok(())
    }
}

/// Plays a fixed list of moves, in order.
#[derive(Debug, Clone)]
pub struct ScriptedPlayer {
    name: String,
    mark: Mark,
    moves: VecDeque<Move>,
}

impl ScriptedPlayer {
    pub fn new(name: &str, mark: Mark, moves: impl IntoIterator<Item = Move>) -> Self {
        ScriptedPlayer {
            name: name.to_owned(),
            mark,
            moves: moves.into_iter().collect(),
        }
    }
}

impl Player for ScriptedPlayer {
    fn get_name(&self) -> &str {
        &self.name
    }
    fn get_mark(&self) -> Mark {
        self.mark
    }
    fn choose_move(&mut self, _board: &GameState) -> Result<Move, GameError> {
        self.moves.pop_front().ok_or_else(|| GameError::NoMove {
            player: self.name.clone(),
        })
    }
}
