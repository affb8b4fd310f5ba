use crate::board::{GameState, IsGameOver};
use crate::error::{GameError, PersistenceError};
use crate::human::HumanAdapter;
use crate::players::{ComputerPlayer, HumanPlayer, Mark, Player};
use log::{debug, info};
use std::fmt;
use std::mem;
use std::path::{Path, PathBuf};

pub mod board;
pub mod config;
pub mod error;
pub mod human;
pub mod players;
pub mod policy_table;

/// How one finished game went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpisodeReport {
    pub outcome: IsGameOver,
    pub moves: usize,
    pub final_state: GameState,
}

/// Tally of finished training games.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrainingStats {
    pub episodes: usize,
    pub cross_wins: usize,
    pub nought_wins: usize,
    pub draws: usize,
}

impl TrainingStats {
    pub fn record(&mut self, outcome: IsGameOver) {
        self.episodes += 1;
        match outcome {
            IsGameOver::Win(Mark::Cross) => self.cross_wins += 1,
            IsGameOver::Win(Mark::Nought) => self.nought_wins += 1,
            IsGameOver::Drawn => self.draws += 1,
            IsGameOver::InPlay => {}
        }
    }
}

impl fmt::Display for TrainingStats {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} games: X won {}, O won {}, {} drawn",
            self.episodes, self.cross_wins, self.nought_wins, self.draws
        )
    }
}

/// The judge: owns the board and both players and referees their games.
///
/// `current_player` is always the side to move; the two are swapped after
/// every move that does not end the game.
pub struct Game {
    pub board: GameState,
    pub current_player: Box<dyn Player>,
    pub other_player: Box<dyn Player>,

    episode: usize,
    progress_interval: usize,
}

impl Game {
    pub fn new(player1: Box<dyn Player>, player2: Box<dyn Player>) -> Result<Self, GameError> {
        if player1.get_mark() == player2.get_mark() {
            return Err(GameError::DuplicateMark(player1.get_mark()));
        }
        let (current_player, other_player) = if player1.get_mark() == Mark::Cross {
            (player1, player2)
        } else {
            (player2, player1)
        };
        Ok(Game {
            board: GameState::new(),
            current_player,
            other_player,
            episode: 0,
            progress_interval: config::PROGRESS_INTERVAL,
        })
    }

    pub fn with_progress_interval(mut self, every: usize) -> Self {
        self.progress_interval = every.max(1);
        self
    }

    pub fn episode(&self) -> usize {
        self.episode
    }

    pub fn player(&self, mark: Mark) -> &dyn Player {
        if self.current_player.get_mark() == mark {
            self.current_player.as_ref()
        } else {
            self.other_player.as_ref()
        }
    }

    /// Both players, X first.
    pub fn into_players(self) -> (Box<dyn Player>, Box<dyn Player>) {
        if self.current_player.get_mark() == Mark::Cross {
            (self.current_player, self.other_player)
        } else {
            (self.other_player, self.current_player)
        }
    }

    pub fn swap_players(&mut self) {
        mem::swap(&mut self.current_player, &mut self.other_player);
    }

    fn start_episode(&mut self) {
        self.board = GameState::new();
        self.current_player.reset();
        self.other_player.reset();
        if self.current_player.get_mark() != Mark::Cross {
            self.swap_players();
        }
    }

    /// Plays one move for the side to move. Returns the game status after it.
    fn step(&mut self, learn: bool) -> Result<IsGameOver, GameError> {
        let mv = self.current_player.choose_move(&self.board)?;
        self.board = self.board.apply_move(mv)?;
        if learn {
            self.current_player.value_backup(&self.board);
        }
        Ok(self.board.is_game_over())
    }

    /// One self-play training game. Both players learn as it goes; the loser
    /// or the drawing side that did not move last gets the final position too.
    pub fn run_episode(&mut self) -> Result<EpisodeReport, GameError> {
        self.start_episode();
        let mut moves = 0;
        loop {
            let status = self.step(true)?;
            moves += 1;
            if status.is_over() {
                self.other_player.final_backup(&self.board);
                self.episode += 1;
                debug!("episode {} ended after {moves} moves: {status:?}", self.episode);
                return Ok(EpisodeReport {
                    outcome: status,
                    moves,
                    final_state: self.board,
                });
            }
            self.swap_players();
        }
    }

    /// Runs `episodes` training games back to back. Policies carry over from
    /// game to game; board and histories do not.
    pub fn train(&mut self, episodes: usize) -> Result<TrainingStats, GameError> {
        let mut stats = TrainingStats::default();
        let mut window = TrainingStats::default();
        for _ in 0..episodes {
            let report = self.run_episode()?;
            stats.record(report.outcome);
            window.record(report.outcome);
            if self.episode % self.progress_interval == 0 {
                info!("{} games played; last {window}", self.episode);
                window = TrainingStats::default();
            }
        }
        info!("training finished: {stats}");
        Ok(stats)
    }

    /// One game without learning, e.g. against a human. Both players hear the
    /// result through [`Player::game_over`].
    pub fn play(&mut self) -> Result<EpisodeReport, GameError> {
        self.start_episode();
        let mut moves = 0;
        loop {
            let status = self.step(false)?;
            moves += 1;
            if status.is_over() {
                self.current_player.game_over(&self.board, status)?;
                self.other_player.game_over(&self.board, status)?;
                return Ok(EpisodeReport {
                    outcome: status,
                    moves,
                    final_state: self.board,
                });
            }
            self.swap_players();
        }
    }

    /// Saves every policy-holding player's table under `dir`.
    pub fn policies_to_disk(
        &self,
        dir: &Path,
        export_json: bool,
    ) -> Result<Vec<PathBuf>, PersistenceError> {
        let mut saved = Vec::new();
        for player in [&self.current_player, &self.other_player] {
            if let Some(path) = player.policy_to_disk(dir, export_json)? {
                saved.push(path);
            }
        }
        Ok(saved)
    }
}

/// A single game between a trained agent and a person. The human takes the
/// symbol the agent does not hold.
pub fn play_interactive<A: HumanAdapter + 'static>(
    agent: ComputerPlayer,
    human_name: &str,
    adapter: A,
) -> Result<EpisodeReport, GameError> {
    let human = HumanPlayer::new(human_name, agent.get_mark().other(), adapter);
    info!(
        "{} ({}) against {} ({})",
        agent.get_name(),
        agent.get_mark(),
        human.name,
        human.mark
    );
    let mut game = Game::new(Box::new(agent), Box::new(human))?;
    game.play()
}
