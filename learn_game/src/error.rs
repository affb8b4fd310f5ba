use std::path::PathBuf;

use crate::players::Mark;

/// A move that cannot be applied to the board it was played on.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoveError {
    #[error("cell ({row}, {col}) is outside the 3x3 board")]
    OutOfBounds { row: usize, col: usize },

    #[error("cell ({row}, {col}) is already taken")]
    Occupied { row: usize, col: usize },
}

/// Errors that can end a game early.
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    #[error("illegal move: {0}")]
    InvalidMove(#[from] MoveError),

    #[error("{player} has no move to play")]
    NoMove { player: String },

    #[error("both players hold {0}")]
    DuplicateMark(Mark),

    #[error("{player} plays {found} but it is {expected} to move")]
    WrongTurn {
        player: String,
        expected: Mark,
        found: Mark,
    },

    #[error("human player I/O failed: {0}")]
    Input(#[from] std::io::Error),
}

/// Errors raised while saving or loading a policy table.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("failed to access policy file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to encode policy: {0}")]
    Encode(serde_pickle::Error),

    #[error("policy data is corrupt: {0}")]
    Decode(serde_pickle::Error),

    #[error("failed to export policy as JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("policy contains a malformed state key {0:?}")]
    InvalidKey(String),

    #[error("policy value {value} for {key} is outside [0, 1]")]
    InvalidValue { key: String, value: f64 },

    #[error("policy was learned for {found} but {expected} was requested")]
    SymbolMismatch { expected: Mark, found: Mark },
}

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("config validation error: {0}")]
    Validation(String),
}
