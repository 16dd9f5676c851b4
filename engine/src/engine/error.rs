// engine/src/engine/error.rs
#![forbid(unsafe_code)]

use std::fmt;

/// Caller-visible input-validation failures. State is unchanged when one of
/// these is returned. Protocol misuse (stepping a finished game, reading the
/// initial move outside the adjusting phase) panics instead.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GameError {
    InvalidPiece(i64),
    /// Line count inconsistent with the board, or outside the allowed domain.
    InvalidLines(i32),
    InvalidTapSequence(&'static str),
    /// NORO placements must use rotation 0.
    InvalidRotation(i32),
}

impl fmt::Display for GameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameError::InvalidPiece(id) => write!(f, "invalid piece id {id}"),
            GameError::InvalidLines(n) => write!(f, "invalid line count {n}"),
            GameError::InvalidTapSequence(why) => write!(f, "invalid tap sequence: {why}"),
            GameError::InvalidRotation(r) => write!(f, "invalid rotation {r}"),
        }
    }
}

impl std::error::Error for GameError {}
