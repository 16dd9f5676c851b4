// engine/src/lib.rs
#![forbid(unsafe_code)]

pub mod engine;

// Re-export the items downstream tooling needs most often:
pub use engine::{
    Board, FrameSequence, GameError, Level, NoroResetConfig, Piece, PieceRngKind, Position,
    PossibleMoves, Reward, RotResetConfig, SearchTables, State, Tetris, TetrisEnv, TetrisNoro,
    move_search, move_search_noro,
};
