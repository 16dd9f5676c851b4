// engine/src/engine/mod.rs
#![forbid(unsafe_code)]

mod board;
mod env;
mod error;
mod frames;
mod game;
mod game_noro;
mod level;
mod piece_rng;
mod pieces;
mod position;
mod reward;
mod search;
mod search_noro;
mod state;
mod taps;

/**
 * Curated engine public API.
 *
 * Internal implementation modules stay private; only stable items are
 * re-exported here.
 */
pub use board::{Board, ByteBoard, COLS, ROWS};
pub use env::{NoroResetConfig, Reward, RotResetConfig, TetrisEnv};
pub use error::GameError;
pub use frames::{
    FrameSequence, best_adj, finish_adj_sequence, frame_sequence_noro, frame_sequence_start,
    input, replay,
};
pub use game::{MOVE_ADJ_NON_REDUCED, MOVE_ADJ_REDUCED, MOVE_NO_ADJ, MoveMap, Tetris};
pub use game_noro::TetrisNoro;
pub use level::{
    DEFAULT_LINE_CAP, LEVEL_SPEED_LINES, Level, NUM_LEVELS, game_score, level_by_lines,
    level_speed, noro, score_from_level,
};
pub use piece_rng::{PieceRngKind, TRANSITION_PROB_INT, TRANSITION_REALISTIC_PROB_INT};
pub use pieces::{MIRROR_COLS, MIRROR_PIECE, NUM_PIECES, Piece, rotations};
pub use position::Position;
pub use reward::noro_line_reward_exp;
pub use search::{
    NO_ADJ_DELAY, PossibleMoves, SEARCH_END_FRAME, SearchTables, is_drop_frame, move_search,
    row_of,
};
pub use search_noro::{INPUTS_PER_ROW, move_search_noro};
pub use state::{Plane, State, build_noro_state, build_rot_state, state_shapes, state_types};
pub use taps::{
    TAP_10_HZ, TAP_12_HZ, TAP_15_HZ, TAP_20_HZ, TAP_24_HZ, TAP_30_HZ, TAP_SLOW_5, TapTable,
    tap_table_by_name, validate_tap_sequence,
};
