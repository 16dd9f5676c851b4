// engine/src/engine/state.rs
#![forbid(unsafe_code)]

/*
Observation tensors. The plane/field layouts are part of the training
contract and are consumed positionally by the model; do not reorder.

ROT:  board (6,20,10)  = [board, ones, initial one-hot x4]
      moves (18,20,10) = [board, ones, map>=1 x4, map>=2 x4,
                          initial one-hot x4, map in {1,3} x4]
      meta (32)        = [now x7, next-when-adjusting x7, is_adj,
                          cadence x7, adj-delay x6, aggression x3, pad]
      move_meta (28)   = [speed x4, to-transition buckets + scalar x21,
                          (level-18)*0.1, lines*0.01, pieces*0.004]
NORO: board (2,20,10), moves (3,20,10), meta (32), move_meta (31); see the
      builders below.
*/

use crate::engine::game::Tetris;
use crate::engine::game_noro::TetrisNoro;
use crate::engine::level::{LEVEL_SPEED_LINES, level_by_lines, level_speed, noro};
use crate::engine::pieces::{MIRROR_COLS, MIRROR_PIECE};
use crate::engine::reward::noro_line_reward_exp;

pub type Plane = [[f32; 10]; 20];

const ZERO_PLANE: Plane = [[0.0; 10]; 20];
const ONES_PLANE: Plane = [[1.0; 10]; 20];

#[derive(Clone, Debug)]
pub struct State {
    pub board: Vec<Plane>,
    pub meta: [f32; 32],
    pub moves: Vec<Plane>,
    pub move_meta: Vec<f32>,
    pub meta_int: [i32; 2],
}

pub fn state_shapes(is_noro: bool) -> [Vec<usize>; 5] {
    if is_noro {
        [
            vec![2, 20, 10],
            vec![32],
            vec![3, 20, 10],
            vec![31],
            vec![2],
        ]
    } else {
        [
            vec![6, 20, 10],
            vec![32],
            vec![18, 20, 10],
            vec![28],
            vec![2],
        ]
    }
}

pub fn state_types() -> [&'static str; 5] {
    ["float32", "float32", "float32", "float32", "int32"]
}

pub fn build_rot_state(t: &Tetris, line_reduce: i32, aggression: u8) -> State {
    let byte_board = t.board().to_byte_board();
    let mut board_plane = ZERO_PLANE;
    for i in 0..20 {
        for j in 0..10 {
            board_plane[i][j] = byte_board[i][j] as f32;
        }
    }

    let mut board = vec![board_plane, ONES_PLANE, ZERO_PLANE, ZERO_PLANE, ZERO_PLANE, ZERO_PLANE];
    let mut moves = vec![ZERO_PLANE; 18];
    moves[0] = board_plane;
    moves[1] = ONES_PLANE;
    let map = t.move_map();
    for r in 0..4 {
        for i in 0..20 {
            for j in 0..10 {
                let v = map[r][i][j];
                moves[2 + r][i][j] = (v >= 1) as u8 as f32;
                moves[6 + r][i][j] = (v >= 2) as u8 as f32;
                moves[14 + r][i][j] = (v != 0 && v != 2) as u8 as f32;
            }
        }
    }
    if t.is_adj() {
        let pos = t.initial_move();
        board[2 + pos.r as usize][pos.x as usize][pos.y as usize] = 1.0;
        moves[10 + pos.r as usize][pos.x as usize][pos.y as usize] = 1.0;
    }

    let mut meta = [0.0f32; 32];
    meta[t.now_piece().idx()] = 1.0;
    if t.is_adj() {
        meta[7 + t.next_piece().idx()] = 1.0;
        meta[14] = 1.0;
    }

    let state_lines = t.lines() - line_reduce;
    let state_level = level_by_lines(state_lines);
    let state_speed = level_speed(state_level).idx();

    let taps = t.tap_sequence();
    let (tap_4, tap_5) = (taps[3], taps[4]);
    let mut adj_delay = t.adj_delay();
    // At the fast buckets a long delay is indistinguishable from none.
    if state_speed == 2 && adj_delay >= 20 {
        adj_delay = 61;
    }
    if state_speed == 3 && adj_delay >= 10 {
        adj_delay = 61;
    }
    if tap_5 <= 8 {
        meta[15] = 1.0; // 30hz
    } else if tap_5 <= 11 {
        meta[16] = 1.0; // 24hz
    } else if tap_5 <= 13 {
        meta[17] = 1.0; // 20hz
    } else if tap_5 <= 16 {
        meta[18] = 1.0; // 15hz
    } else if tap_4 <= 9 {
        meta[19] = 1.0; // slow 5-tap
    } else if tap_5 <= 21 {
        meta[20] = 1.0; // 12hz
    } else {
        meta[21] = 1.0; // 10hz
    }
    if adj_delay <= 4 {
        meta[22] = 1.0;
    } else if adj_delay <= 19 {
        meta[23] = 1.0;
    } else if adj_delay <= 22 {
        meta[24] = 1.0;
    } else if adj_delay <= 25 {
        meta[25] = 1.0;
    } else if adj_delay <= 32 {
        meta[26] = 1.0;
    } else {
        meta[27] = 1.0;
    }
    meta[28 + aggression as usize] = 1.0;

    let mut move_meta = vec![0.0f32; 28];
    move_meta[state_speed] = 1.0;
    let to_transition = 1.max(LEVEL_SPEED_LINES[state_speed + 1] - state_lines);
    if to_transition <= 10 {
        move_meta[4 + (to_transition - 1) as usize] = 1.0;
    } else if to_transition <= 22 {
        move_meta[14 + ((to_transition - 11) / 3) as usize] = 1.0;
    } else if to_transition <= 40 {
        move_meta[18 + ((to_transition - 22) / 6) as usize] = 1.0;
    } else if to_transition <= 60 {
        move_meta[21 + ((to_transition - 40) / 10) as usize] = 1.0;
    } else {
        move_meta[23] = 1.0;
    }
    move_meta[24] = to_transition as f32 * 0.01;
    move_meta[25] = (state_level - 18) as f32 * 0.1;
    move_meta[26] = state_lines as f32 * 0.01;
    move_meta[27] = (t.pieces() + line_reduce * 10 / 4) as f32 * 0.004;

    State {
        board,
        meta,
        moves,
        move_meta,
        meta_int: [state_lines / 2, t.now_piece().idx() as i32],
    }
}

pub fn build_noro_state(t: &TetrisNoro, nnb: bool, is_mirror: bool, line_reduce: i32) -> State {
    let byte_board = t.board().to_byte_board();
    let mut board_plane = ZERO_PLANE;
    for i in 0..20 {
        for j in 0..10 {
            board_plane[i][j] = if is_mirror {
                byte_board[i][9 - j] as f32
            } else {
                byte_board[i][j] as f32
            };
        }
    }
    let board = vec![board_plane, ONES_PLANE];

    let move_map = t.move_map().to_byte_board();
    let mut moves_plane = ZERO_PLANE;
    for i in 0..20 {
        for j in 0..10 {
            moves_plane[i][j] = if is_mirror {
                let ncol = MIRROR_COLS[t.now_piece().idx()] - j as i32;
                if ncol >= 10 {
                    0.0
                } else {
                    move_map[i][ncol as usize] as f32
                }
            } else {
                move_map[i][j] as f32
            };
        }
    }
    let moves = vec![board_plane, ONES_PLANE, moves_plane];

    let start_level = t.start_level();
    let start_speed = t.inputs_per_row_at(start_level);
    let mut meta = [0.0f32; 32];
    meta[(t.board().count() / 2 % 5) as usize] = 1.0;
    let now = t.now_piece().idx();
    meta[5 + if is_mirror { MIRROR_PIECE[now] } else { now }] = 1.0;
    if nnb {
        meta[19] = 1.0;
    } else {
        let next = t.next_piece().idx();
        meta[12 + if is_mirror { MIRROR_PIECE[next] } else { next }] = 1.0;
    }
    meta[20] = t.do_tuck() as u8 as f32;
    meta[21] = is_mirror as u8 as f32;
    meta[22 + start_speed as usize] = 1.0;

    let state_lines = t.lines() - line_reduce;
    let state_level = noro::level_by_lines(state_lines, start_level);

    let mut move_meta = vec![0.0f32; 31];
    move_meta[t.inputs_per_row() as usize] = 1.0;
    let mut to_transition = t.lines_to_next_speed();
    if to_transition == -1 {
        to_transition = 1000;
    }
    if to_transition <= 10 {
        move_meta[10 + (to_transition - 1) as usize] = 1.0;
    } else if to_transition <= 22 {
        move_meta[20 + ((to_transition - 11) / 3) as usize] = 1.0;
    } else {
        move_meta[24] = 1.0;
    }
    move_meta[25] = to_transition as f32 * 0.01;
    move_meta[26] = state_level as f32 * 0.1;
    move_meta[27] = state_lines as f32 * 0.01;
    move_meta[28] = start_level as f32 * 0.1;
    move_meta[29] = (t.pieces() + line_reduce * 10 / 4) as f32 * 0.004;
    move_meta[30] = (-0.5f64)
        .max(noro_line_reward_exp(
            state_lines + 5,
            start_level,
            t.do_tuck(),
            nnb,
        )) as f32;

    State {
        board,
        meta,
        moves,
        move_meta,
        meta_int: [state_lines / 2, t.now_piece().idx() as i32],
    }
}
