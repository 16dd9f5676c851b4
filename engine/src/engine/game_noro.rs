// engine/src/engine/game_noro.rs
#![forbid(unsafe_code)]

use tracing::debug;

use crate::engine::board::Board;
use crate::engine::error::GameError;
use crate::engine::frames::{FrameSequence, frame_sequence_noro};
use crate::engine::level::{noro, score_from_level};
use crate::engine::pieces::Piece;
use crate::engine::position::Position;
use crate::engine::search_noro::{INPUTS_PER_ROW, move_search_noro};

/// The no-rotation rule-set engine. The move map is a single board of
/// lockable origin cells; rotation is always 0.
#[derive(Clone)]
pub struct TetrisNoro {
    board: Board,
    lines: i32,
    start_level: i32,
    pieces: i32,
    now_piece: Piece,
    next_piece: Piece,
    game_over: bool,
    moves: Board,
    consecutive_fail: i32,
    do_tuck: bool,

    run_score: i32,
    run_lines: i32,
    run_pieces: i32,
}

impl TetrisNoro {
    pub fn new() -> Self {
        let mut t = TetrisNoro {
            board: Board::ONES,
            lines: 0,
            start_level: 0,
            pieces: 0,
            now_piece: Piece::T,
            next_piece: Piece::J,
            game_over: false,
            moves: Board::ZEROS,
            consecutive_fail: 0,
            do_tuck: true,
            run_score: 0,
            run_lines: 0,
            run_pieces: 0,
        };
        t.reset(Board::ONES, 0, 0, true, Piece::T, Piece::J);
        t
    }

    /// NB: unlike the ROT engine, the line count is accepted as given; the
    /// board/lines consistency check is intentionally not enforced here.
    pub fn reset(
        &mut self,
        board: Board,
        lines: i32,
        start_level: i32,
        do_tuck: bool,
        now_piece: Piece,
        next_piece: Piece,
    ) {
        let pieces = (lines * 10 + board.count() as i32) / 4;
        self.board = board;
        self.lines = lines;
        self.start_level = start_level;
        self.pieces = pieces;
        self.do_tuck = do_tuck;
        self.now_piece = now_piece;
        self.next_piece = next_piece;
        self.game_over = false;
        self.calculate_moves();
        self.consecutive_fail = 0;
        self.run_score = 0;
        self.run_lines = 0;
        self.run_pieces = 0;
    }

    fn calculate_moves(&mut self) {
        self.moves = move_search_noro(&self.board, self.now_piece, self.inputs_per_row(), self.do_tuck);
        if self.moves == Board::ZEROS {
            debug!(piece = ?self.now_piece, "top-out: no reachable placements");
            self.game_over = true;
        }
    }

    fn step_game(&mut self, pos: Position, next_piece: Piece) -> (i32, i32) {
        let before_clear = self.board.place(self.now_piece, 0, pos.x, pos.y);
        let (lines, new_board) = before_clear.clear_lines();
        let lines = lines as i32;
        self.lines += lines;
        let delta_score = score_from_level(self.level(), lines);
        self.board = new_board;
        self.pieces += 1;
        self.now_piece = self.next_piece;
        self.next_piece = next_piece;
        self.calculate_moves();
        self.consecutive_fail = 0;
        self.run_score += delta_score;
        self.run_lines += lines;
        self.run_pieces += 1;
        (delta_score, lines)
    }

    /// Apply a placement; `(score, lines)` with score -1 when the cell is not
    /// in the move map. Rotations other than 0 are rejected as input errors.
    pub fn input_placement(&mut self, pos: Position, next_piece: Piece) -> Result<(i32, i32), GameError> {
        assert!(!self.game_over, "already game over");
        if pos.r != 0 {
            return Err(GameError::InvalidRotation(pos.r));
        }
        if !(0..20).contains(&pos.x)
            || !(0..10).contains(&pos.y)
            || !self.moves.cell(pos.x as usize, pos.y as usize)
        {
            self.consecutive_fail += 1;
            return Ok((-1, 0));
        }
        Ok(self.step_game(pos, next_piece))
    }

    pub fn set_next_piece(&mut self, piece: Piece) {
        self.next_piece = piece;
    }

    /// Rewrite the line counter, keeping its parity.
    pub fn set_lines(&mut self, lines: i32) -> Result<(), GameError> {
        if lines % 2 != self.lines % 2 {
            return Err(GameError::InvalidLines(lines));
        }
        let pieces_diff = (lines - self.lines) * 10 / 4;
        self.lines = lines;
        self.pieces += pieces_diff;
        Ok(())
    }

    /// Lines until the inputs-per-row allowance next shrinks; -1 when it
    /// never does.
    pub fn lines_to_next_speed(&self) -> i32 {
        let speed = self.level_speed();
        let mut next_speed = speed;
        while next_speed < INPUTS_PER_ROW.len() && INPUTS_PER_ROW[speed] == INPUTS_PER_ROW[next_speed]
        {
            next_speed += 1;
        }
        if next_speed >= INPUTS_PER_ROW.len() {
            return -1;
        }
        let mut nlines = (self.lines + 9) * 10 / 10;
        while noro::level_speed(noro::level_by_lines(nlines, self.start_level)) != next_speed {
            nlines += 10;
        }
        nlines - self.lines
    }

    pub fn sequence(&self, pos: Position) -> FrameSequence {
        frame_sequence_noro(
            &self.board,
            self.now_piece,
            self.inputs_per_row(),
            self.do_tuck,
            noro::frames_per_row(self.level()),
            pos,
        )
    }

    pub fn move_map(&self) -> &Board {
        &self.moves
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn inputs_per_row(&self) -> i32 {
        let speed = self.level_speed();
        if speed >= INPUTS_PER_ROW.len() {
            *INPUTS_PER_ROW.last().unwrap()
        } else {
            INPUTS_PER_ROW[speed]
        }
    }

    pub fn inputs_per_row_at(&self, level: i32) -> i32 {
        let speed = noro::level_speed(level);
        if speed >= INPUTS_PER_ROW.len() {
            *INPUTS_PER_ROW.last().unwrap()
        } else {
            INPUTS_PER_ROW[speed]
        }
    }

    pub fn do_tuck(&self) -> bool {
        self.do_tuck
    }

    pub fn level(&self) -> i32 {
        noro::level_by_lines(self.lines, self.start_level)
    }

    pub fn level_speed(&self) -> usize {
        noro::level_speed(self.level())
    }

    pub fn pieces(&self) -> i32 {
        self.pieces
    }

    pub fn lines(&self) -> i32 {
        self.lines
    }

    pub fn start_level(&self) -> i32 {
        self.start_level
    }

    pub fn now_piece(&self) -> Piece {
        self.now_piece
    }

    pub fn next_piece(&self) -> Piece {
        self.next_piece
    }

    pub fn is_over(&self) -> bool {
        self.game_over || self.consecutive_fail >= 1
    }

    pub fn run_pieces(&self) -> i32 {
        self.run_pieces
    }

    pub fn run_lines(&self) -> i32 {
        self.run_lines
    }

    pub fn run_score(&self) -> i32 {
        self.run_score
    }
}

impl Default for TetrisNoro {
    fn default() -> Self {
        Self::new()
    }
}
