// engine/src/engine/game.rs
#![forbid(unsafe_code)]

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::engine::board::Board;
use crate::engine::error::GameError;
use crate::engine::frames::{
    FrameSequence, best_adj, finish_adj_sequence, frame_sequence_start,
};
use crate::engine::level::{DEFAULT_LINE_CAP, Level, game_score, level_by_lines, level_speed};
use crate::engine::pieces::Piece;
use crate::engine::position::Position;
use crate::engine::search::{PossibleMoves, SearchTables, move_search};
use crate::engine::taps::{TAP_30_HZ, TapTable, validate_tap_sequence};

/// Move-map tags.
pub const MOVE_NO_ADJ: u8 = 1;
pub const MOVE_ADJ_REDUCED: u8 = 2;
pub const MOVE_ADJ_NON_REDUCED: u8 = 3;

/// Dense per-rotation placement tags (0 = unreachable).
pub type MoveMap = [[[u8; 10]; 20]; 4];

/**
 * The ROT rule-set engine: NES Tetris with rotation, driven by placements
 * validated against the current move map. The engine owns no RNG; the caller
 * supplies the piece that becomes the new lookahead on every step.
 */
#[derive(Clone)]
pub struct Tetris {
    board: Board,
    lines: i32,
    pieces: i32,
    is_adj: bool,
    initial_move: usize,
    now_piece: Piece,
    next_piece: Piece,
    game_over: bool,
    moves: PossibleMoves,
    move_map: MoveMap,
    consecutive_fail: i32,
    initial_mask: u64,

    tap_sequence: TapTable,
    adj_delay: i32,
    tables: &'static SearchTables,

    line_cap: i32,
    tetris_only: bool,

    run_score: i32,
    run_lines: i32,
    run_pieces: i32,
}

impl Tetris {
    pub fn new() -> Self {
        let mut t = Tetris {
            board: Board::ONES,
            lines: 0,
            pieces: 0,
            is_adj: false,
            initial_move: 0,
            now_piece: Piece::T,
            next_piece: Piece::T,
            game_over: false,
            moves: PossibleMoves::default(),
            move_map: [[[0; 10]; 20]; 4],
            consecutive_fail: 0,
            initial_mask: 0,
            tap_sequence: TAP_30_HZ,
            adj_delay: 18,
            tables: SearchTables::get(&TAP_30_HZ, 18),
            line_cap: DEFAULT_LINE_CAP,
            tetris_only: false,
            run_score: 0,
            run_lines: 0,
            run_pieces: 0,
        };
        t.reset(Board::ONES, 0, Piece::T, Piece::J, &TAP_30_HZ, 18)
            .expect("default reset is valid");
        t
    }

    pub fn reset(
        &mut self,
        board: Board,
        lines: i32,
        now_piece: Piece,
        next_piece: Piece,
        tap_sequence: &[i32],
        adj_delay: i32,
    ) -> Result<(), GameError> {
        let taps = validate_tap_sequence(tap_sequence)?;
        let pieces = (lines * 10 + board.count() as i32) / 4;
        if pieces * 4 != lines * 10 + board.count() as i32 {
            return Err(GameError::InvalidLines(lines));
        }
        self.tap_sequence = taps;
        self.adj_delay = adj_delay;
        self.tables = SearchTables::get(&taps, adj_delay);
        self.board = board;
        self.lines = lines;
        self.pieces = pieces;
        self.is_adj = false;
        self.initial_move = 0;
        self.now_piece = now_piece;
        self.next_piece = next_piece;
        self.game_over = false;
        self.calculate_moves(true);
        self.consecutive_fail = 0;
        self.run_score = 0;
        self.run_lines = 0;
        self.run_pieces = 0;
        Ok(())
    }

    /// Force the forced-over line total; affects this instance only.
    pub fn set_line_cap(&mut self, cap: i32) {
        self.line_cap = cap;
    }

    /// Any non-tetris clear ends the game when set.
    pub fn set_tetris_only(&mut self, on: bool) {
        self.tetris_only = on;
    }

    // -------------------------------------------------------------------
    // Move map maintenance
    // -------------------------------------------------------------------

    /// Keep only initials whose reachable set is not covered by a larger one.
    fn calculate_initial_mask(&mut self) {
        assert!(
            self.moves.adj.len() <= 64,
            "unexpected many initial placements"
        );
        let n = self.moves.adj.len();
        self.initial_mask = if n == 64 { u64::MAX } else { (1u64 << n) - 1 };
        if n <= 1 {
            return;
        }

        self.moves.adj.sort_by(|a, b| {
            b.1.len()
                .cmp(&a.1.len())
                .then_with(|| (a.0.y - 5).abs().cmp(&(b.0.y - 5).abs()))
        });

        let mut ids: FxHashMap<Position, usize> = FxHashMap::default();
        for (_, finals) in &self.moves.adj {
            for p in finals {
                let next = ids.len();
                ids.entry(*p).or_insert(next);
            }
        }
        let words = ids.len().div_ceil(64);
        let mut sets = vec![vec![0u64; words]; n];
        for (i, (_, finals)) in self.moves.adj.iter().enumerate() {
            for p in finals {
                let id = ids[p];
                sets[i][id / 64] |= 1u64 << (id % 64);
            }
        }
        for i in 0..n {
            if self.initial_mask >> i & 1 == 0 {
                continue;
            }
            for j in 0..n {
                if i == j
                    || self.initial_mask >> j & 1 == 0
                    || self.moves.adj[i].1.len() < self.moves.adj[j].1.len()
                {
                    continue;
                }
                let subset = sets[i]
                    .iter()
                    .zip(&sets[j])
                    .all(|(a, b)| a & b == *b);
                if subset {
                    self.initial_mask &= !(1u64 << j);
                }
            }
        }
    }

    fn calculate_moves(&mut self, regenerate: bool) {
        if regenerate {
            self.moves = move_search(self.tables, self.level_speed(), &self.board, self.now_piece);
            if self.moves.is_empty() {
                debug!(piece = ?self.now_piece, "top-out: no reachable placements");
                self.game_over = true;
                return;
            }
            self.calculate_initial_mask();
        }
        self.move_map = [[[0; 10]; 20]; 4];
        if !self.is_adj {
            for p in &self.moves.non_adj {
                self.move_map[p.r as usize][p.x as usize][p.y as usize] = MOVE_NO_ADJ;
            }
            for (idx, (p, _)) in self.moves.adj.iter().enumerate() {
                self.move_map[p.r as usize][p.x as usize][p.y as usize] =
                    if self.initial_mask >> idx & 1 != 0 {
                        MOVE_ADJ_NON_REDUCED
                    } else {
                        MOVE_ADJ_REDUCED
                    };
            }
        } else {
            for p in &self.moves.adj[self.initial_move].1 {
                self.move_map[p.r as usize][p.x as usize][p.y as usize] = MOVE_NO_ADJ;
            }
        }
    }

    // -------------------------------------------------------------------
    // Stepping
    // -------------------------------------------------------------------

    fn step_game(&mut self, pos: Position, next_piece: Piece) -> (i32, i32) {
        let before_clear = self
            .board
            .place(self.now_piece, pos.r as usize, pos.x, pos.y);
        // A placement may not be cut off by the board edge.
        if self.board.count() + 4 != before_clear.count() {
            self.consecutive_fail += 1;
            return (-1, 0);
        }

        let (lines, new_board) = before_clear.clear_lines();
        let lines = lines as i32;
        let delta_score = game_score(self.lines, lines);
        self.lines += lines;
        self.board = new_board;
        self.pieces += 1;
        self.is_adj = false;
        self.initial_move = 0;
        self.now_piece = self.next_piece;
        self.next_piece = next_piece;
        if self.lines >= self.line_cap || (self.tetris_only && lines != 0 && lines != 4) {
            self.game_over = true;
        } else {
            self.calculate_moves(true);
        }
        self.consecutive_fail = 0;
        self.run_score += delta_score;
        self.run_lines += lines;
        self.run_pieces += 1;
        (delta_score, lines)
    }

    fn map_tag(&self, pos: Position) -> u8 {
        if !(0..4).contains(&pos.r) || !(0..20).contains(&pos.x) || !(0..10).contains(&pos.y) {
            return 0;
        }
        self.move_map[pos.r as usize][pos.x as usize][pos.y as usize]
    }

    pub fn is_no_adj_move(&self, pos: Position) -> bool {
        self.map_tag(pos) == MOVE_NO_ADJ
    }

    pub fn is_adj_move(&self, pos: Position) -> bool {
        self.map_tag(pos) >= MOVE_ADJ_REDUCED
    }

    /// Apply a placement. Returns `(score, lines)`; score is -1 for an
    /// illegal placement, which bumps the failure counter. A placement with
    /// an adjustment tag records the initial and switches to the adjusting
    /// phase with `(0, 0)`.
    pub fn input_placement(&mut self, pos: Position, next_piece: Piece) -> (i32, i32) {
        assert!(!self.game_over, "already game over");
        let tag = self.map_tag(pos);
        if tag == 0 {
            self.consecutive_fail += 1;
            return (-1, 0);
        }
        if tag == MOVE_NO_ADJ {
            return self.step_game(pos, next_piece);
        }
        if let Some(idx) = self.moves.adj.iter().position(|(p, _)| *p == pos) {
            self.initial_move = idx;
        }
        self.is_adj = true;
        self.calculate_moves(false);
        self.consecutive_fail = 0;
        (0, 0)
    }

    /// Apply a placement reachable either without adjustment or as any
    /// adjustment final, skipping the adjusting phase. Anything else ends
    /// the game.
    pub fn direct_placement(&mut self, pos: Position, next_piece: Piece) -> (i32, i32) {
        assert!(!self.game_over, "already game over");
        let ok = self.map_tag(pos) == MOVE_NO_ADJ
            || self
                .moves
                .adj
                .iter()
                .any(|(_, finals)| finals.contains(&pos));
        if !ok {
            self.game_over = true;
            return (-1, 0);
        }
        let ret = self.step_game(pos, next_piece);
        if ret.0 == -1 {
            self.game_over = true;
        }
        ret
    }

    // -------------------------------------------------------------------
    // Frame sequences
    // -------------------------------------------------------------------

    pub fn sequence(&self, pos: Position) -> FrameSequence {
        frame_sequence_start(
            self.level_speed(),
            &self.tap_sequence,
            &self.board,
            self.now_piece,
            self.adj_delay,
            pos,
        )
    }

    /// Best premove for a 7-entry target vector (one per possible next
    /// piece): the chosen adjustment initial and its input sequence.
    pub fn adj_premove(&self, targets: &[Position; 7]) -> (Position, FrameSequence) {
        let (idx, seq) = best_adj(
            self.tables,
            self.level_speed(),
            &self.board,
            self.now_piece,
            &self.moves,
            targets,
        );
        (self.moves.adj[idx].0, seq)
    }

    pub fn finish_adj_sequence(
        &self,
        seq: &mut FrameSequence,
        intermediate: Position,
        final_pos: Position,
    ) {
        finish_adj_sequence(
            self.tables,
            self.level_speed(),
            &self.board,
            self.now_piece,
            seq,
            intermediate,
            final_pos,
        );
    }

    // -------------------------------------------------------------------
    // Mutators and accessors
    // -------------------------------------------------------------------

    pub fn set_next_piece(&mut self, piece: Piece) {
        self.next_piece = piece;
    }

    /// Rewrite the line counter; only allowed within the same speed bucket.
    pub fn set_lines(&mut self, lines: i32) -> Result<(), GameError> {
        if level_speed(level_by_lines(lines)) != self.level_speed() {
            return Err(GameError::InvalidLines(lines));
        }
        let pieces_diff = (lines - self.lines) * 10 / 4;
        self.lines = lines;
        self.pieces += pieces_diff;
        Ok(())
    }

    pub fn force_over(&mut self) {
        self.game_over = true;
    }

    pub fn move_map(&self) -> &MoveMap {
        &self.move_map
    }

    pub fn possible_moves(&self) -> &PossibleMoves {
        &self.moves
    }

    pub fn initial_mask(&self) -> u64 {
        self.initial_mask
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn tap_sequence(&self) -> &TapTable {
        &self.tap_sequence
    }

    pub fn adj_delay(&self) -> i32 {
        self.adj_delay
    }

    pub fn level(&self) -> i32 {
        level_by_lines(self.lines)
    }

    pub fn level_speed(&self) -> Level {
        level_speed(self.level())
    }

    pub fn is_adj(&self) -> bool {
        self.is_adj
    }

    pub fn pieces(&self) -> i32 {
        self.pieces
    }

    pub fn lines(&self) -> i32 {
        self.lines
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

    pub fn line_cap(&self) -> i32 {
        self.line_cap
    }

    pub fn tetris_only(&self) -> bool {
        self.tetris_only
    }

    /// The recorded initial placement of the adjusting phase.
    pub fn initial_move(&self) -> Position {
        assert!(self.is_adj, "no initial move");
        self.moves.adj[self.initial_move].0
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

impl Default for Tetris {
    fn default() -> Self {
        Self::new()
    }
}
