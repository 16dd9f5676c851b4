// engine/src/engine/search.rs
#![forbid(unsafe_code)]

/*
ROT move search.

Frame model: the piece spawns at (rot 0, row 0, col 5) and its row during
frame f is a pure function of f and the gravity bucket. The k-th controller
input may land at frame taps[k]; at that frame the shift is applied, then the
rotation, each collision-checked against the row of that frame, and gravity
resumes afterwards. A placement locks when gravity has no room before the
next allowed input. One extra input after the scheduled taps (a tuck) is
explored at every later frame, including same-frame shift+rotate and the two
cross-frame orders. An input plan whose placement is still falling at the
adjustment boundary becomes an adjustment initial; its reachable finals are
searched from that intermediate state.

The production implementation never steps frame-by-frame through the tap
phase: per-rotation column bitmasks turn each between-taps fall into one
contiguous-range AND. The frame-accurate reference simulator lives in
tests/search_reference.rs and must stay in exact agreement.
*/

use std::collections::BTreeSet;
use std::sync::OnceLock;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::engine::board::Board;
use crate::engine::level::{Level, NUM_LEVELS};
use crate::engine::pieces::Piece;
use crate::engine::position::Position;
use crate::engine::taps::TapTable;

/// Frame bound that no falling piece survives to; used to disable the
/// adjustment split or the continue check.
pub const SEARCH_END_FRAME: i32 = 1000;

/// Adjustment delay value that disables adjustments entirely.
pub const NO_ADJ_DELAY: i32 = 61;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PossibleMoves {
    /// Placements committed before the adjustment boundary.
    pub non_adj: Vec<Position>,
    /// Adjustment initials, each with its reachable final placements.
    pub adj: Vec<(Position, Vec<Position>)>,
}

impl PossibleMoves {
    pub fn is_empty(&self) -> bool {
        self.non_adj.is_empty() && self.adj.is_empty()
    }

    /// Canonical order for comparisons.
    pub fn normalize(&mut self) {
        self.non_adj.sort();
        self.non_adj.dedup();
        for (_, finals) in &mut self.adj {
            finals.sort();
            finals.dedup();
        }
        self.adj.sort();
    }
}

/// Row occupied during `frame` under a gravity bucket.
#[inline]
pub fn row_of(level: Level, frame: i32) -> i32 {
    match level {
        Level::Level18 => frame / 3,
        Level::Level19 => frame / 2,
        Level::Level29 => frame,
        Level::Level39 => frame * 2,
    }
}

#[inline]
pub fn is_drop_frame(level: Level, frame: i32) -> bool {
    match level {
        Level::Level18 => frame % 3 == 2,
        Level::Level19 => frame % 2 == 1,
        _ => true,
    }
}

/// Per-rotation column occupancy masks for one (board, piece): bit `x` of
/// `cols[rot][y]` is set iff the piece fits at `(rot, x, y)`.
pub(crate) struct PieceMasks {
    cols: [[u32; 10]; 4],
    rots: usize,
}

impl PieceMasks {
    pub(crate) fn new(board: &Board, piece: Piece) -> Self {
        let maps = board.piece_map(piece);
        let mut cols = [[0u32; 10]; 4];
        for (r, m) in maps.iter().enumerate() {
            for x in 0..20 {
                let bits = m.row(x);
                for (y, col) in cols[r].iter_mut().enumerate() {
                    *col |= ((bits >> y & 1) as u32) << x;
                }
            }
        }
        PieceMasks {
            cols,
            rots: maps.len(),
        }
    }

    #[inline]
    pub(crate) fn rots(&self) -> usize {
        self.rots
    }

    #[inline]
    pub(crate) fn fits(&self, rot: usize, row: i32, col: i32) -> bool {
        (0..20).contains(&row) && self.cols[rot][col as usize] >> row & 1 != 0
    }

    /// All rows in `top..=bottom` passable in this column.
    #[inline]
    pub(crate) fn clear_range(&self, rot: usize, col: i32, top: i32, bottom: i32) -> bool {
        debug_assert!(top <= bottom && bottom < 20);
        let mask = ((1u32 << (bottom + 1)) - (1u32 << top)) as u32;
        self.cols[rot][col as usize] & mask == mask
    }

    /// Fall until the row before `max_row`, the floor, or a blocked cell.
    /// Returns (reached max_row, resting row).
    #[inline]
    pub(crate) fn free_drop(&self, rot: usize, col: i32, mut row: i32, max_row: i32) -> (bool, i32) {
        while row < max_row && row < 19 && self.fits(rot, row + 1, col) {
            row += 1;
        }
        (row >= max_row, row)
    }

    /// Fall all the way to support.
    #[inline]
    pub(crate) fn drop_pos(&self, rot: usize, mut row: i32, col: i32) -> Position {
        while row < 19 && self.fits(rot, row + 1, col) {
            row += 1;
        }
        Position::new(rot as i32, row, col)
    }
}

/// Precomputed per-(tap table, adjustment delay) acceleration data: for each
/// gravity bucket, the row the piece occupies at every spawn-relative tap
/// instant. Owned by the process-wide cache; never mutated after build.
pub struct SearchTables {
    pub taps: TapTable,
    pub adj_delay: i32,
    tap_row: [[i32; 10]; NUM_LEVELS],
}

type CacheKey = (TapTable, i32);
static TABLE_CACHE: OnceLock<Mutex<FxHashMap<CacheKey, &'static SearchTables>>> = OnceLock::new();

impl SearchTables {
    fn build(taps: TapTable, adj_delay: i32) -> Self {
        let mut tap_row = [[0i32; 10]; NUM_LEVELS];
        for level in Level::all() {
            for (k, row) in tap_row[level.idx()].iter_mut().enumerate() {
                *row = row_of(level, taps[k]);
            }
        }
        SearchTables {
            taps,
            adj_delay,
            tap_row,
        }
    }

    /// Shared immutable entry for `(taps, adj_delay)`; built eagerly for all
    /// levels on first request and kept for the process lifetime.
    pub fn get(taps: &TapTable, adj_delay: i32) -> &'static SearchTables {
        let cache = TABLE_CACHE.get_or_init(|| Mutex::new(FxHashMap::default()));
        let mut map = cache.lock();
        map.entry((*taps, adj_delay)).or_insert_with(|| {
            debug!(adj_delay, "building precomputed search tables");
            Box::leak(Box::new(SearchTables::build(*taps, adj_delay)))
        })
    }
}

struct Sim<'a> {
    masks: &'a PieceMasks,
    level: Level,
    taps: &'a TapTable,
    tap_row: &'a [i32; 10],
}

impl Sim<'_> {
    #[inline]
    fn row_at_tap(&self, tap: usize, start_frame: i32) -> i32 {
        if start_frame == 0 {
            self.tap_row[tap]
        } else {
            row_of(self.level, start_frame + self.taps[tap])
        }
    }

    /// One concrete input plan: `num_lr` lateral taps (left iff `is_l`) and
    /// `num_ab` rotation taps (cw iff `is_a`), applied at consecutive tap
    /// instants from `start_frame`.
    #[allow(clippy::too_many_arguments)]
    fn run(
        &self,
        start_rot: usize,
        start_col: i32,
        start_frame: i32,
        end_frame: i32,
        num_lr: i32,
        num_ab: i32,
        is_l: bool,
        is_a: bool,
        check_tuck: bool,
        non_tuck: &BTreeSet<Position>,
        locked: &mut Vec<Position>,
        mut continues: Option<&mut Vec<(Position, i32)>>,
    ) {
        let rots = self.masks.rots as i32;
        if is_l && num_lr > start_col {
            return;
        }
        if !is_l && num_lr > 9 - start_col {
            return;
        }
        if is_a && num_ab > rots / 2 {
            return;
        }
        if !is_a && num_ab > (rots - 1) / 2 {
            return;
        }
        if (is_l && num_lr == 0) || (is_a && num_ab == 0) {
            return;
        }

        let mut rot = start_rot;
        let mut col = start_col;
        let tot = num_lr.max(num_ab);
        let mut prev_row = row_of(self.level, start_frame);

        for tap in 0..tot {
            let r = self.row_at_tap(tap as usize, start_frame);
            if r >= 20 || !self.masks.clear_range(rot, col, prev_row, r) {
                return;
            }
            let t = tap + 1;
            if t <= num_lr {
                col += if is_l { -1 } else { 1 };
                if !self.masks.fits(rot, r, col) {
                    return;
                }
            }
            if t <= num_ab {
                rot = if is_a {
                    (rot + 1) % self.masks.rots
                } else {
                    (rot + self.masks.rots - 1) % self.masks.rots
                };
                if !self.masks.fits(rot, r, col) {
                    return;
                }
            }
            prev_row = r;
        }

        // Fall until the next allowed input instant; locking earlier means no
        // further input (and no tuck) can happen.
        let slot_frame = start_frame + self.taps[tot as usize];
        let slot_row = self.row_at_tap(tot as usize, start_frame);
        let (reached, row) = self.masks.free_drop(rot, col, prev_row, slot_row);
        if !reached {
            locked.push(Position::new(rot as i32, row, col));
            return;
        }

        let (still_falling, rest) =
            self.masks
                .free_drop(rot, col, row, row_of(self.level, end_frame));
        if still_falling {
            if let Some(out) = continues.as_deref_mut() {
                out.push((
                    Position::new(rot as i32, rest, col),
                    end_frame.max(slot_frame),
                ));
            }
        } else {
            locked.push(Position::new(rot as i32, rest, col));
        }

        if !check_tuck {
            return;
        }
        self.scan_tucks(rot, col, slot_frame, end_frame, non_tuck, locked);
    }

    /// Try one extra input at every frame of the remaining fall; placements
    /// already reachable without a tuck are skipped.
    fn scan_tucks(
        &self,
        rot: usize,
        col: i32,
        start_frame: i32,
        end_frame: i32,
        non_tuck: &BTreeSet<Position>,
        locked: &mut Vec<Position>,
    ) {
        let masks = self.masks;
        let rots = masks.rots;
        let mut tucks: BTreeSet<Position> = BTreeSet::new();
        let mut insert = |p: Position| {
            if !non_tuck.contains(&p) {
                tucks.insert(p);
            }
        };

        let mut frame = start_frame;
        while frame < end_frame {
            let row = row_of(self.level, frame);
            if row >= 20 || !masks.fits(rot, row, col) {
                break;
            }
            let nrow = row_of(self.level, frame + 1);
            // At double gravity the piece sweeps an intermediate row too.
            let mrow = if nrow - row == 2 { nrow - 1 } else { nrow };
            let arot = (rot + 1) % rots;
            let brot = (rot + rots - 1) % rots;

            if col < 9 && masks.fits(rot, row, col + 1) {
                insert(masks.drop_pos(rot, row, col + 1));
                if rots >= 2 && masks.fits(arot, row, col + 1) {
                    insert(masks.drop_pos(arot, row, col + 1));
                }
                if rots >= 4 && masks.fits(brot, row, col + 1) {
                    insert(masks.drop_pos(brot, row, col + 1));
                }
                if nrow < 20 && masks.fits(rot, mrow, col + 1) && masks.fits(rot, nrow, col + 1) {
                    if rots >= 2 && masks.fits(arot, nrow, col + 1) {
                        insert(masks.drop_pos(arot, nrow, col + 1));
                    }
                    if rots >= 4 && masks.fits(brot, nrow, col + 1) {
                        insert(masks.drop_pos(brot, nrow, col + 1));
                    }
                }
                #[cfg(feature = "double-tuck")]
                {
                    let n2row = row_of(self.level, frame + 2);
                    let m2row = if n2row - nrow == 2 { n2row - 1 } else { n2row };
                    if n2row < 20
                        && col < 8
                        && masks.fits(rot, mrow, col + 1)
                        && masks.fits(rot, nrow, col + 1)
                        && masks.fits(rot, m2row, col + 1)
                        && masks.fits(rot, n2row, col + 1)
                        && masks.fits(rot, n2row, col + 2)
                    {
                        insert(masks.drop_pos(rot, n2row, col + 2));
                    }
                }
            }
            if col > 0 && masks.fits(rot, row, col - 1) {
                insert(masks.drop_pos(rot, row, col - 1));
                if rots >= 2 && masks.fits(arot, row, col - 1) {
                    insert(masks.drop_pos(arot, row, col - 1));
                }
                if rots >= 4 && masks.fits(brot, row, col - 1) {
                    insert(masks.drop_pos(brot, row, col - 1));
                }
                if nrow < 20 && masks.fits(rot, mrow, col - 1) && masks.fits(rot, nrow, col - 1) {
                    if rots >= 2 && masks.fits(arot, nrow, col - 1) {
                        insert(masks.drop_pos(arot, nrow, col - 1));
                    }
                    if rots >= 4 && masks.fits(brot, nrow, col - 1) {
                        insert(masks.drop_pos(brot, nrow, col - 1));
                    }
                }
                #[cfg(feature = "double-tuck")]
                {
                    let n2row = row_of(self.level, frame + 2);
                    let m2row = if n2row - nrow == 2 { n2row - 1 } else { n2row };
                    if n2row < 20
                        && col > 1
                        && masks.fits(rot, mrow, col - 1)
                        && masks.fits(rot, nrow, col - 1)
                        && masks.fits(rot, m2row, col - 1)
                        && masks.fits(rot, n2row, col - 1)
                        && masks.fits(rot, n2row, col - 2)
                    {
                        insert(masks.drop_pos(rot, n2row, col - 2));
                    }
                }
            }
            if rots >= 2 && masks.fits(arot, row, col) {
                insert(masks.drop_pos(arot, row, col));
                if nrow < 20 && masks.fits(arot, mrow, col) && masks.fits(arot, nrow, col) {
                    if col < 9 && masks.fits(arot, nrow, col + 1) {
                        insert(masks.drop_pos(arot, nrow, col + 1));
                    }
                    if col > 0 && masks.fits(arot, nrow, col - 1) {
                        insert(masks.drop_pos(arot, nrow, col - 1));
                    }
                }
            }
            if rots >= 4 && masks.fits(brot, row, col) {
                insert(masks.drop_pos(brot, row, col));
                if nrow < 20 && masks.fits(brot, mrow, col) && masks.fits(brot, nrow, col) {
                    if col < 9 && masks.fits(brot, nrow, col + 1) {
                        insert(masks.drop_pos(brot, nrow, col + 1));
                    }
                    if col > 0 && masks.fits(brot, nrow, col - 1) {
                        insert(masks.drop_pos(brot, nrow, col - 1));
                    }
                }
            }

            if is_drop_frame(self.level, frame) {
                if row + 1 >= 20 || !masks.fits(rot, row + 1, col) {
                    break;
                }
                if self.level == Level::Level39 && (row + 2 >= 20 || !masks.fits(rot, row + 2, col))
                {
                    break;
                }
            }
            frame += 1;
        }

        locked.extend(tucks);
    }

    /// Enumerate every input plan from one start state.
    #[allow(clippy::too_many_arguments)]
    fn sweep(
        &self,
        start_rot: usize,
        start_col: i32,
        start_frame: i32,
        end_frame: i32,
        max_lr: i32,
        max_ab: i32,
        check_tuck: bool,
        non_tuck: &BTreeSet<Position>,
        locked: &mut Vec<Position>,
        mut continues: Option<&mut Vec<(Position, i32)>>,
    ) {
        if !self.masks.fits(start_rot, row_of(self.level, start_frame), start_col) {
            return;
        }
        for lr in 0..=max_lr {
            for ab in 0..=max_ab {
                for (is_l, is_a) in [(false, false), (true, false), (false, true), (true, true)] {
                    self.run(
                        start_rot,
                        start_col,
                        start_frame,
                        end_frame,
                        lr,
                        ab,
                        is_l,
                        is_a,
                        check_tuck,
                        non_tuck,
                        locked,
                        continues.as_deref_mut(),
                    );
                }
            }
        }
    }
}

/// Every placement reachable by legal input for `piece` on `board`, split
/// into pre-boundary commitments and adjustment entries. Empty output means
/// the spawn cell is blocked (top-out).
pub fn move_search(
    tables: &SearchTables,
    level: Level,
    board: &Board,
    piece: Piece,
) -> PossibleMoves {
    let masks = PieceMasks::new(board, piece);
    let sim = Sim {
        masks: &masks,
        level,
        taps: &tables.taps,
        tap_row: &tables.tap_row[level.idx()],
    };
    let mut moves = PossibleMoves::default();
    let empty = BTreeSet::new();

    let start = Position::START;
    let (max_lr, max_ab) = if tables.adj_delay == 0 { (0, 0) } else { (9, 2) };

    // Placements reachable during the plain fall, used to tell tucks apart.
    let mut plain = Vec::new();
    sim.sweep(
        start.r as usize,
        start.y,
        0,
        SEARCH_END_FRAME,
        max_lr,
        max_ab,
        false,
        &empty,
        &mut plain,
        None,
    );
    let non_tuck: BTreeSet<Position> = plain.into_iter().collect();

    let mut starts: Vec<(Position, i32)> = Vec::new();
    sim.sweep(
        start.r as usize,
        start.y,
        0,
        tables.adj_delay,
        max_lr,
        max_ab,
        true,
        &non_tuck,
        &mut moves.non_adj,
        Some(&mut starts),
    );
    moves.non_adj.sort();
    moves.non_adj.dedup();
    starts.sort();
    starts.dedup();

    for (pos, frame) in starts {
        let mut plain = Vec::new();
        sim.sweep(
            pos.r as usize,
            pos.y,
            frame,
            SEARCH_END_FRAME,
            9,
            2,
            false,
            &empty,
            &mut plain,
            None,
        );
        let reachable: BTreeSet<Position> = plain.into_iter().collect();
        let mut finals = Vec::new();
        sim.sweep(
            pos.r as usize,
            pos.y,
            frame,
            SEARCH_END_FRAME,
            9,
            2,
            true,
            &reachable,
            &mut finals,
            None,
        );
        finals.sort();
        finals.dedup();
        moves.adj.push((pos, finals));
    }
    moves
}

/// Adjustment initials with the frame each one resumes at. Used by the frame
/// sequence generator to anchor the post-adjustment half of a plan.
pub(crate) fn adjustment_starts(
    tables: &SearchTables,
    level: Level,
    board: &Board,
    piece: Piece,
) -> Vec<(Position, i32)> {
    let masks = PieceMasks::new(board, piece);
    let sim = Sim {
        masks: &masks,
        level,
        taps: &tables.taps,
        tap_row: &tables.tap_row[level.idx()],
    };
    let empty = BTreeSet::new();
    let (max_lr, max_ab) = if tables.adj_delay == 0 { (0, 0) } else { (9, 2) };
    let mut sink = Vec::new();
    let mut starts = Vec::new();
    sim.sweep(
        Position::START.r as usize,
        Position::START.y,
        0,
        tables.adj_delay,
        max_lr,
        max_ab,
        false,
        &empty,
        &mut sink,
        Some(&mut starts),
    );
    starts.sort();
    starts.dedup();
    starts
}
