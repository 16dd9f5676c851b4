// engine/src/engine/frames.rs
#![forbid(unsafe_code)]

/*
Frame-accurate controller encodings.

A frame sequence is one byte per frame, each a bitfield of the inputs held on
that frame. Generation re-enumerates input plans in the same order as the
move search and renders the first plan whose landing matches the target, so a
generated sequence always replays to its target.
*/

use rustc_hash::FxHashMap;

use crate::engine::board::Board;
use crate::engine::level::Level;
use crate::engine::pieces::Piece;
use crate::engine::position::Position;
use crate::engine::search::{
    PieceMasks, PossibleMoves, SEARCH_END_FRAME, SearchTables, adjustment_starts, is_drop_frame,
    row_of,
};
use crate::engine::taps::TapTable;

/// Controller bits.
pub mod input {
    pub const LEFT: u8 = 1;
    pub const RIGHT: u8 = 2;
    /// A button, one clockwise rotation step.
    pub const A: u8 = 4;
    /// B button, one counterclockwise rotation step.
    pub const B: u8 = 8;
}

pub type FrameSequence = Vec<u8>;

/// First frame whose row is past the floor; no fall survives this long.
fn max_fall_frame(level: Level) -> i32 {
    match level {
        Level::Level18 => 60,
        Level::Level19 => 40,
        Level::Level29 => 20,
        Level::Level39 => 10,
    }
}

fn rotate(rot: usize, rots: usize, cw: bool) -> usize {
    if cw { (rot + 1) % rots } else { (rot + rots - 1) % rots }
}

/// Apply a whole input byte atomically; collision is checked by the caller on
/// the result only (matching how tucked combinations behave).
fn apply_byte(rot: usize, col: i32, rots: usize, byte: u8) -> Option<(usize, i32)> {
    let mut rot = rot;
    let mut col = col;
    if byte & input::LEFT != 0 {
        col -= 1;
    }
    if byte & input::RIGHT != 0 {
        col += 1;
    }
    if !(0..10).contains(&col) {
        return None;
    }
    if byte & input::A != 0 {
        if rots < 2 {
            return None;
        }
        rot = rotate(rot, rots, true);
    }
    if byte & input::B != 0 {
        if rots < 4 {
            return None;
        }
        rot = rotate(rot, rots, false);
    }
    Some((rot, col))
}

#[derive(Clone, Copy, Debug)]
struct Tuck {
    frame: i32,
    first: u8,
    /// Zero when the tuck is a single input.
    second: u8,
    gap: i32,
}

#[derive(Clone, Copy, Debug)]
struct Plan {
    lr: i32,
    ab: i32,
    is_l: bool,
    is_a: bool,
    tuck: Option<Tuck>,
}

struct SeqCtx<'a> {
    masks: &'a PieceMasks,
    level: Level,
    taps: &'a TapTable,
}

impl SeqCtx<'_> {
    /// Landing position and input schedule of one concrete plan, or None if
    /// any input collides or the tuck timing is impossible.
    fn plan_landing(
        &self,
        start_rot: usize,
        start_col: i32,
        start_frame: i32,
        plan: Plan,
    ) -> Option<(Position, Vec<(i32, u8)>)> {
        let masks = self.masks;
        let rots = masks.rots();
        if plan.is_l && plan.lr > start_col {
            return None;
        }
        if !plan.is_l && plan.lr > 9 - start_col {
            return None;
        }
        if plan.is_a && plan.ab > (rots / 2) as i32 {
            return None;
        }
        if !plan.is_a && plan.ab > ((rots - 1) / 2) as i32 {
            return None;
        }
        if !masks.fits(start_rot, row_of(self.level, start_frame), start_col) {
            return None;
        }

        let mut rot = start_rot;
        let mut col = start_col;
        let mut schedule: Vec<(i32, u8)> = Vec::new();
        let tot = plan.lr.max(plan.ab);
        let mut prev_row = row_of(self.level, start_frame);

        for tap in 0..tot {
            let f = start_frame + self.taps[tap as usize];
            let r = row_of(self.level, f);
            if r >= 20 || !masks.clear_range(rot, col, prev_row, r) {
                return None;
            }
            let mut byte = 0u8;
            let t = tap + 1;
            if t <= plan.lr {
                byte |= if plan.is_l { input::LEFT } else { input::RIGHT };
                col += if plan.is_l { -1 } else { 1 };
                if !masks.fits(rot, r, col) {
                    return None;
                }
            }
            if t <= plan.ab {
                byte |= if plan.is_a { input::A } else { input::B };
                rot = rotate(rot, rots, plan.is_a);
                if !masks.fits(rot, r, col) {
                    return None;
                }
            }
            schedule.push((f, byte));
            prev_row = r;
        }

        let slot_frame = start_frame + self.taps[tot as usize];
        let slot_row = row_of(self.level, slot_frame);
        let (reached, row) = masks.free_drop(rot, col, prev_row, slot_row);
        if !reached {
            // Locked before another input was possible.
            if plan.tuck.is_some() {
                return None;
            }
            return Some((Position::new(rot as i32, row, col), schedule));
        }

        let Some(t) = plan.tuck else {
            return Some((masks.drop_pos(rot, row, col), schedule));
        };

        let support = masks.drop_pos(rot, row, col).x;
        let tr = row_of(self.level, t.frame);
        if t.frame < slot_frame || tr > support {
            return None;
        }
        let (r1, c1) = apply_byte(rot, col, rots, t.first)?;
        if !masks.fits(r1, tr, c1) {
            return None;
        }
        schedule.push((t.frame, t.first));
        if t.second == 0 {
            return Some((masks.drop_pos(r1, tr, c1), schedule));
        }
        let nf = t.frame + t.gap;
        let nr = row_of(self.level, nf);
        if nr >= 20 || !masks.clear_range(r1, c1, tr, nr) {
            return None;
        }
        let (r2, c2) = apply_byte(r1, c1, rots, t.second)?;
        if !masks.fits(r2, nr, c2) {
            return None;
        }
        schedule.push((nf, t.second));
        Some((masks.drop_pos(r2, nr, c2), schedule))
    }

    /// Continue-at-boundary outcome of a tuckless plan: the intermediate
    /// placement and the frame the post-adjustment phase resumes at.
    fn plan_continue(
        &self,
        start_rot: usize,
        start_col: i32,
        start_frame: i32,
        end_frame: i32,
        plan: Plan,
    ) -> Option<(Position, i32, Vec<(i32, u8)>)> {
        debug_assert!(plan.tuck.is_none());
        let masks = self.masks;
        let rots = masks.rots();
        if plan.is_l && plan.lr > start_col {
            return None;
        }
        if !plan.is_l && plan.lr > 9 - start_col {
            return None;
        }
        if plan.is_a && plan.ab > (rots / 2) as i32 {
            return None;
        }
        if !plan.is_a && plan.ab > ((rots - 1) / 2) as i32 {
            return None;
        }
        if !masks.fits(start_rot, row_of(self.level, start_frame), start_col) {
            return None;
        }

        let mut rot = start_rot;
        let mut col = start_col;
        let mut schedule: Vec<(i32, u8)> = Vec::new();
        let tot = plan.lr.max(plan.ab);
        let mut prev_row = row_of(self.level, start_frame);
        for tap in 0..tot {
            let f = start_frame + self.taps[tap as usize];
            let r = row_of(self.level, f);
            if r >= 20 || !masks.clear_range(rot, col, prev_row, r) {
                return None;
            }
            let mut byte = 0u8;
            let t = tap + 1;
            if t <= plan.lr {
                byte |= if plan.is_l { input::LEFT } else { input::RIGHT };
                col += if plan.is_l { -1 } else { 1 };
                if !masks.fits(rot, r, col) {
                    return None;
                }
            }
            if t <= plan.ab {
                byte |= if plan.is_a { input::A } else { input::B };
                rot = rotate(rot, rots, plan.is_a);
                if !masks.fits(rot, r, col) {
                    return None;
                }
            }
            schedule.push((f, byte));
            prev_row = r;
        }
        let slot_frame = start_frame + self.taps[tot as usize];
        let slot_row = row_of(self.level, slot_frame);
        let (reached, row) = masks.free_drop(rot, col, prev_row, slot_row);
        if !reached {
            return None;
        }
        let (still_falling, rest) = masks.free_drop(rot, col, row, row_of(self.level, end_frame));
        if !still_falling {
            return None;
        }
        Some((
            Position::new(rot as i32, rest, col),
            end_frame.max(slot_frame),
            schedule,
        ))
    }

    fn tuck_variants(&self) -> Vec<(u8, u8, i32)> {
        let rots = self.masks.rots();
        let mut out: Vec<(u8, u8, i32)> = vec![(input::LEFT, 0, 0), (input::RIGHT, 0, 0)];
        if rots >= 2 {
            out.push((input::A, 0, 0));
            out.push((input::LEFT | input::A, 0, 0));
            out.push((input::RIGHT | input::A, 0, 0));
            out.push((input::LEFT, input::A, 1));
            out.push((input::RIGHT, input::A, 1));
            out.push((input::A, input::LEFT, 1));
            out.push((input::A, input::RIGHT, 1));
        }
        if rots >= 4 {
            out.push((input::B, 0, 0));
            out.push((input::LEFT | input::B, 0, 0));
            out.push((input::RIGHT | input::B, 0, 0));
            out.push((input::LEFT, input::B, 1));
            out.push((input::RIGHT, input::B, 1));
            out.push((input::B, input::LEFT, 1));
            out.push((input::B, input::RIGHT, 1));
        }
        #[cfg(feature = "double-tuck")]
        {
            out.push((input::LEFT, input::LEFT, 2));
            out.push((input::RIGHT, input::RIGHT, 2));
        }
        out
    }

    /// Fewest button presses of any plan landing exactly on `target`.
    fn min_inputs(
        &self,
        start_rot: usize,
        start_col: i32,
        start_frame: i32,
        end_frame: i32,
        target: Position,
    ) -> Option<i32> {
        let combos = [(false, false), (true, false), (false, true), (true, true)];
        let mut best: Option<i32> = None;
        for lr in 0..=9 {
            for ab in 0..=2 {
                for (is_l, is_a) in combos {
                    if (is_l && lr == 0) || (is_a && ab == 0) {
                        continue;
                    }
                    if best.is_some_and(|b| lr + ab >= b) {
                        continue;
                    }
                    let plan = Plan {
                        lr,
                        ab,
                        is_l,
                        is_a,
                        tuck: None,
                    };
                    if let Some((pos, _)) =
                        self.plan_landing(start_rot, start_col, start_frame, plan)
                        && pos == target
                    {
                        best = Some(lr + ab);
                    }
                }
            }
        }
        let variants = self.tuck_variants();
        let frame_cap = end_frame.min(start_frame + max_fall_frame(self.level));
        for lr in 0..=9 {
            for ab in 0..=2 {
                for (is_l, is_a) in combos {
                    if (is_l && lr == 0) || (is_a && ab == 0) {
                        continue;
                    }
                    if best.is_some_and(|b| lr + ab + 1 >= b) {
                        continue;
                    }
                    for frame in start_frame..frame_cap {
                        for &(first, second, gap) in &variants {
                            let inputs = lr + ab + 1 + (second != 0) as i32;
                            if best.is_some_and(|b| inputs >= b) {
                                continue;
                            }
                            let plan = Plan {
                                lr,
                                ab,
                                is_l,
                                is_a,
                                tuck: Some(Tuck {
                                    frame,
                                    first,
                                    second,
                                    gap,
                                }),
                            };
                            if let Some((pos, _)) =
                                self.plan_landing(start_rot, start_col, start_frame, plan)
                                && pos == target
                            {
                                best = Some(inputs);
                            }
                        }
                    }
                }
            }
        }
        best
    }

    /// First plan (search enumeration order, tuckless before tucked) landing
    /// exactly on `target`.
    fn find(
        &self,
        start_rot: usize,
        start_col: i32,
        start_frame: i32,
        end_frame: i32,
        target: Position,
    ) -> Option<Vec<(i32, u8)>> {
        let combos = [(false, false), (true, false), (false, true), (true, true)];
        for lr in 0..=9 {
            for ab in 0..=2 {
                for (is_l, is_a) in combos {
                    if (is_l && lr == 0) || (is_a && ab == 0) {
                        continue;
                    }
                    let plan = Plan {
                        lr,
                        ab,
                        is_l,
                        is_a,
                        tuck: None,
                    };
                    if let Some((pos, sched)) =
                        self.plan_landing(start_rot, start_col, start_frame, plan)
                        && pos == target
                    {
                        return Some(sched);
                    }
                }
            }
        }
        let variants = self.tuck_variants();
        let frame_cap = end_frame.min(start_frame + max_fall_frame(self.level));
        for lr in 0..=9 {
            for ab in 0..=2 {
                for (is_l, is_a) in combos {
                    if (is_l && lr == 0) || (is_a && ab == 0) {
                        continue;
                    }
                    for frame in start_frame..frame_cap {
                        for &(first, second, gap) in &variants {
                            let plan = Plan {
                                lr,
                                ab,
                                is_l,
                                is_a,
                                tuck: Some(Tuck {
                                    frame,
                                    first,
                                    second,
                                    gap,
                                }),
                            };
                            if let Some((pos, sched)) =
                                self.plan_landing(start_rot, start_col, start_frame, plan)
                                && pos == target
                            {
                                return Some(sched);
                            }
                        }
                    }
                }
            }
        }
        None
    }
}

fn render(schedule: &[(i32, u8)]) -> FrameSequence {
    let Some(&(last, _)) = schedule.last() else {
        return Vec::new();
    };
    let mut seq = vec![0u8; last as usize + 1];
    for &(f, b) in schedule {
        seq[f as usize] |= b;
    }
    seq
}

fn extend_with(seq: &mut FrameSequence, schedule: &[(i32, u8)]) {
    if let Some(&(last, _)) = schedule.last() {
        if seq.len() <= last as usize {
            seq.resize(last as usize + 1, 0);
        }
        for &(f, b) in schedule {
            seq[f as usize] |= b;
        }
    }
}

/// Canonical input sequence reaching `pos` from spawn. Placements inside the
/// pre-adjustment window are preferred; unreachable targets yield an empty
/// sequence.
pub fn frame_sequence_start(
    level: Level,
    taps: &TapTable,
    board: &Board,
    piece: Piece,
    adj_delay: i32,
    pos: Position,
) -> FrameSequence {
    let masks = PieceMasks::new(board, piece);
    let ctx = SeqCtx {
        masks: &masks,
        level,
        taps,
    };
    let start = Position::START;
    ctx.find(start.r as usize, start.y, 0, adj_delay, pos)
        .or_else(|| ctx.find(start.r as usize, start.y, 0, SEARCH_END_FRAME, pos))
        .map(|s| render(&s))
        .unwrap_or_default()
}

/// Append the post-adjustment inputs taking `intermediate` to `final_pos`
/// onto a premove sequence.
pub fn finish_adj_sequence(
    tables: &SearchTables,
    level: Level,
    board: &Board,
    piece: Piece,
    seq: &mut FrameSequence,
    intermediate: Position,
    final_pos: Position,
) {
    let starts = adjustment_starts(tables, level, board, piece);
    let (_, frame) = *starts
        .iter()
        .find(|(p, _)| *p == intermediate)
        .expect("intermediate is not an adjustment initial");
    let masks = PieceMasks::new(board, piece);
    let ctx = SeqCtx {
        masks: &masks,
        level,
        taps: &tables.taps,
    };
    let sched = ctx
        .find(
            intermediate.r as usize,
            intermediate.y,
            frame,
            SEARCH_END_FRAME,
            final_pos,
        )
        .expect("final placement unreachable from the adjustment initial");
    extend_with(seq, &sched);
}

/// Choose the adjustment initial best covering one target placement per next
/// piece, and the premove sequence realizing it. Cost per target is the
/// squared minimum number of post-adjustment button presses that reach it,
/// with a large penalty for targets outside the initial's reachable set; the
/// lowest total wins, first entry on ties.
pub fn best_adj(
    tables: &SearchTables,
    level: Level,
    board: &Board,
    piece: Piece,
    moves: &PossibleMoves,
    targets: &[Position; 7],
) -> (usize, FrameSequence) {
    assert!(!moves.adj.is_empty(), "no adjustment initials");
    const UNREACHABLE: i64 = 1_000_000;

    let masks = PieceMasks::new(board, piece);
    let ctx = SeqCtx {
        masks: &masks,
        level,
        taps: &tables.taps,
    };
    let starts = adjustment_starts(tables, level, board, piece);
    let frame_of = |p: Position| {
        starts
            .iter()
            .find(|(q, _)| *q == p)
            .map(|&(_, f)| f)
            .expect("initial missing from the adjustment starts")
    };

    let mut best = 0usize;
    let mut best_cost = i64::MAX;
    for (i, (initial, finals)) in moves.adj.iter().enumerate() {
        let frame = frame_of(*initial);
        let mut cost = 0i64;
        for t in targets {
            if finals.contains(t)
                && let Some(n) = ctx.min_inputs(
                    initial.r as usize,
                    initial.y,
                    frame,
                    SEARCH_END_FRAME,
                    *t,
                )
            {
                cost += (n as i64) * (n as i64);
            } else {
                cost += UNREACHABLE;
            }
            if cost >= best_cost {
                break;
            }
        }
        if cost < best_cost {
            best_cost = cost;
            best = i;
        }
    }

    let target = moves.adj[best].0;
    let start = Position::START;
    let combos = [(false, false), (true, false), (false, true), (true, true)];
    for lr in 0..=9 {
        for ab in 0..=2 {
            for (is_l, is_a) in combos {
                if (is_l && lr == 0) || (is_a && ab == 0) {
                    continue;
                }
                let plan = Plan {
                    lr,
                    ab,
                    is_l,
                    is_a,
                    tuck: None,
                };
                if let Some((pos, _, sched)) =
                    ctx.plan_continue(start.r as usize, start.y, 0, tables.adj_delay, plan)
                    && pos == target
                {
                    return (best, render(&sched));
                }
            }
        }
    }
    unreachable!("adjustment initial has no realizing premove plan");
}

/// Frame-accurate playback of a sequence from spawn; panics on a sequence
/// that steers into a blocked cell. Returns the resting placement.
pub fn replay(board: &Board, piece: Piece, level: Level, seq: &[u8]) -> Position {
    let masks = PieceMasks::new(board, piece);
    let rots = masks.rots();
    let mut rot = Position::START.r as usize;
    let mut col = Position::START.y;
    assert!(masks.fits(rot, 0, col), "spawn cell blocked");
    let mut frame = 0i32;
    loop {
        let row = row_of(level, frame);
        if let Some(&byte) = seq.get(frame as usize)
            && byte != 0
        {
            let (nr, nc) = apply_byte(rot, col, rots, byte).expect("invalid input byte");
            assert!(masks.fits(nr, row, nc), "input into a blocked cell");
            rot = nr;
            col = nc;
        }
        if is_drop_frame(level, frame) {
            if !masks.fits(rot, row + 1, col) {
                return Position::new(rot as i32, row, col);
            }
            if level == Level::Level39 && !masks.fits(rot, row + 2, col) {
                return Position::new(rot as i32, row + 1, col);
            }
        }
        frame += 1;
    }
}

/// Canonical NORO input sequence realizing `target`: a shortest tap path in
/// the row-by-row search graph, with the j-th tap of a row placed two frames
/// after the previous one.
pub fn frame_sequence_noro(
    board: &Board,
    piece: Piece,
    inputs_per_row: i32,
    do_tuck: bool,
    frames_per_row: i32,
    target: Position,
) -> FrameSequence {
    type State = (i32, i32, i32, i32); // (committed dir, taps used, row, col)
    let fit = board.piece_map(piece)[0];
    let fits = |x: i32, y: i32| (0..20).contains(&x) && (0..10).contains(&y) && {
        fit.cell(x as usize, y as usize)
    };

    let mut parent: FxHashMap<State, (State, Option<u8>)> = FxHashMap::default();
    let mut queue: std::collections::VecDeque<State> = std::collections::VecDeque::new();
    let push = |st: State,
                from: Option<(State, Option<u8>)>,
                    parent: &mut FxHashMap<State, (State, Option<u8>)>,
                    queue: &mut std::collections::VecDeque<State>| {
        if !fits(st.2, st.3) || parent.contains_key(&st) {
            return;
        }
        parent.insert(st, from.unwrap_or((st, None)));
        queue.push_back(st);
    };

    // Spawn states, including the pre-charged tap at columns 4/6.
    if do_tuck {
        push((0, 0, 0, 5), None, &mut parent, &mut queue);
        push((0, 1, 0, 4), Some(((0, 0, 0, 5), Some(input::LEFT))), &mut parent, &mut queue);
        push((0, 1, 0, 6), Some(((0, 0, 0, 5), Some(input::RIGHT))), &mut parent, &mut queue);
    } else {
        push((1, 0, 0, 5), None, &mut parent, &mut queue);
        push((2, 0, 0, 5), None, &mut parent, &mut queue);
        push((1, 1, 0, 4), Some(((1, 0, 0, 5), Some(input::LEFT))), &mut parent, &mut queue);
        push((2, 1, 0, 6), Some(((2, 0, 0, 5), Some(input::RIGHT))), &mut parent, &mut queue);
    }

    let mut goal: Option<State> = None;
    while let Some(st) = queue.pop_front() {
        let (s, g, x, y) = st;
        if x == target.x && y == target.y {
            goal = Some(st);
            break;
        }
        if do_tuck {
            if inputs_per_row > 0 {
                if g < inputs_per_row {
                    push((0, g + 1, x, y - 1), Some((st, Some(input::LEFT))), &mut parent, &mut queue);
                    push((0, g + 1, x, y + 1), Some((st, Some(input::RIGHT))), &mut parent, &mut queue);
                }
                push((0, 0, x + 1, y), Some((st, None)), &mut parent, &mut queue);
            } else if g == 1 {
                // Tap used this row; the next row is a cooldown row (g = 2).
                push((0, 2, x + 1, y), Some((st, None)), &mut parent, &mut queue);
            } else {
                if g == 0 {
                    push((0, 1, x, y - 1), Some((st, Some(input::LEFT))), &mut parent, &mut queue);
                    push((0, 1, x, y + 1), Some((st, Some(input::RIGHT))), &mut parent, &mut queue);
                }
                push((0, 0, x + 1, y), Some((st, None)), &mut parent, &mut queue);
            }
        } else {
            let row_taps = if inputs_per_row > 0 {
                inputs_per_row
            } else {
                (x % 2 == 0) as i32
            };
            if g < row_taps {
                if s == 1 {
                    push((1, g + 1, x, y - 1), Some((st, Some(input::LEFT))), &mut parent, &mut queue);
                } else if s == 2 {
                    push((2, g + 1, x, y + 1), Some((st, Some(input::RIGHT))), &mut parent, &mut queue);
                }
            }
            if g == row_taps && s != 0 {
                push((s, 0, x + 1, y), Some((st, None)), &mut parent, &mut queue);
            }
            push((0, 0, x + 1, y), Some((st, None)), &mut parent, &mut queue);
        }
    }

    let Some(mut st) = goal else {
        return Vec::new();
    };
    // Walk back collecting (frame, byte) tap edges.
    let mut schedule: Vec<(i32, u8)> = Vec::new();
    loop {
        let (prev, byte) = parent[&st];
        if prev == st {
            break;
        }
        if let Some(b) = byte {
            // The tap raising taps-used to g happened in row x at slot g-1.
            let (_, g, x, _) = st;
            schedule.push((x * frames_per_row + 2 * (g - 1), b));
        }
        st = prev;
    }
    schedule.sort();
    render(&schedule)
}
