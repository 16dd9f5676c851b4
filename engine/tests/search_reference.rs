// engine/tests/search_reference.rs
#![forbid(unsafe_code)]

/*
Reference-simulator equivalence for the ROT move search.

The reference below walks every input plan frame by frame over plain boolean
fit maps; the production search computes the same sets with column bitmasks
and tap-indexed jumps. The two implementations share no code beyond the piece
tables, so agreement over random boards and every (level, cadence, delay)
combination pins the frame semantics.
*/

use std::collections::BTreeSet;

use proptest::prelude::*;

use nestris_engine::engine::{
    Board, Level, NO_ADJ_DELAY, Piece, Position, PossibleMoves, SEARCH_END_FRAME, SearchTables,
    TAP_12_HZ, TAP_30_HZ, TapTable, move_search, rotations,
};

type FitMap = Vec<[[bool; 10]; 20]>;

const K_FINISH: i32 = SEARCH_END_FRAME;

fn get_piece_map(board: &Board, piece: Piece) -> FitMap {
    rotations(piece)
        .iter()
        .map(|blocks| {
            let mut map = [[false; 10]; 20];
            for x in 0..20i32 {
                for y in 0..10i32 {
                    let ok = blocks.iter().all(|&(dx, dy)| {
                        let nx = x + dx;
                        let ny = y + dy;
                        ny >= 0
                            && ny < 10
                            && nx < 20
                            && (nx < 0 || board.cell(nx as usize, ny as usize))
                    });
                    map[x as usize][y as usize] = ok;
                }
            }
            map
        })
        .collect()
}

fn fit(b: &FitMap, rot: usize, row: i32, col: i32) -> bool {
    (0..20).contains(&row) && (0..10).contains(&col) && b[rot][row as usize][col as usize]
}

fn get_row(level: Level, frame: i32) -> i32 {
    match level {
        Level::Level18 => frame / 3,
        Level::Level19 => frame / 2,
        Level::Level29 => frame,
        Level::Level39 => frame * 2,
    }
}

fn is_drop(level: Level, frame: i32) -> bool {
    match level {
        Level::Level18 => frame % 3 == 2,
        Level::Level19 => frame % 2 == 1,
        _ => true,
    }
}

fn free_drop_max(
    b: &FitMap,
    rot: usize,
    mut row: i32,
    col: i32,
    level: Level,
    max_frame: i32,
) -> (bool, Position) {
    let max_row = get_row(level, max_frame);
    while row < max_row && row < 19 && fit(b, rot, row + 1, col) {
        row += 1;
    }
    (row >= max_row, Position::new(rot as i32, row, col))
}

fn free_drop(b: &FitMap, rot: usize, mut row: i32, col: i32) -> Position {
    while row < 19 && fit(b, rot, row + 1, col) {
        row += 1;
    }
    Position::new(rot as i32, row, col)
}

#[allow(clippy::too_many_arguments)]
fn simulate_move(
    b: &FitMap,
    level: Level,
    taps: &TapTable,
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
    let rots = b.len();
    if is_l && num_lr > start_col {
        return;
    }
    if !is_l && num_lr > 9 - start_col {
        return;
    }
    if is_a && num_ab > (rots / 2) as i32 {
        return;
    }
    if !is_a && num_ab > ((rots - 1) / 2) as i32 {
        return;
    }
    if (is_l && num_lr == 0) || (is_a && num_ab == 0) {
        return;
    }

    let mut rot = start_rot;
    let mut col = start_col;
    let mut frame = start_frame;
    let tot = num_lr.max(num_ab);
    let mut tap = 0;
    while tap < tot {
        let row = get_row(level, frame);
        if row >= 20 || !fit(b, rot, row, col) {
            return;
        }
        if frame == taps[tap as usize] + start_frame {
            tap += 1;
            if tap <= num_lr {
                col += if is_l { -1 } else { 1 };
                if !fit(b, rot, row, col) {
                    return;
                }
            }
            if tap <= num_ab {
                rot = if is_a {
                    (rot + 1) % rots
                } else {
                    (rot + rots - 1) % rots
                };
                if !fit(b, rot, row, col) {
                    return;
                }
            }
            if tap == tot {
                break;
            }
        }
        if is_drop(level, frame) {
            let mut row = row + 1;
            if row >= 20 || !fit(b, rot, row, col) {
                return;
            }
            if level == Level::Level39 {
                row += 1;
                if row >= 20 || !fit(b, rot, row, col) {
                    return;
                }
            }
        }
        frame += 1;
    }

    // Forward to the next allowed input instant.
    let (reached, pos) = free_drop_max(
        b,
        rot,
        get_row(level, frame),
        col,
        level,
        start_frame + taps[tot as usize],
    );
    if !reached {
        locked.push(pos);
        return;
    }
    let mut frame = start_frame + taps[tot as usize];
    // Still falling at the boundary => adjustment initial.
    let (still, pos) = free_drop_max(b, rot, get_row(level, frame), col, level, end_frame);
    if still {
        if let Some(out) = continues.as_deref_mut() {
            out.push((pos, end_frame.max(frame)));
        }
    } else {
        locked.push(pos);
    }

    if !check_tuck {
        return;
    }
    let mut tucks: BTreeSet<Position> = BTreeSet::new();
    let mut insert = |p: Position| {
        if !non_tuck.contains(&p) {
            tucks.insert(p);
        }
    };
    while frame < end_frame {
        let row = get_row(level, frame);
        if row >= 20 || !fit(b, rot, row, col) {
            break;
        }
        let nrow = get_row(level, frame + 1);
        let mrow = if nrow - row == 2 { nrow - 1 } else { nrow };
        let arot = (rot + 1) % rots;
        let brot = (rot + rots - 1) % rots;
        if col < 9 && fit(b, rot, row, col + 1) {
            insert(free_drop(b, rot, row, col + 1));
            if rots >= 2 && fit(b, arot, row, col + 1) {
                insert(free_drop(b, arot, row, col + 1));
            }
            if rots >= 4 && fit(b, brot, row, col + 1) {
                insert(free_drop(b, brot, row, col + 1));
            }
            if nrow < 20 && fit(b, rot, mrow, col + 1) && fit(b, rot, nrow, col + 1) {
                if rots >= 2 && fit(b, arot, nrow, col + 1) {
                    insert(free_drop(b, arot, nrow, col + 1));
                }
                if rots >= 4 && fit(b, brot, nrow, col + 1) {
                    insert(free_drop(b, brot, nrow, col + 1));
                }
            }
        }
        if col > 0 && fit(b, rot, row, col - 1) {
            insert(free_drop(b, rot, row, col - 1));
            if rots >= 2 && fit(b, arot, row, col - 1) {
                insert(free_drop(b, arot, row, col - 1));
            }
            if rots >= 4 && fit(b, brot, row, col - 1) {
                insert(free_drop(b, brot, row, col - 1));
            }
            if nrow < 20 && fit(b, rot, mrow, col - 1) && fit(b, rot, nrow, col - 1) {
                if rots >= 2 && fit(b, arot, nrow, col - 1) {
                    insert(free_drop(b, arot, nrow, col - 1));
                }
                if rots >= 4 && fit(b, brot, nrow, col - 1) {
                    insert(free_drop(b, brot, nrow, col - 1));
                }
            }
        }
        if rots >= 2 && fit(b, arot, row, col) {
            insert(free_drop(b, arot, row, col));
            if nrow < 20 && fit(b, arot, mrow, col) && fit(b, arot, nrow, col) {
                if col < 9 && fit(b, arot, nrow, col + 1) {
                    insert(free_drop(b, arot, nrow, col + 1));
                }
                if col > 0 && fit(b, arot, nrow, col - 1) {
                    insert(free_drop(b, arot, nrow, col - 1));
                }
            }
        }
        if rots >= 4 && fit(b, brot, row, col) {
            insert(free_drop(b, brot, row, col));
            if nrow < 20 && fit(b, brot, mrow, col) && fit(b, brot, nrow, col) {
                if col < 9 && fit(b, brot, nrow, col + 1) {
                    insert(free_drop(b, brot, nrow, col + 1));
                }
                if col > 0 && fit(b, brot, nrow, col - 1) {
                    insert(free_drop(b, brot, nrow, col - 1));
                }
            }
        }
        if is_drop(level, frame) {
            let mut row = row + 1;
            if row >= 20 || !fit(b, rot, row, col) {
                break;
            }
            if level == Level::Level39 {
                row += 1;
                if row >= 20 || !fit(b, rot, row, col) {
                    break;
                }
            }
        }
        frame += 1;
    }
    locked.extend(tucks);
}

#[allow(clippy::too_many_arguments)]
fn reference_search(
    b: &FitMap,
    level: Level,
    taps: &TapTable,
    max_lr: i32,
    max_ab: i32,
    start_rot: usize,
    start_col: i32,
    start_frame: i32,
    end_frame: i32,
    check_tuck: bool,
    non_tuck: &BTreeSet<Position>,
    locked: &mut Vec<Position>,
    mut continues: Option<&mut Vec<(Position, i32)>>,
) {
    if !fit(b, start_rot, get_row(level, start_frame), start_col) {
        return;
    }
    for lr in 0..=max_lr {
        for ab in 0..=max_ab {
            for (is_l, is_a) in [(false, false), (true, false), (false, true), (true, true)] {
                simulate_move(
                    b,
                    level,
                    taps,
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

fn reference_possible_moves(
    board: &Board,
    piece: Piece,
    level: Level,
    adj_frame: i32,
    taps: &TapTable,
) -> PossibleMoves {
    let b = get_piece_map(board, piece);
    let mut ret = PossibleMoves::default();
    let empty = BTreeSet::new();

    let (max_lr, max_ab) = if adj_frame == 0 { (0, 0) } else { (9, 2) };
    let mut plain = Vec::new();
    reference_search(
        &b, level, taps, max_lr, max_ab, 0, 5, 0, K_FINISH, false, &empty, &mut plain, None,
    );
    let non_tuck: BTreeSet<Position> = plain.into_iter().collect();
    let mut starts: Vec<(Position, i32)> = Vec::new();
    reference_search(
        &b,
        level,
        taps,
        max_lr,
        max_ab,
        0,
        5,
        0,
        adj_frame,
        true,
        &non_tuck,
        &mut ret.non_adj,
        Some(&mut starts),
    );
    starts.sort();
    starts.dedup();
    for (pos, frame) in starts {
        let mut plain = Vec::new();
        reference_search(
            &b, level, taps, 9, 2, pos.r as usize, pos.y, frame, K_FINISH, false, &empty,
            &mut plain, None,
        );
        let set: BTreeSet<Position> = plain.into_iter().collect();
        let mut finals = Vec::new();
        reference_search(
            &b, level, taps, 9, 2, pos.r as usize, pos.y, frame, K_FINISH, true, &set,
            &mut finals, None,
        );
        ret.adj.push((pos, finals));
    }
    ret.normalize();
    ret
}

// ---------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------

fn test_boards() -> Vec<Board> {
    vec![
        Board::ONES,
        Board::from_ascii("....X.....\n.....X...."),
        Board::from_ascii(concat!(
            "..........\n",
            "X.........\n",
            "XX.......X\n",
            "XXX....XXX\n",
            "XXXX..XXXX\n",
        )),
        Board::from_ascii(concat!(
            "..........\n",
            ".......XX.\n",
            "..X.....X.\n",
            "..XX....X.\n",
            "X.XXX..XXX\n",
            "X.XXXX.XXX\n",
        )),
        Board::from_ascii(concat!(
            "XXXX......\n",
            "X.........\n",
            "X........X\n",
            "X.XXXXXXXX\n",
            "X.XXXXXXXX\n",
            "XXXXXXXXX.\n",
        )),
    ]
}

fn compare_all(board: &Board, taps: &TapTable, adj_delay: i32) {
    let tables = SearchTables::get(taps, adj_delay);
    for level in Level::all() {
        for piece in Piece::all() {
            let mut got = move_search(tables, level, board, piece);
            got.normalize();
            let want = reference_possible_moves(board, piece, level, adj_delay, taps);
            assert_eq!(
                got, want,
                "mismatch: piece={piece:?} level={level:?} adj={adj_delay}\n{board}"
            );
        }
    }
}

#[test]
fn matches_reference_on_fixture_boards_30hz() {
    for board in test_boards() {
        compare_all(&board, &TAP_30_HZ, 18);
        compare_all(&board, &TAP_30_HZ, 0);
        compare_all(&board, &TAP_30_HZ, NO_ADJ_DELAY);
    }
}

#[test]
fn matches_reference_on_fixture_boards_12hz() {
    for board in test_boards() {
        compare_all(&board, &TAP_12_HZ, 21);
    }
}

#[test]
fn zero_adj_initial_covers_the_no_adjustment_search() {
    for board in test_boards() {
        for level in Level::all() {
            for piece in Piece::all() {
                let t0 = SearchTables::get(&TAP_30_HZ, 0);
                let t61 = SearchTables::get(&TAP_30_HZ, NO_ADJ_DELAY);
                let mut m = move_search(t0, level, &board, piece);
                m.normalize();
                let mut m_noadj = move_search(t61, level, &board, piece);
                m_noadj.normalize();

                let start = m
                    .adj
                    .iter()
                    .find(|(p, _)| p.r == Position::START.r && p.y == Position::START.y);
                match start {
                    Some((_, finals)) => {
                        assert_eq!(&m_noadj.non_adj, finals, "piece={piece:?} level={level:?}")
                    }
                    None => assert!(m_noadj.non_adj.is_empty()),
                }
            }
        }
    }
}

fn board_strategy() -> impl Strategy<Value = Board> {
    (
        prop::collection::vec(0u32..=10, 10),
        prop::collection::vec(any::<u8>(), 10 * 12),
    )
        .prop_map(|(heights, noise)| {
            let mut grid = [[1u8; 10]; 20];
            for (y, &h) in heights.iter().enumerate() {
                for k in 0..h as usize {
                    let x = 19 - k;
                    // Sparse holes keep the stacks jagged but playable.
                    let hole = noise[(x % 12) * 10 + y] < 32;
                    grid[x][y] = hole as u8;
                }
            }
            Board::from_byte_board(&grid)
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn matches_reference_on_random_boards(
        board in board_strategy(),
        piece_idx in 0usize..7,
        level_idx in 0usize..4,
        use_12hz in any::<bool>(),
        adj_choice in 0usize..4,
    ) {
        let piece = Piece::from_idx(piece_idx).unwrap();
        let level = Level::from_idx(level_idx);
        let taps = if use_12hz { TAP_12_HZ } else { TAP_30_HZ };
        let adj_delay = [0, 18, 24, NO_ADJ_DELAY][adj_choice];
        let tables = SearchTables::get(&taps, adj_delay);
        let mut got = move_search(tables, level, &board, piece);
        got.normalize();
        let want = reference_possible_moves(&board, piece, level, adj_delay, &taps);
        prop_assert_eq!(got, want);
    }
}
