// engine/src/engine/search_noro.rs
#![forbid(unsafe_code)]

/*
No-rotation move search.

The piece falls row by row in its spawn rotation; each row allows up to
`inputs_per_row` lateral taps (at zero inputs per row a single tap is allowed
on every other row). With tucking enabled taps may mix directions freely;
without it the piece either taps at full cadence in one direction or commits
to a straight drop, so a left-only and a right-only pass are searched and
merged. The output board marks every cell the piece can come to rest on.
*/

use crate::engine::board::Board;
use crate::engine::pieces::Piece;

/// Lateral inputs available per row, indexed by the NORO speed bucket.
pub const INPUTS_PER_ROW: [i32; 15] = [9, 9, 9, 9, 8, 7, 6, 5, 4, 3, 2, 2, 1, 1, 0];

type Fit = [[bool; 10]; 20];
type Vis = Vec<[[bool; 10]; 20]>;

fn fit_map(board: &Board, piece: Piece) -> Fit {
    let map = &board.piece_map(piece)[0];
    let mut fit = [[false; 10]; 20];
    for (x, row) in fit.iter_mut().enumerate() {
        for (y, cell) in row.iter_mut().enumerate() {
            *cell = map.cell(x, y);
        }
    }
    fit
}

/// Tuck-mode walk; `g` counts taps used in the current row.
fn dfs_tuck(g: i32, x: i32, y: i32, taps_per_row: i32, fit: &Fit, vis: &mut Vis) {
    let states = if taps_per_row > 0 { taps_per_row + 1 } else { 3 };
    if !(0..20).contains(&x) || !(0..10).contains(&y) || g >= states {
        return;
    }
    let (gi, xi, yi) = (g as usize, x as usize, y as usize);
    if !fit[xi][yi] || vis[gi][xi][yi] {
        return;
    }
    vis[gi][xi][yi] = true;
    if taps_per_row > 0 {
        dfs_tuck(g + 1, x, y - 1, taps_per_row, fit, vis);
        dfs_tuck(g + 1, x, y + 1, taps_per_row, fit, vis);
        dfs_tuck(0, x + 1, y, taps_per_row, fit, vis);
    } else if g == 1 {
        // Tap used this row; the next row is a cooldown row.
        dfs_tuck(2, x + 1, y, taps_per_row, fit, vis);
    } else {
        if g == 0 {
            dfs_tuck(1, x, y - 1, taps_per_row, fit, vis);
            dfs_tuck(1, x, y + 1, taps_per_row, fit, vis);
        }
        dfs_tuck(0, x + 1, y, taps_per_row, fit, vis);
    }
}

/// No-tuck walk; `s` is the committed direction (0 = done, 1 = left,
/// 2 = right). Dropping while keeping steering rights requires a full tap
/// cadence in the current row.
fn dfs_no_tuck(s: i32, g: i32, x: i32, y: i32, taps_per_row: i32, fit: &Fit, vis: &mut Vis) {
    let row_taps = if taps_per_row > 0 {
        taps_per_row
    } else {
        (x % 2 == 0) as i32
    };
    if !(0..20).contains(&x) || !(0..10).contains(&y) || g > row_taps {
        return;
    }
    let id = (if s == 0 {
        0
    } else if s == 1 {
        g + 1
    } else {
        g + 2 + taps_per_row.max(1)
    }) as usize;
    let (xi, yi) = (x as usize, y as usize);
    if !fit[xi][yi] || vis[id][xi][yi] {
        return;
    }
    vis[id][xi][yi] = true;
    if s == 1 {
        dfs_no_tuck(s, g + 1, x, y - 1, taps_per_row, fit, vis);
    } else if s == 2 {
        dfs_no_tuck(s, g + 1, x, y + 1, taps_per_row, fit, vis);
    }
    if g == row_taps {
        dfs_no_tuck(s, 0, x + 1, y, taps_per_row, fit, vis);
    }
    dfs_no_tuck(0, 0, x + 1, y, taps_per_row, fit, vis);
}

fn merge_and_lock(vis: &Vis) -> Board {
    let mut merged = [[false; 10]; 20];
    for layer in vis {
        for x in 0..20 {
            for y in 0..10 {
                merged[x][y] |= layer[x][y];
            }
        }
    }
    let mut out = Board::ZEROS;
    for x in 0..20 {
        for y in 0..10 {
            if merged[x][y] && (x == 19 || !merged[x + 1][y]) {
                out.set_cell(x, y);
            }
        }
    }
    out
}

/// Board of lockable origin cells for `piece` on `board`. An all-zero result
/// means top-out.
pub fn move_search_noro(board: &Board, piece: Piece, inputs_per_row: i32, do_tuck: bool) -> Board {
    let fit = fit_map(board, piece);
    if do_tuck {
        let layers = if inputs_per_row > 0 {
            inputs_per_row + 1
        } else {
            3
        };
        let mut vis: Vis = vec![[[false; 10]; 20]; layers as usize];
        dfs_tuck(0, 0, 5, inputs_per_row, &fit, &mut vis);
        // One pre-charged tap during the spawn delay.
        dfs_tuck(1, 0, 4, inputs_per_row, &fit, &mut vis);
        dfs_tuck(1, 0, 6, inputs_per_row, &fit, &mut vis);
        merge_and_lock(&vis)
    } else {
        let layers = inputs_per_row.max(1) * 2 + 3;
        let mut vis: Vis = vec![[[false; 10]; 20]; layers as usize];
        dfs_no_tuck(1, 0, 0, 5, inputs_per_row, &fit, &mut vis);
        dfs_no_tuck(2, 0, 0, 5, inputs_per_row, &fit, &mut vis);
        dfs_no_tuck(1, 1, 0, 4, inputs_per_row, &fit, &mut vis);
        dfs_no_tuck(2, 1, 0, 6, inputs_per_row, &fit, &mut vis);
        merge_and_lock(&vis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_board_o_piece_reaches_every_column_with_taps() {
        let moves = move_search_noro(&Board::ONES, Piece::O, 9, true);
        for y in 1..=9 {
            assert!(moves.cell(18, y), "col {y}");
        }
        assert!(!moves.cell(17, 5));
    }

    #[test]
    fn zero_inputs_per_row_limits_reach() {
        let wide = move_search_noro(&Board::ONES, Piece::O, 9, true);
        let slow = move_search_noro(&Board::ONES, Piece::O, 0, true);
        let count = |b: &Board, x: usize| (0..10).filter(|&y| b.cell(x, y)).count();
        assert!(count(&slow, 18) <= count(&wide, 18));
        // Straight down is always available.
        assert!(slow.cell(18, 5));
    }

    #[test]
    fn no_tuck_merges_left_and_right_passes() {
        let moves = move_search_noro(&Board::ONES, Piece::O, 9, false);
        assert!(moves.cell(18, 1));
        assert!(moves.cell(18, 9));
        assert!(moves.cell(18, 5));
    }
}
