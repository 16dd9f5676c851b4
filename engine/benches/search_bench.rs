// engine/benches/search_bench.rs
#![forbid(unsafe_code)]

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use nestris_engine::engine::{
    Board, Level, Piece, SearchTables, TAP_30_HZ, move_search, move_search_noro,
};

fn jagged_board() -> Board {
    Board::from_ascii(concat!(
        "..........\n",
        ".......XX.\n",
        "..X.....X.\n",
        "..XX....X.\n",
        "X.XXX..XXX\n",
        "X.XXXX.XXX\n",
        "XX.XXXXXXX\n",
        "XX.XXXXXXX\n",
    ))
}

fn bench_move_search(c: &mut Criterion) {
    let tables = SearchTables::get(&TAP_30_HZ, 18);
    let empty = Board::ONES;
    let jagged = jagged_board();

    let mut group = c.benchmark_group("move_search");
    for (name, board) in [("empty", &empty), ("jagged", &jagged)] {
        for piece in [Piece::T, Piece::I] {
            group.bench_function(format!("{name}/{piece:?}/l18"), |b| {
                b.iter(|| move_search(tables, Level::Level18, black_box(board), piece))
            });
            group.bench_function(format!("{name}/{piece:?}/l29"), |b| {
                b.iter(|| move_search(tables, Level::Level29, black_box(board), piece))
            });
        }
    }
    group.finish();
}

fn bench_move_search_noro(c: &mut Criterion) {
    let jagged = jagged_board();
    c.bench_function("move_search_noro/jagged", |b| {
        b.iter(|| move_search_noro(black_box(&jagged), Piece::T, 9, true))
    });
}

criterion_group!(benches, bench_move_search, bench_move_search_noro);
criterion_main!(benches);
