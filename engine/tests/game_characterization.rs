// engine/tests/game_characterization.rs
#![forbid(unsafe_code)]

use std::collections::BTreeSet;

use nestris_engine::engine::{
    Board, Level, NoroResetConfig, Piece, Position, RotResetConfig, SearchTables, TAP_30_HZ,
    Tetris, TetrisEnv, best_adj, frame_sequence_start, move_search, noro_line_reward_exp, replay,
    score_from_level,
};

fn reach_set(board: &Board, piece: Piece, level: Level, adj_delay: i32) -> BTreeSet<Position> {
    let tables = SearchTables::get(&TAP_30_HZ, adj_delay);
    let moves = move_search(tables, level, board, piece);
    let mut set: BTreeSet<Position> = moves.non_adj.iter().copied().collect();
    for (_, finals) in &moves.adj {
        set.extend(finals.iter().copied());
    }
    set
}

// ---------------------------------------------------------------------
// Scenario: I piece coverage on the empty board (L18, 30hz, delay 18)
// ---------------------------------------------------------------------

#[test]
fn i_piece_covers_every_column_on_the_empty_board() {
    let set = reach_set(&Board::ONES, Piece::I, Level::Level18, 18);
    assert!(!set.is_empty(), "top-out must not occur");
    // Vertical I resting on the floor in every column.
    for y in 0..10 {
        assert!(set.contains(&Position::new(1, 18, y)), "vertical col {y}");
    }
    // Horizontal I on the bottom row at every valid origin.
    for y in 2..=8 {
        assert!(set.contains(&Position::new(0, 19, y)), "horizontal col {y}");
    }
}

// ---------------------------------------------------------------------
// Scenario: best-adjustment choice
// ---------------------------------------------------------------------

fn pick_adj(board: &Board, targets: &[Position; 7]) -> Position {
    let tables = SearchTables::get(&TAP_30_HZ, 18);
    let moves = move_search(tables, Level::Level18, board, Piece::T);
    let (idx, _) = best_adj(tables, Level::Level18, board, Piece::T, &moves, targets);
    moves.adj[idx].0
}

#[test]
fn best_adj_prefers_the_weighted_center() {
    let targets = [
        Position::new(2, 19, 3),
        Position::new(2, 19, 3),
        Position::new(2, 19, 3),
        Position::new(2, 19, 3),
        Position::new(2, 19, 5),
        Position::new(2, 19, 5),
        Position::new(2, 19, 5),
    ];
    assert_eq!(pick_adj(&Board::ONES, &targets), Position::new(2, 6, 4));

    let targets = [
        Position::new(2, 19, 3),
        Position::new(2, 19, 5),
        Position::new(2, 19, 5),
        Position::new(2, 19, 5),
        Position::new(2, 19, 5),
        Position::new(2, 19, 5),
        Position::new(2, 19, 5),
    ];
    assert_eq!(pick_adj(&Board::ONES, &targets), Position::new(2, 6, 5));
}

#[test]
fn best_adj_balances_rotation_distance() {
    let targets = [
        Position::new(0, 18, 5),
        Position::new(0, 18, 5),
        Position::new(0, 18, 5),
        Position::new(0, 18, 5),
        Position::new(2, 19, 5),
        Position::new(2, 19, 5),
        Position::new(2, 19, 5),
    ];
    let initial = pick_adj(&Board::ONES, &targets);
    assert!(
        initial == Position::new(1, 6, 5) || initial == Position::new(3, 6, 5),
        "got {initial:?}"
    );
}

#[test]
fn best_adj_routes_around_obstructions() {
    let board = Board::from_ascii("....X.....\n.....X....");
    let targets = [Position::new(2, 19, 3); 7];
    assert_eq!(pick_adj(&board, &targets), Position::new(2, 6, 2));
}

// ---------------------------------------------------------------------
// Scenario: placement, line clear and scoring
// ---------------------------------------------------------------------

#[test]
fn horizontal_i_fills_bottom_row_and_scores_forty_at_level_zero() {
    let board = Board::ONES.place(Piece::I, 0, 19, 4);
    let (cleared, after) = board.clear_lines();
    assert_eq!(cleared, 0);
    assert_eq!(after.count(), 4);
    for y in 2..=5 {
        assert!(!after.cell(19, y), "col {y} occupied");
    }

    // Fill the six remaining cells; the row clears and the delta score for a
    // single at level 0 is 40.
    let mut full = after;
    full = full.place(Piece::O, 0, 18, 1); // cols 0..1, rows 18..19
    full = full.place(Piece::O, 0, 18, 7); // cols 6..7
    full = full.place(Piece::O, 0, 18, 9); // cols 8..9
    let (cleared, after) = full.clear_lines();
    assert_eq!(cleared, 1);
    assert_eq!(after.count(), 6);
    assert_eq!(score_from_level(0, 1), 40);
}

// ---------------------------------------------------------------------
// Scenario: NORO line reward curve
// ---------------------------------------------------------------------

#[test]
fn noro_line_reward_is_capped_at_six_for_late_lines() {
    assert_eq!(noro_line_reward_exp(30, 18, false, true), 6.0);
}

// ---------------------------------------------------------------------
// Sequence round-trips
// ---------------------------------------------------------------------

#[test]
fn generated_sequences_replay_to_their_placement() {
    let boards = [
        Board::ONES,
        Board::from_ascii(concat!(
            "..........\n",
            ".......XX.\n",
            "..X.....X.\n",
            "..XX....X.\n",
            "X.XXX..XXX\n",
            "X.XXXX.XXX\n",
        )),
    ];
    let tables = SearchTables::get(&TAP_30_HZ, 18);
    for board in boards {
        for piece in [Piece::T, Piece::J, Piece::I, Piece::O] {
            for level in [Level::Level18, Level::Level29] {
                let moves = move_search(tables, level, &board, piece);
                let mut checked = 0;
                for (_, finals) in &moves.adj {
                    for pos in finals.iter().take(6) {
                        // Placements reachable without entering the
                        // adjustment protocol round-trip through the plain
                        // start sequence.
                        let seq =
                            frame_sequence_start(level, &TAP_30_HZ, &board, piece, 18, *pos);
                        if seq.is_empty() {
                            continue;
                        }
                        assert_eq!(
                            replay(&board, piece, level, &seq),
                            *pos,
                            "piece={piece:?} level={level:?} pos={pos:?}"
                        );
                        checked += 1;
                    }
                }
                for pos in moves.non_adj.iter().take(12) {
                    // An empty sequence is the straight drop.
                    let seq = frame_sequence_start(level, &TAP_30_HZ, &board, piece, 18, *pos);
                    assert_eq!(
                        replay(&board, piece, level, &seq),
                        *pos,
                        "piece={piece:?} level={level:?} pos={pos:?}"
                    );
                    checked += 1;
                }
                assert!(checked > 0, "piece={piece:?} level={level:?}");
            }
        }
    }
}

#[test]
fn adjustment_sequences_complete_to_the_final_placement() {
    let board = Board::ONES;
    let mut t = Tetris::new();
    t.reset(board, 0, Piece::T, Piece::T, &TAP_30_HZ, 18).unwrap();
    let targets = [Position::new(2, 19, 3); 7];
    let (initial, mut seq) = t.adj_premove(&targets);
    let final_pos = Position::new(2, 19, 3);
    t.finish_adj_sequence(&mut seq, initial, final_pos);
    assert_eq!(replay(&board, Piece::T, Level::Level18, &seq), final_pos);
}

#[test]
fn noro_sequences_use_minimal_taps() {
    use nestris_engine::engine::{frame_sequence_noro, input};

    // Straight drop: no inputs at all.
    let seq = frame_sequence_noro(&Board::ONES, Piece::O, 9, true, 48, Position::new(0, 18, 5));
    assert!(seq.is_empty());

    // Two columns right: exactly two right taps, no left taps.
    let seq = frame_sequence_noro(&Board::ONES, Piece::O, 9, true, 48, Position::new(0, 18, 7));
    let rights = seq.iter().filter(|&&b| b & input::RIGHT != 0).count();
    let lefts = seq.iter().filter(|&&b| b & input::LEFT != 0).count();
    assert_eq!(rights, 2);
    assert_eq!(lefts, 0);

    // A cell sealed under an overhang is unreachable without tucking.
    let board = Board::from_ascii(concat!(
        "..........\n",
        "XX........\n",
        "..........\n",
        "..........\n",
    ));
    let target = Position::new(0, 18, 1);
    let seq = frame_sequence_noro(&board, Piece::O, 9, false, 48, target);
    assert!(seq.is_empty());
}

// ---------------------------------------------------------------------
// Reward determinism and the piece-count identity
// ---------------------------------------------------------------------

fn first_legal(env: &TetrisEnv) -> Option<(i32, i32, i32)> {
    let t = env.rot().expect("rot env");
    let map = t.move_map();
    for (r, plane) in map.iter().enumerate() {
        for (x, row) in plane.iter().enumerate() {
            for (y, &tag) in row.iter().enumerate() {
                if tag != 0 {
                    return Some((r as i32, x as i32, y as i32));
                }
            }
        }
    }
    None
}

#[test]
fn fixed_seed_and_actions_reproduce_reward_tuples_exactly() {
    let run = || {
        let mut env = TetrisEnv::new(20260802);
        env.reset_rot(RotResetConfig::default()).unwrap();
        let mut rewards = Vec::new();
        for _ in 0..40 {
            if env.is_over() {
                break;
            }
            let Some((r, x, y)) = first_legal(&env) else {
                break;
            };
            let rec = env.input_placement(r, x, y).unwrap();
            rewards.push((rec.reward, rec.raw_reward, rec.live_prob, rec.over_reward));
        }
        (rewards, *env.board(), env.lines(), env.pieces())
    };
    assert_eq!(run(), run());
}

#[test]
fn lines_and_occupancy_satisfy_the_piece_count_identity() {
    let mut env = TetrisEnv::new(7);
    env.reset_rot(RotResetConfig::default()).unwrap();
    for _ in 0..60 {
        if env.is_over() {
            break;
        }
        let Some((r, x, y)) = first_legal(&env) else {
            break;
        };
        env.input_placement(r, x, y).unwrap();
        let cells = env.board().count() as i32;
        assert_eq!((env.lines() * 10 + cells) % 4, 0);
        assert_eq!(env.pieces(), (env.lines() * 10 + cells) / 4);
    }
}

// ---------------------------------------------------------------------
// NORO mirror symmetry
// ---------------------------------------------------------------------

#[test]
fn mirrored_noro_games_evolve_mirrored_states() {
    let cfg = |mirror| NoroResetConfig {
        start_level: 18,
        do_tuck: true,
        mirror,
        now_piece: Some(Piece::J),
        next_piece: Some(Piece::L),
        ..NoroResetConfig::default()
    };
    let mut plain = TetrisEnv::new(99);
    let mut plain_cfg = cfg(false);
    plain_cfg.board = Board::ONES;
    plain.reset_noro(plain_cfg);
    let mut mirrored = TetrisEnv::new(99);
    mirrored.reset_noro(cfg(true));

    for _ in 0..12 {
        if plain.is_over() || mirrored.is_over() {
            break;
        }
        let t = plain.noro().unwrap();
        let map = t.move_map();
        let mut action = None;
        'outer: for x in 0..20 {
            for y in 0..10 {
                if map.cell(x, y) {
                    action = Some((x as i32, y as i32));
                    break 'outer;
                }
            }
        }
        let Some((x, y)) = action else { break };
        let now = plain.now_piece();
        plain.input_placement(0, x, y).unwrap();
        // The mirrored env gets the mirrored action; it un-mirrors it
        // internally, so the physical boards stay reflections... of each
        // other only through the policy view; the real fields are equal.
        let mirrored_y =
            nestris_engine::engine::MIRROR_COLS[now.idx()] - y;
        mirrored.input_placement(0, x, mirrored_y).unwrap();
        assert_eq!(plain.board(), mirrored.board());
        assert_eq!(plain.lines(), mirrored.lines());

        // And the observation planes are left-right reflections.
        let sp = plain.get_state(0);
        let sm = mirrored.get_state(0);
        for i in 0..20 {
            for j in 0..10 {
                assert_eq!(sp.board[0][i][j], sm.board[0][i][9 - j]);
            }
        }
    }
}

// ---------------------------------------------------------------------
// Misc interface behavior
// ---------------------------------------------------------------------

#[test]
fn set_lines_rejects_speed_bucket_changes() {
    let mut env = TetrisEnv::new(3);
    env.reset_rot(RotResetConfig::default()).unwrap();
    assert!(env.set_lines(20).is_ok());
    assert!(env.set_lines(200).is_err());
}

#[test]
fn state_tensors_have_the_contract_shapes() {
    let mut env = TetrisEnv::new(5);
    env.reset_rot(RotResetConfig::default()).unwrap();
    let s = env.get_state(0);
    assert_eq!(s.board.len(), 6);
    assert_eq!(s.moves.len(), 18);
    assert_eq!(s.move_meta.len(), 28);
    assert_eq!(s.meta_int[1], env.now_piece().idx() as i32);

    env.reset_noro(NoroResetConfig::default());
    let s = env.get_state(0);
    assert_eq!(s.board.len(), 2);
    assert_eq!(s.moves.len(), 3);
    assert_eq!(s.move_meta.len(), 31);
    assert_eq!(env.state_shapes()[0], vec![2, 20, 10]);
}

#[test]
fn adj_states_cover_every_next_piece() {
    let mut env = TetrisEnv::new(11);
    env.reset_rot(RotResetConfig::default()).unwrap();
    let t = env.rot().unwrap();
    let initial = t.possible_moves().adj.first().map(|(p, _)| *p).unwrap();
    let states = env.get_adj_states(initial.r, initial.x, initial.y);
    for (i, s) in states.iter().enumerate() {
        assert_eq!(s.meta[14], 1.0, "is_adj flag");
        assert_eq!(s.meta[7 + i], 1.0, "next piece one-hot {i}");
    }
}

#[test]
fn invalid_placement_costs_a_flat_penalty_and_ends_the_game() {
    let mut env = TetrisEnv::new(13);
    env.reset_rot(RotResetConfig::default()).unwrap();
    let rec = env.input_placement(0, 0, 0).unwrap();
    assert_eq!(rec.reward, -0.3);
    assert_eq!(rec.raw_reward, 0.0);
    assert!(env.is_over());
}

#[test]
fn tetris_only_burn_forces_game_over_with_penalty() {
    // A two-row well at the right wall: any clear here is a burn.
    let board = Board::from_ascii(concat!("XXXXXXXXX.\n", "XXXXXXXXX.\n",));
    assert_eq!(board.count(), 18);
    let mut env = TetrisEnv::new(17);
    env.reset_rot(RotResetConfig {
        board,
        lines: 1,
        adj_delay: 61,
        tetris_only: true,
        now_piece: Some(Piece::I),
        next_piece: Some(Piece::I),
        ..RotResetConfig::default()
    })
    .unwrap();
    // Vertical I in the well clears two lines; under tetris-only rules that
    // burn ends the game and charges the game-over penalty.
    let rec = env.input_placement(1, 18, 9).unwrap();
    assert!(env.is_over());
    assert!(rec.over_reward <= -1.0, "over_reward={}", rec.over_reward);
    assert!(rec.reward < 0.0);
}
