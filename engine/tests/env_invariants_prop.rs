// engine/tests/env_invariants_prop.rs
#![forbid(unsafe_code)]

/*
Rollout invariants over generated seeds.

These lock environment-level guarantees that hold regardless of policy:
move-map tags stay in range, counters stay consistent with the board, reward
records stay finite, and identically seeded runs stay bit-identical.
*/

use proptest::prelude::*;

use nestris_engine::engine::{
    MOVE_ADJ_NON_REDUCED, NoroResetConfig, RotResetConfig, TetrisEnv,
};

fn legal_rot(env: &TetrisEnv) -> Vec<(i32, i32, i32)> {
    let mut out = Vec::new();
    let t = env.rot().unwrap();
    for (r, plane) in t.move_map().iter().enumerate() {
        for (x, row) in plane.iter().enumerate() {
            for (y, &tag) in row.iter().enumerate() {
                assert!(tag <= MOVE_ADJ_NON_REDUCED, "tag out of range");
                if tag != 0 {
                    out.push((r as i32, x as i32, y as i32));
                }
            }
        }
    }
    out
}

fn legal_noro(env: &TetrisEnv) -> Vec<(i32, i32, i32)> {
    let t = env.noro().unwrap();
    let map = t.move_map();
    let mut out = Vec::new();
    for x in 0..20 {
        for y in 0..10 {
            if map.cell(x, y) {
                out.push((0, x as i32, y as i32));
            }
        }
    }
    out
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn rot_rollouts_respect_core_invariants(seed in any::<u64>(), steps in 1usize..50) {
        let mut env = TetrisEnv::new(seed);
        env.reset_rot(RotResetConfig::default()).unwrap();

        for i in 0..steps {
            if env.is_over() {
                break;
            }
            let legal = legal_rot(&env);
            prop_assert!(!legal.is_empty());
            let (r, x, y) = legal[(seed as usize).wrapping_add(i * 131) % legal.len()];
            let rec = env.input_placement(r, x, y).unwrap();

            prop_assert!(rec.reward.is_finite());
            prop_assert!(rec.raw_reward.is_finite());
            prop_assert!((0.0..=1.0).contains(&rec.live_prob));

            let cells = env.board().count() as i32;
            prop_assert_eq!((env.lines() * 10 + cells) % 4, 0);
            prop_assert_eq!(env.pieces(), (env.lines() * 10 + cells) / 4);
            prop_assert!(env.run_lines() <= env.lines());
        }
    }

    #[test]
    fn noro_rollouts_respect_core_invariants(seed in any::<u64>(), steps in 1usize..50) {
        let mut env = TetrisEnv::new(seed);
        env.reset_noro(NoroResetConfig { start_level: 18, ..NoroResetConfig::default() });

        for i in 0..steps {
            if env.is_over() {
                break;
            }
            let legal = legal_noro(&env);
            prop_assert!(!legal.is_empty());
            let (r, x, y) = legal[(seed as usize).wrapping_add(i * 131) % legal.len()];
            let rec = env.input_placement(r, x, y).unwrap();
            prop_assert!(rec.reward.is_finite());
            prop_assert!(rec.raw_reward >= 0.0);
            let s = env.get_state(0);
            prop_assert_eq!(s.board.len(), 2);
            prop_assert_eq!(s.moves.len(), 3);
        }
    }

    #[test]
    fn identically_seeded_runs_are_bit_identical(seed in any::<u64>(), steps in 1usize..40) {
        let run = |steps: usize| {
            let mut env = TetrisEnv::new(seed);
            env.reset_rot(RotResetConfig::default()).unwrap();
            let mut trace = Vec::new();
            for i in 0..steps {
                if env.is_over() {
                    break;
                }
                let legal = legal_rot(&env);
                if legal.is_empty() {
                    break;
                }
                let (r, x, y) = legal[i % legal.len()];
                let rec = env.input_placement(r, x, y).unwrap();
                trace.push((
                    rec.reward.to_bits(),
                    rec.raw_reward.to_bits(),
                    rec.live_prob.to_bits(),
                    rec.over_reward.to_bits(),
                    env.now_piece().idx(),
                ));
            }
            (trace, *env.board())
        };
        prop_assert_eq!(run(steps), run(steps));
    }
}
