// engine/src/engine/reward.rs
#![forbid(unsafe_code)]

/*
Reward shaping tables. The death-rate table is empirical (half survival
chance per 100 lines at the fastest settings); the per-cadence multiplier
schedules and the NORO line-reward curves are tuned literals and must not be
"cleaned up".
*/

use crate::engine::level::noro;
use crate::engine::taps::TapTable;

/// Per-step top-out probability, indexed `[phase][tap_mode][adj_mode]` with
/// phase 0 = pre-130 lines, 1 = pre-230, 2 = later.
pub(crate) const OVER_PROB: [[[f64; 6]; 7]; 3] = [
    [
        [0.032, 0.029, 0.029, 0.027, 0.027, 0.023],
        [0.039, 0.036, 0.035, 0.036, 0.034, 0.026],
        [0.044, 0.039, 0.038, 0.039, 0.038, 0.028],
        [0.046, 0.041, 0.038, 0.037, 0.038, 0.032],
        [0.044, 0.043, 0.04, 0.04, 0.037, 0.031],
        [0.047, 0.042, 0.044, 0.041, 0.039, 0.029],
        [0.042, 0.038, 0.038, 0.037, 0.037, 0.027],
    ],
    [
        [0.021, 0.018, 0.018, 0.017, 0.016, 0.016],
        [0.029, 0.026, 0.024, 0.023, 0.021, 0.02],
        [0.035, 0.03, 0.028, 0.029, 0.024, 0.023],
        [0.045, 0.036, 0.032, 0.033, 0.029, 0.028],
        [0.045, 0.036, 0.035, 0.032, 0.03, 0.032],
        [0.046, 0.037, 0.04, 0.036, 0.032, 0.031],
        [0.038, 0.032, 0.029, 0.029, 0.025, 0.023],
    ],
    [
        [0.007, 0.007, 0.007, 0.007, 0.007, 0.007],
        [0.007, 0.007, 0.007, 0.007, 0.007, 0.007],
        [0.01, 0.009, 0.009, 0.009, 0.009, 0.009],
        [0.02, 0.015, 0.016, 0.016, 0.016, 0.015],
        [0.027, 0.02, 0.02, 0.019, 0.019, 0.019],
        [0.036, 0.024, 0.023, 0.022, 0.024, 0.024],
        [0.014, 0.012, 0.011, 0.011, 0.012, 0.012],
    ],
];

/// Absolute line numbers closing each death-rate phase.
pub(crate) const PHASE_LINES: [i32; 3] = [124, 224, 320];
/// Penalty scale per phase line.
pub(crate) const PHASE_PENALTY: [f64; 3] = [60000.0, 30000.0, 15000.0];

/// Cadence bucket from the 4th/5th tap instants. Only the seven canonical
/// cadences are meaningful in the shaping tables.
pub(crate) fn tap_mode_of(taps: &TapTable) -> usize {
    match taps[3] {
        6 => {
            if taps[4] <= 10 {
                5
            } else {
                6
            }
        }
        8 => 4,
        9 => 3,
        12 => 2,
        15 => 1,
        18 => 0,
        other => panic!("unexpected tap instant {other}"),
    }
}

pub(crate) fn adj_mode_of(adj_delay: i32) -> usize {
    match adj_delay {
        0 => 0,
        18 => 1,
        21 => 2,
        24 => 3,
        30 => 4,
        61 => 5,
        other => panic!("unexpected adjustment delay {other}"),
    }
}

/// Exponent of the per-line NORO reward, a tuned curve over the absolute
/// line index, capped at 6.
pub fn noro_line_reward_exp(lines: i32, start_level: i32, do_tuck: bool, nnb: bool) -> f64 {
    const OFFSET: [[[i32; 15]; 2]; 2] = [
        [
            // levels: 0..=6, 7, 8, 9, 10-12, 13-15, 16-18, 19, 29
            [14, 14, 14, 14, 14, 14, 14, 14, 14, 13, 13, 13, 12, 12, 10], // notuck
            [12, 12, 12, 12, 12, 12, 12, 12, 12, 12, 10, 10, 9, 9, 6],    // notuck, nnb
        ],
        [
            [21, 21, 21, 21, 21, 21, 21, 19, 19, 19, 19, 19, 12, 12, 11], // tuck
            [17, 17, 17, 17, 17, 17, 17, 17, 17, 16, 15, 15, 12, 12, 9],  // tuck, nnb
        ],
    ];
    const EXP_MULTIPLIER: [[[f64; 15]; 2]; 2] = [
        [
            [
                0.33, 0.33, 0.33, 0.33, 0.33, 0.33, 0.33, 0.33, 0.33, 0.35, 0.38, 0.38, 0.38,
                0.38, 0.4,
            ],
            [
                0.50, 0.50, 0.50, 0.50, 0.50, 0.50, 0.50, 0.50, 0.50, 0.50, 0.50, 0.50, 0.50,
                0.50, 0.50,
            ],
        ],
        [
            [
                0.16, 0.16, 0.16, 0.16, 0.16, 0.16, 0.16, 0.16, 0.16, 0.18, 0.19, 0.19, 0.24,
                0.24, 0.33,
            ],
            [
                0.20, 0.20, 0.20, 0.20, 0.20, 0.20, 0.20, 0.20, 0.20, 0.21, 0.22, 0.22, 0.40,
                0.40, 0.45,
            ],
        ],
    ];
    const MIN_EXP: [[[f64; 15]; 2]; 2] = [
        [
            [
                -3.0, -3.0, -3.0, -3.0, -3.0, -3.0, -3.0, -3.0, -3.0, -3.0, -3.0, -3.0, -3.0,
                -3.0, -2.8,
            ],
            [
                -2.8, -2.8, -2.8, -2.8, -2.8, -2.8, -2.8, -2.8, -2.8, -2.8, -2.8, -2.8, -2.8,
                -2.8, -2.8,
            ],
        ],
        [
            [
                -3.6, -3.6, -3.6, -3.6, -3.6, -3.6, -3.6, -3.6, -3.6, -3.6, -3.5, -3.5, -3.2,
                -3.2, -3.0,
            ],
            [
                -3.5, -3.5, -3.5, -3.5, -3.5, -3.5, -3.5, -3.5, -3.5, -3.5, -3.2, -3.2, -2.8,
                -2.8, -2.2,
            ],
        ],
    ];

    let speed = noro::level_speed(start_level);
    let tuck = do_tuck as usize;
    let nnb = nnb as usize;
    let min_exp = MIN_EXP[tuck][nnb][speed];
    let offset = OFFSET[tuck][nnb][speed];
    let multiplier = EXP_MULTIPLIER[tuck][nnb][speed];
    (6.0f64).min((lines - offset).max(0) as f64 * multiplier + min_exp)
}

/// Tetris-only I-piece bias: line thresholds and base probabilities per ROT
/// speed bucket.
pub(crate) const TETRIS_ONLY_I_THRESH: [i32; 4] = [28, 24, 16, 8];
pub(crate) const TETRIS_ONLY_I_ADD: [f64; 4] = [0.035, 0.046, 0.06, 0.09];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::taps::{TAP_12_HZ, TAP_30_HZ, TAP_SLOW_5};

    #[test]
    fn tap_and_adj_modes() {
        assert_eq!(tap_mode_of(&TAP_30_HZ), 5);
        assert_eq!(tap_mode_of(&TAP_SLOW_5), 6);
        assert_eq!(tap_mode_of(&TAP_12_HZ), 1);
        assert_eq!(adj_mode_of(0), 0);
        assert_eq!(adj_mode_of(18), 1);
        assert_eq!(adj_mode_of(61), 5);
    }

    #[test]
    fn noro_reward_curve_caps_at_six() {
        // Start level 18, no tuck, nnb: offset 9, multiplier 0.5, min -2.8.
        let v = noro_line_reward_exp(30, 18, false, true);
        assert_eq!(v, 6.0);
        let low = noro_line_reward_exp(0, 18, false, true);
        assert_eq!(low, -2.8);
    }
}
