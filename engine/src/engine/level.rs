// engine/src/engine/level.rs
#![forbid(unsafe_code)]

/// The four gravity buckets the ROT engine distinguishes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Level18 = 0,
    Level19 = 1,
    Level29 = 2,
    Level39 = 3,
}

pub const NUM_LEVELS: usize = 4;

/// Line totals at which the speed bucket changes (18-start curve).
pub const LEVEL_SPEED_LINES: [i32; 5] = [0, 130, 230, 330, 430];

/// Default forced game-over line total.
pub const DEFAULT_LINE_CAP: i32 = 430;

impl Level {
    #[inline]
    pub fn idx(self) -> usize {
        self as usize
    }

    pub fn from_idx(idx: usize) -> Level {
        match idx {
            0 => Level::Level18,
            1 => Level::Level19,
            2 => Level::Level29,
            _ => Level::Level39,
        }
    }

    pub fn all() -> [Level; NUM_LEVELS] {
        [
            Level::Level18,
            Level::Level19,
            Level::Level29,
            Level::Level39,
        ]
    }
}

/// Level on the NES 18-start curve for a given line total.
#[inline]
pub fn level_by_lines(lines: i32) -> i32 {
    if lines < 130 { 18 } else { 19 + (lines - 130) / 10 }
}

#[inline]
pub fn level_speed(level: i32) -> Level {
    if level >= 39 {
        Level::Level39
    } else if level >= 29 {
        Level::Level29
    } else if level >= 19 {
        Level::Level19
    } else {
        Level::Level18
    }
}

/// Single-clear NES score table times (level + 1).
#[inline]
pub fn score_from_level(level: i32, lines: i32) -> i32 {
    const BASE: [i32; 5] = [0, 40, 100, 300, 1200];
    BASE[lines as usize] * (level + 1)
}

/// Score delta for a clear, awarded at the post-clear level (NES order:
/// the transition happens before the score is added).
#[inline]
pub fn game_score(prior_lines: i32, cleared: i32) -> i32 {
    score_from_level(level_by_lines(prior_lines + cleared), cleared)
}

/// Level rules for the no-rotation track, which supports arbitrary start
/// levels and the full 15-bucket NES gravity ladder.
pub mod noro {
    /// Index 0..=14 into the NES gravity ladder
    /// (levels 0..=6, 7, 8, 9, 10-12, 13-15, 16-18, 19-28, 29+).
    #[inline]
    pub fn level_speed(level: i32) -> usize {
        match level {
            i32::MIN..=6 => level.max(0) as usize,
            7 => 7,
            8 => 8,
            9 => 9,
            10..=12 => 10,
            13..=15 => 11,
            16..=18 => 12,
            19..=28 => 13,
            _ => 14,
        }
    }

    /// Gravity in frames per row for a level.
    #[inline]
    pub fn frames_per_row(level: i32) -> i32 {
        const TABLE: [i32; 15] = [48, 43, 38, 33, 28, 23, 18, 13, 8, 6, 5, 4, 3, 2, 1];
        TABLE[level_speed(level)]
    }

    /// NES level curve with a configurable start level: the first level-up
    /// happens at min(start*10+10, max(100, start*10-50)) lines, then every
    /// ten lines.
    #[inline]
    pub fn level_by_lines(lines: i32, start_level: i32) -> i32 {
        let first = (start_level * 10 + 10).min(100.max(start_level * 10 - 50));
        if lines < first {
            start_level
        } else {
            start_level + 1 + (lines - first) / 10
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rot_level_curve() {
        assert_eq!(level_by_lines(0), 18);
        assert_eq!(level_by_lines(129), 18);
        assert_eq!(level_by_lines(130), 19);
        assert_eq!(level_by_lines(230), 29);
        assert_eq!(level_by_lines(330), 39);
        assert_eq!(level_speed(18), Level::Level18);
        assert_eq!(level_speed(28), Level::Level19);
        assert_eq!(level_speed(38), Level::Level29);
        assert_eq!(level_speed(50), Level::Level39);
    }

    #[test]
    fn nes_scoring() {
        assert_eq!(score_from_level(0, 1), 40);
        assert_eq!(score_from_level(18, 4), 1200 * 19);
        assert_eq!(game_score(129, 1), 100 * 40);
    }

    #[test]
    fn noro_curve_and_speeds() {
        assert_eq!(noro::level_by_lines(0, 18), 18);
        assert_eq!(noro::level_by_lines(130, 18), 19);
        assert_eq!(noro::level_by_lines(0, 0), 0);
        assert_eq!(noro::level_by_lines(10, 0), 1);
        assert_eq!(noro::level_speed(18), 12);
        assert_eq!(noro::level_speed(29), 14);
        assert_eq!(noro::frames_per_row(0), 48);
        assert_eq!(noro::frames_per_row(29), 1);
    }
}
