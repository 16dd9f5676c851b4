// engine/src/engine/taps.rs
#![forbid(unsafe_code)]

use crate::engine::error::GameError;

/// Frames (from spawn) at which the k-th controller tap may land. Ten entries,
/// ascending, consecutive gaps >= 2 (a button must be released for a frame).
pub type TapTable = [i32; 10];

pub const TAP_30_HZ: TapTable = [0, 2, 4, 6, 8, 10, 12, 14, 16, 18];
pub const TAP_24_HZ: TapTable = [0, 3, 5, 8, 10, 13, 15, 18, 20, 23];
pub const TAP_20_HZ: TapTable = [0, 3, 6, 9, 12, 15, 18, 21, 24, 27];
pub const TAP_15_HZ: TapTable = [0, 4, 8, 12, 16, 20, 24, 28, 32, 36];
pub const TAP_12_HZ: TapTable = [0, 5, 10, 15, 20, 25, 30, 35, 40, 45];
pub const TAP_10_HZ: TapTable = [0, 6, 12, 18, 24, 30, 36, 42, 48, 54];
/// Five taps at 30Hz, then a slow trickle; the "slow5" training cadence.
pub const TAP_SLOW_5: TapTable = [0, 2, 4, 6, 18, 20, 22, 24, 36, 38];

pub fn tap_table_by_name(name: &str) -> Option<TapTable> {
    match name {
        "30hz" => Some(TAP_30_HZ),
        "24hz" => Some(TAP_24_HZ),
        "20hz" => Some(TAP_20_HZ),
        "15hz" => Some(TAP_15_HZ),
        "12hz" => Some(TAP_12_HZ),
        "10hz" => Some(TAP_10_HZ),
        "slow5" => Some(TAP_SLOW_5),
        _ => None,
    }
}

pub fn validate_tap_sequence(seq: &[i32]) -> Result<TapTable, GameError> {
    if seq.len() != 10 {
        return Err(GameError::InvalidTapSequence("length should be 10"));
    }
    if seq[0] < 0 {
        return Err(GameError::InvalidTapSequence("first tap before spawn"));
    }
    for i in 1..seq.len() {
        if seq[i] - seq[i - 1] < 2 {
            return Err(GameError::InvalidTapSequence("gap below 2 frames"));
        }
    }
    let mut out = [0i32; 10];
    out.copy_from_slice(seq);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_tables_are_valid() {
        for name in ["30hz", "24hz", "20hz", "15hz", "12hz", "10hz", "slow5"] {
            let t = tap_table_by_name(name).unwrap();
            assert!(validate_tap_sequence(&t).is_ok(), "{name}");
        }
    }

    #[test]
    fn rejects_tight_gaps() {
        let mut t = TAP_30_HZ;
        t[5] = t[4] + 1;
        assert!(validate_tap_sequence(&t).is_err());
    }
}
