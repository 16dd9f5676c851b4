// engine/src/engine/position.rs
#![forbid(unsafe_code)]

/// A piece placement: rotation index, row of the piece origin (0 = top),
/// column of the piece origin (0 = leftmost). Plain copyable value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position {
    pub r: i32,
    pub x: i32,
    pub y: i32,
}

impl Position {
    /// Spawn location: default rotation, top row, column 5.
    pub const START: Position = Position { r: 0, x: 0, y: 5 };

    pub const fn new(r: i32, x: i32, y: i32) -> Self {
        Position { r, x, y }
    }
}
