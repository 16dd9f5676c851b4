// engine/src/engine/pieces.rs
#![forbid(unsafe_code)]

use crate::engine::error::GameError;

/// The seven tetrominoes, in the NES engine's id order (0..=6).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Piece {
    T,
    J,
    Z,
    O,
    S,
    L,
    I,
}

pub const NUM_PIECES: usize = 7;

/// NORO mirror: `y -> MIRROR_COLS[piece] - y` reflects a placement column.
pub const MIRROR_COLS: [i32; NUM_PIECES] = [9, 9, 9, 10, 9, 9, 10];
/// NORO mirror: piece relabeling under left-right reflection.
pub const MIRROR_PIECE: [usize; NUM_PIECES] = [0, 5, 4, 3, 2, 1, 6];

impl Piece {
    pub fn all() -> [Piece; NUM_PIECES] {
        use Piece::*;
        [T, J, Z, O, S, L, I]
    }

    #[inline]
    pub fn idx(self) -> usize {
        self as usize
    }

    pub fn from_idx(idx: usize) -> Result<Self, GameError> {
        use Piece::*;
        match idx {
            0 => Ok(T),
            1 => Ok(J),
            2 => Ok(Z),
            3 => Ok(O),
            4 => Ok(S),
            5 => Ok(L),
            6 => Ok(I),
            _ => Err(GameError::InvalidPiece(idx as i64)),
        }
    }

    pub fn from_glyph(c: char) -> Result<Self, GameError> {
        use Piece::*;
        match c.to_ascii_uppercase() {
            'T' => Ok(T),
            'J' => Ok(J),
            'Z' => Ok(Z),
            'O' => Ok(O),
            'S' => Ok(S),
            'L' => Ok(L),
            'I' => Ok(I),
            _ => Err(GameError::InvalidPiece(-1)),
        }
    }

    pub fn glyph(self) -> char {
        use Piece::*;
        match self {
            T => 'T',
            J => 'J',
            Z => 'Z',
            O => 'O',
            S => 'S',
            L => 'L',
            I => 'I',
        }
    }

    #[inline]
    pub fn num_rots(self) -> usize {
        rotations(self).len()
    }

    /// Mirrored label used when serializing NORO states.
    pub fn mirrored(self) -> Piece {
        Piece::from_idx(MIRROR_PIECE[self.idx()]).unwrap()
    }
}

/// NES orientations as `(dx, dy)` cell offsets from the piece origin
/// (dx = rows down, dy = columns right). `rotations(p)[r]` is 4 blocks.
///
/// Rotation index r+1 is one clockwise step from r.
pub fn rotations(piece: Piece) -> &'static [&'static [(i32, i32)]] {
    use Piece::*;
    match piece {
        T => &[
            &[(1, 0), (0, 0), (0, 1), (0, -1)],
            &[(1, 0), (0, 0), (-1, 0), (0, -1)],
            &[(0, -1), (0, 0), (0, 1), (-1, 0)],
            &[(1, 0), (0, 0), (0, 1), (-1, 0)],
        ],
        J => &[
            &[(0, -1), (0, 0), (0, 1), (1, 1)],
            &[(-1, 0), (0, 0), (1, -1), (1, 0)],
            &[(-1, -1), (0, -1), (0, 0), (0, 1)],
            &[(-1, 0), (-1, 1), (0, 0), (1, 0)],
        ],
        Z => &[
            &[(0, -1), (0, 0), (1, 0), (1, 1)],
            &[(-1, 1), (0, 0), (0, 1), (1, 0)],
        ],
        O => &[&[(0, -1), (0, 0), (1, -1), (1, 0)]],
        S => &[
            &[(0, 0), (0, 1), (1, -1), (1, 0)],
            &[(-1, 0), (0, 0), (0, 1), (1, 1)],
        ],
        L => &[
            &[(0, -1), (0, 0), (0, 1), (1, -1)],
            &[(-1, -1), (-1, 0), (0, 0), (1, 0)],
            &[(-1, 1), (0, -1), (0, 0), (0, 1)],
            &[(-1, 0), (0, 0), (1, 0), (1, 1)],
        ],
        I => &[
            &[(0, -2), (0, -1), (0, 0), (0, 1)],
            &[(-2, 0), (-1, 0), (0, 0), (1, 0)],
        ],
    }
}
