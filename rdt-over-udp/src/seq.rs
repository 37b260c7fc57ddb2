//! Cyclic sequence numbers.
//!
//! Every frame carries a one-byte tag that cycles through `1..=256`.  The
//! value `256` does not fit in a byte, so on the wire it is written as `0x00`
//! and read back as `256`; the logical value is never `0`.
//!
//! Comparison in wrap-around space follows the usual convention: `a` is
//! *before* `b` when `b` can be reached from `a` by advancing at most half
//! the sequence space (128 steps).

use std::fmt;

/// A sequence tag in the closed range `[1, 256]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Seq(u16);

impl Seq {
    /// Smallest tag; every session starts here.
    pub const FIRST: Seq = Seq(1);
    /// Largest tag; the successor of `LAST` is `FIRST`.
    pub const LAST: Seq = Seq(256);

    const SPACE: u16 = 256;

    /// Build a tag from a logical value, or `None` outside `1..=256`.
    pub fn new(value: u16) -> Option<Self> {
        (1..=Self::SPACE).contains(&value).then_some(Seq(value))
    }

    /// Logical value in `1..=256`.
    pub fn value(self) -> u16 {
        self.0
    }

    /// Next tag in the cycle (`256` wraps to `1`).
    pub fn next(self) -> Self {
        if self.0 == Self::SPACE {
            Self::FIRST
        } else {
            Seq(self.0 + 1)
        }
    }

    /// Number of `next` steps needed to get from `self` to `other` (`0..256`).
    pub fn distance_to(self, other: Seq) -> u16 {
        (other.0 + Self::SPACE - self.0) % Self::SPACE
    }

    /// `true` when `self` was issued earlier than `other` in wrap-around space.
    #[inline]
    pub fn is_before(self, other: Seq) -> bool {
        let d = self.distance_to(other);
        d != 0 && d <= Self::SPACE / 2
    }

    /// Single-byte wire form (`256` is written as `0`).
    pub fn to_wire(self) -> u8 {
        (self.0 % Self::SPACE) as u8
    }

    /// Inverse of [`Seq::to_wire`]; every byte maps to a valid tag.
    pub fn from_wire(byte: u8) -> Self {
        if byte == 0 {
            Self::LAST
        } else {
            Seq(u16::from(byte))
        }
    }
}

impl Default for Seq {
    fn default() -> Self {
        Self::FIRST
    }
}

impl fmt::Display for Seq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
