//! Sequence numbers and the half-window "precedes" relation.
//!
//! SNs wrap modulo a resolution negotiated at session open. Because they
//! wrap, "is newer than" is not plain `<` — it is `precedes`, defined over
//! half the resolution window so a single wraparound can be told apart
//! from genuine reordering.

use std::fmt;

/// The modulus SNs wrap at. Always a power of two in practice (wire value
/// is `log2` of the resolution), but nothing here requires it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnResolution(pub u64);

impl SnResolution {
    /// `Z_SN_RESOLUTION_DEFAULT`: 2^32.
    pub const DEFAULT: SnResolution = SnResolution(1 << 32);

    pub fn half(&self) -> u64 {
        self.0 / 2
    }
}

impl Default for SnResolution {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// A sequence number, always interpreted modulo some [`SnResolution`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Sn(pub u64);

impl Sn {
    pub const ZERO: Sn = Sn(0);

    pub fn next(self, res: SnResolution) -> Sn {
        Sn((self.0 + 1) % res.0)
    }

    /// `true` if `self` comes strictly before `other` in the half-window
    /// sense: `other` is reachable from `self` by advancing fewer than
    /// `res.half()` steps, and the two are distinct.
    ///
    /// `precedes(x, x) == false` and `precedes(x, (x+1) mod R) == true`
    /// for every `x`.
    pub fn precedes(self, other: Sn, res: SnResolution) -> bool {
        if self == other {
            return false;
        }
        let diff = (other.0.wrapping_sub(self.0)) % res.0;
        diff != 0 && diff <= res.half()
    }

    pub fn distance(self, other: Sn, res: SnResolution) -> u64 {
        (other.0.wrapping_sub(self.0)) % res.0
    }
}

impl fmt::Display for Sn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn successor_precedes() {
        let res = SnResolution(256);
        for x in 0u64..256 {
            let sn = Sn(x);
            let succ = sn.next(res);
            assert!(sn.precedes(succ, res), "x={x}");
        }
    }

    #[test]
    fn identity_does_not_precede_itself() {
        let res = SnResolution(256);
        for x in 0u64..256 {
            assert!(!Sn(x).precedes(Sn(x), res));
        }
    }

    #[test]
    fn half_window_boundary() {
        let res = SnResolution(256);
        let a = Sn(0);
        // exactly half: still precedes (<=)
        assert!(a.precedes(Sn(128), res));
        // one past half: does not precede (that's "in the past" relative to a)
        assert!(!a.precedes(Sn(129), res));
    }

    #[test]
    fn wraps_around_resolution() {
        let res = SnResolution(256);
        let a = Sn(250);
        let b = Sn(5);
        assert!(a.precedes(b, res));
        assert_eq!(a.distance(b, res), 11);
    }

    #[test]
    fn default_resolution_is_2_32() {
        assert_eq!(SnResolution::default().0, 1u64 << 32);
    }
}
