//! Edge detection between two button bitmask samples.
//!
//! A device reports its buttons as a `u32` where bit `n` is set while button `n`
//! is held. Comparing the previous and current sample yields two disjoint sets:
//! bits that went `0 → 1` (pressed) and bits that went `1 → 0` (released).
//!
//! ```
//! use padwatch::diff::diff;
//!
//! let edges = diff(0b0110, 0b0011);
//! assert_eq!(edges.pressed, 0b0001);
//! assert_eq!(edges.released, 0b0100);
//! assert_eq!(edges.pressed_bits().collect::<Vec<_>>(), vec![0]);
//! ```

/// Bits that changed between two samples.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Edges {
    /// Set now, clear before.
    pub pressed: u32,
    /// Set before, clear now.
    pub released: u32,
}

impl Edges {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pressed == 0 && self.released == 0
    }

    /// Indices of newly pressed bits, ascending.
    #[inline]
    pub fn pressed_bits(&self) -> SetBits {
        SetBits(self.pressed)
    }

    /// Indices of newly released bits, ascending.
    #[inline]
    pub fn released_bits(&self) -> SetBits {
        SetBits(self.released)
    }
}

/// Compute the edges from `previous` to `current`.
#[inline]
pub fn diff(previous: u32, current: u32) -> Edges {
    let changed = current ^ previous;
    Edges {
        pressed: current & changed,
        released: previous & changed,
    }
}

/// Iterator over the set bit indices of a mask, lowest first.
#[derive(Clone, Copy, Debug)]
pub struct SetBits(u32);

impl Iterator for SetBits {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        if self.0 == 0 {
            return None;
        }
        let bit = self.0.trailing_zeros() as u8;
        // clear lowest set bit
        self.0 &= self.0 - 1;
        Some(bit)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.0.count_ones() as usize;
        (n, Some(n))
    }
}

impl ExactSizeIterator for SetBits {}
