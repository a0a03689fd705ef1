use crate::{Geometry, PageOffset};
use core::fmt;

/// Virtual memory address.
///
/// A thin wrapper around `u64` that denotes a **virtual** address, i.e. an
/// input to the table walk. It carries no geometry; the per-level split is
/// derived on demand for a concrete [`Geometry`].
///
/// ### Semantics
/// - [`level_index`](Self::level_index) extracts one level's table index.
/// - [`page_offset`](Self::page_offset) extracts the in-page offset.
/// - [`is_in_bounds`](Self::is_in_bounds) rejects addresses with bits set
///   above the range the walk covers.
///
/// ### Examples
/// ```rust
/// # use mlpt_addresses::*;
/// let va = VirtualAddress::new(0x0000_7FFF_FFFF_F123);
/// assert_eq!(va.page_offset::<FourLevel4K>().as_u64(), 0x123);
/// assert_eq!(va.level_index::<FourLevel4K>(3), 0xFF);
/// assert_eq!(va.level_index::<FourLevel4K>(0), 0x1FF);
/// ```
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct VirtualAddress(u64);

impl VirtualAddress {
    #[inline]
    #[must_use]
    pub const fn new(v: u64) -> Self {
        Self(v)
    }

    #[inline]
    #[must_use]
    pub const fn zero() -> Self {
        Self::new(0)
    }

    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// The `BITS_PER_LEVEL`-wide index field for `level`.
    ///
    /// The field starts at bit `PAGE_OFFSET_BITS + level * BITS_PER_LEVEL`.
    /// Level `G::LEVELS - 1` is the root-adjacent level, level `0` the leaf
    /// level. Total over all inputs: a field lying entirely above bit 63
    /// reads as `0`.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn level_index<G: Geometry>(self, level: usize) -> usize {
        (Self::field_above::<G>(self.0, level) & G::INDEX_MASK) as usize
    }

    /// The in-page offset (low `PAGE_OFFSET_BITS` bits).
    #[inline]
    #[must_use]
    pub const fn page_offset<G: Geometry>(self) -> PageOffset<G> {
        PageOffset::from_bits(self.0)
    }

    /// Whether every level's index fits into a table of
    /// `G::ENTRIES_PER_TABLE` entries.
    ///
    /// The root-level index is taken **unmasked**, so any bit above
    /// `G::VIRTUAL_BITS` makes the address out of bounds instead of letting it
    /// alias onto a lower address.
    #[must_use]
    pub const fn is_in_bounds<G: Geometry>(self) -> bool {
        let mut level = 0;
        while level < G::LEVELS {
            let raw = if level + 1 == G::LEVELS {
                Self::field_above::<G>(self.0, level)
            } else {
                Self::field_above::<G>(self.0, level) & G::INDEX_MASK
            };
            if raw >= G::ENTRIES_PER_TABLE as u64 {
                return false;
            }
            level += 1;
        }
        true
    }

    /// Level indices from the root down to the leaf, as `(level, index)`.
    pub fn indices<G: Geometry>(self) -> impl Iterator<Item = (usize, usize)> {
        (0..G::LEVELS)
            .rev()
            .map(move |level| (level, self.level_index::<G>(level)))
    }

    /// All bits from the low edge of `level`'s field upwards.
    #[allow(clippy::cast_possible_truncation)]
    const fn field_above<G: Geometry>(bits: u64, level: usize) -> u64 {
        let shift = G::PAGE_OFFSET_BITS as u64 + level as u64 * G::BITS_PER_LEVEL as u64;
        if shift >= u64::BITS as u64 {
            0
        } else {
            bits >> shift
        }
    }
}

impl fmt::Debug for VirtualAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VA(0x{:016X})", self.0)
    }
}

impl fmt::Display for VirtualAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016X}", self.0)
    }
}

impl From<u64> for VirtualAddress {
    #[inline]
    fn from(v: u64) -> Self {
        Self::new(v)
    }
}

impl From<VirtualAddress> for u64 {
    #[inline]
    fn from(v: VirtualAddress) -> Self {
        v.as_u64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FourLevel4K, OneLevel1K, ThreeLevel1K};

    #[test]
    fn splits_reference_geometry() {
        // level2 = 0x41, level1 = 0x22, level0 = 0x11, offset = 0x155
        let va = VirtualAddress::new((0x41 << 24) | (0x22 << 17) | (0x11 << 10) | 0x155);
        assert_eq!(va.level_index::<ThreeLevel1K>(2), 0x41);
        assert_eq!(va.level_index::<ThreeLevel1K>(1), 0x22);
        assert_eq!(va.level_index::<ThreeLevel1K>(0), 0x11);
        assert_eq!(va.page_offset::<ThreeLevel1K>().as_u64(), 0x155);
    }

    #[test]
    fn indices_run_root_first() {
        let va = VirtualAddress::new((3 << 24) | (2 << 17) | (1 << 10));
        let got: Vec<_> = va.indices::<ThreeLevel1K>().collect();
        assert_eq!(got, vec![(2, 3), (1, 2), (0, 1)]);
    }

    #[test]
    fn level_index_is_total() {
        let va = VirtualAddress::new(u64::MAX);
        assert_eq!(va.level_index::<ThreeLevel1K>(2), 0x7F);
        // A field starting above bit 63 reads as zero.
        assert_eq!(va.level_index::<ThreeLevel1K>(9), 0);
        assert!(va.level_index::<FourLevel4K>(3) < FourLevel4K::ENTRIES_PER_TABLE);
    }

    #[test]
    fn bounds_follow_virtual_width() {
        assert!(VirtualAddress::zero().is_in_bounds::<ThreeLevel1K>());
        assert!(VirtualAddress::new((1 << 31) - 1).is_in_bounds::<ThreeLevel1K>());
        assert!(!VirtualAddress::new(1 << 31).is_in_bounds::<ThreeLevel1K>());
        assert!(!VirtualAddress::new(u64::MAX).is_in_bounds::<ThreeLevel1K>());

        assert!(VirtualAddress::new((1 << 48) - 1).is_in_bounds::<FourLevel4K>());
        assert!(!VirtualAddress::new(1 << 48).is_in_bounds::<FourLevel4K>());

        assert!(VirtualAddress::new(0x1_FFFF).is_in_bounds::<OneLevel1K>());
        assert!(!VirtualAddress::new(0x2_0000).is_in_bounds::<OneLevel1K>());
    }

    #[test]
    fn formats_as_hex() {
        let va = VirtualAddress::new(0xABC);
        assert_eq!(format!("{va}"), "0x0000000000000ABC");
        assert_eq!(format!("{va:?}"), "VA(0x0000000000000ABC)");
    }
}
