use crate::Geometry;
use core::fmt;
use core::marker::PhantomData;

/// The offset within a page of geometry `G` (`0..G::PAGE_SIZE`).
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PageOffset<G: Geometry> {
    value: u64,
    _geometry: PhantomData<G>,
}

impl<G: Geometry> PageOffset<G> {
    /// Create from a raw value, asserting it is `< G::PAGE_SIZE` in debug.
    #[inline]
    #[must_use]
    pub const fn new(value: u64) -> Self {
        debug_assert!(value < G::PAGE_SIZE, "offset must be < page size");
        Self::from_bits(value)
    }

    /// Keep only the offset bits of a full address.
    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u64) -> Self {
        Self {
            value: bits & G::OFFSET_MASK,
            _geometry: PhantomData,
        }
    }

    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.value
    }
}

impl<G: Geometry> fmt::Debug for PageOffset<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Offset<{}>({:#X})", G::as_str(), self.value)
    }
}
