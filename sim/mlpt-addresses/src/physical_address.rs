use crate::{Geometry, PageOffset, PhysicalPage};
use core::fmt;

/// Physical memory address.
///
/// A thin wrapper around `u64` that denotes an address in the simulated
/// backing memory, i.e. an output of the table walk or the base of a frame.
///
/// ### Examples
/// ```rust
/// # use mlpt_addresses::*;
/// let pa = PhysicalAddress::new(0x2C15);
/// let (page, off) = pa.split::<ThreeLevel1K>();
/// assert_eq!(page.base().as_u64(), 0x2C00);
/// assert_eq!(off.as_u64(), 0x15);
/// assert_eq!(page.join(off), pa);
/// ```
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PhysicalAddress(u64);

impl PhysicalAddress {
    #[inline]
    #[must_use]
    pub const fn new(v: u64) -> Self {
        Self(v)
    }

    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// The page that contains this address.
    #[inline]
    #[must_use]
    pub const fn page<G: Geometry>(self) -> PhysicalPage<G> {
        PhysicalPage::from_addr(self)
    }

    #[inline]
    #[must_use]
    pub const fn offset<G: Geometry>(self) -> PageOffset<G> {
        PageOffset::from_bits(self.0)
    }

    #[inline]
    #[must_use]
    pub const fn split<G: Geometry>(self) -> (PhysicalPage<G>, PageOffset<G>) {
        (self.page::<G>(), self.offset::<G>())
    }
}

impl fmt::Debug for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PA(0x{:016X})", self.0)
    }
}

impl fmt::Display for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016X}", self.0)
    }
}

impl From<u64> for PhysicalAddress {
    #[inline]
    fn from(v: u64) -> Self {
        Self::new(v)
    }
}

impl From<PhysicalAddress> for u64 {
    #[inline]
    fn from(v: PhysicalAddress) -> Self {
        v.as_u64()
    }
}
